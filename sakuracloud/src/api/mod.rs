//! SakuraCloud IaaS API client
//!
//! Only the endpoints needed to build resources and drive their power state
//! are covered: servers, disks and appliances.

pub mod appliance;
pub mod client;
pub mod common;
pub mod disk;
pub mod error;
pub mod pool;
pub mod server;

#[cfg(test)]
mod test_helpers;

pub use appliance::{Appliance, ApplianceApi, ApplianceClass, CreateApplianceRequest};
pub use client::{Client, RetryConfig, DEFAULT_API_ROOT_URL};
pub use common::IdRef;
pub use disk::{CreateDiskRequest, Disk, DiskApi, DiskConnection, DiskPlan};
pub use error::ApiError;
pub use server::{Server, ServerApi, ServerInstance};
