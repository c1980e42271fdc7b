//! SakuraCloud integration for the `lifecycle` coordinator
//!
//! Provides a thin API client, power handlers for servers and appliances,
//! builders for disks and VPC routers, and environment-based configuration.

pub mod api;
pub mod builder;
pub mod config;
pub mod power;

pub use api::{ApiError, Client};
pub use builder::{DiskBuilder, VpcRouterBuilder};
pub use config::{ConfigError, ProviderConfig, ProviderSettings};
pub use power::{AppliancePowerHandler, Power, ServerPowerHandler};
