//! lifecycle - coordination of asynchronously provisioned cloud resources
//!
//! Cloud resources are created, copied and powered on asynchronously. This
//! crate provides the pieces used to wait for them to settle: a polling
//! waiter over availability / instance status, a retryable create-and-wait
//! orchestrator, and boot / shutdown drivers.

pub mod context;
pub mod error;
pub mod power;
pub mod setup;
pub mod state;
pub mod waiter;

pub use context::Context;
pub use error::{BoxError, ContextError, ErrorKind, LifecycleError, OperationError, Result};
pub use power::{PowerHandler, PowerOptions};
pub use setup::{RetryPlan, RetryableSetup};
pub use state::{
    Availability, Identified, InstanceStatus, ResourceId, ResourceState, StateSnapshot,
};
pub use waiter::{
    waiter_for_appliance_up, waiter_for_down, waiter_for_ready, waiter_for_up,
    StatePollingWaiter, WaitEvent, WaiterConfig,
};
