//! Resource builders
//!
//! Builders wrap [`lifecycle::RetryableSetup`] with the SakuraCloud calls
//! needed to create a resource, wait for its copy and bring it up.

mod disk;
mod vpc_router;

pub use disk::DiskBuilder;
pub use vpc_router::VpcRouterBuilder;

use lifecycle::{LifecycleError, OperationError};

/// Flattens a lifecycle failure inside a setup callback back into the
/// callback's error type, keeping the not-found / conflict classification.
pub(crate) fn into_operation_error(err: LifecycleError) -> OperationError {
    match err {
        LifecycleError::Operation(err) => err,
        other => OperationError::other(other),
    }
}
