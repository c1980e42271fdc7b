//! Error types for lifecycle coordination

use crate::state::{Availability, InstanceStatus};

/// Boxed error used for callback and state-check failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a `Context` stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Classification of a failed read or action, as reported by the callee
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The resource does not exist (yet)
    NotFound,
    /// A state-changing request is already being processed
    Conflict,
    Other,
}

/// Error returned by the read/create/delete/provision/power callbacks
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct OperationError {
    kind: ErrorKind,
    source: BoxError,
}

impl OperationError {
    pub fn new(kind: ErrorKind, source: impl Into<BoxError>) -> Self {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn not_found(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::NotFound, source)
    }

    pub fn conflict(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Conflict, source)
    }

    pub fn other(source: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Other, source)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }
}

/// Error type for waiters, setup and power operations
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("got unexpected value of availability: {0}")]
    UnexpectedAvailability(Availability),

    #[error("got unexpected value of instance status: {0}")]
    UnexpectedInstanceStatus(InstanceStatus),

    #[error("state check failed: {0}")]
    StateCheck(#[source] BoxError),

    #[error("precondition failed: {0}")]
    Precondition(&'static str),

    #[error("max retry count exceeded: resource was not ready after {attempts} attempts")]
    MaxRetryCountExceeded { attempts: u32 },

    #[error("waiter stopped before reporting a result")]
    WaiterAborted,
}

impl LifecycleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LifecycleError::Operation(e) if e.is_not_found())
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, LifecycleError::Operation(e) if e.is_conflict())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            LifecycleError::Context(ContextError::DeadlineExceeded)
        )
    }
}

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
