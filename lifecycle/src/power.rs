//! Boot / shutdown driver for compute-class resources
//!
//! The backend may silently drop a power request under load, so after the
//! initial request the driver keeps an eye on the observed instance status
//! and re-issues the request on a fixed cadence while the resource is still
//! in its starting state. A 409 Conflict on a re-issued request means the
//! original request is being processed; retries are then suspended until the
//! observed status changes.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::context::Context;
use crate::error::{LifecycleError, OperationError, Result};
use crate::state::{InstanceStatus, ResourceState};
use crate::waiter::{waiter_for_down, waiter_for_up, WaitEvent};

/// Delay between re-issued boot or shutdown requests
pub const DEFAULT_POWER_RETRY_SPAN: Duration = Duration::from_secs(20);

/// Per-resource-kind adapter over the power-control API
#[async_trait]
pub trait PowerHandler: Send + Sync + 'static {
    type State: ResourceState;

    async fn boot(&self) -> std::result::Result<(), OperationError>;

    async fn shutdown(&self, force: bool) -> std::result::Result<(), OperationError>;

    async fn read(&self) -> std::result::Result<Self::State, OperationError>;
}

/// Timing of a power operation. Zero values mean "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PowerOptions {
    pub retry_span: Duration,
    /// Passed through to the up/down waiter
    pub polling_interval: Duration,
    /// Passed through to the up/down waiter
    pub timeout: Duration,
}

impl PowerOptions {
    pub fn with_defaults(mut self) -> Self {
        if self.retry_span.is_zero() {
            self.retry_span = DEFAULT_POWER_RETRY_SPAN;
        }
        self
    }
}

#[derive(Debug, Clone, Copy)]
enum PowerAction {
    Boot,
    Shutdown { force: bool },
}

impl PowerAction {
    async fn invoke<H: PowerHandler>(&self, handler: &H) -> std::result::Result<(), OperationError> {
        match self {
            PowerAction::Boot => handler.boot().await,
            PowerAction::Shutdown { force } => handler.shutdown(*force).await,
        }
    }

    /// Status in which the request is considered not yet taken into account
    fn pending_status(&self) -> InstanceStatus {
        match self {
            PowerAction::Boot => InstanceStatus::Down,
            PowerAction::Shutdown { .. } => InstanceStatus::Up,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PowerAction::Boot => "boot",
            PowerAction::Shutdown { .. } => "shutdown",
        }
    }
}

/// Boots the resource and waits until it is up.
pub async fn boot<H: PowerHandler>(ctx: &Context, handler: H, options: &PowerOptions) -> Result<()> {
    drive(ctx, Arc::new(handler), PowerAction::Boot, options).await
}

/// Shuts the resource down and waits until it is down.
pub async fn shutdown<H: PowerHandler>(
    ctx: &Context,
    handler: H,
    force: bool,
    options: &PowerOptions,
) -> Result<()> {
    drive(ctx, Arc::new(handler), PowerAction::Shutdown { force }, options).await
}

async fn drive<H: PowerHandler>(
    ctx: &Context,
    handler: Arc<H>,
    action: PowerAction,
    options: &PowerOptions,
) -> Result<()> {
    let options = options.clone().with_defaults();

    action.invoke(handler.as_ref()).await?;

    let reader = handler.clone();
    let read = move || {
        let reader = reader.clone();
        async move { reader.read().await.map(Some) }
    };
    let waiter = match action {
        PowerAction::Boot => waiter_for_up(read),
        PowerAction::Shutdown { .. } => waiter_for_down(read),
    };
    let mut events = waiter
        .with_polling_interval(options.polling_interval)
        .with_timeout(options.timeout)
        .wait_for_state_async(ctx);

    let mut retry = time::interval_at(Instant::now() + options.retry_span, options.retry_span);
    retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut latest: Option<InstanceStatus> = None;
    // status observed when a retry hit 409; retries stay off until it changes
    let mut in_process: Option<InstanceStatus> = None;

    loop {
        tokio::select! {
            reason = ctx.cancelled() => return Err(reason.into()),
            event = events.recv() => match event {
                Some(WaitEvent::Complete(_)) => return Ok(()),
                Some(WaitEvent::Progress(state)) => {
                    latest = state.instance_status();
                    if in_process.is_some() && in_process != latest {
                        tracing::debug!(
                            "Instance status changed to {:?}, {} retries re-enabled",
                            latest,
                            action.name()
                        );
                        in_process = None;
                    }
                }
                Some(WaitEvent::Failed(err)) => return Err(err),
                None => return Err(LifecycleError::WaiterAborted),
            },
            _ = retry.tick() => {
                if in_process.is_some() || latest != Some(action.pending_status()) {
                    continue;
                }

                tracing::debug!(
                    "Instance is still {}, re-issuing {} request",
                    action.pending_status(),
                    action.name()
                );
                match action.invoke(handler.as_ref()).await {
                    Ok(()) => {}
                    Err(err) if err.is_conflict() => {
                        tracing::debug!("{} request is already in process: {}", action.name(), err);
                        in_process = latest;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }
    }
}
