//! State polling waiter
//!
//! `StatePollingWaiter` repeatedly reads a resource's state on a fixed
//! interval until the state satisfies the configured target, the wait times
//! out, or an unrecoverable state is observed. A waiter is built for a single
//! wait and consumed by it.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::context::Context;
use crate::error::{BoxError, LifecycleError, OperationError, Result};
use crate::state::{Availability, InstanceStatus, ResourceState};

pub const DEFAULT_STATE_POLLING_TIMEOUT: Duration = Duration::from_secs(20 * 60);
pub const DEFAULT_STATE_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// Reads the current state of the resource being waited on.
///
/// `Ok(None)` means the resource is not visible yet and keeps the wait
/// pending. Errors classified as not-found are retried while the waiter's
/// not-found budget lasts.
pub type StateReadFunc<S> =
    Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<Option<S>, OperationError>> + Send + Sync>;

/// Custom completion predicate: `Ok(true)` completes the wait, `Ok(false)`
/// keeps polling.
pub type StateCheckFunc<S> = Arc<dyn Fn(&S) -> std::result::Result<bool, BoxError> + Send + Sync>;

pub(crate) const PENDING_COPY_AVAILABILITIES: [Availability; 5] = [
    Availability::Unknown,
    Availability::Migrating,
    Availability::Uploading,
    Availability::Transferring,
    Availability::Discontinued,
];

/// Timing and strictness settings of a waiter. Zero durations mean "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaiterConfig {
    pub timeout: Duration,
    pub polling_interval: Duration,
    /// Number of not-found read errors tolerated before giving up
    pub not_found_retry: u32,
    /// Fail instead of waiting when a state is in neither the target nor the pending set
    pub raise_error_with_unknown_state: bool,
}

impl WaiterConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_STATE_POLLING_TIMEOUT;
        }
        if self.polling_interval.is_zero() {
            self.polling_interval = DEFAULT_STATE_POLLING_INTERVAL;
        }
        self
    }
}

/// Event emitted by [`StatePollingWaiter::wait_for_state_async`]
#[derive(Debug)]
pub enum WaitEvent<S> {
    /// An intermediate state that did not satisfy the target yet
    Progress(S),
    /// The state that completed the wait
    Complete(S),
    Failed(LifecycleError),
}

pub struct StatePollingWaiter<S> {
    read_func: Option<StateReadFunc<S>>,
    state_check_func: Option<StateCheckFunc<S>>,
    target_availability: Vec<Availability>,
    pending_availability: Vec<Availability>,
    target_instance_status: Vec<InstanceStatus>,
    pending_instance_status: Vec<InstanceStatus>,
    config: WaiterConfig,
}

impl<S> Default for StatePollingWaiter<S> {
    fn default() -> Self {
        Self {
            read_func: None,
            state_check_func: None,
            target_availability: Vec::new(),
            pending_availability: Vec::new(),
            target_instance_status: Vec::new(),
            pending_instance_status: Vec::new(),
            config: WaiterConfig::default(),
        }
    }
}

impl<S: ResourceState> StatePollingWaiter<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_func<F, Fut>(mut self, read: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Option<S>, OperationError>> + Send + 'static,
    {
        self.read_func = Some(Arc::new(move || read().boxed()));
        self
    }

    pub fn state_check_func<F>(mut self, check: F) -> Self
    where
        F: Fn(&S) -> std::result::Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.state_check_func = Some(Arc::new(check));
        self
    }

    pub fn target_availability(mut self, values: impl IntoIterator<Item = Availability>) -> Self {
        self.target_availability = values.into_iter().collect();
        self
    }

    pub fn pending_availability(mut self, values: impl IntoIterator<Item = Availability>) -> Self {
        self.pending_availability = values.into_iter().collect();
        self
    }

    pub fn target_instance_status(
        mut self,
        values: impl IntoIterator<Item = InstanceStatus>,
    ) -> Self {
        self.target_instance_status = values.into_iter().collect();
        self
    }

    pub fn pending_instance_status(
        mut self,
        values: impl IntoIterator<Item = InstanceStatus>,
    ) -> Self {
        self.pending_instance_status = values.into_iter().collect();
        self
    }

    pub fn with_config(mut self, config: WaiterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.config.polling_interval = interval;
        self
    }

    pub fn with_not_found_retry(mut self, retry: u32) -> Self {
        self.config.not_found_retry = retry;
        self
    }

    pub fn raise_error_with_unknown_state(mut self, raise: bool) -> Self {
        self.config.raise_error_with_unknown_state = raise;
        self
    }

    pub fn config(&self) -> &WaiterConfig {
        &self.config
    }

    /// Waits until the resource reaches the target state and returns that state.
    ///
    /// # Panics
    ///
    /// Panics if the waiter is misconfigured, see [`Self::wait_for_state_async`].
    pub async fn wait_for_state(self, ctx: &Context) -> Result<S> {
        let mut events = self.wait_for_state_async(ctx);

        loop {
            let event = tokio::select! {
                biased;
                reason = ctx.cancelled() => return Err(reason.into()),
                event = events.recv() => event,
            };

            match event {
                Some(WaitEvent::Progress(_)) => {}
                Some(WaitEvent::Complete(state)) => return Ok(state),
                Some(WaitEvent::Failed(err)) => return Err(err),
                None => return Err(LifecycleError::WaiterAborted),
            }
        }
    }

    /// Starts polling in a background task and returns its event stream.
    ///
    /// The stream yields zero or more `Progress` events followed by exactly one
    /// `Complete` or `Failed`. Polling runs under a child of `ctx` limited by
    /// the configured timeout, and stops early if the receiver is dropped.
    ///
    /// # Panics
    ///
    /// Panics if no read function is set, if a custom state check is combined
    /// with target states, or if neither is configured.
    pub fn wait_for_state_async(self, ctx: &Context) -> mpsc::Receiver<WaitEvent<S>> {
        let read = self.validate();
        let config = self.config.clone().with_defaults();

        let (tx, rx) = mpsc::channel(1);
        let ctx = ctx.with_timeout(config.timeout);
        tokio::spawn(self.poll(ctx, read, config, tx));

        rx
    }

    fn validate(&self) -> StateReadFunc<S> {
        let Some(read) = self.read_func.clone() else {
            panic!("StatePollingWaiter has invalid setting: read function is required");
        };

        let has_targets =
            !self.target_availability.is_empty() || !self.target_instance_status.is_empty();

        if self.state_check_func.is_some() && has_targets {
            panic!(
                "StatePollingWaiter has invalid setting: state check function and target states can not be used at the same time"
            );
        }
        if self.state_check_func.is_none() && !has_targets {
            panic!(
                "StatePollingWaiter has invalid setting: target availability or target instance status must have at least one item when no state check function is set"
            );
        }

        read
    }

    async fn poll(
        self,
        ctx: Context,
        read: StateReadFunc<S>,
        config: WaiterConfig,
        tx: mpsc::Sender<WaitEvent<S>>,
    ) {
        let mut ticker = time::interval_at(
            Instant::now() + config.polling_interval,
            config.polling_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut not_found_budget = config.not_found_retry;

        loop {
            tokio::select! {
                biased;
                reason = ctx.cancelled() => {
                    let _ = tx.send(WaitEvent::Failed(reason.into())).await;
                    return;
                }
                _ = tx.closed() => return,
                _ = ticker.tick() => {}
            }

            let result = tokio::select! {
                biased;
                reason = ctx.cancelled() => {
                    let _ = tx.send(WaitEvent::Failed(reason.into())).await;
                    return;
                }
                result = read() => result,
            };

            let state = match result {
                Ok(Some(state)) => state,
                Ok(None) => {
                    tracing::debug!("Resource state is not available yet, keep waiting");
                    continue;
                }
                Err(err) if err.is_not_found() && not_found_budget > 0 => {
                    not_found_budget -= 1;
                    tracing::debug!(
                        "Resource not found, retrying ({} not-found retries left): {}",
                        not_found_budget,
                        err
                    );
                    continue;
                }
                Err(err) => {
                    let _ = tx.send(WaitEvent::Failed(err.into())).await;
                    return;
                }
            };

            let event = match self.handle_state(&state) {
                Ok(true) => WaitEvent::Complete(state),
                Ok(false) => WaitEvent::Progress(state),
                Err(err) => WaitEvent::Failed(err),
            };
            let finished = !matches!(event, WaitEvent::Progress(_));

            if tx.send(event).await.is_err() || finished {
                return;
            }
        }
    }

    fn handle_state(&self, state: &S) -> Result<bool> {
        if let Some(check) = &self.state_check_func {
            return check(state).map_err(LifecycleError::StateCheck);
        }

        let availability = match state.availability() {
            Some(value) => Some(self.handle_availability(value)?),
            None => None,
        };
        let instance_status = match state.instance_status() {
            Some(value) => Some(self.handle_instance_status(value)?),
            None => None,
        };

        // a state exposing neither dimension completes immediately
        Ok(availability.unwrap_or(true) && instance_status.unwrap_or(true))
    }

    fn handle_availability(&self, value: Availability) -> Result<bool> {
        if self.target_availability.is_empty() || self.target_availability.contains(&value) {
            return Ok(true);
        }
        if self.pending_availability.contains(&value) {
            return Ok(false);
        }
        if self.config.raise_error_with_unknown_state {
            return Err(LifecycleError::UnexpectedAvailability(value));
        }
        tracing::debug!("Unexpected availability {}, treating as pending", value);
        Ok(false)
    }

    fn handle_instance_status(&self, value: InstanceStatus) -> Result<bool> {
        if self.target_instance_status.is_empty() || self.target_instance_status.contains(&value)
        {
            return Ok(true);
        }
        if self.pending_instance_status.contains(&value) {
            return Ok(false);
        }
        if self.config.raise_error_with_unknown_state {
            return Err(LifecycleError::UnexpectedInstanceStatus(value));
        }
        tracing::debug!("Unexpected instance status {}, treating as pending", value);
        Ok(false)
    }
}

/// Waits until the resource is available and powered up.
pub fn waiter_for_up<S, F, Fut>(read: F) -> StatePollingWaiter<S>
where
    S: ResourceState,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Option<S>, OperationError>> + Send + 'static,
{
    StatePollingWaiter::new()
        .read_func(read)
        .target_availability([Availability::Available])
        .pending_availability(PENDING_COPY_AVAILABILITIES)
        .target_instance_status([InstanceStatus::Up])
        .pending_instance_status([
            InstanceStatus::Unknown,
            InstanceStatus::Cleaning,
            InstanceStatus::Down,
        ])
}

/// Waits until the resource is available and powered down.
pub fn waiter_for_down<S, F, Fut>(read: F) -> StatePollingWaiter<S>
where
    S: ResourceState,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Option<S>, OperationError>> + Send + 'static,
{
    StatePollingWaiter::new()
        .read_func(read)
        .target_availability([Availability::Available])
        .pending_availability([Availability::Unknown])
        .target_instance_status([InstanceStatus::Down])
        .pending_instance_status([
            InstanceStatus::Up,
            InstanceStatus::Cleaning,
            InstanceStatus::Unknown,
        ])
}

/// Waits until a resource without power state (disk, archive, ...) is available.
pub fn waiter_for_ready<S, F, Fut>(read: F) -> StatePollingWaiter<S>
where
    S: ResourceState,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Option<S>, OperationError>> + Send + 'static,
{
    StatePollingWaiter::new()
        .read_func(read)
        .target_availability([Availability::Available])
        .pending_availability(PENDING_COPY_AVAILABILITIES)
}

/// Same as [`waiter_for_up`], tolerating `not_found_retry` not-found reads.
///
/// Appliances can briefly return 404 right after creation.
pub fn waiter_for_appliance_up<S, F, Fut>(read: F, not_found_retry: u32) -> StatePollingWaiter<S>
where
    S: ResourceState,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Option<S>, OperationError>> + Send + 'static,
{
    waiter_for_up(read).with_not_found_retry(not_found_retry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateSnapshot;

    async fn never_read() -> std::result::Result<Option<StateSnapshot>, OperationError> {
        Ok(None)
    }

    fn snapshot(availability: Option<Availability>, status: Option<InstanceStatus>) -> StateSnapshot {
        StateSnapshot {
            availability,
            instance_status: status,
            ..Default::default()
        }
    }

    #[test]
    fn config_defaults_fill_zero_values_only() {
        let config = WaiterConfig::default().with_defaults();
        assert_eq!(config.timeout, DEFAULT_STATE_POLLING_TIMEOUT);
        assert_eq!(config.polling_interval, DEFAULT_STATE_POLLING_INTERVAL);
        assert_eq!(config.not_found_retry, 0);

        let config = WaiterConfig {
            timeout: Duration::from_secs(1),
            polling_interval: Duration::from_millis(10),
            ..Default::default()
        }
        .with_defaults();
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.polling_interval, Duration::from_millis(10));
    }

    #[test]
    fn up_requires_both_dimensions_on_same_state() {
        let waiter = waiter_for_up(never_read);

        let down = snapshot(Some(Availability::Available), Some(InstanceStatus::Down));
        assert!(!waiter.handle_state(&down).unwrap());

        let migrating = snapshot(Some(Availability::Migrating), Some(InstanceStatus::Up));
        assert!(!waiter.handle_state(&migrating).unwrap());

        let up = snapshot(Some(Availability::Available), Some(InstanceStatus::Up));
        assert!(waiter.handle_state(&up).unwrap());
    }

    #[test]
    fn single_dimension_states_are_classified_independently() {
        let waiter = waiter_for_up(never_read);

        let power_only = snapshot(None, Some(InstanceStatus::Up));
        assert!(waiter.handle_state(&power_only).unwrap());

        let availability_only = snapshot(Some(Availability::Available), None);
        assert!(waiter.handle_state(&availability_only).unwrap());

        let neither = snapshot(None, None);
        assert!(waiter.handle_state(&neither).unwrap());
    }

    #[test]
    fn ready_ignores_instance_status() {
        let waiter = waiter_for_ready(never_read);

        let state = snapshot(Some(Availability::Available), Some(InstanceStatus::Down));
        assert!(waiter.handle_state(&state).unwrap());
    }

    #[test]
    fn unknown_state_is_pending_unless_strict() {
        let lenient = waiter_for_down(never_read);
        let migrating = snapshot(Some(Availability::Migrating), None);
        assert!(!lenient.handle_state(&migrating).unwrap());

        let strict = waiter_for_down(never_read).raise_error_with_unknown_state(true);
        let err = strict.handle_state(&migrating).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::UnexpectedAvailability(Availability::Migrating)
        ));

        let strict = waiter_for_ready(never_read).raise_error_with_unknown_state(true);
        assert!(strict.handle_state(&snapshot(Some(Availability::Failed), None)).is_err());
    }

    #[test]
    fn strict_mode_reports_unexpected_instance_status() {
        let strict = StatePollingWaiter::new()
            .read_func(never_read)
            .target_instance_status([InstanceStatus::Up])
            .pending_instance_status([InstanceStatus::Down])
            .raise_error_with_unknown_state(true);

        let err = strict
            .handle_state(&snapshot(None, Some(InstanceStatus::Cleaning)))
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::UnexpectedInstanceStatus(InstanceStatus::Cleaning)
        ));
    }

    #[test]
    fn custom_check_decides_alone() {
        let waiter = StatePollingWaiter::new()
            .read_func(never_read)
            .state_check_func(|state: &StateSnapshot| {
                if state.id.as_u64() == 0 {
                    return Err("missing id".into());
                }
                Ok(state.availability == Some(Availability::Failed))
            });

        let failed = StateSnapshot::new(1u64).with_availability(Availability::Failed);
        assert!(waiter.handle_state(&failed).unwrap());

        let available = StateSnapshot::new(1u64).with_availability(Availability::Available);
        assert!(!waiter.handle_state(&available).unwrap());

        let err = waiter.handle_state(&StateSnapshot::default()).unwrap_err();
        assert!(matches!(err, LifecycleError::StateCheck(_)));
    }

    #[test]
    fn appliance_up_carries_not_found_retry() {
        let waiter = waiter_for_appliance_up(never_read, 3);
        assert_eq!(waiter.config().not_found_retry, 3);
        assert_eq!(waiter.target_instance_status, vec![InstanceStatus::Up]);
    }

    #[tokio::test]
    #[should_panic(expected = "read function is required")]
    async fn missing_read_function_panics() {
        let waiter: StatePollingWaiter<StateSnapshot> =
            StatePollingWaiter::new().target_availability([Availability::Available]);
        let _ = waiter.wait_for_state_async(&Context::new());
    }

    #[tokio::test]
    #[should_panic(expected = "can not be used at the same time")]
    async fn check_func_and_targets_together_panic() {
        let waiter = StatePollingWaiter::new()
            .read_func(never_read)
            .state_check_func(|_: &StateSnapshot| Ok(true))
            .target_instance_status([InstanceStatus::Up]);
        let _ = waiter.wait_for_state_async(&Context::new());
    }

    #[tokio::test]
    #[should_panic(expected = "must have at least one item")]
    async fn missing_targets_and_check_func_panic() {
        let waiter = StatePollingWaiter::new()
            .read_func(never_read)
            .pending_availability([Availability::Migrating]);
        let _ = waiter.wait_for_state_async(&Context::new());
    }
}
