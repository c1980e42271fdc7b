//! Retryable resource setup
//!
//! `RetryableSetup` drives a resource from creation to a usable state:
//! create, wait for its copy to finish, run an optional provisioning callback
//! and wait for it to come up. A copy that ends in `Failed` is deleted and the
//! whole cycle starts over, up to the configured retry count.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::error::{LifecycleError, OperationError, Result};
use crate::state::{Availability, Identified, ResourceId, ResourceState};
use crate::waiter::{
    waiter_for_appliance_up, StatePollingWaiter, WaitEvent, DEFAULT_STATE_POLLING_INTERVAL,
    PENDING_COPY_AVAILABILITIES,
};

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_PROVISIONING_RETRY_COUNT: u32 = 10;
pub const DEFAULT_PROVISIONING_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_DELETE_RETRY_COUNT: u32 = 10;
pub const DEFAULT_DELETE_RETRY_INTERVAL: Duration = Duration::from_secs(10);

type OpResult<T> = std::result::Result<T, OperationError>;

/// Creates the resource in the given zone
pub type CreateFunc<S> = Arc<dyn Fn(Context, String) -> BoxFuture<'static, OpResult<S>> + Send + Sync>;
/// Reads the resource by zone and ID
pub type ReadFunc<S> =
    Arc<dyn Fn(Context, String, ResourceId) -> BoxFuture<'static, OpResult<S>> + Send + Sync>;
/// Deletes a resource whose copy failed
pub type DeleteFunc =
    Arc<dyn Fn(Context, String, ResourceId) -> BoxFuture<'static, OpResult<()>> + Send + Sync>;
/// Runs between a successful copy and the up-wait
pub type ProvisionBeforeUpFunc<S> =
    Arc<dyn Fn(Context, String, ResourceId, S) -> BoxFuture<'static, OpResult<()>> + Send + Sync>;

/// Retry budget of a setup. Zero values mean "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPlan {
    /// Extra create attempts after a failed copy
    pub retry_count: u32,
    pub provisioning_retry_count: u32,
    pub provisioning_retry_interval: Duration,
    pub delete_retry_count: u32,
    pub delete_retry_interval: Duration,
    pub polling_interval: Duration,
    /// Not-found reads tolerated by the copy and up waits. Zero keeps not-found fatal.
    pub not_found_retry: u32,
}

impl RetryPlan {
    pub fn with_defaults(mut self) -> Self {
        if self.retry_count == 0 {
            self.retry_count = DEFAULT_RETRY_COUNT;
        }
        if self.provisioning_retry_count == 0 {
            self.provisioning_retry_count = DEFAULT_PROVISIONING_RETRY_COUNT;
        }
        if self.provisioning_retry_interval.is_zero() {
            self.provisioning_retry_interval = DEFAULT_PROVISIONING_RETRY_INTERVAL;
        }
        if self.delete_retry_count == 0 {
            self.delete_retry_count = DEFAULT_DELETE_RETRY_COUNT;
        }
        if self.delete_retry_interval.is_zero() {
            self.delete_retry_interval = DEFAULT_DELETE_RETRY_INTERVAL;
        }
        if self.polling_interval.is_zero() {
            self.polling_interval = DEFAULT_STATE_POLLING_INTERVAL;
        }
        self
    }
}

/// Create-and-wait orchestration for a single resource build
pub struct RetryableSetup<S> {
    create: CreateFunc<S>,
    read: Option<ReadFunc<S>>,
    delete: Option<DeleteFunc>,
    provision_before_up: Option<ProvisionBeforeUpFunc<S>>,
    wait_for_copy: bool,
    wait_for_up: bool,
    plan: RetryPlan,
}

impl<S> RetryableSetup<S>
where
    S: ResourceState + Identified + Clone,
{
    pub fn new<F, Fut>(create: F) -> Self
    where
        F: Fn(Context, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OpResult<S>> + Send + 'static,
    {
        Self {
            create: Arc::new(move |ctx, zone| create(ctx, zone).boxed()),
            read: None,
            delete: None,
            provision_before_up: None,
            wait_for_copy: false,
            wait_for_up: false,
            plan: RetryPlan::default(),
        }
    }

    pub fn read<F, Fut>(mut self, read: F) -> Self
    where
        F: Fn(Context, String, ResourceId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OpResult<S>> + Send + 'static,
    {
        self.read = Some(Arc::new(move |ctx, zone, id| read(ctx, zone, id).boxed()));
        self
    }

    pub fn delete<F, Fut>(mut self, delete: F) -> Self
    where
        F: Fn(Context, String, ResourceId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OpResult<()>> + Send + 'static,
    {
        self.delete = Some(Arc::new(move |ctx, zone, id| delete(ctx, zone, id).boxed()));
        self
    }

    pub fn provision_before_up<F, Fut>(mut self, provision: F) -> Self
    where
        F: Fn(Context, String, ResourceId, S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OpResult<()>> + Send + 'static,
    {
        self.provision_before_up = Some(Arc::new(move |ctx, zone, id, state| {
            provision(ctx, zone, id, state).boxed()
        }));
        self
    }

    pub fn wait_for_copy(mut self, wait: bool) -> Self {
        self.wait_for_copy = wait;
        self
    }

    pub fn wait_for_up(mut self, wait: bool) -> Self {
        self.wait_for_up = wait;
        self
    }

    pub fn retry_plan(mut self, plan: RetryPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Builds the resource and returns its last observed state.
    ///
    /// Only a copy that ends in `Failed` is retried (by deleting and
    /// recreating the resource). Create, delete, provisioning and up-wait
    /// failures abort the setup once their own retry budgets are spent.
    pub async fn setup(self, ctx: &Context, zone: &str) -> Result<S> {
        if self.wait_for_copy && self.read.is_none() {
            return Err(LifecycleError::Precondition(
                "read function is required when waiting for copy",
            ));
        }
        if self.wait_for_up && self.read.is_none() {
            return Err(LifecycleError::Precondition(
                "read function is required when waiting for up",
            ));
        }
        if self.wait_for_copy && self.delete.is_none() {
            return Err(LifecycleError::Precondition(
                "delete function is required when waiting for copy",
            ));
        }

        let plan = self.plan.clone().with_defaults();
        let max_attempts = plan.retry_count + 1;

        for attempt in 1..=max_attempts {
            let created = (self.create)(ctx.clone(), zone.to_string()).await?;
            let id = created.id();
            tracing::debug!(
                "Created resource {} in zone {} (attempt {}/{})",
                id,
                zone,
                attempt,
                max_attempts
            );

            let mut state = if self.wait_for_copy {
                match self.wait_for_copy_with_cleanup(ctx, zone, id, &plan).await? {
                    Some(state) => state,
                    None => continue,
                }
            } else {
                created
            };

            if let Some(provision) = &self.provision_before_up {
                Self::provision(provision, ctx, zone, id, &state, &plan).await?;
            }

            if self.wait_for_up {
                state = self.wait_until_up(ctx, zone, id, &plan).await?;
            }

            tracing::info!("Resource {} in zone {} is ready", id, zone);
            return Ok(state);
        }

        Err(LifecycleError::MaxRetryCountExceeded {
            attempts: max_attempts,
        })
    }

    fn reader(&self, ctx: &Context, zone: &str, id: ResourceId) -> Result<ReadFn<S>> {
        let read = self.read.clone().ok_or(LifecycleError::Precondition(
            "read function is required",
        ))?;
        Ok(ReadFn {
            read,
            ctx: ctx.clone(),
            zone: zone.to_string(),
            id,
        })
    }

    /// Returns `None` when the copy failed and the resource was deleted.
    async fn wait_for_copy_with_cleanup(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        plan: &RetryPlan,
    ) -> Result<Option<S>> {
        let reader = self.reader(ctx, zone, id)?;
        let waiter = StatePollingWaiter::new()
            .read_func(move || reader.call())
            .target_availability([Availability::Available, Availability::Failed])
            .pending_availability(PENDING_COPY_AVAILABILITIES)
            .with_polling_interval(plan.polling_interval)
            .with_not_found_retry(plan.not_found_retry);

        let mut events = waiter.wait_for_state_async(ctx);
        let state = loop {
            match events.recv().await {
                Some(WaitEvent::Progress(state)) => {
                    tracing::debug!(
                        "Waiting for copy of resource {}: availability {}",
                        id,
                        state.availability().unwrap_or_default()
                    );
                }
                Some(WaitEvent::Complete(state)) => break state,
                Some(WaitEvent::Failed(err)) => return Err(err),
                None => return Err(LifecycleError::WaiterAborted),
            }
        };

        if !state.availability().is_some_and(|a| a.is_failed()) {
            return Ok(Some(state));
        }

        tracing::warn!(
            "Copy of resource {} in zone {} failed, deleting it before retrying",
            id,
            zone
        );
        self.delete_failed(ctx, zone, id, plan).await?;
        Ok(None)
    }

    async fn delete_failed(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        plan: &RetryPlan,
    ) -> Result<()> {
        let delete = self.delete.clone().ok_or(LifecycleError::Precondition(
            "delete function is required when waiting for copy",
        ))?;

        let mut last_error = None;
        for attempt in 1..=plan.delete_retry_count {
            match delete(ctx.clone(), zone.to_string(), id).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        "Failed to delete resource {} (attempt {}/{}): {}",
                        id,
                        attempt,
                        plan.delete_retry_count,
                        err
                    );
                    last_error = Some(err);
                    // a resource that has only just failed may still reject deletion
                    if attempt < plan.delete_retry_count {
                        ctx.sleep(plan.delete_retry_interval).await?;
                    }
                }
            }
        }

        match last_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    async fn provision(
        provision: &ProvisionBeforeUpFunc<S>,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        state: &S,
        plan: &RetryPlan,
    ) -> Result<()> {
        let mut last_error = None;
        for attempt in 1..=plan.provisioning_retry_count {
            match provision(ctx.clone(), zone.to_string(), id, state.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        "Provisioning resource {} failed (attempt {}/{}): {}",
                        id,
                        attempt,
                        plan.provisioning_retry_count,
                        err
                    );
                    last_error = Some(err);
                    if attempt < plan.provisioning_retry_count {
                        ctx.sleep(plan.provisioning_retry_interval).await?;
                    }
                }
            }
        }

        match last_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    async fn wait_until_up(
        &self,
        ctx: &Context,
        zone: &str,
        id: ResourceId,
        plan: &RetryPlan,
    ) -> Result<S> {
        let reader = self.reader(ctx, zone, id)?;
        waiter_for_appliance_up(move || reader.call(), plan.not_found_retry)
            .with_polling_interval(plan.polling_interval)
            .wait_for_state(ctx)
            .await
    }
}

/// Read function bound to one resource, shaped for a waiter
struct ReadFn<S> {
    read: ReadFunc<S>,
    ctx: Context,
    zone: String,
    id: ResourceId,
}

impl<S: Send + 'static> ReadFn<S> {
    fn call(&self) -> BoxFuture<'static, OpResult<Option<S>>> {
        (self.read)(self.ctx.clone(), self.zone.clone(), self.id)
            .map(|result| result.map(Some))
            .boxed()
    }
}
