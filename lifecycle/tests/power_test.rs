#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use lifecycle::power::{boot, shutdown};
use lifecycle::{
    Availability, Context, ContextError, InstanceStatus, LifecycleError, OperationError,
    PowerHandler, PowerOptions, StateSnapshot,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

/// Power-controllable server whose boot requests may be dropped or rejected.
#[derive(Clone)]
struct FakeServer {
    inner: Arc<Mutex<ServerState>>,
}

struct ServerState {
    status: InstanceStatus,
    /// The server only comes up on this boot call; earlier ones are dropped
    boots_until_up: usize,
    boot_results: VecDeque<Result<(), OperationError>>,
    boot_calls: usize,
    shutdown_calls: usize,
    last_force: Option<bool>,
    reads: usize,
}

impl FakeServer {
    fn new(status: InstanceStatus) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ServerState {
                status,
                boots_until_up: 1,
                boot_results: VecDeque::new(),
                boot_calls: 0,
                shutdown_calls: 0,
                last_force: None,
                reads: 0,
            })),
        }
    }

    fn boots_until_up(self, count: usize) -> Self {
        self.inner.lock().unwrap().boots_until_up = count;
        self
    }

    fn boot_results(self, results: Vec<Result<(), OperationError>>) -> Self {
        self.inner.lock().unwrap().boot_results = results.into();
        self
    }

    fn set_status(&self, status: InstanceStatus) {
        self.inner.lock().unwrap().status = status;
    }

    fn boot_calls(&self) -> usize {
        self.inner.lock().unwrap().boot_calls
    }

    fn reads(&self) -> usize {
        self.inner.lock().unwrap().reads
    }
}

#[async_trait]
impl PowerHandler for FakeServer {
    type State = StateSnapshot;

    async fn boot(&self) -> Result<(), OperationError> {
        let mut state = self.inner.lock().unwrap();
        state.boot_calls += 1;
        if let Some(Err(err)) = state.boot_results.pop_front() {
            return Err(err);
        }
        if state.boot_calls >= state.boots_until_up {
            state.status = InstanceStatus::Up;
        }
        Ok(())
    }

    async fn shutdown(&self, force: bool) -> Result<(), OperationError> {
        let mut state = self.inner.lock().unwrap();
        state.shutdown_calls += 1;
        state.last_force = Some(force);
        state.status = InstanceStatus::Down;
        Ok(())
    }

    async fn read(&self) -> Result<StateSnapshot, OperationError> {
        let mut state = self.inner.lock().unwrap();
        state.reads += 1;
        Ok(StateSnapshot::new(100u64)
            .with_availability(Availability::Available)
            .with_instance_status(state.status))
    }
}

fn options() -> PowerOptions {
    PowerOptions {
        retry_span: Duration::from_millis(50),
        polling_interval: Duration::from_millis(10),
        timeout: Duration::from_secs(1),
    }
}

#[tokio::test(start_paused = true)]
async fn boot_waits_until_up() {
    let server = FakeServer::new(InstanceStatus::Down);

    boot(&Context::new(), server.clone(), &options()).await.unwrap();

    assert_eq!(server.boot_calls(), 1);
    assert_eq!(server.reads(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_boot_request_is_reissued() {
    let server = FakeServer::new(InstanceStatus::Down).boots_until_up(2);

    boot(&Context::new(), server.clone(), &options()).await.unwrap();

    assert_eq!(server.boot_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn conflict_suspends_retries_while_status_is_unchanged() {
    let server = FakeServer::new(InstanceStatus::Down)
        .boots_until_up(usize::MAX)
        .boot_results(vec![
            Ok(()),
            Err(OperationError::conflict("power request is already in process")),
        ]);

    let err = boot(
        &Context::new(),
        server.clone(),
        &PowerOptions {
            timeout: Duration::from_millis(300),
            ..options()
        },
    )
    .await
    .unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err}");
    assert_eq!(server.boot_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn status_change_releases_conflict_latch() {
    let server = FakeServer::new(InstanceStatus::Down)
        .boots_until_up(3)
        .boot_results(vec![
            Ok(()),
            Err(OperationError::conflict("power request is already in process")),
        ]);

    let observer = server.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(125)).await;
        observer.set_status(InstanceStatus::Cleaning);
        sleep(Duration::from_millis(40)).await;
        observer.set_status(InstanceStatus::Down);
    });

    boot(&Context::new(), server.clone(), &options()).await.unwrap();

    assert_eq!(server.boot_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn non_conflict_retry_error_aborts() {
    let server = FakeServer::new(InstanceStatus::Down)
        .boots_until_up(usize::MAX)
        .boot_results(vec![Ok(()), Err(OperationError::other("internal server error"))]);

    let err = boot(&Context::new(), server.clone(), &options())
        .await
        .unwrap_err();

    assert!(matches!(err, LifecycleError::Operation(_)));
    assert_eq!(err.to_string(), "internal server error");
    assert_eq!(server.boot_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn initial_request_error_is_returned_before_waiting() {
    let server = FakeServer::new(InstanceStatus::Down)
        .boot_results(vec![Err(OperationError::other("server is locked"))]);

    let err = boot(&Context::new(), server.clone(), &options())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "server is locked");
    assert_eq!(server.reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_forwards_force_flag() {
    let server = FakeServer::new(InstanceStatus::Up);

    shutdown(&Context::new(), server.clone(), true, &options())
        .await
        .unwrap();

    let state = server.inner.lock().unwrap();
    assert_eq!(state.shutdown_calls, 1);
    assert_eq!(state.last_force, Some(true));
    assert_eq!(state.status, InstanceStatus::Down);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_power_operation() {
    let server = FakeServer::new(InstanceStatus::Down).boots_until_up(usize::MAX);
    let ctx = Context::new();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(35)).await;
        canceller.cancel();
    });

    let err = boot(&ctx, server.clone(), &options()).await.unwrap_err();

    assert!(matches!(err, LifecycleError::Context(ContextError::Canceled)));
    assert_eq!(server.boot_calls(), 1);
}
