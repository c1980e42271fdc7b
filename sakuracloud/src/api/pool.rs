//! HTTP connection settings and request accounting for the API client

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const USER_AGENT: &str = concat!("sakuracloud-lifecycle/", env!("CARGO_PKG_VERSION"));

pub struct ConnectionPoolConfig {
    pub max_idle_connections: usize,
    pub idle_timeout: Duration,
    pub connection_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            max_idle_connections: 10,
            idle_timeout: Duration::from_secs(90),
            connection_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub failed_requests: u64,
}

/// Builds the shared `reqwest` client and counts requests made through it
pub struct ConnectionPoolManager {
    config: ConnectionPoolConfig,
    total: AtomicU64,
    failed: AtomicU64,
}

impl ConnectionPoolManager {
    pub fn new(config: ConnectionPoolConfig) -> Self {
        Self {
            config,
            total: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self, success: bool) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            total_requests: self.total.load(Ordering::Relaxed),
            failed_requests: self.failed.load(Ordering::Relaxed),
        }
    }

    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.config.request_timeout)
            .connect_timeout(self.config.connection_timeout)
            .pool_idle_timeout(self.config.idle_timeout)
            .pool_max_idle_per_host(self.config.max_idle_connections)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_failures_separately() {
        let manager = ConnectionPoolManager::new(ConnectionPoolConfig::default());
        manager.record_request(true);
        manager.record_request(false);
        manager.record_request(false);

        assert_eq!(
            manager.stats(),
            ConnectionStats {
                total_requests: 3,
                failed_requests: 2,
            }
        );
    }
}
