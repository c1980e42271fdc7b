//! Test helpers for the SakuraCloud API

#[cfg(test)]
#[allow(dead_code)]
pub fn create_test_client(url: &str) -> super::Client {
    create_test_client_with_retries(url, 0)
}

#[cfg(test)]
#[allow(dead_code)]
pub fn create_test_client_with_retries(url: &str, max_retries: u32) -> super::Client {
    let retry_config = super::RetryConfig {
        max_retries,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
        timeout_seconds: 5,
    };
    super::Client::with_config(url, "test-token", "test-secret", retry_config).unwrap()
}
