use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times a request is retried and how long to wait in between.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            retries: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Retries an HTTP request while it fails before producing a response
/// (connect errors, timeouts). Any response, including an error status,
/// is returned to the caller as-is.
///
/// Total attempts = 1 initial + `policy.retries`.
pub async fn with_retry<F, Fut, T>(mut operation: F, policy: RetryPolicy) -> Result<T, reqwest::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) => {
                let transient = err.is_connect() || err.is_timeout();
                if !transient || attempt > policy.retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, policy.retries, err
                );
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_connect_errors_are_retried() {
        let attempts = AtomicUsize::new(0);
        let policy = RetryPolicy {
            retries: 2,
            delay: Duration::from_millis(1),
        };
        // Nothing listens on port 9 of the loopback interface.
        let result = with_retry(
            || {
                attempts.fetch_add(1, Ordering::SeqCst);
                reqwest::get("http://127.0.0.1:9/")
            },
            policy,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_error_status_is_not_retried() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let url = server.uri();
        let response = with_retry(|| reqwest::get(&url), RetryPolicy::default())
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 500);
    }
}
