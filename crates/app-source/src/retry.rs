use std::{future::Future, time::Duration};

use tracing::warn;

use crate::Error;

const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 10;

/// Run `op` with bounded exponential backoff. Every transient failure is
/// absorbed here; callers only ever see success, or `SourceUnavailable`
/// once the attempts are exhausted.
pub(crate) async fn with_backoff<T, F, Fut>(label: &str, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut delay = BASE_DELAY;
    let mut last_error = String::new();

    for attempt in 1..=MAX_ATTEMPTS {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(label, attempt, error = %err, "fetch failed, backing off");
                last_error = err.to_string();
            }
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }

    Err(Error::SourceUnavailable {
        attempts: MAX_ATTEMPTS,
        reason: format!("{label}: {last_error}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn flaky(calls: &AtomicU32, succeed_on: u32) -> Result<u32, reqwest::Error> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n >= succeed_on {
            Ok(n)
        } else {
            // Any reqwest error works for the test; a refused local connect
            // is the cheapest one to manufacture.
            Err(reqwest::Client::new()
                .get("http://127.0.0.1:1/unreachable")
                .send()
                .await
                .expect_err("connect to a closed port must fail"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("test", || flaky(&calls, 3)).await.unwrap();
        assert_eq!(result, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_into_source_unavailable() {
        let calls = AtomicU32::new(0);
        let result = with_backoff("test", || flaky(&calls, u32::MAX)).await;
        assert!(matches!(
            result,
            Err(Error::SourceUnavailable { attempts, .. }) if attempts == MAX_ATTEMPTS
        ));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }
}
