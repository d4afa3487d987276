//! Throttle handling.
//!
//! The only automatic retry in the client: a 429 pauses the caller for the
//! server-specified `Retry-After` and repeats the same operation, indefinitely.
//! The delay always comes from the server; there is no exponential backoff.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

use crate::jsonapi::JsonApiError;
use crate::sync::{ProgressCallback, SyncProgress, emit};

/// Delay used until the server names one; always replaced by `Retry-After`.
const FALLBACK_DELAY: Duration = Duration::from_secs(1);

/// Constant backoff with no retry limit. The delay is overridden per error.
fn throttle_backoff() -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(FALLBACK_DELAY)
        .without_max_times()
}

/// Run `operation`, repeating it after every throttle response.
///
/// With `countdown` set, a [`SyncProgress::Throttled`] event is emitted for
/// every remaining second of the wait; otherwise a single event is emitted
/// and the wait is one sleep.
pub async fn with_throttle_retry<T, F, Fut>(
    mut operation: F,
    target: &str,
    on_progress: Option<Arc<ProgressCallback>>,
    countdown: bool,
) -> Result<T, JsonApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JsonApiError>>,
{
    let attempt = AtomicU32::new(0);
    let run = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    let sleeper = Countdown {
        target: target.to_string(),
        on_progress: on_progress.clone(),
        enabled: countdown,
    };

    run.retry(throttle_backoff())
        .sleep(move |delay| sleeper.clone().wait(delay))
        .when(|err: &JsonApiError| err.retry_after().is_some())
        .adjust(|err: &JsonApiError, delay| err.retry_after().or(delay))
        .notify(|err: &JsonApiError, delay: Duration| {
            tracing::debug!(
                target_request = target,
                attempt = attempt.load(Ordering::SeqCst),
                retry_after_secs = delay.as_secs(),
                "Throttled, waiting before retry: {err}"
            );
            if !countdown {
                emit(
                    on_progress.as_deref(),
                    SyncProgress::Throttled {
                        target: target.to_string(),
                        retry_after_secs: delay.as_secs(),
                        remaining_secs: delay.as_secs(),
                    },
                );
            }
        })
        .await
}

/// Sleeper that reports every remaining second of a throttle wait.
#[derive(Clone)]
struct Countdown {
    target: String,
    on_progress: Option<Arc<ProgressCallback>>,
    enabled: bool,
}

impl Countdown {
    async fn wait(self, delay: Duration) {
        if !self.enabled {
            tokio::time::sleep(delay).await;
            return;
        }

        let total = delay.as_secs();
        for remaining in (1..=total).rev() {
            emit(
                self.on_progress.as_deref(),
                SyncProgress::Throttled {
                    target: self.target.clone(),
                    retry_after_secs: total,
                    remaining_secs: remaining,
                },
            );
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<ProgressCallback>, Arc<Mutex<Vec<SyncProgress>>>) {
        let events: Arc<Mutex<Vec<SyncProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&events);
        let callback: ProgressCallback = Box::new(move |event| {
            capture
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event);
        });
        (Arc::new(callback), events)
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_emits_one_event_per_second() {
        let calls = AtomicU32::new(0);
        let (callback, events) = recorder();

        let result = with_throttle_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(JsonApiError::Throttled { retry_after: 3 })
                    } else {
                        Ok("done")
                    }
                }
            },
            "GET /projects",
            Some(callback),
            true,
        )
        .await;

        assert_eq!(result.expect("retried"), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let remaining: Vec<u64> = events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|e| match e {
                SyncProgress::Throttled { remaining_secs, .. } => Some(*remaining_secs),
                _ => None,
            })
            .collect();
        assert_eq!(remaining, vec![3, 2, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_mode_sleeps_once() {
        let calls = AtomicU32::new(0);
        let (callback, events) = recorder();
        let started = tokio::time::Instant::now();

        let result = with_throttle_retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(JsonApiError::Throttled { retry_after: 2 })
                    } else {
                        Ok(n)
                    }
                }
            },
            "GET /projects",
            Some(callback),
            false,
        )
        .await;

        assert_eq!(result.expect("retried"), 2);
        assert!(started.elapsed() >= Duration::from_secs(4));
        assert_eq!(events.lock().unwrap_or_else(|e| e.into_inner()).len(), 2);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_throttle_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(JsonApiError::unexpected("boom")) }
            },
            "GET /projects",
            None,
            false,
        )
        .await
        .expect_err("not retried");

        assert!(matches!(err, JsonApiError::UnexpectedPayload(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
