//! Bounded retry on duplicate-index collisions.

use crate::config::RetryConfig;
use crate::error::{CoreError, CoreResult};
use recbind_storage::{RecordKey, StorageError};
use tracing::{debug, warn};

/// Runs `submit` until it succeeds, fails with anything other than a
/// duplicate index, or runs out of attempts.
///
/// `submit` receives the 1-based attempt number and must recompute any
/// index it submits on every call.
pub(crate) fn with_collision_retry<R>(
    retry: &RetryConfig,
    key: &RecordKey,
    attribute: &str,
    mut submit: impl FnMut(u32) -> CoreResult<R>,
) -> CoreResult<R> {
    let mut attempt = 1;
    loop {
        match submit(attempt) {
            Err(CoreError::Storage(StorageError::DuplicateIndex { index, .. })) => {
                if attempt >= retry.max_attempts {
                    warn!(%key, attribute, attempts = attempt, "collision retries exhausted");
                    return Err(CoreError::DuplicateIndex {
                        key: key.to_string(),
                        attribute: attribute.to_string(),
                        attempts: attempt,
                    });
                }
                debug!(%key, attribute, %index, attempt, "index collision, retrying");
                let delay = retry.delay_for_attempt(attempt);
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt += 1;
            }
            other => return other,
        }
    }
}
