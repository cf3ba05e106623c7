/// Lease acquisition with bounded retries
use document::{DocumentId, LockLease, LockStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{BackendError, LockError, Result, TranslationBackend};

/// Attempt `n` that fails transiently waits `n * backoff_step_ms` before
/// attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_step_ms * attempt as u64)
    }
}

pub struct LockManager {
    backend: Arc<dyn TranslationBackend>,
    policy: RetryPolicy,
}

impl LockManager {
    pub fn new(backend: Arc<dyn TranslationBackend>, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &Arc<dyn TranslationBackend> {
        &self.backend
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Acquires the edit lease. Contention and unavailability are retried;
    /// a conflict with another holder is final.
    pub async fn acquire(&self, id: &DocumentId) -> Result<LockLease> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            debug!(document = %id, attempt, "acquiring lock");
            match self.backend.acquire_lock(id).await {
                Ok(lease) if lease.can_edit => {
                    info!(document = %id, holder = %lease.holder, attempt, "lock acquired");
                    return Ok(lease);
                }
                Ok(lease) => {
                    return Err(LockError::HeldByOther {
                        holder: lease.holder.clone(),
                        lease: Some(lease),
                    });
                }
                Err(BackendError::Conflict { holder }) => {
                    info!(document = %id, holder = %holder, "lock held by another worker");
                    return Err(LockError::HeldByOther {
                        holder,
                        lease: None,
                    });
                }
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.backoff(attempt);
                    warn!(
                        document = %id,
                        attempt,
                        "lock attempt failed ({}), retrying in {:?}",
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_transient() => {
                    warn!(document = %id, attempts = attempt, "giving up on lock: {}", err);
                    return Err(LockError::RetriesExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn status(&self, id: &DocumentId) -> Result<LockStatus> {
        Ok(self.backend.lock_status(id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
    }
}
