//! Optimistic-lock retry driver for conditional writes.
//!
//! A write that fails with a version conflict is retried after an exponential
//! backoff with a freshly read token. The candidate value itself is never
//! recomputed against the newer document: the last writer wins.

use std::future::Future;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    config::RetryPolicy,
    dao::storage::{ETag, StorageResult, Versioned},
    error::ServiceError,
};

/// Persist `candidate` guarded by `token`, retrying on version conflicts.
///
/// `write` performs the conditional write and returns the new token;
/// `read_latest` re-reads the stored document to obtain its current token.
/// Conflicts exhaust into [`ServiceError::Conflict`]; any other failure is
/// returned immediately without reading or sleeping.
pub async fn retry_update<T, L, W, WFut, R, RFut>(
    candidate: T,
    token: ETag,
    policy: RetryPolicy,
    mut write: W,
    mut read_latest: R,
) -> Result<Versioned<T>, ServiceError>
where
    T: Clone,
    W: FnMut(T, ETag) -> WFut,
    WFut: Future<Output = StorageResult<ETag>>,
    R: FnMut() -> RFut,
    RFut: Future<Output = StorageResult<Versioned<L>>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut token = token;

    for attempt in 0..attempts {
        match write(candidate.clone(), token.clone()).await {
            Ok(etag) => {
                if attempt > 0 {
                    debug!(attempt, etag = %etag, "write succeeded after retry");
                }
                return Ok(Versioned::new(candidate, etag));
            }
            Err(err) if err.is_version_conflict() => {
                if attempt + 1 == attempts {
                    break;
                }
                let delay = policy.delay_for(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    stale = %token,
                    "version conflict; retrying with latest token"
                );
                sleep(delay).await;
                token = read_latest().await?.etag;
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(attempts, "giving up after repeated version conflicts");
    Err(ServiceError::Conflict { attempts })
}
