//! Background task owning the storage connection and the degraded flag.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, install it, and keep the shared state in
/// degraded mode whenever it is unreachable. Never returns.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_store(&state, store.as_ref()).await;

                state.clear_game_store().await;
                warn!("exhausted storage reconnect attempts; dropping store and reconnecting");
            }
            Err(err) => {
                warn!(error = %err, delay_ms = delay.as_millis() as u64, "storage connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = next_delay(delay);
    }
}

/// Poll the installed store until it fails and cannot be revived.
async fn watch_store(state: &SharedState, store: &dyn GameStore) {
    loop {
        sleep(HEALTH_POLL_INTERVAL).await;
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !reconnect(state, store).await {
                    return;
                }
            }
        }
    }
}

/// Try to revive the current store; degraded mode is entered on the first failure.
async fn reconnect(state: &SharedState, store: &dyn GameStore) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded");
                state.update_degraded(false).await;
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "storage reconnect failed; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "storage reconnect attempt failed");
                }
                sleep(delay).await;
                delay = next_delay(delay);
            }
        }
    }

    false
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::{AtomicU32, Ordering},
    };

    use super::*;
    use crate::{config::AppConfig, dao::game_store::memory::MemoryGameStore, state::AppState};

    fn connector(
        store: MemoryGameStore,
    ) -> impl FnMut() -> futures::future::BoxFuture<'static, Result<Arc<dyn GameStore>, StorageError>>
    + Send
    + 'static {
        move || {
            let store = store.clone();
            Box::pin(async move {
                store.health_check().await?;
                Ok(Arc::new(store) as Arc<dyn GameStore>)
            })
        }
    }

    #[test]
    fn backoff_doubles_up_to_ten_seconds() {
        let delays: Vec<_> = std::iter::successors(Some(INITIAL_DELAY), |delay| {
            Some(next_delay(*delay))
        })
        .take(6)
        .map(|delay| delay.as_secs())
        .collect();
        assert_eq!(delays, [1, 2, 4, 8, 10, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn installs_store_and_tracks_outages() {
        let store = MemoryGameStore::new();
        let state = AppState::new(AppConfig::default());
        let mut degraded = state.degraded_watcher();
        assert!(state.is_degraded().await);

        let task = tokio::spawn(run(state.clone(), connector(store.clone())));

        degraded.wait_for(|value| !*value).await.unwrap();
        assert!(state.require_game_store().await.is_ok());

        store.set_available(false);
        degraded.wait_for(|value| *value).await.unwrap();
        assert!(state.require_game_store().await.is_err());

        store.set_available(true);
        degraded.wait_for(|value| !*value).await.unwrap();
        assert!(state.require_game_store().await.is_ok());

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn drops_store_after_failed_reconnects() {
        let store = MemoryGameStore::new();
        let state = AppState::new(AppConfig::default());
        let mut degraded = state.degraded_watcher();
        let task = tokio::spawn(run(state.clone(), connector(store.clone())));

        degraded.wait_for(|value| !*value).await.unwrap();
        store.set_available(false);

        let mut polls = 0;
        while state.game_store().await.is_some() {
            polls += 1;
            assert!(polls < 100, "store was never dropped");
            sleep(Duration::from_millis(500)).await;
        }
        assert!(state.is_degraded().await);

        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connects_back_off() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let state = AppState::new(AppConfig::default());

        let task = tokio::spawn(run(state.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<Arc<dyn GameStore>, _>(StorageError::unavailable(
                    "connect".into(),
                    io::Error::other("refused"),
                ))
            }
        }));

        // Attempts at 0s, 1s, 3s and 7s; the next one waits for 15s.
        sleep(Duration::from_millis(7_500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert!(state.is_degraded().await);

        task.abort();
    }
}
