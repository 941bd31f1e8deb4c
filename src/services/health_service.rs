use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the installed store and report whether game requests can be served.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let Ok(store) = state.require_game_store().await else {
        warn!("health probe skipped: no storage installed (degraded mode)");
        return HealthResponse::degraded(false);
    };

    match store.health_check().await {
        Ok(()) => HealthResponse::ok(),
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            HealthResponse::degraded(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::game_store::memory::MemoryGameStore, state::AppState};

    #[tokio::test]
    async fn reports_ok_with_reachable_store() {
        let state = AppState::with_store(AppConfig::default(), Arc::new(MemoryGameStore::new())).await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert!(health.storage_reachable);
    }

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new(AppConfig::default());
        let health = health_status(&state).await;
        assert_eq!(health.status, "degraded");
        assert!(!health.storage_reachable);
    }

    #[tokio::test]
    async fn reports_degraded_when_probe_fails() {
        let store = MemoryGameStore::new();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;
        store.set_available(false);
        assert_eq!(health_status(&state).await.status, "degraded");
    }
}
