use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Whether the storage backend answered its last probe.
    pub storage_reachable: bool,
}

impl HealthResponse {
    /// Storage installed and answering.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            storage_reachable: true,
        }
    }

    /// No storage installed, or the installed one failed its probe.
    pub fn degraded(storage_reachable: bool) -> Self {
        Self {
            status: "degraded".to_string(),
            storage_reachable,
        }
    }
}
