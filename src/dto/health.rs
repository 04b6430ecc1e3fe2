use serde::Serialize;
use utoipa::ToSchema;

/// Payload of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    /// Whether the interaction store is currently reachable. When `false`
    /// the engine keeps serving rooms but rejects stateful operations.
    pub storage: bool,
}

impl HealthResponse {
    /// Fully operational: the store answered its last ping.
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            storage: true,
        }
    }

    /// Degraded mode: no store installed or the backend stopped answering.
    pub fn degraded() -> Self {
        Self {
            status: "degraded".to_string(),
            storage: false,
        }
    }
}
