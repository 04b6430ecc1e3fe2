use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report whether the engine can currently persist interactions.
///
/// Degraded mode covers both a missing store (supervisor still connecting)
/// and an installed backend that stopped answering pings.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage_ok = match state.store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        None => {
            warn!("no storage backend installed (degraded mode)");
            false
        }
    };

    if storage_ok && !state.is_degraded().await {
        HealthResponse::ok()
    } else {
        HealthResponse::degraded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig, dao::interaction_store::memory::MemoryStore, state::AppState,
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn health_reflects_store_availability() {
        let state = AppState::new(AppConfig::default());
        let degraded = health_status(&state).await;
        assert_eq!(degraded.status, "degraded");
        assert!(!degraded.storage);

        state.install_store(Arc::new(MemoryStore::new())).await;
        let healthy = health_status(&state).await;
        assert_eq!(healthy.status, "ok");
        assert!(healthy.storage);
    }
}
