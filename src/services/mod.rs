/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Activity lifecycle orchestration.
pub mod interaction_service;
/// Media file ownership and cleanup.
pub mod media;
/// Response ingestion and response-list mutations.
pub mod response_service;
/// Storage connection supervision.
pub mod storage_supervisor;
/// WebSocket connection and message handling service.
pub mod ws_service;
