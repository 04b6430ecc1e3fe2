use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Livepoll Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::interactions::create_interaction,
        crate::routes::interactions::get_interaction,
        crate::routes::interactions::open_interaction,
        crate::routes::interactions::advance_interaction,
        crate::routes::interactions::close_interaction,
        crate::routes::interactions::edit_interaction_content,
        crate::routes::interactions::delete_interaction,
        crate::routes::interactions::delete_session,
        crate::routes::interactions::session_statistics,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::interaction::CreateInteractionRequest,
            crate::dto::interaction::CreatedInteraction,
            crate::dto::interaction::InteractionSnapshot,
            crate::dto::interaction::SessionStatisticsResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::state::interaction::ActivityContent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "interactions", description = "Activity lifecycle and aggregation"),
        (name = "rooms", description = "WebSocket operations for activity rooms"),
    )
)]
pub struct ApiDoc;
