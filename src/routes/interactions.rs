use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::interaction::{
        AdvanceRequest, CloseRequest, CreateInteractionRequest, CreatedInteraction, DeleteRequest,
        EditContentRequest, InteractionSnapshot, OpenRequest, SessionStatisticsResponse,
    },
    error::AppError,
    services::interaction_service,
    state::SharedState,
};

/// Routes handling the activity lifecycle and aggregated views.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/interactions", post(create_interaction))
        .route(
            "/interactions/{code}",
            get(get_interaction).delete(delete_interaction),
        )
        .route("/interactions/{code}/open", post(open_interaction))
        .route("/interactions/{code}/advance", post(advance_interaction))
        .route("/interactions/{code}/close", post(close_interaction))
        .route(
            "/interactions/{code}/content",
            put(edit_interaction_content),
        )
        .route(
            "/interactions/{code}/sessions/{session}",
            delete(delete_session),
        )
        .route(
            "/interactions/{code}/sessions/{session}/statistics",
            get(session_statistics),
        )
}

/// Create a fresh activity under a newly allocated join code.
#[utoipa::path(
    post,
    path = "/interactions",
    tag = "interactions",
    request_body = CreateInteractionRequest,
    responses(
        (status = 201, description = "Activity created", body = CreatedInteraction),
        (status = 409, description = "No free activity code could be allocated")
    )
)]
pub async fn create_interaction(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateInteractionRequest>>,
) -> Result<(StatusCode, Json<CreatedInteraction>), AppError> {
    let created = interaction_service::create(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Public snapshot of an activity; the access secret is never included.
#[utoipa::path(
    get,
    path = "/interactions/{code}",
    tag = "interactions",
    params(("code" = u32, Path, description = "Seven-digit activity code")),
    responses(
        (status = 200, description = "Current activity state", body = InteractionSnapshot),
        (status = 404, description = "Unknown activity code")
    )
)]
pub async fn get_interaction(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
) -> Result<Json<InteractionSnapshot>, AppError> {
    let snapshot = interaction_service::snapshot(&state, code).await?;
    Ok(Json(snapshot))
}

/// Open the current session of an activity.
#[utoipa::path(
    post,
    path = "/interactions/{code}/open",
    tag = "interactions",
    params(("code" = u32, Path, description = "Seven-digit activity code")),
    request_body = OpenRequest,
    responses(
        (status = 204, description = "Session opened"),
        (status = 401, description = "Credentials do not control this activity")
    )
)]
pub async fn open_interaction(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
    Valid(Json(payload)): Valid<Json<OpenRequest>>,
) -> Result<StatusCode, AppError> {
    interaction_service::open(&state, code, &payload.credentials).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move the displayed question of an open activity.
#[utoipa::path(
    post,
    path = "/interactions/{code}/advance",
    tag = "interactions",
    params(("code" = u32, Path, description = "Seven-digit activity code")),
    request_body = AdvanceRequest,
    responses(
        (status = 204, description = "Pointer moved"),
        (status = 409, description = "Activity is not open")
    )
)]
pub async fn advance_interaction(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
    Valid(Json(payload)): Valid<Json<AdvanceRequest>>,
) -> Result<StatusCode, AppError> {
    interaction_service::advance(&state, code, &payload.credentials, payload.pointer).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Close the current session of an activity.
#[utoipa::path(
    post,
    path = "/interactions/{code}/close",
    tag = "interactions",
    params(("code" = u32, Path, description = "Seven-digit activity code")),
    request_body = CloseRequest,
    responses(
        (status = 204, description = "Session closed"),
        (status = 409, description = "Activity is not open")
    )
)]
pub async fn close_interaction(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
    Valid(Json(payload)): Valid<Json<CloseRequest>>,
) -> Result<StatusCode, AppError> {
    interaction_service::close(&state, code, &payload.credentials, payload.ranking).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the title and content of an activity.
#[utoipa::path(
    put,
    path = "/interactions/{code}/content",
    tag = "interactions",
    params(("code" = u32, Path, description = "Seven-digit activity code")),
    request_body = EditContentRequest,
    responses(
        (status = 204, description = "Content replaced"),
        (status = 400, description = "Payload changes the activity kind")
    )
)]
pub async fn edit_interaction_content(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
    Valid(Json(payload)): Valid<Json<EditContentRequest>>,
) -> Result<StatusCode, AppError> {
    interaction_service::edit_content(
        &state,
        code,
        &payload.credentials,
        payload.title,
        payload.content,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete an activity record and its media files.
#[utoipa::path(
    delete,
    path = "/interactions/{code}",
    tag = "interactions",
    params(("code" = u32, Path, description = "Seven-digit activity code")),
    request_body = DeleteRequest,
    responses(
        (status = 204, description = "Activity deleted"),
        (status = 404, description = "Unknown activity code")
    )
)]
pub async fn delete_interaction(
    State(state): State<SharedState>,
    Path(code): Path<u32>,
    Valid(Json(payload)): Valid<Json<DeleteRequest>>,
) -> Result<StatusCode, AppError> {
    interaction_service::delete(&state, code, &payload.credentials).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Drop one past session from the activity history.
#[utoipa::path(
    delete,
    path = "/interactions/{code}/sessions/{session}",
    tag = "interactions",
    params(
        ("code" = u32, Path, description = "Seven-digit activity code"),
        ("session" = u32, Path, description = "Session number to forget")
    ),
    request_body = DeleteRequest,
    responses((status = 204, description = "Session history deleted"))
)]
pub async fn delete_session(
    State(state): State<SharedState>,
    Path((code, session)): Path<(u32, u32)>,
    Valid(Json(payload)): Valid<Json<DeleteRequest>>,
) -> Result<StatusCode, AppError> {
    interaction_service::delete_session_history(&state, code, &payload.credentials, session)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Aggregated statistics of one session.
#[utoipa::path(
    get,
    path = "/interactions/{code}/sessions/{session}/statistics",
    tag = "interactions",
    params(
        ("code" = u32, Path, description = "Seven-digit activity code"),
        ("session" = u32, Path, description = "Session number to aggregate")
    ),
    responses(
        (status = 200, description = "Aggregated session view", body = SessionStatisticsResponse),
        (status = 404, description = "Unknown activity code")
    )
)]
pub async fn session_statistics(
    State(state): State<SharedState>,
    Path((code, session)): Path<(u32, u32)>,
) -> Result<Json<SessionStatisticsResponse>, AppError> {
    let statistics = interaction_service::session_statistics(&state, code, session).await?;
    Ok(Json(statistics))
}
