use crate::application::services::MonitoringStatus;
use crate::infrastructure::http::middleware::{ApiResult, AppState, AuthenticatedUser};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;

/// GET /monitoring/sse - live email events for the caller
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let frames = state.notification_stream.open(auth_user.id()).await?;

    // Graceful shutdown waits for open responses; end the stream with the server.
    let shutdown = state.shutdown.clone();
    let stream = frames
        .take_until(async move { shutdown.cancelled().await })
        .map(|frame| Ok(Event::default().event(frame.event).data(frame.data)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /monitoring/status
pub async fn status(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<MonitoringStatus>> {
    let status = state.monitoring_service.status(auth_user.id()).await?;
    Ok(Json(status))
}

/// POST /monitoring/start
pub async fn start(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<MonitoringStatus>> {
    let status = state.monitoring_service.start(auth_user.id()).await?;
    Ok(Json(status))
}

/// POST /monitoring/stop
pub async fn stop(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<MonitoringStatus>> {
    let status = state.monitoring_service.stop(auth_user.id()).await?;
    Ok(Json(status))
}
