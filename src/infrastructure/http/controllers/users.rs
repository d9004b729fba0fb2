use crate::infrastructure::http::middleware::{ApiResult, AppState, AuthenticatedUser};
use axum::{extract::State, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub total_emails: usize,
    pub unread_emails: usize,
    pub folders_count: usize,
    pub is_monitoring: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// GET /users/me/stats - INBOX counts plus monitoring state
pub async fn my_stats(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<UserStatsResponse>> {
    let summary = state.mailbox_service.summary(&auth_user.user).await?;

    Ok(Json(UserStatsResponse {
        total_emails: summary.total_emails,
        unread_emails: summary.unread_emails,
        folders_count: summary.folders_count,
        is_monitoring: auth_user.user.is_monitoring,
        last_sync_time: auth_user.user.last_sync_time,
    }))
}
