use crate::application::services::{
    MailboxService, MonitoringService, NotificationStreamService,
};
use crate::domain::entities::UserState;
use crate::domain::ports::UserDirectory;
use crate::infrastructure::http::middleware::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub directory: Arc<dyn UserDirectory>,
    pub monitoring_service: MonitoringService,
    pub notification_stream: NotificationStreamService,
    pub mailbox_service: MailboxService,
    /// Cancelled on process shutdown; ends open event streams.
    pub shutdown: CancellationToken,
}

/// Caller resolved from the bearer token.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user: UserState,
}

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.user.id
    }
}

/// Resolve `Authorization: Bearer <token>` to an active user. Tokens are issued
/// elsewhere; this only looks them up.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::Unauthorized)?;

    let user = state
        .directory
        .get_user_by_token(token)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    if !user.is_active {
        tracing::debug!(user_id = %user.id, "Rejected request from inactive user");
        return Err(ApiError::Unauthorized);
    }

    request.extensions_mut().insert(AuthenticatedUser { user });
    Ok(next.run(request).await)
}
