use crate::application::services::ScoredMessage;
use crate::domain::entities::{FolderInfo, MessageMetadata, INBOX, MAX_PAGE_SIZE};
use crate::domain::ports::SpamScore;
use crate::infrastructure::http::controllers::MessageResponse;
use crate::infrastructure::http::middleware::{ApiError, ApiResult, AppState, AuthenticatedUser};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;

fn default_folder() -> String {
    INBOX.to_string()
}

fn default_limit() -> i64 {
    50
}

fn default_spam_folder() -> String {
    "Spam".to_string()
}

// Request DTOs
#[derive(Debug, Deserialize)]
pub struct ListEmailsQuery {
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub only_unread: bool,
}

#[derive(Debug, Deserialize)]
pub struct FolderQuery {
    #[serde(default = "default_folder")]
    pub folder: String,
}

#[derive(Debug, Deserialize)]
pub struct SourceFolderQuery {
    #[serde(default = "default_folder")]
    pub source_folder: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub is_read: bool,
}

#[derive(Debug, Deserialize)]
pub struct MoveEmailRequest {
    pub dest_folder: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmSpamRequest {
    pub confirmed: bool,
    #[serde(default = "default_spam_folder")]
    pub dest_folder: String,
}

#[derive(Debug, Deserialize)]
pub struct SpamDetectionRequest {
    pub subject: String,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
}

fn validate_page(query: &ListEmailsQuery) -> ApiResult<(usize, usize)> {
    if query.limit < 1 || query.limit > MAX_PAGE_SIZE as i64 {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }
    if query.offset < 0 {
        return Err(ApiError::BadRequest("offset must not be negative".to_string()));
    }
    Ok((query.limit as usize, query.offset as usize))
}

/// GET /emails - page through a folder, newest first
pub async fn list_emails(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Query(query): Query<ListEmailsQuery>,
) -> ApiResult<Json<Vec<MessageMetadata>>> {
    let (limit, offset) = validate_page(&query)?;
    let emails = state
        .mailbox_service
        .list_emails(
            &auth_user.user,
            &query.folder,
            limit,
            offset,
            query.only_unread,
        )
        .await?;
    Ok(Json(emails))
}

/// GET /emails/folders/list
pub async fn list_folders(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
) -> ApiResult<Json<Vec<FolderInfo>>> {
    let folders = state.mailbox_service.list_folders(&auth_user.user).await?;
    Ok(Json(folders))
}

/// GET /emails/:id
pub async fn get_email(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(email_id): Path<u32>,
    Query(query): Query<FolderQuery>,
) -> ApiResult<Json<ScoredMessage>> {
    let email = state
        .mailbox_service
        .get_email(&auth_user.user, &query.folder, email_id)
        .await?;
    Ok(Json(email))
}

/// PUT /emails/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(email_id): Path<u32>,
    Query(query): Query<FolderQuery>,
    Json(request): Json<MarkReadRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .mailbox_service
        .mark_read(&auth_user.user, &query.folder, email_id, request.is_read)
        .await?;

    let status = if request.is_read { "read" } else { "unread" };
    Ok(Json(MessageResponse::ok(format!("Email marked as {}", status))))
}

/// POST /emails/:id/move
pub async fn move_email(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(email_id): Path<u32>,
    Query(query): Query<SourceFolderQuery>,
    Json(request): Json<MoveEmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .mailbox_service
        .move_email(
            &auth_user.user,
            email_id,
            &query.source_folder,
            &request.dest_folder,
        )
        .await?;
    Ok(Json(MessageResponse::ok(format!(
        "Email moved to {}",
        request.dest_folder
    ))))
}

/// DELETE /emails/:id - move to Trash, or expunge when there is none
pub async fn delete_email(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(email_id): Path<u32>,
    Query(query): Query<FolderQuery>,
) -> ApiResult<Json<MessageResponse>> {
    state
        .mailbox_service
        .delete_email(&auth_user.user, &query.folder, email_id)
        .await?;
    Ok(Json(MessageResponse::ok("Email deleted successfully")))
}

/// POST /emails/:id/confirm-spam
pub async fn confirm_spam(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(email_id): Path<u32>,
    Query(query): Query<SourceFolderQuery>,
    Json(request): Json<ConfirmSpamRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let message = state
        .mailbox_service
        .confirm_spam(
            &auth_user.user,
            email_id,
            &query.source_folder,
            request.confirmed,
            &request.dest_folder,
        )
        .await?;
    Ok(Json(MessageResponse::ok(message)))
}

/// POST /emails/email/detect_spam - score arbitrary text
pub async fn detect_spam(
    State(state): State<AppState>,
    Json(request): Json<SpamDetectionRequest>,
) -> ApiResult<Json<SpamScore>> {
    let score = state.mailbox_service.detect_spam(
        &request.subject,
        request.body_plain.as_deref(),
        request.body_html.as_deref(),
    )?;
    Ok(Json(score))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(limit: i64, offset: i64) -> ListEmailsQuery {
        ListEmailsQuery {
            folder: default_folder(),
            limit,
            offset,
            only_unread: false,
        }
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(validate_page(&query(50, 0)).unwrap(), (50, 0));
        assert_eq!(validate_page(&query(100, 7)).unwrap(), (100, 7));
        assert!(validate_page(&query(0, 0)).is_err());
        assert!(validate_page(&query(101, 0)).is_err());
        assert!(validate_page(&query(10, -1)).is_err());
    }
}
