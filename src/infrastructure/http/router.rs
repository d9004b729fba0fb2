use crate::infrastructure::http::controllers::{emails, health, monitoring, users};
use crate::infrastructure::http::middleware::{require_auth, AppState};
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    // Build protected routes (require a bearer token)
    let protected = Router::new()
        .route("/monitoring/sse", get(monitoring::event_stream))
        .route("/monitoring/status", get(monitoring::status))
        .route("/monitoring/start", post(monitoring::start))
        .route("/monitoring/stop", post(monitoring::stop))
        .route("/emails", get(emails::list_emails))
        .route("/emails/folders/list", get(emails::list_folders))
        .route(
            "/emails/:id",
            get(emails::get_email).delete(emails::delete_email),
        )
        .route("/emails/:id/read", put(emails::mark_read))
        .route("/emails/:id/move", post(emails::move_email))
        .route("/emails/:id/confirm-spam", post(emails::confirm_spam))
        .route("/users/me/stats", get(users::my_stats))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/emails/email/detect_spam", post(emails::detect_spam))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
