mod helpers;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use futures::StreamExt;
use helpers::*;
use mailsentry::bootstrap::build_application;
use mailsentry::domain::entities::{MailFlag, UserState};
use mailsentry::domain::ports::SpamClassifier;
use mailsentry::infrastructure::http::router::build_router;
use mailsentry::infrastructure::persistence::Database;
use mailsentry::infrastructure::providers::InMemoryMailbox;
use mailsentry::Config;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const TOKEN: &str = "bob-session-token";

struct TestApp {
    router: Router,
    db: Database,
    mailbox: InMemoryMailbox,
    user: UserState,
}

impl TestApp {
    async fn new(classifier: Option<Arc<dyn SpamClassifier>>) -> Self {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "bob@example.com", false).await;
        db.create_access_token(TOKEN, &user.id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();

        let mailbox = InMemoryMailbox::with_folders(&["INBOX", "Spam", "Archive", "Trash"]);
        mailbox.append(
            "INBOX",
            &raw_email("Alice <alice@example.com>", "Agenda", "Items for Monday."),
            vec![],
        );
        mailbox.append(
            "INBOX",
            &raw_email("promo@spam.test", "WINNER prize inside", "Claim now."),
            vec![],
        );

        let config = Config::from_lookup(|name| match name {
            "ENCRYPTION_KEY" => Some(TEST_ENCRYPTION_KEY.to_string()),
            _ => None,
        })
        .unwrap();

        let app = build_application(
            db.clone(),
            &config,
            Arc::new(mailbox.connector()),
            classifier,
            CancellationToken::new(),
        );

        Self {
            router: build_router(app.state),
            db,
            mailbox,
            user,
        }
    }

    async fn with_classifier() -> Self {
        Self::new(Some(Arc::new(MarkerClassifier))).await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(TOKEN), None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(TOKEN), Some(body)).await
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::with_classifier().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["app_name"], "mailsentry");
}

#[tokio::test]
async fn test_protected_routes_require_valid_token() {
    let app = TestApp::with_classifier().await;

    let (status, body) = app.send(Method::GET, "/emails", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = app
        .send(Method::GET, "/monitoring/status", Some("forged"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.db
        .create_access_token("expired", &app.user.id, Utc::now() - Duration::minutes(5))
        .await
        .unwrap();
    let (status, _) = app
        .send(Method::GET, "/monitoring/status", Some("expired"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    app.db.set_active(&app.user.id, false).await.unwrap();
    let (status, _) = app.get("/monitoring/status").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_monitoring_start_and_stop() {
    let app = TestApp::with_classifier().await;

    let (status, body) = app.get("/monitoring/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_monitoring"], false);
    assert_eq!(body["email"], "bob@example.com");
    assert!(body["last_sync_time"].is_null());

    let (status, body) = app.post("/monitoring/start", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_monitoring"], true);

    // Starting twice is harmless.
    let (_, body) = app.post("/monitoring/start", json!({})).await;
    assert_eq!(body["is_monitoring"], true);

    let (_, body) = app.post("/monitoring/stop", json!({})).await;
    assert_eq!(body["is_monitoring"], false);
}

#[tokio::test]
async fn test_sse_requires_active_monitoring() {
    let app = TestApp::with_classifier().await;
    let (status, body) = app.get("/monitoring/sse").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("not active"));
}

#[tokio::test]
async fn test_sse_opens_with_connected_frame() {
    let app = TestApp::with_classifier().await;
    app.post("/monitoring/start", json!({})).await;

    let request = Request::builder()
        .uri("/monitoring/sse")
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let mut body = response.into_body().into_data_stream();
    let chunk = body.next().await.unwrap().unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(text.contains("event: connected"));
    assert!(text.contains("Connected to email monitoring"));
}

#[tokio::test]
async fn test_list_emails_newest_first() {
    let app = TestApp::with_classifier().await;
    let (status, body) = app.get("/emails?folder=INBOX&limit=10").await;

    assert_eq!(status, StatusCode::OK);
    let emails = body.as_array().unwrap();
    assert_eq!(emails.len(), 2);
    assert_eq!(emails[0]["id"], 2);
    assert_eq!(emails[0]["from"], "promo@spam.test");
    assert_eq!(emails[1]["subject"], "Agenda");
    assert_eq!(emails[1]["is_read"], false);
}

#[tokio::test]
async fn test_list_emails_rejects_bad_page() {
    let app = TestApp::with_classifier().await;

    let (status, _) = app.get("/emails?limit=101").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.get("/emails?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_folders() {
    let app = TestApp::with_classifier().await;
    let (status, body) = app.get("/emails/folders/list").await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"INBOX"));
    assert!(names.contains(&"Trash"));
}

#[tokio::test]
async fn test_get_email_includes_spam_score() {
    let app = TestApp::with_classifier().await;

    let (status, body) = app.get("/emails/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"], "WINNER prize inside");
    assert_eq!(body["is_spam"], true);
    assert_eq!(body["confidence"], SPAM_CONFIDENCE);

    let (status, _) = app.get("/emails/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_email_without_classifier_has_no_score() {
    let app = TestApp::new(None).await;

    let (status, body) = app.get("/emails/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject"], "Agenda");
    assert!(body["is_spam"].is_null());
}

#[tokio::test]
async fn test_mark_read_and_unread() {
    let app = TestApp::with_classifier().await;

    let (status, body) = app
        .send(
            Method::PUT,
            "/emails/1/read",
            Some(TOKEN),
            Some(json!({ "is_read": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email marked as read");
    assert_eq!(body["success"], true);
    assert!(app.mailbox.flags("INBOX", 1).unwrap().contains(&MailFlag::Seen));

    let (_, body) = app
        .send(
            Method::PUT,
            "/emails/1/read",
            Some(TOKEN),
            Some(json!({ "is_read": false })),
        )
        .await;
    assert_eq!(body["message"], "Email marked as unread");
    assert!(!app.mailbox.flags("INBOX", 1).unwrap().contains(&MailFlag::Seen));
}

#[tokio::test]
async fn test_move_email() {
    let app = TestApp::with_classifier().await;

    let (status, body) = app
        .post(
            "/emails/1/move?source_folder=INBOX",
            json!({ "dest_folder": "Archive" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email moved to Archive");
    assert_eq!(app.mailbox.message_count("INBOX"), 1);
    assert_eq!(app.mailbox.message_count("Archive"), 1);
}

#[tokio::test]
async fn test_delete_email_goes_to_trash() {
    let app = TestApp::with_classifier().await;

    let (status, body) = app.send(Method::DELETE, "/emails/1", Some(TOKEN), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email deleted successfully");
    assert_eq!(app.mailbox.message_count("INBOX"), 1);
    assert_eq!(app.mailbox.message_count("Trash"), 1);
}

#[tokio::test]
async fn test_confirm_spam() {
    let app = TestApp::with_classifier().await;

    let (status, body) = app
        .post("/emails/2/confirm-spam", json!({ "confirmed": false }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["message"],
        "Spam not confirmed, email remains in current folder"
    );
    assert_eq!(app.mailbox.message_count("INBOX"), 2);
    assert_eq!(app.mailbox.stats().connects, 0);

    let (status, body) = app
        .post("/emails/2/confirm-spam", json!({ "confirmed": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email confirmed as spam and moved to Spam");
    assert_eq!(app.mailbox.message_count("INBOX"), 1);
    assert_eq!(app.mailbox.message_count("Spam"), 1);
}

#[tokio::test]
async fn test_user_stats() {
    let app = TestApp::with_classifier().await;

    let (status, body) = app.get("/users/me/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_emails"], 2);
    assert_eq!(body["unread_emails"], 2);
    assert_eq!(body["folders_count"], 4);
    assert_eq!(body["is_monitoring"], false);
}

#[tokio::test]
async fn test_detect_spam_is_public() {
    let app = TestApp::with_classifier().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/emails/email/detect_spam",
            None,
            Some(json!({ "subject": "You are a WINNER", "body_plain": "Claim today" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_spam"], true);
    assert_eq!(body["confidence"], SPAM_CONFIDENCE);

    let (_, body) = app
        .send(
            Method::POST,
            "/emails/email/detect_spam",
            None,
            Some(json!({ "subject": "Lunch?" })),
        )
        .await;
    assert_eq!(body["is_spam"], false);
}

#[tokio::test]
async fn test_detect_spam_without_model_is_unavailable() {
    let app = TestApp::new(None).await;

    let (status, _) = app
        .send(
            Method::POST,
            "/emails/email/detect_spam",
            None,
            Some(json!({ "subject": "hello" })),
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_unreachable_mail_server_is_bad_gateway() {
    let app = TestApp::with_classifier().await;
    app.mailbox.fail_connect(true);

    let (status, body) = app.get("/emails").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("Connection refused"));
}
