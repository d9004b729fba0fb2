use futures::{FutureExt, StreamExt};
use mailsentry::application::services::{MonitorSettings, MonitoringJob};
use mailsentry::domain::errors::{DomainError, DomainResult};
use mailsentry::domain::events::EmailEvent;
use mailsentry::domain::ports::{EventBus, EventStream, SpamClassifier, SpamScore};
use mailsentry::infrastructure::events::LocalEventBus;
use mailsentry::infrastructure::persistence::Database;
use mailsentry::infrastructure::providers::InMemoryMailbox;
use std::sync::Arc;
use std::time::Duration;

use super::test_db::credential_store;

/// Subjects containing this are scored as spam.
pub const SPAM_MARKER: &str = "WINNER";
/// Subjects containing this make the classifier fail.
pub const UNSCORABLE_MARKER: &str = "UNSCORABLE";
pub const SPAM_CONFIDENCE: f64 = 0.92;

pub fn raw_email(from: &str, subject: &str, body: &str) -> String {
    format!(
        "From: {}\r\nTo: bob@example.com\r\nSubject: {}\r\nDate: Mon, 6 May 2024 10:00:00 +0000\r\nMessage-ID: <{}@example.com>\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
        from,
        subject,
        subject.replace(' ', "."),
        body
    )
}

/// Deterministic stand-in for the trained model.
pub struct MarkerClassifier;

impl SpamClassifier for MarkerClassifier {
    fn score_text(&self, text: &str) -> DomainResult<SpamScore> {
        if text.contains(UNSCORABLE_MARKER) {
            return Err(DomainError::Classification("cannot score".to_string()));
        }
        let is_spam = text.contains(SPAM_MARKER);
        Ok(SpamScore {
            is_spam,
            confidence: if is_spam { SPAM_CONFIDENCE } else { 0.85 },
        })
    }
}

pub fn test_settings() -> MonitorSettings {
    MonitorSettings {
        spam_folder: "Spam".to_string(),
        batch_limit: 100,
        job_timeout: Duration::from_secs(5),
        close_timeout: Duration::from_secs(1),
    }
}

pub fn monitoring_job(
    db: &Database,
    mailbox: &InMemoryMailbox,
    bus: Arc<LocalEventBus>,
    settings: MonitorSettings,
) -> MonitoringJob {
    MonitoringJob::new(
        Arc::new(db.clone()),
        Arc::new(credential_store()),
        Arc::new(mailbox.connector()),
        Arc::new(MarkerClassifier),
        bus as Arc<dyn EventBus>,
        settings,
    )
}

/// Everything already buffered on the subscription, without waiting.
pub fn drain_events(stream: &mut EventStream) -> Vec<EmailEvent> {
    let mut events = Vec::new();
    while let Some(Some(item)) = stream.next().now_or_never() {
        events.push(item.expect("subscriber lagged"));
    }
    events
}
