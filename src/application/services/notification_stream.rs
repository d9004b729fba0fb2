use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::EmailEvent;
use crate::domain::ports::{EventBus, UserDirectory};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::json;
use std::sync::Arc;

pub const CONNECTED_EVENT: &str = "connected";
pub const EMAIL_EVENT: &str = "email_event";
pub const ERROR_EVENT: &str = "error";

/// One server-sent frame: `event: <event>` / `data: <data>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub event: &'static str,
    pub data: String,
}

impl StreamFrame {
    fn connected(user_id: &str) -> Self {
        Self {
            event: CONNECTED_EVENT,
            data: json!({
                "message": "Connected to email monitoring",
                "user_id": user_id,
            })
            .to_string(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            event: ERROR_EVENT,
            data: json!({ "error": message.into() }).to_string(),
        }
    }

    fn from_event(event: &EmailEvent) -> Self {
        match serde_json::to_string(event) {
            Ok(data) => Self {
                event: EMAIL_EVENT,
                data,
            },
            Err(e) => {
                tracing::error!("Failed to serialize email event: {}", e);
                Self::error(format!("Failed to serialize event: {}", e))
            }
        }
    }
}

/// Keeps the connection gauge honest; the stream owns it and drops it on
/// disconnect.
struct ConnectionGuard {
    user_id: String,
}

impl ConnectionGuard {
    fn new(user_id: &str) -> Self {
        metrics::gauge!("mailsentry_stream_connections").increment(1.0);
        tracing::info!(user_id, "Notification stream opened");
        Self {
            user_id: user_id.to_string(),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        metrics::gauge!("mailsentry_stream_connections").decrement(1.0);
        tracing::info!(user_id = %self.user_id, "Notification stream closed");
    }
}

/// Turns a user's event channel into a live frame stream.
#[derive(Clone)]
pub struct NotificationStreamService {
    directory: Arc<dyn UserDirectory>,
    event_bus: Arc<dyn EventBus>,
}

impl NotificationStreamService {
    pub fn new(directory: Arc<dyn UserDirectory>, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            directory,
            event_bus,
        }
    }

    /// Open a stream for `user_id`.
    ///
    /// Rejected with `Forbidden` before subscribing when monitoring is off.
    /// The first frame is always `connected`; every later frame is an event
    /// published after this call returned, in publish order. A subscriber that
    /// falls behind gets an inline `error` frame and keeps streaming. Dropping
    /// the stream unsubscribes.
    pub async fn open(&self, user_id: &str) -> DomainResult<BoxStream<'static, StreamFrame>> {
        let user = self
            .directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", user_id)))?;

        if !user.is_monitoring {
            return Err(DomainError::Forbidden(
                "Email monitoring is not active for this user".to_string(),
            ));
        }

        let subscription = self.event_bus.subscribe(user_id);
        let guard = ConnectionGuard::new(user_id);

        let events = subscription.map(move |item| {
            let _connection = &guard;
            match item {
                Ok(event) => StreamFrame::from_event(&event),
                Err(skipped) => StreamFrame::error(format!(
                    "Stream fell behind; {} events were skipped",
                    skipped
                )),
            }
        });

        Ok(stream::once(async move { StreamFrame::connected(&user.id) })
            .chain(events)
            .boxed())
    }
}
