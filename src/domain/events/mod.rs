use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailEventType {
    NewEmail,
    SpamDetected,
    Error,
}

impl EmailEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailEventType::NewEmail => "new_email",
            EmailEventType::SpamDetected => "spam_detected",
            EmailEventType::Error => "error",
        }
    }
}

/// Unit flowing through the event bus. Immutable once published.
///
/// `user_id` addresses the channel and is not part of the wire payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailEvent {
    pub event_type: EmailEventType,
    #[serde(skip)]
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(rename = "from", skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_spam: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EmailEvent {
    fn base(event_type: EmailEventType, user_id: &str) -> Self {
        Self {
            event_type,
            user_id: user_id.to_string(),
            email_id: None,
            subject: None,
            from_address: None,
            is_spam: None,
            confidence: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn new_email(user_id: &str, email_id: u32, subject: String, from: String) -> Self {
        Self {
            email_id: Some(email_id),
            subject: Some(subject),
            from_address: Some(from),
            is_spam: Some(false),
            ..Self::base(EmailEventType::NewEmail, user_id)
        }
    }

    pub fn spam_detected(
        user_id: &str,
        email_id: u32,
        subject: String,
        from: String,
        confidence: f64,
    ) -> Self {
        Self {
            email_id: Some(email_id),
            subject: Some(subject),
            from_address: Some(from),
            confidence: Some(confidence),
            ..Self::base(EmailEventType::SpamDetected, user_id)
        }
    }

    pub fn error(user_id: &str, email_id: Option<u32>, error: impl Into<String>) -> Self {
        Self {
            email_id,
            error: Some(error.into()),
            ..Self::base(EmailEventType::Error, user_id)
        }
    }
}
