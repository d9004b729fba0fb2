use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monitoring-relevant view of an account owned by the user-account service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub encrypted_imap_password: String,
    pub is_active: bool,
    pub is_monitoring: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
}

impl UserState {
    pub fn new(email: String, encrypted_imap_password: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email,
            encrypted_imap_password,
            is_active: true,
            is_monitoring: false,
            last_sync_time: None,
        }
    }

    /// A monitoring job may only start when both flags hold.
    pub fn can_be_monitored(&self) -> bool {
        self.is_active && self.is_monitoring
    }
}

/// Row returned by the scheduler's directory query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredUser {
    pub id: String,
    pub email: String,
}

impl From<&UserState> for MonitoredUser {
    fn from(user: &UserState) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_not_monitored() {
        let user = UserState::new("bob@example.com".to_string(), "secret".to_string());
        assert!(user.is_active);
        assert!(!user.can_be_monitored());
        assert!(user.last_sync_time.is_none());
    }

    #[test]
    fn test_inactive_user_cannot_be_monitored() {
        let mut user = UserState::new("bob@example.com".to_string(), "secret".to_string());
        user.is_monitoring = true;
        assert!(user.can_be_monitored());

        user.is_active = false;
        assert!(!user.can_be_monitored());
    }

    #[test]
    fn test_credential_is_never_serialized() {
        let user = UserState::new("bob@example.com".to_string(), "ciphertext".to_string());
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("ciphertext"));
    }
}
