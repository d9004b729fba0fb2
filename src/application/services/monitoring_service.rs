use crate::domain::entities::UserState;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::UserDirectory;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MonitoringStatus {
    pub is_monitoring: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub email: String,
}

impl From<&UserState> for MonitoringStatus {
    fn from(user: &UserState) -> Self {
        Self {
            is_monitoring: user.is_monitoring,
            last_sync_time: user.last_sync_time,
            email: user.email.clone(),
        }
    }
}

/// Per-user monitoring switch; the scheduler picks the change up on its next tick.
#[derive(Clone)]
pub struct MonitoringService {
    directory: Arc<dyn UserDirectory>,
}

impl MonitoringService {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    pub async fn status(&self, user_id: &str) -> DomainResult<MonitoringStatus> {
        let user = self.load(user_id).await?;
        Ok(MonitoringStatus::from(&user))
    }

    pub async fn start(&self, user_id: &str) -> DomainResult<MonitoringStatus> {
        self.set(user_id, true).await
    }

    pub async fn stop(&self, user_id: &str) -> DomainResult<MonitoringStatus> {
        self.set(user_id, false).await
    }

    async fn set(&self, user_id: &str, enabled: bool) -> DomainResult<MonitoringStatus> {
        self.directory.set_monitoring(user_id, enabled).await?;
        self.status(user_id).await
    }

    async fn load(&self, user_id: &str) -> DomainResult<UserState> {
        self.directory
            .get_user(user_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("User {} not found", user_id)))
    }
}
