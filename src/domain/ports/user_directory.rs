use crate::domain::entities::{MonitoredUser, UserState};
use crate::domain::errors::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Users with both `is_active` and `is_monitoring` set.
    async fn list_monitoring_users(&self) -> DomainResult<Vec<MonitoredUser>>;

    async fn get_user(&self, user_id: &str) -> DomainResult<Option<UserState>>;

    async fn set_last_sync(&self, user_id: &str, at: DateTime<Utc>) -> DomainResult<()>;

    async fn set_monitoring(&self, user_id: &str, enabled: bool) -> DomainResult<()>;

    /// Resolve a bearer token; expired or unknown tokens yield `None`.
    async fn get_user_by_token(&self, token: &str) -> DomainResult<Option<UserState>>;
}
