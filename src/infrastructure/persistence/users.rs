use crate::domain::entities::{MonitoredUser, UserState};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::user_directory::UserDirectory;
use crate::infrastructure::persistence::Database;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::any::AnyRow;
use sqlx::Row;

// The Any driver cannot decode NULL into Option<String>; never-synced users
// read back as an empty string.
const USER_COLUMNS: &str = "id, email, encrypted_imap_password, is_active, is_monitoring,
     COALESCE(last_sync_time, '') AS last_sync_time";

fn parse_timestamp(value: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

fn user_from_row(row: &AnyRow) -> DomainResult<UserState> {
    let last_sync_time: String = row.try_get("last_sync_time")?;
    Ok(UserState {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        encrypted_imap_password: row.try_get("encrypted_imap_password")?,
        is_active: row.try_get::<i64, _>("is_active")? != 0,
        is_monitoring: row.try_get::<i64, _>("is_monitoring")? != 0,
        last_sync_time: Some(last_sync_time.as_str())
            .filter(|value| !value.is_empty())
            .map(parse_timestamp)
            .transpose()?,
    })
}

// Write paths owned by the account and auth services; kept here for seeding.
impl Database {
    pub async fn create_user(&self, user: &UserState) -> DomainResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, email, encrypted_imap_password, is_active, is_monitoring,
                                last_sync_time, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.encrypted_imap_password)
        .bind(user.is_active as i64)
        .bind(user.is_monitoring as i64)
        .bind(user.last_sync_time.map(|t| t.to_rfc3339()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_active(&self, user_id: &str, active: bool) -> DomainResult<()> {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    pub async fn create_access_token(
        &self,
        token: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO access_tokens (token, user_id, expires_at, created_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for Database {
    async fn list_monitoring_users(&self) -> DomainResult<Vec<MonitoredUser>> {
        let rows = sqlx::query(
            "SELECT id, email FROM users
             WHERE is_active = 1 AND is_monitoring = 1
             ORDER BY email",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(MonitoredUser {
                    id: row.try_get("id")?,
                    email: row.try_get("email")?,
                })
            })
            .collect()
    }

    async fn get_user(&self, user_id: &str) -> DomainResult<Option<UserState>> {
        let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn set_last_sync(&self, user_id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        let result =
            sqlx::query("UPDATE users SET last_sync_time = ?, updated_at = ? WHERE id = ?")
                .bind(at.to_rfc3339())
                .bind(Utc::now().to_rfc3339())
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn set_monitoring(&self, user_id: &str, enabled: bool) -> DomainResult<()> {
        let result = sqlx::query("UPDATE users SET is_monitoring = ?, updated_at = ? WHERE id = ?")
            .bind(enabled as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("User {} not found", user_id)));
        }
        tracing::info!(user_id, enabled, "Monitoring flag updated");
        Ok(())
    }

    async fn get_user_by_token(&self, token: &str) -> DomainResult<Option<UserState>> {
        let row = sqlx::query(
            "SELECT u.id, u.email, u.encrypted_imap_password, u.is_active, u.is_monitoring,
                    COALESCE(u.last_sync_time, '') AS last_sync_time, t.expires_at
             FROM access_tokens t
             JOIN users u ON u.id = t.user_id
             WHERE t.token = ?",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: String = row.try_get("expires_at")?;
        if parse_timestamp(&expires_at)? <= Utc::now() {
            return Ok(None);
        }
        user_from_row(&row).map(Some)
    }
}
