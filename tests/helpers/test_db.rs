use mailsentry::domain::entities::UserState;
use mailsentry::infrastructure::persistence::Database;
use mailsentry::infrastructure::security::AesGcmCredentialStore;
use uuid::Uuid;

pub const TEST_ENCRYPTION_KEY: &str =
    "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

pub async fn setup_test_db() -> Database {
    // Install drivers for AnyPool (required for tests)
    sqlx::any::install_default_drivers();

    // File-based SQLite, unique per test for parallel execution
    let temp_file = std::env::temp_dir().join(format!("mailsentry_test_{}.db", Uuid::new_v4()));
    let db_url = format!("sqlite://{}?mode=rwc", temp_file.display());

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");

    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    db
}

pub fn credential_store() -> AesGcmCredentialStore {
    AesGcmCredentialStore::new(TEST_ENCRYPTION_KEY)
}

/// Insert an active user whose mailbox password is `imap-pass`.
pub async fn create_test_user(db: &Database, email: &str, is_monitoring: bool) -> UserState {
    let encrypted = credential_store()
        .encrypt("imap-pass")
        .expect("Failed to encrypt test password");

    let mut user = UserState::new(email.to_string(), encrypted);
    user.is_monitoring = is_monitoring;

    db.create_user(&user)
        .await
        .expect("Failed to create test user");
    user
}
