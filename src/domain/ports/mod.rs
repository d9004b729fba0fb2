pub mod credential_store;
pub mod event_bus;
pub mod mail_transport;
pub mod spam_classifier;
pub mod task_spawner;
pub mod user_directory;

pub use credential_store::CredentialStore;
pub use event_bus::{EventBus, EventStream};
pub use mail_transport::{MailConnector, MailTransport};
pub use spam_classifier::{SpamClassifier, SpamScore};
pub use task_spawner::TaskSpawner;
pub use user_directory::UserDirectory;
