use crate::application::services::{
    MailboxService, MonitorSettings, MonitoringJob, MonitoringService, NotificationStreamService,
};
use crate::config::Config;
use crate::domain::ports::{
    CredentialStore, EventBus, MailConnector, SpamClassifier, TaskSpawner, UserDirectory,
};
use crate::infrastructure::classifier::PretrainedSpamClassifier;
use crate::infrastructure::events::LocalEventBus;
use crate::infrastructure::http::middleware::AppState;
use crate::infrastructure::persistence::Database;
use crate::infrastructure::providers::{ImapConnector, ImapSettings};
use crate::infrastructure::runtime::tokio::TokioTaskSpawner;
use crate::infrastructure::security::AesGcmCredentialStore;
use crate::infrastructure::workers::MonitorScheduler;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Application {
    pub state: AppState,
    /// Absent when no spam model could be loaded.
    pub scheduler: Option<MonitorScheduler>,
}

/// Load the configured model. A failure disables classification, not the process.
pub fn load_classifier(config: &Config) -> Option<Arc<dyn SpamClassifier>> {
    match PretrainedSpamClassifier::load_from_dir(&config.models_dir, config.model_type) {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            tracing::error!(
                model_type = %config.model_type,
                "Spam classifier unavailable, monitoring disabled: {}",
                e
            );
            None
        }
    }
}

pub fn build_connector(config: &Config) -> Arc<dyn MailConnector> {
    if !config.imap_use_tls {
        tracing::warn!("IMAP_USE_TLS=false is not supported; mailbox connections will fail");
    }
    Arc::new(ImapConnector::new(ImapSettings {
        host: config.imap_host.clone(),
        port: config.imap_port,
        use_tls: config.imap_use_tls,
        command_timeout: config.imap_command_timeout,
    }))
}

/// Wire services over `db` and the given mail connector.
pub fn build_application(
    db: Database,
    config: &Config,
    connector: Arc<dyn MailConnector>,
    classifier: Option<Arc<dyn SpamClassifier>>,
    shutdown: CancellationToken,
) -> Application {
    let directory: Arc<dyn UserDirectory> = Arc::new(db);
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(AesGcmCredentialStore::new(&config.encryption_key));

    let event_bus: Arc<dyn EventBus> = Arc::new(LocalEventBus::new(config.event_bus_capacity));
    tracing::info!(
        capacity = config.event_bus_capacity,
        "Event bus initialized"
    );

    let scheduler = classifier.clone().map(|classifier| {
        let job = MonitoringJob::new(
            directory.clone(),
            credentials.clone(),
            connector.clone(),
            classifier,
            event_bus.clone(),
            MonitorSettings {
                spam_folder: config.spam_folder.clone(),
                batch_limit: config.batch_limit,
                job_timeout: config.job_timeout,
                close_timeout: config.imap_command_timeout,
            },
        );
        let spawner: Arc<dyn TaskSpawner> = Arc::new(TokioTaskSpawner::new());
        MonitorScheduler::new(
            directory.clone(),
            job,
            spawner,
            config.check_interval,
            config.max_concurrent_jobs,
        )
    });

    let mailbox_service = MailboxService::new(credentials, connector, classifier)
        .with_trash_folder(config.trash_folder.clone());

    let state = AppState {
        app_name: config.service_name.clone(),
        directory: directory.clone(),
        monitoring_service: MonitoringService::new(directory.clone()),
        notification_stream: NotificationStreamService::new(directory, event_bus),
        mailbox_service,
        shutdown,
    };

    Application { state, scheduler }
}
