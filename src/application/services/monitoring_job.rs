use crate::application::services::mail_session::MailSession;
use crate::domain::entities::{MessageMetadata, UserState, INBOX};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::EmailEvent;
use crate::domain::ports::{
    CredentialStore, EventBus, MailConnector, SpamClassifier, UserDirectory,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub spam_folder: String,
    /// Unread messages examined per run; capped at 100 by the session.
    pub batch_limit: usize,
    /// Overall deadline for open + scan + classify + relocate.
    pub job_timeout: Duration,
    /// Bound on the final logout, which runs after the deadline too.
    pub close_timeout: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            spam_folder: "Spam".to_string(),
            batch_limit: 100,
            job_timeout: Duration::from_secs(300),
            close_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    pub new_emails: usize,
    pub spam_moved: usize,
    /// Spam whose relocation failed; left in INBOX for the next run.
    pub spam_unmoved: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// User missing, inactive or not monitoring. Nothing was touched.
    Skipped,
    Completed(JobReport),
}

/// One scan of one user's INBOX.
///
/// Safe to run again after any partial failure: unread messages are simply
/// scanned again, and a repeated spam move at worst duplicates into Spam.
#[derive(Clone)]
pub struct MonitoringJob {
    directory: Arc<dyn UserDirectory>,
    credentials: Arc<dyn CredentialStore>,
    connector: Arc<dyn MailConnector>,
    classifier: Arc<dyn SpamClassifier>,
    event_bus: Arc<dyn EventBus>,
    settings: MonitorSettings,
}

impl MonitoringJob {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        credentials: Arc<dyn CredentialStore>,
        connector: Arc<dyn MailConnector>,
        classifier: Arc<dyn SpamClassifier>,
        event_bus: Arc<dyn EventBus>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            directory,
            credentials,
            connector,
            classifier,
            event_bus,
            settings,
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub async fn run(&self, user_id: &str) -> DomainResult<JobOutcome> {
        let user = match self.directory.get_user(user_id).await? {
            Some(user) if user.can_be_monitored() => user,
            _ => {
                tracing::debug!(user_id, "Skipping monitoring job: user not monitorable");
                metrics::counter!("mailsentry_jobs_total", "outcome" => "skipped").increment(1);
                return Ok(JobOutcome::Skipped);
            }
        };

        let result = self.run_for(&user).await;
        let outcome = match &result {
            Ok(report) => {
                tracing::info!(
                    user_id,
                    new_emails = report.new_emails,
                    spam_moved = report.spam_moved,
                    failures = report.failures,
                    "Monitoring job completed"
                );
                "completed"
            }
            Err(e) => {
                tracing::warn!(user_id, "Monitoring job failed: {}", e);
                "failed"
            }
        };
        metrics::counter!("mailsentry_jobs_total", "outcome" => outcome).increment(1);

        result.map(JobOutcome::Completed)
    }

    async fn run_for(&self, user: &UserState) -> DomainResult<JobReport> {
        let deadline = Instant::now() + self.settings.job_timeout;

        let credential = match self.credentials.decrypt(&user.encrypted_imap_password) {
            Ok(credential) => credential,
            Err(e) => {
                self.publish_error(&user.id, None, format!("Mailbox credential unusable: {}", e));
                return Err(e);
            }
        };

        let opened = tokio::time::timeout_at(
            deadline,
            MailSession::open(self.connector.as_ref(), &user.email, &credential),
        )
        .await;
        drop(credential);

        let mut session = match opened {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                self.publish_error(&user.id, None, format!("Failed to connect to mailbox: {}", e));
                return Err(e);
            }
            Err(_) => {
                let e = DomainError::Connection("Timed out connecting to mailbox".to_string());
                self.publish_error(&user.id, None, e.to_string());
                return Err(e);
            }
        };

        let processed =
            tokio::time::timeout_at(deadline, self.process_inbox(&mut session, &user.id)).await;

        // Runs on every path out of the scan, the deadline included.
        if tokio::time::timeout(self.settings.close_timeout, session.close())
            .await
            .is_err()
        {
            tracing::warn!(user_id = %user.id, "Logout timed out; dropping connection");
        }

        match processed {
            Ok(Ok(report)) => {
                self.directory.set_last_sync(&user.id, Utc::now()).await?;
                Ok(report)
            }
            Ok(Err(e)) => {
                self.publish_error(&user.id, None, format!("Email monitoring failed: {}", e));
                Err(e)
            }
            Err(_) => {
                let e = DomainError::Connection(format!(
                    "Monitoring job exceeded its {}s deadline",
                    self.settings.job_timeout.as_secs()
                ));
                self.publish_error(&user.id, None, e.to_string());
                Err(e)
            }
        }
    }

    async fn process_inbox(
        &self,
        session: &mut MailSession,
        user_id: &str,
    ) -> DomainResult<JobReport> {
        let batch = session
            .list_messages(INBOX, self.settings.batch_limit, 0, true)
            .await?;
        tracing::debug!(user_id, unread = batch.len(), "Scanning unread messages");

        let mut report = JobReport::default();
        for message in &batch {
            self.process_message(session, user_id, message, &mut report)
                .await;
        }
        Ok(report)
    }

    /// Failures here are scoped to the one message and never abort the batch.
    async fn process_message(
        &self,
        session: &mut MailSession,
        user_id: &str,
        message: &MessageMetadata,
        report: &mut JobReport,
    ) {
        let email_id = message.id;

        let detail = match session.get_message(INBOX, email_id).await {
            Ok(detail) => detail,
            Err(e) => {
                tracing::warn!(user_id, email_id, "Failed to fetch message: {}", e);
                report.failures += 1;
                self.publish_error(user_id, Some(email_id), format!("Failed to fetch email: {}", e));
                return;
            }
        };

        let score = match self.classifier.score_text(&detail.classification_text()) {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(user_id, email_id, "Failed to classify message: {}", e);
                report.failures += 1;
                self.publish_error(user_id, Some(email_id), format!("Failed to classify email: {}", e));
                return;
            }
        };

        if !score.is_spam {
            report.new_emails += 1;
            self.publish(
                user_id,
                EmailEvent::new_email(
                    user_id,
                    email_id,
                    detail.subject.clone(),
                    detail.from_address.clone(),
                ),
            );
            return;
        }

        match session
            .move_message(email_id, INBOX, &self.settings.spam_folder)
            .await
        {
            Ok(()) => {
                report.spam_moved += 1;
                tracing::info!(
                    user_id,
                    email_id,
                    confidence = score.confidence,
                    "Spam moved to {}",
                    self.settings.spam_folder
                );
                self.publish(
                    user_id,
                    EmailEvent::spam_detected(
                        user_id,
                        email_id,
                        detail.subject.clone(),
                        detail.from_address.clone(),
                        score.confidence,
                    ),
                );
            }
            Err(e) => {
                // Processed all the same; the next run sees it again if still unread.
                report.spam_unmoved += 1;
                tracing::warn!(user_id, email_id, "Failed to move spam: {}", e);
            }
        }
    }

    fn publish_error(&self, user_id: &str, email_id: Option<u32>, message: String) {
        self.publish(user_id, EmailEvent::error(user_id, email_id, message));
    }

    /// Best-effort: the mailbox side already happened, delivery failures are only logged.
    fn publish(&self, user_id: &str, event: EmailEvent) {
        let event_type = event.event_type.as_str();
        match self.event_bus.publish(user_id, event) {
            Ok(0) => tracing::debug!(user_id, event_type, "No live subscribers; event dropped"),
            Ok(_) => {}
            Err(e) => tracing::warn!(user_id, event_type, "Failed to publish event: {}", e),
        }
    }
}
