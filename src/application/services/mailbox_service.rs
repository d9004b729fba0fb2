use crate::application::services::mail_session::MailSession;
use crate::domain::entities::{
    FolderInfo, MessageDetail, MessageMetadata, SearchCriteria, UserState, INBOX,
    MAX_PAGE_SIZE, TRASH_FOLDER,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{CredentialStore, MailConnector, SpamClassifier, SpamScore};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;

/// Message detail plus the classifier's verdict, when a model is loaded.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMessage {
    #[serde(flatten)]
    pub detail: MessageDetail,
    pub is_spam: Option<bool>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MailboxSummary {
    pub total_emails: usize,
    pub unread_emails: usize,
    pub folders_count: usize,
}

/// Request-scoped mailbox operations. Each call opens its own session and
/// closes it before returning, whatever the outcome.
#[derive(Clone)]
pub struct MailboxService {
    credentials: Arc<dyn CredentialStore>,
    connector: Arc<dyn MailConnector>,
    classifier: Option<Arc<dyn SpamClassifier>>,
    trash_folder: String,
}

impl MailboxService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        connector: Arc<dyn MailConnector>,
        classifier: Option<Arc<dyn SpamClassifier>>,
    ) -> Self {
        Self {
            credentials,
            connector,
            classifier,
            trash_folder: TRASH_FOLDER.to_string(),
        }
    }

    pub fn with_trash_folder(mut self, folder: impl Into<String>) -> Self {
        self.trash_folder = folder.into();
        self
    }

    async fn with_session<T, F>(&self, user: &UserState, op: F) -> DomainResult<T>
    where
        F: for<'s> FnOnce(&'s mut MailSession) -> BoxFuture<'s, DomainResult<T>>,
    {
        let credential = self.credentials.decrypt(&user.encrypted_imap_password)?;
        let mut session = MailSession::open(self.connector.as_ref(), &user.email, &credential)
            .await?
            .with_trash_folder(self.trash_folder.clone());
        drop(credential);

        let result = op(&mut session).await;
        session.close().await;
        result
    }

    fn classifier(&self) -> DomainResult<&Arc<dyn SpamClassifier>> {
        self.classifier
            .as_ref()
            .ok_or_else(|| DomainError::Unavailable("Spam classifier is not loaded".to_string()))
    }

    pub async fn list_folders(&self, user: &UserState) -> DomainResult<Vec<FolderInfo>> {
        self.with_session(user, |session| Box::pin(session.list_folders()))
            .await
    }

    pub async fn list_emails(
        &self,
        user: &UserState,
        folder: &str,
        limit: usize,
        offset: usize,
        only_unread: bool,
    ) -> DomainResult<Vec<MessageMetadata>> {
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(DomainError::ValidationError(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        let folder = folder.to_string();
        self.with_session(user, move |session| {
            Box::pin(async move {
                session
                    .list_messages(&folder, limit, offset, only_unread)
                    .await
            })
        })
        .await
    }

    /// Detail scored on subject and plain body.
    pub async fn get_email(
        &self,
        user: &UserState,
        folder: &str,
        id: u32,
    ) -> DomainResult<ScoredMessage> {
        let folder = folder.to_string();
        let detail = self
            .with_session(user, move |session| {
                Box::pin(async move { session.get_message(&folder, id).await })
            })
            .await?;

        let score = match &self.classifier {
            Some(classifier) => Some(
                classifier.score_text(&format!("{} {}", detail.subject, detail.body_plain))?,
            ),
            None => None,
        };

        Ok(ScoredMessage {
            is_spam: score.map(|s| s.is_spam),
            confidence: score.map(|s| s.confidence),
            detail,
        })
    }

    pub async fn mark_read(
        &self,
        user: &UserState,
        folder: &str,
        id: u32,
        is_read: bool,
    ) -> DomainResult<()> {
        let folder = folder.to_string();
        self.with_session(user, move |session| {
            Box::pin(async move { session.set_read(&folder, id, is_read).await })
        })
        .await
    }

    pub async fn move_email(
        &self,
        user: &UserState,
        id: u32,
        source_folder: &str,
        dest_folder: &str,
    ) -> DomainResult<()> {
        let source = source_folder.to_string();
        let dest = dest_folder.to_string();
        self.with_session(user, move |session| {
            Box::pin(async move { session.move_message(id, &source, &dest).await })
        })
        .await
    }

    pub async fn delete_email(&self, user: &UserState, folder: &str, id: u32) -> DomainResult<()> {
        let folder = folder.to_string();
        self.with_session(user, move |session| {
            Box::pin(async move { session.delete_message(&folder, id).await })
        })
        .await
    }

    /// User feedback on a message. Returns the message shown to the caller;
    /// an unconfirmed report leaves the mailbox untouched.
    pub async fn confirm_spam(
        &self,
        user: &UserState,
        id: u32,
        source_folder: &str,
        confirmed: bool,
        dest_folder: &str,
    ) -> DomainResult<String> {
        if !confirmed {
            return Ok("Spam not confirmed, email remains in current folder".to_string());
        }
        self.move_email(user, id, source_folder, dest_folder).await?;
        tracing::info!(user_id = %user.id, email_id = id, dest_folder, "Spam confirmed by user");
        Ok(format!("Email confirmed as spam and moved to {}", dest_folder))
    }

    /// Score free text; needs no mailbox.
    pub fn detect_spam(
        &self,
        subject: &str,
        body_plain: Option<&str>,
        body_html: Option<&str>,
    ) -> DomainResult<SpamScore> {
        let text = format!(
            "{} {} {}",
            subject,
            body_plain.unwrap_or_default(),
            body_html.unwrap_or_default()
        );
        self.classifier()?.score_text(&text)
    }

    /// Folder count plus INBOX totals.
    pub async fn summary(&self, user: &UserState) -> DomainResult<MailboxSummary> {
        self.with_session(user, |session| {
            Box::pin(async move {
                let folders_count = session.list_folders().await?.len();
                let total_emails = session.count_messages(INBOX, SearchCriteria::All).await?;
                let unread_emails = session
                    .count_messages(INBOX, SearchCriteria::Unseen)
                    .await?;
                Ok(MailboxSummary {
                    total_emails,
                    unread_emails,
                    folders_count,
                })
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::MailFlag;
    use crate::infrastructure::providers::InMemoryMailbox;
    use crate::infrastructure::security::AesGcmCredentialStore;

    const KEY: &str = "unit-test-key";

    struct SubjectClassifier;

    impl SpamClassifier for SubjectClassifier {
        fn score_text(&self, text: &str) -> DomainResult<SpamScore> {
            let is_spam = text.contains("WIN");
            Ok(SpamScore {
                is_spam,
                confidence: if is_spam { 0.92 } else { 0.8 },
            })
        }
    }

    fn service(mailbox: &InMemoryMailbox, classifier: bool) -> (MailboxService, UserState) {
        let store = AesGcmCredentialStore::new(KEY);
        let user = UserState::new(
            "bob@example.com".to_string(),
            store.encrypt("imap-pass").unwrap(),
        );
        let classifier: Option<Arc<dyn SpamClassifier>> = if classifier {
            Some(Arc::new(SubjectClassifier))
        } else {
            None
        };
        let service = MailboxService::new(
            Arc::new(store),
            Arc::new(mailbox.connector()),
            classifier,
        );
        (service, user)
    }

    fn message(subject: &str) -> String {
        format!(
            "From: a@example.com\r\nTo: bob@example.com\r\nSubject: {}\r\n\r\nbody\r\n",
            subject
        )
    }

    #[tokio::test]
    async fn test_every_request_closes_its_session() {
        let mailbox = InMemoryMailbox::new();
        let (service, user) = service(&mailbox, true);

        service.list_folders(&user).await.unwrap();
        assert!(service.get_email(&user, "INBOX", 7).await.is_err());

        let stats = mailbox.stats();
        assert_eq!(stats.connects, 2);
        assert_eq!(stats.logouts, 2);
    }

    #[tokio::test]
    async fn test_list_rejects_out_of_range_limit() {
        let mailbox = InMemoryMailbox::new();
        let (service, user) = service(&mailbox, true);
        assert!(matches!(
            service.list_emails(&user, "INBOX", 0, 0, false).await,
            Err(DomainError::ValidationError(_))
        ));
        assert!(matches!(
            service.list_emails(&user, "INBOX", 101, 0, false).await,
            Err(DomainError::ValidationError(_))
        ));
        assert_eq!(mailbox.stats().connects, 0);
    }

    #[tokio::test]
    async fn test_get_email_includes_score() {
        let mailbox = InMemoryMailbox::new();
        let uid = mailbox.append("INBOX", &message("WIN big"), vec![]);
        let (service, user) = service(&mailbox, true);

        let scored = service.get_email(&user, "INBOX", uid).await.unwrap();
        assert_eq!(scored.is_spam, Some(true));
        assert_eq!(scored.confidence, Some(0.92));

        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["subject"], "WIN big");
        assert_eq!(json["is_spam"], true);
    }

    #[tokio::test]
    async fn test_get_email_without_classifier_is_unscored() {
        let mailbox = InMemoryMailbox::new();
        let uid = mailbox.append("INBOX", &message("hello"), vec![]);
        let (service, user) = service(&mailbox, false);

        let scored = service.get_email(&user, "INBOX", uid).await.unwrap();
        assert_eq!(scored.is_spam, None);
        assert!(matches!(
            service.detect_spam("WIN", None, None),
            Err(DomainError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_spam() {
        let mailbox = InMemoryMailbox::with_folders(&["INBOX", "Spam"]);
        let uid = mailbox.append("INBOX", &message("maybe"), vec![]);
        let (service, user) = service(&mailbox, true);

        let message = service
            .confirm_spam(&user, uid, "INBOX", false, "Spam")
            .await
            .unwrap();
        assert_eq!(message, "Spam not confirmed, email remains in current folder");
        assert_eq!(mailbox.message_count("INBOX"), 1);
        assert_eq!(mailbox.stats().connects, 0);

        let message = service
            .confirm_spam(&user, uid, "INBOX", true, "Spam")
            .await
            .unwrap();
        assert_eq!(message, "Email confirmed as spam and moved to Spam");
        assert_eq!(mailbox.message_count("INBOX"), 0);
        assert_eq!(mailbox.message_count("Spam"), 1);
    }

    #[tokio::test]
    async fn test_summary_counts_inbox() {
        let mailbox = InMemoryMailbox::with_folders(&["INBOX", "Spam", "Trash"]);
        mailbox.append("INBOX", &message("a"), vec![MailFlag::Seen]);
        mailbox.append("INBOX", &message("b"), vec![]);
        mailbox.append("Spam", &message("c"), vec![]);
        let (service, user) = service(&mailbox, true);

        let summary = service.summary(&user).await.unwrap();
        assert_eq!(
            summary,
            MailboxSummary {
                total_emails: 2,
                unread_emails: 1,
                folders_count: 3,
            }
        );
    }

    #[tokio::test]
    async fn test_undecryptable_credential_never_connects() {
        let mailbox = InMemoryMailbox::new();
        let (service, mut user) = service(&mailbox, true);
        user.encrypted_imap_password = "garbage".to_string();

        assert!(matches!(
            service.list_folders(&user).await,
            Err(DomainError::Decryption(_))
        ));
        assert_eq!(mailbox.stats().connects, 0);
    }
}
