use crate::domain::entities::{FolderInfo, MailFlag, RawMessage, SearchCriteria, SelectMode};
use crate::domain::errors::DomainResult;
use async_trait::async_trait;

/// One logged-in connection to a mail store.
///
/// The protocol is single-session, single-outstanding-command: callers hold the
/// transport mutably and issue commands one at a time. Message identifiers are
/// UIDs scoped to the currently selected folder.
#[async_trait]
pub trait MailTransport: Send {
    async fn list_folders(&mut self) -> DomainResult<Vec<FolderInfo>>;

    /// Replaces any prior selection. Unknown folders fail with `NotFound`.
    async fn select(&mut self, folder: &str, mode: SelectMode) -> DomainResult<()>;

    /// Matching UIDs in server-native (ascending) order.
    async fn search(&mut self, criteria: SearchCriteria) -> DomainResult<Vec<u32>>;

    /// Header-only fetch; absent UIDs are skipped.
    async fn fetch_headers(&mut self, uids: &[u32]) -> DomainResult<Vec<RawMessage>>;

    async fn fetch_full(&mut self, uid: u32) -> DomainResult<Option<RawMessage>>;

    async fn store_flag(&mut self, uid: u32, flag: MailFlag, add: bool) -> DomainResult<()>;

    async fn copy(&mut self, uid: u32, dest_folder: &str) -> DomainResult<()>;

    async fn expunge(&mut self) -> DomainResult<()>;

    async fn logout(&mut self) -> DomainResult<()>;
}

/// Opens transports. The credential arrives already decrypted.
#[async_trait]
pub trait MailConnector: Send + Sync {
    async fn connect(&self, address: &str, credential: &str)
        -> DomainResult<Box<dyn MailTransport>>;
}
