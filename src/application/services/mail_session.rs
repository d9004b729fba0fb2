use crate::domain::entities::{
    FolderInfo, MailFlag, MessageDetail, MessageMetadata, SearchCriteria, SelectMode,
    MAX_PAGE_SIZE, TRASH_FOLDER,
};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::mail_transport::{MailConnector, MailTransport};
use crate::infrastructure::providers::EmailParserService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Selected { folder: String, mode: SelectMode },
    Closed,
}

/// One stateful connection to a user's mailbox.
///
/// Only one folder is selected at a time; selecting another replaces it.
/// Flag changes, copy and expunge require a read-write selection. Every
/// operation on a closed session fails with a precondition error.
pub struct MailSession {
    transport: Box<dyn MailTransport>,
    state: SessionState,
    parser: EmailParserService,
    trash_folder: String,
}

impl MailSession {
    pub async fn open(
        connector: &dyn MailConnector,
        address: &str,
        credential: &str,
    ) -> DomainResult<Self> {
        let transport = connector.connect(address, credential).await?;
        tracing::debug!(address, "Mail session opened");
        Ok(Self {
            transport,
            state: SessionState::Connected,
            parser: EmailParserService::new(),
            trash_folder: TRASH_FOLDER.to_string(),
        })
    }

    pub fn with_trash_folder(mut self, folder: impl Into<String>) -> Self {
        self.trash_folder = folder.into();
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.is_closed() {
            return Err(DomainError::Precondition("Mail session is closed".to_string()));
        }
        Ok(())
    }

    fn ensure_writable(&self) -> DomainResult<()> {
        match &self.state {
            SessionState::Selected {
                mode: SelectMode::ReadWrite,
                ..
            } => Ok(()),
            SessionState::Selected { folder, .. } => Err(DomainError::Precondition(format!(
                "Folder {} is selected read-only",
                folder
            ))),
            SessionState::Connected => {
                Err(DomainError::Precondition("No folder selected".to_string()))
            }
            SessionState::Closed => {
                Err(DomainError::Precondition("Mail session is closed".to_string()))
            }
        }
    }

    fn ensure_selected(&self) -> DomainResult<()> {
        match &self.state {
            SessionState::Selected { .. } => Ok(()),
            SessionState::Connected => {
                Err(DomainError::Precondition("No folder selected".to_string()))
            }
            SessionState::Closed => {
                Err(DomainError::Precondition("Mail session is closed".to_string()))
            }
        }
    }

    /// Select `folder`, replacing the current selection. A failed select
    /// leaves the session connected with nothing selected.
    pub async fn select(&mut self, folder: &str, mode: SelectMode) -> DomainResult<()> {
        self.ensure_open()?;
        if let SessionState::Selected {
            folder: current,
            mode: current_mode,
        } = &self.state
        {
            if current == folder && *current_mode == mode {
                return Ok(());
            }
        }

        match self.transport.select(folder, mode).await {
            Ok(()) => {
                self.state = SessionState::Selected {
                    folder: folder.to_string(),
                    mode,
                };
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Connected;
                Err(e)
            }
        }
    }

    pub async fn list_folders(&mut self) -> DomainResult<Vec<FolderInfo>> {
        self.ensure_open()?;
        self.transport.list_folders().await
    }

    /// Page through `folder` most-recent-first. `limit` is capped at 100.
    pub async fn list_messages(
        &mut self,
        folder: &str,
        limit: usize,
        offset: usize,
        only_unread: bool,
    ) -> DomainResult<Vec<MessageMetadata>> {
        self.select(folder, SelectMode::ReadOnly).await?;

        let criteria = if only_unread {
            SearchCriteria::Unseen
        } else {
            SearchCriteria::All
        };
        let uids = self.search_selected(criteria).await?;

        let page: Vec<u32> = uids
            .into_iter()
            .rev()
            .skip(offset)
            .take(limit.min(MAX_PAGE_SIZE))
            .collect();
        if page.is_empty() {
            return Ok(Vec::new());
        }

        let mut fetched = self.transport.fetch_headers(&page).await?;
        // Servers answer FETCH in their own order; restore page order.
        fetched.sort_by_key(|raw| {
            page.iter()
                .position(|uid| *uid == raw.uid)
                .unwrap_or(usize::MAX)
        });

        let mut messages = Vec::with_capacity(fetched.len());
        for raw in &fetched {
            match self.parser.parse_metadata(raw) {
                Ok(meta) => messages.push(meta),
                Err(e) => tracing::warn!(uid = raw.uid, folder, "Skipping unparseable message: {}", e),
            }
        }
        Ok(messages)
    }

    /// Number of messages in `folder` matching `criteria`.
    pub async fn count_messages(
        &mut self,
        folder: &str,
        criteria: SearchCriteria,
    ) -> DomainResult<usize> {
        self.select(folder, SelectMode::ReadOnly).await?;
        Ok(self.search_selected(criteria).await?.len())
    }

    pub async fn get_message(&mut self, folder: &str, id: u32) -> DomainResult<MessageDetail> {
        self.select(folder, SelectMode::ReadOnly).await?;
        let raw = self
            .transport
            .fetch_full(id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("Email {} not found in {}", id, folder)))?;
        self.parser.parse_detail(&raw)
    }

    pub async fn set_read(&mut self, folder: &str, id: u32, read: bool) -> DomainResult<()> {
        self.select(folder, SelectMode::ReadWrite).await?;
        self.store_flag(id, MailFlag::Seen, read).await
    }

    /// Add or remove a flag in the selected folder.
    pub async fn store_flag(&mut self, id: u32, flag: MailFlag, add: bool) -> DomainResult<()> {
        self.ensure_writable()?;
        self.transport.store_flag(id, flag, add).await
    }

    /// Copy from the selected folder. COPY leaves the source untouched, but the
    /// destination gains a message, so it counts as a mutation.
    pub async fn copy_to(&mut self, id: u32, dest_folder: &str) -> DomainResult<()> {
        self.ensure_writable()?;
        self.transport.copy(id, dest_folder).await
    }

    pub async fn expunge(&mut self) -> DomainResult<()> {
        self.ensure_writable()?;
        self.transport.expunge().await
    }

    /// Copy, mark deleted, expunge. Not atomic: a failure after the copy can
    /// leave the message in both folders. Repeating the move is safe; a UID
    /// already gone from the source makes the copy and flag steps no-ops.
    pub async fn move_message(
        &mut self,
        id: u32,
        source_folder: &str,
        dest_folder: &str,
    ) -> DomainResult<()> {
        self.select(source_folder, SelectMode::ReadWrite).await?;
        self.copy_to(id, dest_folder).await?;
        self.store_flag(id, MailFlag::Deleted, true).await?;
        self.expunge().await?;
        tracing::debug!(id, source_folder, dest_folder, "Message moved");
        Ok(())
    }

    /// Move to Trash; when that fails, hard-delete in place.
    pub async fn delete_message(&mut self, folder: &str, id: u32) -> DomainResult<()> {
        let trash = self.trash_folder.clone();
        match self.move_message(id, folder, &trash).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.ensure_open()?;
                tracing::debug!(id, folder, "Move to {} failed ({}), deleting in place", trash, e);
                self.select(folder, SelectMode::ReadWrite).await?;
                self.store_flag(id, MailFlag::Deleted, true).await?;
                self.expunge().await
            }
        }
    }

    /// UIDs currently matching `criteria` in the selected folder, ascending.
    async fn search_selected(&mut self, criteria: SearchCriteria) -> DomainResult<Vec<u32>> {
        self.ensure_selected()?;
        let mut uids = self.transport.search(criteria).await?;
        uids.sort_unstable();
        Ok(uids)
    }

    /// Idempotent. Logout failures are logged and swallowed.
    pub async fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = SessionState::Closed;
        if let Err(e) = self.transport.logout().await {
            tracing::debug!("Ignoring logout failure: {}", e);
        }
    }
}
