/// Deterministic in-process mail store.
///
/// Mirrors the IMAP semantics the mail session relies on: per-folder UID
/// allocation, flags, `UID COPY`/`UID STORE` of absent UIDs as no-ops, and
/// expunge of `\Deleted` messages. Operation counters and fault switches make
/// it usable as a test double for the monitoring pipeline.
use crate::domain::entities::{FolderInfo, MailFlag, RawMessage, SearchCriteria, SelectMode};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::mail_transport::{MailConnector, MailTransport};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStats {
    pub connects: usize,
    /// Every transport command, logout included.
    pub commands: usize,
    pub logouts: usize,
}

#[derive(Default)]
struct Faults {
    connect: bool,
    fetch: HashSet<u32>,
    copy: bool,
    expunge_once: bool,
    stall_search: bool,
}

struct StoredMessage {
    flags: Vec<MailFlag>,
    content: Vec<u8>,
}

#[derive(Default)]
struct Folder {
    next_uid: u32,
    messages: BTreeMap<u32, StoredMessage>,
}

impl Folder {
    fn insert(&mut self, flags: Vec<MailFlag>, content: Vec<u8>) -> u32 {
        self.next_uid += 1;
        self.messages
            .insert(self.next_uid, StoredMessage { flags, content });
        self.next_uid
    }
}

#[derive(Default)]
struct State {
    folders: BTreeMap<String, Folder>,
    stats: MailboxStats,
    faults: Faults,
}

#[derive(Clone)]
pub struct InMemoryMailbox {
    state: Arc<Mutex<State>>,
}

impl InMemoryMailbox {
    /// A mailbox holding only `INBOX`.
    pub fn new() -> Self {
        Self::with_folders(&["INBOX"])
    }

    pub fn with_folders(names: &[&str]) -> Self {
        let mailbox = Self {
            state: Arc::new(Mutex::new(State::default())),
        };
        for name in names {
            mailbox.create_folder(name);
        }
        mailbox
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn create_folder(&self, name: &str) {
        self.lock().folders.entry(name.to_string()).or_default();
    }

    /// Deliver a message; returns its UID. Creates the folder when missing.
    pub fn append(&self, folder: &str, content: &str, flags: Vec<MailFlag>) -> u32 {
        self.lock()
            .folders
            .entry(folder.to_string())
            .or_default()
            .insert(flags, content.as_bytes().to_vec())
    }

    pub fn uids(&self, folder: &str) -> Vec<u32> {
        self.lock()
            .folders
            .get(folder)
            .map(|f| f.messages.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn message_count(&self, folder: &str) -> usize {
        self.lock()
            .folders
            .get(folder)
            .map(|f| f.messages.len())
            .unwrap_or(0)
    }

    pub fn flags(&self, folder: &str, uid: u32) -> Option<Vec<MailFlag>> {
        self.lock()
            .folders
            .get(folder)
            .and_then(|f| f.messages.get(&uid))
            .map(|m| m.flags.clone())
    }

    /// Raw bodies of every message in `folder`, in UID order.
    pub fn contents(&self, folder: &str) -> Vec<String> {
        self.lock()
            .folders
            .get(folder)
            .map(|f| {
                f.messages
                    .values()
                    .map(|m| String::from_utf8_lossy(&m.content).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn stats(&self) -> MailboxStats {
        self.lock().stats.clone()
    }

    pub fn fail_connect(&self, enabled: bool) {
        self.lock().faults.connect = enabled;
    }

    pub fn fail_fetch(&self, uid: u32) {
        self.lock().faults.fetch.insert(uid);
    }

    pub fn fail_copy(&self, enabled: bool) {
        self.lock().faults.copy = enabled;
    }

    /// The next expunge fails; later ones succeed.
    pub fn fail_expunge_once(&self) {
        self.lock().faults.expunge_once = true;
    }

    /// SEARCH never answers.
    pub fn stall_search(&self, enabled: bool) {
        self.lock().faults.stall_search = enabled;
    }

    pub fn connector(&self) -> InMemoryConnector {
        InMemoryConnector {
            mailbox: self.clone(),
        }
    }
}

impl Default for InMemoryMailbox {
    fn default() -> Self {
        Self::new()
    }
}

pub struct InMemoryConnector {
    mailbox: InMemoryMailbox,
}

impl InMemoryConnector {
    pub fn new(mailbox: InMemoryMailbox) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl MailConnector for InMemoryConnector {
    async fn connect(
        &self,
        address: &str,
        _credential: &str,
    ) -> DomainResult<Box<dyn MailTransport>> {
        let mut state = self.mailbox.lock();
        if state.faults.connect {
            return Err(DomainError::Connection(format!(
                "Connection refused for {}",
                address
            )));
        }
        state.stats.connects += 1;

        Ok(Box::new(InMemoryTransport {
            mailbox: self.mailbox.clone(),
            selected: None,
        }))
    }
}

struct InMemoryTransport {
    mailbox: InMemoryMailbox,
    selected: Option<(String, SelectMode)>,
}

impl InMemoryTransport {
    /// Counts the command and returns the state guard.
    fn command(&self) -> MutexGuard<'_, State> {
        let mut state = self.mailbox.lock();
        state.stats.commands += 1;
        state
    }

    fn selected_folder(&self) -> DomainResult<&str> {
        self.selected
            .as_ref()
            .map(|(name, _)| name.as_str())
            .ok_or_else(|| DomainError::Precondition("No folder selected".to_string()))
    }

    fn require_writable(&self) -> DomainResult<&str> {
        match &self.selected {
            Some((name, SelectMode::ReadWrite)) => Ok(name.as_str()),
            Some((name, SelectMode::ReadOnly)) => Err(DomainError::Precondition(format!(
                "Folder {} is selected read-only",
                name
            ))),
            None => Err(DomainError::Precondition("No folder selected".to_string())),
        }
    }
}

fn header_block(content: &[u8]) -> Vec<u8> {
    let end = content
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
        .or_else(|| content.windows(2).position(|w| w == b"\n\n").map(|i| i + 2))
        .unwrap_or(content.len());
    content[..end].to_vec()
}

#[async_trait]
impl MailTransport for InMemoryTransport {
    async fn list_folders(&mut self) -> DomainResult<Vec<FolderInfo>> {
        let state = self.command();
        Ok(state
            .folders
            .keys()
            .map(|name| FolderInfo {
                name: name.clone(),
                flags: Vec::new(),
                delimiter: Some("/".to_string()),
            })
            .collect())
    }

    async fn select(&mut self, folder: &str, mode: SelectMode) -> DomainResult<()> {
        let exists = self.command().folders.contains_key(folder);
        if !exists {
            self.selected = None;
            return Err(DomainError::NotFound(format!("Folder {} does not exist", folder)));
        }
        self.selected = Some((folder.to_string(), mode));
        Ok(())
    }

    async fn search(&mut self, criteria: SearchCriteria) -> DomainResult<Vec<u32>> {
        let folder = self.selected_folder()?.to_string();
        let stall = {
            let state = self.command();
            state.faults.stall_search
        };
        if stall {
            futures::future::pending::<()>().await;
        }

        let state = self.mailbox.lock();
        let Some(f) = state.folders.get(&folder) else {
            return Ok(Vec::new());
        };
        Ok(f.messages
            .iter()
            .filter(|(_, m)| match criteria {
                SearchCriteria::All => true,
                SearchCriteria::Unseen => !m.flags.contains(&MailFlag::Seen),
            })
            .map(|(uid, _)| *uid)
            .collect())
    }

    async fn fetch_headers(&mut self, uids: &[u32]) -> DomainResult<Vec<RawMessage>> {
        let folder = self.selected_folder()?.to_string();
        let state = self.command();
        let Some(f) = state.folders.get(&folder) else {
            return Ok(Vec::new());
        };
        Ok(uids
            .iter()
            .filter_map(|uid| {
                f.messages.get(uid).map(|m| RawMessage {
                    uid: *uid,
                    flags: m.flags.clone(),
                    size: m.content.len() as u32,
                    content: header_block(&m.content),
                })
            })
            .collect())
    }

    async fn fetch_full(&mut self, uid: u32) -> DomainResult<Option<RawMessage>> {
        let folder = self.selected_folder()?.to_string();
        let state = self.command();
        if state.faults.fetch.contains(&uid) {
            return Err(DomainError::Connection(format!(
                "FETCH failed for UID {}",
                uid
            )));
        }
        Ok(state
            .folders
            .get(&folder)
            .and_then(|f| f.messages.get(&uid))
            .map(|m| RawMessage {
                uid,
                flags: m.flags.clone(),
                size: m.content.len() as u32,
                content: m.content.clone(),
            }))
    }

    async fn store_flag(&mut self, uid: u32, flag: MailFlag, add: bool) -> DomainResult<()> {
        let folder = self.require_writable()?.to_string();
        let mut state = self.command();
        if let Some(m) = state
            .folders
            .get_mut(&folder)
            .and_then(|f| f.messages.get_mut(&uid))
        {
            let present = m.flags.contains(&flag);
            if add && !present {
                m.flags.push(flag);
            } else if !add && present {
                m.flags.retain(|f| f != &flag);
            }
        }
        Ok(())
    }

    async fn copy(&mut self, uid: u32, dest_folder: &str) -> DomainResult<()> {
        let folder = self.selected_folder()?.to_string();
        let mut state = self.command();
        if state.faults.copy {
            return Err(DomainError::Connection("COPY failed".to_string()));
        }
        if !state.folders.contains_key(dest_folder) {
            return Err(DomainError::NotFound(format!(
                "Folder {} does not exist",
                dest_folder
            )));
        }

        let Some((flags, content)) = state
            .folders
            .get(&folder)
            .and_then(|f| f.messages.get(&uid))
            .map(|m| (m.flags.clone(), m.content.clone()))
        else {
            return Ok(());
        };

        if let Some(dest) = state.folders.get_mut(dest_folder) {
            dest.insert(flags, content);
        }
        Ok(())
    }

    async fn expunge(&mut self) -> DomainResult<()> {
        let folder = self.require_writable()?.to_string();
        let mut state = self.command();
        if state.faults.expunge_once {
            state.faults.expunge_once = false;
            return Err(DomainError::Connection("EXPUNGE failed".to_string()));
        }
        if let Some(f) = state.folders.get_mut(&folder) {
            f.messages.retain(|_, m| !m.flags.contains(&MailFlag::Deleted));
        }
        Ok(())
    }

    async fn logout(&mut self) -> DomainResult<()> {
        self.selected = None;
        let mut state = self.command();
        state.stats.logouts += 1;
        Ok(())
    }
}
