use serde::{Deserialize, Serialize};

/// Upper bound on a single listing page.
pub const MAX_PAGE_SIZE: usize = 100;

pub const INBOX: &str = "INBOX";
/// Default delete target.
pub const TRASH_FOLDER: &str = "Trash";

/// How a folder is opened: EXAMINE vs SELECT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCriteria {
    All,
    Unseen,
}

impl SearchCriteria {
    pub fn as_imap(&self) -> &'static str {
        match self {
            SearchCriteria::All => "ALL",
            SearchCriteria::Unseen => "UNSEEN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailFlag {
    Seen,
    Answered,
    Flagged,
    Deleted,
    Draft,
    Other(String),
}

impl MailFlag {
    pub fn imap_name(&self) -> String {
        match self {
            MailFlag::Seen => "\\Seen".to_string(),
            MailFlag::Answered => "\\Answered".to_string(),
            MailFlag::Flagged => "\\Flagged".to_string(),
            MailFlag::Deleted => "\\Deleted".to_string(),
            MailFlag::Draft => "\\Draft".to_string(),
            MailFlag::Other(name) => name.clone(),
        }
    }
}

/// Server-side folder as returned by LIST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub name: String,
    pub flags: Vec<String>,
    pub delimiter: Option<String>,
}

/// One FETCH response: either header bytes or the complete RFC 822 message.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub uid: u32,
    pub flags: Vec<MailFlag>,
    pub size: u32,
    pub content: Vec<u8>,
}

impl RawMessage {
    pub fn has_flag(&self, flag: &MailFlag) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Envelope-level view used by listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageMetadata {
    pub id: u32,
    #[serde(rename = "from")]
    pub from_address: String,
    pub to: String,
    pub subject: String,
    pub date: Option<String>, // ISO 8601
    pub size: u32,
    pub is_read: bool,
    pub is_flagged: bool,
    pub has_attachments: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentInfo {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
}

/// Fully fetched and MIME-decoded message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageDetail {
    pub id: u32,
    #[serde(rename = "from")]
    pub from_address: String,
    pub to: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: String,
    pub date: Option<String>, // ISO 8601
    pub body_plain: String,
    pub body_html: String,
    pub attachments: Vec<AttachmentInfo>,
    pub is_read: bool,
    pub is_flagged: bool,
    pub message_id: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
}

impl MessageDetail {
    /// Text handed to the classifier by the monitoring job.
    pub fn classification_text(&self) -> String {
        format!("{} {} {}", self.subject, self.body_plain, self.body_html)
    }
}
