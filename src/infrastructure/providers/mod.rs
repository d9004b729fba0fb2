pub mod email_parser;
pub mod imap_connector;
pub mod in_memory_mailbox;

pub use email_parser::EmailParserService;
pub use imap_connector::{ImapConnector, ImapSettings};
pub use in_memory_mailbox::{InMemoryConnector, InMemoryMailbox, MailboxStats};
