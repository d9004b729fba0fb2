pub mod mail_session;
pub mod mailbox_service;
pub mod monitoring_job;
pub mod monitoring_service;
pub mod notification_stream;

pub use mail_session::{MailSession, SessionState};
pub use mailbox_service::{MailboxService, MailboxSummary, ScoredMessage};
pub use monitoring_job::{JobOutcome, JobReport, MonitorSettings, MonitoringJob};
pub use monitoring_service::{MonitoringService, MonitoringStatus};
pub use notification_stream::{NotificationStreamService, StreamFrame};
