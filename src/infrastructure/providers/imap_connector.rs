/// IMAP transport over TLS.
///
/// Every command, connect and login included, is bounded by the configured
/// command timeout. Protocol and I/O failures surface as connection errors.
use crate::domain::entities::{FolderInfo, MailFlag, RawMessage, SearchCriteria, SelectMode};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::mail_transport::{MailConnector, MailTransport};
use async_imap::types::{Fetch, Flag};
use async_imap::Session;
use async_native_tls::{TlsConnector, TlsStream};
use async_trait::async_trait;
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

type ImapSession = Session<TlsStream<Compat<TcpStream>>>;

#[derive(Debug, Clone)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    pub command_timeout: Duration,
}

pub struct ImapConnector {
    settings: ImapSettings,
}

impl ImapConnector {
    pub fn new(settings: ImapSettings) -> Self {
        Self { settings }
    }
}

fn settle<T, E: std::fmt::Debug>(
    op: &str,
    limit: Duration,
    outcome: Result<Result<T, E>, tokio::time::error::Elapsed>,
) -> DomainResult<T> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DomainError::Connection(format!("{} failed: {:?}", op, e))),
        Err(_) => Err(DomainError::Connection(format!(
            "{} timed out after {}s",
            op,
            limit.as_secs()
        ))),
    }
}

/// Run one protocol step under the deadline.
async fn bounded<T, E, F>(limit: Duration, op: &str, fut: F) -> DomainResult<T>
where
    E: std::fmt::Debug,
    F: Future<Output = Result<T, E>>,
{
    settle(op, limit, tokio::time::timeout(limit, fut).await)
}

/// Like `bounded`, but a `NO` answer to a folder-addressed command means the
/// folder does not exist.
async fn bounded_folder<T, F>(limit: Duration, op: &str, folder: &str, fut: F) -> DomainResult<T>
where
    F: Future<Output = async_imap::error::Result<T>>,
{
    let outcome = tokio::time::timeout(limit, fut).await;
    if let Ok(Err(async_imap::error::Error::No(msg))) = &outcome {
        return Err(DomainError::NotFound(format!(
            "Folder {} does not exist: {}",
            folder, msg
        )));
    }
    settle(op, limit, outcome)
}

#[async_trait]
impl MailConnector for ImapConnector {
    async fn connect(
        &self,
        address: &str,
        credential: &str,
    ) -> DomainResult<Box<dyn MailTransport>> {
        let settings = &self.settings;
        if !settings.use_tls {
            return Err(DomainError::Connection(
                "Non-TLS IMAP connections are not supported".to_string(),
            ));
        }

        let addr = format!("{}:{}", settings.host, settings.port);
        let tcp_stream = bounded(
            settings.command_timeout,
            "TCP connect",
            TcpStream::connect(&addr),
        )
        .await?;

        let tls_stream = bounded(
            settings.command_timeout,
            "TLS handshake",
            TlsConnector::new().connect(&settings.host, tcp_stream.compat()),
        )
        .await?;

        let client = async_imap::Client::new(tls_stream);
        let session = bounded(settings.command_timeout, "LOGIN", async {
            client
                .login(address, credential)
                .await
                .map_err(|(e, _client)| e)
        })
        .await?;

        tracing::debug!(host = %settings.host, "IMAP session established");

        Ok(Box::new(ImapTransport {
            session,
            timeout: settings.command_timeout,
        }))
    }
}

struct ImapTransport {
    session: ImapSession,
    timeout: Duration,
}

fn to_mail_flag(flag: &Flag<'_>) -> Option<MailFlag> {
    match flag {
        Flag::Seen => Some(MailFlag::Seen),
        Flag::Answered => Some(MailFlag::Answered),
        Flag::Flagged => Some(MailFlag::Flagged),
        Flag::Deleted => Some(MailFlag::Deleted),
        Flag::Draft => Some(MailFlag::Draft),
        Flag::Custom(name) => Some(MailFlag::Other(name.to_string())),
        _ => None,
    }
}

fn to_raw_message(fetch: &Fetch, content: Option<&[u8]>) -> Option<RawMessage> {
    let uid = fetch.uid?;
    let content = content?.to_vec();
    Some(RawMessage {
        uid,
        flags: fetch.flags().filter_map(|f| to_mail_flag(&f)).collect(),
        size: fetch.size.unwrap_or(content.len() as u32),
        content,
    })
}

#[async_trait]
impl MailTransport for ImapTransport {
    async fn list_folders(&mut self) -> DomainResult<Vec<FolderInfo>> {
        let session = &mut self.session;
        let names = bounded(self.timeout, "LIST", async {
            let stream = session.list(Some(""), Some("*")).await?;
            Ok::<_, async_imap::error::Error>(stream.collect::<Vec<_>>().await)
        })
        .await?;

        Ok(names
            .into_iter()
            .filter_map(|r| r.ok())
            .map(|name| FolderInfo {
                name: name.name().to_string(),
                flags: name
                    .attributes()
                    .iter()
                    .map(|attr| format!("{:?}", attr))
                    .collect(),
                delimiter: name.delimiter().map(|d| d.to_string()),
            })
            .collect())
    }

    async fn select(&mut self, folder: &str, mode: SelectMode) -> DomainResult<()> {
        match mode {
            SelectMode::ReadOnly => {
                bounded_folder(self.timeout, "EXAMINE", folder, self.session.examine(folder))
                    .await?;
            }
            SelectMode::ReadWrite => {
                bounded_folder(self.timeout, "SELECT", folder, self.session.select(folder))
                    .await?;
            }
        }
        Ok(())
    }

    async fn search(&mut self, criteria: SearchCriteria) -> DomainResult<Vec<u32>> {
        let uids = bounded(
            self.timeout,
            "UID SEARCH",
            self.session.uid_search(criteria.as_imap()),
        )
        .await?;
        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn fetch_headers(&mut self, uids: &[u32]) -> DomainResult<Vec<RawMessage>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let set = uids
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let session = &mut self.session;
        let fetches = bounded(self.timeout, "UID FETCH", async {
            let stream = session
                .uid_fetch(&set, "(UID FLAGS RFC822.SIZE BODY.PEEK[HEADER])")
                .await?;
            Ok::<_, async_imap::error::Error>(stream.collect::<Vec<_>>().await)
        })
        .await?;

        let mut messages = Vec::new();
        for fetch in fetches {
            match fetch {
                Ok(fetch) => {
                    if let Some(raw) = to_raw_message(&fetch, fetch.header()) {
                        messages.push(raw);
                    }
                }
                Err(e) => tracing::warn!("IMAP header fetch stream error: {:?}", e),
            }
        }
        Ok(messages)
    }

    async fn fetch_full(&mut self, uid: u32) -> DomainResult<Option<RawMessage>> {
        let session = &mut self.session;
        let fetches = bounded(self.timeout, "UID FETCH", async {
            let stream = session
                .uid_fetch(uid.to_string(), "(UID FLAGS RFC822.SIZE BODY.PEEK[])")
                .await?;
            Ok::<_, async_imap::error::Error>(stream.collect::<Vec<_>>().await)
        })
        .await?;

        for fetch in fetches {
            let fetch = fetch.map_err(|e| {
                DomainError::Connection(format!("UID FETCH {} failed: {:?}", uid, e))
            })?;
            if fetch.uid == Some(uid) {
                return Ok(to_raw_message(&fetch, fetch.body()));
            }
        }
        Ok(None)
    }

    async fn store_flag(&mut self, uid: u32, flag: MailFlag, add: bool) -> DomainResult<()> {
        let query = format!(
            "{}FLAGS.SILENT ({})",
            if add { "+" } else { "-" },
            flag.imap_name()
        );
        let session = &mut self.session;
        bounded(self.timeout, "UID STORE", async {
            let stream = session.uid_store(uid.to_string(), &query).await?;
            let _: Vec<_> = stream.collect().await;
            Ok::<_, async_imap::error::Error>(())
        })
        .await
    }

    async fn copy(&mut self, uid: u32, dest_folder: &str) -> DomainResult<()> {
        bounded_folder(
            self.timeout,
            "UID COPY",
            dest_folder,
            self.session.uid_copy(uid.to_string(), dest_folder),
        )
        .await
    }

    async fn expunge(&mut self) -> DomainResult<()> {
        let session = &mut self.session;
        bounded(self.timeout, "EXPUNGE", async {
            let stream = session.expunge().await?;
            let _: Vec<_> = stream.collect().await;
            Ok::<_, async_imap::error::Error>(())
        })
        .await
    }

    async fn logout(&mut self) -> DomainResult<()> {
        bounded(self.timeout, "LOGOUT", self.session.logout()).await
    }
}
