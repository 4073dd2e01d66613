//! IMAP session over async-imap

use crate::config::ReaderConfig;
use crate::error::{Error, Result};
use crate::flag::{Flag, FlagOp};
use crate::model::{Addresses, Envelope, MailDate};
use crate::session::{FetchItems, FetchedMessage, MailSession, MailboxInfo, SearchCriteria, SeqSet};
use crate::tls;
use async_imap::Session;
use async_imap::imap_proto::types::{Address, Envelope as ImapEnvelope, Response, Status};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

type TlsSession = Session<Compat<TlsStream<TcpStream>>>;

/// An authenticated IMAP session.
pub struct ImapSession {
    inner: TlsSession,
}

impl ImapSession {
    /// Dial the configured server (through the proxy, if any), run the
    /// TLS handshake and log in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] or [`Error::ProxyConnect`] if the
    /// server cannot be reached, [`Error::TlsHandshake`] if TLS fails,
    /// [`Error::Protocol`] if the server greets with `BYE`, and
    /// [`Error::Auth`] if the login is rejected.
    pub async fn connect(config: &ReaderConfig) -> Result<Self> {
        let address = config.server.address();
        debug!("Connecting to IMAP server at {}", address);

        let stream = config.dialer().dial(&address).await?;
        let tls_stream = tls::wrap(stream, config.server.host(), config.verify_certificates).await?;

        let mut client = async_imap::Client::new(tls_stream.compat());
        let greeting = client
            .read_response()
            .await
            .map_err(|e| Error::connect(&address, format!("reading greeting: {e}")))?
            .ok_or_else(|| Error::connect(&address, "closed before sending a greeting"))?;
        if let Some(e) = greeting_refusal(greeting.parsed()) {
            return Err(e);
        }

        let session = client
            .login(&config.user, &config.password)
            .await
            .map_err(|(e, _)| Error::Auth(format!("Login failed: {e}")))?;

        info!("Connected to IMAP server {}", address);
        Ok(Self { inner: session })
    }
}

#[async_trait]
impl MailSession for ImapSession {
    async fn select(&mut self, mailbox: &str) -> Result<MailboxInfo> {
        let selected = self
            .inner
            .select(mailbox)
            .await
            .map_err(|e| Error::Select(format!("Failed to select {mailbox}: {e}")))?;
        Ok(MailboxInfo {
            exists: selected.exists,
        })
    }

    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>> {
        let query = criteria.to_imap_query();
        let found = self
            .inner
            .search(&query)
            .await
            .map_err(|e| Error::Search(format!("{query}: {e}")))?;

        let mut seqs: Vec<u32> = found.into_iter().collect();
        seqs.sort_unstable();
        Ok(seqs)
    }

    async fn fetch(
        &mut self,
        set: &SeqSet,
        items: FetchItems,
        sink: mpsc::Sender<FetchedMessage>,
    ) -> Result<()> {
        let set = set.to_string();
        let query = items.to_imap_query();
        let mut messages = self
            .inner
            .fetch(&set, &query)
            .await
            .map_err(|e| Error::Fetch(format!("{set} {query}: {e}")))?;

        while let Some(item) = messages.next().await {
            let fetch = item.map_err(|e| Error::Fetch(format!("Fetch error: {e}")))?;
            let uid = fetch.uid;
            let message = FetchedMessage {
                seq: fetch.message,
                uid,
                envelope: fetch
                    .envelope()
                    .map(|env| envelope_from(uid.unwrap_or_default(), env)),
                bodies: fetch.body().map(<[u8]>::to_vec).into_iter().collect(),
            };
            if sink.send(message).await.is_err() {
                debug!("Fetch consumer went away, dropping remaining messages");
                break;
            }
        }
        Ok(())
    }

    async fn store_flags(&mut self, set: &SeqSet, op: FlagOp, flags: &[Flag]) -> Result<()> {
        let set = set.to_string();
        let query = op.store_query(flags);
        let mut updates = self
            .inner
            .store(&set, &query)
            .await
            .map_err(|e| Error::Store(format!("{set} {query}: {e}")))?;

        while let Some(update) = updates.next().await {
            update.map_err(|e| Error::Store(format!("Store error: {e}")))?;
        }
        Ok(())
    }

    async fn list_mailboxes(&mut self) -> Result<Vec<String>> {
        let mut listing = self
            .inner
            .list(Some(""), Some("*"))
            .await
            .map_err(|e| Error::Protocol(format!("List folders failed: {e}")))?;

        let mut names = Vec::new();
        while let Some(item) = listing.next().await {
            let name = item.map_err(|e| Error::Protocol(format!("List folders failed: {e}")))?;
            names.push(name.name().to_string());
        }
        Ok(names)
    }

    async fn logout(&mut self) -> Result<()> {
        self.inner
            .logout()
            .await
            .map_err(|e| Error::Protocol(format!("Logout failed: {e}")))
    }
}

/// A greeting other than `OK` or `PREAUTH` ends the session.
fn greeting_refusal(greeting: &Response<'_>) -> Option<Error> {
    match greeting {
        Response::Data {
            status: status @ (Status::Bye | Status::No | Status::Bad),
            information,
            ..
        } => Some(Error::Protocol(format!(
            "Server refused the session ({status:?}): {}",
            information.as_deref().unwrap_or_default()
        ))),
        _ => None,
    }
}

/// Project a server-side ENVELOPE onto the message model.
fn envelope_from(uid: u32, env: &ImapEnvelope<'_>) -> Envelope {
    Envelope {
        uid,
        date: env
            .date
            .as_deref()
            .map(|raw| MailDate::parse(&String::from_utf8_lossy(raw)))
            .unwrap_or_default(),
        subject: env.subject.as_deref().map(decode_subject).unwrap_or_default(),
        from: addresses(env.from.as_deref()),
        sender: addresses(env.sender.as_deref()),
        reply_to: addresses(env.reply_to.as_deref()),
        to: addresses(env.to.as_deref()),
        cc: addresses(env.cc.as_deref()),
        bcc: addresses(env.bcc.as_deref()),
        in_reply_to: text(env.in_reply_to.as_deref()),
        message_id: text(env.message_id.as_deref()),
    }
}

/// `mailbox@host` for every address that has both parts. Group markers
/// carry no host and are dropped.
fn addresses(list: Option<&[Address<'_>]>) -> Addresses {
    let list = list.unwrap_or_default();
    Addresses::List(
        list.iter()
            .filter_map(|addr| {
                let mailbox = addr.mailbox.as_deref()?;
                let host = addr.host.as_deref()?;
                Some(format!(
                    "{}@{}",
                    String::from_utf8_lossy(mailbox),
                    String::from_utf8_lossy(host)
                ))
            })
            .collect(),
    )
}

/// Subjects arrive still RFC 2047 encoded.
fn decode_subject(raw: &[u8]) -> String {
    let mut header = b"Subject: ".to_vec();
    header.extend_from_slice(raw);
    mailparse::parse_header(&header).map_or_else(
        |_| String::from_utf8_lossy(raw).into_owned(),
        |(parsed, _)| parsed.get_value(),
    )
}

fn text(raw: Option<&[u8]>) -> String {
    raw.map(|v| String::from_utf8_lossy(v).into_owned())
        .unwrap_or_default()
}
