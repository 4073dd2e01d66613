//! POP3 session
//!
//! A minimal POP3 client (RFC 1939): `USER`/`PASS` login, `STAT`,
//! `RETR`, `TOP` and `QUIT`. POP3 has a single mailbox, no flags and no
//! server-side search, so those parts of [`MailSession`] report
//! [`Error::Unsupported`]. Message numbers double as UIDs; they are
//! only stable for the lifetime of the session.

use crate::config::ReaderConfig;
use crate::error::{Error, Result};
use crate::flag::{Flag, FlagOp};
use crate::model::{Addresses, Envelope, MailDate};
use crate::session::{FetchItems, FetchedMessage, MailSession, MailboxInfo, SearchCriteria, SeqSet};
use crate::tls;
use async_trait::async_trait;
use mailparse::MailHeaderMap;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};

/// Status line of a POP3 reply.
enum Reply {
    Ok(String),
    Err(String),
}

/// An authenticated POP3 session.
pub struct Pop3Session<S = TlsStream<TcpStream>> {
    stream: BufReader<S>,
    exists: u32,
}

impl Pop3Session {
    /// Dial the configured server (through the proxy, if any), run the
    /// TLS handshake and log in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connect`] or [`Error::ProxyConnect`] if the
    /// server cannot be reached, [`Error::TlsHandshake`] if TLS fails
    /// and [`Error::Auth`] if `USER` or `PASS` is refused.
    pub async fn connect(config: &ReaderConfig) -> Result<Self> {
        let address = config.server.address();
        debug!("Connecting to POP3 server at {}", address);

        let stream = config.dialer().dial(&address).await?;
        let tls_stream = tls::wrap(stream, config.server.host(), config.verify_certificates).await?;
        let session = Self::login(tls_stream, &config.user, &config.password).await?;

        info!("Connected to POP3 server {}", address);
        Ok(session)
    }
}

impl<S> Pop3Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Read the greeting from an established stream and authenticate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the server does not greet with
    /// `+OK` and [`Error::Auth`] if the credentials are refused.
    pub async fn login(stream: S, user: &str, password: &str) -> Result<Self> {
        let mut session = Self {
            stream: BufReader::new(stream),
            exists: 0,
        };

        if let Reply::Err(reason) = session.read_status().await? {
            return Err(Error::Protocol(format!("POP3 server refused connection: {reason}")));
        }

        session.send(&format!("USER {user}")).await?;
        if let Reply::Err(reason) = session.read_status().await? {
            return Err(Error::Auth(format!("USER refused: {reason}")));
        }

        session.send(&format!("PASS {password}")).await?;
        if let Reply::Err(reason) = session.read_status().await? {
            return Err(Error::Auth(format!("PASS refused: {reason}")));
        }

        Ok(session)
    }

    async fn send(&mut self, command: &str) -> Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();
        if self.stream.read_until(b'\n', &mut line).await? == 0 {
            return Err(Error::Protocol("POP3 server closed the connection".into()));
        }
        Ok(line)
    }

    async fn read_status(&mut self) -> Result<Reply> {
        let line = self.read_line().await?;
        let line = String::from_utf8_lossy(&line);
        let line = line.trim_end();

        if let Some(rest) = line.strip_prefix("+OK") {
            Ok(Reply::Ok(rest.trim().to_string()))
        } else if let Some(rest) = line.strip_prefix("-ERR") {
            Ok(Reply::Err(rest.trim().to_string()))
        } else {
            Err(Error::Protocol(format!("Unexpected POP3 reply: {line}")))
        }
    }

    /// Read a multi-line response body up to the terminating `.` line,
    /// undoing dot-stuffing. Line endings are kept as sent.
    async fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let mut body = Vec::new();
        loop {
            let line = self.read_line().await?;
            let content = line
                .strip_suffix(b"\r\n")
                .or_else(|| line.strip_suffix(b"\n"))
                .unwrap_or(&line);

            if content == b"." {
                return Ok(body);
            }
            let unstuffed = if line.starts_with(b"..") { &line[1..] } else { &line[..] };
            body.extend_from_slice(unstuffed);
        }
    }

    async fn command(&mut self, command: &str) -> Result<String> {
        self.send(command).await?;
        match self.read_status().await? {
            Reply::Ok(text) => Ok(text),
            Reply::Err(reason) => Err(Error::Protocol(format!("{command} refused: {reason}"))),
        }
    }
}

#[async_trait]
impl<S> MailSession for Pop3Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// POP3 has one mailbox; the name only shows up in the log.
    async fn select(&mut self, mailbox: &str) -> Result<MailboxInfo> {
        debug!("POP3 STAT for {}", mailbox);
        let stat = self
            .command("STAT")
            .await
            .map_err(|e| Error::Select(e.to_string()))?;

        self.exists = stat
            .split_whitespace()
            .next()
            .and_then(|count| count.parse().ok())
            .ok_or_else(|| Error::Select(format!("Malformed STAT reply: {stat}")))?;

        Ok(MailboxInfo {
            exists: self.exists,
        })
    }

    async fn search(&mut self, _criteria: &SearchCriteria) -> Result<Vec<u32>> {
        Err(Error::Unsupported("POP3 has no server-side search".into()))
    }

    /// `RETR` when the body is asked for. Envelope-only fetches such as
    /// [`FetchItems::ENVELOPE`] send `TOP n 0` and transfer just the
    /// header block.
    async fn fetch(
        &mut self,
        set: &SeqSet,
        items: FetchItems,
        sink: mpsc::Sender<FetchedMessage>,
    ) -> Result<()> {
        for seq in set.within(self.exists) {
            let command = if items.full_body {
                format!("RETR {seq}")
            } else {
                format!("TOP {seq} 0")
            };

            self.send(&command).await?;
            if let Reply::Err(reason) = self.read_status().await? {
                warn!("POP3 {} refused, skipping: {}", command, reason);
                continue;
            }
            let raw = self
                .read_multiline()
                .await
                .map_err(|e| Error::Fetch(format!("{command}: {e}")))?;

            let message = FetchedMessage {
                seq,
                uid: Some(seq),
                envelope: items.envelope.then(|| envelope_from_headers(seq, &raw)),
                bodies: if items.full_body { vec![raw] } else { Vec::new() },
            };
            if sink.send(message).await.is_err() {
                debug!("Fetch consumer went away, stopping at message {}", seq);
                break;
            }
        }
        Ok(())
    }

    async fn store_flags(&mut self, _set: &SeqSet, _op: FlagOp, _flags: &[Flag]) -> Result<()> {
        Err(Error::Unsupported("POP3 has no message flags".into()))
    }

    async fn list_mailboxes(&mut self) -> Result<Vec<String>> {
        Ok(vec!["Inbox".to_string()])
    }

    async fn logout(&mut self) -> Result<()> {
        self.command("QUIT").await.map(|_| ())
    }
}

/// Envelope of a POP3 message: the raw header values, with only RFC
/// 2047 encoded words decoded.
fn envelope_from_headers(seq: u32, raw: &[u8]) -> Envelope {
    let Ok((headers, _)) = mailparse::parse_headers(raw) else {
        return Envelope {
            uid: seq,
            ..Envelope::default()
        };
    };

    let value = |name: &str| headers.get_first_value(name).unwrap_or_default();
    let addresses = |name: &str| Addresses::Raw(value(name));

    Envelope {
        uid: seq,
        date: headers
            .get_first_value("Date")
            .map_or(MailDate::Unknown, MailDate::Raw),
        subject: value("Subject"),
        from: addresses("From"),
        sender: addresses("Sender"),
        reply_to: addresses("Reply-To"),
        to: addresses("To"),
        cc: addresses("Cc"),
        bcc: addresses("Bcc"),
        in_reply_to: value("In-Reply-To"),
        message_id: value("Message-ID"),
    }
}
