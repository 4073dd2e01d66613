//! Protocol-neutral mail session
//!
//! [`MailSession`] is the seam between the fetch drivers and the wire:
//! the IMAP and POP3 clients implement it, and the drivers only ever
//! talk to it. Fetch results are streamed into an `mpsc` channel so
//! that a driver can inspect messages while the server is still
//! sending them.

use crate::error::{Error, Result};
use crate::flag::{Flag, FlagOp};
use crate::mime;
use crate::model::{Envelope, Mail, ScanContext};
use crate::observer::{ReaderEvent, ReaderObserver};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use tokio::sync::mpsc;
use tracing::warn;

/// Capacity of the channel between a fetch and its consumer.
pub const FETCH_CHANNEL_CAPACITY: usize = 10;

/// State of a freshly selected mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MailboxInfo {
    /// Number of messages in the mailbox.
    pub exists: u32,
}

/// A set of message sequence numbers.
///
/// # Examples
///
/// ```
/// use mail_reader::SeqSet;
///
/// assert_eq!(SeqSet::range(1, 5).to_string(), "1:5");
/// assert_eq!(SeqSet::list(vec![2, 5]).to_string(), "2,5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeqSet {
    Range { start: u32, end: u32 },
    List(Vec<u32>),
}

impl SeqSet {
    #[must_use]
    pub const fn range(start: u32, end: u32) -> Self {
        Self::Range { start, end }
    }

    #[must_use]
    pub fn single(seq: u32) -> Self {
        Self::List(vec![seq])
    }

    #[must_use]
    pub const fn list(seqs: Vec<u32>) -> Self {
        Self::List(seqs)
    }

    /// The members of the set that exist in a mailbox of `exists`
    /// messages, in set order.
    #[must_use]
    pub fn within(&self, exists: u32) -> Vec<u32> {
        match self {
            Self::Range { start, end } => {
                let (lo, hi) = if start <= end { (*start, *end) } else { (*end, *start) };
                (lo.max(1)..=hi.min(exists)).collect()
            }
            Self::List(seqs) => seqs
                .iter()
                .copied()
                .filter(|seq| (1..=exists).contains(seq))
                .collect(),
        }
    }
}

impl fmt::Display for SeqSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Range { start, end } => write!(f, "{start}:{end}"),
            Self::List(seqs) => {
                let rendered: Vec<String> = seqs.iter().map(u32::to_string).collect();
                f.write_str(&rendered.join(","))
            }
        }
    }
}

/// What a SEARCH looks for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchCriteria {
    /// Only messages without `\Seen`.
    pub unseen: bool,
    /// Only messages with an internal date on or after this day. IMAP
    /// compares whole days; the time of day is ignored.
    pub since: Option<DateTime<Utc>>,
}

impl SearchCriteria {
    /// Unseen messages received since `since`.
    #[must_use]
    pub const fn unseen_since(since: DateTime<Utc>) -> Self {
        Self {
            unseen: true,
            since: Some(since),
        }
    }

    /// Render as an IMAP SEARCH key list.
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use mail_reader::SearchCriteria;
    ///
    /// let since = Utc.with_ymd_and_hms(2026, 10, 8, 9, 30, 0).unwrap();
    /// let criteria = SearchCriteria::unseen_since(since);
    /// assert_eq!(criteria.to_imap_query(), "UNSEEN SINCE 8-Oct-2026");
    /// ```
    #[must_use]
    pub fn to_imap_query(&self) -> String {
        let mut keys = Vec::new();
        if self.unseen {
            keys.push("UNSEEN".to_string());
        }
        if let Some(since) = self.since {
            keys.push(format!("SINCE {}", since.format("%-d-%b-%Y")));
        }
        if keys.is_empty() {
            return "ALL".to_string();
        }
        keys.join(" ")
    }
}

/// Which data items a FETCH asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchItems {
    pub uid: bool,
    pub envelope: bool,
    /// The whole raw message, fetched without setting `\Seen`.
    pub full_body: bool,
}

impl FetchItems {
    /// Envelope only, used to pick a candidate.
    pub const ENVELOPE: Self = Self {
        uid: false,
        envelope: true,
        full_body: false,
    };

    /// Everything needed to build a [`Mail`](crate::Mail).
    pub const FULL: Self = Self {
        uid: true,
        envelope: true,
        full_body: true,
    };

    /// Render as an IMAP FETCH data item list.
    #[must_use]
    pub fn to_imap_query(self) -> String {
        let mut items = Vec::new();
        if self.uid {
            items.push("UID");
        }
        if self.envelope {
            items.push("ENVELOPE");
        }
        if self.full_body {
            items.push("BODY.PEEK[]");
        }
        format!("({})", items.join(" "))
    }
}

/// One message as delivered by a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchedMessage {
    pub seq: u32,
    pub uid: Option<u32>,
    pub envelope: Option<Envelope>,
    /// Raw body literals, one per requested body section.
    pub bodies: Vec<Vec<u8>>,
}

impl FetchedMessage {
    /// Decode the body and assemble the [`Mail`]. Parts that fail to
    /// decode are logged, reported to `observer` and left out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the envelope or the body is missing.
    pub fn into_mail(self, context: &ScanContext, observer: &dyn ReaderObserver) -> Result<Mail> {
        let seq = self.seq;
        let mut envelope = self
            .envelope
            .ok_or_else(|| Error::Parse(format!("message {seq} has no envelope")))?;
        if self.bodies.is_empty() {
            return Err(Error::Parse(format!("message {seq} has no body")));
        }
        if let Some(uid) = self.uid {
            envelope.uid = uid;
        }

        let decomposition = mime::decompose_all(self.bodies.iter().map(Vec::as_slice));
        for skipped in &decomposition.skipped {
            let reason = skipped.to_string();
            warn!("Skipping part of message {}: {}", seq, reason);
            observer.on_event(&ReaderEvent::PartSkipped { reason: &reason });
        }

        Ok(context.mail(envelope, decomposition.parts))
    }
}

/// An authenticated connection to a mail server.
#[async_trait]
pub trait MailSession: Send {
    /// Open a mailbox for the commands that follow.
    async fn select(&mut self, mailbox: &str) -> Result<MailboxInfo>;

    /// Sequence numbers of the messages matching `criteria`.
    async fn search(&mut self, criteria: &SearchCriteria) -> Result<Vec<u32>>;

    /// Fetch `set`, sending each message into `sink` as it arrives.
    /// The sender is dropped when the fetch ends, successfully or not.
    async fn fetch(
        &mut self,
        set: &SeqSet,
        items: FetchItems,
        sink: mpsc::Sender<FetchedMessage>,
    ) -> Result<()>;

    async fn store_flags(&mut self, set: &SeqSet, op: FlagOp, flags: &[Flag]) -> Result<()>;

    async fn list_mailboxes(&mut self) -> Result<Vec<String>>;

    async fn logout(&mut self) -> Result<()>;
}

/// Run a fetch and feed every message to `consume` while it streams.
///
/// The producer (the session's fetch) and the consumer are joined; the
/// channel is drained completely before the fetch's own result is
/// returned, so a failing fetch never loses messages that were already
/// delivered, and a successful one never returns before they were all
/// consumed.
///
/// # Errors
///
/// Returns whatever error the session's fetch returned.
pub async fn fetch_with<S, F>(
    session: &mut S,
    set: &SeqSet,
    items: FetchItems,
    mut consume: F,
) -> Result<()>
where
    S: MailSession + ?Sized,
    F: FnMut(FetchedMessage),
{
    let (tx, mut rx) = mpsc::channel(FETCH_CHANNEL_CAPACITY);
    let producer = session.fetch(set, items, tx);
    let consumer = async {
        while let Some(message) = rx.recv().await {
            consume(message);
        }
    };

    let (result, ()) = tokio::join!(producer, consumer);
    result
}
