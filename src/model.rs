//! Uniform message model
//!
//! Every retrieved message, whatever protocol it came over, ends up as
//! a [`Mail`]: an [`Envelope`], the decoded [`MailPart`]s, and a few
//! fields describing the scan itself. The serialized field names are
//! part of the output contract and must not change.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The protocol a message was retrieved with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ScanMethod {
    #[serde(rename = "IMAP")]
    Imap,
    #[serde(rename = "POP3")]
    Pop3,
}

impl fmt::Display for ScanMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Imap => f.write_str("IMAP"),
            Self::Pop3 => f.write_str("POP3"),
        }
    }
}

/// An address header.
///
/// IMAP servers hand back structured address lists; POP3 only gives us
/// the raw header, which is kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Addresses {
    List(Vec<String>),
    Raw(String),
}

impl Default for Addresses {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl Addresses {
    /// Whether `address` is one of the recipients. Comparison ignores
    /// ASCII case.
    #[must_use]
    pub fn contains(&self, address: &str) -> bool {
        match self {
            Self::List(list) => list.iter().any(|a| a.eq_ignore_ascii_case(address)),
            Self::Raw(raw) => mailparse::addrparse(raw).is_ok_and(|parsed| {
                parsed.iter().any(|addr| match addr {
                    mailparse::MailAddr::Single(info) => info.addr.eq_ignore_ascii_case(address),
                    mailparse::MailAddr::Group(group) => group
                        .addrs
                        .iter()
                        .any(|info| info.addr.eq_ignore_ascii_case(address)),
                })
            }),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(list) => list.is_empty(),
            Self::Raw(raw) => raw.is_empty(),
        }
    }
}

/// The `Date` of a message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(untagged)]
pub enum MailDate {
    Parsed(DateTime<Utc>),
    Raw(String),
    #[default]
    Unknown,
}

impl MailDate {
    /// Parse an RFC 2822 date, falling back to [`MailDate::Unknown`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        mailparse::dateparse(raw)
            .ok()
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map_or(Self::Unknown, Self::Parsed)
    }

    /// The instant this date denotes, when it can be known.
    #[must_use]
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Parsed(dt) => Some(*dt),
            Self::Raw(raw) => match Self::parse(raw) {
                Self::Parsed(dt) => Some(dt),
                _ => None,
            },
            Self::Unknown => None,
        }
    }
}

/// Header metadata of a message, independent of its body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Envelope {
    pub uid: u32,
    pub date: MailDate,
    pub subject: String,
    pub from: Addresses,
    pub sender: Addresses,
    pub reply_to: Addresses,
    pub to: Addresses,
    pub cc: Addresses,
    pub bcc: Addresses,
    pub in_reply_to: String,
    pub message_id: String,
}

/// One decoded content part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailPart {
    #[serde(rename = "ContentType")]
    pub content_type: String,
    #[serde(rename = "Content")]
    pub content: String,
}

/// A retrieved message, ready to hand to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mail {
    #[serde(flatten)]
    pub envelope: Envelope,
    pub parts: Vec<MailPart>,
    #[serde(rename = "box")]
    pub mailbox: String,
    #[serde(rename = "scant_at")]
    pub scanned_at: DateTime<Utc>,
    pub scan_method: ScanMethod,
    pub email: String,
}

/// Where and by whom a scan is made; stamped onto every [`Mail`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanContext {
    pub mailbox: String,
    pub scan_method: ScanMethod,
    pub account: String,
}

impl ScanContext {
    /// Assemble a [`Mail`], taking the scan time now.
    #[must_use]
    pub fn mail(&self, envelope: Envelope, parts: Vec<MailPart>) -> Mail {
        Mail {
            envelope,
            parts,
            mailbox: self.mailbox.clone(),
            scanned_at: Utc::now(),
            scan_method: self.scan_method,
            email: self.account.clone(),
        }
    }
}
