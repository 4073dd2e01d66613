//! Reader types and mail server identities
//!
//! A [`ServerIdentity`] is picked once at configuration time and
//! carries everything the readers need to know about a server: the
//! protocol it speaks, its hostname and port, and which mailbox names
//! it uses for well-known folders.

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// The protocol a reader speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderType {
    Imap,
    Pop3,
}

impl ReaderType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Imap => "imap",
            Self::Pop3 => "pop3",
        }
    }

    /// Implicit-TLS port used when a server does not override it.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Imap => 993,
            Self::Pop3 => 995,
        }
    }
}

impl fmt::Display for ReaderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReaderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imap" => Ok(Self::Imap),
            "pop3" => Ok(Self::Pop3),
            other => Err(Error::InvalidReaderType(other.to_string())),
        }
    }
}

/// A mail server the readers know how to talk to.
///
/// The four well-known variants are the Gmail and Outlook/Hotmail
/// endpoints. [`ServerIdentity::Custom`] covers anything else, such as
/// a self-hosted server or a local test server.
///
/// # Examples
///
/// ```
/// use mail_reader::{ReaderType, ServerIdentity};
///
/// let gmail: ServerIdentity = "imap.gmail.com".parse().unwrap();
/// assert_eq!(gmail, ServerIdentity::GmailImap);
/// assert_eq!(gmail.port(), 993);
/// assert_eq!(gmail.reader_type(), ReaderType::Imap);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerIdentity {
    GmailImap,
    HotmailImap,
    GmailPop3,
    HotmailPop3,
    Custom {
        reader_type: ReaderType,
        host: String,
        port: u16,
    },
}

impl ServerIdentity {
    #[must_use]
    pub fn custom(reader_type: ReaderType, host: impl Into<String>, port: u16) -> Self {
        Self::Custom {
            reader_type,
            host: host.into(),
            port,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            Self::GmailImap => "imap.gmail.com",
            Self::HotmailImap => "imap-mail.outlook.com",
            Self::GmailPop3 => "pop.gmail.com",
            Self::HotmailPop3 => "pop-mail.outlook.com",
            Self::Custom { host, .. } => host,
        }
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        match self {
            Self::Custom { port, .. } => *port,
            _ => self.reader_type().default_port(),
        }
    }

    #[must_use]
    pub const fn reader_type(&self) -> ReaderType {
        match self {
            Self::GmailImap | Self::HotmailImap => ReaderType::Imap,
            Self::GmailPop3 | Self::HotmailPop3 => ReaderType::Pop3,
            Self::Custom { reader_type, .. } => *reader_type,
        }
    }

    /// `host:port` as handed to the dialer.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    /// Mailbox name of the inbox on this server.
    #[must_use]
    pub const fn inbox_name(&self) -> &'static str {
        match self.reader_type() {
            ReaderType::Imap => "INBOX",
            ReaderType::Pop3 => "Inbox",
        }
    }

    /// Mailbox name of the spam folder on this server.
    #[must_use]
    pub const fn spam_name(&self) -> &'static str {
        match self {
            Self::GmailImap => "[Gmail]/Spam",
            Self::GmailPop3
            | Self::HotmailPop3
            | Self::Custom {
                reader_type: ReaderType::Pop3,
                ..
            } => "Inbox",
            Self::HotmailImap | Self::Custom { .. } => "Junk",
        }
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.address(), self.reader_type())
    }
}

impl FromStr for ServerIdentity {
    type Err = Error;

    /// Recognize a well-known server by hostname.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "imap.gmail.com" => Ok(Self::GmailImap),
            "imap-mail.outlook.com" => Ok(Self::HotmailImap),
            "pop.gmail.com" => Ok(Self::GmailPop3),
            "pop-mail.outlook.com" => Ok(Self::HotmailPop3),
            other => Err(Error::ServerNotImplemented(other.to_string())),
        }
    }
}
