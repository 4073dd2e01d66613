//! Mailbox folder types
//!
//! Folder names differ between providers (Gmail keeps spam under
//! `[Gmail]/Spam`, Outlook calls it `Junk`, POP3 only has one box).
//! A [`Folder`] names the folder the caller means and is resolved to
//! the server's own mailbox name with [`Folder::name_for`].

use crate::server::ServerIdentity;
use std::fmt;

/// A mailbox folder.
///
/// # Examples
///
/// ```
/// use mail_reader::{Folder, ServerIdentity};
///
/// assert_eq!(Folder::Spam.name_for(&ServerIdentity::GmailImap), "[Gmail]/Spam");
/// assert_eq!(Folder::Spam.name_for(&ServerIdentity::HotmailImap), "Junk");
/// assert_eq!(Folder::Inbox.name_for(&ServerIdentity::GmailPop3), "Inbox");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Folder {
    /// The inbox.
    Inbox,
    /// Spam / junk messages, wherever the provider keeps them.
    Spam,
    /// A mailbox addressed by its exact server-side name.
    Custom(String),
}

impl Folder {
    #[must_use]
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// The mailbox name to SELECT on `server`.
    #[must_use]
    pub fn name_for<'a>(&'a self, server: &ServerIdentity) -> &'a str {
        match self {
            Self::Inbox => server.inbox_name(),
            Self::Spam => server.spam_name(),
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbox => f.write_str("inbox"),
            Self::Spam => f.write_str("spam"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Folder {
    fn from(s: &str) -> Self {
        if s.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else if s.eq_ignore_ascii_case("spam") || s.eq_ignore_ascii_case("junk") {
            Self::Spam
        } else {
            Self::Custom(s.to_string())
        }
    }
}

impl From<String> for Folder {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}
