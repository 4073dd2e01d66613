//! Message flags and STORE operations

use std::fmt;

/// An IMAP message flag. The readers only ever set `\Seen`.
///
/// # Examples
///
/// ```
/// use mail_reader::{Flag, FlagOp};
///
/// assert_eq!(Flag::Seen.as_imap_str(), "\\Seen");
/// assert_eq!(FlagOp::Add.store_query(&[Flag::Seen]), "+FLAGS.SILENT (\\Seen)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read (`\Seen`).
    Seen,
}

impl Flag {
    /// The IMAP wire representation of this flag.
    #[must_use]
    pub const fn as_imap_str(self) -> &'static str {
        match self {
            Self::Seen => "\\Seen",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_imap_str())
    }
}

/// How a STORE changes the flag list of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagOp {
    Add,
}

impl FlagOp {
    /// Render the STORE data item, always in the silent form since the
    /// readers never look at the updated flags.
    #[must_use]
    pub fn store_query(self, flags: &[Flag]) -> String {
        let prefix = match self {
            Self::Add => "+",
        };
        let list: Vec<&str> = flags.iter().copied().map(Flag::as_imap_str).collect();
        format!("{prefix}FLAGS.SILENT ({})", list.join(" "))
    }
}
