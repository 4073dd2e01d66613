//! Proxy-aware IMAP/POP3 mailbox reader
//!
//! Reads mail over IMAP or POP3 with implicit TLS, connecting directly
//! or through an HTTP `CONNECT` or SOCKS5 proxy. Messages come back as
//! [`Mail`] values: the envelope, the decoded MIME parts, and where and
//! when they were read.
//!
//! Two operations sit on top of a [`MailReader`]:
//!
//! - [`MailReader::box_get_all`] fetches a whole folder.
//! - [`MailReader::latest_message_of`] polls a folder until an unseen
//!   message for a given recipient arrives (an OTP mail, typically),
//!   then marks it seen.

mod bulk;
mod config;
mod error;
mod flag;
mod folder;
mod imap;
mod mime;
mod model;
mod observer;
mod poll;
mod pop3;
mod proxy;
mod reader;
mod server;
mod session;
mod tls;

pub use bulk::BulkDriver;
pub use config::{PollSettings, ReaderConfig};
pub use error::{Error, Result};
pub use flag::{Flag, FlagOp};
pub use folder::Folder;
pub use imap::ImapSession;
pub use mime::{Decomposition, MimeError, decompose, decompose_all};
pub use model::{Addresses, Envelope, Mail, MailDate, MailPart, ScanContext, ScanMethod};
pub use observer::{NoopObserver, ReaderEvent, ReaderObserver};
pub use poll::PollingDriver;
pub use pop3::Pop3Session;
pub use proxy::{Dialer, HttpConnectTunnel, ProxyConfig, ProxyKind, Socks5Dialer};
pub use reader::MailReader;
pub use server::{ReaderType, ServerIdentity};
pub use session::{
    FETCH_CHANNEL_CAPACITY, FetchItems, FetchedMessage, MailSession, MailboxInfo, SearchCriteria,
    SeqSet, fetch_with,
};
