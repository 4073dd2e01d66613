//! Mail reader facade
//!
//! [`MailReader`] is the entry point of the crate. It checks the
//! configuration, opens one session per operation with the protocol
//! client matching the server, hands the session to the bulk or
//! polling driver, and always logs out afterwards.

use crate::bulk::BulkDriver;
use crate::config::ReaderConfig;
use crate::error::{Error, Result};
use crate::folder::Folder;
use crate::imap::ImapSession;
use crate::model::{Mail, ScanContext, ScanMethod};
use crate::observer::{NoopObserver, ReaderEvent, ReaderObserver};
use crate::poll::PollingDriver;
use crate::pop3::Pop3Session;
use crate::server::ReaderType;
use crate::session::MailSession;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reads mail from one account.
///
/// # Examples
///
/// ```no_run
/// use mail_reader::{Folder, MailReader, ReaderConfig, ReaderType, ServerIdentity};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> mail_reader::Result<()> {
/// let config = ReaderConfig::new(ServerIdentity::GmailImap, "me@gmail.com", "app-password");
/// let reader = MailReader::new(ReaderType::Imap, config)?;
///
/// let otp = reader
///     .latest_message_of(&Folder::Inbox, "me@gmail.com", &CancellationToken::new())
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct MailReader {
    reader_type: ReaderType,
    config: ReaderConfig,
    observer: Arc<dyn ReaderObserver>,
}

impl MailReader {
    /// Create a reader for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ServerNotImplemented`] if the configured server
    /// does not speak `reader_type`.
    pub fn new(reader_type: ReaderType, config: ReaderConfig) -> Result<Self> {
        if config.server.reader_type() != reader_type {
            return Err(Error::ServerNotImplemented(format!(
                "{} is not a {} server",
                config.server.host(),
                reader_type
            )));
        }

        Ok(Self {
            reader_type,
            config,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Report progress to `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ReaderObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub const fn reader_type(&self) -> ReaderType {
        self.reader_type
    }

    #[must_use]
    pub const fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Fetch every message in `folder`.
    ///
    /// # Errors
    ///
    /// Returns connection, login, SELECT and FETCH errors. Nothing is
    /// returned when the fetch fails part way.
    pub async fn box_get_all(&self, folder: &Folder) -> Result<Vec<Mail>> {
        let mailbox = folder.name_for(&self.config.server);
        let context = self.context(mailbox);

        let mut session = self.open().await?;
        let result = BulkDriver::new(session.as_mut(), &context, self.observer.as_ref())
            .run(mailbox)
            .await;
        close(session.as_mut()).await;
        result
    }

    /// [`MailReader::box_get_all`], serialized as a JSON array.
    ///
    /// # Errors
    ///
    /// Same as [`MailReader::box_get_all`], plus [`Error::Json`].
    pub async fn box_get_all_json(&self, folder: &Folder) -> Result<Vec<u8>> {
        let mails = self.box_get_all(folder).await?;
        Ok(serde_json::to_vec(&mails)?)
    }

    /// Wait for the newest unseen message to `receiver` in `folder`,
    /// mark it seen and return it. Returns `Ok(None)` if `cancel`
    /// fires first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for POP3 readers, before any
    /// connection is made, and otherwise connection, login, SELECT,
    /// SEARCH and FETCH errors.
    pub async fn latest_message_of(
        &self,
        folder: &Folder,
        receiver: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Mail>> {
        if self.reader_type == ReaderType::Pop3 {
            return Err(Error::Unsupported(
                "POP3 cannot search for unseen messages".into(),
            ));
        }

        let mailbox = folder.name_for(&self.config.server);
        let context = self.context(mailbox);

        let mut session = self.open().await?;
        let result = PollingDriver::new(
            session.as_mut(),
            &self.config.polling,
            &context,
            self.observer.as_ref(),
        )
        .run(mailbox, receiver, cancel)
        .await;
        close(session.as_mut()).await;
        result
    }

    /// Names of the mailboxes on the server.
    ///
    /// # Errors
    ///
    /// Returns connection, login and LIST errors.
    pub async fn list_folders(&self) -> Result<Vec<String>> {
        let mut session = self.open().await?;
        let result = session.list_mailboxes().await;
        close(session.as_mut()).await;
        result
    }

    async fn open(&self) -> Result<Box<dyn MailSession>> {
        let address = self.config.server.address();
        self.observer.on_event(&ReaderEvent::Dialing { address: &address });

        let session: Box<dyn MailSession> = match self.reader_type {
            ReaderType::Imap => Box::new(ImapSession::connect(&self.config).await?),
            ReaderType::Pop3 => Box::new(Pop3Session::connect(&self.config).await?),
        };

        self.observer.on_event(&ReaderEvent::LoggedIn {
            user: &self.config.user,
        });
        Ok(session)
    }

    fn context(&self, mailbox: &str) -> ScanContext {
        ScanContext {
            mailbox: mailbox.to_string(),
            scan_method: match self.reader_type {
                ReaderType::Imap => ScanMethod::Imap,
                ReaderType::Pop3 => ScanMethod::Pop3,
            },
            account: self.config.user.clone(),
        }
    }
}

/// Log out, logging rather than returning a failure.
async fn close(session: &mut dyn MailSession) {
    match session.logout().await {
        Ok(()) => debug!("Logged out"),
        Err(e) => warn!("Logout failed: {}", e),
    }
}
