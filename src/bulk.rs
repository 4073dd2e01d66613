//! Whole-mailbox retrieval

use crate::error::Result;
use crate::model::{Mail, ScanContext};
use crate::observer::{ReaderEvent, ReaderObserver};
use crate::session::{FetchItems, FetchedMessage, MailSession, SeqSet, fetch_with};
use tracing::{info, warn};

/// Fetches every message of a mailbox over an authenticated session.
pub struct BulkDriver<'a, S: MailSession + ?Sized> {
    session: &'a mut S,
    context: &'a ScanContext,
    observer: &'a dyn ReaderObserver,
}

impl<'a, S: MailSession + ?Sized> BulkDriver<'a, S> {
    pub fn new(
        session: &'a mut S,
        context: &'a ScanContext,
        observer: &'a dyn ReaderObserver,
    ) -> Self {
        Self {
            session,
            context,
            observer,
        }
    }

    /// Fetch and decode all messages of `mailbox`, in mailbox order.
    ///
    /// Messages without an envelope or body are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns the SELECT or FETCH error. A failed fetch discards the
    /// messages already received.
    pub async fn run(&mut self, mailbox: &str) -> Result<Vec<Mail>> {
        let selected = self.session.select(mailbox).await?;
        self.observer.on_event(&ReaderEvent::BoxSelected {
            mailbox,
            messages: selected.exists,
        });

        if selected.exists == 0 {
            info!("{} is empty", mailbox);
            self.observer.on_event(&ReaderEvent::Completed { messages: 0 });
            return Ok(Vec::new());
        }

        let mut received: Vec<FetchedMessage> = Vec::with_capacity(selected.exists as usize);
        fetch_with(
            &mut *self.session,
            &SeqSet::range(1, selected.exists),
            FetchItems::FULL,
            |message| received.push(message),
        )
        .await?;

        let mut mails = Vec::with_capacity(received.len());
        for message in received {
            let seq = message.seq;
            match message.into_mail(self.context, self.observer) {
                Ok(mail) => mails.push(mail),
                Err(e) => {
                    let reason = e.to_string();
                    warn!("Skipping message {} in {}: {}", seq, mailbox, reason);
                    self.observer.on_event(&ReaderEvent::ParseFailed { reason: &reason });
                }
            }
        }

        info!("Fetched {} messages from {}", mails.len(), mailbox);
        self.observer.on_event(&ReaderEvent::Completed {
            messages: mails.len(),
        });
        Ok(mails)
    }
}
