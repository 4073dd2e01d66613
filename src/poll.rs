//! Unseen-message polling
//!
//! [`PollingDriver`] waits for the newest unseen message addressed to a
//! given recipient. Each round selects the mailbox, searches for unseen
//! messages inside the lookback window, fetches their envelopes to
//! pick the latest one sent to the recipient, then fetches that single
//! message in full. The message is marked `\Seen` only after it has
//! been fetched and decoded.
//!
//! Rounds that find nothing, or whose chosen message cannot be
//! decoded, sleep for the configured backoff and search again. The
//! loop ends when a message is found, when the cancellation token
//! fires, or on the first protocol error.

use crate::config::PollSettings;
use crate::error::{Error, Result};
use crate::flag::{Flag, FlagOp};
use crate::model::{Mail, ScanContext};
use crate::observer::{ReaderEvent, ReaderObserver};
use crate::session::{FetchItems, MailSession, SearchCriteria, SeqSet, fetch_with};
use chrono::{DateTime, TimeDelta, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives one polling operation over an authenticated session.
pub struct PollingDriver<'a, S: MailSession + ?Sized> {
    session: &'a mut S,
    settings: &'a PollSettings,
    context: &'a ScanContext,
    observer: &'a dyn ReaderObserver,
    attempt: u32,
}

impl<'a, S: MailSession + ?Sized> PollingDriver<'a, S> {
    pub fn new(
        session: &'a mut S,
        settings: &'a PollSettings,
        context: &'a ScanContext,
        observer: &'a dyn ReaderObserver,
    ) -> Self {
        Self {
            session,
            settings,
            context,
            observer,
            attempt: 0,
        }
    }

    /// Poll `mailbox` until an unseen message to `receiver` shows up.
    ///
    /// Returns `Ok(None)` if `cancel` fires first. No command is sent
    /// once cancellation has been observed.
    ///
    /// # Errors
    ///
    /// Returns the first SELECT, SEARCH or FETCH error. Messages that
    /// cannot be decoded and failures to mark the message seen are not
    /// errors.
    pub async fn run(
        &mut self,
        mailbox: &str,
        receiver: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Mail>> {
        loop {
            if cancel.is_cancelled() {
                info!("Polling {} for {} cancelled", mailbox, receiver);
                self.observer.on_event(&ReaderEvent::Cancelled);
                return Ok(None);
            }

            let selected = self.session.select(mailbox).await?;
            self.observer.on_event(&ReaderEvent::BoxSelected {
                mailbox,
                messages: selected.exists,
            });

            let criteria = SearchCriteria::unseen_since(self.window_start());
            let candidates = self.session.search(&criteria).await?;
            self.observer.on_event(&ReaderEvent::SearchCompleted {
                candidates: candidates.len(),
            });

            if candidates.is_empty() {
                debug!("No unseen messages in {}", mailbox);
                self.backoff(cancel).await;
                continue;
            }

            let Some(seq) = self.pick_latest(candidates, receiver).await? else {
                debug!("No unseen message in {} is addressed to {}", mailbox, receiver);
                self.backoff(cancel).await;
                continue;
            };

            info!("Found message {} for {} in {}", seq, receiver, mailbox);
            self.observer.on_event(&ReaderEvent::CandidateSelected { seq });

            match self.fetch_mail(seq).await {
                Ok(mail) => {
                    self.mark_seen(seq).await;
                    self.observer.on_event(&ReaderEvent::Completed { messages: 1 });
                    return Ok(Some(mail));
                }
                Err(Error::Parse(reason)) => {
                    warn!("Failed to parse message {}: {}", seq, reason);
                    self.observer.on_event(&ReaderEvent::ParseFailed { reason: &reason });
                    self.backoff(cancel).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn window_start(&self) -> DateTime<Utc> {
        TimeDelta::from_std(self.settings.lookback)
            .ok()
            .and_then(|lookback| Utc::now().checked_sub_signed(lookback))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Fetch the candidates' envelopes while they stream in and keep
    /// the latest one addressed to `receiver`. Equal dates keep the
    /// first seen; a missing date loses to any date.
    async fn pick_latest(&mut self, candidates: Vec<u32>, receiver: &str) -> Result<Option<u32>> {
        let mut best: Option<(u32, Option<DateTime<Utc>>)> = None;

        fetch_with(
            &mut *self.session,
            &SeqSet::list(candidates),
            FetchItems::ENVELOPE,
            |message| {
                let Some(envelope) = message.envelope.as_ref() else {
                    return;
                };
                if !envelope.to.contains(receiver) {
                    return;
                }
                let date = envelope.date.instant();
                if best.is_none_or(|(_, best_date)| date > best_date) {
                    best = Some((message.seq, date));
                }
            },
        )
        .await?;

        Ok(best.map(|(seq, _)| seq))
    }

    async fn fetch_mail(&mut self, seq: u32) -> Result<Mail> {
        let mut fetched = None;
        fetch_with(
            &mut *self.session,
            &SeqSet::single(seq),
            FetchItems::FULL,
            |message| {
                if message.seq == seq && fetched.is_none() {
                    fetched = Some(message);
                }
            },
        )
        .await?;

        fetched
            .ok_or_else(|| Error::Parse(format!("message {seq} was not returned")))?
            .into_mail(self.context, self.observer)
    }

    async fn mark_seen(&mut self, seq: u32) {
        if let Err(e) = self
            .session
            .store_flags(&SeqSet::single(seq), FlagOp::Add, &[Flag::Seen])
            .await
        {
            let reason = e.to_string();
            warn!("Failed to mark message {} as seen: {}", seq, reason);
            self.observer.on_event(&ReaderEvent::MarkSeenFailed {
                seq,
                reason: &reason,
            });
        }
    }

    /// Sleep for the backoff delay, waking early on cancellation.
    async fn backoff(&mut self, cancel: &CancellationToken) {
        self.attempt += 1;
        let delay = self.settings.backoff;
        self.observer.on_event(&ReaderEvent::Backoff {
            attempt: self.attempt,
            delay,
        });

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => {}
        }
    }
}
