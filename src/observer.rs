//! Reader progress hooks
//!
//! The readers log through `tracing` on their own. A
//! [`ReaderObserver`] additionally receives structured events, for
//! callers that want to drive their own logs, metrics or tests off the
//! readers' progress without installing a subscriber.

use std::time::Duration;

/// Something that happened while reading a mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderEvent<'a> {
    Dialing { address: &'a str },
    LoggedIn { user: &'a str },
    BoxSelected { mailbox: &'a str, messages: u32 },
    SearchCompleted { candidates: usize },
    /// The polling driver is about to sleep before searching again.
    Backoff { attempt: u32, delay: Duration },
    CandidateSelected { seq: u32 },
    PartSkipped { reason: &'a str },
    ParseFailed { reason: &'a str },
    MarkSeenFailed { seq: u32, reason: &'a str },
    Cancelled,
    Completed { messages: usize },
}

/// Receives [`ReaderEvent`]s. Implementations must be cheap; they run
/// inline on the reader's task.
pub trait ReaderObserver: Send + Sync {
    fn on_event(&self, event: &ReaderEvent<'_>);
}

/// Observer that ignores everything. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ReaderObserver for NoopObserver {
    fn on_event(&self, _event: &ReaderEvent<'_>) {}
}
