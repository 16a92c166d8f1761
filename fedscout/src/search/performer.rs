use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::sink::ResultSink;
use crate::errors::ScoutResult;
use crate::results::CrawlTarget;

/// Shared cooperative cancellation signal.
///
/// Clones observe the same flag. Once cancelled a flag stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a performer inside one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformerState {
    Created,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl PerformerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for PerformerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// One backend query.
///
/// A performer receives its [`CancelFlag`] at construction and must stop
/// starting new work once it is set. Results go out through the
/// [`ResultSink`] in batches; `emit` returning `false` means the performer
/// has been cancelled or is past its deadline and should return.
///
/// ```rust,ignore
/// impl SearchPerformer for ArchivePerformer {
///     fn name(&self) -> &str { "archive" }
///     fn cancel_flag(&self) -> &CancelFlag { &self.cancel }
///
///     fn perform(&self, sink: &ResultSink) -> ScoutResult<()> {
///         let mut batch = sink.batcher();
///         for item in self.client.search(&self.query)? {
///             if !batch.push(item.into_shared()) {
///                 return Ok(());
///             }
///         }
///         batch.flush();
///         Ok(())
///     }
/// }
/// ```
///
/// Errors and panics from `perform` and `crawl` are caught by the dispatcher
/// and reported to the listener; they never affect sibling performers.
pub trait SearchPerformer: Send + Sync {
    /// Backend name used in logs and error reports
    fn name(&self) -> &str;

    fn cancel_flag(&self) -> &CancelFlag;

    fn perform(&self, sink: &ResultSink) -> ScoutResult<()>;

    /// Deepens one already emitted crawlable result.
    ///
    /// Only called when `is_crawler` is true; may run concurrently with
    /// `perform` and with other crawls of the same performer.
    fn crawl(&self, _target: CrawlTarget, _sink: &ResultSink) -> ScoutResult<()> {
        Ok(())
    }

    fn is_crawler(&self) -> bool {
        false
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag().is_cancelled()
    }
}
