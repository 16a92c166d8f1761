use crossbeam_channel::{unbounded, Receiver};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::performer::CancelFlag;
use super::token::SearchToken;
use crate::metrics::SearchMetrics;
use crate::results::SharedResult;

/// Default number of results per emitted batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

type Deliver = Box<dyn Fn(Vec<SharedResult>) + Send + Sync>;

/// Where a running performer sends its result batches.
///
/// Every task (one `perform` or one `crawl`) gets its own sink. The sink
/// refuses batches once the performer is cancelled or its deadline has
/// passed; refused batches are dropped.
pub struct ResultSink {
    token: SearchToken,
    cancel: CancelFlag,
    deadline: Option<Instant>,
    timed_out: AtomicBool,
    batch_size: usize,
    metrics: SearchMetrics,
    deliver: Deliver,
}

impl fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSink")
            .field("token", &self.token)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl ResultSink {
    pub(crate) fn new(
        token: SearchToken,
        cancel: CancelFlag,
        timeout: Option<Duration>,
        batch_size: usize,
        metrics: SearchMetrics,
        deliver: impl Fn(Vec<SharedResult>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            token,
            cancel,
            deadline: timeout.map(|t| Instant::now() + t),
            timed_out: AtomicBool::new(false),
            batch_size: batch_size.max(1),
            metrics,
            deliver: Box::new(deliver),
        }
    }

    /// A sink outside any dispatcher; accepted batches arrive on the receiver.
    ///
    /// Useful for driving a performer directly, e.g. in tests.
    pub fn detached(
        token: SearchToken,
        cancel: CancelFlag,
        batch_size: usize,
    ) -> (Self, Receiver<Vec<SharedResult>>) {
        let (tx, rx) = unbounded();
        let sink = Self::new(
            token,
            cancel,
            None,
            batch_size,
            SearchMetrics::new(),
            move |batch| {
                // The receiver may be gone; the performer does not care.
                let _ = tx.send(batch);
            },
        );
        (sink, rx)
    }

    pub fn token(&self) -> SearchToken {
        self.token
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn past_deadline(&self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.timed_out.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// True once the performer should stop producing results
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.past_deadline()
    }

    /// True once the deadline has passed, whether or not the performer
    /// checked the sink in the meantime
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst) || self.past_deadline()
    }

    /// Hands a batch to the dispatcher.
    ///
    /// Returns `false`, dropping the batch, when the performer is cancelled
    /// or past its deadline.
    pub fn emit(&self, batch: Vec<SharedResult>) -> bool {
        if self.is_cancelled() {
            if !batch.is_empty() {
                debug!(
                    "Dropping batch of {} results for session {}",
                    batch.len(),
                    self.token
                );
                self.metrics.record_dropped_batch();
            }
            return false;
        }
        if batch.is_empty() {
            return true;
        }
        trace!("Emitting {} results for session {}", batch.len(), self.token);
        (self.deliver)(batch);
        true
    }

    /// Collects single results into batches of `batch_size`
    pub fn batcher(&self) -> ResultBatcher<'_> {
        ResultBatcher {
            sink: self,
            pending: Vec::with_capacity(self.batch_size),
        }
    }
}

/// Accumulates results and emits them a batch at a time.
///
/// Pending results are not flushed on drop; call [`ResultBatcher::flush`].
#[derive(Debug)]
pub struct ResultBatcher<'a> {
    sink: &'a ResultSink,
    pending: Vec<SharedResult>,
}

impl ResultBatcher<'_> {
    /// Queues a result, emitting a full batch when one is ready.
    ///
    /// Returns `false` once the sink refuses batches.
    pub fn push(&mut self, result: SharedResult) -> bool {
        self.pending.push(result);
        if self.pending.len() >= self.sink.batch_size {
            return self.flush();
        }
        !self.sink.is_cancelled()
    }

    /// Emits whatever is pending
    pub fn flush(&mut self) -> bool {
        let batch = std::mem::replace(&mut self.pending, Vec::with_capacity(self.sink.batch_size));
        self.sink.emit(batch)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}
