/// This module implements federated search dispatch: many backend performers
/// run concurrently on worker pools and stream result batches to a single
/// listener, each callback tagged with the session it belongs to.
///
/// # Sessions and Tokens
///
/// Every search is a session identified by a `SearchToken`. Tokens only grow,
/// so "is this the newest search?" is a single comparison:
/// ```rust,ignore
/// let token = manager.search(SearchRequest::parse("ubuntu -:keyword:beta")?, performers)?;
/// // ... later, on a worker thread
/// fn on_results(&self, token: SearchToken, results: Vec<SharedResult>) {
///     if token != self.current() { return; } // superseded search
/// }
/// ```
///
/// `LatestTokenListener` packages that check.
///
/// # Worker Pools
///
/// Two rayon pools do all the work; callers never block:
///
/// 1. **perform pool** (default 3 threads) runs regular performers
/// 2. **crawl pool** (default 6 threads) runs crawler performers and every
///    `crawl` task
///
/// When all workers are busy rayon queues the task, so a burst of searches
/// degrades to waiting instead of failing.
///
/// # Batch Pipeline
///
/// Each emitted batch goes through:
/// ```rust,ignore
/// crawl split -> FilterPipeline::passes -> RelevanceRanker::rank -> listener.on_results
/// ```
/// Ranking is per batch; ordering across batches and across performers is
/// arrival order.
///
/// # Cancellation
///
/// Cancellation is cooperative. `stop()` and superseding searches set each
/// performer's `CancelFlag`; the performer observes it between batches
/// through `ResultSink::emit`. Batches already being delivered finish, and
/// `on_stopped` is emitted exactly once after the session's last task ends:
/// ```rust,ignore
/// manager.stop();
/// // on_results(token, ..)*  then  on_stopped(token), nothing for token after that
/// ```
///
/// # Failure Isolation
///
/// Each task runs inside `catch_unwind`. Errors and panics from one
/// performer become `on_error(token, ..)` callbacks and never touch sibling
/// performers or the session.
pub mod listener;
pub mod manager;
pub mod performer;
pub mod sink;
pub mod token;

pub use listener::{
    CollectedSession, LatestTokenListener, SearchListener, SessionCollector, SessionEvent,
};
pub use manager::SearchManager;
pub use performer::{CancelFlag, PerformerState, SearchPerformer};
pub use sink::{ResultBatcher, ResultSink, DEFAULT_BATCH_SIZE};
pub use token::SearchToken;
