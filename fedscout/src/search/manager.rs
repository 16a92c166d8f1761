use dashmap::DashMap;
use once_cell::sync::OnceCell;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use super::listener::SearchListener;
use super::performer::{PerformerState, SearchPerformer};
use super::sink::ResultSink;
use super::token::SearchToken;
use crate::config::EngineConfig;
use crate::errors::{ScoutResult, SearchError};
use crate::metrics::SearchMetrics;
use crate::query::SearchRequest;
use crate::ranking::RelevanceRanker;
use crate::results::{CrawlTarget, SharedResult};

static GLOBAL: OnceCell<SearchManager> = OnceCell::new();

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// A performer scheduled in a session, with its lifecycle state
struct Tracked {
    performer: Arc<dyn SearchPerformer>,
    state: Mutex<PerformerState>,
}

impl Tracked {
    fn set_state(&self, state: PerformerState) {
        *lock(&self.state) = state;
    }

    fn state(&self) -> PerformerState {
        *lock(&self.state)
    }
}

#[derive(Default)]
struct SessionState {
    /// Perform and crawl tasks scheduled but not finished
    pending: usize,
    stopping: bool,
    completed: bool,
    performers: Vec<Arc<Tracked>>,
}

struct Session {
    token: SearchToken,
    request: SearchRequest,
    state: Mutex<SessionState>,
}

impl Session {
    fn new(token: SearchToken, request: SearchRequest) -> Self {
        Self {
            token,
            request,
            state: Mutex::new(SessionState::default()),
        }
    }
}

struct ManagerInner {
    perform_pool: ThreadPool,
    crawl_pool: ThreadPool,
    listener: RwLock<Option<Arc<dyn SearchListener>>>,
    sessions: DashMap<u64, Arc<Session>>,
    current: AtomicU64,
    next_token: AtomicU64,
    ranker: RelevanceRanker,
    batch_size: usize,
    performer_timeout: Option<Duration>,
    metrics: SearchMetrics,
}

/// Dispatches performers onto worker pools and funnels their results to a
/// single listener, scoped by session token.
///
/// Every batch a performer emits goes through the session's filter
/// pipeline, then relevance ranking when the session has a query, then to
/// the listener. Crawlable results are handed to the performer's `crawl`
/// on the crawl pool; incomplete ones are only crawled, never delivered.
///
/// Starting a session supersedes the previous one: its performers are
/// cancelled and whatever they still deliver carries the old token.
///
/// `SearchManager` is a cheap handle; clones share the same pools and
/// sessions.
#[derive(Clone)]
pub struct SearchManager {
    inner: Arc<ManagerInner>,
}

impl SearchManager {
    pub fn new(config: &EngineConfig) -> ScoutResult<Self> {
        config.validate()?;

        let perform_pool = ThreadPoolBuilder::new()
            .num_threads(config.perform_threads.get())
            .thread_name(|i| format!("fedscout-perform-{}", i))
            .panic_handler(|payload| {
                error!("Perform worker panicked: {}", panic_message(payload.as_ref()))
            })
            .build()
            .map_err(|e| SearchError::worker_pool(e.to_string()))?;
        let crawl_pool = ThreadPoolBuilder::new()
            .num_threads(config.crawl_threads.get())
            .thread_name(|i| format!("fedscout-crawl-{}", i))
            .panic_handler(|payload| {
                error!("Crawl worker panicked: {}", panic_message(payload.as_ref()))
            })
            .build()
            .map_err(|e| SearchError::worker_pool(e.to_string()))?;

        info!(
            "Search manager ready with {} perform and {} crawl threads",
            config.perform_threads, config.crawl_threads
        );

        Ok(Self {
            inner: Arc::new(ManagerInner {
                perform_pool,
                crawl_pool,
                listener: RwLock::new(None),
                sessions: DashMap::new(),
                current: AtomicU64::new(0),
                next_token: AtomicU64::new(1),
                ranker: RelevanceRanker::new()
                    .with_stopwords_removed(config.remove_stopwords)
                    .with_parallel_threshold(config.parallel_rank_threshold),
                batch_size: config.batch_size,
                performer_timeout: config.performer_deadline()?,
                metrics: SearchMetrics::new(),
            }),
        })
    }

    /// Process-wide manager built from the default configuration on first use.
    ///
    /// Prefer passing an explicit `SearchManager` around; this exists for the
    /// outermost composition point.
    pub fn global() -> ScoutResult<&'static SearchManager> {
        GLOBAL.get_or_try_init(|| Self::new(&EngineConfig::default()))
    }

    /// Replaces the listener receiving all callbacks
    pub fn set_listener(&self, listener: Arc<dyn SearchListener>) {
        let mut slot = self
            .inner
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(listener);
    }

    pub fn metrics(&self) -> &SearchMetrics {
        &self.inner.metrics
    }

    /// Token of the newest session, if any was started
    pub fn current_token(&self) -> Option<SearchToken> {
        match self.inner.current.load(Ordering::SeqCst) {
            0 => None,
            raw => Some(SearchToken::from_raw(raw)),
        }
    }

    /// Starts a session for `request`, superseding the current one.
    ///
    /// The new session has no performers yet; add them with `perform_in`.
    pub fn begin(&self, request: SearchRequest) -> SearchToken {
        let inner = &self.inner;
        let token = SearchToken::from_raw(inner.next_token.fetch_add(1, Ordering::SeqCst));
        info!(
            "Starting session {} for '{}' with {} filters",
            token,
            request.query(),
            request.filters().len()
        );

        let session = Arc::new(Session::new(token, request));
        inner.sessions.insert(token.get(), session);
        inner.metrics.record_session();

        let previous = inner.current.swap(token.get(), Ordering::SeqCst);
        if previous != 0 {
            let superseded = inner.sessions.get(&previous).map(|s| Arc::clone(s.value()));
            if let Some(superseded) = superseded {
                debug!("Session {} superseded by {}", superseded.token, token);
                inner.stop_session(&superseded);
            }
        }
        token
    }

    /// Adds a performer to a live session.
    ///
    /// Fails with `StaleToken` when `token` is not the current session and
    /// with `SessionClosed` when the session was stopped or has already
    /// completed. A session completes as soon as its last task finishes, so
    /// performers meant to run together should be passed to `search`.
    pub fn perform_in(
        &self,
        token: SearchToken,
        performer: Arc<dyn SearchPerformer>,
    ) -> ScoutResult<()> {
        let session = self.inner.live_session(token)?;
        self.inner.schedule(&session, vec![performer])
    }

    /// Starts a session and schedules all `performers` in it at once.
    ///
    /// With no performers the session completes immediately.
    pub fn search(
        &self,
        request: SearchRequest,
        performers: Vec<Arc<dyn SearchPerformer>>,
    ) -> ScoutResult<SearchToken> {
        let token = self.begin(request);
        let session = self.inner.live_session(token)?;
        if performers.is_empty() {
            debug!("Session {} has no performers", token);
            self.inner.stop_session(&session);
            return Ok(token);
        }
        self.inner.schedule(&session, performers)?;
        Ok(token)
    }

    /// Starts an unfiltered, unranked session running one performer
    pub fn perform(&self, performer: Arc<dyn SearchPerformer>) -> ScoutResult<SearchToken> {
        self.search(SearchRequest::default(), vec![performer])
    }

    /// Cancels every performer of the current session.
    ///
    /// Returns immediately; `on_stopped` follows once the last in-flight
    /// task has finished.
    pub fn stop(&self) {
        let Some(token) = self.current_token() else {
            return;
        };
        let session = self.inner.sessions.get(&token.get()).map(|s| Arc::clone(s.value()));
        match session {
            Some(session) => {
                info!("Stopping session {}", token);
                self.inner.stop_session(&session);
            }
            None => trace!("Session {} already completed", token),
        }
    }

    /// Name and state of every performer in a live session
    pub fn performer_states(&self, token: SearchToken) -> Option<Vec<(String, PerformerState)>> {
        let session = self.inner.sessions.get(&token.get()).map(|s| Arc::clone(s.value()))?;
        let state = lock(&session.state);
        Some(
            state
                .performers
                .iter()
                .map(|t| (t.performer.name().to_string(), t.state()))
                .collect(),
        )
    }

    /// True while `token`'s session still has tasks or awaits `stop`
    pub fn is_active(&self, token: SearchToken) -> bool {
        self.inner.sessions.contains_key(&token.get())
    }
}

impl ManagerInner {
    fn listener(&self) -> Option<Arc<dyn SearchListener>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn live_session(&self, token: SearchToken) -> ScoutResult<Arc<Session>> {
        if self.current.load(Ordering::SeqCst) != token.get() {
            return Err(SearchError::StaleToken(token.get()));
        }
        self.sessions
            .get(&token.get())
            .map(|s| Arc::clone(s.value()))
            .ok_or(SearchError::SessionClosed(token.get()))
    }

    fn schedule(
        self: &Arc<Self>,
        session: &Arc<Session>,
        performers: Vec<Arc<dyn SearchPerformer>>,
    ) -> ScoutResult<()> {
        let tracked: Vec<Arc<Tracked>> = performers
            .into_iter()
            .map(|performer| {
                Arc::new(Tracked {
                    performer,
                    state: Mutex::new(PerformerState::Created),
                })
            })
            .collect();

        {
            let mut state = lock(&session.state);
            if state.stopping || state.completed {
                return Err(SearchError::SessionClosed(session.token.get()));
            }
            // Count every task before any can finish, so the session cannot
            // complete between two of them.
            state.pending += tracked.len();
            state.performers.extend(tracked.iter().cloned());
        }

        for task in tracked {
            self.metrics.record_performer();
            let pool = if task.performer.is_crawler() {
                &self.crawl_pool
            } else {
                &self.perform_pool
            };
            debug!(
                "Scheduling performer {} in session {}",
                task.performer.name(),
                session.token
            );
            let inner = Arc::clone(self);
            let session = Arc::clone(session);
            pool.spawn(move || inner.run_perform(&session, &task));
        }
        Ok(())
    }

    fn schedule_crawl(
        self: &Arc<Self>,
        session: &Arc<Session>,
        performer: &Arc<dyn SearchPerformer>,
        target: CrawlTarget,
    ) {
        if performer.is_cancelled() {
            warn!(
                "Not crawling '{}': performer {} was stopped",
                target.result().display_name(),
                performer.name()
            );
            return;
        }
        {
            let mut state = lock(&session.state);
            if state.completed {
                warn!("Not crawling in completed session {}", session.token);
                return;
            }
            state.pending += 1;
        }
        self.metrics.record_crawl();
        trace!(
            "Crawling '{}' with {}",
            target.result().display_name(),
            performer.name()
        );

        let inner = Arc::clone(self);
        let session = Arc::clone(session);
        let performer = Arc::clone(performer);
        self.crawl_pool
            .spawn(move || inner.run_crawl(&session, &performer, target));
    }

    fn sink_for(self: &Arc<Self>, session: &Arc<Session>, performer: &Arc<dyn SearchPerformer>) -> ResultSink {
        let inner = Arc::clone(self);
        let target_session = Arc::clone(session);
        let target_performer = Arc::clone(performer);
        ResultSink::new(
            session.token,
            performer.cancel_flag().clone(),
            self.performer_timeout,
            self.batch_size,
            self.metrics.clone(),
            move |batch| inner.handle_batch(&target_session, &target_performer, batch),
        )
    }

    fn run_perform(self: &Arc<Self>, session: &Arc<Session>, task: &Tracked) {
        let performer = &task.performer;
        if performer.is_cancelled() {
            debug!("Performer {} cancelled before it started", performer.name());
            task.set_state(PerformerState::Cancelled);
            self.finish_task(session);
            return;
        }

        task.set_state(PerformerState::Running);
        let sink = self.sink_for(session, performer);
        let outcome = catch_unwind(AssertUnwindSafe(|| performer.perform(&sink)));
        let state = self.settle(session, performer.as_ref(), &sink, outcome);
        info!(
            "Performer {} in session {} {}",
            performer.name(),
            session.token,
            state
        );
        task.set_state(state);
        self.finish_task(session);
    }

    fn run_crawl(
        self: &Arc<Self>,
        session: &Arc<Session>,
        performer: &Arc<dyn SearchPerformer>,
        target: CrawlTarget,
    ) {
        let sink = self.sink_for(session, performer);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            if performer.is_cancelled() {
                return Ok(());
            }
            performer.crawl(target, &sink)
        }));
        let state = self.settle(session, performer.as_ref(), &sink, outcome);
        debug!("Crawl by {} {}", performer.name(), state);
        self.finish_task(session);
    }

    /// Reports the outcome of a task and maps it to a performer state
    fn settle(
        &self,
        session: &Session,
        performer: &dyn SearchPerformer,
        sink: &ResultSink,
        outcome: std::thread::Result<ScoutResult<()>>,
    ) -> PerformerState {
        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(payload) => Some(SearchError::backend(
                performer.name(),
                format!("panicked: {}", panic_message(payload.as_ref())),
            )),
        };

        // Checked after the task returns, so a performer that never touched
        // its sink is still held to the deadline.
        let failure = if sink.timed_out() {
            Some(SearchError::timeout(
                performer.name(),
                self.performer_timeout.unwrap_or_default(),
            ))
        } else {
            failure
        };

        match failure {
            Some(error) => {
                warn!("Performer {} failed: {}", performer.name(), error);
                self.notify_error(session.token, error);
                if performer.is_cancelled() {
                    PerformerState::Cancelled
                } else {
                    PerformerState::Failed
                }
            }
            None if performer.is_cancelled() => PerformerState::Cancelled,
            None => PerformerState::Completed,
        }
    }

    /// Filter, crawl, rank and deliver one emitted batch
    fn handle_batch(
        self: &Arc<Self>,
        session: &Arc<Session>,
        performer: &Arc<dyn SearchPerformer>,
        batch: Vec<SharedResult>,
    ) {
        let received = batch.len();
        let mut deliverable = Vec::with_capacity(received);

        for result in batch {
            let complete = match result.as_crawlable() {
                Some(crawlable) => crawlable.is_complete(),
                None => {
                    deliverable.push(result);
                    continue;
                }
            };
            if complete {
                deliverable.push(Arc::clone(&result));
            }
            if performer.is_crawler() {
                if let Some(target) = CrawlTarget::new(result) {
                    self.schedule_crawl(session, performer, target);
                }
            }
        }

        let unfiltered = deliverable.len();
        let filters = session.request.filters();
        if !filters.is_empty() {
            deliverable.retain(|r| filters.passes(r.as_ref()));
        }
        self.metrics
            .record_batch(received as u64, (unfiltered - deliverable.len()) as u64);

        if deliverable.is_empty() {
            return;
        }

        let query = session.request.query();
        if !query.is_empty() {
            deliverable = self.ranker.rank(deliverable, query);
        }
        self.notify_results(session.token, deliverable);
    }

    fn stop_session(&self, session: &Arc<Session>) {
        let complete_now = {
            let mut state = lock(&session.state);
            state.stopping = true;
            for task in &state.performers {
                task.performer.cancel_flag().cancel();
            }
            if state.pending == 0 && !state.completed {
                state.completed = true;
                true
            } else {
                false
            }
        };
        if complete_now {
            self.complete(session);
        }
    }

    fn finish_task(&self, session: &Arc<Session>) {
        let complete_now = {
            let mut state = lock(&session.state);
            state.pending = state.pending.saturating_sub(1);
            if state.pending == 0 && !state.completed {
                state.completed = true;
                true
            } else {
                false
            }
        };
        if complete_now {
            self.complete(session);
        }
    }

    fn complete(&self, session: &Session) {
        self.sessions.remove(&session.token.get());
        info!("Session {} stopped", session.token);
        self.notify_stopped(session.token);
    }

    fn notify_results(&self, token: SearchToken, results: Vec<SharedResult>) {
        let Some(listener) = self.listener() else {
            trace!("No listener for {} results of {}", results.len(), token);
            return;
        };
        debug!("Delivering {} results for session {}", results.len(), token);
        self.metrics.record_delivery();
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.on_results(token, results))) {
            warn!("Listener panicked in on_results: {}", panic_message(payload.as_ref()));
        }
    }

    fn notify_error(&self, token: SearchToken, error: SearchError) {
        self.metrics.record_error();
        let Some(listener) = self.listener() else {
            return;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.on_error(token, error))) {
            warn!("Listener panicked in on_error: {}", panic_message(payload.as_ref()));
        }
    }

    fn notify_stopped(&self, token: SearchToken) {
        let Some(listener) = self.listener() else {
            return;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener.on_stopped(token))) {
            warn!("Listener panicked in on_stopped: {}", panic_message(payload.as_ref()));
        }
    }
}
