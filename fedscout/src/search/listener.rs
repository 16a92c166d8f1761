use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::token::SearchToken;
use crate::errors::{ScoutResult, SearchError};
use crate::results::SharedResult;

/// Receiver of everything a session produces.
///
/// Callbacks arrive on worker threads, possibly concurrently for different
/// performers of the same session. Every callback carries the token of the
/// session it belongs to; implementations that only care about the newest
/// session compare it against the token they track (see
/// [`LatestTokenListener`]).
pub trait SearchListener: Send + Sync {
    fn on_results(&self, token: SearchToken, results: Vec<SharedResult>);

    fn on_error(&self, token: SearchToken, error: SearchError);

    /// Emitted exactly once per session, after its last delivery
    fn on_stopped(&self, token: SearchToken);
}

/// Forwards callbacks for the newest session only.
///
/// The tracked token only moves forward: either explicitly through
/// [`LatestTokenListener::track`], or when a callback arrives for a newer
/// session. Callbacks for older sessions are dropped.
pub struct LatestTokenListener<L> {
    inner: L,
    latest: AtomicU64,
}

impl<L: SearchListener> LatestTokenListener<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            latest: AtomicU64::new(0),
        }
    }

    /// Starts tracking `token`; older tokens are ignored from now on
    pub fn track(&self, token: SearchToken) {
        self.latest.fetch_max(token.get(), Ordering::SeqCst);
    }

    pub fn latest(&self) -> Option<SearchToken> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            raw => Some(SearchToken::from_raw(raw)),
        }
    }

    fn is_live(&self, token: SearchToken) -> bool {
        let previous = self.latest.fetch_max(token.get(), Ordering::SeqCst);
        if token.get() < previous {
            trace!("Ignoring callback for stale session {}", token);
            return false;
        }
        true
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: SearchListener> SearchListener for LatestTokenListener<L> {
    fn on_results(&self, token: SearchToken, results: Vec<SharedResult>) {
        if self.is_live(token) {
            self.inner.on_results(token, results);
        }
    }

    fn on_error(&self, token: SearchToken, error: SearchError) {
        if self.is_live(token) {
            self.inner.on_error(token, error);
        }
    }

    fn on_stopped(&self, token: SearchToken) {
        if self.is_live(token) {
            self.inner.on_stopped(token);
        }
    }
}

/// One listener callback, as sent through a [`SessionCollector`]
#[derive(Debug)]
pub enum SessionEvent {
    Results(SearchToken, Vec<SharedResult>),
    Error(SearchToken, SearchError),
    Stopped(SearchToken),
}

impl SessionEvent {
    pub fn token(&self) -> SearchToken {
        match self {
            Self::Results(token, _) | Self::Error(token, _) | Self::Stopped(token) => *token,
        }
    }
}

/// Everything one session delivered
#[derive(Debug)]
pub struct CollectedSession {
    pub token: SearchToken,
    pub batches: Vec<Vec<SharedResult>>,
    pub errors: Vec<SearchError>,
}

impl CollectedSession {
    pub fn result_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// All results in delivery order
    pub fn results(&self) -> impl Iterator<Item = &SharedResult> {
        self.batches.iter().flatten()
    }
}

/// Listener that turns callbacks into channel events, so a
/// non-interactive caller can block until a session finishes.
///
/// ```rust,ignore
/// let collector = Arc::new(SessionCollector::new());
/// manager.set_listener(collector.clone());
/// let token = manager.search(request, performers)?;
/// let session = collector.wait(token, Duration::from_secs(30))?;
/// println!("{} results", session.result_count());
/// ```
#[derive(Debug)]
pub struct SessionCollector {
    tx: Sender<SessionEvent>,
    rx: Receiver<SessionEvent>,
}

impl Default for SessionCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionCollector {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Raw event stream, including events of other sessions
    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.rx
    }

    /// Blocks until `token` stops, gathering its results and errors.
    ///
    /// Events for other sessions are discarded. Fails with `Timeout` if the
    /// session does not stop within `timeout`.
    pub fn wait(&self, token: SearchToken, timeout: Duration) -> ScoutResult<CollectedSession> {
        let deadline = Instant::now() + timeout;
        let mut collected = CollectedSession {
            token,
            batches: Vec::new(),
            errors: Vec::new(),
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = match self.rx.recv_timeout(remaining) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return Err(SearchError::timeout(format!("session {}", token), timeout));
                }
            };

            if event.token() != token {
                debug!("Discarding event for session {}", event.token());
                continue;
            }
            match event {
                SessionEvent::Results(_, batch) => collected.batches.push(batch),
                SessionEvent::Error(_, error) => collected.errors.push(error),
                SessionEvent::Stopped(_) => return Ok(collected),
            }
        }
    }
}

impl SearchListener for SessionCollector {
    fn on_results(&self, token: SearchToken, results: Vec<SharedResult>) {
        // Sender and receiver live in the same struct; send cannot fail.
        let _ = self.tx.send(SessionEvent::Results(token, results));
    }

    fn on_error(&self, token: SearchToken, error: SearchError) {
        let _ = self.tx.send(SessionEvent::Error(token, error));
    }

    fn on_stopped(&self, token: SearchToken) {
        let _ = self.tx.send(SessionEvent::Stopped(token));
    }
}

impl<L: SearchListener + ?Sized> SearchListener for Arc<L> {
    fn on_results(&self, token: SearchToken, results: Vec<SharedResult>) {
        (**self).on_results(token, results)
    }

    fn on_error(&self, token: SearchToken, error: SearchError) {
        (**self).on_error(token, error)
    }

    fn on_stopped(&self, token: SearchToken) {
        (**self).on_stopped(token)
    }
}
