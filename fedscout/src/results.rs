/// This module defines the search result capabilities shared by every backend.
///
/// # Capabilities Instead of Type Inspection
///
/// A backend result is a trait object. What it can do beyond the base
/// `SearchResult` contract is declared through capability accessors rather
/// than discovered by downcasting:
///
/// ```rust,ignore
/// if let Some(file) = result.as_file() {
///     haystack.push_str(file.filename());
/// }
/// if let Some(target) = CrawlTarget::new(result.clone()) {
///     performer.crawl(target, &sink)?;
/// }
/// ```
///
/// Results are immutable once produced and are shared between the dispatcher,
/// the ranker and the listener as `Arc<dyn SearchResult>`.
use std::fmt;
use std::sync::Arc;

/// A result produced by a backend, shared across threads
pub type SharedResult = Arc<dyn SearchResult>;

/// Base contract every backend result satisfies
pub trait SearchResult: fmt::Debug + Send + Sync {
    /// Human readable title
    fn display_name(&self) -> &str;

    /// Link to the result's page on its backend
    fn details_url(&self) -> &str;

    /// Identifier of the backend that produced the result
    fn source(&self) -> &str;

    /// Creation time in milliseconds since the Unix epoch, `-1` when unknown
    fn creation_time(&self) -> i64;

    /// File capability: `Some` when the result represents a downloadable unit
    fn as_file(&self) -> Option<&dyn FileSearchResult> {
        None
    }

    /// Crawl capability: `Some` when the result can be deepened by its performer
    fn as_crawlable(&self) -> Option<&dyn CrawlableSearchResult> {
        None
    }

    /// The result this one was crawled from, if any
    fn parent(&self) -> Option<&dyn SearchResult> {
        None
    }
}

/// A result that represents a downloadable unit
pub trait FileSearchResult: SearchResult {
    fn filename(&self) -> &str;

    fn size(&self) -> u64;
}

/// A result whose performer can fetch richer detail after it was first shown
pub trait CrawlableSearchResult: SearchResult {
    /// Complete results are delivered as-is and crawled; incomplete ones are
    /// only crawled.
    fn is_complete(&self) -> bool;
}

/// A result that is guaranteed to carry the crawl capability
#[derive(Debug, Clone)]
pub struct CrawlTarget(SharedResult);

impl CrawlTarget {
    /// Wraps `result` if it is crawlable
    pub fn new(result: SharedResult) -> Option<Self> {
        if result.as_crawlable().is_some() {
            Some(Self(result))
        } else {
            None
        }
    }

    pub fn result(&self) -> &SharedResult {
        &self.0
    }

    pub fn is_complete(&self) -> bool {
        self.0
            .as_crawlable()
            .map(CrawlableSearchResult::is_complete)
            .unwrap_or(false)
    }

    pub fn into_result(self) -> SharedResult {
        self.0
    }
}

#[derive(Debug, Clone)]
struct FileInfo {
    filename: String,
    size: u64,
}

/// Concrete result type used by the bundled performers.
///
/// ```rust,ignore
/// let result = ResultRecord::new("Ubuntu 24.04 desktop", "local")
///     .with_details_url("file:///isos/ubuntu.iso")
///     .with_file("ubuntu-24.04-desktop-amd64.iso", 6_114_656_256)
///     .into_shared();
/// ```
#[derive(Debug, Clone)]
pub struct ResultRecord {
    display_name: String,
    details_url: String,
    source: String,
    creation_time: i64,
    file: Option<FileInfo>,
    crawl_state: Option<bool>,
    parent: Option<SharedResult>,
}

impl ResultRecord {
    pub fn new(display_name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            details_url: String::new(),
            source: source.into(),
            creation_time: -1,
            file: None,
            crawl_state: None,
            parent: None,
        }
    }

    pub fn with_details_url(mut self, url: impl Into<String>) -> Self {
        self.details_url = url.into();
        self
    }

    pub fn with_creation_time(mut self, millis: i64) -> Self {
        self.creation_time = millis;
        self
    }

    /// Adds the file capability
    pub fn with_file(mut self, filename: impl Into<String>, size: u64) -> Self {
        self.file = Some(FileInfo {
            filename: filename.into(),
            size,
        });
        self
    }

    /// Adds the crawl capability
    pub fn crawlable(mut self, complete: bool) -> Self {
        self.crawl_state = Some(complete);
        self
    }

    /// Marks this record as crawled from `parent`
    pub fn with_parent(mut self, parent: SharedResult) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn into_shared(self) -> SharedResult {
        Arc::new(self)
    }
}

impl SearchResult for ResultRecord {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn details_url(&self) -> &str {
        &self.details_url
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn creation_time(&self) -> i64 {
        self.creation_time
    }

    fn as_file(&self) -> Option<&dyn FileSearchResult> {
        self.file.as_ref().map(|_| self as &dyn FileSearchResult)
    }

    fn as_crawlable(&self) -> Option<&dyn CrawlableSearchResult> {
        self.crawl_state
            .map(|_| self as &dyn CrawlableSearchResult)
    }

    fn parent(&self) -> Option<&dyn SearchResult> {
        self.parent.as_deref()
    }
}

impl FileSearchResult for ResultRecord {
    fn filename(&self) -> &str {
        self.file.as_ref().map_or("", |f| f.filename.as_str())
    }

    fn size(&self) -> u64 {
        self.file.as_ref().map_or(0, |f| f.size)
    }
}

impl CrawlableSearchResult for ResultRecord {
    fn is_complete(&self) -> bool {
        self.crawl_state.unwrap_or(false)
    }
}
