use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::errors::ScoutResult;
use crate::results::{CrawlTarget, ResultRecord, SharedResult};
use crate::search::{CancelFlag, ResultSink, SearchPerformer};

/// Emits a fixed list of results.
///
/// Stands in for a real backend in tests, benchmarks and the `rank`
/// command. Optionally acts as a crawler that answers every crawl with the
/// same child results, each linked to the crawled parent.
#[derive(Debug)]
pub struct StaticPerformer {
    name: String,
    cancel: CancelFlag,
    results: Vec<SharedResult>,
    batch_size: Option<usize>,
    delay: Option<Duration>,
    crawl_results: Option<Vec<SharedResult>>,
}

impl StaticPerformer {
    pub fn new(name: impl Into<String>, results: Vec<SharedResult>) -> Self {
        Self {
            name: name.into(),
            cancel: CancelFlag::new(),
            results,
            batch_size: None,
            delay: None,
            crawl_results: None,
        }
    }

    /// Observe an externally owned flag instead of a private one
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Overrides the sink's batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size.max(1));
        self
    }

    /// Sleeps between batches, imitating a slow backend
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Makes the performer a crawler answering each crawl with `children`
    pub fn with_crawl_results(mut self, children: Vec<SharedResult>) -> Self {
        self.crawl_results = Some(children);
        self
    }

    fn emit_all(&self, results: &[SharedResult], sink: &ResultSink) {
        let batch_size = self.batch_size.unwrap_or_else(|| sink.batch_size());
        for (i, chunk) in results.chunks(batch_size).enumerate() {
            if i > 0 {
                if let Some(delay) = self.delay {
                    thread::sleep(delay);
                }
            }
            if !sink.emit(chunk.to_vec()) {
                debug!("{} stopped after {} batches", self.name, i);
                return;
            }
        }
    }
}

impl SearchPerformer for StaticPerformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    fn perform(&self, sink: &ResultSink) -> ScoutResult<()> {
        self.emit_all(&self.results, sink);
        Ok(())
    }

    fn crawl(&self, target: CrawlTarget, sink: &ResultSink) -> ScoutResult<()> {
        let Some(children) = &self.crawl_results else {
            return Ok(());
        };
        let parent = target.into_result();
        let linked: Vec<SharedResult> = children
            .iter()
            .map(|child| {
                let mut record = ResultRecord::new(child.display_name(), child.source())
                    .with_details_url(child.details_url())
                    .with_creation_time(child.creation_time())
                    .with_parent(parent.clone());
                if let Some(file) = child.as_file() {
                    record = record.with_file(file.filename(), file.size());
                }
                record.into_shared()
            })
            .collect();
        self.emit_all(&linked, sink);
        Ok(())
    }

    fn is_crawler(&self) -> bool {
        self.crawl_results.is_some()
    }
}
