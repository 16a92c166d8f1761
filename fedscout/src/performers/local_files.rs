use ignore::{DirEntry, WalkBuilder};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, trace};

use crate::errors::{ScoutResult, SearchError};
use crate::results::{CrawlTarget, ResultRecord, SharedResult};
use crate::search::{CancelFlag, ResultSink, SearchPerformer};
use crate::tokenizer::{fold, sanitize, tokenize_keywords};

const FILE_SCHEME: &str = "file://";

/// Searches file names under a local directory.
///
/// The walk honors `.gitignore`/`.ignore` files and skips hidden entries.
/// A file matches when its sanitized name contains any query keyword; an
/// empty query matches every file.
///
/// With `with_directory_crawl(true)` only the top level is walked during
/// `perform`: matching files are emitted directly and each subdirectory is
/// emitted as an incomplete crawlable result, which `crawl` then expands
/// into the matching files beneath it.
#[derive(Debug)]
pub struct LocalFilesPerformer {
    name: String,
    root: PathBuf,
    keywords: Vec<String>,
    crawl_directories: bool,
    cancel: CancelFlag,
}

impl LocalFilesPerformer {
    pub fn new(root: impl Into<PathBuf>, query: &str) -> Self {
        let root = root.into();
        Self {
            name: format!("local:{}", root.display()),
            root,
            keywords: tokenize_keywords(query, true),
            crawl_directories: false,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_directory_crawl(mut self, enabled: bool) -> Self {
        self.crawl_directories = enabled;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walker(&self, root: &Path, max_depth: Option<usize>) -> WalkBuilder {
        let mut walker = WalkBuilder::new(root);
        walker
            .hidden(true)
            .ignore(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .max_depth(max_depth);
        walker
    }

    fn matches(&self, file_name: &str) -> bool {
        if self.keywords.is_empty() {
            return true;
        }
        let haystack = fold(&sanitize(file_name));
        self.keywords.iter().any(|k| haystack.contains(k.as_str()))
    }

    fn file_result(&self, entry: &DirEntry, parent: Option<&SharedResult>) -> SharedResult {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let metadata = entry.metadata().ok();
        let size = metadata.as_ref().map_or(0, |m| m.len());
        let modified = metadata
            .and_then(|m| m.modified().ok())
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));

        let mut record = ResultRecord::new(file_name.clone(), self.name.clone())
            .with_details_url(format!("{}{}", FILE_SCHEME, entry.path().display()))
            .with_creation_time(modified)
            .with_file(file_name, size);
        if let Some(parent) = parent {
            record = record.with_parent(parent.clone());
        }
        record.into_shared()
    }

    fn directory_result(&self, entry: &DirEntry) -> SharedResult {
        ResultRecord::new(
            entry.file_name().to_string_lossy().into_owned(),
            self.name.clone(),
        )
        .with_details_url(format!("{}{}", FILE_SCHEME, entry.path().display()))
        .crawlable(false)
        .into_shared()
    }

    /// Walks `root`, pushing matching files (and, when asked, directories)
    fn walk(
        &self,
        root: &Path,
        max_depth: Option<usize>,
        parent: Option<&SharedResult>,
        sink: &ResultSink,
    ) -> ScoutResult<()> {
        if !root.is_dir() {
            return Err(SearchError::backend(
                &self.name,
                format!("{} is not a directory", root.display()),
            ));
        }

        let mut batch = sink.batcher();
        for entry in self.walker(root, max_depth).build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            // The walk yields its own root first.
            if entry.depth() == 0 {
                continue;
            }

            let Some(file_type) = entry.file_type() else {
                continue;
            };
            let accepted = if file_type.is_file() {
                let name = entry.file_name().to_string_lossy();
                if !self.matches(&name) {
                    continue;
                }
                trace!("Matched {}", entry.path().display());
                batch.push(self.file_result(&entry, parent))
            } else if file_type.is_dir() && self.crawl_directories && parent.is_none() {
                batch.push(self.directory_result(&entry))
            } else {
                continue;
            };

            if !accepted {
                debug!("{} stopped walking {}", self.name, root.display());
                return Ok(());
            }
        }
        batch.flush();
        Ok(())
    }
}

impl SearchPerformer for LocalFilesPerformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    fn perform(&self, sink: &ResultSink) -> ScoutResult<()> {
        let depth = self.crawl_directories.then_some(1);
        self.walk(&self.root, depth, None, sink)
    }

    fn crawl(&self, target: CrawlTarget, sink: &ResultSink) -> ScoutResult<()> {
        let parent = target.into_result();
        let Some(path) = parent.details_url().strip_prefix(FILE_SCHEME) else {
            return Err(SearchError::backend(
                &self.name,
                format!("cannot crawl '{}'", parent.details_url()),
            ));
        };
        let path = PathBuf::from(path);
        self.walk(&path, None, Some(&parent), sink)
    }

    fn is_crawler(&self) -> bool {
        self.crawl_directories
    }
}
