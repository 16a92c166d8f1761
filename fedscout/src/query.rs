//! Search requests and the `:keyword:` filter directive syntax.
//!
//! A raw query may embed directives anywhere in its text:
//!
//! - `+:keyword:<word>` or `:keyword:<word>` keeps only results containing `<word>`
//! - `-:keyword:<word>` drops results containing `<word>`
//!
//! Parsing strips the directives and keeps the rest as the free-text query
//! used for ranking. Malformed directives are reported before anything is
//! dispatched.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::errors::{ScoutResult, SearchError};
use crate::filters::{FilterPipeline, KeywordFilter};
use crate::tokenizer::tokenize_keywords;

static KEYWORD_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?P<sign>[+-])?:keyword:(?P<keyword>[^\s-]*)")
        .expect("keyword directive pattern is valid")
});

/// Free-text query plus the filters every result of the session must pass
#[derive(Debug, Default)]
pub struct SearchRequest {
    query: String,
    filters: FilterPipeline,
}

impl SearchRequest {
    /// A request without filters; `query` is used verbatim
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into().trim().to_owned(),
            filters: FilterPipeline::new(),
        }
    }

    pub fn with_filters(mut self, filters: FilterPipeline) -> Self {
        self.filters = filters;
        self
    }

    /// Extracts keyword directives from `raw`.
    ///
    /// ```rust,ignore
    /// let request = SearchRequest::parse("ubuntu iso -:keyword:beta +:keyword:amd64")?;
    /// assert_eq!(request.query(), "ubuntu iso");
    /// assert_eq!(request.filters().len(), 2);
    /// ```
    pub fn parse(raw: &str) -> ScoutResult<Self> {
        let mut filters = FilterPipeline::new();

        for captures in KEYWORD_DIRECTIVE.captures_iter(raw) {
            let sign = captures.name("sign").map(|m| m.as_str());
            let keyword = captures.name("keyword").map_or("", |m| m.as_str());
            if keyword.is_empty() {
                return Err(SearchError::malformed_filter(format!(
                    "directive '{}' has no keyword",
                    &captures[0]
                )));
            }
            let filter = match sign {
                Some("-") => KeywordFilter::exclude(keyword)?,
                Some(_) => KeywordFilter::include(keyword)?,
                None => KeywordFilter::bare(keyword)?,
            };
            filters.push(filter);
        }

        let stripped = KEYWORD_DIRECTIVE.replace_all(raw, " ");
        let query = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

        debug!(
            "Parsed query '{}' with {} keyword filters",
            query,
            filters.len()
        );

        Ok(Self { query, filters })
    }

    /// Free text with directives removed
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filters(&self) -> &FilterPipeline {
        &self.filters
    }

    /// Deduplicated, folded keywords of the free-text query
    pub fn keywords(&self, remove_stopwords: bool) -> Vec<String> {
        tokenize_keywords(&self.query, remove_stopwords)
    }
}
