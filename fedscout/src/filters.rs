/// This module implements keyword filtering of search results.
///
/// # Filters as a Trait
///
/// A pipeline holds any number of filters behind the `HaystackFilter` trait:
///
/// ```rust,ignore
/// pub trait HaystackFilter {
///     fn accept(&self, haystack: &str) -> bool;
/// }
/// ```
///
/// `KeywordFilter` is the implementation produced by the query parser, but a
/// pipeline can mix in others (media-type filters, test doubles) without the
/// pipeline knowing about them.
///
/// # Short-Circuit Evaluation
///
/// `FilterPipeline::passes` evaluates filters in order and stops at the first
/// rejection. Callers should put cheap or likely-to-fail filters first:
///
/// ```rust,ignore
/// let mut pipeline = FilterPipeline::new();
/// pipeline.push(KeywordFilter::exclude("cam")?);   // rejects most noise
/// pipeline.push(KeywordFilter::include("1080p")?);
/// let kept = results.into_iter().filter(|r| pipeline.passes(r.as_ref()));
/// ```
use std::fmt;

use crate::errors::{ScoutResult, SearchError};
use crate::results::SearchResult;

/// Which part of a result a keyword filter was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeywordFeature {
    SearchSource,
    FileExtension,
    FileName,
}

impl KeywordFeature {
    /// Minimum share of results a keyword must appear in to be offered as a filter
    pub fn filter_threshold(self) -> f32 {
        match self {
            Self::SearchSource => 0.015,
            Self::FileExtension => 0.0,
            Self::FileName => 0.01,
        }
    }

    pub fn minimum_token_length(self) -> usize {
        match self {
            Self::SearchSource => 4,
            Self::FileExtension | Self::FileName => 3,
        }
    }

    pub fn maximum_token_length(self) -> usize {
        match self {
            Self::SearchSource | Self::FileName => 20,
            Self::FileExtension => 8,
        }
    }

    /// Whether `token` is long enough and short enough to be a keyword for this feature
    pub fn accepts_token(self, token: &str) -> bool {
        let len = token.chars().count();
        (self.minimum_token_length()..=self.maximum_token_length()).contains(&len)
    }
}

/// A predicate over a result's lowercase haystack.
///
/// `Display` renders the filter the way a user would type it.
pub trait HaystackFilter: fmt::Debug + fmt::Display + Send + Sync {
    fn accept(&self, haystack: &str) -> bool;
}

/// Requires (inclusive) or forbids (exclusive) a keyword in the haystack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFilter {
    inclusive: bool,
    /// Whether the directive carried an explicit `+`/`-`
    signed: bool,
    keyword: String,
    feature: Option<KeywordFeature>,
}

impl KeywordFilter {
    /// Builds a filter; the keyword is trimmed and lowercased and must not be empty.
    pub fn new(
        inclusive: bool,
        keyword: &str,
        feature: Option<KeywordFeature>,
    ) -> ScoutResult<Self> {
        let keyword = keyword.trim().to_lowercase();
        if keyword.is_empty() {
            return Err(SearchError::malformed_filter(
                "keyword filters need a non-empty keyword",
            ));
        }
        Ok(Self {
            inclusive,
            signed: true,
            keyword,
            feature,
        })
    }

    pub fn include(keyword: &str) -> ScoutResult<Self> {
        Self::new(true, keyword, None)
    }

    pub fn exclude(keyword: &str) -> ScoutResult<Self> {
        Self::new(false, keyword, None)
    }

    /// Inclusive filter written without a sign, as in `:keyword:home`
    pub fn bare(keyword: &str) -> ScoutResult<Self> {
        let mut filter = Self::include(keyword)?;
        filter.signed = false;
        Ok(filter)
    }

    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }

    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn feature(&self) -> Option<KeywordFeature> {
        self.feature
    }
}

impl HaystackFilter for KeywordFilter {
    /// `haystack` is expected to be lowercase already
    fn accept(&self, haystack: &str) -> bool {
        haystack.contains(self.keyword.as_str()) == self.inclusive
    }
}

/// Renders the filter in query-directive form, e.g. `-:keyword:cam`.
/// A filter parsed without a sign keeps that form: `:keyword:home`.
impl fmt::Display for KeywordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.inclusive, self.signed) {
            (true, true) => write!(f, "+:keyword:{}", self.keyword),
            (true, false) => write!(f, ":keyword:{}", self.keyword),
            (false, _) => write!(f, "-:keyword:{}", self.keyword),
        }
    }
}

/// Lowercase searchable text of a result: display name, source, filename and details URL
pub fn keyword_haystack(result: &dyn SearchResult) -> String {
    let mut haystack = String::with_capacity(160);
    haystack.push_str(result.display_name());
    haystack.push(' ');
    haystack.push_str(result.source());
    if let Some(file) = result.as_file() {
        haystack.push(' ');
        haystack.push_str(file.filename());
    }
    haystack.push(' ');
    haystack.push_str(result.details_url());
    haystack.to_lowercase()
}

/// Ordered, short-circuiting sequence of filters
#[derive(Debug, Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn HaystackFilter>>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, filter: impl HaystackFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Evaluates the pipeline against a prepared haystack.
    ///
    /// An absent haystack is the empty string: inclusive filters fail and
    /// exclusive filters pass.
    pub fn passes_haystack(&self, haystack: Option<&str>) -> bool {
        let haystack = haystack.unwrap_or("");
        self.filters.iter().all(|filter| filter.accept(haystack))
    }

    /// True when every filter accepts `result`; always true for an empty pipeline.
    pub fn passes(&self, result: &dyn SearchResult) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        let haystack = keyword_haystack(result);
        self.passes_haystack(Some(&haystack))
    }
}

/// Space-separated directives, in evaluation order
impl fmt::Display for FilterPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", filter)?;
        }
        Ok(())
    }
}

impl FromIterator<KeywordFilter> for FilterPipeline {
    fn from_iter<I: IntoIterator<Item = KeywordFilter>>(iter: I) -> Self {
        let mut pipeline = Self::new();
        for filter in iter {
            pipeline.push(filter);
        }
        pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ResultRecord;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn timon() -> ResultRecord {
        ResultRecord::new("Timon of Athens", "MIT")
            .with_details_url("http://shakespeare.mit.edu/timon/timon.4.1.html")
            .with_file("timon_of_athens.txt", 0)
    }

    /// Records whether it was ever evaluated
    #[derive(Debug)]
    struct Witness(Arc<AtomicBool>);

    impl fmt::Display for Witness {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("witness")
        }
    }

    impl HaystackFilter for Witness {
        fn accept(&self, _haystack: &str) -> bool {
            self.0.store(true, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_inclusive_filters() {
        let haystack = keyword_haystack(&timon());
        assert!(KeywordFilter::include("MIT").unwrap().accept(&haystack));
        assert!(!KeywordFilter::include("notthere").unwrap().accept(&haystack));
        assert!(KeywordFilter::include("athens").unwrap().accept(&haystack));
    }

    #[test]
    fn test_exclusive_filters() {
        let haystack = keyword_haystack(&timon());
        assert!(!KeywordFilter::exclude("MIT").unwrap().accept(&haystack));
        assert!(KeywordFilter::exclude("notthere").unwrap().accept(&haystack));
        assert!(KeywordFilter::exclude("frostwire").unwrap().accept(&haystack));
        assert!(!KeywordFilter::exclude("athens").unwrap().accept(&haystack));
    }

    #[test]
    fn test_mixed_pipeline() {
        let pipeline: FilterPipeline = [
            KeywordFilter::include("MIT").unwrap(),
            KeywordFilter::exclude("notthere").unwrap(),
            KeywordFilter::include("athens").unwrap(),
        ]
        .into_iter()
        .collect();
        assert!(pipeline.passes(&timon()));
    }

    #[test]
    fn test_pipeline_short_circuits() {
        let evaluated = Arc::new(AtomicBool::new(false));
        let mut pipeline = FilterPipeline::new();
        pipeline.push(KeywordFilter::include("MIT").unwrap());
        pipeline.push(KeywordFilter::include("notthere").unwrap());
        pipeline.push(Witness(evaluated.clone()));

        assert!(!pipeline.passes(&timon()));
        assert!(
            !evaluated.load(Ordering::SeqCst),
            "filter after the first rejection must not run"
        );
    }

    #[test]
    fn test_later_filter_runs_when_earlier_filters_pass() {
        let evaluated = Arc::new(AtomicBool::new(false));
        let mut pipeline = FilterPipeline::new();
        pipeline.push(KeywordFilter::include("MIT").unwrap());
        pipeline.push(Witness(evaluated.clone()));

        assert!(pipeline.passes(&timon()));
        assert!(evaluated.load(Ordering::SeqCst));
    }

    #[test]
    fn test_empty_pipeline_accepts_everything() {
        let pipeline = FilterPipeline::new();
        assert!(pipeline.is_empty());
        assert!(pipeline.passes(&timon()));
        assert!(pipeline.passes_haystack(None));
    }

    #[test]
    fn test_absent_haystack() {
        let include: FilterPipeline = [KeywordFilter::include("x").unwrap()].into_iter().collect();
        let exclude: FilterPipeline = [KeywordFilter::exclude("x").unwrap()].into_iter().collect();
        assert!(!include.passes_haystack(None));
        assert!(exclude.passes_haystack(None));
    }

    #[test]
    fn test_empty_keyword_rejected() {
        assert!(matches!(
            KeywordFilter::include(""),
            Err(SearchError::MalformedFilter(_))
        ));
        assert!(matches!(
            KeywordFilter::exclude("   "),
            Err(SearchError::MalformedFilter(_))
        ));
    }

    #[test]
    fn test_keyword_is_normalized() {
        let filter = KeywordFilter::new(true, "  MiT ", Some(KeywordFeature::SearchSource)).unwrap();
        assert_eq!(filter.keyword(), "mit");
        assert_eq!(filter.feature(), Some(KeywordFeature::SearchSource));
        assert_eq!(filter.to_string(), "+:keyword:mit");
        assert_eq!(KeywordFilter::exclude("Cam").unwrap().to_string(), "-:keyword:cam");
    }

    #[test]
    fn test_bare_filter_keeps_unsigned_form() {
        let filter = KeywordFilter::bare("Home").unwrap();
        assert!(filter.is_inclusive());
        assert_eq!(filter.to_string(), ":keyword:home");
        assert!(filter.accept("my home videos"));

        let pipeline: FilterPipeline = [filter, KeywordFilter::exclude("cam").unwrap()]
            .into_iter()
            .collect();
        assert_eq!(pipeline.to_string(), ":keyword:home -:keyword:cam");
    }

    #[test]
    fn test_feature_token_lengths() {
        assert!(KeywordFeature::FileExtension.accepts_token("mkv"));
        assert!(!KeywordFeature::FileExtension.accepts_token("mp"));
        assert!(!KeywordFeature::FileExtension.accepts_token("verylongext"));
        assert!(KeywordFeature::FileName.accepts_token("athens"));
        assert_eq!(KeywordFeature::FileExtension.filter_threshold(), 0.0);
    }
}
