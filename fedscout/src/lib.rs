pub mod config;
pub mod distance;
pub mod errors;
pub mod filters;
pub mod metrics;
pub mod performers;
pub mod query;
pub mod ranking;
pub mod results;
pub mod search;
pub mod tokenizer;

pub use config::{CliOverrides, EngineConfig};
pub use distance::{levenshtein, DistanceBuffers};
pub use errors::{ScoutResult, SearchError};
pub use filters::{FilterPipeline, HaystackFilter, KeywordFeature, KeywordFilter};
pub use metrics::{SearchMetrics, SearchStats};
pub use performers::{LocalFilesPerformer, StaticPerformer};
pub use query::SearchRequest;
pub use ranking::{keyword_or_fuzzy_match, RankedEntry, RelevanceRanker};
pub use results::{
    CrawlTarget, CrawlableSearchResult, FileSearchResult, ResultRecord, SearchResult, SharedResult,
};
pub use search::{
    CancelFlag, LatestTokenListener, ResultSink, SearchListener, SearchManager, SearchPerformer,
    SearchToken, SessionCollector,
};
