//! Relevance ranking of result batches against a query.
//!
//! Ranking is two passes. The first pass computes, once per result, the
//! normalized haystack, the number of query tokens it contains and its edit
//! distance to the query. The second pass is a stable sort on those
//! precomputed keys:
//!
//! 1. more matched tokens first
//! 2. then smaller edit distance
//! 3. then original (backend) order
//!
//! Computing keys inside the comparator instead costs `O(n log n)` haystack
//! builds and distance computations; at ~8000 results that blocked callers
//! for seconds.

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::distance::DistanceBuffers;
use crate::results::SharedResult;
use crate::tokenizer::{fold, normalize_for_search, tokenize, tokenize_keywords, STOPWORDS};

/// Result count at which key precomputation moves onto the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 512;

/// A result with its precomputed ranking keys
#[derive(Debug, Clone)]
pub struct RankedEntry {
    pub result: SharedResult,
    pub matched_token_count: usize,
    pub edit_distance: usize,
}

/// Orders results by textual relevance to a query
#[derive(Debug, Clone)]
pub struct RelevanceRanker {
    remove_stopwords: bool,
    parallel_threshold: usize,
}

impl Default for RelevanceRanker {
    fn default() -> Self {
        Self::new()
    }
}

impl RelevanceRanker {
    pub fn new() -> Self {
        Self {
            remove_stopwords: false,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Drop stopwords from the query tokens before counting matches
    pub fn with_stopwords_removed(mut self, remove: bool) -> Self {
        self.remove_stopwords = remove;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold.max(1);
        self
    }

    fn query_tokens(&self, query: &str) -> Vec<String> {
        let mut tokens = tokenize(query);
        if self.remove_stopwords {
            tokens.retain(|token| !STOPWORDS.contains(token.as_str()));
        }
        tokens
    }

    /// Ranks `results` and returns them best first
    pub fn rank(&self, results: Vec<SharedResult>, query: &str) -> Vec<SharedResult> {
        self.rank_entries(results, query)
            .into_iter()
            .map(|entry| entry.result)
            .collect()
    }

    /// Ranks `results` and keeps the keys each result was sorted by
    pub fn rank_entries(&self, results: Vec<SharedResult>, query: &str) -> Vec<RankedEntry> {
        // Folded like the haystacks so accented query words still match.
        let query = fold(query.trim());
        let tokens = self.query_tokens(&query);

        let mut entries: Vec<RankedEntry> = if results.len() >= self.parallel_threshold {
            debug!(
                "Ranking {} results in parallel against '{}'",
                results.len(),
                query
            );
            results
                .into_par_iter()
                .map_init(DistanceBuffers::new, |buffers, result| {
                    score(buffers, result, &tokens, &query)
                })
                .collect()
        } else {
            let mut buffers = DistanceBuffers::new();
            results
                .into_iter()
                .map(|result| score(&mut buffers, result, &tokens, &query))
                .collect()
        };

        // Vec::sort_by is stable, which keeps backend order for equal keys.
        entries.sort_by(|a, b| {
            b.matched_token_count
                .cmp(&a.matched_token_count)
                .then(a.edit_distance.cmp(&b.edit_distance))
        });
        entries
    }
}

fn score(
    buffers: &mut DistanceBuffers,
    result: SharedResult,
    tokens: &[String],
    query: &str,
) -> RankedEntry {
    let normalized = normalize_for_search(result.as_ref());
    let matched_token_count = count_matched_tokens(&normalized, tokens);
    let edit_distance = buffers.distance(&normalized, query);
    trace!(
        "'{}' matched {} tokens at distance {}",
        normalized,
        matched_token_count,
        edit_distance
    );
    RankedEntry {
        result,
        matched_token_count,
        edit_distance,
    }
}

/// Number of tokens occurring in `normalized`, counting repeated tokens each time
pub fn count_matched_tokens(normalized: &str, tokens: &[String]) -> usize {
    if normalized.is_empty() {
        return 0;
    }
    tokens
        .iter()
        .filter(|token| normalized.contains(token.as_str()))
        .count()
}

/// Convenience wrapper around [`RelevanceRanker::rank`] with default settings
pub fn rank(results: Vec<SharedResult>, query: &str) -> Vec<SharedResult> {
    RelevanceRanker::new().rank(results, query)
}

/// True when any keyword occurs in the result's haystack or fuzzy-matches it
pub fn keyword_or_fuzzy_match(
    buffers: &mut DistanceBuffers,
    keywords: &[String],
    result: &SharedResult,
) -> bool {
    let normalized = normalize_for_search(result.as_ref());
    keywords.iter().any(|keyword| {
        let keyword = fold(keyword);
        normalized.contains(&keyword) || buffers.is_fuzzy_match(&normalized, &keyword)
    })
}

/// Keywords for [`keyword_or_fuzzy_match`], derived the same way the ranker sees the query
pub fn match_keywords(query: &str, remove_stopwords: bool) -> Vec<String> {
    tokenize_keywords(query, remove_stopwords)
}
