//! Multi-strategy catalog matching.
//!
//! Each title/artist pair is tried against the catalog with up to three
//! queries, most specific first:
//!
//! 1. title + artist, as given
//! 2. normalized title only
//! 3. normalized artist only
//!
//! The first strategy whose best-scoring candidate clears the confidence
//! threshold wins. Search failures and empty results fall through to the
//! next strategy; after the third the pair is reported unmatched.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::catalog::CatalogSearch;
use crate::error::CatalogError;
use crate::models::{
    AttemptOutcome, CatalogCandidate, CatalogQuery, MatchResult, MatchingStats, SearchQuery,
    SearchStrategy, StrategyAttempt,
};
use crate::normalize::normalize_text;
use crate::scoring::{best_candidate, is_accepted, score_candidates, ScoreWeights, ACCEPT_THRESHOLD};

/// Default number of candidates requested per search.
pub const DEFAULT_MAX_RESULTS: usize = 20;

/// Matching parameters, injected at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Combined score (0-100) a candidate must strictly exceed.
    pub accept_threshold: f64,
    pub weights: ScoreWeights,
    pub max_results: usize,
    /// Extra attempts for a strategy whose search call failed.
    pub retries_per_strategy: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            accept_threshold: ACCEPT_THRESHOLD,
            weights: ScoreWeights::default(),
            max_results: DEFAULT_MAX_RESULTS,
            retries_per_strategy: 0,
        }
    }
}

/// One query of a batch and what it resolved to.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub query: SearchQuery,
    pub result: MatchResult,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Matched catalog ids in query order; unmatched queries are omitted.
    pub matched_ids: Vec<String>,
    pub items: Vec<BatchItem>,
    pub stats: MatchingStats,
}

pub struct MatchEngine<C> {
    catalog: C,
    config: MatchConfig,
}

/// The three strategy queries for a title/artist pair, in attempt order.
pub fn strategy_queries(title: &str, artist: &str) -> [(SearchStrategy, CatalogQuery); 3] {
    [
        (
            SearchStrategy::TitleAndArtist,
            CatalogQuery::TitleAndArtist {
                title: title.to_string(),
                artist: artist.to_string(),
            },
        ),
        (
            SearchStrategy::TitleOnly,
            CatalogQuery::Title(normalize_text(title)),
        ),
        (
            SearchStrategy::ArtistOnly,
            CatalogQuery::Artist(normalize_text(artist)),
        ),
    ]
}

impl<C: CatalogSearch> MatchEngine<C> {
    pub fn new(catalog: C, config: MatchConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    fn run_search(
        &self,
        strategy: SearchStrategy,
        query: &CatalogQuery,
    ) -> Result<Vec<CatalogCandidate>, CatalogError> {
        let mut attempt = 0;
        loop {
            match self.catalog.search(query, self.config.max_results) {
                Ok(candidates) => return Ok(candidates),
                Err(e) if attempt < self.config.retries_per_strategy => {
                    attempt += 1;
                    warn!(
                        strategy = strategy.label(),
                        %query,
                        attempt,
                        "Search failed, retrying: {}",
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Find the best catalog match for a title/artist pair.
    pub fn search(&self, title: &str, artist: &str) -> MatchResult {
        let mut attempts = Vec::with_capacity(SearchStrategy::ORDER.len());

        for (strategy, query) in strategy_queries(title, artist) {
            let query_text = query.to_string();

            let candidates = match self.run_search(strategy, &query) {
                Ok(candidates) => candidates,
                Err(e) => {
                    error!("Search error with strategy {}: {}", query_text, e);
                    attempts.push(StrategyAttempt {
                        strategy,
                        query: query_text,
                        outcome: AttemptOutcome::SearchFailed {
                            error: e.to_string(),
                        },
                    });
                    continue;
                }
            };

            if candidates.is_empty() {
                attempts.push(StrategyAttempt {
                    strategy,
                    query: query_text,
                    outcome: AttemptOutcome::NoCandidates,
                });
                continue;
            }

            let scores = score_candidates(&candidates, artist, self.config.weights);
            let best = best_candidate(candidates.iter().zip(scores.iter().map(|s| s.combined)));

            match best {
                Some((candidate, score)) if is_accepted(score, self.config.accept_threshold) => {
                    info!(
                        strategy = strategy.label(),
                        score,
                        "Matched: {} - {}",
                        candidate.title,
                        candidate.artists.first().map(String::as_str).unwrap_or("?")
                    );
                    attempts.push(StrategyAttempt {
                        strategy,
                        query: query_text,
                        outcome: AttemptOutcome::Accepted { score },
                    });
                    return MatchResult {
                        candidate: Some(candidate.clone()),
                        score,
                        strategy: Some(strategy),
                        attempts,
                    };
                }
                best => {
                    attempts.push(StrategyAttempt {
                        strategy,
                        query: query_text,
                        outcome: AttemptOutcome::BelowThreshold {
                            best_score: best.map(|(_, s)| s).unwrap_or(0.0),
                        },
                    });
                }
            }
        }

        warn!("No match found for {} by {}", title, artist);
        MatchResult::unmatched(attempts)
    }

    pub fn match_query(&self, query: &SearchQuery) -> MatchResult {
        self.search(&query.title, &query.artist)
    }

    /// Match every query in order, calling `on_item` after each one.
    pub fn match_all_with<F>(&self, queries: &[SearchQuery], mut on_item: F) -> BatchReport
    where
        F: FnMut(usize, &MatchResult),
    {
        let mut report = BatchReport::default();

        for (i, query) in queries.iter().enumerate() {
            let result = self.match_query(query);
            report.stats.record(&result);
            if let Some(candidate) = &result.candidate {
                report.matched_ids.push(candidate.id.clone());
            }
            on_item(i, &result);
            report.items.push(BatchItem {
                query: query.clone(),
                result,
            });
        }

        info!(
            "{} out of {} queries matched ({:.2}%)",
            report.stats.total_matches,
            report.stats.total_queries,
            report.stats.match_rate()
        );
        report
    }

    pub fn match_all(&self, queries: &[SearchQuery]) -> BatchReport {
        self.match_all_with(queries, |_, _| {})
    }
}
