//! Result normalization: raw `/neighbors` payload to view-model.
//!
//! Pure and deterministic. All keyed output goes through `BTreeMap`, so the
//! result never depends on hash iteration order.
//!
//! Unique neighbours are ranked by a lexicographic tuple:
//! 1. year_count: how many years the word appears in (more = first)
//! 2. word: ordinal byte order (locale independent)

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{
    FrequencyPoint, NormalizedResult, ProjectionPoint, RawResult, UniqueNeighbor,
};

/// Rank tuple for unique neighbours. Derived Ord gives lexicographic comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct NeighborRank<'a> {
    year_count: Reverse<usize>,
    word: &'a str,
}

/// Normalize a raw API result for `query_word`.
pub fn normalize(raw: &RawResult, query_word: &str) -> NormalizedResult {
    let mut tags_by_word = BTreeMap::new();
    let mut scores_by_word = BTreeMap::new();
    let mut neighbors_by_year = BTreeMap::new();

    for (year, records) in &raw.neighbors {
        for record in records {
            if let Some(tag) = record.tag_id() {
                tags_by_word.insert(record.token().to_string(), tag.to_string());
            }
            if let Some(score) = record.score() {
                scores_by_word.insert(record.token().to_string(), score);
            }
        }

        if records.is_empty() {
            continue;
        }
        let tokens: Vec<String> = records.iter().map(|r| r.token().to_string()).collect();
        neighbors_by_year.insert(year.clone(), tokens);
    }

    let unique_neighbors = unique_neighbors(&neighbors_by_year, &tags_by_word);

    let (trajectory_points, neighbor_points): (Vec<_>, Vec<_>) = raw
        .umap
        .iter()
        .map(|point| ProjectionPoint {
            token: point.token.clone(),
            year: point.year.clone(),
            x: point.x,
            y: point.y,
        })
        .partition(|point| point.token == query_word);

    let frequency_series = raw
        .frequency
        .iter()
        .map(|f| FrequencyPoint {
            year: f.year.clone(),
            frequency: f.frequency.unwrap_or(0.0),
            normalized_frequency: f.normalized_frequency.unwrap_or(0.0),
        })
        .collect();

    let changepoints = raw.changepoints.iter().map(|cp| cp.split()).collect();

    NormalizedResult {
        query: query_word.to_string(),
        neighbors_by_year,
        tags_by_word,
        scores_by_word,
        unique_neighbors,
        frequency_series,
        changepoints,
        trajectory_points,
        neighbor_points,
    }
}

/// Deduplicate every year's tokens, count the distinct years each appears in,
/// and rank them.
pub fn unique_neighbors(
    neighbors_by_year: &BTreeMap<String, Vec<String>>,
    tags_by_word: &BTreeMap<String, String>,
) -> Vec<UniqueNeighbor> {
    let mut year_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for tokens in neighbors_by_year.values() {
        let distinct: BTreeSet<&str> = tokens.iter().map(String::as_str).collect();
        for word in distinct {
            *year_counts.entry(word).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<NeighborRank> = year_counts
        .into_iter()
        .map(|(word, count)| NeighborRank {
            year_count: Reverse(count),
            word,
        })
        .collect();
    ranked.sort_unstable();

    ranked
        .into_iter()
        .map(|rank| UniqueNeighbor {
            word: rank.word.to_string(),
            year_count: rank.year_count.0,
            tagged: tags_by_word.contains_key(rank.word),
        })
        .collect()
}
