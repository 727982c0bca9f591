//! Core data models for Word Lapse
//!
//! `Raw*` types mirror the JSON the live API returns. Field names there are
//! owned by the server and must not change. `NormalizedResult` is the derived
//! view-model handed to chart consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Base URL for MeSH descriptor pages
const MESH_BROWSER_URL: &str = "https://meshb.nlm.nih.gov/record/ui?ui=";

// ─────────────────────────────────────────────────────────────────────────────
// WIRE SCHEMA (read-only input to the normalizer)
// ─────────────────────────────────────────────────────────────────────────────

/// Full `/neighbors` response body.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RawResult {
    /// Year (as a string key) to that year's nearest neighbours, closest first
    #[serde(default, deserialize_with = "null_as_default")]
    pub neighbors: BTreeMap<String, Vec<RawNeighbor>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub frequency: Vec<RawFrequency>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub changepoints: Vec<RawChangepoint>,
    /// 2-D projection points. The live server calls this `umap_coords`.
    #[serde(default, alias = "umap_coords", deserialize_with = "null_as_default")]
    pub umap: Vec<RawProjectionPoint>,
}

/// One neighbour entry. Older payloads send bare strings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawNeighbor {
    Token(String),
    Record {
        token: String,
        #[serde(default)]
        tag_id: Option<String>,
        #[serde(default)]
        score: Option<f64>,
    },
}

impl RawNeighbor {
    pub fn token(&self) -> &str {
        match self {
            RawNeighbor::Token(token) => token,
            RawNeighbor::Record { token, .. } => token,
        }
    }

    /// Tag id, ignoring blank ones
    pub fn tag_id(&self) -> Option<&str> {
        match self {
            RawNeighbor::Record { tag_id: Some(tag), .. } if !tag.trim().is_empty() => Some(tag),
            _ => None,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            RawNeighbor::Record { score, .. } => (*score).filter(|s| s.is_finite()),
            RawNeighbor::Token(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawFrequency {
    #[serde(deserialize_with = "year_string")]
    pub year: String,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default)]
    pub normalized_frequency: Option<f64>,
}

/// A changepoint as either `"2010-2011"` or `["2010", "2011"]`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawChangepoint {
    Joined(String),
    Pair(Vec<YearValue>),
}

impl RawChangepoint {
    /// Split into a (from, to) year pair. A lone year pairs with itself.
    pub fn split(&self) -> (String, String) {
        let parts: Vec<String> = match self {
            RawChangepoint::Joined(joined) => joined
                .split('-')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect(),
            RawChangepoint::Pair(pair) => pair.iter().map(YearValue::to_year_string).collect(),
        };
        let from = parts.first().cloned().unwrap_or_default();
        let to = parts.get(1).cloned().unwrap_or_else(|| from.clone());
        (from, to)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawProjectionPoint {
    pub token: String,
    #[serde(deserialize_with = "year_string")]
    pub year: String,
    #[serde(rename = "umap_x_coord", alias = "x")]
    pub x: f64,
    #[serde(rename = "umap_y_coord", alias = "y")]
    pub y: f64,
    /// Server-side flag; partitioning goes by token equality instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_query: Option<bool>,
}

/// A year that may arrive as a JSON number or string
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum YearValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl YearValue {
    pub fn to_year_string(&self) -> String {
        match self {
            YearValue::Int(year) => year.to_string(),
            YearValue::Float(year) => format!("{}", year.trunc() as i64),
            YearValue::Text(year) => year.trim().to_string(),
        }
    }
}

fn year_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    YearValue::deserialize(deserializer).map(|year| year.to_year_string())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ─────────────────────────────────────────────────────────────────────────────
// VIEW-MODEL (output of the normalizer)
// ─────────────────────────────────────────────────────────────────────────────

/// A distinct neighbour across all years
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueNeighbor {
    pub word: String,
    /// Number of distinct years the word appears in
    pub year_count: usize,
    pub tagged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyPoint {
    pub year: String,
    pub frequency: f64,
    pub normalized_frequency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub token: String,
    pub year: String,
    pub x: f64,
    pub y: f64,
}

/// Where a word sits relative to two selected years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum YearPresence {
    InA,
    InB,
    InBoth,
    Neither,
}

/// Derived view-model. Built once per successful fetch, never mutated.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResult {
    /// The query word these results belong to
    pub query: String,
    /// Year to plain neighbour tokens. Years without neighbours are absent.
    pub neighbors_by_year: BTreeMap<String, Vec<String>>,
    pub tags_by_word: BTreeMap<String, String>,
    pub scores_by_word: BTreeMap<String, f64>,
    /// Sorted by year count descending, then word ascending (ordinal)
    pub unique_neighbors: Vec<UniqueNeighbor>,
    pub frequency_series: Vec<FrequencyPoint>,
    pub changepoints: Vec<(String, String)>,
    /// The query word's own projection points, in payload order
    pub trajectory_points: Vec<ProjectionPoint>,
    pub neighbor_points: Vec<ProjectionPoint>,
}

impl NormalizedResult {
    /// Years that have at least one neighbour, ascending
    pub fn years(&self) -> Vec<&str> {
        self.neighbors_by_year.keys().map(String::as_str).collect()
    }

    pub fn year_count(&self, word: &str) -> usize {
        self.neighbors_by_year
            .values()
            .filter(|tokens| tokens.iter().any(|t| t == word))
            .count()
    }

    pub fn is_tagged(&self, word: &str) -> bool {
        self.tags_by_word.contains_key(word)
    }

    /// Closest `top` neighbours for one year
    pub fn top_neighbors(&self, year: &str, top: usize) -> &[String] {
        match self.neighbors_by_year.get(year) {
            Some(tokens) => &tokens[..tokens.len().min(top)],
            None => &[],
        }
    }

    /// Reference page for a tagged word. Only MeSH descriptors have one.
    pub fn tag_link(&self, word: &str) -> Option<String> {
        let tag = self.tags_by_word.get(word)?;
        let lower = tag.to_lowercase();
        let start = lower.rfind("mesh_")? + "mesh_".len();
        let descriptor = lower[start..].trim();
        if descriptor.is_empty() {
            return None;
        }
        Some(format!("{}{}", MESH_BROWSER_URL, descriptor.to_uppercase()))
    }

    pub fn compare_years(&self, year_a: &str, year_b: &str, word: &str) -> YearPresence {
        let contains = |year: &str| {
            self.neighbors_by_year
                .get(year)
                .map(|tokens| tokens.iter().any(|t| t == word))
                .unwrap_or(false)
        };
        match (contains(year_a), contains(year_b)) {
            (true, true) => YearPresence::InBoth,
            (true, false) => YearPresence::InA,
            (false, true) => YearPresence::InB,
            (false, false) => YearPresence::Neither,
        }
    }
}
