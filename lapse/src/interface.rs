//! Word Lapse public interface
//!
//! This file defines the records shared between the query orchestrator, the
//! HTTP client and whatever renders the results. It acts as the source of
//! truth for shared types.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::models::{NormalizedResult, RawResult};

/// Generic text shown for failures that carry no server-provided message.
pub const GENERIC_FETCH_ERROR: &str = "Error fetching results";

// ═══════════════════════════════════════════════════════════════════════════════
// RECORDS (Structs)
// ═══════════════════════════════════════════════════════════════════════════════

/// A trimmed, non-empty search word plus the corpus it should be run against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SearchQuery {
    text: String,
    corpus: Option<String>,
}

impl SearchQuery {
    /// Build a query from raw user input. Returns `None` for blank input,
    /// which is the "empty" state rather than an error.
    pub fn new(text: &str, corpus: Option<&str>) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let corpus = corpus
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        Some(Self {
            text: trimmed.to_string(),
            corpus,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn corpus(&self) -> Option<&str> {
        self.corpus.as_deref()
    }
}

/// Identifier minted for every issued query. Only the latest one may commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct QueryToken(u64);

impl QueryToken {
    pub(crate) fn next(self) -> Self {
        QueryToken(self.0.wrapping_add(1))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Server metadata from the API root. Every field degrades to a default.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Metadata {
    pub name: Option<String>,
    pub commit_sha: Option<String>,
    /// Corpus id to human label
    pub corpora: BTreeMap<String, String>,
    /// Number of words whose results are already cached server-side
    pub cached_entries: Option<u64>,
    /// Number of backend workers, when the server reports one
    pub worker_concurrency: Option<u32>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENUMS
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifecycle status of the most recent query.
///
/// A successful status owns its view-model, so an error or empty state can
/// never carry stale results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Status {
    /// Nothing searched (initial state, or the query became blank)
    Empty,
    /// Waiting to hear whether the server already has this result
    CheckingCache,
    /// Not cached; the server computes it and this may take a while
    LoadingUncached,
    /// Cached; should arrive quickly
    LoadingCached,
    Success { result: Arc<NormalizedResult> },
    Error { message: String },
}

impl Status {
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            Status::CheckingCache | Status::LoadingUncached | Status::LoadingCached
        )
    }

    pub fn result(&self) -> Option<&Arc<NormalizedResult>> {
        match self {
            Status::Success { result } => Some(result),
            _ => None,
        }
    }

    /// Human readable line for the status area of a UI
    pub fn describe(&self) -> String {
        match self {
            Status::Empty => "Enter a word to see results".to_string(),
            Status::CheckingCache => "Checking for cached results".to_string(),
            Status::LoadingUncached => {
                "Computing results, this may take a minute or two".to_string()
            }
            Status::LoadingCached => "Loading cached results".to_string(),
            Status::Success { result } => {
                format!("Results for \"{}\"", result.query)
            }
            Status::Error { message } => message.clone(),
        }
    }
}

/// Read-only snapshot published to subscribers after every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppState {
    /// Current query text (trimmed; empty when nothing searched)
    pub query: String,
    pub corpus: Option<String>,
    pub status: Status,
}

impl AppState {
    pub fn empty(corpus: Option<String>) -> Self {
        Self {
            query: String::new(),
            corpus,
            status: Status::Empty,
        }
    }

    pub fn result(&self) -> Option<&Arc<NormalizedResult>> {
        self.status.result()
    }
}

/// Error type for Word Lapse operations
#[derive(Debug, Error)]
pub enum LapseError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    /// Validation error reported by the API inside the response body
    #[error("{0}")]
    Api(String),
    #[error("Malformed response: {0}")]
    Decode(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl LapseError {
    /// Message to surface in `Status::Error`.
    pub fn user_message(&self) -> String {
        match self {
            LapseError::Api(message) if !message.trim().is_empty() => message.clone(),
            _ => GENERIC_FETCH_ERROR.to_string(),
        }
    }
}

impl From<reqwest::Error> for LapseError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            LapseError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            LapseError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            LapseError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for LapseError {
    fn from(e: serde_json::Error) -> Self {
        LapseError::Decode(e.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE INTERFACE
// ═══════════════════════════════════════════════════════════════════════════════

/// The remote Word Lapse API. `HttpApi` talks to the live service; tests plug
/// in scripted implementations.
#[async_trait::async_trait]
pub trait WordLapseApi: Send + Sync {
    /// Ask whether the result for this query is already precomputed.
    async fn is_cached(&self, query: &SearchQuery) -> Result<bool, LapseError>;

    /// Fetch the full result set for this query.
    async fn neighbors(&self, query: &SearchQuery) -> Result<RawResult, LapseError>;

    /// Completion candidates for a partial word, best first.
    async fn autocomplete(&self, prefix: &str) -> Result<Vec<String>, LapseError>;

    /// Corpus list and cache statistics.
    async fn metadata(&self) -> Result<Metadata, LapseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_trims_and_rejects_blank() {
        assert!(SearchQuery::new("   ", None).is_none());
        assert!(SearchQuery::new("", Some("abstracts")).is_none());

        let q = SearchQuery::new("  gene \n", Some(" abstracts ")).unwrap();
        assert_eq!(q.text(), "gene");
        assert_eq!(q.corpus(), Some("abstracts"));

        let q = SearchQuery::new("gene", Some("  ")).unwrap();
        assert_eq!(q.corpus(), None);
    }

    #[test]
    fn test_token_ordering() {
        let a = QueryToken::default();
        let b = a.next();
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn test_user_message_uses_api_text_only_for_semantic_errors() {
        let api = LapseError::Api("Token not in vocabulary".to_string());
        assert_eq!(api.user_message(), "Token not in vocabulary");

        let http = LapseError::Http { status: 500, message: "boom".to_string() };
        assert_eq!(http.user_message(), GENERIC_FETCH_ERROR);

        let transport = LapseError::Transport("connection refused".to_string());
        assert_eq!(transport.user_message(), GENERIC_FETCH_ERROR);

        let blank = LapseError::Api("  ".to_string());
        assert_eq!(blank.user_message(), GENERIC_FETCH_ERROR);
    }

    #[test]
    fn test_status_result_only_on_success() {
        assert!(Status::Empty.result().is_none());
        assert!(Status::Error { message: "x".to_string() }.result().is_none());
        assert!(Status::LoadingCached.is_loading());
        assert!(!Status::Empty.is_loading());
    }
}
