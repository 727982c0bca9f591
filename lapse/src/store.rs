//! LapseStore - query orchestrator
//!
//! Drives "fetch the results for word W in corpus C" from keystrokes to a
//! published view-model, and makes sure a UI never shows the result of a
//! query the user has already moved past.
//!
//! Staleness Architecture:
//! Every submit mints a `QueryToken` and records it as latest before doing
//! any async work. Every state transition is committed through `commit`,
//! which re-checks the token under the same lock that guards it. A result
//! whose token is no longer latest is dropped silently.
//!
//! Cancellation Architecture:
//! Superseded work is also cancelled for economy. Each debounce timer and
//! each in-flight fetch is tied to a CancellationToken held through a
//! DropGuard; replacing the guard cancels the old work. Correctness never
//! depends on this, only on the token check above.

use std::sync::{Arc, Weak};
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::HttpApi;
use crate::config::LapseConfig;
use crate::interface::{AppState, LapseError, Metadata, QueryToken, SearchQuery, Status, WordLapseApi};
use crate::normalize::normalize;

/// Global fallback Tokio runtime for when the store is driven outside any runtime context.
/// Shared across all LapseStore instances and never dropped.
static FALLBACK_RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to create fallback tokio runtime")
});

/// RAII guard that cancels a token when dropped.
/// Overwriting the slot that holds it cancels whatever it was guarding.
struct DropGuard {
    token: CancellationToken,
}

impl DropGuard {
    fn new(token: CancellationToken) -> Self {
        Self { token }
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The latest query and the guard over its fetch, always swapped together
struct Latest {
    token: QueryToken,
    in_flight: Option<DropGuard>,
}

struct Inner {
    api: Arc<dyn WordLapseApi>,
    config: LapseConfig,
    latest: Mutex<Latest>,
    state: watch::Sender<AppState>,
    /// Debounce timer for the last keystroke, if one is pending
    pending_input: Mutex<Option<DropGuard>>,
    /// Every published state, in order
    #[cfg(test)]
    history: Mutex<Vec<AppState>>,
}

impl Inner {
    /// Mint a token for a new query, install `guard` over its fetch
    /// (cancelling the previous one) and publish its first state.
    fn begin(&self, state: AppState, guard: Option<DropGuard>) -> QueryToken {
        let mut latest = self.latest.lock();
        latest.token = latest.token.next();
        latest.in_flight = guard;
        self.publish(state);
        latest.token
    }

    /// Publish `state` only if `token` is still the latest query.
    fn commit(&self, token: QueryToken, state: AppState) -> bool {
        let latest = self.latest.lock();
        if latest.token != token {
            return false;
        }
        self.publish(state);
        true
    }

    fn publish(&self, state: AppState) {
        #[cfg(test)]
        self.history.lock().push(state.clone());
        self.state.send_replace(state);
    }

    fn resolve_corpus(&self, corpus: Option<&str>) -> Option<String> {
        corpus
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.default_corpus.clone())
    }
}

/// Query orchestrator with a subscribable `AppState`.
///
/// Concurrency Model:
/// - All shared state lives behind one `Arc`; handles are cheap to clone
/// - Token minting, fetch guard swap, token check and state publish all
///   happen under the same lock
/// - Debounce timers hold a `Weak` reference and die with the store
/// - Uses global FALLBACK_RUNTIME when `input` is called outside any runtime
#[derive(Clone)]
pub struct LapseStore {
    inner: Arc<Inner>,
}

impl LapseStore {
    pub fn new(api: Arc<dyn WordLapseApi>, config: LapseConfig) -> Self {
        let (state, _) = watch::channel(AppState::empty(config.default_corpus.clone()));
        Self {
            inner: Arc::new(Inner {
                api,
                config,
                latest: Mutex::new(Latest {
                    token: QueryToken::default(),
                    in_flight: None,
                }),
                state,
                pending_input: Mutex::new(None),
                #[cfg(test)]
                history: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Store backed by the live HTTP API
    pub fn connect(config: LapseConfig) -> Result<Self, LapseError> {
        let api = HttpApi::new(&config)?;
        Ok(Self::new(Arc::new(api), config))
    }

    pub fn config(&self) -> &LapseConfig {
        &self.inner.config
    }

    /// Get a tokio runtime handle - uses current runtime if available, otherwise global fallback
    fn runtime_handle(&self) -> tokio::runtime::Handle {
        tokio::runtime::Handle::try_current()
            .unwrap_or_else(|_| FALLBACK_RUNTIME.handle().clone())
    }

    /// Receiver that sees every published state from now on.
    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.inner.state.subscribe()
    }

    /// Current state
    pub fn snapshot(&self) -> AppState {
        self.inner.state.borrow().clone()
    }

    pub fn latest_token(&self) -> QueryToken {
        self.inner.latest.lock().token
    }

    /// Keystroke-level input. The query is only submitted once input has
    /// been quiet for the configured debounce interval; each call restarts
    /// the timer. Blank input empties the state right away.
    pub fn input(&self, query: &str, corpus: Option<&str>) {
        if query.trim().is_empty() {
            self.inner.pending_input.lock().take();
            self.commit_empty(corpus);
            return;
        }

        let token = CancellationToken::new();
        // Replacing the previous guard cancels the previous timer
        *self.inner.pending_input.lock() = Some(DropGuard::new(token.clone()));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let debounce = self.inner.config.debounce;
        let query = query.to_string();
        let corpus = corpus.map(str::to_string);

        self.runtime_handle().spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(debounce) => {}
            }

            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                let mut pending = inner.pending_input.lock();
                // A newer keystroke cancels this token under the same lock
                if token.is_cancelled() {
                    return;
                }
                // Still ours, and nothing waits on it anymore
                pending.take();
            }

            let store = LapseStore { inner };
            store.run(&query, corpus.as_deref()).await;
        });
    }

    /// Explicit submission (e.g. pressing enter). Bypasses and clears any
    /// pending debounce.
    ///
    /// Returns the final status this query committed, or `None` when a newer
    /// query superseded it before it finished.
    pub async fn submit(&self, query: &str, corpus: Option<&str>) -> Option<Status> {
        self.inner.pending_input.lock().take();
        self.run(query, corpus).await
    }

    /// Switch corpus and re-run the current query against it.
    pub async fn set_corpus(&self, corpus: Option<&str>) -> Option<Status> {
        let query = self.snapshot().query;
        self.submit(&query, corpus).await
    }

    fn commit_empty(&self, corpus: Option<&str>) -> Status {
        let corpus = self.inner.resolve_corpus(corpus);
        self.inner.begin(AppState::empty(corpus), None);
        debug!("Query cleared");
        Status::Empty
    }

    async fn run(&self, query: &str, corpus: Option<&str>) -> Option<Status> {
        let corpus = self.inner.resolve_corpus(corpus);
        let Some(search) = SearchQuery::new(query, corpus.as_deref()) else {
            return Some(self.commit_empty(corpus.as_deref()));
        };

        let cancel = CancellationToken::new();
        let state = |status: Status| AppState {
            query: search.text().to_string(),
            corpus: search.corpus().map(str::to_string),
            status,
        };

        let token = self
            .inner
            .begin(state(Status::CheckingCache), Some(DropGuard::new(cancel.clone())));
        let started = Instant::now();
        debug!(
            "Query issued - token={}, tok={}, corpus={:?}",
            token.value(),
            search.text(),
            search.corpus()
        );

        let api = &self.inner.api;
        let fetch = api.neighbors(&search);
        tokio::pin!(fetch);
        let probe = tokio::time::timeout(self.inner.config.probe_timeout, api.is_cached(&search));

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Query superseded before completion - token={}", token.value());
                return None;
            }
            cached = probe => {
                let cached = match cached {
                    Ok(Ok(cached)) => cached,
                    Ok(Err(e)) => {
                        warn!("Cache probe failed, assuming uncached - tok={}, error={}", search.text(), e);
                        false
                    }
                    Err(_) => {
                        warn!("Cache probe timed out, assuming uncached - tok={}", search.text());
                        false
                    }
                };
                let status = if cached { Status::LoadingCached } else { Status::LoadingUncached };
                if self.inner.commit(token, state(status)) {
                    debug!("Cache probe answered - token={}, cached={}", token.value(), cached);
                }

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Query superseded before completion - token={}", token.value());
                        return None;
                    }
                    result = &mut fetch => result,
                }
            }
            result = &mut fetch => result,
        };

        let status = match outcome {
            Ok(raw) => Status::Success {
                result: Arc::new(normalize(&raw, search.text())),
            },
            Err(e) => {
                warn!("Fetch failed - tok={}, error={}", search.text(), e);
                Status::Error {
                    message: e.user_message(),
                }
            }
        };

        if !self.inner.commit(token, state(status.clone())) {
            debug!("Discarding stale result - token={}, tok={}", token.value(), search.text());
            return None;
        }

        if let Status::Success { result } = &status {
            info!(
                "Results committed - tok={}, years={}, neighbors={}, duration={:.2}s",
                search.text(),
                result.neighbors_by_year.len(),
                result.unique_neighbors.len(),
                started.elapsed().as_secs_f32()
            );
        }
        Some(status)
    }

    /// Completion candidates. Failures degrade to an empty list.
    pub async fn autocomplete(&self, prefix: &str) -> Vec<String> {
        match self.inner.api.autocomplete(prefix).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Autocomplete failed - prefix={}, error={}", prefix, e);
                Vec::new()
            }
        }
    }

    /// Server metadata. Failures degrade to defaults.
    pub async fn metadata(&self) -> Metadata {
        match self.inner.api.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Metadata fetch failed - error={}", e);
                Metadata::default()
            }
        }
    }
}
