//! Query orchestrator behaviour against a scripted API.
//!
//! Every `/neighbors` response is held in a oneshot channel until the test
//! releases it, so completion order is chosen by the test rather than by
//! timing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lapse::models::RawResult;
use lapse::{AppState, LapseConfig, LapseError, LapseStore, Metadata, SearchQuery, Status, WordLapseApi};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{oneshot, watch};

type Reply = Result<RawResult, LapseError>;

#[derive(Clone, Copy)]
enum Probe {
    Cached(bool),
    Fails,
    Hangs,
}

struct ScriptedApi {
    probe: Probe,
    replies: Mutex<HashMap<String, oneshot::Receiver<Reply>>>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedApi {
    fn new(probe: Probe) -> Arc<Self> {
        Arc::new(Self {
            probe,
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Hold the reply for `word` until the returned sender fires
    fn script(&self, word: &str) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.replies.lock().insert(word.to_string(), rx);
        tx
    }

    fn called(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(word, _)| word.clone()).collect()
    }

    async fn wait_for_call(&self, word: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.called().iter().any(|w| w == word) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("fetch was never issued");
    }
}

#[async_trait::async_trait]
impl WordLapseApi for ScriptedApi {
    async fn is_cached(&self, _query: &SearchQuery) -> Result<bool, LapseError> {
        match self.probe {
            Probe::Cached(cached) => Ok(cached),
            Probe::Fails => Err(LapseError::Transport("connection reset".to_string())),
            Probe::Hangs => std::future::pending().await,
        }
    }

    async fn neighbors(&self, query: &SearchQuery) -> Result<RawResult, LapseError> {
        self.calls
            .lock()
            .push((query.text().to_string(), query.corpus().map(str::to_string)));
        let reply = self.replies.lock().remove(query.text());
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(LapseError::Transport("reply dropped".to_string()))),
            None => Err(LapseError::Transport("unscripted query".to_string())),
        }
    }

    async fn autocomplete(&self, _prefix: &str) -> Result<Vec<String>, LapseError> {
        Ok(vec!["gene".to_string(), "genetics".to_string()])
    }

    async fn metadata(&self) -> Result<Metadata, LapseError> {
        Ok(Metadata::default())
    }
}

fn neighbors_of(word: &str) -> Reply {
    Ok(serde_json::from_value(json!({"neighbors": {"2010": [format!("{}-neighbor", word)]}})).unwrap())
}

fn store(api: &Arc<ScriptedApi>) -> LapseStore {
    LapseStore::new(api.clone(), LapseConfig::default())
}

/// Collect the states a subscriber sees. A watch keeps only the newest value,
/// so publishes in quick succession may be skipped.
fn record(mut rx: watch::Receiver<AppState>) -> Arc<Mutex<Vec<AppState>>> {
    let seen = Arc::new(Mutex::new(vec![rx.borrow().clone()]));
    let sink = seen.clone();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            sink.lock().push(state);
        }
    });
    seen
}

fn success_query(status: &Status) -> Option<&str> {
    status.result().map(|r| r.query.as_str())
}

// ============================================================
// Staleness
// ============================================================

#[tokio::test]
async fn later_query_wins_when_it_completes_first() {
    let api = ScriptedApi::new(Probe::Cached(true));
    let tx_alpha = api.script("alpha");
    let tx_beta = api.script("beta");
    let store = store(&api);

    let alpha = tokio::spawn({
        let store = store.clone();
        async move { store.submit("alpha", None).await }
    });
    api.wait_for_call("alpha").await;

    let beta = tokio::spawn({
        let store = store.clone();
        async move { store.submit("beta", None).await }
    });
    api.wait_for_call("beta").await;

    tx_beta.send(neighbors_of("beta")).unwrap();
    let beta_status = beta.await.unwrap().unwrap();
    assert_eq!(success_query(&beta_status), Some("beta"));

    // alpha arrives late (if at all) and must not overwrite beta
    let _ = tx_alpha.send(neighbors_of("alpha"));
    assert_eq!(alpha.await.unwrap(), None);

    let state = store.snapshot();
    assert_eq!(state.query, "beta");
    assert_eq!(
        state.result().unwrap().neighbors_by_year["2010"],
        vec!["beta-neighbor".to_string()]
    );
}

#[tokio::test]
async fn only_last_of_many_overlapping_queries_is_visible() {
    let api = ScriptedApi::new(Probe::Cached(false));
    let words = ["q0", "q1", "q2", "q3", "q4"];
    let mut senders: Vec<_> = words.iter().map(|w| api.script(w)).collect();
    let store = store(&api);
    let seen = record(store.subscribe());

    let mut handles = Vec::new();
    for word in words {
        let store = store.clone();
        handles.push(tokio::spawn(async move { store.submit(word, None).await }));
        api.wait_for_call(word).await;
    }

    // resolve newest first, oldest last
    while let Some(tx) = senders.pop() {
        let word = words[senders.len()];
        let _ = tx.send(neighbors_of(word));
        tokio::task::yield_now().await;
    }

    let outcomes: Vec<Option<Status>> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|h| h.unwrap())
        .collect();
    assert!(outcomes[..4].iter().all(Option::is_none));
    assert_eq!(success_query(outcomes[4].as_ref().unwrap()), Some("q4"));

    tokio::task::yield_now().await;
    assert_eq!(store.snapshot().query, "q4");
    for state in seen.lock().iter() {
        if let Some(query) = success_query(&state.status) {
            assert_eq!(query, "q4", "stale result became visible");
        }
    }
}

#[tokio::test]
async fn blank_query_supersedes_in_flight_fetch() {
    let api = ScriptedApi::new(Probe::Cached(true));
    let tx = api.script("gene");
    let store = store(&api);

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.submit("gene", None).await }
    });
    api.wait_for_call("gene").await;

    assert_eq!(store.submit("  ", None).await, Some(Status::Empty));
    let _ = tx.send(neighbors_of("gene"));
    assert_eq!(pending.await.unwrap(), None);
    assert_eq!(store.snapshot().status, Status::Empty);
}

// ============================================================
// Cache probe
// ============================================================

#[tokio::test]
async fn probe_failure_does_not_block_fetch() {
    let api = ScriptedApi::new(Probe::Fails);
    let tx = api.script("gene");
    let store = store(&api);
    let mut rx = store.subscribe();

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.submit("gene", None).await }
    });

    rx.wait_for(|s| s.status == Status::LoadingUncached).await.unwrap();
    tx.send(neighbors_of("gene")).unwrap();

    let status = pending.await.unwrap().unwrap();
    assert_eq!(success_query(&status), Some("gene"));
}

#[tokio::test]
async fn hanging_probe_does_not_delay_fetch() {
    let api = ScriptedApi::new(Probe::Hangs);
    let tx = api.script("gene");
    tx.send(neighbors_of("gene")).unwrap();
    let store = store(&api);

    let status = tokio::time::timeout(Duration::from_secs(1), store.submit("gene", None))
        .await
        .expect("fetch waited on the probe")
        .unwrap();
    assert_eq!(success_query(&status), Some("gene"));
}

#[tokio::test]
async fn cached_probe_selects_loading_cached() {
    let api = ScriptedApi::new(Probe::Cached(true));
    let tx = api.script("gene");
    let store = store(&api);
    let mut rx = store.subscribe();

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.submit("gene", Some("abstracts")).await }
    });

    let state = rx.wait_for(|s| s.status == Status::LoadingCached).await.unwrap().clone();
    assert_eq!(state.query, "gene");
    assert_eq!(state.corpus.as_deref(), Some("abstracts"));
    assert!(state.result().is_none());

    tx.send(neighbors_of("gene")).unwrap();
    assert!(pending.await.unwrap().unwrap().result().is_some());
}

// ============================================================
// Failures
// ============================================================

#[tokio::test]
async fn error_state_clears_previous_result() {
    let api = ScriptedApi::new(Probe::Cached(true));
    api.script("gene").send(neighbors_of("gene")).unwrap();
    api.script("bogus")
        .send(Err(LapseError::Http {
            status: 502,
            message: "Bad Gateway".to_string(),
        }))
        .unwrap();
    let store = store(&api);

    store.submit("gene", None).await;
    assert!(store.snapshot().result().is_some());

    let status = store.submit("bogus", None).await.unwrap();
    assert_eq!(
        status,
        Status::Error {
            message: "Error fetching results".to_string()
        }
    );
    let state = store.snapshot();
    assert_eq!(state.query, "bogus");
    assert!(state.result().is_none());
}

#[tokio::test]
async fn api_validation_message_is_shown() {
    let api = ScriptedApi::new(Probe::Cached(false));
    api.script("x")
        .send(Err(LapseError::Api("Token not found in any year".to_string())))
        .unwrap();
    let store = store(&api);

    let status = store.submit("x", None).await.unwrap();
    assert_eq!(status.describe(), "Token not found in any year");
}

// ============================================================
// Debounce
// ============================================================

#[tokio::test(start_paused = true)]
async fn keystrokes_coalesce_into_one_request() {
    let api = ScriptedApi::new(Probe::Cached(true));
    api.script("gene").send(neighbors_of("gene")).unwrap();
    let store = store(&api);
    let mut rx = store.subscribe();

    for partial in ["g", "ge", "gen", "gene"] {
        store.input(partial, None);
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    assert!(api.called().is_empty(), "fired before input went quiet");

    tokio::time::sleep(Duration::from_millis(800)).await;
    rx.wait_for(|s| s.result().is_some()).await.unwrap();
    assert_eq!(api.called(), vec!["gene".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn explicit_submit_bypasses_debounce() {
    let api = ScriptedApi::new(Probe::Cached(true));
    api.script("gene").send(neighbors_of("gene")).unwrap();
    let store = store(&api);

    store.input("gen", None);
    let started = tokio::time::Instant::now();
    let status = store.submit("gene", None).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(1000));
    assert_eq!(success_query(&status), Some("gene"));

    // the pending "gen" timer was cleared and never fires
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(api.called(), vec!["gene".to_string()]);
    assert_eq!(store.snapshot().query, "gene");
}

// ============================================================
// End to end
// ============================================================

#[tokio::test]
async fn gene_in_abstracts_end_to_end() {
    let api = ScriptedApi::new(Probe::Cached(false));
    let raw: RawResult = serde_json::from_value(json!({
        "neighbors": {"2010": [{"token": "dna"}], "2011": []},
        "frequency": [{"year": 2010, "frequency": 5, "normalized_frequency": 0.1}],
        "changepoints": [],
        "umap": [
            {"token": "gene", "umap_x_coord": 0, "umap_y_coord": 0, "year": 2010},
            {"token": "dna", "umap_x_coord": 1, "umap_y_coord": 1, "year": 2010}
        ]
    }))
    .unwrap();
    api.script("gene").send(Ok(raw)).unwrap();
    let store = store(&api);

    let status = store.submit("gene", Some("abstracts")).await.unwrap();
    let result = status.result().expect("success");

    assert_eq!(api.calls.lock()[0], ("gene".to_string(), Some("abstracts".to_string())));
    assert_eq!(result.neighbors_by_year.len(), 1);
    assert_eq!(result.neighbors_by_year["2010"], vec!["dna".to_string()]);
    assert_eq!(result.unique_neighbors.len(), 1);
    assert_eq!(result.unique_neighbors[0].word, "dna");
    assert_eq!(result.unique_neighbors[0].year_count, 1);
    assert_eq!(result.trajectory_points.len(), 1);
    assert_eq!(result.trajectory_points[0].token, "gene");
    assert_eq!(result.neighbor_points[0].token, "dna");
    assert_eq!(result.frequency_series[0].year, "2010");
    assert!(result.changepoints.is_empty());
}

#[tokio::test]
async fn autocomplete_passes_through() {
    let api = ScriptedApi::new(Probe::Cached(true));
    let store = store(&api);
    assert_eq!(store.autocomplete("gen").await, vec!["gene".to_string(), "genetics".to_string()]);
}
