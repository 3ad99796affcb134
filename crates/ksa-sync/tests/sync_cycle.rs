//! Sync loop integration tests
//!
//! Drives the loop with scripted secret sources against real stores and
//! checks what the login lookup observes afterwards.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tempfile::TempDir;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use ksa_core::{
    authenticate, CredentialRecord, CredentialStore, Decision, DecodeError, FileStore,
    MemoryStore, SourceError,
};
use ksa_sync::{CycleOutcome, IntervalTicks, SecretSource, SyncLoop, SyncState, TickSource};

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

fn record(namespace: &str, name: &str, pass: &str, service: &str) -> CredentialRecord {
    CredentialRecord::new(namespace, name)
        .with_field("pass", STANDARD.encode(pass))
        .with_field("key", STANDARD.encode(format!("ssh-ed25519 AAAA {}", name)))
        .with_field("service", STANDARD.encode(service))
}

/// Source that replays a fixed sequence of fetch results
#[derive(Default)]
struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Vec<CredentialRecord>, SourceError>>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(responses: Vec<Result<Vec<CredentialRecord>, SourceError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretSource for ScriptedSource {
    async fn fetch(&self) -> Result<Vec<CredentialRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Unavailable("script exhausted".into())))
    }
}

/// Source whose fetch takes a fixed time and records when each one started
struct SlowSource {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    starts: Mutex<Vec<Instant>>,
}

impl SlowSource {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            starts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SecretSource for SlowSource {
    async fn fetch(&self) -> Result<Vec<CredentialRecord>, SourceError> {
        self.starts.lock().unwrap().push(Instant::now());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![record("ns1", "alice", "s3cret", "git")])
    }
}

/// Ticks a fixed number of times, then never again
struct CountedTicks {
    remaining: usize,
}

#[async_trait]
impl TickSource for CountedTicks {
    async fn tick(&mut self) {
        if self.remaining == 0 {
            std::future::pending::<()>().await;
        }
        self.remaining -= 1;
    }
}

fn memory_loop(source: Arc<dyn SecretSource>) -> (SyncLoop, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let sync = SyncLoop::new(source, store.clone(), FETCH_TIMEOUT);
    (sync, store)
}

#[tokio::test]
async fn test_alice_scenario() {
    let source = Arc::new(ScriptedSource::new(vec![Ok(vec![record(
        "ns1", "alice", "s3cret", "git",
    )])]));
    let (sync, store) = memory_loop(source);

    assert!(sync.run_cycle().await.is_committed());

    let entry = store.get("ns1-alice").unwrap().unwrap();
    assert_eq!(entry.password, "s3cret");
    assert_eq!(entry.service, "git.ns1.svc.cluster.local");

    assert_eq!(
        authenticate(store.as_ref(), "ns1-alice", "s3cret"),
        Decision::Accepted("git.ns1.svc.cluster.local".into())
    );
    assert_eq!(authenticate(store.as_ref(), "ns1-alice", "wrong"), Decision::Rejected);
}

#[tokio::test]
async fn test_user_override_replaces_namespace_name() {
    let bob = record("ns1", "alice", "pw", "git").with_field("user", STANDARD.encode("bob"));
    let source = Arc::new(ScriptedSource::new(vec![Ok(vec![bob])]));
    let (sync, store) = memory_loop(source);

    sync.run_cycle().await;

    assert!(store.get("bob").unwrap().is_some());
    assert!(store.get("ns1-alice").unwrap().is_none());
}

#[tokio::test]
async fn test_missing_pass_is_skipped_without_aborting_cycle() {
    let mut broken = record("ns1", "broken", "x", "git");
    broken.data.remove("pass");

    let source = Arc::new(ScriptedSource::new(vec![Ok(vec![
        record("ns1", "alice", "a", "git"),
        broken,
        record("ns2", "carol", "c", "web"),
    ])]));
    let (sync, store) = memory_loop(source);

    let report = match sync.run_cycle().await {
        CycleOutcome::Committed(report) => report,
        other => panic!("expected commit, got {:?}", other),
    };

    assert_eq!(report.fetched, 3);
    assert_eq!(report.committed, 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, DecodeError::MissingField("pass"));

    assert!(store.get("ns1-broken").unwrap().is_none());
    assert!(store.get("ns1-alice").unwrap().is_some());
    assert_eq!(
        store.get("ns2-carol").unwrap().unwrap().service,
        "web.ns2.svc.cluster.local"
    );
}

#[tokio::test]
async fn test_deleted_secret_is_revoked_next_cycle() {
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(vec![record("ns1", "alice", "a", "git"), record("ns1", "dave", "d", "git")]),
        Ok(vec![record("ns1", "alice", "a", "git")]),
    ]));
    let (sync, store) = memory_loop(source);

    sync.run_cycle().await;
    assert!(authenticate(store.as_ref(), "ns1-dave", "d").is_accepted());

    sync.run_cycle().await;
    assert_eq!(authenticate(store.as_ref(), "ns1-dave", "d"), Decision::Rejected);
    assert_eq!(store.snapshot().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_fetch_empties_cache() {
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(vec![record("ns1", "alice", "a", "git")]),
        Ok(vec![]),
    ]));
    let (sync, store) = memory_loop(source);

    sync.run_cycle().await;
    assert!(sync.run_cycle().await.is_committed());
    assert!(store.snapshot().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_fetch_leaves_cache_file_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    let store = Arc::new(FileStore::open(&path).unwrap());

    let source = Arc::new(ScriptedSource::new(vec![
        Ok(vec![record("ns1", "alice", "s3cret", "git")]),
        Err(SourceError::Unavailable("connection refused".into())),
    ]));
    let sync = SyncLoop::new(source, store.clone(), FETCH_TIMEOUT);

    assert!(sync.run_cycle().await.is_committed());
    let before = std::fs::read(&path).unwrap();

    let outcome = sync.run_cycle().await;
    assert!(matches!(outcome, CycleOutcome::SourceFailed(SourceError::Unavailable(_))));

    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert!(authenticate(store.as_ref(), "ns1-alice", "s3cret").is_accepted());
}

#[tokio::test(start_paused = true)]
async fn test_hung_source_times_out() {
    let source = Arc::new(SlowSource::new(Duration::from_secs(60)));
    let (sync, store) = memory_loop(source);

    let outcome = sync.run_cycle().await;
    assert!(matches!(
        outcome,
        CycleOutcome::SourceFailed(SourceError::Timeout(t)) if t == FETCH_TIMEOUT
    ));
    assert!(store.snapshot().unwrap().is_empty());
    assert_eq!(sync.state(), SyncState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_cycle_is_refused() {
    let source = Arc::new(SlowSource::new(Duration::from_secs(1)));
    let (sync, _store) = memory_loop(source.clone());

    let (first, second) = tokio::join!(sync.run_cycle(), sync.run_cycle());

    assert!(first.is_committed());
    assert!(matches!(second, CycleOutcome::Overlapping));
    assert_eq!(source.starts.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_loop_keeps_running_after_failures() {
    let source = Arc::new(ScriptedSource::new(vec![
        Err(SourceError::Unavailable("api down".into())),
        Ok(vec![record("ns1", "alice", "s3cret", "git")]),
        Err(SourceError::Unavailable("api down again".into())),
    ]));
    let (sync, store) = memory_loop(source.clone());
    let sync = Arc::new(sync);
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let sync = Arc::clone(&sync);
        let cancel = cancel.clone();
        async move { sync.run(CountedTicks { remaining: 3 }, cancel).await }
    });

    while source.calls() < 3 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    // Let the last cycle finish before shutting down
    tokio::time::sleep(Duration::from_millis(10)).await;
    cancel.cancel();
    handle.await.unwrap();

    // The successful middle cycle survives the failure after it
    assert!(authenticate(store.as_ref(), "ns1-alice", "s3cret").is_accepted());
}

#[tokio::test(start_paused = true)]
async fn test_overrunning_cycles_never_overlap() {
    let fetch_time = Duration::from_secs(400);
    let source = Arc::new(SlowSource::new(fetch_time));
    let store = Arc::new(MemoryStore::new());
    let sync = Arc::new(SyncLoop::new(
        source.clone(),
        store,
        Duration::from_secs(1000),
    ));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let sync = Arc::clone(&sync);
        let cancel = cancel.clone();
        async move {
            sync.run(IntervalTicks::new(Duration::from_secs(300)), cancel)
                .await
        }
    });

    tokio::time::sleep(Duration::from_secs(1700)).await;
    assert_eq!(sync.state(), SyncState::Syncing);
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);

    let starts = source.starts.lock().unwrap();
    assert!(starts.len() >= 4, "expected at least 4 cycles, got {}", starts.len());
    for pair in starts.windows(2) {
        assert!(
            pair[1] - pair[0] >= fetch_time,
            "cycle started {:?} after the previous one",
            pair[1] - pair[0]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_overrunning_cycle_starts_no_further_cycle() {
    let source = Arc::new(SlowSource::new(Duration::from_secs(400)));
    let store = Arc::new(MemoryStore::new());
    let sync = Arc::new(SyncLoop::new(
        source.clone(),
        store.clone(),
        Duration::from_secs(1000),
    ));
    let cancel = CancellationToken::new();

    let handle = tokio::spawn({
        let sync = Arc::clone(&sync);
        let cancel = cancel.clone();
        async move {
            sync.run(IntervalTicks::new(Duration::from_secs(300)), cancel)
                .await
        }
    });

    // The first cycle is still fetching when shutdown is requested, and the
    // next tick is already due by the time it finishes
    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(sync.state(), SyncState::Syncing);
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(source.starts.lock().unwrap().len(), 1);
    assert_eq!(sync.state(), SyncState::Idle);
    // The in-flight cycle still commits
    assert!(authenticate(store.as_ref(), "ns1-alice", "s3cret").is_accepted());
}
