// Single-flight generation over the artifact store.
//
// `Orchestrator::resolve` turns a validated request into a servable artifact:
//
//   stat ──Fresh──────────────────────────────────────────────▶ Hit
//     │
//     └─Missing/Stale─▶ ticket table (one lock, held only for check-or-insert)
//                          │
//               ┌──────────┴───────────┐
//          ticket exists          no ticket: insert, become leader
//               │                      │
//        wait on its Condvar     re-stat ─Fresh─▶ publish Ok (Hit)
//        (bounded: Timeout)            │
//               │                generate ─▶ write_atomic
//               ▼                      │
//            Joined            remove ticket, publish outcome ▶ Generated
//
// Invariants:
// - At most one generator call is in flight per key. The ticket table maps a
//   key to the `GenerationTicket` of its current leader; a second request for
//   the same key finds the ticket and waits instead of generating.
// - The leader removes its ticket before publishing, so anyone who misses the
//   publication either stats the fresh artifact or (after a failure) becomes
//   the next leader. Waiters that already hold the ticket read the published
//   outcome from it.
// - A failed generation never touches the prior artifact. With
//   `serve_stale_on_failure` the caller gets that prior copy instead of the
//   error.
// - `TicketRelease` is a drop guard: if anything between insertion and
//   publication unwinds, its `Drop` still removes the ticket and fails the
//   waiters. Generator panics are caught and reported as `Generation` errors.
//
// Requests for different keys only share the brief table lock.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant, SystemTime};

use rustc_hash::FxHashMap;
use serde::Serialize;

use infinite_etudes_music::{EtudeParams, Generator};

use crate::error::EtudeError;
use crate::key::ArtifactKey;
use crate::staleness::{Freshness, StalenessPolicy};
use crate::store::{ArtifactReader, ArtifactStore, lock_with_recovery};

/// How a request was satisfied. In every case the artifact for the request's
/// key can be opened afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// A fresh artifact was already stored.
    Hit,
    /// This request led the generation.
    Generated,
    /// This request waited on another request's generation.
    Joined,
    /// Generation failed and the prior (stale) artifact is served instead.
    StaleFallback,
}

#[derive(Clone, Copy, Debug)]
pub struct OrchestratorConfig {
    pub max_age: Duration,
    pub wait_timeout: Duration,
    pub serve_stale_on_failure: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(3600),
            wait_timeout: Duration::from_secs(30),
            serve_stale_on_failure: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OrchestratorStats {
    pub hits: u64,
    pub generated: u64,
    pub joined: u64,
    pub failures: u64,
    pub stale_served: u64,
    pub timeouts: u64,
    pub in_flight: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    generated: AtomicU64,
    joined: AtomicU64,
    failures: AtomicU64,
    stale_served: AtomicU64,
    timeouts: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Per-key coordination record for one in-flight generation.
struct GenerationTicket {
    outcome: Mutex<Option<Result<(), EtudeError>>>,
    ready: Condvar,
}

impl GenerationTicket {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn publish(&self, outcome: Result<(), EtudeError>) {
        *lock_with_recovery(&self.outcome, "ticket") = Some(outcome);
        self.ready.notify_all();
    }

    /// Block until an outcome is published or `timeout` elapses.
    fn wait(&self, timeout: Duration) -> Option<Result<(), EtudeError>> {
        let guard = lock_with_recovery(&self.outcome, "ticket");
        let (guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }
}

/// What the leader's work produced, before it is reported to the caller.
enum Produced {
    AlreadyFresh,
    Generated,
}

pub struct Orchestrator {
    store: Arc<dyn ArtifactStore>,
    generator: Arc<dyn Generator>,
    policy: StalenessPolicy,
    config: OrchestratorConfig,
    tickets: Mutex<FxHashMap<ArtifactKey, Arc<GenerationTicket>>>,
    counters: Counters,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        generator: Arc<dyn Generator>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            generator,
            policy: StalenessPolicy::new(config.max_age),
            config,
            tickets: Mutex::new(FxHashMap::default()),
            counters: Counters::default(),
        }
    }

    /// Make sure a servable artifact exists for `params`, generating it at
    /// most once across concurrent callers.
    pub fn resolve(&self, params: &EtudeParams) -> Result<Resolution, EtudeError> {
        let key = ArtifactKey::derive(params);

        match self.freshness(&key) {
            Ok(Freshness::Fresh) => {
                bump(&self.counters.hits);
                tracing::debug!(key = %key, "cache hit");
                return Ok(Resolution::Hit);
            }
            Ok(_) => {}
            Err(e) => {
                bump(&self.counters.failures);
                tracing::error!(key = %key, error = %e, "artifact stat failed");
                return Err(e);
            }
        }

        let (ticket, leader) = {
            let mut tickets = lock_with_recovery(&self.tickets, "tickets");
            match tickets.get(&key) {
                Some(ticket) => (Arc::clone(ticket), false),
                None => {
                    let ticket = Arc::new(GenerationTicket::new());
                    tickets.insert(key.clone(), Arc::clone(&ticket));
                    (ticket, true)
                }
            }
        };

        if leader {
            self.lead(&key, params, &ticket)
        } else {
            self.join(&key, &ticket)
        }
    }

    /// Open the stored artifact for `key`.
    pub fn open(&self, key: &ArtifactKey) -> Result<ArtifactReader, EtudeError> {
        self.store.open(key).map_err(EtudeError::from)
    }

    pub fn in_flight(&self) -> usize {
        lock_with_recovery(&self.tickets, "tickets").len()
    }

    pub fn stats(&self) -> OrchestratorStats {
        let c = &self.counters;
        OrchestratorStats {
            hits: c.hits.load(Ordering::Relaxed),
            generated: c.generated.load(Ordering::Relaxed),
            joined: c.joined.load(Ordering::Relaxed),
            failures: c.failures.load(Ordering::Relaxed),
            stale_served: c.stale_served.load(Ordering::Relaxed),
            timeouts: c.timeouts.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }

    fn freshness(&self, key: &ArtifactKey) -> Result<Freshness, EtudeError> {
        let meta = self.store.stat(key)?;
        Ok(self.policy.classify(meta.as_ref(), SystemTime::now()))
    }

    fn lead(
        &self,
        key: &ArtifactKey,
        params: &EtudeParams,
        ticket: &Arc<GenerationTicket>,
    ) -> Result<Resolution, EtudeError> {
        let release = TicketRelease {
            orchestrator: self,
            key,
            ticket,
            armed: true,
        };
        let produced = self.produce(key, params);
        let published = release.finish(produced.as_ref().map(|_| ()).map_err(EtudeError::clone));

        match (produced, published) {
            (Ok(Produced::AlreadyFresh), Ok(())) => {
                bump(&self.counters.hits);
                tracing::debug!(key = %key, "published while acquiring ticket");
                Ok(Resolution::Hit)
            }
            (Ok(Produced::Generated), Ok(())) => {
                bump(&self.counters.generated);
                Ok(Resolution::Generated)
            }
            (_, Err(e)) | (Err(e), _) => {
                bump(&self.counters.failures);
                tracing::error!(key = %key, error = %e, "etude generation failed");
                self.recover(key, e)
            }
        }
    }

    /// The leader's work between ticket insertion and publication.
    fn produce(&self, key: &ArtifactKey, params: &EtudeParams) -> Result<Produced, EtudeError> {
        if self.freshness(key)? == Freshness::Fresh {
            return Ok(Produced::AlreadyFresh);
        }

        let started = Instant::now();
        let profile = params.instrument().profile();
        let bytes = panic::catch_unwind(AssertUnwindSafe(|| {
            self.generator.generate(params, profile)
        }))
        .map_err(|_| EtudeError::Generation(format!("generator panicked for {key}")))??;
        self.store.write_atomic(key, &bytes)?;

        tracing::info!(
            key = %key,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "generated etude"
        );
        Ok(Produced::Generated)
    }

    fn join(&self, key: &ArtifactKey, ticket: &GenerationTicket) -> Result<Resolution, EtudeError> {
        tracing::debug!(key = %key, "waiting on in-flight generation");
        match ticket.wait(self.config.wait_timeout) {
            Some(Ok(())) => {
                bump(&self.counters.joined);
                Ok(Resolution::Joined)
            }
            Some(Err(e)) => self.recover(key, e),
            None => {
                bump(&self.counters.timeouts);
                tracing::warn!(
                    key = %key,
                    waited_ms = self.config.wait_timeout.as_millis() as u64,
                    "gave up waiting on generation"
                );
                Err(EtudeError::Timeout {
                    key: key.clone(),
                    waited: self.config.wait_timeout,
                })
            }
        }
    }

    /// Serve the prior artifact after a failure, when allowed and present.
    fn recover(&self, key: &ArtifactKey, err: EtudeError) -> Result<Resolution, EtudeError> {
        if self.config.serve_stale_on_failure && matches!(self.store.stat(key), Ok(Some(_))) {
            bump(&self.counters.stale_served);
            tracing::warn!(key = %key, error = %err, "serving stale artifact after failure");
            return Ok(Resolution::StaleFallback);
        }
        Err(err)
    }

    /// Remove `ticket` from the table, then publish `outcome` to its waiters.
    /// Returns the outcome actually published.
    fn release(
        &self,
        key: &ArtifactKey,
        ticket: &Arc<GenerationTicket>,
        outcome: Result<(), EtudeError>,
    ) -> Result<(), EtudeError> {
        let removed = {
            let mut tickets = lock_with_recovery(&self.tickets, "tickets");
            match tickets.get(key) {
                Some(current) if Arc::ptr_eq(current, ticket) => {
                    tickets.remove(key);
                    true
                }
                _ => false,
            }
        };

        let outcome = if removed {
            outcome
        } else {
            tracing::error!(key = %key, "generation ticket missing from table at release");
            Err(EtudeError::InvariantViolation(format!(
                "ticket for {key} missing at release"
            )))
        };
        ticket.publish(outcome.clone());
        debug_assert!(removed, "ticket for {key} missing at release");
        outcome
    }
}

/// Releases the leader's ticket exactly once, on `finish` or on unwind.
struct TicketRelease<'a> {
    orchestrator: &'a Orchestrator,
    key: &'a ArtifactKey,
    ticket: &'a Arc<GenerationTicket>,
    armed: bool,
}

impl TicketRelease<'_> {
    fn finish(mut self, outcome: Result<(), EtudeError>) -> Result<(), EtudeError> {
        self.armed = false;
        self.orchestrator.release(self.key, self.ticket, outcome)
    }
}

impl Drop for TicketRelease<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.orchestrator.release(
                self.key,
                self.ticket,
                Err(EtudeError::Generation(format!(
                    "generation for {} aborted",
                    self.key
                ))),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{ArtifactMetadata, MemoryStore};
    use infinite_etudes_music::{GenerateError, InstrumentProfile};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Barrier;
    use std::thread;

    fn params(tempo: u16) -> EtudeParams {
        let tempo = tempo.to_string();
        let segments = [
            "d",
            "harmonicminor",
            "none",
            "none",
            "none",
            "cello",
            "downbeat",
            tempo.as_str(),
            "2",
            "0",
        ];
        EtudeParams::from_segments(&segments).unwrap()
    }

    #[derive(Clone, Copy, PartialEq)]
    enum Behavior {
        Succeed,
        Fail,
        Panic,
        PanicOnce,
    }

    /// Test generator. Counts calls, optionally blocks calls for one tempo
    /// until `open_gate`, and produces `etude <tempo> #<call>`.
    struct TestGenerator {
        calls: AtomicUsize,
        behavior: Behavior,
        gated_tempo: Option<u16>,
        started: AtomicBool,
        gate: Mutex<bool>,
        gate_cv: Condvar,
    }

    impl TestGenerator {
        fn new(behavior: Behavior) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                behavior,
                gated_tempo: None,
                started: AtomicBool::new(false),
                gate: Mutex::new(false),
                gate_cv: Condvar::new(),
            }
        }

        fn gated(behavior: Behavior, tempo: u16) -> Self {
            Self {
                gated_tempo: Some(tempo),
                ..Self::new(behavior)
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn wait_started(&self) {
            while !self.started.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(1));
            }
        }

        fn open_gate(&self) {
            *self.gate.lock().unwrap() = true;
            self.gate_cv.notify_all();
        }
    }

    impl Generator for TestGenerator {
        fn generate(
            &self,
            params: &EtudeParams,
            _profile: &InstrumentProfile,
        ) -> Result<Vec<u8>, GenerateError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gated_tempo == Some(params.tempo()) {
                self.started.store(true, Ordering::SeqCst);
                let open = self.gate.lock().unwrap();
                drop(self.gate_cv.wait_while(open, |open| !*open).unwrap());
            }
            match self.behavior {
                Behavior::Succeed => {}
                Behavior::Fail => {
                    return Err(GenerateError::Midi(std::io::Error::other("encoder broke")));
                }
                Behavior::Panic => panic!("generator exploded"),
                Behavior::PanicOnce if call == 0 => panic!("generator exploded once"),
                Behavior::PanicOnce => {}
            }
            Ok(format!("etude {} #{call}", params.tempo()).into_bytes())
        }
    }

    fn setup(
        generator: TestGenerator,
        config: OrchestratorConfig,
    ) -> (Arc<Orchestrator>, Arc<MemoryStore>, Arc<TestGenerator>) {
        let store = Arc::new(MemoryStore::new());
        let generator = Arc::new(generator);
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
            Arc::clone(&generator) as Arc<dyn Generator>,
            config,
        ));
        (orchestrator, store, generator)
    }

    fn read(orchestrator: &Orchestrator, p: &EtudeParams) -> Vec<u8> {
        orchestrator
            .open(&ArtifactKey::derive(p))
            .unwrap()
            .into_bytes()
            .unwrap()
    }

    #[test]
    fn miss_generates_then_hits() {
        let (orch, _store, generator) =
            setup(TestGenerator::new(Behavior::Succeed), OrchestratorConfig::default());
        let p = params(120);

        assert_eq!(orch.resolve(&p).unwrap(), Resolution::Generated);
        assert_eq!(orch.resolve(&p).unwrap(), Resolution::Hit);
        assert_eq!(generator.calls(), 1);
        assert_eq!(read(&orch, &p), b"etude 120 #0");

        let stats = orch.stats();
        assert_eq!(stats.generated, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[test]
    fn fresh_artifact_never_calls_generator() {
        let (orch, store, generator) =
            setup(TestGenerator::new(Behavior::Succeed), OrchestratorConfig::default());
        let p = params(90);
        store.insert_with_mtime(ArtifactKey::derive(&p), b"cached".to_vec(), SystemTime::now());

        for _ in 0..5 {
            assert_eq!(orch.resolve(&p).unwrap(), Resolution::Hit);
        }
        assert_eq!(generator.calls(), 0);
        assert_eq!(read(&orch, &p), b"cached");
    }

    #[test]
    fn artifact_at_exact_max_age_is_regenerated() {
        let config = OrchestratorConfig {
            max_age: Duration::from_secs(600),
            ..OrchestratorConfig::default()
        };
        let (orch, store, generator) = setup(TestGenerator::new(Behavior::Succeed), config);
        let p = params(150);
        store.insert_with_mtime(
            ArtifactKey::derive(&p),
            b"old".to_vec(),
            SystemTime::now() - Duration::from_secs(600),
        );

        assert_eq!(orch.resolve(&p).unwrap(), Resolution::Generated);
        assert_eq!(generator.calls(), 1);
        assert_eq!(read(&orch, &p), b"etude 150 #0");
    }

    #[test]
    fn concurrent_misses_generate_once() {
        const CALLERS: usize = 16;
        let (orch, _store, generator) = setup(
            TestGenerator::gated(Behavior::Succeed, 200),
            OrchestratorConfig::default(),
        );
        let p = params(200);
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let orch = Arc::clone(&orch);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    orch.resolve(&p)
                })
            })
            .collect();

        generator.wait_started();
        assert_eq!(orch.in_flight(), 1);
        thread::sleep(Duration::from_millis(50));
        generator.open_gate();

        let results: Vec<Resolution> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(generator.calls(), 1);
        assert_eq!(
            results.iter().filter(|r| **r == Resolution::Generated).count(),
            1
        );
        assert!(
            results
                .iter()
                .all(|r| matches!(r, Resolution::Generated | Resolution::Joined | Resolution::Hit))
        );
        assert_eq!(orch.in_flight(), 0);
        assert_eq!(read(&orch, &p), b"etude 200 #0");
    }

    #[test]
    fn other_keys_proceed_while_one_is_generating() {
        let (orch, _store, generator) = setup(
            TestGenerator::gated(Behavior::Succeed, 100),
            OrchestratorConfig::default(),
        );
        let slow = {
            let orch = Arc::clone(&orch);
            thread::spawn(move || orch.resolve(&params(100)))
        };
        generator.wait_started();

        assert_eq!(orch.resolve(&params(101)).unwrap(), Resolution::Generated);
        assert_eq!(orch.in_flight(), 1);

        generator.open_gate();
        assert_eq!(slow.join().unwrap().unwrap(), Resolution::Generated);
        assert_eq!(generator.calls(), 2);
    }

    #[test]
    fn failure_reaches_every_waiter_and_stores_nothing() {
        const CALLERS: usize = 8;
        let config = OrchestratorConfig {
            serve_stale_on_failure: false,
            ..OrchestratorConfig::default()
        };
        let (orch, store, generator) = setup(TestGenerator::gated(Behavior::Fail, 120), config);
        let p = params(120);
        let barrier = Arc::new(Barrier::new(CALLERS));

        let handles: Vec<_> = (0..CALLERS)
            .map(|_| {
                let orch = Arc::clone(&orch);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    orch.resolve(&p)
                })
            })
            .collect();
        generator.wait_started();
        thread::sleep(Duration::from_millis(50));
        generator.open_gate();

        // Late arrivals may lead a retry of their own; every outcome is still
        // a generation error.
        for handle in handles {
            let err = handle.join().unwrap().unwrap_err();
            assert!(matches!(err, EtudeError::Generation(_)), "{err:?}");
        }
        assert!(generator.calls() >= 1);
        assert!(store.is_empty());
        assert_eq!(orch.in_flight(), 0);
        assert!(orch.stats().failures >= 1);
    }

    #[test]
    fn failure_serves_stale_copy_when_enabled() {
        let (orch, store, _generator) =
            setup(TestGenerator::new(Behavior::Fail), OrchestratorConfig::default());
        let p = params(110);
        let written = SystemTime::now() - Duration::from_secs(7200);
        store.insert_with_mtime(ArtifactKey::derive(&p), b"yesterday".to_vec(), written);

        assert_eq!(orch.resolve(&p).unwrap(), Resolution::StaleFallback);
        assert_eq!(read(&orch, &p), b"yesterday");
        assert_eq!(
            store.stat(&ArtifactKey::derive(&p)).unwrap(),
            Some(ArtifactMetadata {
                modified: written,
                len: 9
            })
        );
        assert_eq!(orch.stats().stale_served, 1);
    }

    #[test]
    fn failure_without_stale_fallback_is_an_error() {
        let config = OrchestratorConfig {
            serve_stale_on_failure: false,
            ..OrchestratorConfig::default()
        };
        let (orch, store, _generator) = setup(TestGenerator::new(Behavior::Fail), config);
        let p = params(110);
        store.insert_with_mtime(
            ArtifactKey::derive(&p),
            b"yesterday".to_vec(),
            SystemTime::now() - Duration::from_secs(7200),
        );

        assert!(matches!(orch.resolve(&p), Err(EtudeError::Generation(_))));
        assert_eq!(read(&orch, &p), b"yesterday");
    }

    #[test]
    fn missing_artifact_has_nothing_to_fall_back_to() {
        let (orch, _store, _generator) =
            setup(TestGenerator::new(Behavior::Fail), OrchestratorConfig::default());
        assert!(matches!(orch.resolve(&params(70)), Err(EtudeError::Generation(_))));
    }

    #[test]
    fn generator_panic_releases_waiters() {
        let (orch, _store, generator) = setup(
            TestGenerator::gated(Behavior::Panic, 130),
            OrchestratorConfig::default(),
        );
        let p = params(130);
        let leader = {
            let orch = Arc::clone(&orch);
            thread::spawn(move || orch.resolve(&p))
        };
        generator.wait_started();
        let waiter = {
            let orch = Arc::clone(&orch);
            thread::spawn(move || orch.resolve(&p))
        };
        thread::sleep(Duration::from_millis(50));
        generator.open_gate();

        assert!(matches!(leader.join().unwrap(), Err(EtudeError::Generation(_))));
        assert!(matches!(waiter.join().unwrap(), Err(EtudeError::Generation(_))));
        assert_eq!(orch.in_flight(), 0);
    }

    #[test]
    fn next_request_after_panic_retries() {
        let (orch, _store, generator) =
            setup(TestGenerator::new(Behavior::PanicOnce), OrchestratorConfig::default());
        let p = params(140);
        assert!(orch.resolve(&p).is_err());
        assert_eq!(orch.resolve(&p).unwrap(), Resolution::Generated);
        assert_eq!(generator.calls(), 2);
        assert_eq!(read(&orch, &p), b"etude 140 #1");
    }

    /// Store whose writes panic, to exercise the leader's drop guard.
    struct PanickingStore {
        inner: MemoryStore,
        entered: AtomicBool,
        gate: Mutex<bool>,
        gate_cv: Condvar,
    }

    impl ArtifactStore for PanickingStore {
        fn stat(&self, key: &ArtifactKey) -> Result<Option<ArtifactMetadata>, StoreError> {
            self.inner.stat(key)
        }

        fn write_atomic(&self, _key: &ArtifactKey, _bytes: &[u8]) -> Result<(), StoreError> {
            self.entered.store(true, Ordering::SeqCst);
            let open = self.gate.lock().unwrap();
            drop(self.gate_cv.wait_while(open, |open| !*open).unwrap());
            panic!("disk on fire");
        }

        fn open(&self, key: &ArtifactKey) -> Result<ArtifactReader, StoreError> {
            self.inner.open(key)
        }
    }

    #[test]
    fn unwinding_leader_still_fails_waiters() {
        let store = Arc::new(PanickingStore {
            inner: MemoryStore::new(),
            entered: AtomicBool::new(false),
            gate: Mutex::new(false),
            gate_cv: Condvar::new(),
        });
        let orch = Arc::new(Orchestrator::new(
            Arc::clone(&store) as Arc<dyn ArtifactStore>,
            Arc::new(TestGenerator::new(Behavior::Succeed)),
            OrchestratorConfig::default(),
        ));
        let p = params(160);

        let leader = {
            let orch = Arc::clone(&orch);
            thread::spawn(move || orch.resolve(&p))
        };
        while !store.entered.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1));
        }
        let waiter = {
            let orch = Arc::clone(&orch);
            thread::spawn(move || orch.resolve(&p))
        };
        thread::sleep(Duration::from_millis(50));
        *store.gate.lock().unwrap() = true;
        store.gate_cv.notify_all();

        assert!(leader.join().is_err());
        assert!(matches!(waiter.join().unwrap(), Err(EtudeError::Generation(_))));
        assert_eq!(orch.in_flight(), 0);
    }

    #[test]
    fn waiter_times_out_without_disturbing_the_leader() {
        let config = OrchestratorConfig {
            wait_timeout: Duration::from_millis(30),
            ..OrchestratorConfig::default()
        };
        let (orch, _store, generator) = setup(TestGenerator::gated(Behavior::Succeed, 180), config);
        let p = params(180);
        let leader = {
            let orch = Arc::clone(&orch);
            thread::spawn(move || orch.resolve(&p))
        };
        generator.wait_started();

        let err = orch.resolve(&p).unwrap_err();
        assert_eq!(
            err,
            EtudeError::Timeout {
                key: ArtifactKey::derive(&p),
                waited: Duration::from_millis(30),
            }
        );
        assert_eq!(orch.stats().timeouts, 1);

        generator.open_gate();
        assert_eq!(leader.join().unwrap().unwrap(), Resolution::Generated);
        assert_eq!(orch.resolve(&p).unwrap(), Resolution::Hit);
        assert_eq!(generator.calls(), 1);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "missing at release")]
    fn releasing_an_unknown_ticket_is_an_invariant_violation() {
        let (orch, _store, _generator) =
            setup(TestGenerator::new(Behavior::Succeed), OrchestratorConfig::default());
        let key = ArtifactKey::derive(&params(100));
        let ticket = Arc::new(GenerationTicket::new());
        let _ = orch.release(&key, &ticket, Ok(()));
    }

    #[test]
    fn ticket_outcome_is_visible_to_late_waiters() {
        let ticket = GenerationTicket::new();
        ticket.publish(Err(EtudeError::Storage("full".into())));
        assert_eq!(
            ticket.wait(Duration::from_millis(1)),
            Some(Err(EtudeError::Storage("full".into())))
        );
    }
}
