//! Office engine (component C): a bounded-concurrency FIFO queue with a
//! worker pool, a cooperative break state machine, and a reentrancy escape
//! that lets a worker re-enter its own office without deadlocking.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Notify};

use crate::clock::{Clock, DurationOracle};
use crate::config::{DocumentSpec, OfficeSpec};
use crate::error::BureauError;
use crate::events::EventSink;
use crate::journey::Journey;

tokio::task_local! {
    /// `(office id, counter index)` of the worker the current task is
    /// executing as, if any. Set for the duration of a single service
    /// attempt — one delay-then-scan pass — never across the orchestrator's
    /// dependency-resolution loop, which runs on the caller's own context
    /// rather than inside a worker (see `orchestrator::Orchestrator::resolve`).
    static CURRENT_WORKER: Cell<Option<(usize, usize)>>;
}

fn current_worker() -> Option<(usize, usize)> {
    CURRENT_WORKER.try_with(|cell| cell.get()).unwrap_or(None)
}

/// Document produced by a successful service, with its duration now known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceResult {
    /// The customer this document was produced for.
    pub customer_id: String,
    /// The document's name.
    pub document_name: String,
    /// The office that produced it.
    pub issuing_office: String,
    /// The document's declared dependencies (a snapshot, not necessarily
    /// all independently re-verified at read time).
    pub dependencies: Vec<String>,
    /// The combined delay-plus-work span this *single, successful* service
    /// attempt took. A dependency-bearing document resubmitted after a
    /// `MissingDependencies` outcome reports only its final, successful
    /// attempt's own span — matching spec §4.3 step 4c, which times one
    /// `task.work` invocation at a time, not the whole resolution.
    pub service_duration: Duration,
}

/// The outcome of one service attempt at an office: either the document was
/// produced, or prerequisites are missing and the caller (the orchestrator,
/// never the worker itself) must resolve them and resubmit. This is an
/// internal signal, not a `BureauError` — it must never surface to a
/// customer (spec §7).
#[derive(Debug)]
pub(crate) enum ServiceOutcome {
    Issued(IssuanceResult),
    MissingDependencies(Vec<String>),
}

/// Lifecycle state of one office.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeRuntimeState {
    /// Accepting new admissions and starting new services.
    Open,
    /// A break has been requested; no new services start, but in-flight
    /// ones finish and newly-submitted tasks may still queue once the
    /// break-end catches up (see `Office::request`).
    BreakPending,
    /// On break: workers neither pop new entries nor admit blocked callers.
    OnBreak,
    /// Terminal: no further admissions, no further services.
    Shutdown,
}

struct OfficeQueueEntry {
    #[allow(dead_code)] // retained for admission-order debugging/logging
    sequence: u64,
    customer_id: String,
    document: DocumentSpec,
    journey: Arc<Journey>,
    completion: oneshot::Sender<Result<ServiceOutcome, BureauError>>,
    label: String,
}

struct OfficeInner {
    queue: VecDeque<OfficeQueueEntry>,
    state: OfficeRuntimeState,
    active_services: usize,
    next_sequence: u64,
}

/// One processing station: a FIFO queue, `counters` parallel workers, and a
/// break cycle, all guarded by a single mutual-exclusion domain per spec §5.
pub struct Office {
    id: usize,
    spec: OfficeSpec,
    sink: Arc<dyn EventSink>,
    oracle: Arc<dyn DurationOracle>,
    clock: Arc<dyn Clock>,
    inner: Mutex<OfficeInner>,
    notify: Notify,
    worker_handles: Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Office {
    /// Construct an office and spawn its worker pool.
    pub(crate) fn new(
        id: usize,
        spec: OfficeSpec,
        sink: Arc<dyn EventSink>,
        oracle: Arc<dyn DurationOracle>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let counters = spec.counters;
        let office = Arc::new(Self {
            id,
            spec,
            sink,
            oracle,
            clock,
            inner: Mutex::new(OfficeInner {
                queue: VecDeque::new(),
                state: OfficeRuntimeState::Open,
                active_services: 0,
                next_sequence: 0,
            }),
            notify: Notify::new(),
            worker_handles: Mutex::new(Vec::new()),
        });

        let handles = (0..counters)
            .map(|counter_index| {
                let office = Arc::clone(&office);
                tokio::spawn(worker_loop(office, counter_index))
            })
            .collect();
        *office.worker_handles.lock() = handles;

        office
    }

    /// The office's static configuration.
    #[must_use]
    pub fn spec(&self) -> &OfficeSpec {
        &self.spec
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> OfficeRuntimeState {
        self.inner.lock().state
    }

    /// Number of entries currently admitted but not yet started.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Submit one service attempt for `document` on behalf of `customer_id`,
    /// or — if the calling task is already a worker of this office — run it
    /// inline, bypassing the queue and the break-accepting check entirely.
    ///
    /// This settles after exactly one delay-then-scan pass: either the
    /// document was produced, or prerequisites are missing. It never itself
    /// resolves those prerequisites or resubmits — that is the caller's
    /// (the orchestrator's) job, so that this worker's counter is freed the
    /// moment the scan is done rather than held across a cross-office or
    /// recursive resolution.
    pub(crate) async fn request(
        self: &Arc<Self>,
        journey: Arc<Journey>,
        document: DocumentSpec,
        customer_id: String,
    ) -> Result<ServiceOutcome, BureauError> {
        if current_worker().map(|(office_id, _)| office_id) == Some(self.id) {
            return service_attempt(Arc::clone(self), journey, document, customer_id).await;
        }

        let (tx, rx) = oneshot::channel();
        let snapshot = loop {
            let notified = self.notify.notified();
            let mut guard = self.inner.lock();
            match guard.state {
                OfficeRuntimeState::Shutdown => {
                    return Err(BureauError::ShuttingDown(self.spec.name.clone()));
                }
                OfficeRuntimeState::Open => {
                    let sequence = guard.next_sequence;
                    guard.next_sequence += 1;
                    let label = format!("{customer_id} REQUESTING {}", document.name);
                    guard.queue.push_back(OfficeQueueEntry {
                        sequence,
                        customer_id: customer_id.clone(),
                        document: document.clone(),
                        journey,
                        completion: tx,
                        label,
                    });
                    break guard.queue.iter().map(|e| e.label.clone()).collect::<Vec<_>>();
                }
                OfficeRuntimeState::BreakPending | OfficeRuntimeState::OnBreak => {
                    drop(guard);
                    notified.await;
                }
            }
        };

        self.notify.notify_waiters();
        self.sink.request_accepted(&self.spec.name, &customer_id, &document.name);
        self.sink.queue(&self.spec.name, &customer_id, &document.name, &snapshot);

        rx.await.map_err(BureauError::from)?
    }

    /// Request a break: stop admitting new services, let in-flight ones
    /// finish, sleep for `break_duration`, then resume. Concurrent calls
    /// while a break is pending or active coalesce onto the same cycle.
    pub async fn take_break(self: &Arc<Self>) {
        let became_pending = {
            let mut guard = self.inner.lock();
            match guard.state {
                OfficeRuntimeState::Open => {
                    guard.state = OfficeRuntimeState::BreakPending;
                    true
                }
                OfficeRuntimeState::Shutdown => return,
                OfficeRuntimeState::BreakPending | OfficeRuntimeState::OnBreak => false,
            }
        };
        if became_pending {
            self.sink.office(&self.spec.name, "break requested");
            self.notify.notify_waiters();
        }

        // Wait until this caller (or a racing coalesced one) can perform the
        // pending -> on-break transition, or until someone else already has.
        loop {
            let notified = self.notify.notified();
            let mut guard = self.inner.lock();
            match guard.state {
                OfficeRuntimeState::Open | OfficeRuntimeState::Shutdown => return,
                OfficeRuntimeState::BreakPending if guard.active_services == 0 => {
                    guard.state = OfficeRuntimeState::OnBreak;
                    drop(guard);
                    self.notify.notify_waiters();
                    break;
                }
                _ => {
                    drop(guard);
                    notified.await;
                }
            }
        }

        self.sink.office(&self.spec.name, "break started");
        self.clock.delay(self.spec.break_duration).await;

        {
            let mut guard = self.inner.lock();
            if guard.state == OfficeRuntimeState::OnBreak {
                guard.state = OfficeRuntimeState::Open;
            }
        }
        self.notify.notify_waiters();
        self.sink.office(&self.spec.name, "break ended");
    }

    /// Initiate teardown: refuse further submissions, settle not-yet-started
    /// entries with `ShuttingDown`, wake every worker, and wait for them to
    /// exit. Idempotent — a second call is a no-op and never blocks.
    pub async fn shutdown(self: &Arc<Self>) {
        let already_shutdown = {
            let mut guard = self.inner.lock();
            if guard.state == OfficeRuntimeState::Shutdown {
                true
            } else {
                guard.state = OfficeRuntimeState::Shutdown;
                while let Some(entry) = guard.queue.pop_front() {
                    let _ = entry
                        .completion
                        .send(Err(BureauError::ShuttingDown(self.spec.name.clone())));
                }
                false
            }
        };
        self.notify.notify_waiters();
        if already_shutdown {
            return;
        }

        self.sink.office(&self.spec.name, "shutting down");
        let handles = std::mem::take(&mut *self.worker_handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn wait_for_entry(office: &Arc<Office>) -> Option<OfficeQueueEntry> {
    loop {
        let notified = office.notify.notified();
        {
            let mut guard = office.inner.lock();
            if guard.state == OfficeRuntimeState::Shutdown {
                return None;
            }
            if guard.state == OfficeRuntimeState::Open && !guard.queue.is_empty() {
                let entry = guard.queue.pop_front().expect("checked non-empty under lock");
                guard.active_services += 1;
                return Some(entry);
            }
        }
        notified.await;
    }
}

async fn worker_loop(office: Arc<Office>, counter_index: usize) {
    loop {
        let entry = match wait_for_entry(&office).await {
            Some(entry) => entry,
            None => break,
        };

        let result = CURRENT_WORKER
            .scope(
                Cell::new(Some((office.id, counter_index))),
                service_attempt(Arc::clone(&office), entry.journey, entry.document, entry.customer_id),
            )
            .await;

        let _ = entry.completion.send(result);

        // Freed here, before the caller (never this worker) does anything
        // with a `MissingDependencies` outcome — this worker is available
        // for the next queue entry regardless of how long resolving that
        // outcome's prerequisites takes.
        {
            let mut guard = office.inner.lock();
            guard.active_services -= 1;
        }
        office.notify.notify_waiters();
    }
}

/// Run exactly one service attempt: delay, then check for missing
/// prerequisites. Never awaits another office or another document — doing
/// so here, inside a worker's task-local scope, is what used to let a
/// dependency chain that passes through a busy single-counter office
/// deadlock (see DESIGN.md). Resolving `MissingDependencies` and
/// resubmitting is the orchestrator's job (`Orchestrator::resolve`).
async fn service_attempt(
    office: Arc<Office>,
    journey: Arc<Journey>,
    document: DocumentSpec,
    customer_id: String,
) -> Result<ServiceOutcome, BureauError> {
    let (_, counter_index) = current_worker()
        .expect("service_attempt only ever runs inside a worker's task-local scope");

    office
        .sink
        .counter_start(&office.spec.name, counter_index, &customer_id, &document.name);

    let started = tokio::time::Instant::now();
    let delay = office
        .oracle
        .sample(office.spec.min_service..=office.spec.max_service);
    office.clock.delay(delay).await;

    let missing: Vec<String> = document
        .dependencies
        .iter()
        .filter(|dep| !journey.has_document(dep))
        .cloned()
        .collect();

    if missing.is_empty() {
        office
            .sink
            .counter_finish(&office.spec.name, counter_index, &customer_id, &document.name);
        return Ok(ServiceOutcome::Issued(IssuanceResult {
            customer_id,
            document_name: document.name.clone(),
            issuing_office: office.spec.name.clone(),
            dependencies: document.dependencies.clone(),
            service_duration: started.elapsed(),
        }));
    }

    Ok(ServiceOutcome::MissingDependencies(missing))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{MidpointOracle, TokioClock};
    use crate::config::Configuration;
    use crate::events::MemorySink;
    use crate::orchestrator::Orchestrator;

    fn leaf_config() -> Configuration {
        Configuration::new(
            vec![OfficeSpec::new("A", 1, Duration::from_millis(1), Duration::from_millis(2), Duration::ZERO).unwrap()],
            vec![DocumentSpec::new("X", "A", vec![])],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn single_leaf_request_completes() {
        let config = Arc::new(leaf_config());
        let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
        let orchestrator = Orchestrator::new(
            config,
            Arc::clone(&sink),
            Arc::new(MidpointOracle),
            Arc::new(TokioClock),
        );
        let journey = Journey::new("u");
        let result = journey.request_document(&orchestrator, "X").await.unwrap();
        assert_eq!(result.document_name, "X");
        assert_eq!(result.customer_id, "u");
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_non_blocking() {
        let config = Arc::new(leaf_config());
        let sink: Arc<dyn EventSink> = Arc::new(MemorySink::new());
        let orchestrator = Orchestrator::new(
            config,
            sink,
            Arc::new(MidpointOracle),
            Arc::new(TokioClock),
        );
        let office = orchestrator.office("A").unwrap().clone();
        office.shutdown().await;
        office.shutdown().await;
        assert_eq!(office.state(), OfficeRuntimeState::Shutdown);
    }
}
