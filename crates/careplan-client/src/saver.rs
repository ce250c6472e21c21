//! Serialized, coalescing plan saves
//!
//! One worker task per queue saves one snapshot at a time. Snapshots
//! enqueued while a save is in flight collapse into the latest one, which
//! is saved once the current request returns. Saves therefore reach the
//! backend in mutation order and never overlap.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use careplan_core::{GraphDocument, PatientId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::PlanTransport;

#[derive(Debug, Clone)]
struct Pending {
    generation: u64,
    snapshot: Arc<GraphDocument>,
}

/// Progress of the save worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveStatus {
    /// Highest generation the worker has finished with, saved or not
    pub processed: u64,
    /// Saves that succeeded
    pub completed: u64,
    /// Saves that failed
    pub failed: u64,
    /// Message of the most recent failure
    pub last_error: Option<String>,
}

/// Per-controller save queue
pub struct SaveQueue {
    pending_tx: Option<watch::Sender<Option<Pending>>>,
    status_rx: watch::Receiver<SaveStatus>,
    generation: AtomicU64,
    worker: Option<JoinHandle<()>>,
}

impl SaveQueue {
    /// Spawn the worker. Must be called within a Tokio runtime.
    pub fn start(transport: Arc<dyn PlanTransport>, patient_id: PatientId) -> Self {
        let (pending_tx, pending_rx) = watch::channel(None);
        let (status_tx, status_rx) = watch::channel(SaveStatus::default());

        let worker = tokio::spawn(run_worker(transport, patient_id, pending_rx, status_tx));

        Self {
            pending_tx: Some(pending_tx),
            status_rx,
            generation: AtomicU64::new(0),
            worker: Some(worker),
        }
    }

    /// Queue `snapshot` for saving, replacing any snapshot not yet picked up.
    ///
    /// Returns the generation assigned to it, or `None` once closed.
    pub fn enqueue(&self, snapshot: Arc<GraphDocument>) -> Option<u64> {
        let sender = self.pending_tx.as_ref()?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        sender.send_replace(Some(Pending {
            generation,
            snapshot,
        }));
        Some(generation)
    }

    /// Generation of the latest enqueued snapshot
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Current worker progress
    pub fn status(&self) -> SaveStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver notified on every finished save
    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.status_rx.clone()
    }

    /// Wait until every snapshot enqueued so far has been handled
    pub async fn flush(&self) -> SaveStatus {
        let target = self.generation();
        let mut status_rx = self.status_rx.clone();

        let result = status_rx
            .wait_for(|status| status.processed >= target)
            .await
            .map(|status| status.clone());

        match result {
            Ok(status) => status,
            // Worker is gone; report what it last published
            Err(_) => self.status(),
        }
    }

    /// Stop accepting snapshots. A queued or in-flight save still completes.
    pub fn close(&mut self) {
        if self.pending_tx.take().is_some() {
            debug!("Save queue closed");
        }
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.pending_tx.is_none()
    }

    /// Close and wait for the worker to finish its remaining save
    pub async fn drain(mut self) -> SaveStatus {
        self.close();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!(error = %e, "Save worker ended abnormally");
            }
        }
        self.status()
    }
}

impl Drop for SaveQueue {
    // The worker is detached, not aborted
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_worker(
    transport: Arc<dyn PlanTransport>,
    patient_id: PatientId,
    mut pending_rx: watch::Receiver<Option<Pending>>,
    status_tx: watch::Sender<SaveStatus>,
) {
    let mut last_generation = 0;

    // A value published before the sender closed is still observed here
    while pending_rx.changed().await.is_ok() {
        let pending = pending_rx.borrow_and_update().clone();
        let Some(pending) = pending else {
            continue;
        };
        if pending.generation <= last_generation {
            continue;
        }
        last_generation = pending.generation;

        let result = transport.save(patient_id, &pending.snapshot).await;

        status_tx.send_modify(|status| {
            status.processed = pending.generation;
            match &result {
                Ok(_) => status.completed += 1,
                Err(e) => {
                    status.failed += 1;
                    status.last_error = Some(e.to_string());
                }
            }
        });

        match result {
            Ok(plan) => debug!(
                patient_id = %patient_id,
                generation = pending.generation,
                plan_id = %plan.id,
                "Plan saved"
            ),
            Err(e) => warn!(
                patient_id = %patient_id,
                generation = pending.generation,
                error = %e,
                "Plan save failed; local graph kept"
            ),
        }
    }

    info!(patient_id = %patient_id, "Save worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use careplan_core::{GraphNode, PlanId, Position, TreatmentPlan};
    use std::sync::Mutex;
    use tokio::sync::Semaphore;

    /// Records every saved snapshot; each save waits for a permit
    struct GatedTransport {
        gate: Semaphore,
        saved: Mutex<Vec<usize>>,
        in_flight: AtomicU64,
        max_in_flight: AtomicU64,
        fail: bool,
    }

    impl GatedTransport {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                saved: Mutex::new(Vec::new()),
                in_flight: AtomicU64::new(0),
                max_in_flight: AtomicU64::new(0),
                fail,
            })
        }
    }

    #[async_trait]
    impl PlanTransport for GatedTransport {
        async fn fetch(&self, _: PatientId) -> Result<Option<TreatmentPlan>, TransportError> {
            Ok(None)
        }

        async fn save(
            &self,
            patient_id: PatientId,
            document: &GraphDocument,
        ) -> Result<TreatmentPlan, TransportError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let permit = self.gate.acquire().await.unwrap();
            permit.forget();

            self.saved.lock().unwrap().push(document.nodes.len());
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(TransportError::Status {
                    status: 503,
                    message: "storage down".to_string(),
                });
            }
            let now = chrono::Utc::now();
            Ok(TreatmentPlan::new(PlanId(1), patient_id, document.clone(), now, now))
        }

        async fn create(&self, _: PatientId) -> Result<TreatmentPlan, TransportError> {
            unreachable!("not used by the save queue")
        }
    }

    fn doc_with(n: usize) -> Arc<GraphDocument> {
        let nodes = (1..=n)
            .map(|i| GraphNode::new(i.to_string(), format!("Node {}", i), "#ffcce6", Position::default()))
            .collect();
        Arc::new(GraphDocument { nodes, edges: vec![] })
    }

    #[tokio::test]
    async fn test_saves_are_serialized_and_coalesced() {
        let transport = GatedTransport::new(false);
        let queue = SaveQueue::start(transport.clone(), PatientId(1));

        queue.enqueue(doc_with(1));
        // let the worker pick up the first snapshot and block on the gate
        while transport.in_flight.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        queue.enqueue(doc_with(2));
        queue.enqueue(doc_with(3));
        queue.enqueue(doc_with(4));

        transport.gate.add_permits(10);
        let status = queue.flush().await;

        assert_eq!(*transport.saved.lock().unwrap(), vec![1, 4]);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(status.processed, 4);
        assert_eq!(status.completed, 2);
        assert_eq!(status.failed, 0);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let transport = GatedTransport::new(true);
        transport.gate.add_permits(10);
        let queue = SaveQueue::start(transport.clone(), PatientId(2));

        queue.enqueue(doc_with(1));
        let status = queue.flush().await;
        assert_eq!(status.failed, 1);
        assert!(status.last_error.as_deref().unwrap().contains("storage down"));

        queue.enqueue(doc_with(2));
        let status = queue.flush().await;
        assert_eq!(status.failed, 2);
        assert_eq!(*transport.saved.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_flush_on_idle_queue_returns_immediately() {
        let transport = GatedTransport::new(false);
        let queue = SaveQueue::start(transport, PatientId(3));

        assert_eq!(queue.flush().await, SaveStatus::default());
    }

    #[tokio::test]
    async fn test_close_finishes_queued_save_and_rejects_new_ones() {
        let transport = GatedTransport::new(false);
        let mut queue = SaveQueue::start(transport.clone(), PatientId(4));

        queue.enqueue(doc_with(3));
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.enqueue(doc_with(5)), None);

        transport.gate.add_permits(10);
        let status = queue.drain().await;

        assert_eq!(status.completed, 1);
        assert_eq!(*transport.saved.lock().unwrap(), vec![3]);
    }
}
