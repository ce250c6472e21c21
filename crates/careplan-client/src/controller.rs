//! Client graph controller
//!
//! Owns the live graph of one open plan view. Edits are applied locally
//! first and persisted through the [`SaveQueue`]; a failed save never
//! rolls the local graph back.

use std::fmt;
use std::sync::Arc;

use careplan_core::{GraphDocument, Identity, PatientId, PlanId, TreatmentPlan};
use tracing::{debug, info, warn};

use crate::commands::Command;
use crate::error::{ControllerError, TransportError};
use crate::saver::{SaveQueue, SaveStatus};
use crate::transport::PlanTransport;

/// Lifecycle of an open plan view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanView {
    /// Nothing requested yet, or the view was closed
    Unloaded,
    /// Fetch in flight; edits are queued
    Loading,
    /// Graph present and editable
    Loaded,
    /// Patient has no plan yet
    NoPlan,
    /// Fetch failed
    LoadFailed(String),
}

impl fmt::Display for PlanView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanView::Unloaded => write!(f, "unloaded"),
            PlanView::Loading => write!(f, "loading"),
            PlanView::Loaded => write!(f, "loaded"),
            PlanView::NoPlan => write!(f, "no plan"),
            PlanView::LoadFailed(reason) => write!(f, "load failed: {}", reason),
        }
    }
}

/// Controller for one patient's plan view
pub struct GraphController {
    identity: Identity,
    patient_id: PatientId,
    transport: Arc<dyn PlanTransport>,
    view: PlanView,
    snapshot: Arc<GraphDocument>,
    plan_id: Option<PlanId>,
    queued: Vec<Command>,
    saver: SaveQueue,
}

impl GraphController {
    /// Create a controller for `patient_id` acting as `identity`.
    ///
    /// Spawns the save worker, so it must be called within a Tokio runtime.
    pub fn new(identity: Identity, patient_id: PatientId, transport: Arc<dyn PlanTransport>) -> Self {
        let saver = SaveQueue::start(transport.clone(), patient_id);

        Self {
            identity,
            patient_id,
            transport,
            view: PlanView::Unloaded,
            snapshot: Arc::new(GraphDocument::empty()),
            plan_id: None,
            queued: Vec::new(),
            saver,
        }
    }

    /// Current view state
    pub fn view(&self) -> &PlanView {
        &self.view
    }

    /// Current graph snapshot
    pub fn snapshot(&self) -> Arc<GraphDocument> {
        self.snapshot.clone()
    }

    /// Patient this view belongs to
    pub fn patient_id(&self) -> PatientId {
        self.patient_id
    }

    /// Storage id of the loaded plan
    pub fn plan_id(&self) -> Option<PlanId> {
        self.plan_id
    }

    /// True when the acting role may only view the plan
    pub fn is_read_only(&self) -> bool {
        !self.identity.can_edit_plans()
    }

    /// Number of edits waiting for the load to finish
    pub fn queued_commands(&self) -> usize {
        self.queued.len()
    }

    /// Progress of background saves
    pub fn save_status(&self) -> SaveStatus {
        self.saver.status()
    }

    /// Transport used for fetches and saves
    pub fn transport(&self) -> Arc<dyn PlanTransport> {
        self.transport.clone()
    }

    /// Fetch the plan and settle the view.
    ///
    /// Holds `&mut self` until the fetch returns, so nothing can be
    /// dispatched meanwhile. A view that must accept edits while the plan
    /// is in flight should call [`start_load`](Self::start_load), fetch
    /// through [`transport`](Self::transport) and hand the result to
    /// [`finish_load`](Self::finish_load); edits dispatched in between are
    /// queued.
    pub async fn load(&mut self) -> PlanView {
        self.start_load();
        let result = self.transport.fetch(self.patient_id).await;
        self.finish_load(result).clone()
    }

    /// Enter `Loading`; edits dispatched from now on are queued
    pub fn start_load(&mut self) {
        debug!(patient_id = %self.patient_id, "Loading plan");
        self.view = PlanView::Loading;
    }

    /// Settle the view with the result of a fetch started by [`start_load`](Self::start_load).
    ///
    /// Queued edits are replayed onto a loaded plan and discarded otherwise.
    pub fn finish_load(
        &mut self,
        result: Result<Option<TreatmentPlan>, TransportError>,
    ) -> &PlanView {
        match result {
            Ok(Some(plan)) => {
                info!(patient_id = %self.patient_id, plan_id = %plan.id, "Plan loaded");
                self.plan_id = Some(plan.id);
                self.snapshot = Arc::new(plan.into_document());
                self.view = PlanView::Loaded;
                self.replay_queued();
            }
            Ok(None) => {
                info!(patient_id = %self.patient_id, "Patient has no plan yet");
                self.discard_queued();
                self.snapshot = Arc::new(GraphDocument::empty());
                self.view = PlanView::NoPlan;
            }
            Err(e) => {
                warn!(patient_id = %self.patient_id, error = %e, "Failed to load plan");
                self.discard_queued();
                self.view = PlanView::LoadFailed(e.to_string());
            }
        }
        &self.view
    }

    fn replay_queued(&mut self) {
        let queued = std::mem::take(&mut self.queued);
        if queued.is_empty() {
            return;
        }

        let before = self.snapshot.clone();
        let after = queued
            .iter()
            .fold((*before).clone(), |doc, command| command.apply(&doc));

        debug!(count = queued.len(), "Replayed edits queued during load");
        if after != *before {
            self.commit(after);
        }
    }

    fn discard_queued(&mut self) {
        if !self.queued.is_empty() {
            debug!(count = self.queued.len(), "Discarding edits queued during load");
            self.queued.clear();
        }
    }

    /// "Add a Plan": create an empty plan for a patient without one
    pub async fn create_plan(&mut self) -> Result<(), ControllerError> {
        self.ensure_editor()?;
        match self.view {
            PlanView::NoPlan => {}
            PlanView::Loaded => return Ok(()),
            ref other => return Err(ControllerError::NotLoaded(other.to_string())),
        }

        let plan = self.transport.create(self.patient_id).await?;
        info!(patient_id = %self.patient_id, plan_id = %plan.id, "Plan created");

        self.plan_id = Some(plan.id);
        self.snapshot = Arc::new(plan.into_document());
        self.view = PlanView::Loaded;
        Ok(())
    }

    /// Apply an edit.
    ///
    /// Returns whether the graph changed. A change is saved in the
    /// background; edits made while loading are queued and `false` is
    /// returned.
    pub fn dispatch(&mut self, command: Command) -> Result<bool, ControllerError> {
        self.ensure_editor()?;

        match self.view {
            PlanView::Loaded => {}
            PlanView::Loading => {
                debug!(command = command.name(), "Queuing edit until the plan is loaded");
                self.queued.push(command);
                return Ok(false);
            }
            ref other => return Err(ControllerError::NotLoaded(other.to_string())),
        }

        let next = command.apply(&self.snapshot);
        if next == *self.snapshot {
            debug!(command = command.name(), "Edit left the graph unchanged");
            return Ok(false);
        }

        debug!(command = command.name(), "Applied edit");
        self.commit(next);
        Ok(true)
    }

    fn commit(&mut self, document: GraphDocument) {
        self.snapshot = Arc::new(document);
        if self.saver.enqueue(self.snapshot.clone()).is_none() {
            warn!(patient_id = %self.patient_id, "Save queue closed; edit kept locally only");
        }
    }

    fn ensure_editor(&self) -> Result<(), ControllerError> {
        if self.is_read_only() {
            return Err(ControllerError::ReadOnly(self.identity.role.to_string()));
        }
        Ok(())
    }

    /// Wait until every save enqueued so far has been attempted
    pub async fn flush(&self) -> SaveStatus {
        self.saver.flush().await
    }

    /// Close the view. A save already queued or in flight still completes.
    pub fn shutdown(&mut self) {
        self.saver.close();
        self.queued.clear();
        self.view = PlanView::Unloaded;
        debug!(patient_id = %self.patient_id, "Plan view closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalPlanTransport;
    use async_trait::async_trait;
    use careplan_core::{NodeId, PlanService, Role};
    use careplan_state_inmemory::InMemoryStateStoreProvider;
    use pretty_assertions::assert_eq;

    fn doctor() -> Identity {
        Identity::new(1, Role::Doctor)
    }

    fn local_transport() -> (Arc<PlanService>, Arc<dyn PlanTransport>) {
        let service = Arc::new(PlanService::new(
            InMemoryStateStoreProvider::new().create_repository(),
        ));
        (service.clone(), Arc::new(LocalPlanTransport::new(service)))
    }

    struct DownTransport;

    #[async_trait]
    impl PlanTransport for DownTransport {
        async fn fetch(&self, _: PatientId) -> Result<Option<TreatmentPlan>, TransportError> {
            Err(TransportError::Http("Connection error: refused".to_string()))
        }

        async fn save(&self, _: PatientId, _: &GraphDocument) -> Result<TreatmentPlan, TransportError> {
            Err(TransportError::Http("Connection error: refused".to_string()))
        }

        async fn create(&self, _: PatientId) -> Result<TreatmentPlan, TransportError> {
            Err(TransportError::Http("Connection error: refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_load_without_plan_then_create() {
        let (service, transport) = local_transport();
        let mut controller = GraphController::new(doctor(), PatientId(1), transport);

        assert_eq!(controller.load().await, PlanView::NoPlan);
        assert!(matches!(
            controller.dispatch(Command::add_node("x", "")),
            Err(ControllerError::NotLoaded(_))
        ));

        controller.create_plan().await.unwrap();
        assert_eq!(controller.view(), &PlanView::Loaded);
        assert!(controller.plan_id().is_some());
        assert!(service.fetch_plan(PatientId(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_edits_are_saved_in_background() {
        let (service, transport) = local_transport();
        service.create_plan(PatientId(2)).await.unwrap();

        let mut controller = GraphController::new(doctor(), PatientId(2), transport);
        controller.load().await;

        assert!(controller.dispatch(Command::add_node("Diagnosis", "#ffcce6")).unwrap());
        assert!(controller.dispatch(Command::add_node("Tests", "#cce6ff")).unwrap());
        assert!(controller.dispatch(Command::connect("1", "2")).unwrap());

        let status = controller.flush().await;
        assert_eq!(status.failed, 0);

        let stored = service.fetch_plan(PatientId(2)).await.unwrap().unwrap();
        assert_eq!(stored.document(), *controller.snapshot());
        assert_eq!(stored.edges[0].id.as_str(), "e1-2");
    }

    #[tokio::test]
    async fn test_no_op_edit_does_not_save() {
        let (service, transport) = local_transport();
        service.create_plan(PatientId(3)).await.unwrap();

        let mut controller = GraphController::new(doctor(), PatientId(3), transport);
        controller.load().await;

        let changed = controller
            .dispatch(Command::RenameNode {
                id: NodeId::from("9"),
                label: "ghost".to_string(),
            })
            .unwrap();

        assert!(!changed);
        assert_eq!(controller.flush().await.completed, 0);
    }

    #[tokio::test]
    async fn test_read_only_role_cannot_edit() {
        let (service, transport) = local_transport();
        service.create_plan(PatientId(4)).await.unwrap();

        let mut controller = GraphController::new(Identity::new(9, Role::Reception), PatientId(4), transport);
        controller.load().await;
        assert!(controller.is_read_only());

        let err = controller.dispatch(Command::add_node("x", "")).unwrap_err();
        assert!(matches!(err, ControllerError::ReadOnly(ref role) if role == "reception"));
        assert!(controller.snapshot().is_empty());
        assert!(matches!(controller.create_plan().await, Err(ControllerError::ReadOnly(_))));
    }

    #[tokio::test]
    async fn test_edits_during_load_are_replayed() {
        let (service, transport) = local_transport();
        service.create_plan(PatientId(5)).await.unwrap();

        let mut controller = GraphController::new(doctor(), PatientId(5), transport.clone());
        controller.start_load();

        assert!(!controller.dispatch(Command::add_node("Diagnosis", "")).unwrap());
        assert!(!controller.dispatch(Command::add_node("Tests", "")).unwrap());
        assert_eq!(controller.queued_commands(), 2);

        let fetched = controller.transport().fetch(PatientId(5)).await;
        assert_eq!(controller.finish_load(fetched), &PlanView::Loaded);
        assert_eq!(controller.queued_commands(), 0);
        assert_eq!(controller.snapshot().nodes.len(), 2);

        controller.flush().await;
        let stored = service.fetch_plan(PatientId(5)).await.unwrap().unwrap();
        assert_eq!(stored.nodes.len(), 2);
    }

    #[tokio::test]
    async fn test_edits_during_load_are_dropped_without_plan() {
        let (_, transport) = local_transport();
        let mut controller = GraphController::new(doctor(), PatientId(6), transport.clone());

        controller.start_load();
        controller.dispatch(Command::add_node("x", "")).unwrap();

        let fetched = transport.fetch(PatientId(6)).await;
        assert_eq!(controller.finish_load(fetched), &PlanView::NoPlan);
        assert_eq!(controller.queued_commands(), 0);
        assert!(controller.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_load_failure() {
        let mut controller = GraphController::new(doctor(), PatientId(7), Arc::new(DownTransport));

        let view = controller.load().await;
        assert!(matches!(view, PlanView::LoadFailed(ref reason) if reason.contains("refused")));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_local_graph() {
        let mut controller = GraphController::new(doctor(), PatientId(8), Arc::new(DownTransport));
        controller.start_load();
        let plan = TreatmentPlan::new(
            PlanId(1),
            PatientId(8),
            GraphDocument::empty(),
            chrono::Utc::now(),
            chrono::Utc::now(),
        );
        controller.finish_load(Ok(Some(plan)));

        controller.dispatch(Command::add_node("Diagnosis", "")).unwrap();
        let status = controller.flush().await;

        assert_eq!(status.failed, 1);
        assert!(status.last_error.is_some());
        assert_eq!(controller.snapshot().nodes.len(), 1);

        // the next edit re-sends the full graph
        controller.dispatch(Command::add_node("Tests", "")).unwrap();
        assert_eq!(controller.flush().await.failed, 2);
    }

    #[tokio::test]
    async fn test_shutdown_completes_pending_save() {
        let (service, transport) = local_transport();
        service.create_plan(PatientId(10)).await.unwrap();

        let mut controller = GraphController::new(doctor(), PatientId(10), transport);
        controller.load().await;
        controller.dispatch(Command::add_node("Diagnosis", "")).unwrap();
        controller.shutdown();

        assert_eq!(controller.view(), &PlanView::Unloaded);
        assert!(matches!(
            controller.dispatch(Command::add_node("late", "")),
            Err(ControllerError::NotLoaded(_))
        ));

        controller.flush().await;
        let stored = service.fetch_plan(PatientId(10)).await.unwrap().unwrap();
        assert_eq!(stored.nodes.len(), 1);
    }
}
