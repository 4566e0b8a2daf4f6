//! Reaction reconciliation.
//!
//! Keeps the marker set on a list's render target in line with the list
//! state by applying only the delta between what is required and what is
//! present. Every marker operation stands alone: a failure is recorded in
//! the [`ReconcileReport`] and the rest of the batch still runs.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::list::ShoppingList;
use crate::markers::{required_markers, Marker};

/// Delay between operations in sequential mode unless configured otherwise.
pub const DEFAULT_PACING_MS: u64 = 300;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum MarkerError {
    #[error("missing permission for marker operation: {0}")]
    Permission(String),
    #[error("render target no longer exists: {0}")]
    NotFound(String),
    #[error("marker operation was rate limited: {0}")]
    RateLimited(String),
    #[error("marker operation failed: {0}")]
    Other(String),
}

/// Whose placements a removal takes away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemovalScope {
    /// Every placement of the marker; needs elevated capability.
    All,
    /// Only the acting bot's own placement.
    OwnOnly,
}

/// The render target the engine reconciles against.
#[async_trait]
pub trait MarkerSurface: Send + Sync {
    async fn present_markers(&self) -> Result<Vec<Marker>, MarkerError>;
    async fn add_marker(&self, marker: &Marker) -> Result<(), MarkerError>;
    async fn remove_marker(&self, marker: &Marker, scope: RemovalScope)
        -> Result<(), MarkerError>;
    /// Whether the actor may remove markers placed by anyone.
    async fn can_remove_any(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileModeKind {
    Sequential,
    Concurrent,
}

impl std::str::FromStr for ReconcileModeKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(format!(
                "unsupported reaction mode `{other}` (expected sequential|concurrent)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileMode {
    /// One operation at a time with a fixed delay between operations.
    Sequential { pacing: Duration },
    /// All operations of a phase in flight at once, awaited together.
    Concurrent,
}

impl Default for ReconcileMode {
    fn default() -> Self {
        Self::Concurrent
    }
}

impl ReconcileMode {
    pub fn from_kind(kind: ReconcileModeKind, pacing: Duration) -> Self {
        match kind {
            ReconcileModeKind::Sequential => Self::Sequential { pacing },
            ReconcileModeKind::Concurrent => Self::Concurrent,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_add: Vec<Marker>,
    pub to_remove: Vec<Marker>,
}

impl ReconcilePlan {
    /// Minimal delta between `required` and `present`.
    ///
    /// Additions keep `required` order; removals keep the order in which they
    /// were observed on the target. Duplicates collapse.
    pub fn compute(required: &[Marker], present: &[Marker]) -> Self {
        let present_set: HashSet<&Marker> = present.iter().collect();
        let required_set: HashSet<&Marker> = required.iter().collect();

        let mut seen = HashSet::new();
        let to_add = required
            .iter()
            .filter(|marker| !present_set.contains(marker) && seen.insert(*marker))
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        let to_remove = present
            .iter()
            .filter(|marker| !required_set.contains(marker) && seen.insert(*marker))
            .cloned()
            .collect();

        Self { to_add, to_remove }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerOperation {
    Read,
    Add,
    Remove,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkerFailure {
    pub operation: MarkerOperation,
    pub marker: Option<Marker>,
    pub error: MarkerError,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub plan: ReconcilePlan,
    pub added: Vec<Marker>,
    pub removed: Vec<Marker>,
    pub failures: Vec<MarkerFailure>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn attempted(&self) -> usize {
        self.plan.to_add.len() + self.plan.to_remove.len()
    }

    fn record(&mut self, operation: MarkerOperation, marker: Marker, outcome: Result<(), MarkerError>) {
        match (operation, outcome) {
            (MarkerOperation::Add, Ok(())) => self.added.push(marker),
            (MarkerOperation::Remove, Ok(())) => self.removed.push(marker),
            (_, Ok(())) => {}
            (operation, Err(error)) => {
                warn!(
                    event_name = "reactions.reconcile.operation_failed",
                    operation = ?operation,
                    marker = %marker,
                    error = %error,
                    "marker operation failed; continuing batch"
                );
                self.failures.push(MarkerFailure { operation, marker: Some(marker), error });
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Reconciler {
    mode: ReconcileMode,
}

impl Reconciler {
    pub fn new(mode: ReconcileMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    pub async fn reconcile<S>(&self, surface: &S, list: &ShoppingList) -> ReconcileReport
    where
        S: MarkerSurface + ?Sized,
    {
        let required = required_markers(list);
        self.reconcile_markers(surface, &required).await
    }

    pub async fn reconcile_markers<S>(&self, surface: &S, required: &[Marker]) -> ReconcileReport
    where
        S: MarkerSurface + ?Sized,
    {
        let mut report = ReconcileReport::default();
        if required.is_empty() {
            return report;
        }

        // Adds are idempotent, so an unreadable target is treated as bare.
        let present = match surface.present_markers().await {
            Ok(present) => present,
            Err(error) => {
                warn!(
                    event_name = "reactions.reconcile.read_failed",
                    error = %error,
                    "could not read present markers; assuming none"
                );
                report.failures.push(MarkerFailure {
                    operation: MarkerOperation::Read,
                    marker: None,
                    error,
                });
                Vec::new()
            }
        };

        report.plan = ReconcilePlan::compute(required, &present);
        debug!(
            event_name = "reactions.reconcile.planned",
            to_add = report.plan.to_add.len(),
            to_remove = report.plan.to_remove.len(),
            mode = ?self.mode,
            "computed marker delta"
        );
        if report.plan.is_empty() {
            return report;
        }

        let scope = if report.plan.to_remove.is_empty() {
            RemovalScope::OwnOnly
        } else if surface.can_remove_any().await {
            RemovalScope::All
        } else {
            RemovalScope::OwnOnly
        };

        let to_remove = report.plan.to_remove.clone();
        let to_add = report.plan.to_add.clone();

        match self.mode {
            ReconcileMode::Sequential { pacing } => {
                let mut first = true;
                for marker in to_remove {
                    pace(&mut first, pacing).await;
                    let outcome = surface.remove_marker(&marker, scope).await;
                    report.record(MarkerOperation::Remove, marker, outcome);
                }
                for marker in to_add {
                    pace(&mut first, pacing).await;
                    let outcome = surface.add_marker(&marker).await;
                    report.record(MarkerOperation::Add, marker, outcome);
                }
            }
            ReconcileMode::Concurrent => {
                let removals = join_all(to_remove.into_iter().map(|marker| async move {
                    let outcome = surface.remove_marker(&marker, scope).await;
                    (marker, outcome)
                }))
                .await;
                for (marker, outcome) in removals {
                    report.record(MarkerOperation::Remove, marker, outcome);
                }

                let additions = join_all(to_add.into_iter().map(|marker| async move {
                    let outcome = surface.add_marker(&marker).await;
                    (marker, outcome)
                }))
                .await;
                for (marker, outcome) in additions {
                    report.record(MarkerOperation::Add, marker, outcome);
                }
            }
        }

        report
    }
}

async fn pace(first: &mut bool, pacing: Duration) {
    if *first {
        *first = false;
        return;
    }
    if !pacing.is_zero() {
        tokio::time::sleep(pacing).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Barrier, Mutex};
    use tokio::time::Instant;

    use super::{
        MarkerError, MarkerOperation, MarkerSurface, ReconcileMode, ReconcilePlan, Reconciler,
        RemovalScope,
    };
    use crate::domain::list::ShoppingList;
    use crate::markers::{required_markers, ActionMarker, Marker, ITEM_MARKERS};

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Read,
        Add(Marker),
        Remove(Marker, RemovalScope),
    }

    #[derive(Default)]
    struct FakeSurface {
        state: Mutex<FakeState>,
        /// Additions park here until every party has arrived.
        add_barrier: Option<Arc<Barrier>>,
    }

    #[derive(Default)]
    struct FakeState {
        present: Vec<Marker>,
        failing_adds: HashSet<Marker>,
        read_error: Option<MarkerError>,
        elevated: bool,
        calls: Vec<Call>,
        issued_at: Vec<Instant>,
    }

    impl FakeSurface {
        fn with_present(present: Vec<Marker>) -> Self {
            Self {
                state: Mutex::new(FakeState { present, ..FakeState::default() }),
                add_barrier: None,
            }
        }

        async fn calls(&self) -> Vec<Call> {
            self.state.lock().await.calls.clone()
        }

        async fn present(&self) -> Vec<Marker> {
            self.state.lock().await.present.clone()
        }
    }

    #[async_trait]
    impl MarkerSurface for FakeSurface {
        async fn present_markers(&self) -> Result<Vec<Marker>, MarkerError> {
            let mut state = self.state.lock().await;
            state.calls.push(Call::Read);
            match state.read_error.clone() {
                Some(error) => Err(error),
                None => Ok(state.present.clone()),
            }
        }

        async fn add_marker(&self, marker: &Marker) -> Result<(), MarkerError> {
            if let Some(barrier) = &self.add_barrier {
                barrier.wait().await;
            }
            let mut state = self.state.lock().await;
            state.calls.push(Call::Add(marker.clone()));
            state.issued_at.push(Instant::now());
            if state.failing_adds.contains(marker) {
                return Err(MarkerError::RateLimited(marker.to_string()));
            }
            state.present.push(marker.clone());
            Ok(())
        }

        async fn remove_marker(
            &self,
            marker: &Marker,
            scope: RemovalScope,
        ) -> Result<(), MarkerError> {
            let mut state = self.state.lock().await;
            state.calls.push(Call::Remove(marker.clone(), scope));
            state.issued_at.push(Instant::now());
            state.present.retain(|present| present != marker);
            Ok(())
        }

        async fn can_remove_any(&self) -> bool {
            self.state.lock().await.elevated
        }
    }

    fn groceries(count: usize) -> ShoppingList {
        ShoppingList::new("Groceries", (0..count).map(|index| format!("item {index}")))
    }

    fn modes() -> [ReconcileMode; 2] {
        [ReconcileMode::Concurrent, ReconcileMode::Sequential { pacing: Duration::ZERO }]
    }

    #[test]
    fn plan_against_empty_target_adds_everything() {
        let required = required_markers(&groceries(4));
        let plan = ReconcilePlan::compute(&required, &[]);

        assert_eq!(plan.to_add, required);
        assert!(plan.to_remove.is_empty());
    }

    #[test]
    fn plan_against_matching_target_is_empty() {
        let required = required_markers(&groceries(4));
        let plan = ReconcilePlan::compute(&required, &required);
        assert!(plan.is_empty());
    }

    #[test]
    fn plan_removes_only_the_extra_marker() {
        let required = required_markers(&groceries(3));
        let mut present = required.clone();
        present.push(ActionMarker::ClearCompleted.marker());

        let plan = ReconcilePlan::compute(&required, &present);
        assert!(plan.to_add.is_empty());
        assert_eq!(plan.to_remove, vec![ActionMarker::ClearCompleted.marker()]);
    }

    #[test]
    fn plan_preserves_required_order_for_additions() {
        let required = required_markers(&groceries(5));
        let present = vec![required[1].clone(), required[3].clone()];
        let plan = ReconcilePlan::compute(&required, &present);

        let expected: Vec<_> = required
            .iter()
            .filter(|marker| !present.contains(marker))
            .cloned()
            .collect();
        assert_eq!(plan.to_add, expected);
    }

    #[tokio::test]
    async fn empty_list_performs_no_operations() {
        for mode in modes() {
            let surface = FakeSurface::with_present(vec![Marker::new(ITEM_MARKERS[0])]);
            let report = Reconciler::new(mode).reconcile(&surface, &groceries(0)).await;

            assert_eq!(report.attempted(), 0);
            assert!(surface.calls().await.is_empty(), "no calls expected in {mode:?}");
        }
    }

    #[tokio::test]
    async fn removals_are_issued_before_additions() {
        for mode in modes() {
            let stale = Marker::new("\u{1f600}");
            let surface = FakeSurface::with_present(vec![stale.clone()]);
            let report = Reconciler::new(mode).reconcile(&surface, &groceries(2)).await;

            assert!(report.is_clean());
            let calls = surface.calls().await;
            assert_eq!(calls[0], Call::Read);
            assert_eq!(calls[1], Call::Remove(stale.clone(), RemovalScope::OwnOnly));
            assert!(calls[2..].iter().all(|call| matches!(call, Call::Add(_))));
            assert_eq!(report.added.len(), 4);
            assert_eq!(report.removed, vec![stale]);
        }
    }

    #[tokio::test]
    async fn elevated_actor_removes_every_placement() {
        let stale = Marker::new("\u{1f600}");
        let surface = FakeSurface::with_present(vec![stale.clone()]);
        surface.state.lock().await.elevated = true;

        Reconciler::default().reconcile(&surface, &groceries(1)).await;

        assert!(surface.calls().await.contains(&Call::Remove(stale, RemovalScope::All)));
    }

    #[tokio::test]
    async fn failed_addition_does_not_stop_the_batch() {
        for mode in modes() {
            let surface = FakeSurface::default();
            let failing = Marker::new(ITEM_MARKERS[1]);
            surface.state.lock().await.failing_adds.insert(failing.clone());

            let list = groceries(4);
            let report = Reconciler::new(mode).reconcile(&surface, &list).await;

            assert_eq!(report.failures.len(), 1);
            assert_eq!(report.failures[0].operation, MarkerOperation::Add);
            assert_eq!(report.failures[0].marker.as_ref(), Some(&failing));
            assert_eq!(report.added.len(), required_markers(&list).len() - 1);
            let adds =
                surface.calls().await.into_iter().filter(|call| matches!(call, Call::Add(_))).count();
            assert_eq!(adds, required_markers(&list).len());
        }
    }

    #[tokio::test]
    async fn second_pass_is_idempotent() {
        let surface = FakeSurface::default();
        let list = groceries(3);
        let reconciler = Reconciler::default();

        let first = reconciler.reconcile(&surface, &list).await;
        let second = reconciler.reconcile(&surface, &list).await;

        assert_eq!(first.added.len(), 5);
        assert_eq!(second.attempted(), 0);
    }

    #[tokio::test]
    async fn toggle_round_trip_moves_clear_completed_marker() {
        let surface = FakeSurface::default();
        let reconciler = Reconciler::default();
        let mut list = groceries(2);
        let clear = ActionMarker::ClearCompleted.marker();

        reconciler.reconcile(&surface, &list).await;
        assert!(!surface.present().await.contains(&clear));

        list.items[0].checked = !list.items[0].checked;
        let report = reconciler.reconcile(&surface, &list).await;
        assert_eq!(report.added, vec![clear.clone()]);

        list.items[0].checked = !list.items[0].checked;
        let report = reconciler.reconcile(&surface, &list).await;
        assert_eq!(report.removed, vec![clear.clone()]);
        assert!(!surface.present().await.contains(&clear));
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_mode_paces_every_operation_after_the_first() {
        let pacing = Duration::from_millis(300);
        let stale = Marker::new("\u{1f600}");
        let surface = FakeSurface::with_present(vec![stale]);
        let started = Instant::now();

        let report = Reconciler::new(ReconcileMode::Sequential { pacing })
            .reconcile(&surface, &groceries(2))
            .await;

        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.added.len(), 4);
        let issued = surface.state.lock().await.issued_at.clone();
        assert_eq!(issued.len(), 5);
        assert_eq!(issued[0], started, "first operation must not wait");
        for window in issued.windows(2) {
            assert!(window[1] - window[0] >= pacing, "gap shorter than pacing: {window:?}");
        }
        // The removal phase and the addition phase are separated by the same delay.
        assert!(issued[1] - issued[0] >= pacing);
    }

    #[tokio::test]
    async fn concurrent_mode_keeps_every_addition_in_flight() {
        let list = groceries(3);
        let expected = required_markers(&list).len();
        let surface = FakeSurface {
            add_barrier: Some(Arc::new(Barrier::new(expected))),
            ..FakeSurface::default()
        };

        let report = tokio::time::timeout(
            Duration::from_secs(2),
            Reconciler::new(ReconcileMode::Concurrent).reconcile(&surface, &list),
        )
        .await
        .expect("additions should all be started before any completes");

        assert_eq!(report.added.len(), expected);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn unreadable_target_is_treated_as_bare() {
        let surface = FakeSurface::default();
        surface.state.lock().await.read_error = Some(MarkerError::NotFound("msg-1".to_owned()));

        let report = Reconciler::default().reconcile(&surface, &groceries(1)).await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].operation, MarkerOperation::Read);
        assert_eq!(report.added.len(), 3);
    }
}
