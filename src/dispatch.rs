//! Bundle dispatch: drives bundle runs and publishes their lifecycle
//!
//! Starting a bundle marks the cell `Building` and broadcasts `BundleStart`
//! before returning. The run itself is a spawned task that records the result
//! and broadcasts exactly one `BundleComplete`, whether it succeeded or not.
//! Overlapping runs for the same cell are not coordinated: the last one to
//! complete wins.

use crate::bundler::{BundleOutcome, Bundler};
use crate::{Action, ActionRecord, CellId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, info_span, warn, Instrument};
use ulid::Ulid;

/// Capacity of the event channel; slow subscribers see `Lagged` past this
const EVENT_CAPACITY: usize = 256;

/// Result of one bundle run: either code or an error message, never both
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleResult {
    cell_id: CellId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl BundleResult {
    pub fn success(cell_id: CellId, code: impl Into<String>) -> Self {
        Self {
            cell_id,
            code: Some(code.into()),
            error: None,
        }
    }

    pub fn failure(cell_id: CellId, error: impl ToString) -> Self {
        Self {
            cell_id,
            code: None,
            error: Some(error.to_string()),
        }
    }

    pub fn from_outcome(cell_id: CellId, outcome: BundleOutcome) -> Self {
        match outcome {
            Ok(code) => Self::success(cell_id, code),
            Err(e) => Self::failure(cell_id, e),
        }
    }

    pub fn cell_id(&self) -> &CellId {
        &self.cell_id
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.code.is_some()
    }

    pub fn status(&self) -> BundleStatus {
        if self.is_success() {
            BundleStatus::Ready
        } else {
            BundleStatus::Failed
        }
    }
}

/// Per-cell bundle state. The code or error of a finished run is in the
/// cell's [`BundleResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleStatus {
    /// Never bundled
    Idle,
    Building,
    Ready,
    Failed,
}

impl BundleStatus {
    pub fn is_building(&self) -> bool {
        matches!(self, BundleStatus::Building)
    }
}

#[derive(Debug)]
struct BundleState {
    status: BundleStatus,
    result: Option<BundleResult>,
}

/// Starts bundle runs and keeps the per-cell bundle side-store
#[derive(Clone)]
pub struct Dispatcher {
    bundler: Arc<Bundler>,
    bundles: Arc<Mutex<HashMap<CellId, BundleState>>>,
    events: broadcast::Sender<ActionRecord>,
}

impl Dispatcher {
    pub fn new(bundler: Arc<Bundler>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            bundler,
            bundles: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    pub fn bundler(&self) -> &Arc<Bundler> {
        &self.bundler
    }

    /// Receive `BundleStart` / `BundleComplete` events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ActionRecord> {
        self.events.subscribe()
    }

    /// Start bundling `source` on behalf of `cell_id`.
    ///
    /// The cell is `Building` and `BundleStart` has been sent when this
    /// returns. Must be called from within a tokio runtime.
    pub fn start_bundle(&self, cell_id: impl Into<CellId>, source: impl Into<String>) -> BundleTask {
        let cell_id = cell_id.into();
        let source = source.into();
        let build_id = Ulid::new();

        {
            let mut bundles = self.bundles.lock();
            let state = bundles.entry(cell_id.clone()).or_insert(BundleState {
                status: BundleStatus::Idle,
                result: None,
            });
            state.status = BundleStatus::Building;
        }
        self.publish(Action::BundleStart {
            cell_id: cell_id.clone(),
            build_id,
        });

        let span = info_span!("bundle", cell_id = %cell_id, build_id = %build_id);
        let bundler = Arc::clone(&self.bundler);
        let bundles = Arc::clone(&self.bundles);
        let events = self.events.clone();
        let task_cell = cell_id.clone();

        let handle = tokio::spawn(
            async move {
                let outcome = bundler.bundle(&source).await;
                let result = BundleResult::from_outcome(task_cell, outcome);
                match result.error() {
                    None => info!("bundle ready"),
                    Some(error) => warn!(error, "bundle failed"),
                }

                {
                    let mut bundles = bundles.lock();
                    // A forgotten cell stays forgotten
                    if let Some(state) = bundles.get_mut(result.cell_id()) {
                        state.status = result.status();
                        state.result = Some(result.clone());
                    }
                }
                let _ = events.send(ActionRecord::new(Action::BundleComplete {
                    build_id,
                    result: result.clone(),
                }));
                result
            }
            .instrument(span),
        );

        BundleTask {
            cell_id,
            build_id,
            handle,
        }
    }

    /// Current bundle status of a cell
    pub fn status(&self, cell_id: &str) -> BundleStatus {
        self.bundles
            .lock()
            .get(cell_id)
            .map(|state| state.status)
            .unwrap_or(BundleStatus::Idle)
    }

    /// Latest completed result for a cell
    pub fn result(&self, cell_id: &str) -> Option<BundleResult> {
        self.bundles
            .lock()
            .get(cell_id)
            .and_then(|state| state.result.clone())
    }

    /// Drop everything known about a cell's bundles
    pub fn forget(&self, cell_id: &str) {
        self.bundles.lock().remove(cell_id);
    }

    fn publish(&self, action: Action) {
        // No subscribers is fine
        let _ = self.events.send(ActionRecord::new(action));
    }
}

/// Handle to a running bundle
#[derive(Debug)]
pub struct BundleTask {
    cell_id: CellId,
    build_id: Ulid,
    handle: JoinHandle<BundleResult>,
}

impl BundleTask {
    pub fn cell_id(&self) -> &CellId {
        &self.cell_id
    }

    pub fn build_id(&self) -> Ulid {
        self.build_id
    }

    /// Stop the run. An aborted run sends no `BundleComplete` and leaves the
    /// cell's status as it is.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the run's result
    pub async fn join(self) -> Result<BundleResult, JoinError> {
        self.handle.await
    }
}
