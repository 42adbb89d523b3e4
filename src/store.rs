use crate::collection::Placement;
use crate::id_generator::IdGenerator;
use crate::{Action, ActionRecord, Cell, CellCollection, CellId, CellType, Direction, StoreError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// Owner of the current cell collection snapshot
///
/// Every mutation is synchronous. It produces a new immutable snapshot, which
/// is published to observers. Operations that leave the collection untouched
/// publish nothing.
#[derive(Debug)]
pub struct CellStore {
    snapshot: Arc<CellCollection>,
    ids: IdGenerator,
    history: Vec<ActionRecord>,
    publisher: watch::Sender<Arc<CellCollection>>,
}

impl CellStore {
    /// Create a store holding the initial seed collection
    pub fn new() -> Self {
        Self::from_collection(CellCollection::seeded())
    }

    /// Create a store around an existing collection
    pub fn from_collection(collection: CellCollection) -> Self {
        Self::with_id_generator(collection, IdGenerator::new())
    }

    /// Create a store with a specific id generator (useful for testing)
    pub fn with_id_generator(collection: CellCollection, ids: IdGenerator) -> Self {
        let snapshot = Arc::new(collection);
        let (publisher, _) = watch::channel(Arc::clone(&snapshot));
        Self {
            snapshot,
            ids,
            history: Vec::new(),
            publisher,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<CellCollection> {
        Arc::clone(&self.snapshot)
    }

    /// Observe every committed snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<CellCollection>> {
        self.publisher.subscribe()
    }

    pub fn get(&self, id: &str) -> Option<&Cell> {
        self.snapshot.get(id)
    }

    // ========== Operations ==========

    /// Insert an empty cell after `anchor`. Returns the new id.
    pub fn insert_cell_after(&mut self, anchor: Option<&str>, cell_type: CellType) -> CellId {
        self.insert(anchor, cell_type, Placement::After)
    }

    /// Insert an empty cell before `anchor`. Returns the new id.
    pub fn insert_cell_before(&mut self, anchor: Option<&str>, cell_type: CellType) -> CellId {
        self.insert(anchor, cell_type, Placement::Before)
    }

    /// Delete a cell. Deleting an absent id is a no-op.
    pub fn delete_cell(&mut self, id: &str) {
        let next = self.snapshot.with_deleted(id);
        let record = ActionRecord::new(Action::DeleteCell { id: CellId::from(id) });
        self.commit(next, record);
    }

    /// Swap a cell with its neighbour. Out-of-bounds moves and absent ids are no-ops.
    pub fn move_cell(&mut self, id: &str, direction: Direction) {
        let next = self.snapshot.with_moved(id, direction);
        let record = ActionRecord::new(Action::MoveCell {
            id: CellId::from(id),
            direction,
        });
        self.commit(next, record);
    }

    /// Replace a cell's content
    pub fn update_cell(&mut self, id: &str, content: impl Into<String>) -> Result<(), StoreError> {
        let content = content.into();
        let next = self.snapshot.with_content(id, content.clone())?;
        let record = ActionRecord::new(Action::UpdateCell {
            id: CellId::from(id),
            content,
        });
        self.commit(Some(next), record);
        Ok(())
    }

    /// Apply a protocol action. Returns the id created by insert actions.
    ///
    /// Bundle actions do not touch the collection and are ignored here.
    pub fn dispatch(&mut self, action: Action) -> Result<Option<CellId>, StoreError> {
        match action {
            Action::MoveCell { id, direction } => self.move_cell(id.as_str(), direction),
            Action::DeleteCell { id } => self.delete_cell(id.as_str()),
            Action::InsertCellAfter { id, cell_type } => {
                return Ok(Some(self.insert_cell_after(id.as_ref().map(CellId::as_str), cell_type)));
            }
            Action::InsertCellBefore { id, cell_type } => {
                return Ok(Some(self.insert_cell_before(id.as_ref().map(CellId::as_str), cell_type)));
            }
            Action::UpdateCell { id, content } => self.update_cell(id.as_str(), content)?,
            Action::BundleStart { .. } | Action::BundleComplete { .. } => {}
        }
        Ok(None)
    }

    // ========== History ==========

    /// Actions applied since the store was created or the history was drained
    pub fn history(&self) -> &[ActionRecord] {
        &self.history
    }

    /// Take the recorded history, leaving it empty
    pub fn drain_history(&mut self) -> Vec<ActionRecord> {
        std::mem::take(&mut self.history)
    }

    // ========== Internals ==========

    fn insert(&mut self, anchor: Option<&str>, cell_type: CellType, placement: Placement) -> CellId {
        let snapshot = Arc::clone(&self.snapshot);
        let id = self.ids.generate_unique(|token| snapshot.contains(token));
        let cell = Cell::new(id.clone(), cell_type);
        let next = snapshot.with_inserted(cell, anchor, placement);

        let anchor = anchor.map(CellId::from);
        let action = match placement {
            Placement::After => Action::InsertCellAfter { id: anchor, cell_type },
            Placement::Before => Action::InsertCellBefore { id: anchor, cell_type },
        };
        self.commit(Some(next), ActionRecord::new(action).created(id.clone()));
        id
    }

    fn commit(&mut self, next: Option<CellCollection>, record: ActionRecord) {
        let Some(next) = next else {
            trace!(action = ?record.action, "store action left collection unchanged");
            return;
        };

        trace!(action = ?record.action, cells = next.len(), "store action applied");
        self.snapshot = Arc::new(next);
        self.history.push(record);
        self.publisher.send_replace(Arc::clone(&self.snapshot));
    }
}

impl Default for CellStore {
    fn default() -> Self {
        Self::new()
    }
}
