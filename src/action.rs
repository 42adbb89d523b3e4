use crate::{BundleResult, CellId, CellType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// An action with the time it was applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub timestamp: DateTime<Utc>,
    pub action: Action,

    /// Id assigned by an insert action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<CellId>,
}

impl ActionRecord {
    /// Create a new record with the current timestamp
    pub fn new(action: Action) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            created: None,
        }
    }

    /// Create a new record with a specific timestamp
    pub fn with_timestamp(timestamp: DateTime<Utc>, action: Action) -> Self {
        Self {
            timestamp,
            action,
            created: None,
        }
    }

    pub(crate) fn created(mut self, id: CellId) -> Self {
        self.created = Some(id);
        self
    }
}

/// Actions exchanged between the UI layer and the core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    MoveCell {
        id: CellId,
        direction: Direction,
    },

    DeleteCell {
        id: CellId,
    },

    /// A missing or null anchor prepends
    InsertCellAfter {
        id: Option<CellId>,
        cell_type: CellType,
    },

    /// A missing or null anchor appends
    InsertCellBefore {
        id: Option<CellId>,
        cell_type: CellType,
    },

    UpdateCell {
        id: CellId,
        content: String,
    },

    BundleStart {
        cell_id: CellId,
        build_id: Ulid,
    },

    BundleComplete {
        build_id: Ulid,
        result: BundleResult,
    },
}

impl Action {
    /// The cell this action targets, if any
    pub fn cell_id(&self) -> Option<&CellId> {
        match self {
            Action::MoveCell { id, .. }
            | Action::DeleteCell { id }
            | Action::UpdateCell { id, .. } => Some(id),
            Action::InsertCellAfter { id, .. } | Action::InsertCellBefore { id, .. } => {
                id.as_ref()
            }
            Action::BundleStart { cell_id, .. } => Some(cell_id),
            Action::BundleComplete { result, .. } => Some(result.cell_id()),
        }
    }

    /// Whether the action belongs to the bundle side-store rather than the cell collection
    pub fn is_bundle_action(&self) -> bool {
        matches!(
            self,
            Action::BundleStart { .. } | Action::BundleComplete { .. }
        )
    }
}

/// Direction for moving a cell within the order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// Target index for a move from `index`, `None` if it leaves `[0, len)`
    pub fn target(self, index: usize, len: usize) -> Option<usize> {
        let target = match self {
            Direction::Up => index.checked_sub(1)?,
            Direction::Down => index + 1,
        };
        (target < len).then_some(target)
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}
