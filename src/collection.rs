use crate::{Cell, CellId, CellType, Direction, StoreError};
use std::collections::HashMap;

/// Where an inserted cell lands relative to its anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Immediately after the anchor; missing anchor prepends
    After,
    /// Immediately before the anchor; missing anchor appends
    Before,
}

/// Immutable snapshot of the notebook's cells
///
/// `order` defines the display and execution sequence, `data` is the
/// unordered index. Every id in `order` has exactly one entry in `data`
/// and `order` never holds duplicates.
///
/// Transitions never mutate a snapshot; each one returns a new collection,
/// or `None` when the operation leaves the collection untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellCollection {
    order: Vec<CellId>,
    data: HashMap<CellId, Cell>,
}

impl CellCollection {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// The collection a notebook starts with when nothing was saved yet
    pub fn seeded() -> Self {
        let code = Cell::with_content(CellId::from("1"), CellType::Code, "const a = 1;");
        let text = Cell::with_content(CellId::from("2"), CellType::Text, "Click to edit");

        Self {
            order: vec![code.id.clone(), text.id.clone()],
            data: HashMap::from([(code.id.clone(), code), (text.id.clone(), text)]),
        }
    }

    /// Build a collection from raw parts without checking invariants
    /// (for deserialization; run validation before trusting the result)
    pub(crate) fn from_parts(order: Vec<CellId>, data: HashMap<CellId, Cell>) -> Self {
        Self { order, data }
    }

    // ========== Queries ==========

    pub fn order(&self) -> &[CellId] {
        &self.order
    }

    pub fn data(&self) -> &HashMap<CellId, Cell> {
        &self.data
    }

    /// Get a cell by ID
    pub fn get(&self, id: &str) -> Option<&Cell> {
        self.data.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.data.contains_key(id)
    }

    /// Position of a cell in the order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.order.iter().position(|candidate| candidate.as_str() == id)
    }

    /// Cells in display order
    pub fn cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        self.order.iter().filter_map(|id| self.data.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ========== Transitions ==========

    /// Insert `cell` relative to `anchor`
    pub fn with_inserted(&self, cell: Cell, anchor: Option<&str>, placement: Placement) -> Self {
        let mut next = self.clone();
        let found = anchor.and_then(|anchor| next.position(anchor));
        let index = match (placement, found) {
            (Placement::After, Some(index)) => index + 1,
            (Placement::After, None) => 0,
            (Placement::Before, Some(index)) => index,
            (Placement::Before, None) => next.order.len(),
        };

        next.order.insert(index, cell.id.clone());
        next.data.insert(cell.id.clone(), cell);
        next
    }

    /// Swap a cell with its neighbour. `None` when the id is absent or the
    /// move would leave the bounds of the order.
    pub fn with_moved(&self, id: &str, direction: Direction) -> Option<Self> {
        let index = self.position(id)?;
        let target = direction.target(index, self.order.len())?;

        let mut next = self.clone();
        next.order.swap(index, target);
        Some(next)
    }

    /// Remove a cell from both `data` and `order`. `None` when absent.
    pub fn with_deleted(&self, id: &str) -> Option<Self> {
        if !self.contains(id) && self.position(id).is_none() {
            return None;
        }

        let mut next = self.clone();
        next.data.remove(id);
        next.order.retain(|candidate| candidate.as_str() != id);
        Some(next)
    }

    /// Replace a cell's content
    pub fn with_content(&self, id: &str, content: impl Into<String>) -> Result<Self, StoreError> {
        let mut next = self.clone();
        let cell = next
            .data
            .get_mut(id)
            .ok_or_else(|| StoreError::CellNotFound(CellId::from(id)))?;
        cell.set_content(content);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(collection: &CellCollection) -> Vec<&str> {
        collection.order().iter().map(CellId::as_str).collect()
    }

    fn abc() -> CellCollection {
        ["A", "B", "C"]
            .iter()
            .rev()
            .fold(CellCollection::new(), |acc, id| {
                acc.with_inserted(
                    Cell::new(CellId::from(*id), CellType::Code),
                    None,
                    Placement::After,
                )
            })
    }

    #[test]
    fn test_seeded_collection() {
        let seeded = CellCollection::seeded();
        assert_eq!(ids(&seeded), vec!["1", "2"]);
        assert_eq!(seeded.get("1").unwrap().cell_type, CellType::Code);
        assert_eq!(seeded.get("1").unwrap().content, "const a = 1;");
        assert_eq!(seeded.get("2").unwrap().cell_type, CellType::Text);
    }

    #[test]
    fn test_move_middle_cell() {
        let cells = abc();
        assert_eq!(ids(&cells), vec!["A", "B", "C"]);

        let up = cells.with_moved("B", Direction::Up).unwrap();
        assert_eq!(ids(&up), vec!["B", "A", "C"]);

        let down = cells.with_moved("B", Direction::Down).unwrap();
        assert_eq!(ids(&down), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_move_out_of_bounds_is_noop() {
        let cells = abc();
        assert!(cells.with_moved("A", Direction::Up).is_none());
        assert!(cells.with_moved("C", Direction::Down).is_none());
        assert!(cells.with_moved("missing", Direction::Up).is_none());
    }

    #[test]
    fn test_move_preserves_cells() {
        let cells = abc();
        let moved = cells.with_moved("A", Direction::Down).unwrap();
        assert_eq!(moved.get("A"), cells.get("A"));
        assert_eq!(moved.data(), cells.data());
    }

    #[test]
    fn test_insert_after() {
        let cells = abc();
        let new = Cell::new(CellId::from("N"), CellType::Text);

        let after_b = cells.with_inserted(new.clone(), Some("B"), Placement::After);
        assert_eq!(ids(&after_b), vec!["A", "B", "N", "C"]);

        let after_none = cells.with_inserted(new.clone(), None, Placement::After);
        assert_eq!(ids(&after_none), vec!["N", "A", "B", "C"]);

        let after_missing = cells.with_inserted(new, Some("missing"), Placement::After);
        assert_eq!(ids(&after_missing), vec!["N", "A", "B", "C"]);
    }

    #[test]
    fn test_insert_before() {
        let cells = abc();
        let new = Cell::new(CellId::from("N"), CellType::Code);

        let before_b = cells.with_inserted(new.clone(), Some("B"), Placement::Before);
        assert_eq!(ids(&before_b), vec!["A", "N", "B", "C"]);

        let before_missing = cells.with_inserted(new, Some("missing"), Placement::Before);
        assert_eq!(ids(&before_missing), vec!["A", "B", "C", "N"]);
    }

    #[test]
    fn test_delete() {
        let cells = abc();
        let deleted = cells.with_deleted("B").unwrap();
        assert_eq!(ids(&deleted), vec!["A", "C"]);
        assert!(!deleted.contains("B"));

        assert!(cells.with_deleted("missing").is_none());
    }

    #[test]
    fn test_update_content() {
        let cells = abc();
        let updated = cells.with_content("A", "let x = 2;").unwrap();
        assert_eq!(updated.get("A").unwrap().content, "let x = 2;");
        // The previous snapshot is untouched
        assert_eq!(cells.get("A").unwrap().content, "");

        assert_eq!(
            cells.with_content("missing", "x"),
            Err(StoreError::CellNotFound(CellId::from("missing")))
        );
    }
}
