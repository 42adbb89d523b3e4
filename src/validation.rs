use crate::{CellCollection, CellId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Validation severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationSeverity {
    Info,    // worth knowing
    Warning, // loads, but something is off
    Error,   // refuses to load
}

/// Validation issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
    pub affected_cells: Vec<CellId>,
    pub issue_type: ValidationIssueType,
}

/// Types of validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationIssueType {
    /// An id appears more than once in the order
    DuplicateId,
    /// An id in the order has no cell
    MissingCell,
    /// A cell is stored under a key different from its own id
    IdMismatch,
    /// A cell is not referenced by the order
    OrphanCell,
    /// A code cell with nothing to bundle
    EmptyCodeCell,
}

/// Complete validation result
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Create a new empty validation result
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    /// Add an issue
    pub fn add_issue(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|i| i.severity == ValidationSeverity::Error)
    }

    /// Get all errors
    pub fn errors(&self) -> Vec<&ValidationIssue> {
        self.by_severity(ValidationSeverity::Error)
    }

    /// Get all warnings
    pub fn warnings(&self) -> Vec<&ValidationIssue> {
        self.by_severity(ValidationSeverity::Warning)
    }

    /// Get all info messages
    pub fn info(&self) -> Vec<&ValidationIssue> {
        self.by_severity(ValidationSeverity::Info)
    }

    /// Check if validation passed (no errors)
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    /// Error messages joined for display
    pub fn error_summary(&self) -> String {
        self.errors()
            .iter()
            .map(|issue| issue.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn by_severity(&self, severity: ValidationSeverity) -> Vec<&ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == severity)
            .collect()
    }
}

/// Validator for cell collections read from disk
pub struct Validator;

impl Validator {
    /// Run all validations on a collection
    pub fn validate(collection: &CellCollection) -> ValidationResult {
        let mut result = ValidationResult::new();

        let duplicates = Self::find_duplicates(collection);
        if !duplicates.is_empty() {
            result.add_issue(ValidationIssue {
                severity: ValidationSeverity::Error,
                message: format!("{} id(s) appear more than once in the order", duplicates.len()),
                affected_cells: duplicates,
                issue_type: ValidationIssueType::DuplicateId,
            });
        }

        let missing: Vec<CellId> = collection
            .order()
            .iter()
            .filter(|id| !collection.data().contains_key(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            result.add_issue(ValidationIssue {
                severity: ValidationSeverity::Error,
                message: format!("{} id(s) in the order have no cell", missing.len()),
                affected_cells: missing,
                issue_type: ValidationIssueType::MissingCell,
            });
        }

        let mut mismatched: Vec<CellId> = collection
            .data()
            .iter()
            .filter(|(key, cell)| **key != cell.id)
            .map(|(key, _)| key.clone())
            .collect();
        if !mismatched.is_empty() {
            mismatched.sort();
            result.add_issue(ValidationIssue {
                severity: ValidationSeverity::Error,
                message: format!(
                    "{} cell(s) are stored under a key that differs from their id",
                    mismatched.len()
                ),
                affected_cells: mismatched,
                issue_type: ValidationIssueType::IdMismatch,
            });
        }

        let ordered: HashSet<&CellId> = collection.order().iter().collect();
        let mut orphans: Vec<CellId> = collection
            .data()
            .keys()
            .filter(|id| !ordered.contains(id))
            .cloned()
            .collect();
        if !orphans.is_empty() {
            orphans.sort();
            result.add_issue(ValidationIssue {
                severity: ValidationSeverity::Warning,
                message: format!(
                    "{} cell(s) are not in the order and will never be shown",
                    orphans.len()
                ),
                affected_cells: orphans,
                issue_type: ValidationIssueType::OrphanCell,
            });
        }

        let empty: Vec<CellId> = collection
            .cells()
            .filter(|cell| cell.is_code() && cell.content.trim().is_empty())
            .map(|cell| cell.id.clone())
            .collect();
        if !empty.is_empty() {
            result.add_issue(ValidationIssue {
                severity: ValidationSeverity::Info,
                message: format!("{} code cell(s) are empty", empty.len()),
                affected_cells: empty,
                issue_type: ValidationIssueType::EmptyCodeCell,
            });
        }

        result
    }

    fn find_duplicates(collection: &CellCollection) -> Vec<CellId> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        for id in collection.order() {
            if !seen.insert(id) && !duplicates.contains(id) {
                duplicates.push(id.clone());
            }
        }
        duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cell, CellType};
    use std::collections::HashMap;

    fn cell(id: &str, cell_type: CellType, content: &str) -> Cell {
        Cell::with_content(CellId::from(id), cell_type, content)
    }

    fn collection(order: &[&str], cells: Vec<(&str, Cell)>) -> CellCollection {
        CellCollection::from_parts(
            order.iter().map(|id| CellId::from(*id)).collect(),
            cells
                .into_iter()
                .map(|(key, cell)| (CellId::from(key), cell))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_seed_is_valid() {
        let result = Validator::validate(&CellCollection::seeded());
        assert!(result.is_valid());
        assert!(result.issues.is_empty());
    }

    #[test]
    fn test_duplicate_id() {
        let collection = collection(
            &["a", "a"],
            vec![("a", cell("a", CellType::Code, "1"))],
        );
        let result = Validator::validate(&collection);

        assert!(!result.is_valid());
        assert_eq!(result.errors()[0].issue_type, ValidationIssueType::DuplicateId);
        assert_eq!(result.errors()[0].affected_cells, vec![CellId::from("a")]);
    }

    #[test]
    fn test_missing_cell() {
        let collection = collection(&["a", "b"], vec![("a", cell("a", CellType::Text, ""))]);
        let result = Validator::validate(&collection);

        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].issue_type, ValidationIssueType::MissingCell);
        assert_eq!(result.errors()[0].affected_cells, vec![CellId::from("b")]);
    }

    #[test]
    fn test_id_mismatch() {
        let collection = collection(&["a"], vec![("a", cell("b", CellType::Text, ""))]);
        let result = Validator::validate(&collection);

        assert_eq!(result.errors()[0].issue_type, ValidationIssueType::IdMismatch);
    }

    #[test]
    fn test_orphan_is_a_warning() {
        let collection = collection(
            &["a"],
            vec![
                ("a", cell("a", CellType::Text, "")),
                ("b", cell("b", CellType::Text, "")),
            ],
        );
        let result = Validator::validate(&collection);

        assert!(result.is_valid());
        assert_eq!(result.warnings()[0].issue_type, ValidationIssueType::OrphanCell);
        assert_eq!(result.warnings()[0].affected_cells, vec![CellId::from("b")]);
    }

    #[test]
    fn test_empty_code_cell_is_info() {
        let collection = collection(&["a"], vec![("a", cell("a", CellType::Code, "  "))]);
        let result = Validator::validate(&collection);

        assert!(result.is_valid());
        assert_eq!(result.info()[0].issue_type, ValidationIssueType::EmptyCodeCell);
    }
}
