use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a cell, immutable once assigned
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Borrow<str> for CellId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CellId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CellId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single unit of notebook content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cell {
    /// Unique identifier within the notebook
    pub id: CellId,

    /// Fixed at creation
    #[serde(rename = "type")]
    pub cell_type: CellType,

    /// Raw source for code cells, prose for text cells
    pub content: String,
}

impl Cell {
    /// Create an empty cell of the given type
    pub fn new(id: CellId, cell_type: CellType) -> Self {
        Self {
            id,
            cell_type,
            content: String::new(),
        }
    }

    /// Create a cell with initial content (used for seeding and tests)
    pub fn with_content(id: CellId, cell_type: CellType, content: impl Into<String>) -> Self {
        Self {
            id,
            cell_type,
            content: content.into(),
        }
    }

    /// Replace the cell's content
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn is_code(&self) -> bool {
        self.cell_type == CellType::Code
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Cell type determines whether a cell can be bundled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Code,
    Text,
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellType::Code => f.pad("code"),
            CellType::Text => f.pad("text"),
        }
    }
}

impl std::str::FromStr for CellType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(CellType::Code),
            "text" => Ok(CellType::Text),
            other => Err(format!("unknown cell type: {other}")),
        }
    }
}
