//! Error types for the notebook core
//!
//! Store operations, module fetching, the module cache and the bundling
//! pipeline each have their own error enum. Bundle-level failures end up as
//! the `err` text of a single `BundleComplete` and never escape further.

use crate::cell::CellId;
use std::path::PathBuf;

/// Errors raised by cell store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The id is not present in the collection
    #[error("cell not found: {0}")]
    CellNotFound(CellId),

    /// The operation needs a code cell
    #[error("cell {0} is not a code cell")]
    NotACodeCell(CellId),
}

/// Errors raised while fetching a module over the network
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The request path is not a valid absolute URL
    #[error("invalid module url: {0}")]
    InvalidUrl(String),

    /// The server answered with a non-2xx status
    #[error("request for {url} failed with status {status}")]
    Status { url: String, status: u16 },

    /// Connection, TLS, timeout or body decoding failure
    #[error("request for {url} failed: {message}")]
    Transport { url: String, message: String },
}

impl FetchError {
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the persistent module cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error on the cache directory or an entry file
    #[error("cache io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Entry could not be encoded
    #[error("cache entry for {key} could not be serialized: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that end a bundle run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
    /// A module could not be resolved or fetched
    #[error("could not resolve \"{path}\": {reason}")]
    Resolution { path: String, reason: String },

    /// Syntax failure reported by the compile step, passed through verbatim
    #[error("{message}")]
    Compile { message: String },
}

impl BundleError {
    pub fn resolution(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::Resolution {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a compile diagnostic in `file:line:col: ERROR: text` form
    pub fn compile_at(file: &str, source: &str, offset: usize, text: impl AsRef<str>) -> Self {
        let (line, column) = line_column(source, offset);
        Self::Compile {
            message: format!("{file}:{line}:{column}: ERROR: {}", text.as_ref()),
        }
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}

/// 1-based line, 0-based column of a byte offset
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let column = match before.iter().rposition(|&b| b == b'\n') {
        Some(newline) => offset - newline - 1,
        None => offset,
    };
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display() {
        let err = StoreError::CellNotFound(CellId::from("abc"));
        assert_eq!(err.to_string(), "cell not found: abc");
    }

    #[test]
    fn resolution_error_names_path() {
        let err = BundleError::resolution(
            "https://unpkg.com/nope",
            FetchError::Status {
                url: "https://unpkg.com/nope".to_string(),
                status: 404,
            },
        );
        let message = err.to_string();
        assert!(message.contains("https://unpkg.com/nope"));
        assert!(message.contains("404"));
        assert!(err.is_resolution());
    }

    #[test]
    fn compile_error_position() {
        let source = "const a = 1;\nconst b = (;\n";
        let err = BundleError::compile_at("index.js", source, 24, "Unexpected \";\"");
        assert_eq!(err.to_string(), "index.js:2:11: ERROR: Unexpected \";\"");
    }

    #[test]
    fn line_column_at_start() {
        assert_eq!(line_column("abc", 0), (1, 0));
        assert_eq!(line_column("a\nb", 2), (2, 0));
    }
}
