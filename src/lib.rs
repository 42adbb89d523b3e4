// Cell Notebook - Core Library

pub mod action;
pub mod bundler;
pub mod cache;
pub mod cell;
pub mod collection;
pub mod config;
pub mod dispatch;
pub mod emit;
pub mod error;
pub mod fetch;
pub mod id_generator;
pub mod loader;
pub mod logging;
pub mod notebook;
pub mod resolve;
pub mod scan;
pub mod serialization;
pub mod store;
pub mod validation;

// Re-export main types for convenience
pub use action::{Action, ActionRecord, Direction};
pub use bundler::{BundleOutcome, Bundler};
pub use cache::ModuleCache;
pub use cell::{Cell, CellId, CellType};
pub use collection::CellCollection;
pub use config::NotebookConfig;
pub use dispatch::{BundleResult, BundleStatus, BundleTask, Dispatcher};
pub use error::{BundleError, CacheError, FetchError, StoreError};
pub use fetch::{FetchedModule, HttpFetcher, ModuleFetcher};
pub use loader::{LoadResult, LoaderKind, ModuleLoader};
pub use notebook::Notebook;
pub use serialization::{Manifest, NotebookDir};
pub use store::CellStore;
pub use validation::{ValidationIssue, ValidationResult, ValidationSeverity, Validator};
