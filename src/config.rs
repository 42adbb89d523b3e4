//! Notebook configuration, read from `notebook.toml`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the configuration inside a notebook directory
pub const CONFIG_FILE: &str = "notebook.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotebookConfig {
    pub bundler: BundlerConfig,
    pub cache: CacheConfig,
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Base URL bare specifiers are joined onto
    pub registry_url: String,
    /// Sentinel path of the entry module
    pub entry_path: String,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            registry_url: "https://unpkg.com/".to_string(),
            entry_path: "index.js".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Persistent cache directory; relative paths are taken from the notebook directory
    pub directory: Option<PathBuf>,
    /// Entries kept in the in-memory tier
    pub memory_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            memory_capacity: 512,
        }
    }
}

impl CacheConfig {
    /// Cache directory for a notebook stored at `notebook_dir`
    pub fn resolve_directory(&self, notebook_dir: &Path) -> PathBuf {
        match &self.directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => notebook_dir.join(dir),
            None => notebook_dir.join(".cache").join("file-cache"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_redirects: 10,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl NotebookConfig {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    /// Load `notebook.toml` from a notebook directory, defaulting when it does not exist
    pub fn load_or_default(notebook_dir: &Path) -> Result<Self> {
        let path = notebook_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path)
    }
}
