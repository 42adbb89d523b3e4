use crate::cache::ModuleCache;
use crate::fetch::ModuleFetcher;
use crate::BundleError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// How a module's contents are to be compiled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoaderKind {
    Js,
    /// Script with embedded markup
    Jsx,
}

/// Source text plus the metadata needed to resolve further imports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResult {
    pub loader: LoaderKind,
    pub contents: String,
    /// Directory URL that relative imports inside this module resolve against
    pub resolve_dir: Option<String>,
}

impl LoadResult {
    /// Load result for the virtual entry module
    pub fn entry(source: &str) -> Self {
        Self {
            loader: LoaderKind::Jsx,
            contents: source.to_string(),
            resolve_dir: None,
        }
    }
}

/// Turns request paths into module sources, consulting the cache before the network
pub struct ModuleLoader {
    cache: Arc<ModuleCache>,
    fetcher: Arc<dyn ModuleFetcher>,
    entry_path: String,
}

impl ModuleLoader {
    pub fn new(
        cache: Arc<ModuleCache>,
        fetcher: Arc<dyn ModuleFetcher>,
        entry_path: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            fetcher,
            entry_path: entry_path.into(),
        }
    }

    /// Sentinel path of the virtual entry module
    pub fn entry_path(&self) -> &str {
        &self.entry_path
    }

    pub fn cache(&self) -> &Arc<ModuleCache> {
        &self.cache
    }

    /// Start a bundle run over `entry_source`
    pub fn session<'a>(&'a self, entry_source: &'a str) -> LoadSession<'a> {
        LoadSession {
            loader: self,
            entry_source,
            loaded: HashMap::new(),
            fetches: 0,
        }
    }

    async fn load_remote(&self, path: &str) -> Result<(Arc<LoadResult>, bool), BundleError> {
        if let Some(cached) = self.cache.get(path).await {
            return Ok((cached, false));
        }

        let fetched = self
            .fetcher
            .fetch(path)
            .await
            .map_err(|e| BundleError::resolution(path, e))?;

        let resolve_dir = fetched
            .final_url
            .join("./")
            .map(|dir| dir.to_string())
            .unwrap_or_else(|_| fetched.final_url.to_string());

        let result = Arc::new(LoadResult {
            loader: LoaderKind::Jsx,
            contents: fetched.body,
            resolve_dir: Some(resolve_dir),
        });

        if let Err(e) = self.cache.set(path, Arc::clone(&result)).await {
            // The module is still usable for this run
            warn!(path, error = %e, "failed to cache module");
        }
        Ok((result, true))
    }
}

/// Per-run loader state: each distinct path is loaded at most once per run
pub struct LoadSession<'a> {
    loader: &'a ModuleLoader,
    entry_source: &'a str,
    loaded: HashMap<String, Arc<LoadResult>>,
    fetches: usize,
}

impl LoadSession<'_> {
    /// Resolve one request path to its source
    pub async fn load(&mut self, path: &str) -> Result<Arc<LoadResult>, BundleError> {
        if let Some(loaded) = self.loaded.get(path) {
            return Ok(Arc::clone(loaded));
        }

        let result = if path == self.loader.entry_path {
            Arc::new(LoadResult::entry(self.entry_source))
        } else {
            let (result, fetched) = self.loader.load_remote(path).await?;
            if fetched {
                self.fetches += 1;
            }
            result
        };

        debug!(path, bytes = result.contents.len(), "module loaded");
        self.loaded.insert(path.to_string(), Arc::clone(&result));
        Ok(result)
    }

    /// Network fetches performed by this run
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    /// Distinct paths loaded by this run
    pub fn loaded(&self) -> usize {
        self.loaded.len()
    }
}
