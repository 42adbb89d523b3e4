use crate::bundler::Bundler;
use crate::cache::ModuleCache;
use crate::config::NotebookConfig;
use crate::dispatch::{BundleTask, Dispatcher};
use crate::fetch::{HttpFetcher, ModuleFetcher};
use crate::{Action, ActionRecord, CellCollection, CellId, CellStore, StoreError};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

/// A cell store paired with the dispatcher that bundles its code cells
pub struct Notebook {
    store: CellStore,
    dispatcher: Dispatcher,
    events: broadcast::Receiver<ActionRecord>,
}

impl Notebook {
    pub fn new(store: CellStore, dispatcher: Dispatcher) -> Self {
        let events = dispatcher.subscribe();
        Self {
            store,
            dispatcher,
            events,
        }
    }

    /// Build a notebook over `collection` with the network fetcher and a
    /// cache under `notebook_dir`
    pub fn with_config(
        collection: CellCollection,
        config: &NotebookConfig,
        notebook_dir: &Path,
    ) -> Result<Self> {
        let fetcher = HttpFetcher::new(&config.fetch).context("Failed to create HTTP client")?;
        Self::with_fetcher(collection, config, notebook_dir, Arc::new(fetcher))
    }

    /// Same as [`Notebook::with_config`] with a caller-provided fetcher
    pub fn with_fetcher(
        collection: CellCollection,
        config: &NotebookConfig,
        notebook_dir: &Path,
        fetcher: Arc<dyn ModuleFetcher>,
    ) -> Result<Self> {
        let cache = ModuleCache::open(
            config.cache.resolve_directory(notebook_dir),
            config.cache.memory_capacity,
        );
        let bundler = Bundler::new(Arc::new(cache), fetcher, &config.bundler)
            .context("Invalid bundler configuration")?;

        Ok(Self::new(
            CellStore::from_collection(collection),
            Dispatcher::new(Arc::new(bundler)),
        ))
    }

    pub fn store(&self) -> &CellStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut CellStore {
        &mut self.store
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Apply a store action. Deleting a cell also drops its bundle state.
    pub fn apply(&mut self, action: Action) -> Result<Option<CellId>, StoreError> {
        if let Action::DeleteCell { id } = &action {
            self.dispatcher.forget(id.as_str());
        }
        self.store.dispatch(action)
    }

    /// Bundle the current content of a code cell
    pub fn bundle_cell(&self, id: &str) -> Result<BundleTask, StoreError> {
        let cell = self
            .store
            .get(id)
            .ok_or_else(|| StoreError::CellNotFound(CellId::from(id)))?;
        if !cell.is_code() {
            return Err(StoreError::NotACodeCell(cell.id.clone()));
        }
        Ok(self
            .dispatcher
            .start_bundle(cell.id.clone(), cell.content.clone()))
    }

    /// Bundle every code cell, in order
    pub fn bundle_all(&self) -> Vec<BundleTask> {
        let snapshot = self.store.snapshot();
        snapshot
            .cells()
            .filter(|cell| cell.is_code())
            .map(|cell| self.dispatcher.start_bundle(cell.id.clone(), cell.content.clone()))
            .collect()
    }

    /// Take store actions and dispatch events recorded so far, oldest first
    pub fn drain_history(&mut self) -> Vec<ActionRecord> {
        let mut records = self.store.drain_history();
        loop {
            match self.events.try_recv() {
                Ok(record) => records.push(record),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "dispatch events dropped from history");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        records.sort_by_key(|record| record.timestamp);
        records
    }
}
