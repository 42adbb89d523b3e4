// Helper functions to build notebooks and bundlers for tests

use cell_notebook::config::BundlerConfig;
use cell_notebook::{
    Bundler, CellCollection, CellId, CellStore, CellType, Dispatcher, ModuleCache, ModuleFetcher,
};
use std::path::Path;
use std::sync::Arc;

/// Build a collection holding `cells` in order; returns it with the assigned ids
pub fn notebook_with(cells: &[(CellType, &str)]) -> (CellCollection, Vec<CellId>) {
    let mut store = CellStore::from_collection(CellCollection::new());
    let ids = cells
        .iter()
        .map(|(cell_type, content)| {
            // A missing anchor on insert-before appends
            let id = store.insert_cell_before(None, *cell_type);
            store.update_cell(id.as_str(), *content).unwrap();
            id
        })
        .collect();
    (store.snapshot().as_ref().clone(), ids)
}

/// A code cell importing a package, a text cell and a plain code cell
pub fn mixed_notebook() -> (CellCollection, Vec<CellId>) {
    notebook_with(&[
        (CellType::Code, "import tiny from 'tiny';\nconsole.log(tiny);"),
        (CellType::Text, "Notes about the code above"),
        (CellType::Code, "const answer = 42;"),
    ])
}

pub fn memory_bundler(fetcher: Arc<dyn ModuleFetcher>) -> Bundler {
    Bundler::new(
        Arc::new(ModuleCache::in_memory(64)),
        fetcher,
        &BundlerConfig::default(),
    )
    .unwrap()
}

pub fn disk_bundler(fetcher: Arc<dyn ModuleFetcher>, cache_dir: &Path) -> Bundler {
    Bundler::new(
        Arc::new(ModuleCache::open(cache_dir, 64)),
        fetcher,
        &BundlerConfig::default(),
    )
    .unwrap()
}

pub fn dispatcher(fetcher: Arc<dyn ModuleFetcher>) -> Dispatcher {
    Dispatcher::new(Arc::new(memory_bundler(fetcher)))
}
