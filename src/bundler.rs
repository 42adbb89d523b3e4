//! Bundling engine: turns one cell's source into a single executable program

use crate::cache::ModuleCache;
use crate::config::BundlerConfig;
use crate::emit::{emit_bundle, transform_module, CompiledModule};
use crate::fetch::ModuleFetcher;
use crate::loader::ModuleLoader;
use crate::resolve::{registry_url, resolve_specifier};
use crate::scan::ParsedModule;
use crate::BundleError;
use indexmap::IndexMap;
use reqwest::Url;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Outcome of one bundle run
pub type BundleOutcome = Result<String, BundleError>;

/// Walks the import graph of an entry source and emits one program
pub struct Bundler {
    loader: ModuleLoader,
    registry: Url,
}

impl Bundler {
    pub fn new(
        cache: Arc<ModuleCache>,
        fetcher: Arc<dyn ModuleFetcher>,
        config: &BundlerConfig,
    ) -> Result<Self, BundleError> {
        Ok(Self {
            loader: ModuleLoader::new(cache, fetcher, config.entry_path.clone()),
            registry: registry_url(&config.registry_url)?,
        })
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    pub fn registry(&self) -> &Url {
        &self.registry
    }

    /// Bundle `entry_source`, fetching every module it reaches.
    ///
    /// The first resolution or compile failure ends the run. Modules are
    /// loaded once per run even when imported from several places, and import
    /// cycles terminate.
    #[instrument(skip_all, fields(bytes = entry_source.len()))]
    pub async fn bundle(&self, entry_source: &str) -> BundleOutcome {
        let started = Instant::now();
        let mut session = self.loader.session(entry_source);
        let mut graph: IndexMap<String, CompiledModule> = IndexMap::new();
        let mut queue = VecDeque::from([self.loader.entry_path().to_string()]);

        while let Some(path) = queue.pop_front() {
            if graph.contains_key(&path) {
                continue;
            }

            let loaded = session.load(&path).await?;
            let (specifiers, body) = compile(&path, &loaded.contents)?;

            let mut deps = IndexMap::new();
            for specifier in specifiers {
                let resolved =
                    resolve_specifier(&specifier, loaded.resolve_dir.as_deref(), &self.registry)?;
                debug!(from = %path, %specifier, %resolved, "resolved import");
                if !graph.contains_key(&resolved) {
                    queue.push_back(resolved.clone());
                }
                deps.insert(specifier, resolved);
            }

            graph.insert(path, CompiledModule { body, deps });
        }

        let code = emit_bundle(self.loader.entry_path(), &graph);
        info!(
            modules = graph.len(),
            fetches = session.fetches(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "bundle complete"
        );
        Ok(code)
    }
}

/// Parse one module; returns its specifiers and rewritten body
fn compile(path: &str, source: &str) -> Result<(Vec<String>, String), BundleError> {
    let module = ParsedModule::parse(path, source)?;
    let specifiers = module
        .syntax()
        .specifiers()
        .into_iter()
        .map(String::from)
        .collect();
    Ok((specifiers, transform_module(&module)))
}
