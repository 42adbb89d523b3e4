// In-memory module server standing in for the package registry

use async_trait::async_trait;
use cell_notebook::{FetchError, FetchedModule, ModuleFetcher};
use parking_lot::Mutex;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
struct StubModule {
    body: String,
    final_url: Url,
    delay: Duration,
}

/// Serves registered bodies, answers 404 for anything else and counts requests
#[derive(Default)]
pub struct StubFetcher {
    modules: Mutex<HashMap<String, StubModule>>,
    requests: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Serve `body` at `path`, as if no redirect happened
    pub fn serve(&self, path: &str, body: &str) -> &Self {
        self.redirect(path, path, body)
    }

    /// Serve `body` at `path` as if the server redirected to `final_url`
    pub fn redirect(&self, path: &str, final_url: &str, body: &str) -> &Self {
        self.modules.lock().insert(
            path.to_string(),
            StubModule {
                body: body.to_string(),
                final_url: Url::parse(final_url).unwrap(),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Delay every response for `path`
    pub fn delay(&self, path: &str, delay: Duration) -> &Self {
        if let Some(module) = self.modules.lock().get_mut(path) {
            module.delay = delay;
        }
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl ModuleFetcher for StubFetcher {
    async fn fetch(&self, path: &str) -> Result<FetchedModule, FetchError> {
        self.requests.lock().push(path.to_string());
        let module = self.modules.lock().get(path).cloned();

        let Some(module) = module else {
            return Err(FetchError::Status {
                url: path.to_string(),
                status: 404,
            });
        };
        if !module.delay.is_zero() {
            tokio::time::sleep(module.delay).await;
        }
        Ok(FetchedModule {
            body: module.body,
            final_url: module.final_url,
        })
    }
}
