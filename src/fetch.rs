//! Network access for module sources

use crate::config::FetchConfig;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{redirect, Client, Url};
use std::time::Duration;
use tracing::debug;

/// Body of a fetched module together with the URL it was finally served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedModule {
    pub body: String,
    /// URL after following redirects
    pub final_url: Url,
}

/// Source of module text, keyed by an arbitrary request path
#[async_trait]
pub trait ModuleFetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<FetchedModule, FetchError>;
}

/// HTTP GET fetcher. Any 2xx response with a text body is a success.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::transport("<client>", e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ModuleFetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<FetchedModule, FetchError> {
        let url = Url::parse(path).map_err(|_| FetchError::InvalidUrl(path.to_string()))?;

        debug!(%url, "fetching module");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(path, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: path.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::transport(path, e.to_string()))?;

        debug!(%final_url, bytes = body.len(), "fetched module");
        Ok(FetchedModule { body, final_url })
    }
}
