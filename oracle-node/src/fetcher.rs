//! External Fetcher (§4.8(a)-(b)) and Secret Vault boundary. The HTTP price
//! adapter beyond the dot-path extractor, and the vault's real backend, are
//! both out of scope (SPEC_FULL §D) — each is a trait with a concrete
//! in-process default.

use async_trait::async_trait;
use eyre::{eyre, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value>;
}

pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("reqwest client configuration is always valid"),
        }
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.json::<Value>().await?;
        Ok(body)
    }
}

/// Injects credentials keyed by URL (§4.8(a)). The real backend (e.g. a
/// KMS-backed vault) is out of scope; this in-memory default is a no-op
/// unless secrets were explicitly registered.
#[async_trait]
pub trait SecretVault: Send + Sync {
    async fn credential_for(&self, url: &str) -> Option<String>;
}

#[derive(Default)]
pub struct InMemorySecretVault {
    secrets: RwLock<HashMap<String, String>>,
}

impl InMemorySecretVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: impl Into<String>, credential: impl Into<String>) {
        self.secrets
            .write()
            .expect("secret vault lock poisoned")
            .insert(url.into(), credential.into());
    }
}

#[async_trait]
impl SecretVault for InMemorySecretVault {
    async fn credential_for(&self, url: &str) -> Option<String> {
        self.secrets.read().expect("secret vault lock poisoned").get(url).cloned()
    }
}

/// Fetches with credential injection and bounded linear-backoff retry
/// (default 3 attempts, §4.8(b)).
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    vault: &dyn SecretVault,
    url: &str,
    max_attempts: u32,
) -> Result<Value> {
    let target = match vault.credential_for(url).await {
        Some(token) => format!("{url}{sep}api_key={token}", sep = if url.contains('?') { '&' } else { '?' }),
        None => url.to_string(),
    };

    let mut last_err = None;
    for attempt in 1..=max_attempts {
        match fetcher.fetch_json(&target).await {
            Ok(body) => return Ok(body),
            Err(e) => {
                last_err = Some(e);
                if attempt < max_attempts {
                    tokio::time::sleep(Duration::from_secs(attempt as u64)).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| eyre!("fetch failed with no recorded error")))
}
