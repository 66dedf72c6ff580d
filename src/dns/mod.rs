//! TXT record lookups for domain ownership checks

use crate::error::{AppError, Result};
use async_trait::async_trait;
use hickory_resolver::{config::ResolverConfig, name_server::TokioConnectionProvider, Resolver};

/// Resolves the TXT strings published at a DNS name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TxtResolver: Send + Sync {
    /// One string per TXT record; multi-chunk records are joined.
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>>;
}

/// System-configured resolver backed by hickory.
#[derive(Clone)]
pub struct HickoryTxtResolver {
    resolver: Resolver<TokioConnectionProvider>,
}

impl HickoryTxtResolver {
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        let resolver =
            Resolver::builder_with_config(config, TokioConnectionProvider::default()).build();
        Self { resolver }
    }
}

impl Default for HickoryTxtResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TxtResolver for HickoryTxtResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>> {
        let lookup = self.resolver.txt_lookup(name).await.map_err(|e| {
            AppError::Internal(anyhow::anyhow!("TXT lookup for {} failed: {}", name, e))
        })?;

        Ok(lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk))
                    .collect::<String>()
            })
            .collect())
    }
}

/// Name of the TXT record a tenant publishes to prove ownership of `domain`.
pub fn challenge_record_name(prefix: &str, domain: &str) -> String {
    format!("{}.{}", prefix, domain)
}
