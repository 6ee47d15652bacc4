use crate::error::CliError;
use async_trait::async_trait;
use connectors::elastic::ElasticStore;
use tracing::{error, info};

/// Trait for "pinging" a document store
#[async_trait]
pub trait ConnectionPinger {
    /// Attempts to ping; returns Err if unreachable
    async fn ping(&self) -> Result<(), CliError>;
}

/// Elasticsearch pinger
pub struct ElasticPinger {
    pub url: String,
}

#[async_trait]
impl ConnectionPinger for ElasticPinger {
    async fn ping(&self) -> Result<(), CliError> {
        info!("Pinging document store at '{}'", &self.url);

        let store = ElasticStore::new(&self.url)?;
        let cluster = store.ping().await.map_err(|e| {
            error!("Document store at '{}' is unreachable: {}", &self.url, e);
            CliError::Store(e)
        })?;

        info!(
            cluster = %cluster.cluster_name,
            node = %cluster.name,
            version = %cluster.version.number,
            "Ping to '{}' succeeded",
            &self.url
        );
        Ok(())
    }
}
