//! Chain handle shared by every operation, and the session that swaps it

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::Context as _;

use crate::config::NetworkConfig;
use crate::core::{Error, Result, RpcResultExt};
use crate::infrastructure::abi::AbiResolver;
use crate::infrastructure::ethereum::{create_provider, ChainClient, ProviderConfig};
use crate::infrastructure::indexer::{EtherscanClient, IndexerClient};

/// Everything an operation needs to talk to one network
///
/// Operations clone the `Arc<ChainHandle>` at their start and keep using it
/// until they finish, even if the session switches networks meanwhile.
pub struct ChainHandle {
    pub network: NetworkConfig,
    pub client: Arc<dyn ChainClient>,
    pub indexer: Option<Arc<dyn IndexerClient>>,
    pub resolver: Option<Arc<AbiResolver>>,
    generation: u64,
}

impl ChainHandle {
    pub fn new(network: NetworkConfig, client: Arc<dyn ChainClient>) -> Self {
        Self {
            network,
            client,
            indexer: None,
            resolver: None,
            generation: 0,
        }
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn IndexerClient>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<AbiResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Build the live clients for a network; `rpc_override` replaces the configured URL
    pub async fn connect(mut network: NetworkConfig, rpc_override: Option<String>) -> anyhow::Result<Self> {
        if let Some(rpc) = rpc_override {
            network.rpc = rpc;
        }

        let provider = create_provider(ProviderConfig::from_url(&network.rpc))
            .await
            .with_context(|| format!("Failed to connect to {}", network.rpc))?;

        let indexer = network.indexer_url.clone().map(|url| {
            Arc::new(EtherscanClient::new(url, network.indexer_key(), network.chain_id))
                as Arc<dyn IndexerClient>
        });

        tracing::info!(
            network = %network.name,
            rpc = %network.rpc,
            indexer = indexer.is_some(),
            "connected"
        );

        Ok(Self {
            network,
            client: Arc::new(provider),
            indexer,
            resolver: Some(Arc::new(AbiResolver::new())),
            generation: 0,
        })
    }

    /// Configured chain id, or `eth_chainId` when the config does not pin one
    pub async fn chain_id(&self) -> Result<u64> {
        match self.network.chain_id {
            Some(chain_id) => Ok(chain_id),
            None => self.client.chain_id().await.map_rpc(),
        }
    }

    /// `eth_chainId` from the endpoint, ignoring the configured value
    ///
    /// Anything that gets signed uses this; a configured id that disagrees
    /// (e.g. a preset with `--rpc` pointing elsewhere) is only logged.
    pub async fn node_chain_id(&self) -> Result<u64> {
        let chain_id = self.client.chain_id().await.map_rpc()?;
        if let Some(configured) = self.network.chain_id.filter(|c| *c != chain_id) {
            tracing::warn!(
                network = %self.network.name,
                configured,
                node = chain_id,
                "configured chain id differs from the node, using the node's"
            );
        }
        Ok(chain_id)
    }

    pub fn indexer(&self) -> Result<&dyn IndexerClient> {
        self.indexer.as_deref().ok_or_else(|| {
            Error::NotFound(format!(
                "no indexing API configured for network '{}'",
                self.network.name
            ))
        })
    }

    pub fn name(&self) -> &str {
        &self.network.name
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Holds the current network; a switch replaces the handle wholesale
pub struct Session {
    current: RwLock<Arc<ChainHandle>>,
    next_generation: AtomicU64,
}

impl Session {
    pub fn new(handle: ChainHandle) -> Self {
        Self {
            current: RwLock::new(Arc::new(handle)),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Snapshot of the current handle
    pub fn handle(&self) -> Arc<ChainHandle> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the current network; in-flight operations keep their old handle
    pub fn switch(&self, mut handle: ChainHandle) -> Arc<ChainHandle> {
        handle.generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let handle = Arc::new(handle);
        tracing::info!(network = %handle.network.name, generation = handle.generation, "network switched");
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = handle.clone();
        handle
    }

    /// Whether results computed with `handle` still belong to the current network
    pub fn is_current(&self, handle: &ChainHandle) -> bool {
        self.handle().generation == handle.generation
    }
}
