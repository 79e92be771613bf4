use crate::capability::CapabilityHandle;
use crate::config::SdkConfig;
use crate::core::connection::{parse_chain_id, ChainConnection, RpcConnection};
use crate::core::constants::{
    sepolia_network_config, CLIENT_VERSION_METHOD, PLACEHOLDER_ACL, PLACEHOLDER_INPUT_VERIFIER,
    PLACEHOLDER_KMS, PLACEHOLDER_VERIFYING_CONTRACT_DECRYPTION,
    PLACEHOLDER_VERIFYING_CONTRACT_INPUT_VERIFICATION, RELAYER_METADATA_METHOD,
    SIMULATION_CLIENT_MARKER, SIM_VERIFYING_CONTRACT_DECRYPTION,
    SIM_VERIFYING_CONTRACT_INPUT_VERIFICATION,
};
use crate::core::engine::{
    ProductionConfig, ProductionSdk, SdkEntryPoint, SdkLoader, SimulationConfig,
    SimulationFactory,
};
use crate::core::host::HostEnvironment;
use crate::error::{Result, SdkError};
use crate::types::{Address, ChainId};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Contract addresses reported by a simulation node
#[derive(Debug, Clone, PartialEq, Eq)]
struct SimulationMetadata {
    acl: Address,
    input_verifier: Address,
    kms: Address,
}

impl SimulationMetadata {
    fn from_value(value: &Value) -> Option<Self> {
        let field = |name: &str| value.get(name)?.as_str()?.parse::<Address>().ok();
        Some(Self {
            acl: field("ACLAddress")?,
            input_verifier: field("InputVerifierAddress")?,
            kms: field("KMSVerifierAddress")?,
        })
    }
}

/// Picks and constructs the encrypted-value backend for a connection.
///
/// Chains listed as simulation chains get a simulated runtime against a local
/// node; every other chain gets the production runtime, which needs an
/// interactive host.
pub struct RuntimeResolver {
    host: Arc<dyn HostEnvironment>,
    simulation: Arc<dyn SimulationFactory>,
    sdk_loader: Option<Arc<dyn SdkLoader>>,
    simulation_chains: BTreeMap<ChainId, String>,
    gateway_chain_id: ChainId,
}

impl RuntimeResolver {
    pub fn new(
        host: Arc<dyn HostEnvironment>,
        simulation: Arc<dyn SimulationFactory>,
        config: &SdkConfig,
    ) -> Self {
        Self {
            host,
            simulation,
            sdk_loader: None,
            simulation_chains: config.effective_simulation_chains(),
            gateway_chain_id: config.gateway_chain_id,
        }
    }

    pub fn with_sdk_loader(mut self, loader: Arc<dyn SdkLoader>) -> Self {
        self.sdk_loader = Some(loader);
        self
    }

    pub fn is_simulation_chain(&self, chain_id: ChainId) -> bool {
        self.simulation_chains.contains_key(&chain_id)
    }

    /// Chain id of `connection`: `eth_chainId` for a wallet, network metadata for a URL
    pub async fn chain_id(&self, connection: &ChainConnection) -> Result<ChainId> {
        match connection {
            ChainConnection::Injected(provider) => {
                let raw = provider
                    .request("eth_chainId", json!([]))
                    .await
                    .map_err(|e| SdkError::Connection(e.to_string()))?;
                parse_chain_id(&raw).ok_or_else(|| {
                    SdkError::Connection(format!("unexpected eth_chainId result {raw}"))
                })
            },
            ChainConnection::Url(url) => {
                let rpc = self.open_rpc(url).await?;
                rpc.chain_id()
                    .await
                    .map_err(|e| SdkError::Connection(e.to_string()))
            },
        }
    }

    /// Build the capability for `connection`. No retries: one failed attempt is one error.
    pub async fn resolve(&self, connection: &ChainConnection) -> Result<CapabilityHandle> {
        let chain_id = self.chain_id(connection).await?;

        if let Some(endpoint) = self.simulation_chains.get(&chain_id) {
            let url = connection.url().unwrap_or(endpoint.as_str()).to_string();
            info!(chain_id, %url, "resolving simulated runtime");
            return self.resolve_simulated(chain_id, &url).await;
        }

        info!(chain_id, "resolving production runtime");
        self.resolve_production(chain_id, connection).await
    }

    async fn open_rpc(&self, url: &str) -> Result<Arc<dyn RpcConnection>> {
        if !self.host.can_open_connections() {
            return Err(SdkError::Environment(
                "host cannot open network connections".to_string(),
            ));
        }
        self.host
            .open_rpc(url)
            .await
            .map_err(|e| SdkError::Bootstrap(format!("cannot connect to {url}: {e}")))
    }

    async fn resolve_simulated(&self, chain_id: ChainId, url: &str) -> Result<CapabilityHandle> {
        let rpc = self.open_rpc(url).await?;
        let config = self.discover_simulation_config(rpc.as_ref(), chain_id).await;
        let engine = self
            .simulation
            .create(rpc, &config)
            .await
            .map_err(|e| SdkError::Bootstrap(format!("simulated runtime: {e}")))?;
        Ok(CapabilityHandle::simulated(config, engine))
    }

    /// Query the node and read its metadata. Never fails: any query problem
    /// falls back to placeholder contracts so local development still works.
    async fn discover_simulation_config(
        &self,
        rpc: &dyn RpcConnection,
        chain_id: ChainId,
    ) -> SimulationConfig {
        match query_metadata(rpc).await {
            Some(meta) => {
                debug!(chain_id, acl = %meta.acl, "using simulation node metadata");
                SimulationConfig {
                    acl_contract_address: meta.acl,
                    chain_id,
                    gateway_chain_id: self.gateway_chain_id,
                    input_verifier_contract_address: meta.input_verifier,
                    kms_contract_address: meta.kms,
                    verifying_contract_address_decryption: SIM_VERIFYING_CONTRACT_DECRYPTION,
                    verifying_contract_address_input_verification:
                        SIM_VERIFYING_CONTRACT_INPUT_VERIFICATION,
                }
            },
            None => {
                warn!(chain_id, "no simulation metadata, using placeholder contracts");
                SimulationConfig {
                    acl_contract_address: PLACEHOLDER_ACL,
                    chain_id,
                    gateway_chain_id: self.gateway_chain_id,
                    input_verifier_contract_address: PLACEHOLDER_INPUT_VERIFIER,
                    kms_contract_address: PLACEHOLDER_KMS,
                    verifying_contract_address_decryption:
                        PLACEHOLDER_VERIFYING_CONTRACT_DECRYPTION,
                    verifying_contract_address_input_verification:
                        PLACEHOLDER_VERIFYING_CONTRACT_INPUT_VERIFICATION,
                }
            },
        }
    }

    async fn resolve_production(
        &self,
        chain_id: ChainId,
        connection: &ChainConnection,
    ) -> Result<CapabilityHandle> {
        if !self.host.can_prompt_signatures() {
            return Err(SdkError::Environment(format!(
                "chain {chain_id} needs an interactive signing context"
            )));
        }
        let sdk = self.load_sdk().await?;

        match sdk.init_sdk().await {
            Ok(true) => {},
            Ok(false) => return Err(SdkError::Initialization("initSDK failed".to_string())),
            Err(e) => return Err(SdkError::Initialization(e.to_string())),
        }

        let network_config = sdk
            .default_network_config()
            .unwrap_or_else(sepolia_network_config);
        let engine = sdk
            .create_instance(ProductionConfig {
                network_config: network_config.clone(),
                network: connection.clone(),
            })
            .await
            .map_err(|e| SdkError::Bootstrap(format!("production runtime: {e}")))?;
        Ok(CapabilityHandle::production(chain_id, network_config, engine))
    }

    /// Primary entry point first, bundle as fallback
    async fn load_sdk(&self) -> Result<Arc<dyn ProductionSdk>> {
        let loader = self.sdk_loader.as_ref().ok_or_else(|| {
            SdkError::Bootstrap("no production SDK loader configured".to_string())
        })?;
        let mut last_error = None;
        for entry in SdkEntryPoint::ORDER {
            match loader.load(entry).await {
                Ok(sdk) => return Ok(sdk),
                Err(e) => {
                    debug!(%entry, error = %e, "SDK entry point unavailable");
                    last_error = Some(format!("{entry}: {e}"));
                },
            }
        }
        Err(SdkError::Bootstrap(format!(
            "production SDK could not be loaded ({})",
            last_error.unwrap_or_default()
        )))
    }
}

async fn query_metadata(rpc: &dyn RpcConnection) -> Option<SimulationMetadata> {
    let version = match rpc.send(CLIENT_VERSION_METHOD, json!([])).await {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "client version query failed");
            return None;
        },
    };
    let is_simulation_client = version
        .as_str()
        .map(|v| v.to_lowercase().contains(SIMULATION_CLIENT_MARKER))
        .unwrap_or(false);
    if !is_simulation_client {
        debug!(%version, "endpoint is not a simulation client");
        return None;
    }
    match rpc.send(RELAYER_METADATA_METHOD, json!([])).await {
        Ok(meta) => SimulationMetadata::from_value(&meta),
        Err(e) => {
            debug!(error = %e, "metadata query failed");
            None
        },
    }
}
