use crate::core::constants::{
    DEFAULT_FUND_GAS_LIMIT, DEFAULT_GRANT_DURATION_DAYS, GATEWAY_CHAIN_ID, HARDHAT_CHAIN_ID,
    HARDHAT_RPC_URL,
};
use crate::error::{Result, SdkError};
use crate::registry::DeploymentRegistry;
use crate::types::ChainId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// SDK configuration. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SdkConfig {
    /// Chains served by a local simulation node, with the node's RPC URL.
    /// Merged over the built-in hardhat entry.
    pub simulation_chains: BTreeMap<ChainId, String>,
    pub gateway_chain_id: ChainId,
    pub grant_duration_days: u64,
    /// Extra deployments, merged over the built-in registry
    pub deployments: DeploymentRegistry,
    pub fund_gas_limit: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            simulation_chains: BTreeMap::new(),
            gateway_chain_id: GATEWAY_CHAIN_ID,
            grant_duration_days: DEFAULT_GRANT_DURATION_DAYS,
            deployments: DeploymentRegistry::empty(),
            fund_gas_limit: DEFAULT_FUND_GAS_LIMIT,
        }
    }
}

impl SdkConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SdkConfig =
            serde_json::from_str(json).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grant_duration_days == 0 {
            return Err(SdkError::Config("grantDurationDays must be positive".into()));
        }
        if let Some(id) = self.simulation_chains.keys().find(|id| **id == 0) {
            return Err(SdkError::Config(format!("invalid simulation chain id {id}")));
        }
        Ok(())
    }

    /// Built-in simulation chains overlaid with configured ones
    pub fn effective_simulation_chains(&self) -> BTreeMap<ChainId, String> {
        let mut chains = BTreeMap::from([(HARDHAT_CHAIN_ID, HARDHAT_RPC_URL.to_string())]);
        chains.extend(self.simulation_chains.clone());
        chains
    }

    /// Built-in registry overlaid with configured deployments. The payroll
    /// ledger for a chain is bound at the address this registry returns.
    pub fn effective_deployments(&self) -> DeploymentRegistry {
        let mut registry = DeploymentRegistry::default();
        registry.merge(self.deployments.clone());
        registry
    }
}
