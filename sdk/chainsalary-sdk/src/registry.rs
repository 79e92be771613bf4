use crate::core::constants::{
    HARDHAT_CHAIN_ID, HARDHAT_PAYROLL_ADDRESS, SEPOLIA_CHAIN_ID, SEPOLIA_PAYROLL_ADDRESS,
};
use crate::types::{Address, ChainId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the payroll contract is deployed on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub address: Address,
    pub chain_id: ChainId,
    pub chain_name: String,
}

/// Payroll contract address per chain id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentRegistry {
    entries: BTreeMap<String, Deployment>,
}

impl DeploymentRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, deployment: Deployment) {
        self.entries
            .insert(deployment.chain_id.to_string(), deployment);
    }

    /// Deployment on `chain_id`; a zero address counts as not deployed
    pub fn lookup(&self, chain_id: ChainId) -> Option<&Deployment> {
        self.entries
            .get(&chain_id.to_string())
            .filter(|d| !d.address.is_zero())
    }

    pub fn contract_address(&self, chain_id: ChainId) -> Option<Address> {
        self.lookup(chain_id).map(|d| d.address)
    }

    /// Add entries from `other`, replacing existing chain ids
    pub fn merge(&mut self, other: DeploymentRegistry) {
        self.entries.extend(other.entries);
    }
}

impl Default for DeploymentRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.insert(Deployment {
            address: HARDHAT_PAYROLL_ADDRESS,
            chain_id: HARDHAT_CHAIN_ID,
            chain_name: "hardhat".to_string(),
        });
        registry.insert(Deployment {
            address: SEPOLIA_PAYROLL_ADDRESS,
            chain_id: SEPOLIA_CHAIN_ID,
            chain_name: "sepolia".to_string(),
        });
        registry
    }
}
