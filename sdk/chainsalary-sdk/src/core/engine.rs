//! Interfaces to the external encryption scheme.
//!
//! The SDK never implements the scheme itself. A simulated engine is built by a
//! [`SimulationFactory`] against a local node; a production engine comes from a
//! dynamically loaded [`ProductionSdk`].

use crate::core::connection::{ChainConnection, RpcConnection};
use crate::error::BoxError;
use crate::grant::AuthorizationGrant;
use crate::types::{Address, ChainId, DecryptRequest, EncryptedInput, Handle};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Ephemeral key pair used to re-encrypt decryption results for one user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

/// A constructed encryption engine
#[async_trait]
pub trait FheEngine: Send + Sync {
    /// Network public key; stable for one deployment of the scheme
    fn network_public_key(&self) -> Vec<u8>;

    fn generate_keypair(&self) -> KeyPair;

    /// Encrypt 64-bit values for `contract`, bound to `user`
    async fn encrypt_u64s(
        &self,
        contract: Address,
        user: Address,
        values: &[u64],
    ) -> Result<EncryptedInput, BoxError>;

    /// Decrypt handles the grant entitles its signer to see
    async fn user_decrypt(
        &self,
        requests: &[DecryptRequest],
        grant: &AuthorizationGrant,
    ) -> Result<HashMap<Handle, String>, BoxError>;
}

/// Contract wiring of a simulated runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    pub acl_contract_address: Address,
    pub chain_id: ChainId,
    pub gateway_chain_id: ChainId,
    pub input_verifier_contract_address: Address,
    pub kms_contract_address: Address,
    pub verifying_contract_address_decryption: Address,
    pub verifying_contract_address_input_verification: Address,
}

/// Builds a simulated engine that talks to a local development node
#[async_trait]
pub trait SimulationFactory: Send + Sync {
    async fn create(
        &self,
        rpc: Arc<dyn RpcConnection>,
        config: &SimulationConfig,
    ) -> Result<Arc<dyn FheEngine>, BoxError>;
}

/// Production network parameters, as shipped by the SDK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub acl_contract_address: Address,
    pub kms_contract_address: Address,
    pub input_verifier_contract_address: Address,
    pub verifying_contract_address_decryption: Address,
    pub verifying_contract_address_input_verification: Address,
    pub chain_id: ChainId,
    pub gateway_chain_id: ChainId,
    pub relayer_url: String,
}

/// Network defaults merged with the caller's connection
#[derive(Debug, Clone)]
pub struct ProductionConfig {
    pub network_config: NetworkConfig,
    pub network: ChainConnection,
}

/// Entry points the production SDK can be loaded from.
/// Both expose the same capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdkEntryPoint {
    Web,
    Bundle,
}

impl SdkEntryPoint {
    /// Try order: primary first, then fallback
    pub const ORDER: [SdkEntryPoint; 2] = [SdkEntryPoint::Web, SdkEntryPoint::Bundle];
}

impl fmt::Display for SdkEntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdkEntryPoint::Web => f.write_str("web"),
            SdkEntryPoint::Bundle => f.write_str("bundle"),
        }
    }
}

/// A loaded production SDK namespace
#[async_trait]
pub trait ProductionSdk: Send + Sync {
    /// Self-initialization; `Ok(false)` means the SDK reported failure
    async fn init_sdk(&self) -> Result<bool, BoxError>;

    /// Network configuration bundled with the SDK, if any
    fn default_network_config(&self) -> Option<NetworkConfig>;

    async fn create_instance(
        &self,
        config: ProductionConfig,
    ) -> Result<Arc<dyn FheEngine>, BoxError>;
}

/// Resolves the production SDK namespace from an entry point
#[async_trait]
pub trait SdkLoader: Send + Sync {
    async fn load(&self, entry: SdkEntryPoint) -> Result<Arc<dyn ProductionSdk>, BoxError>;
}
