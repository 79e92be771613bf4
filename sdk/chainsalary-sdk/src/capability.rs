use crate::core::engine::{FheEngine, KeyPair, NetworkConfig, SimulationConfig};
use crate::error::{Result, SdkError};
use crate::grant::AuthorizationGrant;
use crate::types::{Address, ChainId, DecryptRequest, EncryptedInput, Handle};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Which backend produced the engine. Never visible outside this module.
enum Backend {
    Simulated(SimulationConfig),
    Production(NetworkConfig),
}

struct Inner {
    chain_id: ChainId,
    backend: Backend,
    engine: Arc<dyn FheEngine>,
    identity: String,
}

/// Opaque encrypt/decrypt capability bound to one chain.
///
/// Cloning is cheap and yields the same runtime instance. A rebind produces a
/// new handle; an existing handle is never mutated.
#[derive(Clone)]
pub struct CapabilityHandle {
    inner: Arc<Inner>,
}

impl CapabilityHandle {
    pub(crate) fn simulated(config: SimulationConfig, engine: Arc<dyn FheEngine>) -> Self {
        Self::new(config.chain_id, Backend::Simulated(config), engine)
    }

    pub(crate) fn production(
        chain_id: ChainId,
        config: NetworkConfig,
        engine: Arc<dyn FheEngine>,
    ) -> Self {
        Self::new(chain_id, Backend::Production(config), engine)
    }

    fn new(chain_id: ChainId, backend: Backend, engine: Arc<dyn FheEngine>) -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(chain_id.to_be_bytes());
        hasher.update(engine.network_public_key());
        let identity = hex::encode(hasher.finalize());
        Self {
            inner: Arc::new(Inner {
                chain_id,
                backend,
                engine,
                identity,
            }),
        }
    }

    pub fn chain_id(&self) -> ChainId {
        self.inner.chain_id
    }

    /// Stable identity of the runtime instance: chain id plus network key.
    /// Grants cached under one identity are never served to another.
    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    pub fn gateway_chain_id(&self) -> ChainId {
        match &self.inner.backend {
            Backend::Simulated(c) => c.gateway_chain_id,
            Backend::Production(c) => c.gateway_chain_id,
        }
    }

    /// Contract the decryption service verifies grant signatures against
    pub fn verifying_contract_decryption(&self) -> Address {
        match &self.inner.backend {
            Backend::Simulated(c) => c.verifying_contract_address_decryption,
            Backend::Production(c) => c.verifying_contract_address_decryption,
        }
    }

    pub fn generate_keypair(&self) -> KeyPair {
        self.inner.engine.generate_keypair()
    }

    /// Start an encrypted input for `contract`, bound to `user`
    pub fn create_encrypted_input(&self, contract: Address, user: Address) -> EncryptedInputBuilder<'_> {
        EncryptedInputBuilder {
            capability: self,
            contract,
            user,
            values: Vec::new(),
        }
    }

    pub async fn encrypt(
        &self,
        contract: Address,
        user: Address,
        values: &[u64],
    ) -> Result<EncryptedInput> {
        if values.is_empty() {
            return Err(SdkError::Encryption("nothing to encrypt".to_string()));
        }
        let input = self
            .inner
            .engine
            .encrypt_u64s(contract, user, values)
            .await
            .map_err(|e| SdkError::Encryption(e.to_string()))?;
        if input.handles.len() != values.len() {
            return Err(SdkError::Encryption(format!(
                "engine returned {} handles for {} values",
                input.handles.len(),
                values.len()
            )));
        }
        Ok(input)
    }

    /// Decrypt handles under `grant`. The grant must come from this runtime and cover
    /// every request's contract.
    pub async fn user_decrypt(
        &self,
        requests: &[DecryptRequest],
        grant: &AuthorizationGrant,
    ) -> Result<HashMap<Handle, String>> {
        if !grant.issued_for(self.identity()) {
            return Err(SdkError::Decryption(format!(
                "grant was issued for another runtime, not chain {}",
                self.chain_id()
            )));
        }
        if let Some(outside) = requests
            .iter()
            .find(|r| !grant.contract_addresses.contains(&r.contract_address))
        {
            return Err(SdkError::Decryption(format!(
                "grant does not cover contract {}",
                outside.contract_address
            )));
        }
        let clear = self
            .inner
            .engine
            .user_decrypt(requests, grant)
            .await
            .map_err(|e| SdkError::Decryption(e.to_string()))?;
        if let Some(missing) = requests.iter().find(|r| !clear.contains_key(&r.handle)) {
            return Err(SdkError::Decryption(format!(
                "no plaintext returned for handle {}",
                missing.handle
            )));
        }
        Ok(clear)
    }

    /// Whether both handles refer to the same runtime instance
    pub fn same_instance(&self, other: &CapabilityHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("chain_id", &self.inner.chain_id)
            .field("identity", &self.inner.identity)
            .finish()
    }
}

/// Accumulates plaintext values, then encrypts them in one call
pub struct EncryptedInputBuilder<'a> {
    capability: &'a CapabilityHandle,
    contract: Address,
    user: Address,
    values: Vec<u64>,
}

impl<'a> EncryptedInputBuilder<'a> {
    pub fn add64(mut self, value: u64) -> Self {
        self.values.push(value);
        self
    }

    pub async fn encrypt(self) -> Result<EncryptedInput> {
        self.capability
            .encrypt(self.contract, self.user, &self.values)
            .await
    }
}
