//! Signed, time-bounded decryption grants.
//!
//! A grant binds an ephemeral key pair to a wallet and an exact set of
//! contracts. The wallet signs it once; the grant is then cached in the
//! caller's [`GrantStorage`] and reused until it expires.

use crate::capability::CapabilityHandle;
use crate::config::SdkConfig;
use crate::core::clock::Clock;
use crate::core::constants::SECONDS_PER_DAY;
use crate::core::signer::TypedDataSigner;
use crate::core::storage::GrantStorage;
use crate::error::{Result, SdkError};
use crate::types::{Address, ChainId};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub const GRANT_KEY_PREFIX: &str = "chainsalary.grant.";

const PRIMARY_TYPE: &str = "UserDecryptRequestVerification";

/// EIP-712 payload the wallet signs. `types` does not include `EIP712Domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip712TypedData {
    pub domain: Value,
    pub types: Value,
    pub primary_type: String,
    pub message: Value,
}

impl Eip712TypedData {
    pub fn user_decrypt(
        gateway_chain_id: ChainId,
        verifying_contract: Address,
        public_key: &str,
        contract_addresses: &[Address],
        start_timestamp: u64,
        duration_days: u64,
    ) -> Self {
        let contracts: Vec<String> = contract_addresses.iter().map(|a| a.to_string()).collect();
        let mut types = serde_json::Map::new();
        types.insert(
            PRIMARY_TYPE.to_string(),
            json!([
                { "name": "publicKey", "type": "bytes" },
                { "name": "contractAddresses", "type": "address[]" },
                { "name": "startTimestamp", "type": "uint256" },
                { "name": "durationDays", "type": "uint256" },
                { "name": "extraData", "type": "bytes" },
            ]),
        );
        Self {
            domain: json!({
                "name": "Decryption",
                "version": "1",
                "chainId": gateway_chain_id,
                "verifyingContract": verifying_contract.to_string(),
            }),
            types: Value::Object(types),
            primary_type: PRIMARY_TYPE.to_string(),
            message: json!({
                "publicKey": with_hex_prefix(public_key),
                "contractAddresses": contracts,
                "startTimestamp": start_timestamp.to_string(),
                "durationDays": duration_days.to_string(),
                "extraData": "0x00",
            }),
        }
    }
}

/// Proof that `user_address` consented to decrypt values of `contract_addresses`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationGrant {
    pub public_key: String,
    pub private_key: String,
    pub signature: String,
    pub user_address: Address,
    /// Sorted, no duplicates
    pub contract_addresses: Vec<Address>,
    pub start_timestamp: u64,
    pub duration_days: u64,
    /// [`CapabilityHandle::identity`] of the runtime the grant was signed through
    pub runtime_identity: String,
    pub eip712: Eip712TypedData,
}

impl fmt::Debug for AuthorizationGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationGrant")
            .field("public_key", &self.public_key)
            .field("signature", &self.signature)
            .field("user_address", &self.user_address)
            .field("contract_addresses", &self.contract_addresses)
            .field("start_timestamp", &self.start_timestamp)
            .field("duration_days", &self.duration_days)
            .field("runtime_identity", &self.runtime_identity)
            .finish_non_exhaustive()
    }
}

impl AuthorizationGrant {
    pub fn expires_at(&self) -> u64 {
        self.start_timestamp
            .saturating_add(self.duration_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at()
    }

    /// Structural checks plus binding to `user` and exactly `contracts`.
    /// Expiry is checked separately with [`is_valid_at`](Self::is_valid_at).
    pub fn validate_binding(&self, user: Address, contracts: &BTreeSet<Address>) -> Result<()> {
        if !is_well_formed_signature(&self.signature) {
            return Err(SdkError::MalformedGrant("signature is not 65 hex bytes".into()));
        }
        if self.public_key.is_empty() || self.private_key.is_empty() {
            return Err(SdkError::MalformedGrant("missing key material".into()));
        }
        if self.duration_days == 0 {
            return Err(SdkError::MalformedGrant("zero duration".into()));
        }
        if self.user_address != user {
            return Err(SdkError::MalformedGrant(format!(
                "grant belongs to {}, not {user}",
                self.user_address
            )));
        }
        let granted: BTreeSet<Address> = self.contract_addresses.iter().copied().collect();
        if granted != *contracts || granted.len() != self.contract_addresses.len() {
            return Err(SdkError::MalformedGrant("contract set mismatch".into()));
        }
        Ok(())
    }

    /// Whether the grant was issued through the runtime with this identity
    pub fn issued_for(&self, identity: &str) -> bool {
        self.runtime_identity == identity
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| SdkError::MalformedGrant(e.to_string()))
    }
}

/// Storage key for a grant: runtime identity, signer and sorted contract set
pub fn grant_cache_key(identity: &str, user: Address, contracts: &BTreeSet<Address>) -> String {
    let mut hasher = Keccak256::new();
    hasher.update(identity.as_bytes());
    hasher.update(user.as_bytes());
    for contract in contracts {
        hasher.update(contract.as_bytes());
    }
    format!("{GRANT_KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

fn is_well_formed_signature(sig: &str) -> bool {
    sig.strip_prefix("0x")
        .map(|digits| digits.len() == 130 && digits.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false)
}

fn with_hex_prefix(s: &str) -> String {
    if s.starts_with("0x") {
        s.to_string()
    } else {
        format!("0x{s}")
    }
}

type SharedGrant = Shared<BoxFuture<'static, Result<AuthorizationGrant>>>;

/// Loads grants from storage or has the wallet sign new ones.
///
/// Concurrent requests for the same `(runtime, signer, contract set)` share one
/// in-flight signing prompt.
pub struct GrantManager {
    clock: Arc<dyn Clock>,
    duration_days: u64,
    pending: Mutex<HashMap<String, SharedGrant>>,
}

impl GrantManager {
    pub fn new(clock: Arc<dyn Clock>, duration_days: u64) -> Self {
        Self {
            clock,
            duration_days,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Manager signing grants for `config.grant_duration_days`
    pub fn from_config(clock: Arc<dyn Clock>, config: &SdkConfig) -> Self {
        Self::new(clock, config.grant_duration_days)
    }

    pub fn duration_days(&self) -> u64 {
        self.duration_days
    }

    pub async fn load_or_create(
        &self,
        capability: &CapabilityHandle,
        target_contracts: &[Address],
        signer: Arc<dyn TypedDataSigner>,
        storage: Arc<dyn GrantStorage>,
    ) -> Result<AuthorizationGrant> {
        let contracts: BTreeSet<Address> = target_contracts.iter().copied().collect();
        if contracts.is_empty() {
            return Err(SdkError::InvalidInput("no target contracts".into()));
        }
        let user = signer
            .address()
            .await
            .map_err(|e| SdkError::Environment(format!("signer address unavailable: {e}")))?;
        let key = grant_cache_key(capability.identity(), user, &contracts);

        let request = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match pending.get(&key) {
                Some(in_flight) => {
                    debug!(%user, "joining in-flight grant request");
                    in_flight.clone()
                },
                None => {
                    let request = fetch_or_sign(GrantRequest {
                        key: key.clone(),
                        user,
                        contracts,
                        capability: capability.clone(),
                        signer,
                        storage,
                        clock: self.clock.clone(),
                        duration_days: self.duration_days,
                    })
                    .boxed()
                    .shared();
                    pending.insert(key.clone(), request.clone());
                    request
                },
            }
        };

        let result = request.await;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if pending.get(&key).is_some_and(|f| f.peek().is_some()) {
            pending.remove(&key);
        }
        result
    }
}

struct GrantRequest {
    key: String,
    user: Address,
    contracts: BTreeSet<Address>,
    capability: CapabilityHandle,
    signer: Arc<dyn TypedDataSigner>,
    storage: Arc<dyn GrantStorage>,
    clock: Arc<dyn Clock>,
    duration_days: u64,
}

async fn fetch_or_sign(req: GrantRequest) -> Result<AuthorizationGrant> {
    match req.storage.get_item(&req.key).await {
        Ok(Some(raw)) => {
            let cached = AuthorizationGrant::from_json(&raw)
                .and_then(|g| g.validate_binding(req.user, &req.contracts).map(|_| g))
                .and_then(|g| {
                    if g.issued_for(req.capability.identity()) {
                        Ok(g)
                    } else {
                        Err(SdkError::MalformedGrant("issued by another runtime".into()))
                    }
                });
            match cached {
                Ok(grant) if grant.is_valid_at(req.clock.now_unix()) => {
                    debug!(user = %req.user, "grant cache hit");
                    return Ok(grant);
                },
                Ok(_) => debug!(user = %req.user, "cached grant expired"),
                Err(e) => {
                    warn!(user = %req.user, error = %e, "discarding malformed cached grant");
                    if let Err(e) = req.storage.remove_item(&req.key).await {
                        warn!(error = %e, "failed to remove malformed grant");
                    }
                    return Err(e);
                },
            }
        },
        Ok(None) => debug!(user = %req.user, "grant cache miss"),
        Err(e) => warn!(error = %e, "grant storage read failed, signing a new grant"),
    }

    let grant = sign_new(&req).await?;

    match grant.to_json() {
        Ok(raw) => {
            if let Err(e) = req.storage.set_item(&req.key, raw).await {
                warn!(error = %e, "failed to persist grant");
            }
        },
        Err(e) => warn!(error = %e, "failed to serialize grant"),
    }
    Ok(grant)
}

async fn sign_new(req: &GrantRequest) -> Result<AuthorizationGrant> {
    let keypair = req.capability.generate_keypair();
    let contract_addresses: Vec<Address> = req.contracts.iter().copied().collect();
    let start_timestamp = req.clock.now_unix();
    let eip712 = Eip712TypedData::user_decrypt(
        req.capability.gateway_chain_id(),
        req.capability.verifying_contract_decryption(),
        &keypair.public_key,
        &contract_addresses,
        start_timestamp,
        req.duration_days,
    );

    info!(user = %req.user, contracts = contract_addresses.len(), "requesting grant signature");
    let signature = req
        .signer
        .sign_typed_data(&eip712.domain, &eip712.types, &eip712.message)
        .await
        .map_err(SdkError::SigningRejected)?;
    if !is_well_formed_signature(&signature) {
        return Err(SdkError::SigningRejected(
            "wallet returned a malformed signature".into(),
        ));
    }

    Ok(AuthorizationGrant {
        public_key: keypair.public_key,
        private_key: keypair.private_key,
        signature,
        user_address: req.user,
        contract_addresses,
        start_timestamp,
        duration_days: req.duration_days,
        runtime_identity: req.capability.identity().to_string(),
        eip712,
    })
}
