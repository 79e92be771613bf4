#![allow(dead_code)]

use async_trait::async_trait;
use chainsalary_sdk::{
    Address, AuthorizationGrant, BoxError, ChainConnection, ChainId, DecryptRequest,
    EmployeeRecord, EncryptedInput, Eip1193Provider, FheEngine, GrantStorage, Handle,
    HostEnvironment, KeyPair, NetworkConfig, PayrollLedger, ProductionConfig, ProductionSdk,
    RpcConnection, RuntimeResolver, SdkConfig, SdkEntryPoint, SdkLoader, SimulationConfig,
    SimulationFactory, TxReceipt, TypedDataSigner,
};
use num_bigint::BigUint;
use rand::RngCore;
use serde_json::{json, Value};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub const LOCAL_URL: &str = "http://127.0.0.1:8545";

pub fn addr(n: u8) -> Address {
    Address::from_low_u8(n)
}

//=============================================================================
// Connections
//=============================================================================

/// JSON-RPC node with canned answers
pub struct MockRpc {
    pub chain_id: ChainId,
    /// `None` makes `web3_clientVersion` fail
    pub client_version: Option<String>,
    /// `None` makes `fhevm_relayer_metadata` fail
    pub metadata: Option<Value>,
    pub calls: Mutex<Vec<String>>,
}

impl MockRpc {
    pub fn hardhat_with_metadata(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            client_version: Some("HardhatNetwork/2.22.0/@fhevm/hardhat-plugin".into()),
            metadata: Some(json!({
                "ACLAddress": "0x50157CFfD6bBFA2DECe204a89ec419c23ef5755D",
                "InputVerifierAddress": "0x901F8942346f7AB3a01F6D7613119Bca447Bb030",
                "KMSVerifierAddress": "0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC",
            })),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn plain_node(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            client_version: Some("anvil/v0.2.0".into()),
            metadata: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn silent(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            client_version: None,
            metadata: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RpcConnection for MockRpc {
    async fn chain_id(&self) -> Result<ChainId, BoxError> {
        Ok(self.chain_id)
    }

    async fn send(&self, method: &str, _params: Value) -> Result<Value, BoxError> {
        self.calls.lock().unwrap().push(method.to_string());
        match method {
            "web3_clientVersion" => self
                .client_version
                .clone()
                .map(Value::String)
                .ok_or_else(|| "connection reset".into()),
            "fhevm_relayer_metadata" => self
                .metadata
                .clone()
                .ok_or_else(|| "method not found".into()),
            other => Err(format!("unsupported method {other}").into()),
        }
    }
}

/// Browser wallet reporting a fixed chain. With a gate, `eth_chainId` blocks
/// until a permit is added.
pub struct MockWallet {
    pub chain_id: ChainId,
    pub gate: Option<Arc<Semaphore>>,
}

impl MockWallet {
    pub fn new(chain_id: ChainId) -> Arc<Self> {
        Arc::new(Self {
            chain_id,
            gate: None,
        })
    }

    pub fn gated(chain_id: ChainId) -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Arc::new(Self {
                chain_id,
                gate: Some(gate.clone()),
            }),
            gate,
        )
    }
}

#[async_trait]
impl Eip1193Provider for MockWallet {
    async fn request(&self, method: &str, _params: Value) -> Result<Value, BoxError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        match method {
            "eth_chainId" => Ok(Value::String(format!("0x{:x}", self.chain_id))),
            other => Err(format!("unsupported method {other}").into()),
        }
    }
}

pub fn injected(wallet: Arc<MockWallet>) -> ChainConnection {
    ChainConnection::Injected(wallet)
}

/// Host with configurable capabilities and a fixed set of reachable nodes
pub struct MockHost {
    pub interactive: bool,
    pub online: bool,
    pub nodes: HashMap<String, Arc<MockRpc>>,
    pub opened: Mutex<Vec<String>>,
}

impl MockHost {
    pub fn browser() -> Self {
        Self {
            interactive: true,
            online: true,
            nodes: HashMap::new(),
            opened: Mutex::new(Vec::new()),
        }
    }

    pub fn headless() -> Self {
        Self {
            interactive: false,
            ..Self::browser()
        }
    }

    pub fn with_node(mut self, url: &str, rpc: Arc<MockRpc>) -> Self {
        self.nodes.insert(url.to_string(), rpc);
        self
    }
}

#[async_trait]
impl HostEnvironment for MockHost {
    fn can_prompt_signatures(&self) -> bool {
        self.interactive
    }

    fn can_open_connections(&self) -> bool {
        self.online
    }

    async fn open_rpc(&self, url: &str) -> Result<Arc<dyn RpcConnection>, BoxError> {
        self.opened.lock().unwrap().push(url.to_string());
        match self.nodes.get(url) {
            Some(rpc) => Ok(rpc.clone() as Arc<dyn RpcConnection>),
            None => Err(format!("connection refused: {url}").into()),
        }
    }
}

//=============================================================================
// Encryption engine & backends
//=============================================================================

/// Stand-in for the encryption scheme: handles are hashes, plaintexts are kept
/// in memory.
pub struct MockEngine {
    pub network_key: Vec<u8>,
    pub clear: Mutex<HashMap<Handle, String>>,
    pub encrypt_calls: AtomicUsize,
    pub decrypt_calls: AtomicUsize,
    pub fail_decrypt: AtomicBool,
}

impl MockEngine {
    pub fn new(network_key: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            network_key: network_key.to_vec(),
            clear: Mutex::new(HashMap::new()),
            encrypt_calls: AtomicUsize::new(0),
            decrypt_calls: AtomicUsize::new(0),
            fail_decrypt: AtomicBool::new(false),
        })
    }

    /// Register a ciphertext the ledger already holds
    pub fn store(&self, handle: Handle, clear: &str) {
        self.clear.lock().unwrap().insert(handle, clear.to_string());
    }
}

#[async_trait]
impl FheEngine for MockEngine {
    fn network_public_key(&self) -> Vec<u8> {
        self.network_key.clone()
    }

    fn generate_keypair(&self) -> KeyPair {
        let mut public = [0u8; 32];
        let mut private = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut public);
        rand::thread_rng().fill_bytes(&mut private);
        KeyPair {
            public_key: hex::encode(public),
            private_key: hex::encode(private),
        }
    }

    async fn encrypt_u64s(
        &self,
        contract: Address,
        user: Address,
        values: &[u64],
    ) -> Result<EncryptedInput, BoxError> {
        let call = self.encrypt_calls.fetch_add(1, Ordering::SeqCst) as u64;
        let mut handles = Vec::new();
        for (i, value) in values.iter().enumerate() {
            let mut hasher = Keccak256::new();
            hasher.update(contract.as_bytes());
            hasher.update(user.as_bytes());
            hasher.update(call.to_be_bytes());
            hasher.update((i as u64).to_be_bytes());
            let handle = Handle(hasher.finalize().into());
            self.store(handle, &value.to_string());
            handles.push(handle);
        }
        let mut proof = contract.as_bytes().to_vec();
        proof.extend_from_slice(user.as_bytes());
        Ok(EncryptedInput {
            handles,
            input_proof: proof,
        })
    }

    async fn user_decrypt(
        &self,
        requests: &[DecryptRequest],
        grant: &AuthorizationGrant,
    ) -> Result<HashMap<Handle, String>, BoxError> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_decrypt.load(Ordering::SeqCst) {
            return Err("relayer unavailable".into());
        }
        if grant.signature.len() != 132 {
            return Err("bad grant signature".into());
        }
        let clear = self.clear.lock().unwrap();
        let mut out = HashMap::new();
        for request in requests {
            if let Some(value) = clear.get(&request.handle) {
                out.insert(request.handle, value.clone());
            }
        }
        Ok(out)
    }
}

pub struct MockSimulationFactory {
    pub engine: Arc<MockEngine>,
    pub created: Mutex<Vec<SimulationConfig>>,
    pub fail: bool,
}

impl MockSimulationFactory {
    pub fn new(engine: Arc<MockEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            created: Mutex::new(Vec::new()),
            fail: false,
        })
    }

    pub fn configs(&self) -> Vec<SimulationConfig> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl SimulationFactory for MockSimulationFactory {
    async fn create(
        &self,
        _rpc: Arc<dyn RpcConnection>,
        config: &SimulationConfig,
    ) -> Result<Arc<dyn FheEngine>, BoxError> {
        if self.fail {
            return Err("mock runtime unavailable".into());
        }
        self.created.lock().unwrap().push(config.clone());
        Ok(self.engine.clone() as Arc<dyn FheEngine>)
    }
}

pub struct MockSdk {
    pub engine: Arc<MockEngine>,
    pub init_ok: bool,
    pub init_calls: AtomicUsize,
    pub created: Mutex<Vec<NetworkConfig>>,
}

#[async_trait]
impl ProductionSdk for MockSdk {
    async fn init_sdk(&self) -> Result<bool, BoxError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.init_ok)
    }

    fn default_network_config(&self) -> Option<NetworkConfig> {
        None
    }

    async fn create_instance(
        &self,
        config: ProductionConfig,
    ) -> Result<Arc<dyn FheEngine>, BoxError> {
        self.created.lock().unwrap().push(config.network_config);
        Ok(self.engine.clone() as Arc<dyn FheEngine>)
    }
}

/// Production SDK loader; individual entry points can be made unavailable
pub struct MockSdkLoader {
    pub sdk: Arc<MockSdk>,
    pub web_available: bool,
    pub bundle_available: bool,
    pub loads: Mutex<Vec<SdkEntryPoint>>,
}

impl MockSdkLoader {
    pub fn new(engine: Arc<MockEngine>, init_ok: bool) -> Arc<Self> {
        Arc::new(Self {
            sdk: Arc::new(MockSdk {
                engine,
                init_ok,
                init_calls: AtomicUsize::new(0),
                created: Mutex::new(Vec::new()),
            }),
            web_available: true,
            bundle_available: true,
            loads: Mutex::new(Vec::new()),
        })
    }

    pub fn loads(&self) -> Vec<SdkEntryPoint> {
        self.loads.lock().unwrap().clone()
    }
}

#[async_trait]
impl SdkLoader for MockSdkLoader {
    async fn load(&self, entry: SdkEntryPoint) -> Result<Arc<dyn ProductionSdk>, BoxError> {
        self.loads.lock().unwrap().push(entry);
        let available = match entry {
            SdkEntryPoint::Web => self.web_available,
            SdkEntryPoint::Bundle => self.bundle_available,
        };
        if available {
            Ok(self.sdk.clone() as Arc<dyn ProductionSdk>)
        } else {
            Err(format!("cannot import {entry} entry").into())
        }
    }
}

//=============================================================================
// Signer & storage
//=============================================================================

pub struct MockSigner {
    pub address: Address,
    pub prompts: AtomicUsize,
    pub reject: AtomicBool,
    /// When set, each prompt waits for a permit
    pub gate: Option<Arc<Semaphore>>,
}

impl MockSigner {
    pub fn new(address: Address) -> Arc<Self> {
        Arc::new(Self {
            address,
            prompts: AtomicUsize::new(0),
            reject: AtomicBool::new(false),
            gate: None,
        })
    }

    pub fn gated(address: Address) -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (
            Arc::new(Self {
                address,
                prompts: AtomicUsize::new(0),
                reject: AtomicBool::new(false),
                gate: Some(gate.clone()),
            }),
            gate,
        )
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TypedDataSigner for MockSigner {
    async fn address(&self) -> Result<Address, BoxError> {
        Ok(self.address)
    }

    async fn sign_typed_data(
        &self,
        _domain: &Value,
        _types: &Value,
        message: &Value,
    ) -> Result<String, String> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(|e| e.to_string())?.forget();
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err("user rejected the request".into());
        }
        let mut hasher = Keccak256::new();
        hasher.update(message.to_string().as_bytes());
        let digest = hasher.finalize();
        Ok(format!("0x{}{}1b", hex::encode(digest), hex::encode(digest)))
    }
}

/// Storage whose writes always fail
#[derive(Default)]
pub struct ReadOnlyStorage;

#[async_trait]
impl GrantStorage for ReadOnlyStorage {
    async fn get_item(&self, _key: &str) -> Result<Option<String>, BoxError> {
        Ok(None)
    }

    async fn set_item(&self, _key: &str, _value: String) -> Result<(), BoxError> {
        Err("quota exceeded".into())
    }

    async fn remove_item(&self, _key: &str) -> Result<(), BoxError> {
        Ok(())
    }
}

//=============================================================================
// Ledger
//=============================================================================

pub struct MockLedger {
    pub address: Address,
    pub records: Mutex<HashMap<Address, EmployeeRecord>>,
    pub funds: Mutex<BigUint>,
    pub network_calls: AtomicUsize,
    pub added: Mutex<Vec<(Address, Handle, Vec<u8>, u64, u64)>>,
    pub fund_gas_limits: Mutex<Vec<u64>>,
    pub fail_broadcast: AtomicBool,
    pub fail_receipt: AtomicBool,
    pub revert: AtomicBool,
    /// When set, `wait_for_receipt` blocks until a permit is added
    pub receipt_gate: Option<Arc<Semaphore>>,
    next_tx: AtomicUsize,
}

impl MockLedger {
    pub fn new(address: Address) -> Arc<Self> {
        Arc::new(Self::build(address, None))
    }

    pub fn gated(address: Address) -> (Arc<Self>, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Arc::new(Self::build(address, Some(gate.clone()))), gate)
    }

    fn build(address: Address, receipt_gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            address,
            records: Mutex::new(HashMap::new()),
            funds: Mutex::new(BigUint::default()),
            network_calls: AtomicUsize::new(0),
            added: Mutex::new(Vec::new()),
            fund_gas_limits: Mutex::new(Vec::new()),
            fail_broadcast: AtomicBool::new(false),
            fail_receipt: AtomicBool::new(false),
            revert: AtomicBool::new(false),
            receipt_gate,
            next_tx: AtomicUsize::new(1),
        }
    }

    pub fn set_record(&self, employee: Address, record: EmployeeRecord) {
        self.records.lock().unwrap().insert(employee, record);
    }

    pub fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    fn broadcast(&self) -> Result<String, BoxError> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_broadcast.load(Ordering::SeqCst) {
            return Err("insufficient funds for gas".into());
        }
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst);
        Ok(format!("0x{n:064x}"))
    }
}

#[async_trait]
impl PayrollLedger for MockLedger {
    fn address(&self) -> Address {
        self.address
    }

    async fn get_employee_info(&self, employee: Address) -> Result<EmployeeRecord, BoxError> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&employee)
            .cloned()
            .unwrap_or(EmployeeRecord {
                encrypted_per_period_salary: Handle::default(),
                cycle_seconds: 0,
                last_claim_at: 0,
                active: false,
            }))
    }

    async fn get_dao_funds(&self) -> Result<BigUint, BoxError> {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.funds.lock().unwrap().clone())
    }

    async fn add_employee(
        &self,
        employee: Address,
        handle: Handle,
        input_proof: &[u8],
        cycle_seconds: u64,
        plain_salary: u64,
    ) -> Result<String, BoxError> {
        let tx = self.broadcast()?;
        self.added.lock().unwrap().push((
            employee,
            handle,
            input_proof.to_vec(),
            cycle_seconds,
            plain_salary,
        ));
        Ok(tx)
    }

    async fn claim_salary(&self) -> Result<String, BoxError> {
        self.broadcast()
    }

    async fn fund_contract(&self, value: BigUint, gas_limit: u64) -> Result<String, BoxError> {
        let tx = self.broadcast()?;
        self.fund_gas_limits.lock().unwrap().push(gas_limit);
        *self.funds.lock().unwrap() += value;
        Ok(tx)
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, BoxError> {
        if let Some(gate) = &self.receipt_gate {
            gate.acquire().await?.forget();
        }
        if self.fail_receipt.load(Ordering::SeqCst) {
            return Err("transaction dropped from mempool".into());
        }
        Ok(TxReceipt {
            tx_hash: tx_hash.to_string(),
            block_number: 7,
            success: !self.revert.load(Ordering::SeqCst),
        })
    }
}

//=============================================================================
// Wiring
//=============================================================================

pub struct TestContext {
    pub engine: Arc<MockEngine>,
    pub rpc: Arc<MockRpc>,
    pub simulation: Arc<MockSimulationFactory>,
    pub loader: Arc<MockSdkLoader>,
    pub resolver: Arc<RuntimeResolver>,
}

impl TestContext {
    /// Resolver with a metadata-serving local node and a working production SDK
    pub fn new(host: MockHost) -> Self {
        Self::with_rpc(host, Arc::new(MockRpc::hardhat_with_metadata(31337)))
    }

    pub fn with_rpc(host: MockHost, rpc: Arc<MockRpc>) -> Self {
        let engine = MockEngine::new(b"network-key");
        let simulation = MockSimulationFactory::new(engine.clone());
        let loader = MockSdkLoader::new(engine.clone(), true);
        let host = host.with_node(LOCAL_URL, rpc.clone());
        let resolver = Arc::new(
            RuntimeResolver::new(Arc::new(host), simulation.clone(), &SdkConfig::default())
                .with_sdk_loader(loader.clone()),
        );
        Self {
            engine,
            rpc,
            simulation,
            loader,
            resolver,
        }
    }
}
