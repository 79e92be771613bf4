use crate::core::engine::NetworkConfig;
use crate::types::{Address, ChainId};

/// Local hardhat node; always part of the simulation chain set
pub const HARDHAT_CHAIN_ID: ChainId = 31337;
pub const HARDHAT_RPC_URL: &str = "http://127.0.0.1:8545";

pub const SEPOLIA_CHAIN_ID: ChainId = 11155111;

// Payroll contract deployments
pub const HARDHAT_PAYROLL_ADDRESS: Address =
    hex_address("0x5FbDB2315678afecb367f032d93F642f64180aa3");
pub const SEPOLIA_PAYROLL_ADDRESS: Address =
    hex_address("0xEEA76f0239e9B5F547c08Fdefe7df13803A88A2E");

/// Chain id of the decryption gateway used by both backends
pub const GATEWAY_CHAIN_ID: ChainId = 55815;

/// Validity window written into freshly signed grants
pub const DEFAULT_GRANT_DURATION_DAYS: u64 = 365;

pub const SECONDS_PER_DAY: u64 = 86_400;

/// `fundContract` gas limit; some local nodes under-estimate payable calls
pub const DEFAULT_FUND_GAS_LIMIT: u64 = 100_000;

// Simulation node RPC extensions
pub const CLIENT_VERSION_METHOD: &str = "web3_clientVersion";
pub const RELAYER_METADATA_METHOD: &str = "fhevm_relayer_metadata";
pub const SIMULATION_CLIENT_MARKER: &str = "hardhat";

// Verifying contracts of a metadata-backed simulation node
pub const SIM_VERIFYING_CONTRACT_DECRYPTION: Address =
    hex_address("0x5ffdaAB0373E62E2ea2944776209aEf29E631A64");
pub const SIM_VERIFYING_CONTRACT_INPUT_VERIFICATION: Address =
    hex_address("0x812b06e1CDCE800494b79fFE4f925A504a9A9810");

// Placeholders for a simulation node that exposes no metadata
pub const PLACEHOLDER_ACL: Address = Address::from_low_u8(1);
pub const PLACEHOLDER_INPUT_VERIFIER: Address = Address::from_low_u8(2);
pub const PLACEHOLDER_KMS: Address = hex_address("0x1364cBBf2cDF5032C47d8226a6f6FBD2AFCDacAC");
pub const PLACEHOLDER_VERIFYING_CONTRACT_DECRYPTION: Address = Address::from_low_u8(3);
pub const PLACEHOLDER_VERIFYING_CONTRACT_INPUT_VERIFICATION: Address = Address::from_low_u8(4);

/// Built-in production network (Sepolia host chain, testnet relayer)
pub fn sepolia_network_config() -> NetworkConfig {
    NetworkConfig {
        acl_contract_address: hex_address("0x687820221192C5B662b25367F70076A37bc79b6c"),
        kms_contract_address: PLACEHOLDER_KMS,
        input_verifier_contract_address: hex_address("0xbc91f3daD1A5F19F8390c400196e58073B6a0BC4"),
        verifying_contract_address_decryption: hex_address(
            "0xb6E160B1ff80D67Bfe90A85eE06Ce0A2613607D1",
        ),
        verifying_contract_address_input_verification: hex_address(
            "0x7048C39f048125eDa9d678AEbaDfB22F7900a29F",
        ),
        chain_id: SEPOLIA_CHAIN_ID,
        gateway_chain_id: GATEWAY_CHAIN_ID,
        relayer_url: "https://relayer.testnet.zama.cloud".to_string(),
    }
}

const fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => panic!("invalid hex digit in address constant"),
    }
}

pub(crate) const fn hex_address(s: &str) -> Address {
    let b = s.as_bytes();
    assert!(b.len() == 42 && b[0] == b'0' && b[1] == b'x');
    let mut out = [0u8; 20];
    let mut i = 0;
    while i < 20 {
        out[i] = (hex_nibble(b[2 + 2 * i]) << 4) | hex_nibble(b[3 + 2 * i]);
        i += 1;
    }
    Address(out)
}
