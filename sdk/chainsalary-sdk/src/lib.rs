//! Client runtime for the ChainSalary confidential payroll ledger.
//!
//! Salaries live on-chain as ciphertext handles. This crate stands up the
//! capability that encrypts inputs and decrypts authorized handles, keeps that
//! capability in step with the connected chain, caches the wallet-signed
//! decryption grants, and derives claimable pay from decrypted values.

pub mod capability;
pub mod claim;
pub mod config;
pub mod core;
pub mod error;
pub mod grant;
pub mod lifecycle;
pub mod payroll;
pub mod registry;
pub mod resolver;
pub mod types;
pub mod units;

pub use crate::capability::{CapabilityHandle, EncryptedInputBuilder};
pub use crate::claim::{
    claimable_amount, next_payday_instant, periods_elapsed, time_left, ClaimTicker,
};
pub use crate::config::SdkConfig;
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::connection::{ChainConnection, Eip1193Provider, RpcConnection};
pub use crate::core::engine::{
    FheEngine, KeyPair, NetworkConfig, ProductionConfig, ProductionSdk, SdkEntryPoint, SdkLoader,
    SimulationConfig, SimulationFactory,
};
pub use crate::core::host::HostEnvironment;
pub use crate::core::ledger::PayrollLedger;
pub use crate::core::signer::TypedDataSigner;
pub use crate::core::storage::{GrantStorage, InMemoryStorage};
pub use crate::error::{BoxError, Result, SdkError, TxStage};
pub use crate::grant::{AuthorizationGrant, Eip712TypedData, GrantManager};
pub use crate::lifecycle::{CancelToken, RuntimeController};
pub use crate::payroll::PayrollSession;
pub use crate::registry::{Deployment, DeploymentRegistry};
pub use crate::resolver::RuntimeResolver;
pub use crate::types::{
    Address, ChainId, ClaimState, DecryptRequest, EmployeeRecord, EncryptedInput, Handle,
    RuntimeStatus, TxReceipt,
};
pub use crate::units::{format_ether, parse_salary, salary_to_u64, SalaryUnit};
