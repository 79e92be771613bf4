use crate::error::BoxError;
use crate::types::{Address, EmployeeRecord, Handle, TxReceipt};
use async_trait::async_trait;
use num_bigint::BigUint;

/// The on-chain payroll contract, already bound to the submitting wallet.
/// Mutating calls return the broadcast transaction hash; confirmation is separate.
#[async_trait]
pub trait PayrollLedger: Send + Sync {
    /// Contract address
    fn address(&self) -> Address;

    async fn get_employee_info(&self, employee: Address) -> Result<EmployeeRecord, BoxError>;

    async fn get_dao_funds(&self) -> Result<BigUint, BoxError>;

    /// `plain_salary` is only used for gas estimation by the contract
    async fn add_employee(
        &self,
        employee: Address,
        handle: Handle,
        input_proof: &[u8],
        cycle_seconds: u64,
        plain_salary: u64,
    ) -> Result<String, BoxError>;

    async fn claim_salary(&self) -> Result<String, BoxError>;

    async fn fund_contract(&self, value: BigUint, gas_limit: u64) -> Result<String, BoxError>;

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, BoxError>;
}
