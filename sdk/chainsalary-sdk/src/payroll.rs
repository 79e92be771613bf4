use crate::capability::CapabilityHandle;
use crate::claim::parse_clear_amount;
use crate::config::SdkConfig;
use crate::core::constants::DEFAULT_FUND_GAS_LIMIT;
use crate::core::ledger::PayrollLedger;
use crate::core::signer::TypedDataSigner;
use crate::core::storage::GrantStorage;
use crate::error::{Result, SdkError};
use crate::grant::GrantManager;
use crate::types::{Address, ClaimState, DecryptRequest, EmployeeRecord, Handle, TxReceipt};
use crate::units::{format_ether, parse_salary, salary_to_u64, SalaryUnit};
use num_bigint::BigUint;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Clears the session's busy flag when the mutating call ends, however it ends
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One wallet's session against the payroll ledger.
///
/// At most one mutating call is outstanding at a time; a second one is
/// rejected with [`SdkError::Busy`] before touching the network. A mutating
/// call succeeds only once its receipt confirms inclusion.
pub struct PayrollSession {
    ledger: Arc<dyn PayrollLedger>,
    signer: Arc<dyn TypedDataSigner>,
    storage: Arc<dyn GrantStorage>,
    grants: Arc<GrantManager>,
    fund_gas_limit: u64,
    busy: AtomicBool,
    message: Mutex<String>,
}

impl PayrollSession {
    pub fn new(
        ledger: Arc<dyn PayrollLedger>,
        signer: Arc<dyn TypedDataSigner>,
        storage: Arc<dyn GrantStorage>,
        grants: Arc<GrantManager>,
    ) -> Self {
        Self {
            ledger,
            signer,
            storage,
            grants,
            fund_gas_limit: DEFAULT_FUND_GAS_LIMIT,
            busy: AtomicBool::new(false),
            message: Mutex::new(String::new()),
        }
    }

    pub fn with_fund_gas_limit(mut self, gas_limit: u64) -> Self {
        self.fund_gas_limit = gas_limit;
        self
    }

    /// Apply the session settings of `config`
    pub fn with_config(self, config: &SdkConfig) -> Self {
        self.with_fund_gas_limit(config.fund_gas_limit)
    }

    pub fn fund_gas_limit(&self) -> u64 {
        self.fund_gas_limit
    }

    pub fn contract_address(&self) -> Address {
        self.ledger.address()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Last progress or result line
    pub fn message(&self) -> String {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_message(&self, message: impl Into<String>) {
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) = message.into();
    }

    async fn user_address(&self) -> Result<Address> {
        self.signer
            .address()
            .await
            .map_err(|e| SdkError::Environment(format!("signer address unavailable: {e}")))
    }

    //=========================================================================
    // Reads
    //=========================================================================

    pub async fn employee_info(&self, employee: Address) -> Result<EmployeeRecord> {
        self.ledger
            .get_employee_info(employee)
            .await
            .map_err(|e| SdkError::Connection(e.to_string()))
    }

    /// Employee record of the signing wallet
    pub async fn my_employee_info(&self) -> Result<EmployeeRecord> {
        let me = self.user_address().await?;
        self.employee_info(me).await
    }

    pub async fn dao_funds(&self) -> Result<BigUint> {
        self.ledger
            .get_dao_funds()
            .await
            .map_err(|e| SdkError::Connection(e.to_string()))
    }

    //=========================================================================
    // Decryption
    //=========================================================================

    /// Decrypt a salary handle owned by this ledger, signing a grant if needed
    pub async fn decrypt_salary(
        &self,
        capability: &CapabilityHandle,
        handle: Handle,
    ) -> Result<BigUint> {
        let contract = self.ledger.address();
        let grant = self
            .grants
            .load_or_create(
                capability,
                &[contract],
                self.signer.clone(),
                self.storage.clone(),
            )
            .await?;
        let request = DecryptRequest {
            handle,
            contract_address: contract,
        };
        let clear = capability.user_decrypt(&[request], &grant).await?;
        let raw = clear
            .get(&handle)
            .ok_or_else(|| SdkError::Decryption(format!("no plaintext for {handle}")))?;
        parse_clear_amount(raw)
    }

    /// Read the caller's record, decrypt the per-period salary when a runtime is
    /// available, and derive the claim view at `now`
    pub async fn claim_state(
        &self,
        capability: Option<&CapabilityHandle>,
        now: u64,
    ) -> Result<(EmployeeRecord, ClaimState)> {
        let record = self.my_employee_info().await?;
        let handle = record.encrypted_per_period_salary;
        let per_period = match capability {
            Some(capability) if handle != Handle::default() => {
                Some(self.decrypt_salary(capability, handle).await?)
            },
            _ => None,
        };
        let state = ClaimState::from_record(&record, per_period.as_ref(), now);
        Ok((record, state))
    }

    //=========================================================================
    // Mutating calls
    //=========================================================================

    /// Encrypt `salary` for this ledger and register `employee`
    pub async fn add_employee(
        &self,
        capability: &CapabilityHandle,
        employee: Address,
        salary: u64,
        cycle_seconds: u64,
    ) -> Result<TxReceipt> {
        let _guard = self.acquire()?;
        if cycle_seconds == 0 {
            return self.fail("Add employee", SdkError::InvalidInput("cycle must be positive".into()));
        }
        let outcome = async {
            self.set_message("Encrypting salary...");
            let user = self.user_address().await?;
            let contract = self.ledger.address();
            let encrypted = capability
                .create_encrypted_input(contract, user)
                .add64(salary)
                .encrypt()
                .await?;
            let handle = encrypted
                .handles
                .first()
                .copied()
                .ok_or_else(|| SdkError::Encryption("no handle returned".into()))?;

            self.set_message("Submitting transaction...");
            self.broadcast_and_confirm(self.ledger.add_employee(
                employee,
                handle,
                &encrypted.input_proof,
                cycle_seconds,
                salary,
            ))
            .await
        }
        .await;
        self.report("Add employee", outcome)
    }

    /// Register `employee` with a salary typed by the user, e.g. `"1.5"` in
    /// [`SalaryUnit::Ether`]. The amount must fit the 64-bit encrypted field.
    pub async fn add_employee_from_entry(
        &self,
        capability: &CapabilityHandle,
        employee: Address,
        salary_entry: &str,
        unit: SalaryUnit,
        cycle_seconds: u64,
    ) -> Result<TxReceipt> {
        let wei = parse_salary(salary_entry, unit)?;
        let salary = salary_to_u64(&wei)?;
        self.add_employee(capability, employee, salary, cycle_seconds)
            .await
    }

    pub async fn claim_salary(&self) -> Result<TxReceipt> {
        let _guard = self.acquire()?;
        self.set_message("Claiming salary...");
        let outcome = self.broadcast_and_confirm(self.ledger.claim_salary()).await;
        self.report("Claim", outcome)
    }

    /// Deposit `value` wei into the payroll treasury
    pub async fn fund_contract(&self, value: BigUint) -> Result<TxReceipt> {
        let _guard = self.acquire()?;
        if value == BigUint::default() {
            return self.fail("Deposit", SdkError::InvalidInput("deposit must be positive".into()));
        }
        let action = format!("Deposit of {} ETH", format_ether(&value));
        self.set_message(format!("{action} in progress..."));
        let outcome = self
            .broadcast_and_confirm(self.ledger.fund_contract(value, self.fund_gas_limit))
            .await;
        self.report(&action, outcome)
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| {
                debug!("rejecting ledger action while another is in flight");
                SdkError::Busy
            })?;
        Ok(BusyGuard(&self.busy))
    }

    async fn broadcast_and_confirm<F>(&self, submit: F) -> Result<TxReceipt>
    where
        F: Future<Output = std::result::Result<String, crate::error::BoxError>>,
    {
        let tx_hash = submit.await.map_err(SdkError::not_broadcast)?;
        info!(%tx_hash, "transaction broadcast, waiting for receipt");
        let receipt = self
            .ledger
            .wait_for_receipt(&tx_hash)
            .await
            .map_err(|e| SdkError::unconfirmed(tx_hash.clone(), e))?;
        if !receipt.success {
            return Err(SdkError::unconfirmed(tx_hash, "transaction reverted"));
        }
        Ok(receipt)
    }

    fn fail(&self, action: &str, e: SdkError) -> Result<TxReceipt> {
        self.report(action, Err(e))
    }

    fn report(&self, action: &str, outcome: Result<TxReceipt>) -> Result<TxReceipt> {
        match &outcome {
            Ok(receipt) => {
                info!(tx_hash = %receipt.tx_hash, block = receipt.block_number, "{action} confirmed");
                self.set_message(format!("{action} completed, tx={}", receipt.tx_hash));
            },
            Err(e) => {
                warn!(error = %e, "{action} failed");
                self.set_message(format!("{action} failed: {e}"));
            },
        }
        outcome
    }
}
