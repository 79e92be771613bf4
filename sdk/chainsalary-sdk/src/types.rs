use crate::error::SdkError;
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Positive integer identifying the target network
pub type ChainId = u64;

macro_rules! hex_bytes_newtype {
    ($name:ident, $len:expr, $what:literal) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = SdkError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                let raw = hex::decode(digits).map_err(|e| {
                    SdkError::InvalidInput(format!("invalid {} {s:?}: {e}", $what))
                })?;
                let bytes: [u8; $len] = raw.try_into().map_err(|_| {
                    SdkError::InvalidInput(format!(
                        "invalid {} {s:?}: expected {} bytes",
                        $what, $len
                    ))
                })?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_bytes_newtype!(Address, 20, "address");
hex_bytes_newtype!(Handle, 32, "ciphertext handle");

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    /// Address whose last byte is `n`, used for well-known placeholder contracts
    pub const fn from_low_u8(n: u8) -> Self {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address(bytes)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

/// Lifecycle state of the encrypted-value runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuntimeStatus::Idle => "idle",
            RuntimeStatus::Loading => "loading",
            RuntimeStatus::Ready => "ready",
            RuntimeStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Output of encrypting plaintext values for one `(contract, user)` pair.
/// Handles and proof are single-use and bound to that pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedInput {
    pub handles: Vec<Handle>,
    pub input_proof: Vec<u8>,
}

/// One handle to decrypt, together with the contract that owns it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptRequest {
    pub handle: Handle,
    pub contract_address: Address,
}

/// Employee row as read from the payroll ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeRecord {
    pub encrypted_per_period_salary: Handle,
    pub cycle_seconds: u64,
    pub last_claim_at: u64,
    pub active: bool,
}

/// Derived payroll view. Recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClaimState {
    /// Seconds until the next pay boundary, `None` when cycle metadata is unknown
    pub time_left_seconds: Option<u64>,
    pub periods_elapsed: u64,
    /// `None` when the per-period value is unknown or no period has elapsed
    pub claimable_amount: Option<BigUint>,
}

/// Confirmed inclusion of a ledger transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub success: bool,
}
