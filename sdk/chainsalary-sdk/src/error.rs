use thiserror::Error;

/// Boxed error returned by consumed collaborator traits
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where a mutating ledger call stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStage {
    /// Rejected before anything reached the network
    NotBroadcast,
    /// Broadcast, but inclusion was never confirmed
    Unconfirmed { tx_hash: String },
}

impl std::fmt::Display for TxStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TxStage::NotBroadcast => write!(f, "rejected before broadcast"),
            TxStage::Unconfirmed { tx_hash } => write!(f, "broadcast as {tx_hash} but not confirmed"),
        }
    }
}

/// SDK-specific error types for ChainSalary operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SdkError {
    /// Required host capability missing (no interactive signing context, no network)
    #[error("Environment error: {0}")]
    Environment(String),

    /// Backend selection or construction failed
    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    /// Production SDK failed self-initialization
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// User or wallet declined a signature
    #[error("Signing rejected: {0}")]
    SigningRejected(String),

    /// Cached authorization failed validation
    #[error("Malformed authorization grant: {0}")]
    MalformedGrant(String),

    /// Capability failed to encrypt an input
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Capability failed to decrypt a handle
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Ledger submission or confirmation failed
    #[error("Transaction error ({stage}): {reason}")]
    Transaction { stage: TxStage, reason: String },

    /// A mutating call is already outstanding for this session
    #[error("Another ledger action is still in flight")]
    Busy,

    /// Connection or RPC error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Persistence collaborator failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Caller-supplied value could not be parsed or is out of range
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The encrypted-value runtime is not available yet
    #[error("Runtime not ready")]
    NotReady,
}

impl SdkError {
    pub(crate) fn not_broadcast(reason: impl ToString) -> Self {
        SdkError::Transaction {
            stage: TxStage::NotBroadcast,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn unconfirmed(tx_hash: impl Into<String>, reason: impl ToString) -> Self {
        SdkError::Transaction {
            stage: TxStage::Unconfirmed {
                tx_hash: tx_hash.into(),
            },
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(e: serde_json::Error) -> Self {
        SdkError::InvalidInput(format!("JSON error: {e}"))
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;
