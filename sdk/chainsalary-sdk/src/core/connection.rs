use crate::error::BoxError;
use crate::types::ChainId;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Wallet-style provider (EIP-1193): a single `request` entry point.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, BoxError>;
}

/// Direct URL-based JSON-RPC connection.
#[async_trait]
pub trait RpcConnection: Send + Sync {
    /// Chain id reported by the node's network metadata
    async fn chain_id(&self) -> Result<ChainId, BoxError>;

    /// Raw JSON-RPC call
    async fn send(&self, method: &str, params: Value) -> Result<Value, BoxError>;
}

/// The connection a runtime is bound to.
#[derive(Clone)]
pub enum ChainConnection {
    /// Provider injected by a browser wallet
    Injected(Arc<dyn Eip1193Provider>),
    /// Node reached directly by URL
    Url(String),
}

impl ChainConnection {
    pub fn url(&self) -> Option<&str> {
        match self {
            ChainConnection::Injected(_) => None,
            ChainConnection::Url(url) => Some(url),
        }
    }

    /// Identity comparison: same provider object, or same URL
    pub fn same_as(&self, other: &ChainConnection) -> bool {
        match (self, other) {
            (ChainConnection::Injected(a), ChainConnection::Injected(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            },
            (ChainConnection::Url(a), ChainConnection::Url(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for ChainConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainConnection::Injected(_) => f.write_str("Injected(..)"),
            ChainConnection::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

/// Parse an `eth_chainId` quantity (`"0x7a69"`), tolerating plain numbers.
pub fn parse_chain_id(value: &Value) -> Option<ChainId> {
    let id = match value {
        Value::String(s) => match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(digits) => u64::from_str_radix(digits, 16).ok(),
            None => s.parse().ok(),
        },
        Value::Number(n) => n.as_u64(),
        _ => None,
    };
    id.filter(|id| *id > 0)
}
