use crate::error::BoxError;
use crate::types::Address;
use async_trait::async_trait;
use serde_json::Value;

/// Abstraction for the wallet that approves decryption grants.
/// Signing is the one user-facing prompt in the grant flow.
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    async fn address(&self) -> Result<Address, BoxError>;

    /// Sign EIP-712 typed data. `types` excludes `EIP712Domain`.
    /// Returns the 65-byte signature as `0x`-prefixed hex, or Err if declined/failed.
    async fn sign_typed_data(
        &self,
        domain: &Value,
        types: &Value,
        message: &Value,
    ) -> Result<String, String>;
}
