use crate::core::connection::RpcConnection;
use crate::error::BoxError;
use async_trait::async_trait;
use std::sync::Arc;

/// Capabilities of the process hosting the SDK.
/// A browser embedding can prompt for signatures; a headless test host usually cannot.
#[async_trait]
pub trait HostEnvironment: Send + Sync {
    /// Whether an interactive signing context (wallet prompt) is available
    fn can_prompt_signatures(&self) -> bool;

    /// Whether outbound network connections may be opened
    fn can_open_connections(&self) -> bool;

    /// Open a direct JSON-RPC connection to `url`
    async fn open_rpc(&self, url: &str) -> Result<Arc<dyn RpcConnection>, BoxError>;
}
