use crate::error::BoxError;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Key-value persistence for serialized authorization grants.
/// A missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait GrantStorage: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, BoxError>;
    async fn set_item(&self, key: &str, value: String) -> Result<(), BoxError>;
    async fn remove_item(&self, key: &str) -> Result<(), BoxError>;
}

/// Process-local storage, lost when dropped
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    items: RwLock<HashMap<String, String>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl GrantStorage for InMemoryStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> Result<(), BoxError> {
        self.items.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), BoxError> {
        self.items.write().await.remove(key);
        Ok(())
    }
}
