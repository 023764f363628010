//! Exchange persistence.

use async_trait::async_trait;
use std::sync::Arc;
use switchyard_core::error::StorageError;
use tokio::sync::RwLock;

use crate::exchange::Exchange;

/// Where exchanges are kept.
///
/// Only the in-memory backend ships here; anything durable plugs in behind
/// this trait.
#[async_trait]
pub trait ExchangeStorage: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Persist a new exchange.
    async fn persist(&self, exchange: Exchange) -> std::result::Result<(), StorageError>;

    /// Get an exchange by ID.
    async fn get(&self, id: &str) -> std::result::Result<Option<Exchange>, StorageError>;

    /// Total number of stored exchanges.
    async fn count(&self) -> std::result::Result<usize, StorageError>;
}

/// Exchanges kept in a Vec. Useful for tests and single-process sessions.
pub struct InMemoryExchangeStorage {
    exchanges: Arc<RwLock<Vec<Exchange>>>,
}

impl InMemoryExchangeStorage {
    pub fn new() -> Self {
        Self {
            exchanges: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl Default for InMemoryExchangeStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeStorage for InMemoryExchangeStorage {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn persist(&self, exchange: Exchange) -> Result<(), StorageError> {
        let mut exchanges = self.exchanges.write().await;
        if exchanges.iter().any(|e| e.id == exchange.id) {
            return Err(StorageError::Backend(format!(
                "exchange {} already stored",
                exchange.id
            )));
        }
        exchanges.push(exchange);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Exchange>, StorageError> {
        let exchanges = self.exchanges.read().await;
        Ok(exchanges.iter().find(|e| e.id == id).cloned())
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.exchanges.read().await.len())
    }
}
