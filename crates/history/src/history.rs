//! ConversationHistory — the current exchange, its undo stack, and storage.
//!
//! `store` never moves the current pointer. The caller commits an exchange
//! with `set_current` once the whole turn has succeeded, which is what lets
//! a failed turn leave the history exactly as it found it.
//!
//! Turns against one history are not synchronized with each other: each
//! call holds the state lock only for its own transition, so callers must
//! serialize turns themselves.

use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};
use switchyard_core::error::{Result, StorageError};
use switchyard_core::provider::{ChatRequest, ChatResponse};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::exchange::Exchange;
use crate::stack::HistoryStack;
use crate::storage::{ExchangeStorage, InMemoryExchangeStorage};

/// A saved copy of the undo state, used to roll back a failed turn.
#[derive(Debug, Clone)]
pub struct HistorySnapshot(HistoryStack<Arc<Exchange>>);

pub struct ConversationHistory {
    storage: Arc<dyn ExchangeStorage>,
    state: Mutex<HistoryStack<Arc<Exchange>>>,
}

impl ConversationHistory {
    pub fn new(storage: Arc<dyn ExchangeStorage>) -> Self {
        Self {
            storage,
            state: Mutex::new(HistoryStack::new()),
        }
    }

    /// A history backed by [`InMemoryExchangeStorage`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryExchangeStorage::new()))
    }

    pub fn storage(&self) -> &Arc<dyn ExchangeStorage> {
        &self.storage
    }

    fn transition(
        &self,
        f: impl FnOnce(HistoryStack<Arc<Exchange>>) -> HistoryStack<Arc<Exchange>>,
    ) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = f(std::mem::take(&mut *state));
    }

    pub fn current(&self) -> Option<Arc<Exchange>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current()
            .cloned()
    }

    /// Make `exchange` current. `None` means "no conversation" and keeps the
    /// undo stack.
    pub fn set_current(&self, exchange: Option<Arc<Exchange>>) {
        debug!(
            exchange_id = exchange.as_ref().map(|e| e.id.as_str()),
            "Setting current exchange"
        );
        self.transition(|state| state.set_current(exchange));
    }

    /// Step back one exchange; returns the new current.
    pub fn undo(&self) -> Option<Arc<Exchange>> {
        self.transition(HistoryStack::undo);
        let current = self.current();
        debug!(
            exchange_id = current.as_ref().map(|e| e.id.as_str()),
            "Undo"
        );
        current
    }

    /// Number of exchanges that `undo` can step back through.
    pub fn depth(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .depth()
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot(
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        )
    }

    pub fn restore(&self, snapshot: HistorySnapshot) {
        self.transition(|_| snapshot.0);
    }

    /// Create and persist a new exchange continuing `previous`.
    ///
    /// The session carries over from `previous`; without one a new session
    /// starts. The exchange is returned but not made current.
    pub async fn store(
        &self,
        previous: Option<&Exchange>,
        request: ChatRequest,
        response: Option<ChatResponse>,
    ) -> Result<Arc<Exchange>> {
        let session_id = previous
            .map(|p| p.session_id.clone())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let now = Utc::now();
        let exchange = Exchange {
            id: Uuid::new_v4().to_string(),
            session_id,
            request,
            response,
            created_at: now,
            updated_at: now,
            previous_message_id: previous.map(|p| p.id.clone()),
        };

        self.storage.persist(exchange.clone()).await?;
        debug!(
            exchange_id = %exchange.id,
            session_id = %exchange.session_id,
            previous = exchange.previous_message_id.as_deref(),
            "Stored exchange"
        );
        Ok(Arc::new(exchange))
    }

    pub async fn retrieve(&self, id: &str) -> Result<Arc<Exchange>> {
        self.storage
            .get(id)
            .await?
            .map(Arc::new)
            .ok_or_else(|| StorageError::NotFound(id.to_string()).into())
    }

    /// The chain ending at `exchange`, oldest first.
    ///
    /// A broken link ends the walk early.
    pub async fn chain(&self, exchange: &Arc<Exchange>) -> Result<Vec<Arc<Exchange>>> {
        let mut chain = vec![exchange.clone()];
        let mut cursor = exchange.previous_message_id.clone();

        while let Some(id) = cursor {
            match self.retrieve(&id).await {
                Ok(previous) => {
                    cursor = previous.previous_message_id.clone();
                    chain.push(previous);
                }
                Err(switchyard_core::Error::Storage(StorageError::NotFound(_))) => {
                    warn!(exchange_id = %id, "Conversation chain has a missing link");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        chain.reverse();
        Ok(chain)
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use switchyard_core::Error;
    use switchyard_core::message::Message;

    fn request(text: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![Message::user(text)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn set_current_then_undo() {
        let history = ConversationHistory::in_memory();
        let a = history.store(None, request("a"), None).await.unwrap();
        let b = history.store(Some(&a), request("b"), None).await.unwrap();

        history.set_current(Some(a.clone()));
        history.set_current(Some(b));
        let current = history.undo();

        assert_eq!(current.unwrap().id, a.id);
        assert_eq!(history.depth(), 0);
    }

    #[tokio::test]
    async fn store_does_not_move_current() {
        let history = ConversationHistory::in_memory();
        let stored = history.store(None, request("hello"), None).await.unwrap();
        assert!(history.current().is_none());
        assert_eq!(history.retrieve(&stored.id).await.unwrap().id, stored.id);
    }

    #[tokio::test]
    async fn store_links_and_continues_session() {
        let history = ConversationHistory::in_memory();
        let first = history.store(None, request("one"), None).await.unwrap();
        let second = history.store(Some(&first), request("two"), None).await.unwrap();

        assert!(first.previous_message_id.is_none());
        assert_eq!(second.previous_message_id.as_deref(), Some(first.id.as_str()));
        assert_eq!(second.session_id, first.session_id);

        let fresh = history.store(None, request("three"), None).await.unwrap();
        assert_ne!(fresh.session_id, first.session_id);
    }

    #[tokio::test]
    async fn storing_twice_from_same_previous_branches() {
        let history = ConversationHistory::in_memory();
        let root = history.store(None, request("root"), None).await.unwrap();
        let left = history.store(Some(&root), request("left"), None).await.unwrap();
        let right = history.store(Some(&root), request("right"), None).await.unwrap();

        assert_ne!(left.id, right.id);
        assert_eq!(left.previous_message_id, right.previous_message_id);
        assert_eq!(history.storage().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn retrieve_missing_is_not_found() {
        let history = ConversationHistory::in_memory();
        let err = history.retrieve("nope").await.unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::NotFound(id)) if id == "nope"));
    }

    #[tokio::test]
    async fn snapshot_restore_rolls_back() {
        let history = ConversationHistory::in_memory();
        let a = history.store(None, request("a"), None).await.unwrap();
        history.set_current(Some(a.clone()));
        let snapshot = history.snapshot();

        let b = history.store(Some(&a), request("b"), None).await.unwrap();
        history.set_current(Some(b));
        assert_eq!(history.depth(), 1);

        history.restore(snapshot);
        assert_eq!(history.current().unwrap().id, a.id);
        assert_eq!(history.depth(), 0);
    }

    #[tokio::test]
    async fn chain_walks_back_to_root() {
        let history = ConversationHistory::in_memory();
        let a = history.store(None, request("a"), None).await.unwrap();
        let b = history.store(Some(&a), request("b"), None).await.unwrap();
        let c = history.store(Some(&b), request("c"), None).await.unwrap();

        let ids: Vec<_> = history
            .chain(&c)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id.clone())
            .collect();
        assert_eq!(ids, vec![a.id.clone(), b.id.clone(), c.id.clone()]);
    }

    struct FailingStorage;

    #[async_trait]
    impl ExchangeStorage for FailingStorage {
        fn name(&self) -> &str {
            "failing"
        }
        async fn persist(&self, _exchange: Exchange) -> std::result::Result<(), StorageError> {
            Err(StorageError::Backend("disk full".into()))
        }
        async fn get(&self, _id: &str) -> std::result::Result<Option<Exchange>, StorageError> {
            Ok(None)
        }
        async fn count(&self) -> std::result::Result<usize, StorageError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn storage_failure_propagates() {
        let history = ConversationHistory::new(Arc::new(FailingStorage));
        let err = history.store(None, request("x"), None).await.unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::Backend(_))));
        assert!(history.current().is_none());
    }
}
