use std::{collections::VecDeque, sync::Arc};

use tokio::sync::Mutex;
use tracing::warn;

use super::types::chat_exchange::{ChatExchange, HistoryFilter};

/// Per-process holding area for exchanges the row store could not accept.
///
/// Not shared across instances. Oldest entries are evicted once `capacity` is reached.
#[derive(Clone)]
pub struct ExchangeBuffer {
    inner: Arc<Mutex<VecDeque<ChatExchange>>>,
    capacity: usize,
}

impl ExchangeBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn push(&self, exchange: ChatExchange) {
        let mut guard = self.inner.lock().await;
        if guard.len() >= self.capacity {
            guard.pop_front();
            warn!(capacity = self.capacity, "exchange buffer full, evicting oldest entry");
        }
        guard.push_back(exchange);
    }

    /// Buffered exchanges matching `filter`, newest first, at most `limit`.
    pub async fn recent(&self, filter: &HistoryFilter, limit: usize) -> Vec<ChatExchange> {
        let guard = self.inner.lock().await;
        let mut matching: Vec<ChatExchange> = guard
            .iter()
            .filter(|exchange| filter.matches(exchange))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        matching
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
