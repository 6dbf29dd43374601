//! Adapters - In-memory persistence and active-order cache

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::core::{
    ActiveCache, Error, Order, OrderId, OrderSnapshot, OrderStore, Result, StatusEvent,
};

/// In-memory order store: the order plus its append-only event history.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: DashMap<OrderId, StoredOrder>,
}

struct StoredOrder {
    order: Order,
    events: Vec<StatusEvent>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn create(&self, order: &Order) -> Result<()> {
        self.orders.insert(
            order.id,
            StoredOrder {
                order: order.clone(),
                events: Vec::new(),
            },
        );
        Ok(())
    }

    async fn append(&self, event: &StatusEvent) -> Result<()> {
        match self.orders.get_mut(&event.order_id) {
            Some(mut stored) => {
                stored.events.push(event.clone());
                Ok(())
            }
            None => Err(Error::Store(format!(
                "no record for order {}",
                event.order_id
            ))),
        }
    }

    async fn history(&self, order_id: OrderId) -> Result<Vec<StatusEvent>> {
        match self.orders.get(&order_id) {
            Some(stored) => Ok(stored.events.clone()),
            None => Err(Error::UnknownOrder(order_id)),
        }
    }
}

/// In-memory active-order cache. Entries expire after the TTL even when
/// removal is missed; expiry is enforced on read and swept on write.
pub struct MemoryActiveCache {
    entries: DashMap<OrderId, CacheEntry>,
    ttl: Duration,
}

struct CacheEntry {
    snapshot: OrderSnapshot,
    expires_at: DateTime<Utc>,
}

impl MemoryActiveCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl ActiveCache for MemoryActiveCache {
    async fn put(&self, snapshot: OrderSnapshot) -> Result<()> {
        self.sweep();
        let order_id = snapshot.order.id;
        self.entries.insert(
            order_id,
            CacheEntry {
                snapshot,
                expires_at: Utc::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn remove(&self, order_id: OrderId) -> Result<()> {
        self.entries.remove(&order_id);
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<OrderSnapshot>> {
        if let Some(entry) = self.entries.get(&order_id) {
            if entry.expires_at > Utc::now() {
                return Ok(Some(entry.snapshot.clone()));
            }
        }
        // expiry re-checked under the write lock; a concurrent fresh put survives
        self.entries
            .remove_if(&order_id, |_, entry| entry.expires_at <= Utc::now());
        Ok(None)
    }
}
