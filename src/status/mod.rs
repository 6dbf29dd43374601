//! Status distribution - Per-order broadcast topics with bounded replay

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

use crate::core::{OrderId, OrderStatus, StatusEvent};

/// Fan-out state for one order: a live channel plus a bounded ring of
/// recent events replayed to late subscribers.
struct Topic {
    state: Mutex<TopicState>,
    tx: broadcast::Sender<StatusEvent>,
}

struct TopicState {
    ring: VecDeque<StatusEvent>,
    next_seq: u32,
}

/// Routes status events to every observer of an order.
///
/// Publishing is synchronous and assigns each event its per-order
/// sequence number; with no observers registered it only records the
/// event in the replay ring.
pub struct StatusDistributor {
    topics: DashMap<OrderId, Arc<Topic>>,
    replay_capacity: usize,
}

impl StatusDistributor {
    pub fn new(replay_capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            replay_capacity: replay_capacity.max(1),
        }
    }

    fn topic(&self, order_id: OrderId) -> Arc<Topic> {
        self.topics
            .entry(order_id)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.replay_capacity.max(16));
                Arc::new(Topic {
                    state: Mutex::new(TopicState {
                        ring: VecDeque::with_capacity(self.replay_capacity),
                        next_seq: 0,
                    }),
                    tx,
                })
            })
            .clone()
    }

    /// Stamp and deliver one event. The ring and the live channel are
    /// updated under the same lock, so every subscriber sees events in
    /// publish order.
    pub fn publish(&self, order_id: OrderId, status: OrderStatus) -> StatusEvent {
        let topic = self.topic(order_id);
        let mut state = topic.state.lock();

        let event = StatusEvent {
            order_id,
            sequence: state.next_seq,
            timestamp: Utc::now(),
            status,
        };
        state.next_seq += 1;

        if state.ring.len() == self.replay_capacity {
            state.ring.pop_front();
        }
        state.ring.push_back(event.clone());

        // fails only when no receiver is registered
        let _ = topic.tx.send(event.clone());

        event
    }

    /// Subscribe to an order's events. Recent events are replayed first,
    /// oldest first. The receiver is registered under the topic lock, so
    /// nothing published in between is missed.
    pub fn subscribe(&self, order_id: OrderId) -> Subscription {
        let topic = self.topic(order_id);
        let state = topic.state.lock();
        let rx = topic.tx.subscribe();
        let replay: VecDeque<StatusEvent> = state.ring.iter().cloned().collect();
        drop(state);

        Subscription {
            replay,
            rx,
            last_seq: None,
        }
    }

    /// Drop an order's topic once nobody cares anymore. Live subscribers
    /// drain their buffered events, then their stream ends.
    pub fn release(&self, order_id: OrderId) {
        self.topics.remove(&order_id);
    }

    /// Number of live topics
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

/// A live view of one order's status stream. Dropping it unsubscribes
/// without affecting other observers.
pub struct Subscription {
    replay: VecDeque<StatusEvent>,
    rx: broadcast::Receiver<StatusEvent>,
    last_seq: Option<u32>,
}

impl Subscription {
    /// Next event, replayed history first. `None` once the topic is
    /// released and everything buffered has been drained.
    pub async fn next(&mut self) -> Option<StatusEvent> {
        if let Some(event) = self.replay.pop_front() {
            self.last_seq = Some(event.sequence);
            return Some(event);
        }
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    // skip anything already covered by the replay
                    if let Some(last) = self.last_seq {
                        if event.sequence <= last {
                            continue;
                        }
                    }
                    self.last_seq = Some(event.sequence);
                    return Some(event);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
