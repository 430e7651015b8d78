use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

use parking_lot::Mutex;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(50);

struct Entry {
    tx_hash: String,
    deadline: Instant,
}

struct Inner {
    entries: HashMap<String, Entry>,
    order: VecDeque<String>,
}

/// Ephemeral receipt/data-id → originating-transaction-hash map with the
/// semantics of an external `SET key value EX ttl` store: entries expire
/// after the TTL and the map never grows past its capacity (oldest
/// insertions evicted first). Constructed once and injected into the driver;
/// losing an entry only degrades attribution, never correctness.
pub struct CausalityCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    capacity: usize,
}

impl CausalityCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            ttl,
            capacity,
        }
    }

    pub fn set(&self, key: &str, tx_hash: &str) {
        let mut inner = self.inner.lock();
        let deadline = Instant::now() + self.ttl;
        inner.entries.insert(
            key.to_string(),
            Entry {
                tx_hash: tx_hash.to_string(),
                deadline,
            },
        );
        inner.order.push_back(key.to_string());
        self.evict(&mut inner);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(entry) if entry.deadline > Instant::now() => Some(entry.tx_hash.clone()),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Bounded-retry lookup for readers racing a writer that has not cached
    /// the parent yet. Exhaustion is an ordinary miss.
    pub async fn get_retry(&self, key: &str) -> Option<String> {
        for attempt in 0..RETRY_ATTEMPTS {
            if let Some(hash) = self.get(key) {
                return Some(hash);
            }
            if attempt + 1 < RETRY_ATTEMPTS {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(&self, inner: &mut Inner) {
        let now = Instant::now();
        // Expired entries first, then insertion order. The order queue may
        // hold stale keys for entries that were overwritten; dropping a key
        // whose entry is still live is prevented by the deadline check plus
        // the explicit capacity loop below.
        while let Some(front) = inner.order.front() {
            let expired = match inner.entries.get(front) {
                Some(entry) => entry.deadline <= now,
                None => true,
            };
            if !expired {
                break;
            }
            let key = inner.order.pop_front().unwrap();
            if let Some(entry) = inner.entries.get(&key) {
                if entry.deadline <= now {
                    inner.entries.remove(&key);
                }
            }
        }
        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(key) => {
                    inner.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
