//! # Recency Cache
//!
//! TTL-bounded store of recent events per type, with bounded recent-id
//! lists for query-time lookups.
//!
//! ## Memory Bounds
//!
//! - Entry expiry is lazy at read time, with a periodic sweep piggybacked on
//!   writes. A read past TTL returns absent, never an error.
//! - The per-type recent-id list is maintained by prepend + truncate; ids
//!   evicted by truncation take their cached entries with them, so memory is
//!   bounded deterministically regardless of publish volume.
//!
//! The cache is shared across bus instances (`Arc<RecencyCache>`); put and
//! trim happen under one write lock so concurrent writers never observe a
//! half-applied update.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

use pulse_types::Event;

struct StoredEvent {
    event: Event,
    expires_at: Instant,
}

struct CacheInner {
    /// `type:id -> (event, expiry)`.
    entries: HashMap<String, StoredEvent>,
    /// `type -> [id...]`, newest first, capped.
    recent: HashMap<String, VecDeque<String>>,
    /// Last sweep timestamp.
    last_gc: Instant,
}

/// Bounded store of recently published events.
pub struct RecencyCache {
    inner: RwLock<CacheInner>,
    ttl: Duration,
    recent_cap: usize,
    gc_interval: Duration,
}

impl RecencyCache {
    /// Default entry lifetime.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

    /// Default recent-id list cap per event type.
    pub const DEFAULT_RECENT_CAP: usize = 100;

    /// Default sweep interval.
    pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(60);

    /// Cache with default TTL, cap, and sweep interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(
            Self::DEFAULT_TTL,
            Self::DEFAULT_RECENT_CAP,
            Self::DEFAULT_GC_INTERVAL,
        )
    }

    /// Cache with custom settings.
    #[must_use]
    pub fn with_config(ttl: Duration, recent_cap: usize, gc_interval: Duration) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                entries: HashMap::new(),
                recent: HashMap::new(),
                last_gc: Instant::now(),
            }),
            ttl,
            recent_cap,
            gc_interval,
        }
    }

    /// Store an event and prepend its id to the type's recent list.
    ///
    /// Both updates happen under one write lock; truncated ids are evicted
    /// from the entry map in the same critical section.
    pub fn put(&self, event: &Event) {
        let now = Instant::now();
        let mut inner = self.inner.write();

        if now.duration_since(inner.last_gc) > self.gc_interval {
            inner.entries.retain(|_, stored| stored.expires_at > now);
            inner.last_gc = now;
        }

        let key = Self::entry_key(&event.event_type, &event.id);
        inner.entries.insert(
            key,
            StoredEvent {
                event: event.clone(),
                expires_at: now + self.ttl,
            },
        );

        let recent = inner.recent.entry(event.event_type.clone()).or_default();
        recent.push_front(event.id.clone());
        let mut evicted = Vec::new();
        while recent.len() > self.recent_cap {
            if let Some(id) = recent.pop_back() {
                evicted.push(id);
            }
        }
        for id in evicted {
            inner
                .entries
                .remove(&Self::entry_key(&event.event_type, &id));
        }

        trace!(event_type = %event.event_type, id = %event.id, "Event cached");
    }

    /// Fetch a cached event. Returns `None` past TTL; the expired entry is
    /// dropped on the way out.
    #[must_use]
    pub fn get(&self, event_type: &str, id: &str) -> Option<Event> {
        let key = Self::entry_key(event_type, id);
        let now = Instant::now();

        {
            let inner = self.inner.read();
            match inner.entries.get(&key) {
                Some(stored) if stored.expires_at > now => return Some(stored.event.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: upgrade to a write lock to drop it.
        self.inner.write().entries.remove(&key);
        None
    }

    /// Recent event ids for a type, newest first, never longer than the cap.
    #[must_use]
    pub fn recent_ids(&self, event_type: &str) -> Vec<String> {
        self.inner
            .read()
            .recent
            .get(event_type)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live entries (expired-but-unswept entries included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    fn entry_key(event_type: &str, id: &str) -> String {
        format!("{event_type}:{id}")
    }
}

impl Default for RecencyCache {
    fn default() -> Self {
        Self::new()
    }
}
