//! Source cache with per-key single-flight loading.
//!
//! Each key maps to a shared [`OnceCell`]. The map lock is only held to find
//! or create the cell; the loader runs outside it, so loads of different keys
//! proceed in parallel while concurrent loads of the same key wait on the
//! first one.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::debug;

use crate::error::CacheError;

/// Shortest source text accepted from a loader.
pub const MIN_SOURCE_LEN: usize = 2;

/// Cache bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheConfig {
  /// Maximum number of keys, oldest evicted first. `0` means unbounded.
  pub capacity: usize,
  /// Age after which an entry is reloaded. `None` keeps entries forever.
  pub ttl: Option<Duration>,
}

struct Entry {
  source: Arc<str>,
  loaded_at: Instant,
}

type Slot = Arc<OnceCell<Entry>>;

#[derive(Default)]
struct CacheState {
  slots: HashMap<String, Slot>,
  /// Keys in insertion order, for eviction.
  order: VecDeque<String>,
}

impl CacheState {
  /// Find or create the slot for a key, evicting the oldest keys past capacity.
  fn slot_for(&mut self, key: &str, capacity: usize) -> Slot {
    if let Some(slot) = self.slots.get(key) {
      return slot.clone();
    }

    let slot = Slot::default();
    self.slots.insert(key.to_string(), slot.clone());
    self.order.push_back(key.to_string());
    self.evict_over(capacity, key);

    slot
  }

  /// Evict the oldest loaded keys until at most `capacity` remain.
  ///
  /// Slots still loading are never evicted, so their waiters and later
  /// callers share one load. The cache may sit above capacity until those
  /// loads publish.
  fn evict_over(&mut self, capacity: usize, keep: &str) {
    if capacity == 0 {
      return;
    }

    let excess = self.slots.len().saturating_sub(capacity);
    let victims: Vec<String> = self
      .order
      .iter()
      .filter(|k| k.as_str() != keep && self.slots.get(*k).is_some_and(|slot| slot.initialized()))
      .take(excess)
      .cloned()
      .collect();

    for victim in victims {
      debug!(key = %victim, "evicting cached source");
      self.remove(&victim);
    }
  }

  fn remove(&mut self, key: &str) -> bool {
    let removed = self.slots.remove(key).is_some();
    if removed {
      self.order.retain(|k| k != key);
    }
    removed
  }
}

/// Process-wide cache of script sources.
///
/// Cloning is cheap and clones share the same entries.
#[derive(Clone)]
pub struct SourceCache {
  name: Arc<str>,
  config: CacheConfig,
  state: Arc<Mutex<CacheState>>,
}

impl SourceCache {
  pub fn new(name: impl Into<Arc<str>>, config: CacheConfig) -> Self {
    Self {
      name: name.into(),
      config,
      state: Arc::new(Mutex::new(CacheState::default())),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn config(&self) -> CacheConfig {
    self.config
  }

  /// Get the source for `key`, running `loader` on a miss.
  ///
  /// The loader runs at most once per key across concurrent callers, and all
  /// of them observe the same text. A failed or too-short load leaves no
  /// entry behind, so the next call loads again.
  pub async fn get_or_load<F, Fut, E>(&self, key: &str, loader: F) -> Result<Arc<str>, CacheError<E>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<String, E>>,
    E: std::error::Error + 'static,
  {
    let slot = {
      let mut state = self.lock();
      if let Some(source) = self.live_source(&mut state, key) {
        debug!(cache = %self.name, key, "source cache hit");
        return Ok(source);
      }
      state.slot_for(key, self.config.capacity)
    };

    let cache = &self.name;
    let result = slot
      .get_or_try_init(move || async move {
        debug!(cache = %cache, key, "source cache miss, loading");
        let text = loader().await.map_err(|source| CacheError::Load {
          key: key.to_string(),
          source,
        })?;

        let len = text.chars().count();
        if len < MIN_SOURCE_LEN {
          return Err(CacheError::TooShort {
            key: key.to_string(),
            len,
            min: MIN_SOURCE_LEN,
          });
        }

        Ok(Entry {
          source: Arc::from(text),
          loaded_at: Instant::now(),
        })
      })
      .await;

    match result {
      Ok(entry) => {
        let source = entry.source.clone();
        self.publish(key, &slot);
        Ok(source)
      }
      Err(e) => {
        self.discard(key, &slot);
        Err(e)
      }
    }
  }

  /// Whether a loaded, unexpired source exists for `key`.
  pub fn contains(&self, key: &str) -> bool {
    let state = self.lock();
    state
      .slots
      .get(key)
      .and_then(|slot| slot.get())
      .is_some_and(|entry| !self.is_expired(entry))
  }

  /// Number of loaded sources.
  pub fn len(&self) -> usize {
    let state = self.lock();
    state.slots.values().filter(|slot| slot.initialized()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Keys of loaded sources, oldest first.
  pub fn keys(&self) -> Vec<String> {
    let state = self.lock();
    state
      .order
      .iter()
      .filter(|k| state.slots.get(*k).is_some_and(|slot| slot.initialized()))
      .cloned()
      .collect()
  }

  /// Drop the entry for `key`. Returns whether one existed.
  pub fn invalidate(&self, key: &str) -> bool {
    self.lock().remove(key)
  }

  /// Drop every entry.
  pub fn clear(&self) {
    let mut state = self.lock();
    state.slots.clear();
    state.order.clear();
  }

  fn lock(&self) -> MutexGuard<'_, CacheState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn live_source(&self, state: &mut CacheState, key: &str) -> Option<Arc<str>> {
    let (source, expired) = {
      let entry = state.slots.get(key)?.get()?;
      (entry.source.clone(), self.is_expired(entry))
    };

    if expired {
      debug!(cache = %self.name, key, "cached source expired");
      state.remove(key);
      return None;
    }
    Some(source)
  }

  fn is_expired(&self, entry: &Entry) -> bool {
    self.config.ttl.is_some_and(|ttl| entry.loaded_at.elapsed() >= ttl)
  }

  /// Re-insert a loaded slot whose key was dropped while it was loading,
  /// then apply the capacity bound deferred by in-flight loads.
  fn publish(&self, key: &str, slot: &Slot) {
    let mut state = self.lock();
    if !state.slots.contains_key(key) {
      state.slots.insert(key.to_string(), slot.clone());
      state.order.push_back(key.to_string());
    }
    state.evict_over(self.config.capacity, key);
  }

  /// Remove a slot left empty by a failed load.
  fn discard(&self, key: &str, slot: &Slot) {
    let mut state = self.lock();
    let ours = state
      .slots
      .get(key)
      .is_some_and(|current| Arc::ptr_eq(current, slot) && !current.initialized());
    if ours {
      state.remove(key);
    }
  }
}

impl std::fmt::Debug for SourceCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SourceCache")
      .field("name", &self.name)
      .field("config", &self.config)
      .field("len", &self.len())
      .finish()
  }
}
