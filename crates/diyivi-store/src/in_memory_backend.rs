use diyivi_core::{CoreError, CoreResult, StoreKey, Timestamp, TtlStore};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone)]
enum Entry {
    Value(Vec<u8>),
    List(Vec<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Entry,
    expire_at: Timestamp,
}

impl Slot {
    fn is_live(&self, now: Timestamp) -> bool {
        self.expire_at > now
    }
}

/// In-memory `TtlStore`.
///
/// Used for development and tests, and as the default backend when no
/// database is configured. All operations run under one mutex, which is what
/// makes `push_if_empty` atomic.
pub struct InMemoryTtlStore {
    data: Mutex<HashMap<String, Slot>>,
}

fn lock_data(
    mutex: &Mutex<HashMap<String, Slot>>,
) -> CoreResult<MutexGuard<'_, HashMap<String, Slot>>> {
    mutex
        .lock()
        .map_err(|e| CoreError::Storage(format!("lock poisoned: {}", e)))
}

/// Remove `key` if it has expired, then return the live slot if any.
fn live_slot<'a>(
    data: &'a mut HashMap<String, Slot>,
    key: &StoreKey,
    now: Timestamp,
) -> Option<&'a mut Slot> {
    if data.get(key.as_str()).is_some_and(|slot| !slot.is_live(now)) {
        data.remove(key.as_str());
    }
    data.get_mut(key.as_str())
}

impl InMemoryTtlStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> CoreResult<usize> {
        let now = Timestamp::now();
        let mut data = lock_data(&self.data)?;
        let before = data.len();
        data.retain(|_, slot| slot.is_live(now));
        let purged = before - data.len();
        if purged > 0 {
            debug!(purged, "purged expired entries");
        }
        Ok(purged)
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn count(&self) -> usize {
        lock_data(&self.data).map(|d| d.len()).unwrap_or(0)
    }
}

impl Default for InMemoryTtlStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TtlStore for InMemoryTtlStore {
    fn put(&self, key: &StoreKey, value: &[u8], expire_at: Timestamp) -> CoreResult<()> {
        let mut data = lock_data(&self.data)?;
        data.insert(
            key.as_str().to_string(),
            Slot {
                entry: Entry::Value(value.to_vec()),
                expire_at,
            },
        );
        Ok(())
    }

    fn get(&self, key: &StoreKey) -> CoreResult<Option<Vec<u8>>> {
        let mut data = lock_data(&self.data)?;
        match live_slot(&mut data, key, Timestamp::now()) {
            Some(Slot {
                entry: Entry::Value(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(CoreError::Storage(format!("{} holds a list", key))),
            None => Ok(None),
        }
    }

    fn delete(&self, key: &StoreKey) -> CoreResult<bool> {
        let mut data = lock_data(&self.data)?;
        let live = live_slot(&mut data, key, Timestamp::now()).is_some();
        data.remove(key.as_str());
        Ok(live)
    }

    fn push(&self, key: &StoreKey, value: &[u8], expire_at: Timestamp) -> CoreResult<usize> {
        let mut data = lock_data(&self.data)?;
        match live_slot(&mut data, key, Timestamp::now()) {
            Some(slot) => match &mut slot.entry {
                Entry::List(items) => {
                    items.push(value.to_vec());
                    slot.expire_at = expire_at;
                    Ok(items.len())
                }
                Entry::Value(_) => Err(CoreError::Storage(format!("{} holds a value", key))),
            },
            None => {
                data.insert(
                    key.as_str().to_string(),
                    Slot {
                        entry: Entry::List(vec![value.to_vec()]),
                        expire_at,
                    },
                );
                Ok(1)
            }
        }
    }

    fn push_if_empty(
        &self,
        key: &StoreKey,
        value: &[u8],
        expire_at: Timestamp,
    ) -> CoreResult<bool> {
        let mut data = lock_data(&self.data)?;
        if live_slot(&mut data, key, Timestamp::now()).is_some() {
            return Ok(false);
        }
        data.insert(
            key.as_str().to_string(),
            Slot {
                entry: Entry::List(vec![value.to_vec()]),
                expire_at,
            },
        );
        Ok(true)
    }

    fn list(&self, key: &StoreKey) -> CoreResult<Vec<Vec<u8>>> {
        let mut data = lock_data(&self.data)?;
        match live_slot(&mut data, key, Timestamp::now()) {
            Some(Slot {
                entry: Entry::List(items),
                ..
            }) => Ok(items.clone()),
            Some(_) => Err(CoreError::Storage(format!("{} holds a value", key))),
            None => Ok(Vec::new()),
        }
    }
}
