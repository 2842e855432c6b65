use crate::error::CoreResult;
use crate::types::{StoreKey, Timestamp};

// ---------------------------------------------------------------------------
// TtlStore: short-lived persistence for exchanges and signature requests
//
// Every entry carries an absolute expiry. Once that instant has passed the
// entry must behave exactly as if it had never been written: reads return
// None or an empty list, deletes return false.
// ---------------------------------------------------------------------------

pub trait TtlStore: Send + Sync {
    fn put(&self, key: &StoreKey, value: &[u8], expire_at: Timestamp) -> CoreResult<()>;
    fn get(&self, key: &StoreKey) -> CoreResult<Option<Vec<u8>>>;
    fn delete(&self, key: &StoreKey) -> CoreResult<bool>;

    /// Append to the list at `key` and move the whole list's expiry to
    /// `expire_at`. Returns the new list length.
    fn push(&self, key: &StoreKey, value: &[u8], expire_at: Timestamp) -> CoreResult<usize>;

    /// Atomic append that only succeeds when the list at `key` has no live
    /// entries. Returns true if the value was stored.
    fn push_if_empty(&self, key: &StoreKey, value: &[u8], expire_at: Timestamp)
        -> CoreResult<bool>;

    /// All live list entries in insertion order.
    fn list(&self, key: &StoreKey) -> CoreResult<Vec<Vec<u8>>>;
}
