//! DIYivi TTL stores
//!
//! Implementations of `diyivi_core::TtlStore`. Expired entries are dropped
//! lazily on access and can be swept in bulk with `purge_expired`.

pub mod in_memory_backend;

#[cfg(feature = "sqlite")]
pub mod storage;

pub use in_memory_backend::InMemoryTtlStore;

#[cfg(feature = "sqlite")]
pub use storage::SqliteTtlStore;
