//! DIYivi core
//!
//! Shared vocabulary for every DIYivi crate: timestamps, typed identifiers,
//! bearer capability secrets, the core error type and the `TtlStore`
//! contract the protocol engines persist through.

pub mod crypto;
pub mod error;
pub mod traits;
pub mod types;

pub use crypto::*;
pub use error::*;
pub use traits::*;
pub use types::*;
