//! Secondary indices
//!
//! - `named`: explicitly managed indices, written through an `Index` handle
//! - `manager`: key indices, maintained automatically on property writes
//! - `ledger`: per-element reverse pointers used to clean both on removal

pub mod ledger;
pub mod manager;
pub mod named;

pub use ledger::{IndexRef, LedgerEntry, ReverseIndexLedger};
pub use manager::{KeyIndexCache, KeyIndexManager};
pub use named::Index;
