//! Key encoding for the graph-on-KV layout
//!
//! - `tuple`: order-preserving, prefix-safe tuple packing
//! - `schema`: the per-graph key schema built on top of it

pub mod schema;
pub mod tuple;

pub use schema::KeySpace;
pub use tuple::{covers, pack, range_end, unpack, CodecError, CodecResult, KeyPart, Tuple};
