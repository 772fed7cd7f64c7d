//! # oatc — append-only, stack-structured personal notes database
//!
//! Format guarantees (frozen):
//! - All numeric fields are big-endian; never negotiated
//! - The 13-byte header is magic + major version + stack pointer; the
//!   stack pointer is always the *last* write of an append (crash safety)
//! - Frames are length-padded on both ends so the stack can be walked
//!   forward (scan) or backward (pop) without any separate index
//! - Feature bitfield bit positions are part of the format contract; new
//!   features take the next unused bit, never reuse one
//! - Maintenance operations (sort/import/trim/filter) never mutate a
//!   store in place — they write a `<path>.tmp` and atomically rename it
//!   over the original, so a crash mid-rewrite always leaves a
//!   discoverable, intact original

pub mod config;
pub mod error;
pub mod frame;
pub mod home;
pub mod item;
pub mod maintenance;
pub mod query;
pub mod render;
pub mod store;

pub use config::Config;
pub use error::OatError;
pub use item::{ItemFeatures, ItemKind, ItemMetadata, VideoKind};
pub use query::{binary_search_by_id, scan_all_metadata, tail};
pub use store::LogStore;
