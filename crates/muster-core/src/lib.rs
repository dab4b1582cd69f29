//! Foundational low-level utilities shared across Muster crates.
//!
//! Provides Unix-millisecond time helpers and the atomic file-write primitive
//! used by the per-tenant JSON store.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, MINUTE_MS};
