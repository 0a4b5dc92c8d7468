//! Database query functions.
//!
//! Every function takes the pool directly; callers that need write
//! serialization go through [`crate::ArchiveDb`].

mod entry;

pub use entry::*;
