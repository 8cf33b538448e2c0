//! # SparseDb - A Memory-Mapped Record Store for Sparse-Vector Analytics
//!
//! SparseDb is the storage substrate of a sparse-vector analytics toolkit
//! (inverted indices, similarity matrices, ranking tools). It persists
//! variable-length records in a memory-mapped heap addressed by integer id,
//! and interns strings into stable sequential ids on top of that.
//!
//! ## Architecture
//!
//! The crate consists of four storage layers and one concurrency helper:
//!
//! - **Memory Window**: maps a backing file, growing and remapping it
//!   transparently, with a positional-read fallback
//! - **Vector Header**: the fixed prefix (count, capacity, element size,
//!   ownership tag) carried by every growable payload
//! - **Record Store**: id-addressed variable-length chunks with in-place
//!   growth, relocation, and explicit defragmentation
//! - **Dictionary**: a string-to-sequential-id index with an
//!   open-addressing slot table over a private key store
//! - **Worker Pool**: a fixed thread pool fed through a bounded lock-free
//!   queue, for fanning out shard-level jobs
//!
//! Persistence is single-writer, fail-fast, and best-effort: there is no
//! write-ahead log and no transactions. Space freed by deletes is only
//! reclaimed by an explicit [`defragment`] pass.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use sparsedb::{Dictionary, Mode, RecordStore, SparseEntry};
//!
//! # fn main() -> Result<(), sparsedb::Error> {
//! // Intern terms into stable ids
//! let mut terms = Dictionary::open("./index/terms", Mode::Update)?;
//! let id = terms.insert("amino")?.unwrap();
//!
//! // Store that term's posting row
//! let mut rows = RecordStore::open("./index/rows", Mode::Update)?;
//! rows.put_entries(id, &[SparseEntry::new(3, 0.5), SparseEntry::new(9, 1.0)])?;
//!
//! if let Some(row) = rows.get_entries(id)? {
//!     println!("{} entries", row.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod config;
pub mod dict;
pub mod error;
pub mod header;
pub mod pool;
pub mod store;
pub mod window;

// Re-exports
pub use config::{Mode, Options};
pub use dict::Dictionary;
pub use error::{Error, Result};
pub use header::{Ownership, SparseEntry, VecHeader};
pub use pool::{SyncQueue, WorkerPool};
pub use store::{defragment, RecordStore};
pub use window::MemoryWindow;
