//! Storage layer: entries, expiry, and the backing store variants.
//!
//! The [`backend::Backend`] trait is the seam between the operation engine
//! and persistence. The memory, file, and hybrid variants share one
//! [`table::MemoryTable`]; the remote variant forwards to an external RESP
//! server. [`expiry`] holds the TTL math every read path applies plus the
//! background [`expiry::Sweeper`].

pub mod backend;
pub mod entry;
pub mod expiry;
pub mod file;
pub mod glob;
pub mod hybrid;
pub mod memory;
pub mod remote;
pub mod snapshot;
pub mod table;

pub use backend::{open_backend, Backend, StorageUsage};
pub use entry::{now_ms, Entry};
pub use expiry::{
    compute_expiry, is_live, remaining_seconds, Sweeper, TTL_MISSING, TTL_NONE,
};
pub use file::FileBackend;
pub use glob::KeyPattern;
pub use hybrid::{HybridBackend, Syncer};
pub use memory::MemoryBackend;
pub use remote::RemoteBackend;
pub use snapshot::{read_snapshot, write_snapshot};
