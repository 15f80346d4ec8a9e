//! quizrank-store: Persistence gateway implementation.
//!
//! `MemoryStore` keeps every record in memory behind a single lock and
//! persists to a JSON snapshot between runs.

pub mod memory;
pub mod snapshot;

pub use memory::MemoryStore;
pub use snapshot::{load_snapshot, save_snapshot, Snapshot};
