pub mod journal;
pub mod memory;
pub mod snapshot;
pub mod traits;

pub use journal::{JournalEntry, JournalError, JournalReader, JournalWriter};
pub use memory::{LiveBookError, MemoryLiveBook, MemoryStore};
pub use snapshot::{load_snapshot, write_snapshot, SnapshotError, StateSnapshot};
pub use traits::{Commit, CustomerStore, LiveBook, ProfileWrite, StoreError};
