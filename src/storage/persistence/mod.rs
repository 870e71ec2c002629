//! Knowledge store backends.

mod filesystem;
mod front_matter;
mod memory;
mod sqlite;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
