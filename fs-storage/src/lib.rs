pub mod base_storage;
pub mod file_storage;
pub mod memory_storage;

pub use base_storage::BaseStorage;
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;

/// Default location of the record collection, relative to the working directory.
pub const DEFAULT_STORAGE_FILE: &str = "data/users.json";
