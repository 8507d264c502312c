//! Persistence implementations for token storage.

mod token_storage;

pub use token_storage::{FileTokenStorage, MemoryTokenStorage};
