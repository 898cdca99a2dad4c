pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

pub use memory::MemoryViewStore;
pub use postgres::PostgresViewStore;
pub use sqlite::SqliteViewStore;
pub use trait_def::{StorageError, StorageResult, ViewStore};
