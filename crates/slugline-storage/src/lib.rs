//! Record store backends for slugline.

pub mod memory;
pub mod mysql;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
pub use slugline_core::{Reactivation, RecordStore, StorageError};
