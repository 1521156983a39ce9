pub mod memory;
pub mod playstore;

pub use memory::MemorySource;
pub use playstore::PlayStoreSource;
