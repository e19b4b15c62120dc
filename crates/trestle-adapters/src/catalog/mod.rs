//! Blueprint catalogue adapters.

mod memory;

pub use memory::InMemoryCatalog;
