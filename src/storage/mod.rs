//! Storage implementations for different backends

pub mod in_memory;
pub mod mongodb;

pub use in_memory::InMemoryOrderRepository;
pub use mongodb::{MongoConnectionManager, MongoOrderRepository};
