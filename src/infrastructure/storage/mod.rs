//! Storage infrastructure - Blob store implementations

mod factory;
mod in_memory;
mod s3;

pub use factory::{StorageFactory, StorageType};
pub use in_memory::InMemoryBlobStore;
pub use s3::S3BlobStore;
