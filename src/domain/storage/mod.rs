//! Storage domain - durable blob abstraction

mod entity;
mod repository;

pub use entity::{BlobContentType, BlobLocation};
pub use repository::BlobStore;

#[cfg(test)]
pub use repository::MockBlobStore;
