//! Service layer: the blob store, the entity store, and the two
//! orchestration services composed on top of them at process start.

pub mod blob_store;
pub mod entity_store;
pub mod image_resolution;
pub mod product_service;
