//! Data model for the product catalog.
//!
//! Products are stored as rows in SQLite via `sqlx::FromRow`; preview
//! images live in the blob store and a product row only carries their key.
//! Read responses resolve the key back into bytes (`ProductView`).

pub mod filter;
pub mod product;
pub mod upload;
