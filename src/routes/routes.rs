//! Defines routes for the product catalog API.
//!
//! ## Structure
//! - **Collection endpoints**
//!   - `POST   /products` — multipart create (metadata + optional image files)
//!   - `GET    /products` — list (supports `?filter=` JSON)
//!   - `PATCH  /products` — bulk metadata patch (supports `?where=` JSON)
//!   - `GET    /products/visible` — list excluding hidden products
//!   - `GET    /products/count` — count (supports `?where=` JSON)
//!
//! - **Item endpoints**
//!   - `GET    /products/{id}` — fetch one, image resolved to bytes
//!   - `PATCH  /products/{id}` — metadata patch, image untouched
//!   - `PUT    /products/{id}` — multipart full replace
//!   - `DELETE /products/{id}` — delete record (blob retained)

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        product_handlers::{
            count_products, create_product, delete_product, get_product, list_products,
            list_visible_products, replace_product, update_product, update_products,
        },
    },
    services::product_service::ProductService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Multipart bodies are buffered in memory before upload, so the default
/// 2 MB request cap is too small for real product images.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Build the router for all product and health routes.
///
/// The router carries shared state (`ProductService`) to all handlers.
pub fn routes() -> Router<ProductService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Collection routes
        .route(
            "/products",
            post(create_product).get(list_products).patch(update_products),
        )
        .route("/products/visible", get(list_visible_products))
        .route("/products/count", get(count_products))
        // Item routes
        .route(
            "/products/{id}",
            get(get_product)
                .patch(update_product)
                .put(replace_product)
                .delete(delete_product),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
