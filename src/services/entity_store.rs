//! EntityStore — CRUD over the `products` table in SQLite.
//!
//! Holds only metadata and the preview-image key; bytes never touch this
//! layer. Filters compile to SQL via `QueryBuilder`, and `find` orders by
//! rowid so list projections have a stable store ordering to preserve.

use crate::models::{
    filter::ProductWhere,
    product::{Product, ProductData, ProductPatch},
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const PRODUCT_COLUMNS: &str =
    "id, name, description, category_id, hidden, preview_image, created_at";

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("product `{0}` not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type EntityResult<T> = Result<T, EntityError>;

/// Thin CRUD wrapper around the shared SQLite pool.
#[derive(Clone)]
pub struct EntityStore {
    /// Shared connection pool; also used by the readiness probe.
    pub db: Arc<SqlitePool>,
}

impl EntityStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new record under a freshly assigned id.
    pub async fn create(&self, data: ProductData) -> EntityResult<Product> {
        let product = Product {
            id: Uuid::new_v4(),
            name: data.name,
            description: data.description,
            category_id: data.category_id,
            hidden: data.hidden,
            preview_image: data.preview_image,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO products (id, name, description, category_id, hidden, preview_image, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category_id)
        .bind(product.hidden)
        .bind(&product.preview_image)
        .bind(product.created_at)
        .execute(&*self.db)
        .await?;

        Ok(product)
    }

    /// Fetch all records matching `where_clause`, in stable store order.
    pub async fn find(&self, where_clause: Option<&ProductWhere>) -> EntityResult<Vec<Product>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1"
        ));
        if let Some(clause) = where_clause {
            clause.apply(&mut builder);
        }
        builder.push(" ORDER BY rowid ASC");

        let rows = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(rows)
    }

    pub async fn find_by_id(&self, id: Uuid) -> EntityResult<Product> {
        sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => EntityError::NotFound(id),
            other => EntityError::Sqlx(other),
        })
    }

    /// Patch every record matching `where_clause`; returns the number of
    /// affected rows. An empty patch matches without modifying.
    pub async fn update_all(
        &self,
        patch: &ProductPatch,
        where_clause: Option<&ProductWhere>,
    ) -> EntityResult<u64> {
        if patch.is_empty() {
            return self.count(where_clause).await;
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE products SET ");
        push_patch(&mut builder, patch);
        builder.push(" WHERE 1=1");
        if let Some(clause) = where_clause {
            clause.apply(&mut builder);
        }

        let result = builder.build().execute(&*self.db).await?;
        Ok(result.rows_affected())
    }

    /// Patch a single record. Only the provided fields change; the
    /// preview-image key is not reachable from a patch.
    pub async fn update_by_id(&self, id: Uuid, patch: &ProductPatch) -> EntityResult<()> {
        if patch.is_empty() {
            // Nothing to write, but a missing id must still be an error.
            self.find_by_id(id).await?;
            return Ok(());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE products SET ");
        push_patch(&mut builder, patch);
        builder.push(" WHERE id = ");
        builder.push_bind(id);

        let result = builder.build().execute(&*self.db).await?;
        if result.rows_affected() == 0 {
            return Err(EntityError::NotFound(id));
        }
        Ok(())
    }

    /// Overwrite every caller-settable field of a record. `created_at`
    /// stays store-managed and is preserved.
    pub async fn replace_by_id(&self, id: Uuid, data: &ProductData) -> EntityResult<()> {
        let result = sqlx::query(
            "UPDATE products
             SET name = ?, description = ?, category_id = ?, hidden = ?, preview_image = ?
             WHERE id = ?",
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.category_id)
        .bind(data.hidden)
        .bind(&data.preview_image)
        .bind(id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EntityError::NotFound(id));
        }
        Ok(())
    }

    pub async fn delete_by_id(&self, id: Uuid) -> EntityResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EntityError::NotFound(id));
        }
        Ok(())
    }

    pub async fn count(&self, where_clause: Option<&ProductWhere>) -> EntityResult<u64> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM products WHERE 1=1");
        if let Some(clause) = where_clause {
            clause.apply(&mut builder);
        }

        let count: i64 = builder.build_query_scalar().fetch_one(&*self.db).await?;
        Ok(count as u64)
    }
}

fn push_patch(builder: &mut QueryBuilder<'_, Sqlite>, patch: &ProductPatch) {
    let mut sets = builder.separated(", ");
    if let Some(name) = &patch.name {
        sets.push("name = ");
        sets.push_bind_unseparated(name.clone());
    }
    if let Some(description) = &patch.description {
        sets.push("description = ");
        sets.push_bind_unseparated(description.clone());
    }
    if let Some(category_id) = &patch.category_id {
        sets.push("category_id = ");
        sets.push_bind_unseparated(category_id.clone());
    }
    if let Some(hidden) = patch.hidden {
        sets.push("hidden = ");
        sets.push_bind_unseparated(hidden);
    }
}
