//! ProductService — orchestrates the entity store and image resolution.
//!
//! Every use-case is a thin linear composition: substitute key for bytes
//! on the way in, bytes for key on the way out. There is no state beyond
//! the two injected collaborators and no coordination between requests.

use crate::models::{
    filter::{FieldSelection, Predicate, ProductFilter, ProductWhere},
    product::{NewProduct, Product, ProductPatch, ProductView},
    upload::UploadedFile,
};
use crate::services::{
    blob_store::StorageError,
    entity_store::{EntityError, EntityStore},
    image_resolution::{ImageResolution, ResolvedImage},
};
use futures::future::join_all;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ProductResult<T> = Result<T, ProductError>;

/// Application service behind every `/products` route.
#[derive(Clone)]
pub struct ProductService {
    pub entities: EntityStore,
    pub images: ImageResolution,
}

impl ProductService {
    pub fn new(entities: EntityStore, images: ImageResolution) -> Self {
        Self { entities, images }
    }

    /// Create a product, uploading its preview image first.
    ///
    /// The record is only written after the upload succeeds, so a failed
    /// upload never leaves a record with a dangling key.
    pub async fn create(
        &self,
        payload: NewProduct,
        files: Vec<UploadedFile>,
    ) -> ProductResult<ProductView> {
        let key = self.images.resolve_for_write(&files).await?;
        let created = self
            .entities
            .create(payload.into_data(key.unwrap_or_default()))
            .await?;
        Ok(self.project(created, None).await)
    }

    /// Fetch all matching products with their images resolved.
    pub async fn list(&self, filter: ProductFilter) -> ProductResult<Vec<ProductView>> {
        let records = self.entities.find(filter.where_clause.as_ref()).await?;
        Ok(self.project_all(records, filter.fields.as_ref()).await)
    }

    /// Same as `list`, but hides products marked `hidden` unless the
    /// caller's filter already constrains that field.
    pub async fn list_visible(&self, filter: ProductFilter) -> ProductResult<Vec<ProductView>> {
        let mut clause = filter.where_clause.unwrap_or_default();
        if clause.hidden.is_none() {
            clause.hidden = Some(Predicate::neq(true));
        }

        let records = self.entities.find(Some(&clause)).await?;
        Ok(self.project_all(records, filter.fields.as_ref()).await)
    }

    pub async fn get_by_id(
        &self,
        id: Uuid,
        fields: Option<FieldSelection>,
    ) -> ProductResult<ProductView> {
        let record = self.entities.find_by_id(id).await?;
        Ok(self.project(record, fields.as_ref()).await)
    }

    /// Full replace: swap the image (if new files came in), then overwrite
    /// the record with the resulting key.
    pub async fn replace_by_id(
        &self,
        id: Uuid,
        payload: NewProduct,
        files: Vec<UploadedFile>,
    ) -> ProductResult<()> {
        let existing = self.entities.find_by_id(id).await?;
        let key = self
            .images
            .replace_image(&existing.preview_image, &files)
            .await?;
        self.entities
            .replace_by_id(id, &payload.into_data(key))
            .await?;
        Ok(())
    }

    /// Metadata-only patch; the preview image cannot be touched from here.
    pub async fn update_by_id(&self, id: Uuid, patch: ProductPatch) -> ProductResult<()> {
        self.entities.update_by_id(id, &patch).await?;
        Ok(())
    }

    pub async fn update_all(
        &self,
        patch: ProductPatch,
        where_clause: Option<ProductWhere>,
    ) -> ProductResult<u64> {
        Ok(self.entities.update_all(&patch, where_clause.as_ref()).await?)
    }

    /// Delete the record only. The referenced blob is intentionally left
    /// in storage (orphan retention policy).
    pub async fn delete_by_id(&self, id: Uuid) -> ProductResult<()> {
        self.entities.delete_by_id(id).await?;
        Ok(())
    }

    pub async fn count(&self, where_clause: Option<ProductWhere>) -> ProductResult<u64> {
        Ok(self.entities.count(where_clause.as_ref()).await?)
    }

    /// Resolve one record into its response view.
    async fn project(&self, record: Product, fields: Option<&FieldSelection>) -> ProductView {
        let want_image = fields.is_none_or(|f| f.includes("previewImage"));
        let image = if want_image {
            self.images.resolve_for_read(&record.preview_image).await
        } else {
            ResolvedImage::Unavailable
        };
        ProductView::assemble(record, image, fields)
    }

    /// Resolve images for a batch concurrently, joining results back in
    /// record order regardless of completion order.
    async fn project_all(
        &self,
        records: Vec<Product>,
        fields: Option<&FieldSelection>,
    ) -> Vec<ProductView> {
        join_all(
            records
                .into_iter()
                .map(|record| self.project(record, fields)),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::blob_store::BlobStore;
    use crate::services::entity_store::tests::test_store;
    use bytes::Bytes;

    async fn service() -> ProductService {
        let base = std::env::temp_dir().join(format!("product-service-test-{}", Uuid::new_v4()));
        ProductService::new(
            test_store().await,
            ImageResolution::new(BlobStore::new(base)),
        )
    }

    fn payload(name: &str, hidden: bool) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: format!("{name} description"),
            category_id: "cat-1".to_string(),
            hidden,
        }
    }

    fn upload(name: &str, bytes: &'static [u8]) -> UploadedFile {
        UploadedFile::new(name, Bytes::from_static(bytes))
    }

    async fn cleanup(service: &ProductService) {
        let _ = tokio::fs::remove_dir_all(&service.images.blobs.base_path).await;
    }

    /// Service whose blob base path is occupied by a plain file, so every
    /// blob write fails while the entity store keeps working.
    async fn broken_blob_service() -> ProductService {
        let base = std::env::temp_dir().join(format!("product-service-test-{}", Uuid::new_v4()));
        tokio::fs::write(&base, b"not a directory").await.unwrap();
        ProductService::new(
            test_store().await,
            ImageResolution::new(BlobStore::new(base)),
        )
    }

    #[tokio::test]
    async fn create_without_image_has_empty_key_and_absent_image() {
        let service = service().await;
        let view = service.create(payload("mug", false), vec![]).await.unwrap();

        assert!(view.preview_image.is_none());
        let id = view.id.expect("id in view");
        let record = service.entities.find_by_id(id).await.unwrap();
        assert_eq!(record.preview_image, "");
    }

    #[tokio::test]
    async fn create_with_image_resolves_uploaded_bytes() {
        let service = service().await;
        let view = service
            .create(payload("mug", false), vec![upload("mug.png", b"image-1")])
            .await
            .unwrap();

        assert_eq!(view.preview_image.as_deref(), Some(&b"image-1"[..]));

        let id = view.id.expect("id in view");
        let fetched = service.get_by_id(id, None).await.unwrap();
        assert_eq!(fetched.preview_image.as_deref(), Some(&b"image-1"[..]));

        cleanup(&service).await;
    }

    #[tokio::test]
    async fn failed_upload_aborts_create_without_a_record() {
        let service = broken_blob_service().await;

        let err = service
            .create(payload("mug", false), vec![upload("mug.png", b"image-1")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProductError::Storage(StorageError::Write { .. })
        ));
        // No record with a dangling key was written.
        assert_eq!(service.count(None).await.unwrap(), 0);

        let _ = tokio::fs::remove_file(&service.images.blobs.base_path).await;
    }

    #[tokio::test]
    async fn failed_upload_aborts_replace_keeping_existing_record() {
        let service = broken_blob_service().await;
        // No files on create, so the broken blob store is never touched.
        let view = service.create(payload("mug", false), vec![]).await.unwrap();
        let id = view.id.expect("id in view");

        let err = service
            .replace_by_id(id, payload("mug v2", true), vec![upload("new.png", b"new")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::Storage(_)));

        let record = service.entities.find_by_id(id).await.unwrap();
        assert_eq!(record.name, "mug");
        assert!(!record.hidden);
        assert_eq!(record.preview_image, "");

        let _ = tokio::fs::remove_file(&service.images.blobs.base_path).await;
    }

    #[tokio::test]
    async fn get_by_id_with_blob_deleted_out_of_band_still_returns_product() {
        let service = service().await;
        let view = service
            .create(payload("mug", false), vec![upload("mug.png", b"image-1")])
            .await
            .unwrap();
        let id = view.id.expect("id in view");

        let key = service.entities.find_by_id(id).await.unwrap().preview_image;
        service.images.blobs.remove(&key).await.unwrap();

        let fetched = service.get_by_id(id, None).await.unwrap();
        assert_eq!(fetched.name.as_deref(), Some("mug"));
        assert!(fetched.preview_image.is_none());

        cleanup(&service).await;
    }

    #[tokio::test]
    async fn replace_swaps_image_and_removes_old_blob() {
        let service = service().await;
        let view = service
            .create(payload("mug", false), vec![upload("old.png", b"old-bytes")])
            .await
            .unwrap();
        let id = view.id.expect("id in view");
        let old_key = service.entities.find_by_id(id).await.unwrap().preview_image;

        service
            .replace_by_id(id, payload("mug v2", false), vec![upload("new.png", b"new-bytes")])
            .await
            .unwrap();

        let record = service.entities.find_by_id(id).await.unwrap();
        assert_ne!(record.preview_image, old_key);
        assert!(matches!(
            service.images.blobs.get(&old_key).await.unwrap_err(),
            StorageError::NotFound(_)
        ));

        let fetched = service.get_by_id(id, None).await.unwrap();
        assert_eq!(fetched.name.as_deref(), Some("mug v2"));
        assert_eq!(fetched.preview_image.as_deref(), Some(&b"new-bytes"[..]));

        cleanup(&service).await;
    }

    #[tokio::test]
    async fn replace_without_files_keeps_existing_image() {
        let service = service().await;
        let view = service
            .create(payload("mug", false), vec![upload("mug.png", b"image-1")])
            .await
            .unwrap();
        let id = view.id.expect("id in view");
        let key = service.entities.find_by_id(id).await.unwrap().preview_image;

        service
            .replace_by_id(id, payload("renamed", true), vec![])
            .await
            .unwrap();

        let record = service.entities.find_by_id(id).await.unwrap();
        assert_eq!(record.preview_image, key);
        assert_eq!(record.name, "renamed");

        let fetched = service.get_by_id(id, None).await.unwrap();
        assert_eq!(fetched.preview_image.as_deref(), Some(&b"image-1"[..]));

        cleanup(&service).await;
    }

    #[tokio::test]
    async fn replace_missing_id_is_not_found_before_upload() {
        let service = service().await;
        let err = service
            .replace_by_id(Uuid::new_v4(), payload("x", false), vec![upload("x.png", b"x")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProductError::Entity(EntityError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_by_id_never_alters_preview_key() {
        let service = service().await;
        let view = service
            .create(payload("mug", false), vec![upload("mug.png", b"image-1")])
            .await
            .unwrap();
        let id = view.id.expect("id in view");
        let key = service.entities.find_by_id(id).await.unwrap().preview_image;

        let patch = ProductPatch {
            name: Some("patched".to_string()),
            hidden: Some(true),
            ..Default::default()
        };
        service.update_by_id(id, patch).await.unwrap();

        let record = service.entities.find_by_id(id).await.unwrap();
        assert_eq!(record.preview_image, key);
        assert_eq!(record.name, "patched");

        cleanup(&service).await;
    }

    #[tokio::test]
    async fn list_preserves_store_order() {
        let service = service().await;
        for (name, bytes) in [("first", &b"1"[..]), ("second", b"2"), ("third", b"3")] {
            service
                .create(payload(name, false), vec![UploadedFile::new("p.png", Bytes::from_static(bytes))])
                .await
                .unwrap();
        }

        let views = service.list(ProductFilter::default()).await.unwrap();
        let names: Vec<_> = views
            .iter()
            .map(|v| v.name.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(names, ["first", "second", "third"]);

        cleanup(&service).await;
    }

    #[tokio::test]
    async fn list_visible_excludes_hidden_by_default() {
        let service = service().await;
        service.create(payload("shown", false), vec![]).await.unwrap();
        service.create(payload("hidden", true), vec![]).await.unwrap();

        let views = service
            .list_visible(ProductFilter::default())
            .await
            .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name.as_deref(), Some("shown"));
    }

    #[tokio::test]
    async fn caller_hidden_predicate_overrides_visible_default() {
        let service = service().await;
        service.create(payload("shown", false), vec![]).await.unwrap();
        service.create(payload("hidden", true), vec![]).await.unwrap();

        let filter = ProductFilter {
            where_clause: Some(ProductWhere {
                hidden: Some(Predicate::eq(true)),
                ..Default::default()
            }),
            fields: None,
        };
        let views = service.list_visible(filter).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].name.as_deref(), Some("hidden"));
    }

    #[tokio::test]
    async fn fields_exclusion_skips_image_resolution() {
        let service = service().await;
        let view = service
            .create(payload("mug", false), vec![upload("mug.png", b"image-1")])
            .await
            .unwrap();
        let id = view.id.expect("id in view");

        let fields: FieldSelection =
            serde_json::from_str(r#"{"previewImage": false, "description": false}"#).unwrap();
        let fetched = service.get_by_id(id, Some(fields)).await.unwrap();

        assert!(fetched.preview_image.is_none());
        assert!(fetched.description.is_none());
        assert_eq!(fetched.name.as_deref(), Some("mug"));

        cleanup(&service).await;
    }

    #[tokio::test]
    async fn delete_removes_record_but_orphans_blob() {
        let service = service().await;
        let view = service
            .create(payload("mug", false), vec![upload("mug.png", b"image-1")])
            .await
            .unwrap();
        let id = view.id.expect("id in view");
        let key = service.entities.find_by_id(id).await.unwrap().preview_image;

        service.delete_by_id(id).await.unwrap();

        let err = service.get_by_id(id, None).await.unwrap_err();
        assert!(matches!(err, ProductError::Entity(EntityError::NotFound(_))));
        // Orphan policy: the blob stays behind.
        assert_eq!(&service.images.blobs.get(&key).await.unwrap()[..], b"image-1");

        cleanup(&service).await;
    }

    #[tokio::test]
    async fn count_and_update_all_pass_through() {
        let service = service().await;
        service.create(payload("a", false), vec![]).await.unwrap();
        service.create(payload("b", false), vec![]).await.unwrap();

        assert_eq!(service.count(None).await.unwrap(), 2);

        let patch = ProductPatch {
            hidden: Some(true),
            ..Default::default()
        };
        let affected = service.update_all(patch, None).await.unwrap();
        assert_eq!(affected, 2);
        assert_eq!(
            service
                .list_visible(ProductFilter::default())
                .await
                .unwrap()
                .len(),
            0
        );
    }
}
