//! Product record and its request/response shapes.

use crate::models::filter::FieldSelection;
use crate::services::image_resolution::ResolvedImage;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use sqlx::FromRow;
use uuid::Uuid;

/// A product row as stored in the entity store.
///
/// `preview_image` is the blob-store key, never the image bytes. An empty
/// string means no image is set.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Store-assigned identifier.
    pub id: Uuid,

    pub name: String,

    pub description: String,

    /// Reference to a category, not modeled further here.
    pub category_id: String,

    /// Hidden products are excluded from the visible listing.
    pub hidden: bool,

    /// Blob-store key of the preview image, or `""` when none is set.
    pub preview_image: String,

    /// Set once at create time; replace preserves it.
    pub created_at: DateTime<Utc>,
}

/// Metadata fields accepted from a multipart create/replace form.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category_id: String,
    pub hidden: bool,
}

impl NewProduct {
    /// Attach a resolved preview key, producing the full record payload.
    pub fn into_data(self, preview_image: String) -> ProductData {
        ProductData {
            name: self.name,
            description: self.description,
            category_id: self.category_id,
            hidden: self.hidden,
            preview_image,
        }
    }
}

/// Full record payload written to the entity store (everything but the
/// store-assigned id and timestamp).
#[derive(Debug, Clone)]
pub struct ProductData {
    pub name: String,
    pub description: String,
    pub category_id: String,
    pub hidden: bool,
    pub preview_image: String,
}

/// Partial metadata update.
///
/// Deliberately has no image field: patching goes through a metadata-only
/// path, while image changes require a full replace with a multipart body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub hidden: Option<bool>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.hidden.is_none()
    }
}

/// Read-time projection of a product with its key resolved to image bytes.
///
/// Every field is optional so a `fields` selection can drop it from the
/// JSON; `preview_image` serializes as base64 and is absent whenever the
/// blob could not be resolved. Never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,

    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_image"
    )]
    pub preview_image: Option<Bytes>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ProductView {
    /// Assemble a view from a record, its resolved image, and an optional
    /// field selection.
    pub fn assemble(
        product: Product,
        image: ResolvedImage,
        fields: Option<&FieldSelection>,
    ) -> Self {
        let keep = |name: &str| fields.is_none_or(|f| f.includes(name));
        let Product {
            id,
            name,
            description,
            category_id,
            hidden,
            preview_image: _,
            created_at,
        } = product;

        Self {
            id: keep("id").then_some(id),
            name: keep("name").then_some(name),
            description: keep("description").then_some(description),
            category_id: keep("categoryId").then_some(category_id),
            hidden: keep("hidden").then_some(hidden),
            preview_image: image.into_bytes().filter(|_| keep("previewImage")),
            created_at: keep("createdAt").then_some(created_at),
        }
    }
}

fn serialize_image<S: Serializer>(bytes: &Option<Bytes>, ser: S) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(bytes) => ser.serialize_str(&general_purpose::STANDARD.encode(bytes)),
        None => ser.serialize_none(),
    }
}

/// Body of the `/products/count` and bulk-patch responses.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u64,
}
