//! HTTP handlers for the `/products` endpoints.
//!
//! Multipart parsing and filter deserialization live here; everything else
//! is delegated to `ProductService`. Filters arrive as URL-encoded JSON
//! strings in the `filter`/`where` query parameters.

use crate::{
    errors::AppError,
    models::{
        filter::{ProductFilter, ProductWhere},
        product::{CountResponse, NewProduct, ProductPatch, ProductView},
        upload::UploadedFile,
    },
    services::product_service::ProductService,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct FilterQuery {
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WhereQuery {
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
}

/// POST `/products` — multipart create, responds with the resolved view.
pub async fn create_product(
    State(service): State<ProductService>,
    multipart: Multipart,
) -> Result<Json<ProductView>, AppError> {
    let (payload, files) = read_product_form(multipart).await?;
    let view = service.create(payload, files).await?;
    Ok(Json(view))
}

/// GET `/products` — list with optional `?filter=` JSON.
pub async fn list_products(
    State(service): State<ProductService>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<ProductView>>, AppError> {
    let filter: ProductFilter = parse_json_param("filter", query.filter.as_deref())?;
    Ok(Json(service.list(filter).await?))
}

/// GET `/products/visible` — storefront listing; hidden products are
/// excluded unless the caller's filter says otherwise.
pub async fn list_visible_products(
    State(service): State<ProductService>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<ProductView>>, AppError> {
    let filter: ProductFilter = parse_json_param("filter", query.filter.as_deref())?;
    Ok(Json(service.list_visible(filter).await?))
}

/// GET `/products/count` — count with optional `?where=` JSON.
pub async fn count_products(
    State(service): State<ProductService>,
    Query(query): Query<WhereQuery>,
) -> Result<Json<CountResponse>, AppError> {
    let clause: Option<ProductWhere> = match query.where_clause.as_deref() {
        None => None,
        Some(raw) => Some(parse_json_param("where", Some(raw))?),
    };
    let count = service.count(clause).await?;
    Ok(Json(CountResponse { count }))
}

/// GET `/products/{id}` — single product; the filter's `where` part is
/// ignored here, only `fields` applies.
pub async fn get_product(
    State(service): State<ProductService>,
    Path(id): Path<Uuid>,
    Query(query): Query<FilterQuery>,
) -> Result<Json<ProductView>, AppError> {
    let filter: ProductFilter = parse_json_param("filter", query.filter.as_deref())?;
    Ok(Json(service.get_by_id(id, filter.fields).await?))
}

/// PATCH `/products` — bulk metadata patch, responds with affected count.
pub async fn update_products(
    State(service): State<ProductService>,
    Query(query): Query<WhereQuery>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<CountResponse>, AppError> {
    let clause: Option<ProductWhere> = match query.where_clause.as_deref() {
        None => None,
        Some(raw) => Some(parse_json_param("where", Some(raw))?),
    };
    let count = service.update_all(patch, clause).await?;
    Ok(Json(CountResponse { count }))
}

/// PATCH `/products/{id}` — metadata-only patch; never touches the image.
pub async fn update_product(
    State(service): State<ProductService>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProductPatch>,
) -> Result<StatusCode, AppError> {
    service.update_by_id(id, patch).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT `/products/{id}` — multipart full replace with optional new image.
pub async fn replace_product(
    State(service): State<ProductService>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<StatusCode, AppError> {
    let (payload, files) = read_product_form(multipart).await?;
    service.replace_by_id(id, payload, files).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE `/products/{id}` — removes the record; blobs are retained.
pub async fn delete_product(
    State(service): State<ProductService>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    service.delete_by_id(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Pull metadata fields and uploaded files out of a multipart form.
///
/// Any part carrying a filename is treated as an image upload; text parts
/// are matched by name and unknown parts are ignored.
async fn read_product_form(
    mut multipart: Multipart,
) -> Result<(NewProduct, Vec<UploadedFile>), AppError> {
    let mut name = None;
    let mut description = None;
    let mut category_id = None;
    let mut hidden = false;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart body: {err}")))?
    {
        if let Some(file_name) = field.file_name() {
            let file_name = file_name.to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|err| AppError::bad_request(format!("invalid file part: {err}")))?;
            files.push(UploadedFile::new(file_name, bytes));
            continue;
        }

        let field_name = field.name().unwrap_or_default().to_string();
        let text = field
            .text()
            .await
            .map_err(|err| AppError::bad_request(format!("invalid form field: {err}")))?;
        match field_name.as_str() {
            "name" => name = Some(text),
            "description" => description = Some(text),
            "categoryId" => category_id = Some(text),
            "hidden" => hidden = matches!(text.as_str(), "true" | "1"),
            _ => {}
        }
    }

    let payload = NewProduct {
        name: name.ok_or_else(|| missing_field("name"))?,
        description: description.ok_or_else(|| missing_field("description"))?,
        category_id: category_id.ok_or_else(|| missing_field("categoryId"))?,
        hidden,
    };
    Ok((payload, files))
}

fn missing_field(field: &str) -> AppError {
    AppError::bad_request(format!("missing form field `{field}`"))
}

/// Parse a query parameter holding a JSON document.
fn parse_json_param<T: DeserializeOwned + Default>(
    param: &str,
    raw: Option<&str>,
) -> Result<T, AppError> {
    match raw {
        None => Ok(T::default()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|err| AppError::bad_request(format!("invalid `{param}` parameter: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn absent_filter_parses_to_default() {
        let filter: ProductFilter = parse_json_param("filter", None).unwrap();
        assert!(filter.where_clause.is_none());
        assert!(filter.fields.is_none());
    }

    #[test]
    fn malformed_filter_is_bad_request() {
        let err = parse_json_param::<ProductFilter>("filter", Some("{not json")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("filter"));
    }

    #[test]
    fn where_parameter_parses_predicates() {
        let clause: ProductWhere =
            parse_json_param("where", Some(r#"{"hidden":{"neq":true}}"#)).unwrap();
        assert!(clause.hidden.is_some());
    }
}
