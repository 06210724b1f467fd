//! Query filters accepted by the list/count/patch endpoints.
//!
//! Filters arrive as URL-encoded JSON, e.g.
//! `?filter={"where":{"hidden":{"neq":true}},"fields":{"previewImage":false}}`.
//! The `where` part compiles to SQL through `sqlx::QueryBuilder`; the
//! `fields` part is applied when the response view is assembled.

use serde::Deserialize;
use sqlx::{QueryBuilder, sqlite::Sqlite};
use uuid::Uuid;

/// Top-level filter: predicates plus an optional field selection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    #[serde(rename = "where")]
    pub where_clause: Option<ProductWhere>,
    pub fields: Option<FieldSelection>,
}

/// Per-field predicates, ANDed together. Absent fields are unconstrained.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductWhere {
    pub id: Option<Predicate<Uuid>>,
    pub name: Option<Predicate<String>>,
    pub description: Option<Predicate<String>>,
    pub category_id: Option<Predicate<String>>,
    pub hidden: Option<Predicate<bool>>,
    pub preview_image: Option<Predicate<String>>,
}

/// A single predicate: either a bare value (equality shorthand) or an
/// `{eq}`/`{neq}` comparison object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Predicate<T> {
    Value(T),
    Cmp {
        #[serde(default = "Option::default")]
        eq: Option<T>,
        #[serde(default = "Option::default")]
        neq: Option<T>,
    },
}

impl<T: PartialEq> Predicate<T> {
    pub fn eq(value: T) -> Self {
        Predicate::Value(value)
    }

    pub fn neq(value: T) -> Self {
        Predicate::Cmp {
            eq: None,
            neq: Some(value),
        }
    }
}

impl ProductWhere {
    /// Append `AND column <op> ?` clauses to a query that already has a
    /// `WHERE` in place.
    pub fn apply(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        push_predicate(builder, "id", self.id.as_ref());
        push_predicate(builder, "name", self.name.as_ref());
        push_predicate(builder, "description", self.description.as_ref());
        push_predicate(builder, "category_id", self.category_id.as_ref());
        push_predicate(builder, "hidden", self.hidden.as_ref());
        push_predicate(builder, "preview_image", self.preview_image.as_ref());
    }
}

fn push_predicate<'a, T>(
    builder: &mut QueryBuilder<'a, Sqlite>,
    column: &str,
    predicate: Option<&Predicate<T>>,
) where
    T: Clone + Send + sqlx::Encode<'a, Sqlite> + sqlx::Type<Sqlite> + 'a,
{
    // Column names are the hardcoded schema columns above, never user input.
    match predicate {
        None => {}
        Some(Predicate::Value(value)) => {
            builder.push(format!(" AND {column} = "));
            builder.push_bind(value.clone());
        }
        Some(Predicate::Cmp { eq, neq }) => {
            if let Some(value) = eq {
                builder.push(format!(" AND {column} = "));
                builder.push_bind(value.clone());
            }
            if let Some(value) = neq {
                builder.push(format!(" AND {column} != "));
                builder.push_bind(value.clone());
            }
        }
    }
}

/// Field selection for response shaping.
///
/// Follows the usual include/exclude convention: if any field is listed as
/// `true` the selection is include-only; otherwise fields listed as `false`
/// are excluded and everything else stays.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSelection {
    pub id: Option<bool>,
    pub name: Option<bool>,
    pub description: Option<bool>,
    pub category_id: Option<bool>,
    pub hidden: Option<bool>,
    pub preview_image: Option<bool>,
    pub created_at: Option<bool>,
}

impl FieldSelection {
    fn entry(&self, field: &str) -> Option<bool> {
        match field {
            "id" => self.id,
            "name" => self.name,
            "description" => self.description,
            "categoryId" => self.category_id,
            "hidden" => self.hidden,
            "previewImage" => self.preview_image,
            "createdAt" => self.created_at,
            _ => None,
        }
    }

    fn include_only(&self) -> bool {
        [
            self.id,
            self.name,
            self.description,
            self.category_id,
            self.hidden,
            self.preview_image,
            self.created_at,
        ]
        .iter()
        .any(|entry| *entry == Some(true))
    }

    /// Whether `field` (camelCase response name) should appear in a view.
    pub fn includes(&self, field: &str) -> bool {
        match self.entry(field) {
            Some(explicit) => explicit,
            None => !self.include_only(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_value_deserializes_as_equality() {
        let clause: ProductWhere = serde_json::from_str(r#"{"hidden": true}"#).unwrap();
        assert!(matches!(clause.hidden, Some(Predicate::Value(true))));
    }

    #[test]
    fn comparison_object_deserializes() {
        let clause: ProductWhere =
            serde_json::from_str(r#"{"hidden": {"neq": true}, "name": {"eq": "mug"}}"#).unwrap();
        assert!(matches!(
            clause.hidden,
            Some(Predicate::Cmp {
                eq: None,
                neq: Some(true)
            })
        ));
        assert!(matches!(
            clause.name,
            Some(Predicate::Cmp { eq: Some(ref n), neq: None }) if n == "mug"
        ));
    }

    #[test]
    fn full_filter_deserializes() {
        let filter: ProductFilter = serde_json::from_str(
            r#"{"where":{"categoryId":"c1"},"fields":{"previewImage":false}}"#,
        )
        .unwrap();
        let clause = filter.where_clause.unwrap();
        assert!(matches!(
            clause.category_id,
            Some(Predicate::Value(ref c)) if c == "c1"
        ));
        assert!(!filter.fields.unwrap().includes("previewImage"));
    }

    #[test]
    fn exclusion_keeps_unlisted_fields() {
        let fields: FieldSelection =
            serde_json::from_str(r#"{"previewImage": false}"#).unwrap();
        assert!(fields.includes("name"));
        assert!(fields.includes("id"));
        assert!(!fields.includes("previewImage"));
    }

    #[test]
    fn any_true_switches_to_include_only() {
        let fields: FieldSelection =
            serde_json::from_str(r#"{"id": true, "name": true}"#).unwrap();
        assert!(fields.includes("id"));
        assert!(fields.includes("name"));
        assert!(!fields.includes("description"));
        assert!(!fields.includes("previewImage"));
    }
}
