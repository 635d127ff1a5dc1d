//! Schema snapshot types.
//!
//! A [`SchemaSnapshot`] is the set of collections known to the store and, per
//! collection, the ordered set of field paths observed in its documents. It is
//! captured once at the start of a run and treated as read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A field path known to exist on a collection.
///
/// Nested fields use dotted paths (`address.city`); fields inside arrays of
/// sub-documents use a `[]` marker (`items[].sku`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Dotted field path.
    pub name: String,

    /// Optional type hint (`string`, `int`, `object`, `array`, ...).
    pub kind: Option<String>,
}

impl SchemaField {
    /// Create a field without a type hint.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            kind: None,
        }
    }

    /// Create a field with a type hint.
    pub fn typed<S: Into<String>, K: Into<String>>(name: S, kind: K) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind.into()),
        }
    }

    /// Whether values at this path are sub-documents or arrays.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self.kind.as_deref(), Some("object" | "array"))
    }
}

/// The known shape of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Estimated number of documents, when the provider knows it.
    pub document_count: Option<u64>,

    /// Index descriptions, as reported by the store.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<String>,

    /// Ordered, duplicate-free field list.
    fields: Vec<SchemaField>,
}

impl CollectionSchema {
    /// Create an empty collection schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection schema from untyped field names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Self::new();
        for name in names {
            schema.push_field(SchemaField::new(name));
        }
        schema
    }

    /// Set the estimated document count.
    #[must_use]
    pub fn with_document_count(mut self, count: u64) -> Self {
        self.document_count = Some(count);
        self
    }

    /// Record an index description.
    #[must_use]
    pub fn with_index<S: Into<String>>(mut self, index: S) -> Self {
        self.indexes.push(index.into());
        self
    }

    /// Add a field, keeping the first occurrence when the name repeats.
    pub fn push_field(&mut self, field: SchemaField) {
        if !self.fields.iter().any(|f| f.name == field.name) {
            self.fields.push(field);
        }
    }

    /// Builder-style variant of [`push_field`](Self::push_field).
    #[must_use]
    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.push_field(field);
        self
    }

    /// All fields in insertion order.
    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Look up a field by exact name.
    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check whether a referenced field path exists on this collection.
    ///
    /// Matching is exact and case-sensitive. Numeric segments (array indexes)
    /// and `[]` markers are ignored on both sides. A deeper path is also
    /// accepted when one of its `.`-prefixes is a known `object`/`array` field,
    /// because sub-document contents are not always enumerated by providers.
    #[must_use]
    pub fn contains_path(&self, path: &str) -> bool {
        let wanted = normalize_path(path);
        if wanted.is_empty() {
            return false;
        }
        if self.fields.iter().any(|f| normalize_path(&f.name) == wanted) {
            return true;
        }

        let mut prefix_end = wanted.len();
        while let Some(dot) = wanted[..prefix_end].rfind('.') {
            let prefix = &wanted[..dot];
            if self
                .fields
                .iter()
                .any(|f| f.is_container() && normalize_path(&f.name) == prefix)
            {
                return true;
            }
            prefix_end = dot;
        }
        false
    }

    /// Number of known fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are known.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Collections and fields known to the store at the start of a run.
///
/// # Examples
///
/// ```rust
/// use docanalyst_core::types::SchemaSnapshot;
///
/// let schema = SchemaSnapshot::new()
///     .with_collection("customers", ["name", "city"]);
///
/// assert!(schema.has_collection("customers"));
/// assert!(schema.has_field("customers", "city"));
/// assert!(!schema.has_field("customers", "location"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    /// Name of the database the snapshot describes.
    pub database_name: Option<String>,

    collections: BTreeMap<String, CollectionSchema>,
}

impl SchemaSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the database name.
    #[must_use]
    pub fn with_database<S: Into<String>>(mut self, name: S) -> Self {
        self.database_name = Some(name.into());
        self
    }

    /// Add a collection from a list of untyped field names.
    #[must_use]
    pub fn with_collection<N, I, S>(mut self, name: N, fields: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collections
            .insert(name.into(), CollectionSchema::from_names(fields));
        self
    }

    /// Insert or replace a collection schema.
    pub fn insert_collection<N: Into<String>>(&mut self, name: N, schema: CollectionSchema) {
        self.collections.insert(name.into(), schema);
    }

    /// Look up a collection by exact name.
    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    /// Whether the collection exists (case-sensitive).
    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Whether the field path exists on the collection.
    pub fn has_field(&self, collection: &str, path: &str) -> bool {
        self.collections
            .get(collection)
            .is_some_and(|c| c.contains_path(path))
    }

    /// Iterate collections in name order.
    pub fn collections(&self) -> impl Iterator<Item = (&str, &CollectionSchema)> {
        self.collections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Collection names in name order.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// Number of collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Whether the snapshot knows no collections.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}

fn normalize_path(path: &str) -> String {
    path.split('.')
        .map(|segment| segment.trim_end_matches("[]"))
        .filter(|segment| !segment.is_empty() && !segment.bytes().all(|b| b.is_ascii_digit()))
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers() -> SchemaSnapshot {
        let mut snapshot = SchemaSnapshot::new().with_database("shop");
        snapshot.insert_collection(
            "customers",
            CollectionSchema::new()
                .with_field(SchemaField::typed("name", "string"))
                .with_field(SchemaField::typed("address", "object"))
                .with_field(SchemaField::typed("address.city", "string"))
                .with_field(SchemaField::typed("orders", "array"))
                .with_field(SchemaField::typed("orders[].sku", "string"))
                .with_document_count(12),
        );
        snapshot
    }

    #[test]
    fn test_exact_and_case_sensitive() {
        let schema = customers();
        assert!(schema.has_field("customers", "name"));
        assert!(!schema.has_field("customers", "Name"));
        assert!(!schema.has_field("Customers", "name"));
    }

    #[test]
    fn test_nested_and_array_paths() {
        let schema = customers();
        assert!(schema.has_field("customers", "address.city"));
        assert!(schema.has_field("customers", "orders.sku"));
        assert!(schema.has_field("customers", "orders.0.sku"));
        // address is an object, so unseen sub-paths are accepted
        assert!(schema.has_field("customers", "address.zip"));
        // name is a scalar, so it cannot have children
        assert!(!schema.has_field("customers", "name.first"));
    }

    #[test]
    fn test_duplicate_fields_are_ignored() {
        let schema = CollectionSchema::from_names(["a", "b", "a"]);
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_collection_order_is_stable() {
        let schema = SchemaSnapshot::new()
            .with_collection("products", ["sku"])
            .with_collection("customers", ["name"]);
        assert_eq!(
            schema.collection_names().collect::<Vec<_>>(),
            vec!["customers", "products"]
        );
    }
}
