//! Fixed snapshots and schema inference from sample documents.

use async_trait::async_trait;
use docanalyst_core::{
    CollectionSchema, Document, Result, SchemaField, SchemaProvider, SchemaSnapshot,
};
use serde_json::Value;
use std::collections::HashMap;

/// Provider that always returns the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    snapshot: SchemaSnapshot,
}

impl StaticSchemaProvider {
    /// Serve `snapshot`.
    pub fn new(snapshot: SchemaSnapshot) -> Self {
        Self { snapshot }
    }

    /// Serve a snapshot inferred from sample documents.
    pub fn from_samples<N, I>(database: &str, samples: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Vec<Document>)>,
    {
        Self::new(infer_schema(samples).with_database(database))
    }
}

#[async_trait]
impl SchemaProvider for StaticSchemaProvider {
    async fn schema(&self) -> Result<SchemaSnapshot> {
        Ok(self.snapshot.clone())
    }

    fn name(&self) -> &'static str {
        "StaticSchemaProvider"
    }
}

/// Build a snapshot from `(collection, sample documents)` pairs.
pub fn infer_schema<N, I>(samples: I) -> SchemaSnapshot
where
    N: Into<String>,
    I: IntoIterator<Item = (N, Vec<Document>)>,
{
    let mut snapshot = SchemaSnapshot::new();
    for (name, documents) in samples {
        snapshot.insert_collection(name, infer_collection(&documents));
    }
    snapshot
}

/// Infer the field paths of one collection.
///
/// Embedded documents contribute their own path (typed `object`) and every
/// nested path below it. Arrays contribute their path (typed `array`) and the
/// fields of the documents they hold under a `[]` marker. A path seen with
/// several non-null types is typed `mixed`.
pub fn infer_collection<'a, I>(documents: I) -> CollectionSchema
where
    I: IntoIterator<Item = &'a Document>,
{
    let mut paths = PathCollector::default();
    for document in documents {
        paths.visit_document("", document);
    }
    paths.into_schema()
}

#[derive(Default)]
struct PathCollector {
    order: Vec<String>,
    kinds: HashMap<String, Option<&'static str>>,
}

impl PathCollector {
    fn visit_document(&mut self, prefix: &str, document: &Document) {
        for (key, value) in document {
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            self.visit_value(path, value);
        }
    }

    fn visit_value(&mut self, path: String, value: &Value) {
        self.record(&path, kind_of(value));
        match value {
            Value::Object(document) => self.visit_document(&path, document),
            Value::Array(items) => {
                let element_path = format!("{path}[]");
                for item in items {
                    match item {
                        Value::Object(document) => self.visit_document(&element_path, document),
                        Value::Array(_) => self.visit_value(element_path.clone(), item),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    fn record(&mut self, path: &str, kind: Option<&'static str>) {
        match self.kinds.get_mut(path) {
            None => {
                self.order.push(path.to_string());
                self.kinds.insert(path.to_string(), kind);
            }
            Some(existing) => match (*existing, kind) {
                (_, None) => {}
                (None, Some(_)) => *existing = kind,
                (Some(seen), Some(new)) if seen != new => *existing = Some("mixed"),
                _ => {}
            },
        }
    }

    fn into_schema(self) -> CollectionSchema {
        let mut schema = CollectionSchema::new();
        for path in self.order {
            let field = match self.kinds.get(&path).copied().flatten() {
                Some(kind) => SchemaField::typed(path, kind),
                None => SchemaField::new(path),
            };
            schema.push_field(field);
        }
        schema
    }
}

/// Type hint for a JSON value; `null` carries no type information.
fn kind_of(value: &Value) -> Option<&'static str> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some("bool"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("int"),
        Value::Number(_) => Some("double"),
        Value::String(_) => Some("string"),
        Value::Array(_) => Some("array"),
        Value::Object(_) => Some("object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("sample must be an object"),
        }
    }

    fn typed(schema: &CollectionSchema) -> Vec<(String, Option<String>)> {
        schema
            .fields()
            .iter()
            .map(|f| (f.name.clone(), f.kind.clone()))
            .collect()
    }

    #[test]
    fn test_flattens_nested_documents_and_arrays() {
        let samples = [doc(json!({
            "name": "Ada",
            "address": {"city": "London", "geo": {"lat": 51.5}},
            "orders": [{"sku": "A1", "qty": 2}, {"sku": "B2", "gift": true}],
            "tags": ["vip"]
        }))];

        let schema = infer_collection(&samples);
        let names: Vec<&str> = schema.field_names().collect();

        assert_eq!(
            names,
            vec![
                "name",
                "address",
                "address.city",
                "address.geo",
                "address.geo.lat",
                "orders",
                "orders[].sku",
                "orders[].qty",
                "orders[].gift",
                "tags",
            ]
        );
        assert_eq!(schema.field("address.geo.lat").unwrap().kind.as_deref(), Some("double"));
        assert_eq!(schema.field("orders").unwrap().kind.as_deref(), Some("array"));
    }

    #[test]
    fn test_field_order_follows_documents() {
        let samples = [doc(json!({"zip": "10001", "city": "New York", "age": 41}))];
        let schema = infer_collection(&samples);
        assert_eq!(schema.field_names().collect::<Vec<_>>(), vec!["zip", "city", "age"]);
    }

    #[test]
    fn test_types_merge_across_documents() {
        let samples = [
            doc(json!({"score": null, "code": 7})),
            doc(json!({"score": 3, "code": "seven"})),
        ];

        let schema = infer_collection(&samples);

        assert_eq!(
            typed(&schema),
            vec![
                ("score".to_string(), Some("int".to_string())),
                ("code".to_string(), Some("mixed".to_string())),
            ]
        );
    }

    #[test]
    fn test_inferred_paths_match_queries() {
        let snapshot = infer_schema([(
            "customers",
            vec![doc(json!({"address": {"city": "Paris"}, "orders": [{"sku": "A1"}]}))],
        )]);

        assert!(snapshot.has_field("customers", "address.city"));
        assert!(snapshot.has_field("customers", "orders.sku"));
        assert!(snapshot.has_field("customers", "orders.0.sku"));
        assert!(!snapshot.has_field("customers", "city"));
    }

    #[tokio::test]
    async fn test_static_provider_serves_snapshot() {
        let provider = StaticSchemaProvider::from_samples(
            "shop",
            [("products", vec![doc(json!({"sku": "A1", "price": 9.5}))])],
        );

        let snapshot = provider.schema().await.unwrap();

        assert_eq!(snapshot.database_name.as_deref(), Some("shop"));
        assert!(snapshot.has_field("products", "price"));
        assert_eq!(provider.name(), "StaticSchemaProvider");
    }
}
