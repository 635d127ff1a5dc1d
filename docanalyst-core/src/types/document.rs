//! Documents and result sets returned by query execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single document returned by the store.
pub type Document = serde_json::Map<String, Value>;

/// Ordered sequence of documents produced by executing a query.
///
/// An empty result set is a valid outcome ("nothing matched") and is kept
/// distinct from an execution failure, which never produces a `ResultSet`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    documents: Vec<Document>,
}

impl ResultSet {
    /// Create an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a result set from arbitrary JSON values.
    ///
    /// Objects are taken as documents; any other value (a bare count, a
    /// distinct value) is wrapped as `{"value": ...}` so downstream code only
    /// ever sees documents.
    pub fn from_values<I: IntoIterator<Item = Value>>(values: I) -> Self {
        let documents = values
            .into_iter()
            .map(|value| match value {
                Value::Object(map) => map,
                other => {
                    let mut wrapped = Document::new();
                    wrapped.insert("value".to_string(), other);
                    wrapped
                }
            })
            .collect();
        Self { documents }
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Borrow the documents.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Iterate over the documents.
    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }

    /// Take ownership of the documents.
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }

    /// Visit every scalar value with its dotted path.
    ///
    /// Array elements do not contribute a path segment, so
    /// `{"items": [{"qty": 2}]}` yields `("items.qty", 2)`.
    pub fn for_each_leaf<F>(&self, mut visit: F)
    where
        F: FnMut(&str, &Value),
    {
        for document in &self.documents {
            for (key, value) in document {
                walk(key, value, &mut visit);
            }
        }
    }

    /// Whether any key at any depth equals `name`.
    pub fn contains_key(&self, name: &str) -> bool {
        self.documents.iter().any(|d| map_contains_key(d, name))
    }
}

impl From<Vec<Document>> for ResultSet {
    fn from(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

impl IntoIterator for ResultSet {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

fn walk<F>(path: &str, value: &Value, visit: &mut F)
where
    F: FnMut(&str, &Value),
{
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(&format!("{path}.{key}"), child, visit);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(path, item, visit);
            }
        }
        scalar => visit(path, scalar),
    }
}

fn map_contains_key(map: &Document, name: &str) -> bool {
    map.iter().any(|(key, value)| key == name || value_contains_key(value, name))
}

fn value_contains_key(value: &Value, name: &str) -> bool {
    match value {
        Value::Object(map) => map_contains_key(map, name),
        Value::Array(items) => items.iter().any(|item| value_contains_key(item, name)),
        _ => false,
    }
}
