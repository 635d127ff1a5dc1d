//! Candidate and parsed query types.
//!
//! The workflow never executes or optimizes queries itself. A
//! [`CandidateQuery`] carries the generated text and, when the dialect could
//! read it, the [`ParsedQuery`] describing which collections and fields it
//! touches. That description is what schema conformance is checked against.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of operation a query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOperation {
    /// Return matching documents.
    Find,
    /// Return the first matching document.
    FindOne,
    /// Run an aggregation pipeline.
    Aggregate,
    /// Count matching documents.
    Count,
    /// Return the distinct values of one field.
    Distinct,
}

impl QueryOperation {
    /// Short description used in intent-check prompts.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Find => "filter documents",
            Self::FindOne => "fetch a single document",
            Self::Aggregate => "aggregate documents through a pipeline",
            Self::Count => "count documents",
            Self::Distinct => "list distinct values",
        }
    }
}

impl fmt::Display for QueryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Find => "find",
            Self::FindOne => "findOne",
            Self::Aggregate => "aggregate",
            Self::Count => "count",
            Self::Distinct => "distinct",
        };
        f.write_str(name)
    }
}

/// A field path referenced by a query, scoped to the collection it must exist on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldReference {
    /// Collection whose schema must contain the path.
    pub collection: String,

    /// Dotted field path as written in the query.
    pub path: String,

    /// Where the reference occurs (`filter`, `sort`, `$group (stage 2)`, ...).
    pub location: String,
}

impl FieldReference {
    /// Create a new reference.
    pub fn new(
        collection: impl Into<String>,
        path: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            path: path.into(),
            location: location.into(),
        }
    }
}

/// Cursor modifiers chained after the main call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryModifiers {
    /// Sort specification.
    pub sort: Option<serde_json::Value>,
    /// Maximum number of documents.
    pub limit: Option<u64>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
}

/// Structural reading of a candidate query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// Target collection.
    pub collection: String,

    /// Operation performed on the target collection.
    pub operation: QueryOperation,

    /// Call arguments, as JSON.
    pub arguments: Vec<serde_json::Value>,

    /// Chained cursor modifiers.
    pub modifiers: QueryModifiers,

    /// Every collection the query reads, target first.
    pub collections: Vec<String>,

    /// Every field path the query reads, in order of appearance.
    pub fields: Vec<FieldReference>,
}

impl ParsedQuery {
    /// Create a parsed query that reads only its target collection.
    pub fn new(collection: impl Into<String>, operation: QueryOperation) -> Self {
        let collection = collection.into();
        Self {
            collections: vec![collection.clone()],
            collection,
            operation,
            arguments: Vec::new(),
            modifiers: QueryModifiers::default(),
            fields: Vec::new(),
        }
    }

    /// Record another referenced collection (duplicates are ignored).
    pub fn reference_collection(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.collections.contains(&name) {
            self.collections.push(name);
        }
    }

    /// Record a referenced field.
    pub fn reference_field(&mut self, reference: FieldReference) {
        if !self.fields.contains(&reference) {
            self.fields.push(reference);
        }
    }
}

/// A generated query under consideration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateQuery {
    /// Query text as extracted from the oracle's output.
    pub text: String,

    /// Structural reading, when the text fits the dialect's grammar.
    pub parsed: Option<ParsedQuery>,
}

impl CandidateQuery {
    /// Create an unparsed candidate.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parsed: None,
        }
    }

    /// Attach a structural reading.
    #[must_use]
    pub fn with_parsed(mut self, parsed: ParsedQuery) -> Self {
        self.parsed = Some(parsed);
        self
    }

    /// Whether the generator produced any text at all.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

impl fmt::Display for CandidateQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_bookkeeping() {
        let mut parsed = ParsedQuery::new("orders", QueryOperation::Aggregate);
        parsed.reference_collection("customers");
        parsed.reference_collection("orders");
        parsed.reference_field(FieldReference::new("orders", "total", "$match (stage 1)"));
        parsed.reference_field(FieldReference::new("orders", "total", "$match (stage 1)"));

        assert_eq!(parsed.collections, vec!["orders", "customers"]);
        assert_eq!(parsed.fields.len(), 1);
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(QueryOperation::FindOne.to_string(), "findOne");
        assert_eq!(QueryOperation::Count.describe(), "count documents");
    }

    #[test]
    fn test_blank_candidate() {
        assert!(CandidateQuery::new("  \n").is_blank());
        assert!(!CandidateQuery::new("db.a.find({})").is_blank());
    }
}
