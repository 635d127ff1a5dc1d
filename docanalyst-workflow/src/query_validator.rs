//! Query validation.
//!
//! Three checks, cheapest first:
//!
//! 1. the query parses in the dialect's grammar;
//! 2. every collection and field it references exists in the schema snapshot
//!    (exact, case-sensitive);
//! 3. the oracle agrees the query answers the question.
//!
//! A failure in (1) or (2) is recorded with its own reason and returned
//! without calling the oracle.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use docanalyst_core::{
    CandidateQuery, LanguageModel, ParsedQuery, QueryDialect, Result, SchemaSnapshot, Verdict,
};

use crate::prompts::PromptBuilder;
use crate::verdict_parser::parse_verdict;

/// Judges candidate queries.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    oracle: Arc<dyn LanguageModel>,
    dialect: Arc<dyn QueryDialect>,
    prompts: Arc<PromptBuilder>,
}

impl QueryValidator {
    /// Create a validator.
    pub fn new(
        oracle: Arc<dyn LanguageModel>,
        dialect: Arc<dyn QueryDialect>,
        prompts: Arc<PromptBuilder>,
    ) -> Self {
        Self {
            oracle,
            dialect,
            prompts,
        }
    }

    /// Judge `candidate` against the schema and the question.
    ///
    /// # Errors
    ///
    /// Propagates oracle failures from the intent check.
    #[instrument(skip_all, fields(query = %candidate))]
    pub async fn validate(
        &self,
        question: &str,
        candidate: &CandidateQuery,
        schema: &SchemaSnapshot,
    ) -> Result<Verdict> {
        if candidate.is_blank() {
            return Ok(Verdict::invalid("no query produced"));
        }

        let parsed = match &candidate.parsed {
            Some(parsed) => parsed.clone(),
            None => match self.dialect.parse(&candidate.text) {
                Ok(parsed) => parsed,
                Err(e) => {
                    debug!(error = %e, "Structural check failed");
                    return Ok(Verdict::invalid(format!("query is not well-formed: {e}")));
                }
            },
        };

        let violations = schema_violations(&parsed, schema);
        if !violations.is_empty() {
            debug!(?violations, "Schema conformance failed");
            return Ok(Verdict::Invalid(violations));
        }

        let prompt = self.prompts.query_intent(question, candidate, schema);
        let response = self.oracle.complete(&prompt).await?;
        let verdict = parse_verdict(&response);
        if !verdict.is_valid() {
            warn!(reasons = ?verdict.reasons(), "Query rejected by intent check");
        }
        Ok(verdict)
    }
}

/// Reasons `parsed` does not conform to `schema`, in reference order.
///
/// Fields are only checked on collections that exist, so a hallucinated
/// collection is reported once rather than once per field. An empty snapshot
/// means the schema is unknown and nothing is reported.
///
/// # Examples
///
/// ```rust
/// use docanalyst_core::{FieldReference, ParsedQuery, QueryOperation, SchemaSnapshot};
/// use docanalyst_workflow::query_validator::schema_violations;
///
/// let schema = SchemaSnapshot::new().with_collection("customers", ["name", "city"]);
/// let mut parsed = ParsedQuery::new("customers", QueryOperation::Count);
/// parsed.reference_field(FieldReference::new("customers", "location", "filter"));
///
/// assert_eq!(
///     schema_violations(&parsed, &schema),
///     vec!["field 'location' not in schema".to_string()],
/// );
/// ```
pub fn schema_violations(parsed: &ParsedQuery, schema: &SchemaSnapshot) -> Vec<String> {
    if schema.is_empty() {
        warn!("Schema snapshot is empty, skipping conformance check");
        return Vec::new();
    }

    let mut reasons: Vec<String> = parsed
        .collections
        .iter()
        .filter(|name| !schema.has_collection(name))
        .map(|name| format!("collection '{name}' not in schema"))
        .collect();

    for field in &parsed.fields {
        if schema.has_collection(&field.collection)
            && !schema.has_field(&field.collection, &field.path)
        {
            let reason = format!("field '{}' not in schema", field.path);
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
        }
    }

    reasons
}

#[cfg(test)]
mod tests {
    use super::*;
    use docanalyst_core::{FieldReference, QueryOperation};
    use pretty_assertions::assert_eq;

    fn schema() -> SchemaSnapshot {
        SchemaSnapshot::new()
            .with_collection("customers", ["name", "city"])
            .with_collection("products", ["sku", "price"])
    }

    #[test]
    fn test_unknown_collection_is_named() {
        let parsed = ParsedQuery::new("orders", QueryOperation::Find);
        assert_eq!(
            schema_violations(&parsed, &schema()),
            vec!["collection 'orders' not in schema".to_string()]
        );
    }

    #[test]
    fn test_fields_on_unknown_collections_are_not_repeated() {
        let mut parsed = ParsedQuery::new("orders", QueryOperation::Find);
        parsed.reference_field(FieldReference::new("orders", "total", "filter"));
        assert_eq!(schema_violations(&parsed, &schema()).len(), 1);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let mut parsed = ParsedQuery::new("customers", QueryOperation::Find);
        parsed.reference_field(FieldReference::new("customers", "City", "filter"));
        assert_eq!(
            schema_violations(&parsed, &schema()),
            vec!["field 'City' not in schema".to_string()]
        );
    }

    #[test]
    fn test_lookup_collection_is_checked() {
        let mut parsed = ParsedQuery::new("customers", QueryOperation::Aggregate);
        parsed.reference_collection("orders");
        parsed.reference_field(FieldReference::new("customers", "name", "$project (stage 2)"));
        assert_eq!(
            schema_violations(&parsed, &schema()),
            vec!["collection 'orders' not in schema".to_string()]
        );
    }

    #[test]
    fn test_conforming_query() {
        let mut parsed = ParsedQuery::new("customers", QueryOperation::Count);
        parsed.reference_field(FieldReference::new("customers", "city", "filter"));
        assert!(schema_violations(&parsed, &schema()).is_empty());
    }

    #[test]
    fn test_empty_schema_skips_conformance() {
        let parsed = ParsedQuery::new("anything", QueryOperation::Find);
        assert!(schema_violations(&parsed, &SchemaSnapshot::new()).is_empty());
    }
}
