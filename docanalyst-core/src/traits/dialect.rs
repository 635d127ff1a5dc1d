//! Query dialect trait.
//!
//! A dialect knows the surface syntax of one query language: how to pull a
//! query out of free-form oracle output, what authoring tips to give the
//! oracle, and how to read a query's structure without running it.

use crate::{Result, types::ParsedQuery};

/// Surface syntax of a query language.
pub trait QueryDialect: Send + Sync + std::fmt::Debug {
    /// Get a human-readable name for this dialect.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Name of the language, as shown to the oracle ("MongoDB shell").
    fn language(&self) -> &'static str;

    /// Authoring tips appended to query-generation prompts.
    fn authoring_tips(&self) -> Vec<String> {
        Vec::new()
    }

    /// Pull the query text out of raw oracle output.
    ///
    /// The default drops markdown fence lines and trims the rest.
    fn extract_candidate(&self, raw: &str) -> String {
        raw.lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    /// Parse query text into its structural reading.
    ///
    /// # Errors
    ///
    /// Returns [`AnalystError::Syntax`](crate::AnalystError::Syntax) when the
    /// text does not fit the grammar.
    fn parse(&self, text: &str) -> Result<ParsedQuery>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueryOperation;

    #[derive(Debug)]
    struct Plain;

    impl QueryDialect for Plain {
        fn language(&self) -> &'static str {
            "plain"
        }

        fn parse(&self, text: &str) -> Result<ParsedQuery> {
            Ok(ParsedQuery::new(text, QueryOperation::Find))
        }
    }

    #[test]
    fn test_default_extraction_strips_fences() {
        let raw = "```javascript\ndb.users.find({})\n```\n";
        assert_eq!(Plain.extract_candidate(raw), "db.users.find({})");
    }
}
