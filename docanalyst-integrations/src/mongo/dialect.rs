//! The MongoDB shell dialect.

use docanalyst_core::{AnalystError, ParsedQuery, QueryDialect, Result};
use tracing::debug;

use super::literal::is_ident_char;
use super::references::collect_references;
use super::shell::parse_statement;

const AUTHORING_TIPS: [&str; 10] = [
    "Format the query as `db.<collection name>.find({/* filter */})` or \
     `db.<collection name>.aggregate([/* pipeline */])`.",
    "Ensure proper use of MongoDB operators ($eq, $gt, $lt, etc.) and data types (ObjectId, ISODate).",
    "For complex queries, use an aggregation pipeline with proper stages ($match, $group, $lookup, etc.).",
    "Consider performance by utilizing available indexes, avoiding $where and full collection scans, \
     and using covered queries where possible.",
    "Include sorting (.sort()) and limiting (.limit()) when appropriate for result set management.",
    "Handle null values and existence checks explicitly with $exists and $type operators to \
     differentiate between missing fields, null values, and empty arrays.",
    "Do not include `null` in result objects in aggregation, e.g. do not include _id: null.",
    "For date operations, NEVER use an empty date object (e.g. `new Date()`). ALWAYS specify the date, \
     such as `new Date(\"2024-10-24\")`. Use the CURRENT DATE given below to inform dates in queries.",
    "For Decimal128 operations, prefer range queries over exact equality.",
    "When querying arrays, use appropriate operators like $elemMatch for complex matching, $all to \
     match multiple elements, or $size for array length checks.",
];

/// Query dialect for `mongosh`-style statements.
///
/// Supports `find`, `findOne`, `aggregate`, `countDocuments`, `count` and
/// `distinct`, with `.sort()`, `.limit()` and `.skip()` on `find` cursors.
///
/// # Examples
///
/// ```rust
/// use docanalyst_core::QueryDialect;
/// use docanalyst_integrations::MongoShellDialect;
///
/// let dialect = MongoShellDialect::new();
/// let text = dialect.extract_candidate("Here you go:\n```js\ndb.users.find({age: {$gt: 30}})\n```");
/// assert_eq!(text, "db.users.find({age: {$gt: 30}})");
///
/// let parsed = dialect.parse(&text).unwrap();
/// assert_eq!(parsed.collection, "users");
/// assert_eq!(parsed.fields[0].path, "age");
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoShellDialect;

impl MongoShellDialect {
    /// Create the dialect.
    pub fn new() -> Self {
        Self
    }
}

impl QueryDialect for MongoShellDialect {
    fn name(&self) -> &'static str {
        "MongoShellDialect"
    }

    fn language(&self) -> &'static str {
        "MongoDB shell"
    }

    fn authoring_tips(&self) -> Vec<String> {
        AUTHORING_TIPS.iter().map(|tip| (*tip).to_string()).collect()
    }

    /// Keep the first complete `db.` statement of the output.
    ///
    /// Fence lines are dropped first. The statement starts at the first line
    /// beginning with `db.` (or, failing that, the first `db.` anywhere) and
    /// ends where its brackets balance and no `.method()` chain follows.
    fn extract_candidate(&self, raw: &str) -> String {
        let unfenced = raw
            .lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n");

        match statement_start(&unfenced) {
            Some(start) => {
                let statement = &unfenced[start..];
                statement[..statement_end(statement)].trim().to_string()
            }
            None => unfenced.trim().to_string(),
        }
    }

    fn parse(&self, text: &str) -> Result<ParsedQuery> {
        let mut parsed = parse_statement(text)?;
        collect_references(&mut parsed).map_err(|violation| {
            AnalystError::syntax(
                format!(
                    "field '{}' is not available at {}: an earlier stage removed it",
                    violation.path, violation.location
                ),
                text.find(&violation.path).unwrap_or(0),
            )
        })?;

        debug!(
            collection = %parsed.collection,
            operation = %parsed.operation,
            collections = parsed.collections.len(),
            fields = parsed.fields.len(),
            "Parsed shell query"
        );
        Ok(parsed)
    }
}

fn statement_start(text: &str) -> Option<usize> {
    let starts_statement = |rest: &str| {
        rest.strip_prefix("db")
            .map(str::trim_start)
            .is_some_and(|after| after.starts_with('.') || after.starts_with('['))
    };

    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        if starts_statement(line.trim_start()) {
            return Some(line_start + indent);
        }
        line_start += line.len();
    }

    text.match_indices("db")
        .map(|(i, _)| i)
        .find(|&i| {
            let standalone = text[..i]
                .chars()
                .next_back()
                .is_none_or(|c| !is_ident_char(c) && c != '.');
            standalone && starts_statement(&text[i..])
        })
}

/// Byte length of the statement at the start of `text`.
fn statement_end(text: &str) -> usize {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut called = false;

    for (i, c) in text.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                called |= depth == 0 && c == ')';
            }
            ';' if depth == 0 => return i,
            _ if depth > 0 || !called => {}
            _ if c.is_whitespace() => {
                if !text[i..].trim_start().starts_with('.') {
                    return i;
                }
            }
            _ if c != '.' && !is_ident_char(c) => return i,
            _ => {}
        }
    }
    text.len()
}
