//! Text renderings of schemas and result sets.
//!
//! Prompt renderings are bounded so large result sets never blow the oracle's
//! context window; the display rendering is what a caller shows a user.

use docanalyst_core::{ResultSet, SchemaSnapshot, config::RenderLimits};

/// Fields listed per collection in prompts.
pub const MAX_SCHEMA_FIELDS: usize = 20;

const SEPARATOR_WIDTH: usize = 60;

/// Render a schema snapshot for a prompt.
///
/// # Examples
///
/// ```rust
/// use docanalyst_core::SchemaSnapshot;
/// use docanalyst_workflow::render::render_schema;
///
/// let schema = SchemaSnapshot::new().with_collection("customers", ["name", "city"]);
/// let text = render_schema(&schema);
/// assert!(text.contains("Collection: customers"));
/// assert!(text.contains("- city"));
/// ```
pub fn render_schema(schema: &SchemaSnapshot) -> String {
    if schema.is_empty() {
        return "Schema information not available.".to_string();
    }

    let mut out = format!(
        "Database: {}\n\nCollections:\n",
        schema.database_name.as_deref().unwrap_or("unknown")
    );

    for (name, collection) in schema.collections() {
        out.push_str(&format!("\n  Collection: {name}\n"));
        if let Some(count) = collection.document_count {
            out.push_str(&format!("    Document Count: {count}\n"));
        }
        if !collection.is_empty() {
            out.push_str("    Fields:\n");
            for field in collection.fields().iter().take(MAX_SCHEMA_FIELDS) {
                let line = match &field.kind {
                    Some(kind) => format!("      - {} ({kind})\n", field.name),
                    None => format!("      - {}\n", field.name),
                };
                out.push_str(&line);
            }
            if collection.len() > MAX_SCHEMA_FIELDS {
                out.push_str(&format!(
                    "      ... and {} more fields\n",
                    collection.len() - MAX_SCHEMA_FIELDS
                ));
            }
        }
        if !collection.indexes.is_empty() {
            out.push_str("    Indexes:\n");
            for index in &collection.indexes {
                out.push_str(&format!("      - {index}\n"));
            }
        }
    }

    out.trim_end().to_string()
}

/// Render a result set for a prompt, within `limits`.
pub fn render_results(results: &ResultSet, limits: RenderLimits) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let shown = results.len().min(limits.max_items);
    let mut out = format!(
        "Found {} result(s). Showing first {shown}:\n\n",
        results.len()
    );

    for (i, document) in results.iter().take(shown).enumerate() {
        let json = serde_json::Value::Object(document.clone()).to_string();
        let (json, cut) = truncate_chars(&json, limits.max_document_chars);
        out.push_str(&format!(
            "Result {}:\n{json}{}\n\n",
            i + 1,
            if cut { "... (truncated)" } else { "" }
        ));
    }

    if results.len() > shown {
        out.push_str(&format!(
            "... and {} more results (not shown)\n",
            results.len() - shown
        ));
    }

    let (text, cut) = truncate_chars(out.trim_end(), limits.max_chars);
    if cut {
        format!("{text}... (truncated for length)")
    } else {
        text.to_string()
    }
}

/// Render the question, query and up to `limit` documents for display.
pub fn render_for_display(results: &ResultSet, question: &str, query: &str, limit: usize) -> String {
    let rule = "=".repeat(SEPARATOR_WIDTH);
    let mut out = format!(
        "{rule}\nQUERY RESULTS\n{rule}\n\n\
         Question: {question}\n\n\
         Generated Query:\n{query}\n\n\
         {}\nResults:\n\n",
        "-".repeat(SEPARATOR_WIDTH)
    );

    if results.is_empty() {
        out.push_str("No documents found matching your query.\n");
    } else {
        out.push_str(&format!("Found {} document(s):\n\n", results.len()));
        for (i, document) in results.iter().take(limit).enumerate() {
            let json = serde_json::Value::Object(document.clone());
            out.push_str(&format!("Document {}:\n{json:#}\n\n", i + 1));
        }
        if results.len() > limit {
            out.push_str(&format!("... and {} more documents\n", results.len() - limit));
        }
    }

    out.push('\n');
    out.push_str(&rule);
    out
}

/// Cut `text` to at most `max` characters, reporting whether anything was cut.
pub(crate) fn truncate_chars(text: &str, max: usize) -> (&str, bool) {
    match text.char_indices().nth(max) {
        Some((byte, _)) => (&text[..byte], true),
        None => (text, false),
    }
}
