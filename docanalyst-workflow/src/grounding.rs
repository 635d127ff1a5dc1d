//! Local grounding checks for summaries.
//!
//! These run before the fact-checking oracle call and only reject what the
//! data provably contradicts:
//!
//! - a count stated against the result set ("there are 42 customers",
//!   "found 3 documents") that equals neither the number of results nor any
//!   count, frequency or value present in the data or the context
//! - a quoted name that appears nowhere
//!
//! Any other number is left to the oracle. A figure that cannot be derived
//! here (a unit conversion, a difference, a rounded magnitude, a percentage)
//! is not evidence of a fabrication.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use docanalyst_core::ResultSet;

static COUNT_CLAIM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:there\s+(?:are|is|were|was)|found|returned|retrieved|matched|total\s+of)\s+(\d{1,3}(?:,\d{3})+|\d+)\s+([a-z]+)\b",
    )
    .expect("static pattern")
});

static EMBEDDED_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static pattern"));

static COLLECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bdb\.([A-Za-z_][\w-]*)").expect("static pattern"));

static QUOTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"\n]{1,80})"|“([^”\n]{1,80})”|`([^`\n]{1,80})`"#)
        .expect("static pattern")
});

/// Nouns that always denote the returned rows.
const RESULT_NOUNS: &[&str] = &["result", "document", "record", "match", "entry", "row", "item"];

/// Everything a count or a quoted name may legitimately cite.
#[derive(Debug, Default)]
struct Facts {
    counts: HashSet<u64>,
    texts: Vec<String>,
    keys: HashSet<String>,
    nouns: HashSet<String>,
}

impl Facts {
    fn collect(results: &ResultSet, context: &[&str]) -> Self {
        let mut facts = Self {
            nouns: RESULT_NOUNS.iter().map(|noun| (*noun).to_string()).collect(),
            ..Self::default()
        };
        facts.counts.insert(results.len() as u64);

        let mut occurrences: HashMap<String, HashMap<String, u64>> = HashMap::new();
        let mut sums: HashMap<String, u64> = HashMap::new();
        results.for_each_leaf(|path, value| {
            *occurrences
                .entry(path.to_string())
                .or_default()
                .entry(scalar_text(value))
                .or_default() += 1;

            match value {
                Value::Number(n) => {
                    if let Some(n) = n.as_u64() {
                        facts.counts.insert(n);
                        let sum = sums.entry(path.to_string()).or_default();
                        *sum = sum.saturating_add(n);
                    }
                }
                Value::String(s) => facts.texts.push(s.clone()),
                _ => {}
            }
        });

        for values in occurrences.values() {
            facts.counts.insert(values.values().sum());
            facts.counts.insert(values.len() as u64);
            facts.counts.extend(values.values().copied());
        }
        facts.counts.extend(sums.into_values());

        for document in results {
            collect_keys(document, &mut facts.keys);
        }

        let embedded: Vec<u64> = facts.texts.iter().flat_map(|text| integers_in(text)).collect();
        facts.counts.extend(embedded);

        for text in context {
            facts.counts.extend(integers_in(text));
            facts.nouns.extend(
                COLLECTION
                    .captures_iter(text)
                    .map(|captures| stem(&captures[1])),
            );
            facts.texts.push((*text).to_string());
        }

        facts
    }

    fn counts_results(&self, noun: &str) -> bool {
        self.nouns.contains(&stem(noun))
    }

    fn supports_identifier(&self, identifier: &str) -> bool {
        self.keys.contains(identifier) || self.texts.iter().any(|text| text.contains(identifier))
    }
}

/// Reasons the summary contradicts the data.
///
/// `context` holds free text the summary may repeat, such as the question and
/// the executed query. An empty list means no contradiction was found; it does
/// not mean the summary is grounded.
///
/// # Examples
///
/// ```rust
/// use docanalyst_core::ResultSet;
/// use docanalyst_workflow::grounding::unsupported_claims;
/// use serde_json::json;
///
/// let results = ResultSet::from_values((0..7).map(|i| json!({"id": i + 100})));
/// assert!(unsupported_claims("There are 7 items.", &results, &[]).is_empty());
/// assert_eq!(unsupported_claims("There are 42 items.", &results, &[]).len(), 1);
/// ```
pub fn unsupported_claims(summary: &str, results: &ResultSet, context: &[&str]) -> Vec<String> {
    let facts = Facts::collect(results, context);
    let mut reasons = Vec::new();

    for captures in COUNT_CLAIM.captures_iter(summary) {
        let (number, noun) = (&captures[1], &captures[2]);
        if !facts.counts_results(noun) {
            continue;
        }
        let Ok(claimed) = number.replace(',', "").parse::<u64>() else {
            continue;
        };
        if !facts.counts.contains(&claimed) {
            push_unique(
                &mut reasons,
                format!(
                    "the count {number} {noun} does not match the {} result(s) returned",
                    results.len()
                ),
            );
        }
    }

    for captures in QUOTED.captures_iter(summary) {
        let Some(identifier) = captures
            .iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().trim())
        else {
            continue;
        };
        if !identifier.is_empty() && !facts.supports_identifier(identifier) {
            push_unique(
                &mut reasons,
                format!("'{identifier}' does not appear in the results"),
            );
        }
    }

    reasons
}

fn push_unique(reasons: &mut Vec<String>, reason: String) {
    if !reasons.contains(&reason) {
        reasons.push(reason);
    }
}

fn integers_in(text: &str) -> impl Iterator<Item = u64> + '_ {
    EMBEDDED_NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<u64>().ok())
}

/// Lowercase singular form, so "entries" and "entry" compare equal.
fn stem(word: &str) -> String {
    let word = word.to_lowercase();
    if let Some(base) = word.strip_suffix("ies") {
        format!("{base}y")
    } else if ["ches", "shes", "sses", "xes"].iter().any(|end| word.ends_with(end)) {
        word[..word.len() - 2].to_string()
    } else if word.ends_with('s') && !word.ends_with("ss") {
        word[..word.len() - 1].to_string()
    } else {
        word
    }
}

fn collect_keys(document: &serde_json::Map<String, Value>, keys: &mut HashSet<String>) {
    for (key, value) in document {
        keys.insert(key.clone());
        match value {
            Value::Object(map) => collect_keys(map, keys),
            Value::Array(items) => {
                for item in items {
                    if let Value::Object(map) = item {
                        collect_keys(map, keys);
                    }
                }
            }
            _ => {}
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
