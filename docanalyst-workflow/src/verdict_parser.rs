//! Reading validator verdicts out of oracle text.
//!
//! The oracle's answer is free text, so the workflow relies on one documented
//! contract and nothing else:
//!
//! - The first non-empty line starts with `VALID` or `INVALID`
//!   (case-insensitive). `HALLUCINATION` is accepted as a synonym of
//!   `INVALID`. Surrounding markdown emphasis or quotes are ignored.
//! - For `INVALID`, reasons are the text after the sentinel (following an
//!   optional `:` or `-`) plus every following non-empty line, with list
//!   bullets removed. With no reasons at all, a generic one is recorded.
//! - Anything else is treated as `INVALID` with an "unrecognized validator
//!   response" reason, so formatting noise can never pass as approval.

use docanalyst_core::Verdict;

const MAX_ECHO_CHARS: usize = 120;

/// Parse a validator response.
///
/// # Examples
///
/// ```rust
/// use docanalyst_core::Verdict;
/// use docanalyst_workflow::verdict_parser::parse_verdict;
///
/// assert_eq!(parse_verdict("VALID"), Verdict::Valid);
/// assert_eq!(
///     parse_verdict("INVALID: field 'location' not in schema"),
///     Verdict::invalid("field 'location' not in schema"),
/// );
/// ```
pub fn parse_verdict(response: &str) -> Verdict {
    let mut lines = response.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.next() else {
        return Verdict::invalid("unrecognized validator response: <empty>");
    };

    let head = first.trim_matches(|c: char| matches!(c, '*' | '_' | '`' | '"' | '\''));
    let upper = head.to_ascii_uppercase();

    let rest = if let Some(rest) = strip_sentinel(&upper, head, "INVALID") {
        rest
    } else if let Some(rest) = strip_sentinel(&upper, head, "HALLUCINATION") {
        rest
    } else if strip_sentinel(&upper, head, "VALID").is_some() {
        // commentary after the sentinel does not change the verdict
        return Verdict::Valid;
    } else {
        return unrecognized(first);
    };

    let mut reasons = Vec::new();
    let first_reason = clean_reason(rest);
    if !first_reason.is_empty() {
        reasons.push(first_reason);
    }
    reasons.extend(lines.map(clean_reason).filter(|r| !r.is_empty()));

    if reasons.is_empty() {
        reasons.push("validator rejected the candidate without a reason".to_string());
    }
    Verdict::Invalid(reasons)
}

/// If `upper` starts with `sentinel` at a word boundary, return the remainder
/// of the original text with separators removed.
fn strip_sentinel<'a>(upper: &str, original: &'a str, sentinel: &str) -> Option<&'a str> {
    if !upper.starts_with(sentinel) {
        return None;
    }
    let remainder = &original[sentinel.len()..];
    if starts_with_word_char(remainder) {
        return None;
    }
    Some(remainder.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, ':' | '-' | '*' | '.' | '—')
    }))
}

fn starts_with_word_char(text: &str) -> bool {
    text.chars()
        .next()
        .is_some_and(|c| c.is_alphanumeric() || c == '_')
}

fn clean_reason(line: &str) -> String {
    let line = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '•'))
        .trim_start();

    // numbered list marker: "1." or "2)"
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    let line = match line[digits..].strip_prefix(['.', ')']) {
        Some(rest) if digits > 0 => rest,
        _ => line,
    };
    line.trim().to_string()
}

fn unrecognized(line: &str) -> Verdict {
    let echo: String = line.chars().take(MAX_ECHO_CHARS).collect();
    Verdict::invalid(format!("unrecognized validator response: {echo}"))
}
