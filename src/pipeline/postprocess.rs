//! Post-processing: deterministic cleanup of model output.
//!
//! Two passes, both pure:
//!
//! * [`extract_json_payload`] runs on the raw completion before parsing. Even
//!   with a structured-output constraint some endpoints wrap JSON in
//!   ```` ```json ```` fences, prepend a BOM, or add a sentence of prose.
//! * [`clean_field`] runs on every string of a parsed record: line endings,
//!   invisible characters and runs of spaces are normalised so that the same
//!   agreement yields the same record regardless of PDF text-layer quirks.
//!
//! [`dedupe_critical_terms`] enforces that CriticalTerms never repeat a fixed
//! field or each other.

use crate::schema::{AgreementField, CriticalTerm};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

// ── Raw payload ─────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*)\n```\s*$").unwrap());

/// Isolate the JSON object in a raw completion.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (BOM, zero-width spaces)
/// 2. Strip outer code fences
/// 3. If prose surrounds the object, keep the outermost `{ … }`
pub fn extract_json_payload(raw: &str) -> String {
    let s = remove_invisible_chars(raw);
    let s = s.trim();
    let s = match RE_OUTER_FENCES.captures(s) {
        Some(caps) => caps[1].trim().to_string(),
        None => s.to_string(),
    };
    if s.starts_with('{') {
        return s;
    }
    match (s.find('{'), s.rfind('}')) {
        (Some(start), Some(end)) if start < end => s[start..=end].to_string(),
        _ => s,
    }
}

// ── Field text ──────────────────────────────────────────────────────────────

static RE_INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalise one string field.
///
/// 1. CRLF / CR → LF
/// 2. Strip invisible Unicode
/// 3. Trim each line; tabs, NBSPs and runs of blanks become one space
/// 4. Collapse 3+ newlines to one blank line
/// 5. Trim the whole value
pub fn clean_field(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = s
        .lines()
        .map(|line| RE_INLINE_SPACE.replace_all(line.trim(), " ").into_owned())
        .collect::<Vec<_>>()
        .join("\n");
    let s = RE_BLANK_LINES.replace_all(&s, "\n\n");
    s.trim().to_string()
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Critical terms ──────────────────────────────────────────────────────────

/// Drop critical terms that name a fixed field or repeat an earlier term.
///
/// Order of the surviving terms is preserved.
pub fn dedupe_critical_terms(terms: &mut Vec<CriticalTerm>) {
    let mut seen = HashSet::new();
    terms.retain(|t| {
        if AgreementField::parse(&t.flagged_term).is_some() {
            return false;
        }
        seen.insert(fold(&t.flagged_term))
    });
}

fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(name: &str) -> CriticalTerm {
        CriticalTerm {
            flagged_term: name.into(),
            details: "d".into(),
            inference: "i".into(),
        }
    }

    #[test]
    fn test_payload_passthrough() {
        assert_eq!(extract_json_payload(r#"{"a":1}"#), r#"{"a":1}"#);
    }

    #[test]
    fn test_payload_strip_fences() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(extract_json_payload(raw), "{\"a\": 1}");
        let raw = "```\n{\"a\": 1}\n```\n";
        assert_eq!(extract_json_payload(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_payload_strip_bom_and_prose() {
        let raw = "\u{FEFF}Here is the report:\n{\"a\": {\"b\": 2}}\nThanks.";
        assert_eq!(extract_json_payload(raw), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn test_payload_without_object_is_returned_trimmed() {
        assert_eq!(extract_json_payload("  sorry  "), "sorry");
    }

    #[test]
    fn test_clean_field_whitespace() {
        assert_eq!(clean_field("  12   Elm\tStreet  "), "12 Elm Street");
        assert_eq!(clean_field("a\r\nb\r\n\r\n\r\n\r\nc"), "a\nb\n\nc");
    }

    #[test]
    fn test_clean_field_single_tab_and_nbsp() {
        assert_eq!(clean_field("Elm\tStreet"), "Elm Street");
        assert_eq!(clean_field("Elm\u{00A0}Street"), "Elm Street");
        assert_eq!(clean_field("$1,500\u{00A0}\tper month"), "$1,500 per month");
    }

    #[test]
    fn test_clean_field_invisible() {
        assert_eq!(clean_field("\u{FEFF}John\u{200B} Renter"), "John Renter");
    }

    #[test]
    fn test_dedupe_drops_fixed_fields_and_repeats() {
        let mut terms = vec![
            term("Subletting"),
            term("Security Deposit"),
            term("Pet Policy"),
            term("subletting "),
            term("Maintenance"),
        ];
        dedupe_critical_terms(&mut terms);
        let names: Vec<&str> = terms.iter().map(|t| t.flagged_term.as_str()).collect();
        assert_eq!(names, vec!["Subletting", "Pet Policy", "Maintenance"]);
    }
}
