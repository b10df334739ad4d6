//! Rendering of IRIs, literals and variables into SPARQL text.

use crate::vocab::PREFIXES;
use std::fmt::{self, Write as _};

/// Renders a query variable: `?label`.
#[must_use]
pub fn var(label: &str) -> String {
    format!("?{label}")
}

/// Renders an IRI reference.
///
/// Names using one of the declared prefixes (`sbol:role`) are emitted
/// unchanged. Everything else is wrapped in angle brackets, with characters
/// that may not appear inside an IRI reference percent-encoded, so a value
/// can never close the reference or the surrounding group.
#[must_use]
pub fn iri(value: &str) -> String {
    if is_prefixed_name(value) {
        return value.to_string();
    }
    let inner = value
        .strip_prefix('<')
        .and_then(|v| v.strip_suffix('>'))
        .unwrap_or(value);
    iri_ref(inner)
}

// `<inner>` with IRIREF-excluded characters percent-encoded.
fn iri_ref(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len() + 2);
    out.push('<');
    for c in inner.chars() {
        if c <= ' ' || c == '\u{7f}' || "<>\"{}|^`\\".contains(c) {
            let _ = write!(out, "%{:02X}", u32::from(c));
        } else {
            out.push(c);
        }
    }
    out.push('>');
    out
}

/// Renders a double-quoted string literal.
#[must_use]
pub fn literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_prefixed_name(value: &str) -> bool {
    value.split_once(':').is_some_and(|(prefix, local)| {
        PREFIXES.iter().any(|(known, _)| *known == prefix)
            && !local.ends_with('.')
            && local
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    })
}

/// Object of a custom-property triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    /// IRI reference, stored without angle brackets.
    Iri(String),
    /// Plain string literal.
    Literal(String),
}

impl Term {
    /// Interprets a caller-supplied value: `<...>` is an IRI, anything else a literal.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.strip_prefix('<').and_then(|v| v.strip_suffix('>')) {
            Some(inner) => Term::Iri(inner.to_string()),
            None => Term::Literal(value.to_string()),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(value) => f.write_str(&iri_ref(value)),
            Term::Literal(value) => f.write_str(&literal(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iri_wraps_full_iris_only() {
        assert_eq!(iri("http://sbols.org/v2#role"), "<http://sbols.org/v2#role>");
        assert_eq!(iri("<http://x.org/a>"), "<http://x.org/a>");
        assert_eq!(iri("sbol:role"), "sbol:role");
        assert_eq!(iri("urn:uuid:1234"), "<urn:uuid:1234>");
    }

    #[test]
    fn test_iri_encodes_breaking_characters() {
        assert_eq!(
            iri("http://x.org/a> } ?s ?p ?o {"),
            "<http://x.org/a%3E%20%7D%20?s%20?p%20?o%20%7B>"
        );
        assert_eq!(iri("<http://x.org/a b>"), "<http://x.org/a%20b>");
        assert_eq!(iri("http://x.org/\"q\"\n"), "<http://x.org/%22q%22%0A>");
        assert_eq!(iri("sbol:role }"), "<sbol:role%20%7D>");
        assert_eq!(
            Term::Iri("http://x.org/a>".to_string()).to_string(),
            "<http://x.org/a%3E>"
        );
    }

    #[test]
    fn test_literal_escapes_quotes_and_newlines() {
        assert_eq!(literal("plain"), "\"plain\"");
        assert_eq!(literal("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
        assert_eq!(literal("a\\b"), "\"a\\\\b\"");
    }

    #[test]
    fn test_term_parse() {
        assert_eq!(
            Term::parse("<http://x.org/a>"),
            Term::Iri("http://x.org/a".to_string())
        );
        assert_eq!(Term::parse("LB"), Term::Literal("LB".to_string()));
        assert_eq!(Term::parse("<http://x.org/a>").to_string(), "<http://x.org/a>");
        assert_eq!(Term::parse("LB").to_string(), "\"LB\"");
    }
}
