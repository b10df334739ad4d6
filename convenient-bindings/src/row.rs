//! Binding rows and the SPARQL 1.1 JSON results document.

use crate::{BindingsError, BindingsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Kind of a bound RDF term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingKind {
    /// IRI
    Uri,
    /// Literal
    Literal,
    /// Typed literal, as emitted by older endpoints
    TypedLiteral,
    /// Blank node
    Bnode,
}

/// One bound value: `{"type": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Binding {
    /// Term kind
    #[serde(rename = "type")]
    pub kind: BindingKind,
    /// Lexical value
    pub value: String,
    /// Datatype IRI of a typed literal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datatype: Option<String>,
    /// Language tag
    #[serde(rename = "xml:lang", default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl Binding {
    /// An IRI binding.
    #[must_use]
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            kind: BindingKind::Uri,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    /// A plain literal binding.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: BindingKind::Literal,
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }
}

/// One solution: variable name to bound value. Unbound variables are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingRow(BTreeMap<String, Binding>);

impl BindingRow {
    /// An empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a literal binding.
    #[must_use]
    pub fn with_literal(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.0.insert(var.into(), Binding::literal(value));
        self
    }

    /// Adds an IRI binding.
    #[must_use]
    pub fn with_uri(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.0.insert(var.into(), Binding::uri(value));
        self
    }

    /// Sets `var`, returning the previous binding.
    pub fn insert(&mut self, var: impl Into<String>, binding: Binding) -> Option<Binding> {
        self.0.insert(var.into(), binding)
    }

    /// The binding for `var`.
    #[must_use]
    pub fn get(&self, var: &str) -> Option<&Binding> {
        self.0.get(var)
    }

    /// The lexical value bound to `var`.
    #[must_use]
    pub fn value(&self, var: &str) -> Option<&str> {
        self.0.get(var).map(|b| b.value.as_str())
    }

    /// Bound variable names.
    pub fn vars(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Binding)> for BindingRow {
    fn from_iter<T: IntoIterator<Item = (String, Binding)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// `head` of a results document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    /// Projected variables
    #[serde(default)]
    pub vars: Vec<String>,
}

/// `results` of a results document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Results {
    /// Solutions
    #[serde(default)]
    pub bindings: Vec<BindingRow>,
}

/// SPARQL 1.1 query results in JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparqlResults {
    /// Header
    #[serde(default)]
    pub head: Head,
    /// Solutions; absent for boolean results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Results>,
}

impl SparqlResults {
    /// The solution rows.
    ///
    /// # Errors
    ///
    /// Returns `BindingsError::MissingResults` for a document without a
    /// `results` member.
    pub fn into_rows(self) -> BindingsResult<Vec<BindingRow>> {
        self.results
            .map(|r| r.bindings)
            .ok_or(BindingsError::MissingResults)
    }
}

impl FromStr for SparqlResults {
    type Err = BindingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}
