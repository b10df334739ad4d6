//! Composable SPARQL graph-pattern compiler for SBOL design queries.
//!
//! Turns typed filter criteria into graph-pattern fragments and assembles
//! complete `SELECT DISTINCT` queries. Compilation is pure: no I/O, no shared
//! state.
//!
//! # Rules
//!
//! - An empty criterion produces an empty fragment (no constraint).
//! - One value produces a fixed-object triple; several alternatives produce a
//!   `VALUES` block binding a shared variable.
//! - Variables are named from caller-supplied labels and never renamed;
//!   inconsistent reuse of a label is a compile error.
//!
//! # Example
//!
//! ```
//! use convenient_sparql::{DesignQuery, EntityFilter, Membership, vocab::catalog};
//!
//! let query = DesignQuery::new(
//!     EntityFilter::new()
//!         .with_type(catalog::DNA_REGION)
//!         .with_role(catalog::PROMOTER)
//!         .with_role(catalog::TERMINATOR),
//! )
//! .with_membership(Membership::of(["https://hub.sd2e.org/user/sd2e/design/parts/1"]));
//!
//! let compiled = query.compile().unwrap();
//! assert!(compiled.text.contains("SELECT DISTINCT ?design WHERE"));
//! assert!(compiled.text.contains("VALUES (?design_role)"));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

pub mod filter;
pub mod pattern;
pub mod query;
pub mod term;
pub mod vocab;

pub use filter::{EntityFilter, MemberIdiom, Membership, PathCardinality, Projection};
pub use pattern::{Containment, GraphPattern};
pub use query::{CompiledQuery, DesignQuery, LabelRegistry, LabelRole, Labels, compile};
pub use term::Term;

/// Errors raised while compiling a query.
///
/// Only structurally inconsistent input fails; missing criteria widen the
/// pattern instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Entity depth other than 1 or 2
    #[error("Unsupported entity depth: {0}")]
    UnsupportedDepth(u8),

    /// `rdf:type` with no containment idiom
    #[error("No containment idiom for rdf:type {0}")]
    UnknownRdfType(String),

    /// Unusable derived-from cardinality
    #[error("Invalid path cardinality: {0}")]
    InvalidCardinality(String),

    /// Label that is not a valid SPARQL variable name
    #[error("Invalid variable label: {0:?}")]
    InvalidLabel(String),

    /// Label reused for two different purposes
    #[error("Label `{label}` is bound as {first} and as {second}")]
    LabelConflict {
        /// The contested label
        label: String,
        /// Role it was first bound to
        first: String,
        /// Role of the conflicting binding
        second: String,
    },
}

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;
