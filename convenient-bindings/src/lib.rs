//! SPARQL JSON results and the result shaper.
//!
//! Decodes `application/sparql-results+json` documents into [`BindingRow`]s
//! and groups rows into nested application data with [`shape`].
//!
//! # Example
//!
//! ```
//! use convenient_bindings::{BindingRow, ShapingSpec, shape};
//!
//! let rows = vec![
//!     BindingRow::new().with_literal("g", "x").with_literal("v", "1"),
//!     BindingRow::new().with_literal("g", "x").with_literal("v", "2"),
//! ];
//! let shaped = shape(&rows, &ShapingSpec::keys(["v"]).group_by("g"));
//! assert_eq!(shaped.to_json(), serde_json::json!({"x": ["1", "2"]}));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

pub mod row;
pub mod shape;
pub mod sort;

pub use row::{Binding, BindingKind, BindingRow, Head, Results, SparqlResults};
pub use shape::{Shaped, ShapingSpec, shape};
pub use sort::{sort_rows, sort_shaped};

/// Errors raised while decoding results.
#[derive(Debug, thiserror::Error)]
pub enum BindingsError {
    /// The document is not valid results JSON
    #[error("Invalid results document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document carries no `results` member
    #[error("Results document has no bindings")]
    MissingResults,
}

/// Result type for decoding.
pub type BindingsResult<T> = Result<T, BindingsError>;
