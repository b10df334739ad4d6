//! Client for SBOL design repositories served over SPARQL.
//!
//! [`SparqlTransport`] talks HTTP and scopes queries to the logged-in
//! user's graph; [`SbolQuery`] ties the compiler, the transport, the
//! fallback cache and the result shaper together.

mod client;
mod config;
mod error;
mod transport;

pub use client::{compile, SbolQuery};
pub use config::ClientConfig;
pub use error::{QueryError, QueryResult};
pub use transport::{SparqlTransport, SPARQL_RESULTS_JSON};

pub use convenient_bindings::{BindingRow, Shaped, ShapingSpec};
pub use convenient_cache::QueryCache;
pub use convenient_sparql::{DesignQuery, EntityFilter, Membership, PathCardinality, Projection};
