use convenient_cache::{Classify, Disposition};
use convenient_sparql::CompileError;

/// Every failure a query call can report.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The query could not be compiled
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Login was rejected or could not be completed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The endpoint rejected the query text (HTTP 400)
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// The endpoint could not be reached or is temporarily unavailable
    #[error("Endpoint unreachable: {0}")]
    EndpointUnreachable(String),

    /// The endpoint failed while evaluating the query
    #[error("Endpoint internal error: {0}")]
    EndpointInternalError(String),

    /// Any other failure, including undecodable responses
    #[error("Unrecognized error: {0}")]
    Unrecognized(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for query calls.
pub type QueryResult<T> = Result<T, QueryError>;

impl Classify for QueryError {
    fn disposition(&self) -> Disposition {
        match self {
            QueryError::MalformedQuery(_)
            | QueryError::EndpointUnreachable(_)
            | QueryError::EndpointInternalError(_) => Disposition::Transient,
            QueryError::Compile(_)
            | QueryError::Auth(_)
            | QueryError::Unrecognized(_)
            | QueryError::Config(_) => Disposition::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_failures_are_transient() {
        let transient = [
            QueryError::MalformedQuery(String::new()),
            QueryError::EndpointUnreachable(String::new()),
            QueryError::EndpointInternalError(String::new()),
        ];
        assert!(transient.iter().all(Classify::is_transient));

        let fatal = [
            QueryError::Compile(CompileError::UnsupportedDepth(3)),
            QueryError::Auth(String::new()),
            QueryError::Unrecognized(String::new()),
            QueryError::Config(String::new()),
        ];
        assert!(fatal.iter().all(|e| e.disposition() == Disposition::Fatal));
    }
}
