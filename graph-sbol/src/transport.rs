use crate::config::ClientConfig;
use crate::error::{QueryError, QueryResult};
use convenient_bindings::{BindingRow, SparqlResults};
use reqwest::{Client, StatusCode};
use std::fmt;
use tracing::{debug, info};

/// Media type requested for query results.
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

#[derive(Clone)]
struct Session {
    user: String,
    token: String,
}

/// HTTP transport to a SPARQL endpoint with optional per-user scoping.
///
/// While logged in, every query is scoped to the user's private graph and
/// carries the session token. Failures are reported once; this layer never
/// retries.
#[derive(Clone)]
pub struct SparqlTransport {
    client: Client,
    config: ClientConfig,
    session: Option<Session>,
}

impl fmt::Debug for SparqlTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparqlTransport")
            .field("endpoint", &self.config.endpoint)
            .field("user", &self.user())
            .field("has_token", &self.session.is_some())
            .finish()
    }
}

impl SparqlTransport {
    /// Creates an anonymous transport.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Config` for an invalid configuration or when the
    /// HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> QueryResult<Self> {
        let config = config.validated()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QueryError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            session: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Logs in and keeps the returned session token.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Auth` if the server cannot be reached, rejects the
    /// credentials or returns an empty token.
    pub async fn login(&mut self, user: &str, password: &str) -> QueryResult<()> {
        let url = self.config.url(&self.config.login_path);
        info!("Logging in to {} as {}", self.config.endpoint, user);
        let resp = self
            .client
            .post(&url)
            .header("Accept", "text/plain")
            .form(&[("email", user), ("password", password)])
            .send()
            .await
            .map_err(|e| QueryError::Auth(format!("login request failed: {e}")))?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(QueryError::Auth(format!("status {status}: {}", body.trim())));
        }
        let token = body.trim();
        if token.is_empty() {
            return Err(QueryError::Auth("server returned an empty token".to_string()));
        }

        self.session = Some(Session {
            user: user.to_string(),
            token: token.to_string(),
        });
        info!("Logged in as {}", user);
        Ok(())
    }

    /// Drops the session; later queries run anonymously.
    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            info!("Logged out {}", session.user);
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    /// The logged-in user, if any.
    pub fn user(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user.as_str())
    }

    /// Private graph of the logged-in user.
    pub fn graph_uri(&self) -> Option<String> {
        self.user().map(|user| self.config.graph_uri(user))
    }

    /// Query text as it is sent: scoped with `FROM <graph>` when logged in.
    ///
    /// The clause is placed directly before the first `WHERE`; text without
    /// `WHERE` is sent unchanged.
    pub fn scope(&self, text: &str) -> String {
        match (self.graph_uri(), text.find("WHERE")) {
            (Some(graph), Some(at)) => {
                format!("{}FROM <{graph}> {}", &text[..at], &text[at..])
            }
            _ => text.to_string(),
        }
    }

    /// Executes query text and returns the solution rows.
    ///
    /// # Errors
    ///
    /// - `QueryError::MalformedQuery` for HTTP 400
    /// - `QueryError::EndpointUnreachable` for connection failures, timeouts
    ///   and 502/503/504
    /// - `QueryError::EndpointInternalError` for 500 and other 5xx
    /// - `QueryError::Unrecognized` for any other status or an undecodable body
    pub async fn execute(&self, text: &str) -> QueryResult<Vec<BindingRow>> {
        let query = self.scope(text);
        debug!("{}", query);

        let url = self.config.url(&self.config.sparql_path);
        let mut req = self
            .client
            .get(&url)
            .header("Accept", SPARQL_RESULTS_JSON)
            .query(&[("query", query.as_str())]);
        if let Some(session) = &self.session {
            req = req.header(self.config.auth_header.as_str(), session.token.as_str());
        }

        let resp = req.send().await.map_err(Self::map_network_error)?;
        let status = resp.status();
        let body = resp.text().await.map_err(Self::map_network_error)?;
        if !status.is_success() {
            return Err(Self::map_status(status, body));
        }

        body.parse::<SparqlResults>()
            .and_then(SparqlResults::into_rows)
            .map_err(|e| QueryError::Unrecognized(format!("undecodable results: {e}")))
    }

    fn map_status(status: StatusCode, body: String) -> QueryError {
        let detail = if body.trim().is_empty() {
            format!("status {status}")
        } else {
            format!("status {status}: {}", body.trim())
        };
        match status {
            StatusCode::BAD_REQUEST => QueryError::MalformedQuery(detail),
            StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => QueryError::EndpointUnreachable(detail),
            s if s.is_server_error() => QueryError::EndpointInternalError(detail),
            _ => QueryError::Unrecognized(detail),
        }
    }

    fn map_network_error(e: reqwest::Error) -> QueryError {
        if e.is_timeout() {
            QueryError::EndpointUnreachable(format!("request timed out: {e}"))
        } else if e.is_connect() {
            QueryError::EndpointUnreachable(format!("connection failed: {e}"))
        } else {
            QueryError::Unrecognized(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> SparqlTransport {
        SparqlTransport::new(ClientConfig::new("https://hub.example.org")).unwrap()
    }

    fn logged_in(mut transport: SparqlTransport) -> SparqlTransport {
        transport.session = Some(Session {
            user: "alice".to_string(),
            token: "secret-token".to_string(),
        });
        transport
    }

    #[test]
    fn test_anonymous_text_is_unchanged() {
        let text = "SELECT ?s WHERE { ?s ?p ?o }";
        assert_eq!(transport().scope(text), text);
    }

    #[test]
    fn test_scope_inserts_from_before_where() {
        let transport = logged_in(transport());
        assert_eq!(
            transport.scope("SELECT ?s WHERE { ?s ?p ?o }"),
            "SELECT ?s FROM <https://hub.example.org/user/alice> WHERE { ?s ?p ?o }"
        );
        assert_eq!(transport.scope("ASK { ?s ?p ?o }"), "ASK { ?s ?p ?o }");
    }

    #[test]
    fn test_scope_only_first_where() {
        let transport = logged_in(transport());
        let scoped = transport.scope("SELECT ?s WHERE { { SELECT ?s WHERE { ?s ?p ?o } } }");
        assert_eq!(scoped.matches("FROM <").count(), 1);
        assert!(scoped.starts_with("SELECT ?s FROM <"));
    }

    #[test]
    fn test_logout() {
        let mut transport = logged_in(transport());
        assert_eq!(transport.user(), Some("alice"));
        transport.logout();
        assert!(!transport.is_authenticated());
        assert_eq!(transport.graph_uri(), None);
    }

    #[test]
    fn test_debug_hides_token() {
        let debug = format!("{:?}", logged_in(transport()));
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("has_token: true"));
    }

    #[test]
    fn test_status_mapping() {
        let map = |code: u16| {
            SparqlTransport::map_status(StatusCode::from_u16(code).unwrap(), String::new())
        };
        assert!(matches!(map(400), QueryError::MalformedQuery(_)));
        assert!(matches!(map(502), QueryError::EndpointUnreachable(_)));
        assert!(matches!(map(503), QueryError::EndpointUnreachable(_)));
        assert!(matches!(map(504), QueryError::EndpointUnreachable(_)));
        assert!(matches!(map(500), QueryError::EndpointInternalError(_)));
        assert!(matches!(map(507), QueryError::EndpointInternalError(_)));
        assert!(matches!(map(401), QueryError::Unrecognized(_)));
        assert!(matches!(map(403), QueryError::Unrecognized(_)));
        assert!(matches!(map(404), QueryError::Unrecognized(_)));
    }
}
