use crate::error::{QueryError, QueryResult};
use std::time::Duration;

/// Connection settings for a SynBioHub-style endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server root, e.g. `https://hub.sd2e.org`
    pub endpoint: String,
    /// Base used in graph URIs instead of `endpoint`
    pub spoofed_base: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Login path below `endpoint`
    pub login_path: String,
    /// SPARQL path below `endpoint`
    pub sparql_path: String,
    /// Header carrying the session token
    pub auth_header: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://hub.sd2e.org".to_string(),
            spoofed_base: None,
            timeout: Duration::from_secs(30),
            login_path: "/login".to_string(),
            sparql_path: "/sparql".to_string(),
            auth_header: "X-authorization".to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults pointed at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_spoofed_base(mut self, base: impl Into<String>) -> Self {
        self.spoofed_base = Some(base.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn with_sparql_path(mut self, path: impl Into<String>) -> Self {
        self.sparql_path = path.into();
        self
    }

    pub fn with_auth_header(mut self, header: impl Into<String>) -> Self {
        self.auth_header = header.into();
        self
    }

    /// Checks the endpoint and strips trailing slashes.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Config` for a non-HTTP endpoint or a zero timeout.
    pub fn validated(mut self) -> QueryResult<Self> {
        self.endpoint = self.endpoint.trim_end_matches('/').to_string();
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(QueryError::Config(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }
        if self.timeout.is_zero() {
            return Err(QueryError::Config("timeout must be positive".to_string()));
        }
        self.spoofed_base = self
            .spoofed_base
            .map(|b| b.trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty());
        Ok(self)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// Named graph holding `user`'s private data.
    pub fn graph_uri(&self, user: &str) -> String {
        let base = self.spoofed_base.as_deref().unwrap_or(&self.endpoint);
        format!("{base}/user/{user}")
    }
}
