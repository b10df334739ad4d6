use crate::error::{QueryError, QueryResult};
use crate::transport::SparqlTransport;
use convenient_bindings::{BindingRow, Shaped, ShapingSpec, shape};
use convenient_cache::{QueryCache, cache_key};
use convenient_sparql::{
    CompileError, CompiledQuery, DesignQuery, EntityFilter, Membership, PathCardinality,
    Projection,
};
use tracing::debug;

/// Compiles design queries, runs them through the (optionally cached)
/// transport and shapes the rows.
#[derive(Debug)]
pub struct SbolQuery {
    transport: SparqlTransport,
    cache: Option<QueryCache>,
}

impl SbolQuery {
    pub fn new(transport: SparqlTransport) -> Self {
        Self {
            transport,
            cache: None,
        }
    }

    /// Falls back to `cache` when the endpoint fails transiently.
    pub fn with_cache(mut self, cache: QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn transport(&self) -> &SparqlTransport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut SparqlTransport {
        &mut self.transport
    }

    pub fn cache(&self) -> Option<&QueryCache> {
        self.cache.as_ref()
    }

    /// Executes compiled text, cache-wrapped when a cache is configured.
    ///
    /// The cache key covers the SPARQL URL, the scoping graph (base and
    /// user) and the text, so endpoints and private graphs sharing one cache
    /// file never answer for each other.
    pub async fn execute(&self, text: &str) -> QueryResult<Vec<BindingRow>> {
        let Some(cache) = &self.cache else {
            return self.transport.execute(text).await;
        };
        let config = self.transport.config();
        let url = config.url(&config.sparql_path);
        let graph = self.transport.graph_uri().unwrap_or_default();
        let key = cache_key(&[&url, &graph, &text]);
        cache.call(&key, || self.transport.execute(text)).await
    }

    /// Compiles `query` and returns the raw rows.
    ///
    /// # Errors
    ///
    /// `QueryError::Compile` when compilation fails or yields the empty
    /// unsupported-depth query; otherwise the transport's errors.
    pub async fn run_raw(&self, query: &DesignQuery) -> QueryResult<Vec<BindingRow>> {
        let compiled = compile(query)?;
        self.execute(&compiled.text).await
    }

    /// Compiles `query`, executes it and shapes the rows with `shaping`.
    pub async fn run(&self, query: &DesignQuery, shaping: &ShapingSpec) -> QueryResult<Shaped> {
        let rows = self.run_raw(query).await?;
        debug!("shaping {} rows", rows.len());
        Ok(shape(&rows, shaping))
    }

    /// Designs directly in any of `collections`, as a list.
    pub async fn collection_members(&self, collections: &[&str]) -> QueryResult<Shaped> {
        let query = DesignQuery::new(EntityFilter::new())
            .with_membership(Membership::of(collections.iter().copied()));
        self.run(&query, &ShapingSpec::keys(["design"]).sort_by("design"))
            .await
    }

    /// Designs with any of `roles` in `collections` (any collection if empty).
    pub async fn designs_by_role(
        &self,
        roles: &[&str],
        collections: &[&str],
    ) -> QueryResult<Shaped> {
        let filter = roles
            .iter()
            .fold(EntityFilter::new(), |filter, role| filter.with_role(*role));
        let query = DesignQuery::new(filter)
            .with_membership(Membership::of(collections.iter().copied()));
        self.run(&query, &ShapingSpec::keys(["design"])).await
    }

    /// Map of design to name for the designs in `collections`.
    pub async fn design_names(&self, collections: &[&str]) -> QueryResult<Shaped> {
        let query = DesignQuery::new(EntityFilter::new())
            .with_membership(Membership::of(collections.iter().copied()))
            .with_projection(Projection::Name);
        self.run(&query, &ShapingSpec::keys(["name"]).by_entity("design"))
            .await
    }

    /// Designs in `collections` built from at least one of `parts`.
    ///
    /// Searches one sub-collection level deep.
    pub async fn sub_parts(&self, parts: &[&str], collections: &[&str]) -> QueryResult<Shaped> {
        let sub = parts
            .iter()
            .fold(EntityFilter::new(), |filter, part| filter.with_definition(*part));
        let query = DesignQuery::new(EntityFilter::new().with_sub(sub))
            .with_membership(Membership::of(collections.iter().copied()))
            .with_depth(2);
        self.run(&query, &ShapingSpec::keys(["design"])).await
    }

    /// Designs built in `experiments` recorded in `collections`.
    pub async fn experiment_designs(
        &self,
        experiments: &[&str],
        collections: &[&str],
    ) -> QueryResult<Shaped> {
        let membership = Membership::of(collections.iter().copied()).through_experiments(
            experiments.iter().copied(),
            PathCardinality::OneOrMore,
        );
        let query = DesignQuery::new(EntityFilter::new()).with_membership(membership);
        self.run(&query, &ShapingSpec::keys(["design"])).await
    }

    /// Every collection mapped to its member designs.
    pub async fn collections(&self) -> QueryResult<Shaped> {
        let query = DesignQuery::new(EntityFilter::new());
        self.run(&query, &ShapingSpec::keys(["design"]).group_by("collection"))
            .await
    }
}

/// Compiles `query`, turning the unsupported-depth sentinel into an error.
///
/// # Errors
///
/// `QueryError::Compile` for compile failures and unsupported depths.
pub fn compile(query: &DesignQuery) -> QueryResult<CompiledQuery> {
    let compiled = query.compile()?;
    if compiled.is_empty() {
        return Err(QueryError::Compile(CompileError::UnsupportedDepth(
            query.entity_depth,
        )));
    }
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[test]
    fn test_unsupported_depth_is_an_error() {
        let query = DesignQuery::new(EntityFilter::new()).with_depth(3);
        assert!(matches!(
            compile(&query),
            Err(QueryError::Compile(CompileError::UnsupportedDepth(3)))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_depth_never_reaches_endpoint() {
        let transport = SparqlTransport::new(ClientConfig::new("http://127.0.0.1:9")).unwrap();
        let client = SbolQuery::new(transport);
        let query = DesignQuery::new(EntityFilter::new()).with_depth(0);

        let result = client.run_raw(&query).await;

        assert!(matches!(result, Err(QueryError::Compile(_))));
    }
}
