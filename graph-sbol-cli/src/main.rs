use clap::{crate_version, Args, Parser, Subcommand};
use graph_sbol::{
    ClientConfig, DesignQuery, EntityFilter, Membership, PathCardinality, Projection, QueryCache,
    SbolQuery, ShapingSpec, SparqlTransport,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, span, Level};
use tracing_subscriber::FmtSubscriber;

const APP_NAME: &str = "graph-sbol";

/// Options for the application.
#[derive(Parser)]
#[clap(version = crate_version!(), author = "Ralf Anton Beier")]
struct Opts {
    /// The SynBioHub endpoint.
    #[clap(
        short,
        long,
        default_value = "https://hub.sd2e.org",
        env = "SBH_ENDPOINT"
    )]
    endpoint: String,

    /// The user to log in as. Queries run anonymously if not set.
    #[clap(short, long, env = "SBH_USER")]
    user: Option<String>,

    /// The password for the user.
    #[clap(short, long, env = "SBH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Base used in the user's graph URI instead of the endpoint.
    #[clap(long, env = "SBH_SPOOFED_BASE")]
    spoofed_base: Option<String>,

    /// The cache file. Defaults to the per-user cache directory.
    #[clap(long, env = "SBH_CACHE")]
    cache: Option<PathBuf>,

    /// Request timeout in seconds.
    #[clap(long, default_value_t = 30, env = "SBH_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Log level (DEBUG, INFO, WARN, ERROR).
    #[clap(long, default_value = "warn", env = "SBH_LOG_LEVEL")]
    log_level: String,

    /// Print debug information
    #[clap(short)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the compiled SPARQL query.
    Compile(Filters),
    /// Run a query and print the shaped result as JSON.
    Query {
        #[clap(flatten)]
        filters: Filters,
        #[clap(flatten)]
        shaping: Shaping,
        /// Bypass the fallback cache.
        #[clap(long)]
        no_cache: bool,
    },
    /// Maintain the fallback cache.
    Cache {
        #[clap(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete the cache file.
    Clear,
    /// Print the cache location and entry count.
    Stats,
}

#[derive(Args)]
struct Filters {
    /// Entity type IRI (repeatable).
    #[clap(long = "type")]
    types: Vec<String>,
    /// Require all types instead of any.
    #[clap(long)]
    all_types: bool,
    /// Entity role IRI (repeatable).
    #[clap(long = "role")]
    roles: Vec<String>,
    /// rdf:type of the entity, e.g. sbol:ComponentDefinition.
    #[clap(long)]
    rdf_type: Option<String>,
    /// Definition IRI of a required sub-part (repeatable).
    #[clap(long = "sub-definition")]
    sub_definitions: Vec<String>,
    /// Extra constraint as predicate=value (repeatable).
    #[clap(long = "property", value_parser = parse_property)]
    properties: Vec<(String, String)>,
    /// Collection IRI (repeatable).
    #[clap(short, long = "collection")]
    collections: Vec<String>,
    /// Allowed entity IRI (repeatable).
    #[clap(long = "member")]
    members: Vec<String>,
    /// Experiment IRI; switches to experiment provenance (repeatable).
    #[clap(long = "experiment")]
    experiments: Vec<String>,
    /// Derived-from path length: *, + or a number.
    #[clap(long)]
    cardinality: Option<PathCardinality>,
    /// Experiment provenance without restricting the experiment.
    #[clap(long)]
    any_experiment: bool,
    /// Auxiliary projection: name, description, sequence, feature (repeatable).
    #[clap(long = "project")]
    projections: Vec<Projection>,
    /// 1 for direct membership, 2 to include sub-collections.
    #[clap(long, default_value_t = 1)]
    depth: u8,
}

#[derive(Args)]
struct Shaping {
    /// Variable to extract (repeatable). Defaults to the projected variables.
    #[clap(short, long = "key")]
    keys: Vec<String>,
    /// Group by this variable.
    #[clap(long)]
    group: Option<String>,
    /// Key results by this entity variable.
    #[clap(long)]
    entity: Option<String>,
    /// Sort lists by this field.
    #[clap(long)]
    sort: Option<String>,
    /// Per-entity sub-grouping variable.
    #[clap(long)]
    sub_group: Option<String>,
    /// Variable extracted into the sub-grouping (repeatable).
    #[clap(long = "sub-key")]
    sub_keys: Vec<String>,
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(p, v)| (p.trim().to_string(), v.trim().to_string()))
        .filter(|(p, _)| !p.is_empty())
        .ok_or_else(|| format!("expected predicate=value, got `{s}`"))
}

/// Gets the log level enum variant from a level string.
///
/// # Arguments
///
/// * `level` - The log level string, e.g. "DEBUG", "INFO".
///
/// # Returns
///
/// Returns the corresponding `Level` enum variant for the level string.
pub fn get_log_level(level: &str) -> Level {
    match level.to_uppercase().as_ref() {
        "DEBUG" => Level::DEBUG,
        "INFO" => Level::INFO,
        "WARN" => Level::WARN,
        "ERROR" => Level::ERROR,
        "FATAL" => Level::ERROR,
        _ => Level::INFO,
    }
}

impl Filters {
    fn design_query(&self) -> DesignQuery {
        let mut filter = EntityFilter::new();
        for t in &self.types {
            filter = filter.with_type(t);
        }
        if self.all_types {
            filter = filter.all_types();
        }
        for role in &self.roles {
            filter = filter.with_role(role);
        }
        if let Some(rdf_type) = &self.rdf_type {
            filter = filter.with_rdf_type(rdf_type);
        }
        if !self.sub_definitions.is_empty() {
            let sub = self
                .sub_definitions
                .iter()
                .fold(EntityFilter::new(), |sub, d| sub.with_definition(d));
            filter = filter.with_sub(sub);
        }
        for (predicate, value) in &self.properties {
            filter = filter.with_property(predicate, value);
        }

        let mut membership = Membership::of(&self.collections).with_members(&self.members);
        if self.any_experiment || !self.experiments.is_empty() {
            membership = membership
                .through_experiments(&self.experiments, self.cardinality.unwrap_or_default());
        }

        self.projections.iter().fold(
            DesignQuery::new(filter)
                .with_membership(membership)
                .with_depth(self.depth),
            |query, projection| query.with_projection(*projection),
        )
    }
}

impl Shaping {
    fn spec(&self, variables: &[String]) -> ShapingSpec {
        let keys = if self.keys.is_empty() {
            variables.to_vec()
        } else {
            self.keys.clone()
        };
        let mut spec = ShapingSpec::keys(keys);
        if let Some(group) = &self.group {
            spec = spec.group_by(group);
        }
        if let Some(entity) = &self.entity {
            spec = spec.by_entity(entity);
        }
        if let Some(sort) = &self.sort {
            spec = spec.sort_by(sort);
        }
        if let Some(sub_group) = &self.sub_group {
            spec = spec.sub_group(sub_group, self.sub_keys.clone());
        }
        spec
    }
}

fn open_cache(opts: &Opts) -> Result<QueryCache, Box<dyn Error>> {
    Ok(match &opts.cache {
        Some(path) => QueryCache::open(path),
        None => QueryCache::open_default(APP_NAME)?,
    })
}

#[tracing::instrument(skip_all)]
async fn run_query(
    opts: &Opts,
    filters: &Filters,
    shaping: &Shaping,
    no_cache: bool,
) -> Result<(), Box<dyn Error>> {
    let query = filters.design_query();
    let compiled = graph_sbol::compile(&query)?;

    let mut config = ClientConfig::new(&opts.endpoint)
        .with_timeout(Duration::from_secs(opts.timeout_secs));
    if let Some(base) = &opts.spoofed_base {
        config = config.with_spoofed_base(base);
    }
    let mut transport = SparqlTransport::new(config)?;
    if let Some(user) = &opts.user {
        let password = opts.password.as_deref().unwrap_or_default();
        transport.login(user, password).await?;
    }

    let mut client = SbolQuery::new(transport);
    if !no_cache {
        client = client.with_cache(open_cache(opts)?);
    }

    let shaped = client
        .run(&query, &shaping.spec(&compiled.variables))
        .await?;
    println!("{}", serde_json::to_string_pretty(&shaped)?);
    Ok(())
}

fn run_cache(opts: &Opts, action: &CacheAction) -> Result<(), Box<dyn Error>> {
    let span = span!(Level::INFO, "run_cache");
    let _enter = span.enter();
    let cache = open_cache(opts)?;
    match action {
        CacheAction::Clear => {
            cache.clear()?;
            info!("Cleared {}", cache.path().display());
        }
        CacheAction::Stats => {
            println!("path: {}", cache.path().display());
            println!("entries: {}", cache.len()?);
        }
    }
    Ok(())
}

async fn run(opts: &Opts) -> Result<(), Box<dyn Error>> {
    match &opts.command {
        Command::Compile(filters) => {
            let compiled = graph_sbol::compile(&filters.design_query())?;
            print!("{}", compiled);
            Ok(())
        }
        Command::Query {
            filters,
            shaping,
            no_cache,
        } => run_query(opts, filters, shaping, *no_cache).await,
        Command::Cache { action } => run_cache(opts, action),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Get the command line arguments
    let opts: Opts = Opts::parse();

    let log_level = if opts.debug {
        "debug"
    } else {
        opts.log_level.as_str()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(get_log_level(log_level))
        .with_writer(std::io::stderr)
        .with_file(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    match run(&opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
