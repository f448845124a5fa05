use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use shardrouter::{
    CollectionRecord, InMemoryCatalog, PolicyKind, ROUTER_NAME, RouterConfig, RouterOptions,
    RouterRegistry, RoutingRequest, ShardRecord, StaticTopology,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shardrouter")]
#[command(about = "Route a collection's files over a set of nodes")]
pub struct Cli {
    /// JSON file with `collections` and `files` arrays
    pub fixture: PathBuf,

    /// Collection to route
    pub collection: String,

    /// Readable nodes, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub nodes: Vec<String>,

    /// Partition tags, comma separated
    #[arg(long, value_delimiter = ',')]
    pub tags: Vec<String>,

    /// Router configuration as JSON
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overrides the policy from `--config`
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Number of routing passes against the same tracker
    #[arg(long, default_value_t = 1)]
    pub passes: usize,

    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    RoundRobin,
    HashRing,
}

impl From<PolicyArg> for PolicyKind {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::RoundRobin => PolicyKind::RoundRobin,
            PolicyArg::HashRing => PolicyKind::HashRing {
                replicas: shardrouter::distributor::DEFAULT_RING_REPLICAS,
            },
        }
    }
}

#[derive(Deserialize)]
struct Fixture {
    #[serde(default)]
    collections: Vec<CollectionRecord>,
    #[serde(default)]
    files: Vec<ShardRecord>,
}

pub fn init_tracing(verbose: bool) {
    let fallback = if verbose { "shardrouter=debug" } else { "shardrouter=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

pub async fn run(cli: Cli) -> Result<()> {
    let fixture = load_fixture(&cli.fixture)?;
    let catalog = InMemoryCatalog::from_records(fixture.collections, fixture.files)
        .map_err(|e| anyhow!("Invalid fixture '{}': {}", cli.fixture.display(), e))?;

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::new(),
    };
    if let Some(policy) = cli.policy {
        config = config.policy(policy.into());
    }

    let topology = Arc::new(StaticTopology::new(cli.nodes));
    let registry = RouterRegistry::with_default_routers("shardrouter");
    let router = registry.create(
        ROUTER_NAME,
        RouterOptions::new()
            .writable_topo(topology.clone())
            .readonly_topo(topology)
            .catalog(Arc::new(catalog))
            .config(config),
    )?;

    let mut request = RoutingRequest::new(cli.collection);
    if !cli.tags.is_empty() {
        request = request.partition_tags(cli.tags);
    }

    for pass in 1..=cli.passes.max(1) {
        let result = router.routing(request.clone()).await?;
        let output = serde_json::json!({ "pass": pass, "routes": result });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    Ok(())
}

fn load_fixture(path: &Path) -> Result<Fixture> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture '{}'", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse fixture '{}'", path.display()))
}

fn load_config(path: &Path) -> Result<RouterConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config '{}'", path.display()))?;
    Ok(RouterConfig::from_json(&raw)?)
}
