//! Chorus CLI entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Load configuration**: read a `.env` file if present, then build
//!    [`engine::EngineConfig`] and the provider registry from the environment.
//! 2. **Wire observability**: JSON `tracing` output on stderr plus an optional
//!    OpenTelemetry OTLP exporter (see [`telemetry`]).
//! 3. **Construct infrastructure**: vendor adapters from the `llm` catalogue
//!    and an in-memory response cache, injected into [`engine::Orchestrator`].
//! 4. **Run one command**: `query`, `providers` or `validate`, printing JSON
//!    on stdout.

mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use domain::{ProviderId, UserId};
use engine::{EngineConfig, InMemoryResponseCache, OrchestrationRequest, Orchestrator};
use serde::Serialize;
use tracing::info;

#[derive(Parser)]
#[command(name = "chorus", version, about = "Ask several LLM providers at once and get one answer")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Orchestrate one query across providers
    Query(QueryArgs),

    /// Show every configured provider and its status
    Providers,

    /// Check the API key of every ready provider
    Validate,
}

#[derive(Args)]
struct QueryArgs {
    /// User the query and its cache entries belong to
    #[arg(long, short, default_value = "local")]
    user: String,

    /// Providers to query, comma-separated (default: every ready provider)
    #[arg(long, short, value_delimiter = ',')]
    providers: Vec<String>,

    /// Per-attempt timeout in seconds
    #[arg(long, short)]
    timeout: Option<u64>,

    /// The question
    #[arg(required = true, num_args = 1..)]
    text: Vec<String>,
}

#[derive(Serialize)]
struct ProvidersReport<'a> {
    providers: &'a std::collections::BTreeMap<ProviderId, engine::ProviderInfo>,
    circuits: &'a std::collections::BTreeMap<ProviderId, engine::BreakerSnapshot>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let telemetry = telemetry::init()?;

    let outcome = run(&cli).await;

    telemetry.shutdown();
    outcome
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = EngineConfig::from_env().context("loading engine configuration")?;
    let registry = llm::build_registry_from_env();
    let orchestrator = Orchestrator::new(config, registry, Arc::new(InMemoryResponseCache::new()))
        .context("starting the orchestrator")?;

    match &cli.command {
        Command::Query(args) => query(&orchestrator, args, cli.pretty).await,
        Command::Providers => {
            let providers = orchestrator.registry().info();
            let circuits = orchestrator.breaker().snapshot();
            print_json(
                &ProvidersReport {
                    providers: &providers,
                    circuits: &circuits,
                },
                cli.pretty,
            )
        }
        Command::Validate => {
            let results = orchestrator.registry().validate_all().await;
            print_json(&results, cli.pretty)?;
            let rejected = results.values().filter(|valid| !**valid).count();
            if rejected > 0 {
                bail!("{rejected} provider key(s) failed validation");
            }
            Ok(())
        }
    }
}

async fn query(orchestrator: &Orchestrator, args: &QueryArgs, pretty: bool) -> anyhow::Result<()> {
    let user_id = UserId::new(args.user.as_str()).ok_or_else(|| anyhow!("--user must not be blank"))?;

    let mut providers: Vec<ProviderId> = args.providers.iter().filter_map(|p| ProviderId::new(p.as_str())).collect();
    if providers.is_empty() {
        providers = orchestrator.registry().available_ids();
    }
    if providers.is_empty() {
        bail!("no provider is ready; set at least one of GROQ_API_KEY, MISTRAL_API_KEY, CEREBRAS_API_KEY");
    }

    let mut request = OrchestrationRequest::new(user_id, args.text.join(" "), providers);
    if let Some(secs) = args.timeout {
        request = request.with_timeout(Duration::from_secs(secs));
    }

    let result = orchestrator.orchestrate(request).await?;
    info!(request_id = %result.request_id, succeeded = result.metadata.succeeded, "Query answered");
    print_json(&result, pretty)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}
