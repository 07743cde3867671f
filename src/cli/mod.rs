use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use tokio::io::AsyncReadExt;
use tracing::{error, info};

use crate::{
    config::WorkerConfig,
    core::backend::LlmHandle,
    nlu::{LlmNluService, NluContext, NluService},
    orchestration::{ItineraryPlanner, OrchestrationEngine},
    planning::TravelRequest,
    services::OpenAIClient,
    worker::{Consumer, HealthMonitor, StdioBroker},
};

fn command() -> Command {
    Command::new("itinerary-swarm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Plans day-by-day travel itineraries with a coordinator and four specialist agents")
        .subcommand_required(true)
        .arg(
            Arg::new("api-key")
                .short('k')
                .long("api-key")
                .value_name("KEY")
                .global(true)
                .help("Model API key (or set OPENAI_API_KEY)"),
        )
        .arg(
            Arg::new("base-url")
                .short('u')
                .long("base-url")
                .value_name("URL")
                .global(true)
                .help("OpenAI-compatible base URL (or set OPENAI_BASE_URL / OPENROUTER_BASE_URL)"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("MODEL")
                .global(true)
                .help("Model used by every agent (or set MODEL)"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .global(true)
                .value_parser(clap::value_parser!(u64))
                .help("Per-request model timeout in seconds"),
        )
        .arg(
            Arg::new("max-delegations")
                .long("max-delegations")
                .value_name("COUNT")
                .global(true)
                .value_parser(clap::value_parser!(usize))
                .help("Maximum delegate_work rounds per job (or set MAX_DELEGATION_ROUNDS)"),
        )
        .subcommand(
            Command::new("worker")
                .about("Consume JSON-lines jobs from stdin and write one result line per job to stdout"),
        )
        .subcommand(
            Command::new("plan")
                .about("Plan a single request read from a JSON file, or '-' for stdin")
                .arg(Arg::new("request").required(true).index(1))
                .arg(
                    Arg::new("trace")
                        .long("trace")
                        .action(ArgAction::SetTrue)
                        .help("Print the coordinator's step trace to stderr"),
                ),
        )
        .subcommand(
            Command::new("parse")
                .about("Extract trip parameters from free text")
                .arg(Arg::new("text").required(true).index(1))
                .arg(
                    Arg::new("context")
                        .long("context")
                        .value_name("JSON")
                        .help("Slots established by earlier messages"),
                ),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<WorkerConfig> {
    let mut config = match matches.get_one::<String>("api-key") {
        Some(key) => {
            let mut config = WorkerConfig::from_lookup(|name| match name {
                "OPENAI_API_KEY" => Some(key.clone()),
                other => std::env::var(other).ok(),
            })?;
            config.api_key = key.clone();
            config
        }
        None => WorkerConfig::from_env()?,
    };

    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config.base_url = base_url.clone();
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config.planner.model = model.clone();
    }
    if let Some(seconds) = matches.get_one::<u64>("timeout") {
        config.planner.request_timeout = Duration::from_secs(*seconds);
    }
    if let Some(max) = matches.get_one::<usize>("max-delegations") {
        if *max == 0 {
            bail!("--max-delegations must be at least 1");
        }
        config.planner.max_delegations = *max;
    }
    Ok(config)
}

async fn read_request(source: &str) -> anyhow::Result<Vec<u8>> {
    if source == "-" {
        let mut body = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut body)
            .await
            .context("failed to read request from stdin")?;
        return Ok(body);
    }
    tokio::fs::read(Path::new(source))
        .await
        .with_context(|| format!("failed to read request file '{}'", source))
}

async fn run_worker(config: WorkerConfig) -> anyhow::Result<()> {
    let health = HealthMonitor::new();
    let engine = OrchestrationEngine::from_config(&config);
    health.set_engine_initialized(true);

    info!(
        target: "itinerary::worker",
        model = %config.planner.model,
        request_queue = %config.request_queue,
        results_queue = %config.results_queue,
        max_delegations = config.planner.max_delegations,
        "worker starting"
    );

    let consumer = Consumer::new(
        Arc::new(StdioBroker::stdio()),
        Arc::new(engine),
        health,
        &config,
    );
    consumer.run().await?;
    info!(target: "itinerary::worker", health = ?consumer.health().report(), "input closed");
    Ok(())
}

async fn run_plan(config: WorkerConfig, source: &str, trace: bool) -> anyhow::Result<()> {
    let body = read_request(source).await?;
    let request = TravelRequest::from_json_slice(&body)?;
    let engine = OrchestrationEngine::from_config(&config);

    match engine.plan(&request).await {
        Ok(outcome) => {
            if trace {
                eprintln!("{}", outcome.trace.replay());
            }
            println!("{}", serde_json::to_string_pretty(&outcome.itinerary)?);
            Ok(())
        }
        Err(err) => {
            error!(target: "itinerary::worker", code = err.error_code(), error = %err, "planning failed");
            println!("{}", serde_json::to_string_pretty(&err.to_job_result())?);
            Err(err.into())
        }
    }
}

async fn run_parse(config: WorkerConfig, text: &str, context: Option<&String>) -> anyhow::Result<()> {
    let context: Option<NluContext> = context
        .map(|raw| serde_json::from_str(raw))
        .transpose()
        .context("--context must be a JSON object of known slots")?;

    let llm: LlmHandle =
        Arc::new(OpenAIClient::new(config.api_key.clone()).with_base_url(config.base_url.clone()));
    let service = LlmNluService::new(llm)
        .with_model(config.planner.model.clone())
        .with_timeout(config.planner.request_timeout);

    let result = service.parse(text, context.as_ref()).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// CLI entry point for the itinerary-swarm binary
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // stdout carries results in worker mode
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let matches = command().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("worker", _)) => run_worker(config).await,
        Some(("plan", sub)) => {
            let source = sub
                .get_one::<String>("request")
                .context("missing request path")?;
            run_plan(config, source, sub.get_flag("trace")).await
        }
        Some(("parse", sub)) => {
            let text = sub.get_one::<String>("text").context("missing text")?;
            run_parse(config, text, sub.get_one::<String>("context")).await
        }
        _ => bail!("unknown command"),
    }
}
