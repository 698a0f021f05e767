use anyhow::{Result, anyhow};
use clap::Parser;
use colored::*;
use foreman_framework::prelude::*;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for the Foreman CLI
#[derive(Parser)]
#[command(
    name = "foreman",
    about = "Foreman - hierarchical multi-agent task orchestration"
)]
pub struct Args {
    /// Question handed to the worker hierarchy
    #[clap(short, long, default_value = "What is 17 + 25?")]
    question: String,

    /// Enable debug mode
    #[clap(short, long)]
    debug: bool,

    /// Path to the data directory (durable episodic log)
    #[clap(long, default_value = "./data")]
    data_dir: PathBuf,

    /// LLM provider to use
    #[clap(long, default_value = "gemini-2.5-pro", short_alias = 'r')]
    provider: String,

    /// Run the deterministic demo agents instead of an LLM-backed hierarchy
    #[clap(long)]
    offline: bool,

    /// Seconds before an unanswered help request is failed by the reaper
    #[clap(long, default_value_t = 120)]
    pending_ttl: i64,
}

fn adder_behavior() -> Arc<Builtin> {
    Builtin::new(|input: &Value| {
        let a = input["a"].as_f64().ok_or_else(|| anyhow!("missing 'a'"))?;
        let b = input["b"].as_f64().ok_or_else(|| anyhow!("missing 'b'"))?;
        Ok(json!({"x": a + b}))
    })
}

fn adder_identity() -> AgentIdentity {
    AgentIdentity::new(
        "adder",
        "adder-1",
        "Adds two numbers",
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "number"},
                "b": {"type": "number"}
            },
            "required": ["a", "b"]
        }),
        json!({
            "type": "object",
            "properties": {"x": {"type": "number"}},
            "required": ["x"]
        }),
    )
}

/// Deterministic demo: one builtin adder, one driver, no LLM anywhere.
async fn run_offline(environment: Arc<InProcessEnvironment>, ttl: i64) -> Result<()> {
    let store = Arc::new(InMemoryEpisodicStore::new());
    let adder = Arc::new(CodeAgent::new(
        adder_identity(),
        adder_behavior(),
        store.clone(),
        environment.clone(),
    ));
    environment.register(adder).await?;

    let driver = RootDriver::new("cli", environment.clone(), ttl);
    environment.register(driver.clone()).await?;
    let reaper = driver.spawn_reaper(Duration::from_secs(1));

    println!("{}", "Asking the adder for 10 + 30...".bright_cyan());
    let response = driver.ask("adder", json!({"a": 10, "b": 30})).await?;
    print_response(&response);

    for conversation_id in store.conversation_ids("adder-1").await {
        let events = store.conversation("adder-1", &conversation_id).await?;
        println!("\n{}", "Adder transcript:".bright_yellow());
        print!("{}", render_transcript(&events));
    }

    reaper.abort();
    environment.shutdown().await?;
    Ok(())
}

/// LLM-backed demo: a skilled worker reporting to a manager and a QA
/// manager, with a builtin adder available as a helper. The episodic log is
/// durable, so a task suspended on a help call survives a process restart.
async fn run_hierarchy(
    environment: Arc<InProcessEnvironment>,
    args: &Args,
) -> Result<()> {
    let store: Arc<dyn EpisodicStore> = Arc::new(FjallEpisodicStore::new(&args.data_dir)?);
    let templates = Arc::new(TemplateLibrary::new());
    templates
        .set_plan(
            "skilled_worker",
            "Answer the question: {{question}}. Delegate arithmetic to the adder; \
             ask your QA manager to review before finalizing.",
        )
        .await;
    templates
        .set_instructions("skilled_worker", "Question: {{question}}")
        .await;

    let thinker: Arc<dyn Thinker> = Arc::new(GenaiThinker::new(&args.provider));
    let services = AgentServices {
        store: store.clone(),
        templates: templates.clone(),
        thinker,
        environment: environment.clone(),
    };

    let adder = Arc::new(CodeAgent::new(
        adder_identity(),
        adder_behavior(),
        store.clone(),
        environment.clone(),
    ));
    environment.register(adder).await?;

    let manager = WorkerBuilder::manager(
        AgentIdentity::permissive("manager", "mgr-1", "Coordinates workers and answers escalations"),
        vec![HelperDescriptor::new("skilled_worker", "Delegate a task to a worker")],
        None,
        services.clone(),
        AgentTuning::default(),
    );
    environment.register(manager).await?;

    let qa = WorkerBuilder::qa_manager(
        AgentIdentity::permissive("qa_manager", "qa-1", "Reviews candidate answers"),
        vec![],
        "manager",
        services.clone(),
        AgentTuning::default(),
    );
    environment.register(qa).await?;

    let worker = WorkerBuilder::skilled_worker(
        AgentIdentity::permissive("skilled_worker", "worker-1", "Answers questions"),
        vec![HelperDescriptor::new("adder", "Adds two numbers: {a, b} -> {x}")],
        "manager",
        "qa_manager",
        services,
        AgentTuning::default(),
    );
    environment.register(worker).await?;

    let driver = RootDriver::new("cli", environment.clone(), args.pending_ttl);
    environment.register(driver.clone()).await?;
    let reaper = driver.spawn_reaper(Duration::from_secs(5));

    println!(
        "{} {}",
        "Dispatching to the worker hierarchy:".bright_cyan(),
        args.question.bright_green()
    );
    let response = driver
        .ask("skilled_worker", json!({"question": args.question}))
        .await?;
    print_response(&response);

    reaper.abort();
    environment.shutdown().await?;
    Ok(())
}

fn print_response(response: &HelpResponse) {
    let status = match response.status {
        HelpStatus::Success => "success".bright_green(),
        HelpStatus::Failure => "failure".bright_red(),
    };
    println!(
        "\n{} {} ({} / {})",
        "Answer:".bright_yellow(),
        serde_json::to_string_pretty(&response.response).unwrap_or_default(),
        status,
        response.helper_title
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let directory = Arc::new(AgentDirectory::new());
    let environment = InProcessEnvironment::new(directory.clone());

    if args.offline {
        run_offline(environment, args.pending_ttl).await?;
    } else {
        run_hierarchy(environment, &args).await?;
    }

    info!(
        "Registered titles at shutdown: {:?}",
        directory.titles().await
    );
    Ok(())
}
