//! Maple E2E — runs the agent-driven end-to-end suite against the Maple app.
//!
//! Exits 0 when every test passed or was skipped, 1 otherwise.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use maple_agentic_testing::process::ProcessAgentRunner;
use maple_agentic_testing::reporter::{render_text, write_summary};
use maple_agentic_testing::scenario::{default_scenarios, find_scenario, Scenario, TaskComposer};
use maple_agentic_testing::{AgentRunner, AgentTestCase, RetryPolicy, SuiteOrchestrator, TestCase};
use maple_e2e_core::config::E2eConfig;
use maple_e2e_core::secrets::{EnvSecretProvider, SecretProvider};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "maple-e2e")]
#[command(about = "Agent-driven end-to-end tests for the Maple web app")]
#[command(version)]
struct Cli {
    /// Base URL of the app under test (overrides config)
    #[arg(long)]
    app_url: Option<String>,

    /// Run the browser without a window (overrides config)
    #[arg(long, default_value_t = false, conflicts_with = "headed")]
    headless: bool,

    /// Show the browser window (overrides config)
    #[arg(long, default_value_t = false)]
    headed: bool,

    /// External agent command, split on whitespace, e.g. "python3 agent_bridge.py".
    /// Arguments containing spaces need MAPLE_E2E__AGENT__COMMAND instead.
    #[arg(long)]
    agent_command: Option<String>,

    /// Directory for per-test logs (overrides config)
    #[arg(long)]
    logs_dir: Option<PathBuf>,

    /// Summary file path (overrides config)
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Attempts per test before it counts as failed (overrides config)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the suite, or only the named tests
    Run {
        /// Test name to run; repeatable
        #[arg(long = "only")]
        only: Vec<String>,
    },

    /// List the built-in tests
    List,

    /// Print the task a test would send to the agent
    Compose {
        /// Test name
        name: String,
    },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "maple_e2e=info,maple_agentic_testing=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<E2eConfig> {
    let mut config = E2eConfig::load().context("invalid MAPLE_E2E configuration")?;
    apply_overrides(cli, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(cli: &Cli, config: &mut E2eConfig) {
    if let Some(url) = &cli.app_url {
        config.app_url = url.clone();
    }
    if cli.headless {
        config.headless = true;
    }
    if cli.headed {
        config.headless = false;
    }
    if let Some(command) = &cli.agent_command {
        config.agent.command = command.split_whitespace().map(String::from).collect();
    }
    if let Some(dir) = &cli.logs_dir {
        config.logs_dir = dir.clone();
    }
    if let Some(path) = &cli.summary {
        config.summary_path = path.clone();
    }
    if let Some(attempts) = cli.max_attempts {
        config.retry.max_attempts = attempts;
    }
}

fn select_scenarios(only: &[String]) -> anyhow::Result<Vec<Scenario>> {
    if only.is_empty() {
        return Ok(default_scenarios());
    }
    only.iter()
        .map(|name| find_scenario(name).with_context(|| format!("unknown test: {name}")))
        .collect()
}

async fn run_suite(config: &E2eConfig, only: &[String]) -> anyhow::Result<i32> {
    let secrets: Arc<dyn SecretProvider> = Arc::new(EnvSecretProvider);
    config.require_api_key(secrets.as_ref())?;
    if config.agent.command.is_empty() {
        bail!("no agent command configured; set MAPLE_E2E__AGENT__COMMAND or --agent-command");
    }

    let scenarios = select_scenarios(only)?;
    let runner: Arc<dyn AgentRunner> = Arc::new(ProcessAgentRunner::new(
        config.agent.command.clone(),
        config.headless,
    ));
    let composer = TaskComposer::new(config.app_url.clone());

    let tests: Vec<Box<dyn TestCase>> = scenarios
        .into_iter()
        .map(|scenario| {
            Box::new(
                AgentTestCase::new(scenario, runner.clone(), secrets.clone())
                    .with_composer(composer.clone())
                    .with_logs_dir(config.logs_dir.clone())
                    .with_default_max_steps(config.agent.default_max_steps),
            ) as Box<dyn TestCase>
        })
        .collect();

    info!(
        app_url = %config.app_url,
        headless = config.headless,
        tests = tests.len(),
        "Configuration loaded"
    );

    let orchestrator = SuiteOrchestrator::new(RetryPolicy {
        max_attempts: config.retry.max_attempts,
        delay: config.retry.delay(),
    });
    let report = orchestrator.run(&tests).await;

    println!("{}", render_text("Maple E2E Results", &report));
    if let Err(e) = write_summary(&config.summary_path, &report.summary).await {
        error!(path = %config.summary_path.display(), error = %e, "Failed to write summary");
    }

    Ok(report.exit_code())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(&cli)?;

    match &cli.command {
        Commands::List => {
            for scenario in default_scenarios() {
                let gate = if scenario.requires_login { "login" } else { "-" };
                println!("{:<34} {:<6} {}", scenario.name, gate, scenario.title);
            }
        }
        Commands::Compose { name } => {
            let scenario = find_scenario(name).with_context(|| format!("unknown test: {name}"))?;
            let composer = TaskComposer::new(config.app_url.clone());
            println!("{}", scenario.task(&composer));
        }
        Commands::Run { only } => {
            let code = run_suite(&config, only).await?;
            std::process::exit(code);
        }
    }

    Ok(())
}
