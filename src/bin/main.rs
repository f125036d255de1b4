use clap::{Parser, ValueEnum};
use eoka_pilot::{Agent, Config, EokaDriver, OpenAiChat, Params, PlanningMode, RunOutcome};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "eoka-pilot")]
#[command(about = "LLM-driven browser agent")]
#[command(version)]
struct Cli {
    /// Config file to run
    #[arg(required_unless_present = "task")]
    config: Option<PathBuf>,

    /// Task to run (overrides the config's task, or runs ad hoc with defaults)
    #[arg(short, long)]
    task: Option<String>,

    /// Planning mode (overrides config)
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate config without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Incremental,
    Upfront,
}

impl From<Mode> for PlanningMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Incremental => PlanningMode::Incremental,
            Mode::Upfront => PlanningMode::Upfront,
        }
    }
}

#[tokio::main]
async fn main() -> eoka_pilot::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let params = Params::from_args(&cli.params)?;

    let mut config = match cli.config {
        Some(ref path) => Config::load_with_params(path, &params)?,
        None => Config::for_task(cli.task.clone().unwrap_or_default()),
    };
    if let Some(task) = cli.task {
        config.task = task;
    }
    if let Some(mode) = cli.mode {
        config.agent.mode = mode.into();
    }
    if cli.headless {
        config.browser.headless = true;
    }
    config.validate()?;

    if cli.check {
        println!("Config valid: {}", config.name);
        println!("  Task: {}", config.task);
        if let Some(ref url) = config.start_url {
            println!("  Start URL: {}", url);
        }
        println!("  Model: {} @ {}", config.planner.model, config.planner.base_url);
        println!("  Mode: {:?}", config.agent.mode);
        println!(
            "  Limits: {} steps, {} consecutive failures",
            config.agent.max_steps, config.agent.max_consecutive_failures
        );
        if !config.params.is_empty() {
            println!("  Parameters: {}", config.params.len());
            for (name, def) in &config.params {
                let req = if def.required { " (required)" } else { "" };
                let desc = def.description.as_deref().unwrap_or("");
                println!("    - {}{}: {}", name, req, desc);
            }
        }
        return Ok(());
    }

    println!("Running: {}", config.name);

    let model = OpenAiChat::new(&config.planner)?;
    let driver = EokaDriver::launch(&config.browser).await?;
    let result = Agent::new(&config, driver, model).run().await;

    println!();
    match &result.outcome {
        RunOutcome::Completed { summary } => {
            println!("✓ Completed");
            println!("  Summary: {}", summary);
        }
        RunOutcome::Failed { reason, summary } => {
            println!("✗ Failed: {}", reason);
            if !summary.is_empty() {
                println!("  Last summary: {}", summary);
            }
        }
    }
    println!("  Steps: {}", result.steps);
    println!("  Duration: {}ms", result.duration_ms);

    if !result.outcome.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
