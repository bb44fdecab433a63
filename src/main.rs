use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use colored::*;
use recovery_chain::recovery::{validator, RecoveryRequest, ValidationOutcome};
use recovery_chain::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Exit code when recovery escalated or a chain failed
const EXIT_ESCALATED: u8 = 2;

#[derive(Parser)]
#[command(name = "recovery-chain")]
#[command(about = "Classify failures, run escalating recovery strategies and self-recovering validation chains")]
#[command(version = "1.0.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, env = "RECOVERY_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the failure category of an error message
    Classify {
        /// Error message to classify
        message: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run recovery for an error message
    Recover {
        /// Error message to recover from
        message: String,

        /// Initial context as a JSON object
        #[arg(short, long, default_value = "{}")]
        context: String,

        /// Number of validation checks that fail before one passes
        #[arg(long)]
        fail_validations: Option<u32>,

        /// Correlation id scoping the attempt counter
        #[arg(long)]
        correlation_id: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute a validation chain script
    Chain {
        /// Path to the chain script (JSON)
        script: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

fn init_logging(cli: &Cli) -> Option<WorkerGuard> {
    let default_level = if cli.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (writer, guard) = match &cli.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "recovery-chain.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(cli.log_dir.is_none())
        .with_writer(writer);

    if cli.log_json {
        builder.json().init();
    } else {
        builder.init();
    }

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if !cfg!(feature = "color-output") {
        colored::control::set_override(false);
    }

    let _guard = init_logging(&cli);

    let config = RecoveryConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match &cli.command {
        Commands::Classify { message, json } => classify(&config, message, *json),
        Commands::Recover {
            message,
            context,
            fail_validations,
            correlation_id,
            json,
        } => {
            recover_message(
                config,
                message,
                context,
                *fail_validations,
                correlation_id.as_deref(),
                *json,
            )
            .await
        }
        Commands::Chain { script, json } => run_chain(config, script, *json).await,
        Commands::Config => show_config(&config, cli.config.as_deref()),
    }
}

fn classify(config: &RecoveryConfig, message: &str, json: bool) -> Result<ExitCode> {
    let engine = RecoveryEngine::new(config.clone());
    let category = engine.classify(&Failure::new(message));

    if json {
        let strategies: Vec<_> = engine
            .registry()
            .strategies_for(category)
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "message": message,
                "category": category,
                "description": category.description(),
                "strategies": strategies,
            }))?
        );
        return Ok(ExitCode::SUCCESS);
    }

    println!("{} {}", "Category:".bold(), category.to_string().cyan());
    println!("  {}", category.description());
    println!("\n{}", "Strategies (in escalation order):".bold());
    for (i, strategy) in engine.registry().strategies_for(category).iter().enumerate() {
        println!("  {}. {} (priority {})", i + 1, strategy.name(), strategy.priority());
    }

    Ok(ExitCode::SUCCESS)
}

fn parse_context(raw: &str) -> Result<recovery_chain::Context> {
    let value: serde_json::Value =
        serde_json::from_str(raw).context("Context is not valid JSON")?;
    recovery_chain::Context::try_from(value)
        .map_err(|other| anyhow::anyhow!("Context must be a JSON object, got {}", other))
}

async fn recover_message(
    config: RecoveryConfig,
    message: &str,
    raw_context: &str,
    fail_validations: Option<u32>,
    correlation_id: Option<&str>,
    json: bool,
) -> Result<ExitCode> {
    let context = parse_context(raw_context)?;
    let engine = RecoveryEngine::new(config);

    let mut request = RecoveryRequest::new(message, context);
    if let Some(id) = correlation_id {
        request = request.with_correlation(id);
    }
    if let Some(failures) = fail_validations {
        let calls = Arc::new(AtomicU32::new(0));
        request = request.with_validation(validator(move |_ctx| {
            let calls = Arc::clone(&calls);
            async move {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                Ok(if call < failures {
                    ValidationOutcome::failed(format!("Validation check {} failed", call + 1))
                } else {
                    ValidationOutcome::passed()
                })
            }
        }));
    }

    let result = engine.execute(request).await;
    let log = engine.recovery_log();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "result": result,
                "escalation": result.escalation_report(),
                "log": log,
            }))?
        );
    } else {
        print_recovery(&result, &log);
    }

    Ok(if result.recovered {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_ESCALATED)
    })
}

fn print_recovery(result: &RecoveryResult, log: &[RecoveryLogEntry]) {
    println!("{}", "Recovery log:".bold());
    for entry in log {
        let mark = if entry.success { "✓".green() } else { "✗".red() };
        println!(
            "  {} [{}] {} - {}",
            mark,
            entry.category,
            entry.strategy,
            entry.action.dimmed()
        );
    }
    println!();

    if result.recovered {
        println!(
            "{} with {} after {} attempt(s)",
            "Recovered".green().bold(),
            result.strategy.as_deref().unwrap_or("-"),
            result.attempts
        );
    } else {
        println!(
            "{} after {} attempt(s)",
            "Manual intervention required".red().bold(),
            result.attempts
        );
        if let Some(id) = &result.error_id {
            println!("  Error ID: {}", id);
        }
        if let Some(error) = &result.error {
            println!("  Error: {}", error);
        }
    }

    if !result.context.is_empty() {
        println!("\n{}", "Context:".bold());
        for (key, value) in result.context.iter() {
            println!("  {} = {}", key, value);
        }
    }
}

async fn run_chain(config: RecoveryConfig, path: &std::path::Path, json: bool) -> Result<ExitCode> {
    let script = ChainScript::load(path)
        .with_context(|| format!("Failed to load chain script {}", path.display()))?;

    let engine = Arc::new(RecoveryEngine::new(config));
    let chain = script.build(Arc::clone(&engine));
    let result = chain.execute(script.context.clone()).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_chain(&result);
    }

    Ok(if result.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_ESCALATED)
    })
}

fn print_chain(result: &ChainResult) {
    println!("{} {}", "Chain:".bold(), result.chain_name);
    for step in &result.results {
        let status = match (step.success, step.recovered) {
            (true, false) => "passed".green(),
            (true, true) => "recovered".yellow(),
            (false, _) => "failed".red(),
        };
        println!("  {:<32} {:<10} attempts: {}", step.name, status, step.attempts);
        if let Some(error) = &step.error {
            println!("    {}", error.dimmed());
        }
    }

    let status = if result.success {
        "SUCCESS".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "\n{} {} ({}/{} steps completed)",
        "Status:".bold(),
        status,
        result.completed_steps,
        result.total_steps
    );
}

fn show_config(config: &RecoveryConfig, explicit: Option<&std::path::Path>) -> Result<ExitCode> {
    let source = explicit
        .map(|p| p.display().to_string())
        .or_else(|| RecoveryConfig::default_path().map(|p| format!("{} (optional)", p.display())))
        .unwrap_or_else(|| "<none>".to_string());

    println!("{} {}", "Config file:".bold(), source);
    println!("{}", serde_json::to_string_pretty(config)?);
    println!(
        "\n{} {}",
        "First backoff delay:".bold(),
        humantime::format_duration(std::time::Duration::from_millis(config.backoff.base_delay_ms))
    );

    Ok(ExitCode::SUCCESS)
}
