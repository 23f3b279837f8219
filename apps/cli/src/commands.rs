//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use rfpscope_core::{AnalysisProgress, AnalysisRequest, Analyzer, AnalyzerOptions, TaskRegistry};
use rfpscope_provider::OpenRouterClient;
use rfpscope_shared::{
    AppConfig, ExecutionMode, ExtractStrategy, FailurePolicy, RfpScopeError, init_config,
    load_config, load_config_from, validate_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// rfpscope: evaluate a company's eligibility against an RFP.
#[derive(Parser)]
#[command(
    name = "rfpscope",
    version,
    about = "Extract compliance, eligibility, risk and submission checklists from an RFP.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.rfpscope/rfpscope.toml.
    #[arg(long, global = true, env = "RFPSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Analyze a company profile against an RFP.
    Analyze(AnalyzeArgs),

    /// List the registered analysis tasks and their response schemas.
    Tasks,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments of `rfpscope analyze`.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct AnalyzeArgs {
    /// Plain-text company profile.
    #[arg(long)]
    pub company: PathBuf,

    /// Plain-text RFP.
    #[arg(long)]
    pub rfp: PathBuf,

    /// Write the result JSON here instead of stdout.
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Run all tasks at once instead of one after another.
    #[arg(long)]
    pub concurrent: bool,

    /// Keep successful task results when another task fails.
    #[arg(long)]
    pub partial: bool,

    /// Use balanced-brace JSON extraction.
    #[arg(long)]
    pub balanced: bool,

    /// Per-task generation timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Model ID override.
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr; stdout carries results.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "rfpscope=info",
        1 => "rfpscope=debug",
        _ => "rfpscope=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;
    match cli.command {
        Command::Analyze(args) => cmd_analyze(&config, args).await,
        Command::Tasks => cmd_tasks(&config),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_analyze(config: &AppConfig, args: AnalyzeArgs) -> Result<()> {
    // Validate API key before reading anything
    let api_key = validate_api_key(config)?;

    let company_text = read_document(&args.company)?;
    let rfp_text = read_document(&args.rfp)?;

    let registry = TaskRegistry::with_configured(&config.tasks)?;
    let options = apply_overrides(AnalyzerOptions::from(&config.analysis), &args);

    let mut client = OpenRouterClient::new(&config.openrouter, api_key)?;
    if let Some(model) = &args.model {
        client = client.with_model(model.clone());
    }

    info!(
        company = %args.company.display(),
        rfp = %args.rfp.display(),
        model = client.model(),
        tasks = registry.len(),
        "starting analysis"
    );

    let analyzer = Analyzer::new(client)
        .with_registry(registry)
        .with_options(options);

    let reporter = CliProgress::new();
    let result = analyzer
        .analyze(&AnalysisRequest::new(company_text, rfp_text), &reporter)
        .await;
    reporter.finish();

    let json = serde_json::to_string_pretty(&result)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n")).map_err(|e| RfpScopeError::io(path, e))?;
            println!("Result written to: {}", path.display());
        }
        None => println!("{json}"),
    }

    match result.error() {
        Some(error) => Err(eyre!("{error}")),
        None => Ok(()),
    }
}

/// Layer CLI flags over the configured options.
fn apply_overrides(mut options: AnalyzerOptions, args: &AnalyzeArgs) -> AnalyzerOptions {
    if args.concurrent {
        options.mode = ExecutionMode::Concurrent;
    }
    if args.partial {
        options.failure_policy = FailurePolicy::Partial;
    }
    if args.balanced {
        options.extract = ExtractStrategy::Balanced;
    }
    if let Some(secs) = args.timeout {
        options.timeout = Some(Duration::from_secs(secs));
    }
    options
}

fn read_document(path: &Path) -> std::result::Result<String, RfpScopeError> {
    std::fs::read_to_string(path).map_err(|e| RfpScopeError::io(path, e))
}

fn cmd_tasks(config: &AppConfig) -> Result<()> {
    let registry = TaskRegistry::with_configured(&config.tasks)?;
    for (index, spec) in registry.iter().enumerate() {
        println!("{}. {}", index + 1, spec.name);
        println!("   variables: {}", spec.required_variables.join(", "));
        if !spec.response_schema_hint.is_empty() {
            for line in spec.response_schema_hint.lines() {
                println!("   {line}");
            }
        }
        println!();
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl AnalysisProgress for CliProgress {
    fn task_started(&self, task: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Analyzing [{current}/{total}] {task}"));
    }

    fn task_finished(&self, task: &str, success: bool) {
        let mark = if success { "✓" } else { "✗" };
        self.spinner.println(format!("  {mark} {task}"));
    }
}
