//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use prospectclean_core::pipeline::{CleanConfig, ProgressReporter, clean_prospects};
use prospectclean_core::report::RunReport;
use prospectclean_shared::{
    RunConfig, config_file_path, init_config, load_config, resolve_api_key,
};
use prospectclean_validator::{OpenAiService, ServiceConfig};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// prospectclean — clean prospect tables with LLM-backed validation.
#[derive(Parser)]
#[command(
    name = "prospectclean",
    version,
    about = "Validate and correct prospect names and companies in a CSV file.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Clean a prospect CSV file.
    Clean {
        /// Input CSV path.
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV path.
        #[arg(short, long, default_value = "prospects_cleaned.csv")]
        output: PathBuf,

        /// Maximum rows in flight (overrides config).
        #[arg(long)]
        concurrency: Option<usize>,

        /// Rows per incremental save (overrides config).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Last name column (overrides config).
        #[arg(long)]
        last_name_col: Option<String>,

        /// First name column (overrides config).
        #[arg(long)]
        first_name_col: Option<String>,

        /// Company column (overrides config).
        #[arg(long)]
        company_col: Option<String>,

        /// Email column (overrides config).
        #[arg(long)]
        email_col: Option<String>,

        /// Reasoning model (overrides config).
        #[arg(long)]
        model: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "prospectclean=info",
        1 => "prospectclean=debug",
        _ => "prospectclean=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Clean {
            input,
            output,
            concurrency,
            batch_size,
            last_name_col,
            first_name_col,
            company_col,
            email_col,
            model,
        } => {
            cmd_clean(CleanArgs {
                input,
                output,
                concurrency,
                batch_size,
                last_name_col,
                first_name_col,
                company_col,
                email_col,
                model,
            })
            .await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

struct CleanArgs {
    input: PathBuf,
    output: PathBuf,
    concurrency: Option<usize>,
    batch_size: Option<usize>,
    last_name_col: Option<String>,
    first_name_col: Option<String>,
    company_col: Option<String>,
    email_col: Option<String>,
    model: Option<String>,
}

async fn cmd_clean(args: CleanArgs) -> Result<()> {
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;

    // Merge CLI overrides onto the loaded config
    let mut run = RunConfig::from(&config);
    if let Some(concurrency) = args.concurrency {
        run.max_concurrency = concurrency;
    }
    if let Some(batch_size) = args.batch_size {
        run.batch_size = batch_size;
    }
    if let Some(col) = args.last_name_col {
        run.columns.last_name = col;
    }
    if let Some(col) = args.first_name_col {
        run.columns.first_name = col;
    }
    if let Some(col) = args.company_col {
        run.columns.company = col;
    }
    if let Some(col) = args.email_col {
        run.columns.email = col;
    }

    let base_url = Url::parse(&config.openai.base_url)
        .map_err(|e| eyre!("invalid base URL '{}': {e}", config.openai.base_url))?;

    let service = OpenAiService::new(ServiceConfig {
        api_key,
        model: args.model.unwrap_or_else(|| config.openai.model.clone()),
        base_url,
        timeout: Duration::from_secs(config.openai.timeout_secs),
        max_retries: 1,
    })?;

    let clean_config = CleanConfig {
        input: args.input.clone(),
        output: args.output.clone(),
        run,
    };

    info!(
        input = %args.input.display(),
        output = %args.output.display(),
        "cleaning prospects"
    );

    let reporter = CliProgress::new();
    let report = clean_prospects(&clean_config, service, &reporter).await?;

    print_summary(&report, &args.output);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config file created at {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let path = config_file_path()?;
    println!("# {}", path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

fn print_summary(report: &RunReport, output: &Path) {
    let cnt = report.rows_processed;
    if cnt == 0 {
        println!();
        println!("  No rows processed.");
        return;
    }
    let pct = |n: usize| n as f64 / cnt as f64 * 100.0;

    println!();
    println!("  Cleaning finished");
    println!("  Run:     {}", report.run_id);
    println!("  Rows:    {}/{}", cnt, report.rows_total);
    println!(
        "  Corrections: noms {} ({:.1}%), prénoms {} ({:.1}%), entreprises {} ({:.1}%)",
        report.corrections_last_name,
        pct(report.corrections_last_name),
        report.corrections_first_name,
        pct(report.corrections_first_name),
        report.corrections_company,
        pct(report.corrections_company),
    );
    println!(
        "  Confiance moyenne: noms {:.2}, prénoms {:.2}, entreprises {:.2}",
        report.mean_confidence_last_name,
        report.mean_confidence_first_name,
        report.mean_confidence_company,
    );
    if report.unresolved_fields > 0 {
        println!("  Champs non résolus: {}", report.unresolved_fields);
    }

    if !report.samples.is_empty() {
        println!();
        println!("  Exemples de corrections:");
        for sample in &report.samples {
            println!(
                "    [{}] {} → {} (confiance: {:.2})",
                sample.field, sample.original, sample.corrected, sample.confidence
            );
        }
    }

    println!();
    println!("  Output: {}", output.display());
    println!("  Time:   {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} {pos}/{len}")
                .expect("progress template"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn row_completed(&self, current: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.bar.set_length(total as u64);
        }
        self.bar.set_position(current as u64);
    }

    fn done(&self, report: &RunReport) {
        self.bar
            .finish_with_message(format!("{} rows validated", report.rows_processed));
    }
}
