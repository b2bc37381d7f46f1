//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use ssireplace_core::{Assets, PassReport, PassSummary, ProgressReporter, SsiReplacePlugin};
use ssireplace_fetcher::HttpFetcher;
use ssireplace_shared::{
    AppConfig, BuildMode, FetchOutcome, PluginOptions, init_config, init_config_at, load_config,
    load_config_from,
};
use ssireplace_substitute::MarkerStatus;
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SSI Replace: inject remote HTML fragments into a development build.
#[derive(Parser)]
#[command(
    name = "ssi-replace",
    version,
    about = "Replace SSI include markers in a build's index.html with remote HTML fragments.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./ssi-replace.toml, then ~/.ssi-replace/ssi-replace.toml).
    #[arg(short, long, global = true)]
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
    /// Run one substitution pass over a build output directory.
    Run(RunArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Arguments for `run`. Flags override config file values.
#[derive(Args)]
pub(crate) struct RunArgs {
    /// Build output directory containing index.html.
    #[arg(short, long)]
    pub dist: Option<PathBuf>,

    /// Build mode: development, production, or none.
    #[arg(short, long, env = "SSI_REPLACE_MODE")]
    pub mode: Option<BuildMode>,

    /// URL of the header fragment.
    #[arg(long)]
    pub header_url: Option<String>,

    /// URL of the footer fragment.
    #[arg(long)]
    pub footer_url: Option<String>,

    /// URL of the sidebar fragment.
    #[arg(long)]
    pub sidebar_url: Option<String>,

    /// Custom marker, repeated three times in header, footer, sidebar order.
    #[arg(long = "ssi-tag")]
    pub ssi_tags: Vec<String>,
}

impl RunArgs {
    fn plugin_overrides(&self) -> PluginOptions {
        PluginOptions {
            header_url: self.header_url.clone(),
            footer_url: self.footer_url.clone(),
            sidebar_url: self.sidebar_url.clone(),
            ssi_tags: (!self.ssi_tags.is_empty()).then(|| self.ssi_tags.clone()),
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a template ssi-replace.toml in the current directory.
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

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose)));

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

/// Directives covering the library crates and this binary.
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "ssireplace=info,ssi_replace=info",
        1 => "ssireplace=debug,ssi_replace=debug",
        _ => "ssireplace=trace,ssi_replace=trace",
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Run(args) => cmd_run(resolve_config(config_path)?, &args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(&resolve_config(config_path)?),
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

async fn cmd_run(config: AppConfig, args: &RunArgs) -> Result<()> {
    let mode = args.mode.unwrap_or(config.build.mode);
    let dist = args
        .dist
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.build.dist_dir));

    let plugin = SsiReplacePlugin::new(args.plugin_overrides().or(config.plugin))?;

    if !dist.is_dir() {
        return Err(eyre!(
            "build output directory '{}' does not exist",
            dist.display()
        ));
    }

    info!(
        dist = %dist.display(),
        %mode,
        urls = ?plugin.config().urls(),
        "running ssi replace"
    );

    let mut assets = Assets::load_dir(&dist)?;
    debug!(assets = ?assets.names().collect::<Vec<_>>(), "build outputs");
    let fetcher = HttpFetcher::new()?;
    let reporter = CliProgress::new();

    let report = plugin.run(mode, &mut assets, &fetcher, &reporter).await?;

    match report {
        PassReport::Skipped { mode } => {
            println!("  Skipped: build mode is '{mode}', not 'development'.");
        }
        PassReport::Applied(summary) => {
            let written = assets.write_updated(&dist)?;
            print_summary(&summary, &written);
        }
    }

    Ok(())
}

fn print_summary(summary: &PassSummary, written: &[PathBuf]) {
    println!();
    println!("  {} updated", summary.document);
    for marker in &summary.markers {
        let status = match &marker.status {
            MarkerStatus::Replaced => "replaced".to_string(),
            MarkerStatus::Fallback { reason } => format!("fallback ({reason})"),
            MarkerStatus::MarkerMissing => "marker not found".to_string(),
        };
        println!("  {:<42} {status}", marker.marker);
    }
    println!("  Size:   {} bytes", summary.size);
    println!("  SHA256: {}", summary.content_hash);
    println!("  Map:    {}", summary.source_map.to_json());
    for path in written {
        println!("  Wrote:  {}", path.display());
    }
    println!("  Time:   {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

/// Write the template at `--config`, or into the working directory.
fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let path = match config_path {
        Some(p) => init_config_at(p)?,
        None => {
            let cwd = std::env::current_dir()
                .map_err(|e| eyre!("cannot determine working directory: {e}"))?;
            init_config(&cwd)?
        }
    };
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn fragment_fetched(&self, url: &str, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Success(body) => {
                self.spinner
                    .set_message(format!("Fetched {url} ({} bytes)", body.len()));
            }
            FetchOutcome::Failure(reason) => {
                self.spinner.println(format!("  ! {reason}"));
            }
        }
    }

    fn done(&self, _report: &PassReport) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn run_args_parse_overrides() {
        let cli = Cli::parse_from([
            "ssi-replace",
            "run",
            "--dist",
            "build",
            "--mode",
            "development",
            "--sidebar-url",
            "https://cdn.example.com/sidebar.html",
            "--ssi-tag",
            "[h]",
            "--ssi-tag",
            "[f]",
            "--ssi-tag",
            "[s]",
        ]);

        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.mode, Some(BuildMode::Development));
        assert_eq!(args.dist, Some(PathBuf::from("build")));

        let overrides = args.plugin_overrides();
        assert_eq!(
            overrides.sidebar_url.as_deref(),
            Some("https://cdn.example.com/sidebar.html")
        );
        assert!(overrides.header_url.is_none());
        assert_eq!(overrides.ssi_tags.map(|t| t.len()), Some(3));
    }

    #[test]
    fn default_filter_covers_binary_target() {
        let own_crate = module_path!().split("::").next().unwrap();
        for verbose in 0..3 {
            let directives = default_filter(verbose);
            assert!(
                directives.split(',').any(|d| d.starts_with(&format!("{own_crate}="))),
                "{directives} misses {own_crate}"
            );
            assert!(directives.split(',').any(|d| d.starts_with("ssireplace=")));
            assert!(tracing_subscriber::EnvFilter::try_new(directives).is_ok());
        }
    }

    #[test]
    fn config_init_does_not_parse_existing_file() {
        let dir = std::env::temp_dir().join(format!("ssi-cli-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ssi-replace.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let err = cmd_config_init(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn run_args_without_tags_keeps_config_tags() {
        let cli = Cli::parse_from(["ssi-replace", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.plugin_overrides().ssi_tags.is_none());
    }
}
