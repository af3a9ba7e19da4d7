// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};

use pubdeck::app_config::{self, Config, GenerationProvider};
use pubdeck::app_controller::{Controller, PresentationOutcome, PresentationRequest};
use pubdeck::deck::read_outline;

/// CLI Wrapper for GenerationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliGenerationProvider {
    #[value(name = "openai")]
    OpenAI,
    Anthropic,
    #[value(name = "lmstudio")]
    LMStudio,
}

impl From<CliGenerationProvider> for GenerationProvider {
    fn from(cli_provider: CliGenerationProvider) -> Self {
        match cli_provider {
            CliGenerationProvider::OpenAI => GenerationProvider::OpenAI,
            CliGenerationProvider::Anthropic => GenerationProvider::Anthropic,
            CliGenerationProvider::LMStudio => GenerationProvider::LMStudio,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a presentation about a topic
    Generate(GenerateArgs),

    /// Compile an existing markup file into a presentation
    Compile(CompileArgs),

    /// Print the slide outline of a presentation
    Inspect {
        /// Presentation to read
        #[arg(value_name = "PPTX")]
        path: PathBuf,
    },

    /// Generate shell completions for pubdeck
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Topic of the presentation
    #[arg(value_name = "TOPIC")]
    topic: String,

    /// Design number (1-7); anything else falls back to 1
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    design: i64,

    /// First publication year to search
    #[arg(long)]
    start_year: Option<u16>,

    /// Last publication year to search
    #[arg(long)]
    end_year: Option<u16>,

    /// Output file name without extension (defaults to the topic)
    #[arg(short, long)]
    name: Option<String>,

    /// Generation provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliGenerationProvider>,

    /// Model name to use for generation
    #[arg(short, long)]
    model: Option<String>,

    /// Also search and download topic images
    #[arg(long)]
    images: bool,

    /// Write an HTML download page next to the presentation
    #[arg(long)]
    download_page: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct CompileArgs {
    /// Markup file to compile
    #[arg(value_name = "MARKUP_FILE")]
    markup: PathBuf,

    /// Design number (1-7); anything else falls back to 1
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    design: i64,

    /// JSON file with the bibliographic records for the references slide
    #[arg(short, long)]
    references: Option<PathBuf>,

    /// Output file name without extension (defaults to the markup file stem)
    #[arg(short, long)]
    name: Option<String>,

    /// Write an HTML download page next to the presentation
    #[arg(long)]
    download_page: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// pubdeck - literature-backed slide decks
///
/// Looks up PubMed articles about a topic, asks an LLM to draft the slides,
/// and compiles them onto one of seven PowerPoint designs.
#[derive(Parser, Debug)]
#[command(name = "pubdeck")]
#[command(version)]
#[command(about = "AI-generated PowerPoint presentations grounded in PubMed")]
#[command(long_about = "pubdeck drafts a presentation about a topic from PubMed articles and compiles it into a .pptx file.

EXAMPLES:
    pubdeck generate \"peri-implantitis\"                     # Use default config
    pubdeck generate -d 3 --start-year 2018 \"bone grafts\"   # Pick a design and year range
    pubdeck generate -p anthropic \"dental implants\"         # Use a specific provider
    pubdeck compile Cache/implants.txt -r refs.json        # Rebuild from cached markup
    pubdeck inspect GeneratedPresentations/implants.pptx   # Print the slide outline
    pubdeck completions bash > pubdeck.bash                # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically. API keys may also come from OPENAI_API_KEY or
    ANTHROPIC_API_KEY, including from a .env file.

SUPPORTED PROVIDERS:
    openai    - OpenAI API (default: gpt-4, requires API key)
    anthropic - Anthropic Claude API (requires API key)
    lmstudio  - LM Studio local server (OpenAI-compatible on http://localhost:1234/v1)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {:<5} {}\x1B[0m",
                color, now, record.level(), record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once; the level is refined after loading the config
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    // Keys in a .env file count as environment variables
    if let Ok(path) = dotenvy::dotenv() {
        log::debug!("Loaded environment from {:?}", path);
    }

    let cli = CommandLineOptions::parse();

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "pubdeck", &mut std::io::stdout());
            Ok(())
        }
        Commands::Inspect { path } => run_inspect(&path),
        Commands::Generate(args) => run_generate(args).await,
        Commands::Compile(args) => run_compile(args),
    }
}

// @loads: Configuration with CLI log level applied
fn load_config(common: &CommonArgs) -> Result<Config> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &common.log_level {
        let level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level.to_level_filter());
    }

    let mut config = Config::load_or_create(&common.config_path)?;

    if let Some(log_level) = &common.log_level {
        config.log_level = log_level.clone().into();
    } else {
        log::set_max_level(config.log_level.to_level_filter());
    }

    Ok(config)
}

async fn run_generate(args: GenerateArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;

    // Override config with CLI options if provided
    if let Some(provider) = &args.provider {
        config.generation.provider = provider.clone().into();
    }
    if let Some(model) = &args.model {
        config.generation.active_provider_config_mut().model = model.clone();
    }
    if args.images {
        config.images.enabled = true;
    }
    if args.download_page {
        config.output.write_download_page = true;
    }

    // Validate the configuration after loading and overriding
    config.validate()
        .context("Configuration validation failed")?;

    let mut request = PresentationRequest::new(args.topic, &config);
    request.design = args.design;
    request.name = args.name;
    if let Some(year) = args.start_year {
        request.start_year = year;
    }
    if let Some(year) = args.end_year {
        request.end_year = year;
    }

    let controller = Controller::with_config(config)?;
    let outcome = controller.run(request).await?;
    report(&outcome);
    Ok(())
}

fn run_compile(args: CompileArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if args.download_page {
        config.output.write_download_page = true;
    }

    if !args.markup.is_file() {
        return Err(anyhow!("Markup file does not exist: {:?}", args.markup));
    }

    let controller = Controller::offline(config);
    let outcome = controller.compile_file(
        &args.markup,
        args.design,
        args.references.as_deref(),
        args.name.as_deref(),
    )?;
    report(&outcome);
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let slides = read_outline(path)
        .with_context(|| format!("Failed to read presentation: {:?}", path))?;

    let mut stdout = std::io::stdout();
    for (i, slide) in slides.iter().enumerate() {
        writeln!(stdout, "--- Slide {} ---", i + 1)?;
        writeln!(stdout, "{}", slide)?;
    }
    Ok(())
}

fn report(outcome: &PresentationOutcome) {
    if !outcome.warnings.is_empty() {
        warn!("{} markup problem(s) were tolerated", outcome.warnings.len());
    }
    if let Some(images) = &outcome.images {
        info!("Images: {} saved, {} skipped", images.saved.len(), images.skipped.len());
    }
    if let Some(page) = &outcome.download_page {
        info!("Download page: {}", page.display());
    }
    println!("{}", outcome.path.display());
}
