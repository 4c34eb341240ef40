// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, info, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mlbooks::app_config::{self, Config, TranslationProvider};
use mlbooks::difficulty::{FrequencyTable, LevelClassifier, ProficiencyLevel};
use mlbooks::document::DocumentTree;
use mlbooks::errors::PipelineError;
use mlbooks::providers::{Provider, build_provider};
use mlbooks::translation::{CancellationFlag, PipelineOrchestrator};

/// CLI Wrapper for TranslationProvider to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliTranslationProvider {
    Ollama,
    OpenAI,
    Anthropic,
    LMStudio,
}

impl From<CliTranslationProvider> for TranslationProvider {
    fn from(cli_provider: CliTranslationProvider) -> Self {
        match cli_provider {
            CliTranslationProvider::Ollama => TranslationProvider::Ollama,
            CliTranslationProvider::OpenAI => TranslationProvider::OpenAI,
            CliTranslationProvider::Anthropic => TranslationProvider::Anthropic,
            CliTranslationProvider::LMStudio => TranslationProvider::LMStudio,
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

/// mlbooks - Multi-level bilingual books
///
/// Classifies every sentence of a book by difficulty and translates the
/// ones the reader can already handle.
#[derive(Parser, Debug)]
#[command(name = "mlbooks")]
#[command(version)]
#[command(about = "Difficulty-driven selective translation of books")]
#[command(long_about = "mlbooks reads a book as a JSON document tree, scores every sentence against a word \
frequency table and translates the sentences at or below the reader's level.

EXAMPLES:
    mlbooks analyze book.json                          # Level distribution only
    mlbooks translate book.json book.pt.json -t pt     # Translate to Portuguese
    mlbooks translate book.json out.json -u A2 -p openai -m gpt-4o-mini

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify the sentences of a book without translating
    Analyze {
        /// Input document (JSON)
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        /// Write the classified document here
        #[arg(short, long)]
        output_path: Option<PathBuf>,

        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Translate the sentences at or below the reader's level
    Translate {
        /// Input document (JSON)
        #[arg(value_name = "INPUT_PATH")]
        input_path: PathBuf,

        /// Output document (JSON)
        #[arg(value_name = "OUTPUT_PATH")]
        output_path: PathBuf,

        #[command(flatten)]
        selection: SelectionArgs,

        /// Target language code (e.g., 'en', 'es', 'fr')
        #[arg(short, long)]
        target_language: Option<String>,

        /// Translation provider to use
        #[arg(short, long, value_enum)]
        provider: Option<CliTranslationProvider>,

        /// Model name to use for translation
        #[arg(short, long)]
        model: Option<String>,

        /// Do not check the provider before starting
        #[arg(long)]
        skip_connection_test: bool,
    },
}

#[derive(Args, Debug)]
struct SelectionArgs {
    /// Reader's level (A1, A2, B1, B2, C1, C2+)
    #[arg(short, long)]
    user_level: Option<ProficiencyLevel>,

    /// Source language code (e.g., 'en', 'es', 'fr')
    #[arg(short, long)]
    source_language: Option<String>,
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

    // @returns: ANSI color and emoji for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("\x1B[1;31m", "❌"),
            Level::Warn => ("\x1B[1;33m", "🚧"),
            Level::Info => ("\x1B[1;32m", ""),
            Level::Debug => ("\x1B[1;36m", "🔍"),
            Level::Trace => ("\x1B[1;35m", "📋"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, emoji) = Self::style_for_level(record.level());
            let _ = writeln!(std::io::stderr(), "{}{} {} {}\x1B[0m", color, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // The logger accepts everything; the effective level is the global max level
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();
    let mut config = Config::load_or_create(&cli.config_path)?;

    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    log::set_max_level(config.log_level.to_level_filter());

    match cli.command {
        Commands::Analyze {
            input_path,
            output_path,
            selection,
        } => {
            apply_selection_overrides(&mut config, &selection);
            config
                .validate_selection()
                .context("Configuration validation failed")?;
            run_analyze(&config, &input_path, output_path.as_deref())
        }
        Commands::Translate {
            input_path,
            output_path,
            selection,
            target_language,
            provider,
            model,
            skip_connection_test,
        } => {
            apply_selection_overrides(&mut config, &selection);
            if let Some(target) = target_language {
                config.target_language = target;
            }
            if let Some(provider) = provider {
                config.translation.provider = provider.into();
            }
            if let Some(model) = model {
                let active = config.translation.provider.clone();
                config.translation.provider_config_mut(&active).model = model;
            }
            config.validate().context("Configuration validation failed")?;
            run_translate(&config, &input_path, &output_path, skip_connection_test).await
        }
    }
}

fn apply_selection_overrides(config: &mut Config, selection: &SelectionArgs) {
    if let Some(level) = selection.user_level {
        config.user_level = level;
    }
    if let Some(source) = &selection.source_language {
        config.source_language = source.clone();
    }
}

fn load_classifier(config: &Config) -> Result<LevelClassifier> {
    let table = FrequencyTable::from_file(&config.difficulty.lexicon_path)?;
    Ok(
        LevelClassifier::new(Arc::new(table), config.difficulty.thresholds.clone())
            .with_unknown_word_penalty(config.difficulty.unknown_word_penalty),
    )
}

fn read_document(path: &Path) -> Result<DocumentTree> {
    let file = File::open(path).with_context(|| format!("Failed to open document: {}", path.display()))?;
    let document: DocumentTree = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse document: {}", path.display()))?;
    document.validate()?;
    Ok(document)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}

fn run_analyze(config: &Config, input_path: &Path, output_path: Option<&Path>) -> Result<()> {
    let mut document = read_document(input_path)?;
    let orchestrator = PipelineOrchestrator::for_analysis(config.pipeline_config()?, load_classifier(config)?);

    let summary = orchestrator.analyze(&mut document)?;
    info!(
        "'{}': {} of {} sentence(s) at or below {} ({:.1}%)",
        document.title,
        summary.sentences_to_translate,
        summary.total_sentences,
        config.user_level,
        summary.translation_percentage()
    );
    for (level, count) in &summary.level_distribution {
        info!("  {:<3} {:>6}  {}", level.as_str(), count, level.description());
    }

    if let Some(path) = output_path {
        write_json(path, &document)?;
        info!("Classified document written to {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_translate(config: &Config, input_path: &Path, output_path: &Path, skip_connection_test: bool) -> Result<()> {
    let mut document = read_document(input_path)?;
    let classifier = load_classifier(config)?;

    let provider_config = config.translation.active_provider_config();
    let provider = build_provider(
        &config.translation.provider,
        &provider_config,
        config.translation.common.temperature,
    )?;

    if !skip_connection_test {
        provider.test_connection().await.map_err(|e| {
            anyhow!(
                "Cannot reach {} ({}): {}",
                config.translation.provider.display_name(),
                provider_config.endpoint,
                e
            )
        })?;
        info!(
            "Connected to {} using model {}",
            config.translation.provider.display_name(),
            provider_config.model
        );
    }

    let cancellation = CancellationFlag::new();
    let signal_flag = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing batches already sent");
            signal_flag.cancel();
        }
    });

    let orchestrator = PipelineOrchestrator::new(config.pipeline_config()?, classifier, provider)
        .with_cancellation(cancellation);

    let stats = match orchestrator.run(&mut document).await {
        Ok(stats) => stats,
        Err(PipelineError::Cancelled { stats }) => {
            write_json(output_path, &document)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Err(anyhow!("Translation cancelled; partial result written to {}", output_path.display()));
        }
        Err(e) => return Err(e.into()),
    };

    write_json(output_path, &document)?;
    info!("Translated document written to {}", output_path.display());
    if stats.batches_failed > 0 {
        warn!(
            "{} batch(es) failed; {} sentence(s) stay in the original language",
            stats.batches_failed, stats.kept_due_to_failure
        );
    }
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
