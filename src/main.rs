use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediabatch::cli::{skip_live_override, Cli, Commands};
use mediabatch::config::Config;
use mediabatch::extractors::MediaKind;
use mediabatch::report::Reporter;
use mediabatch::{commands, utils};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing; diagnostics go to stderr, progress lines to stdout
    let default_filter = if cli.verbose { "mediabatch=debug" } else { "mediabatch=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let reporter = Reporter::new(cli.quiet);

    match run(cli, reporter).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            reporter.error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, reporter: Reporter) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let report_path = cli.report.as_deref();

    warn_missing_dependencies(&cli.command, &config).await;

    match cli.command {
        Commands::Audio {
            source,
            output,
            skip_live,
            no_skip_live,
        } => {
            let skip_live = skip_live_override(skip_live, no_skip_live);
            let options = config.acquire_options(MediaKind::Audio, source, output, skip_live);
            commands::acquire(&options, reporter, report_path).await
        }
        Commands::Video {
            source,
            output,
            skip_live,
            no_skip_live,
        } => {
            let skip_live = skip_live_override(skip_live, no_skip_live);
            let options = config.acquire_options(MediaKind::Video, source, output, skip_live);
            commands::acquire(&options, reporter, report_path).await
        }
        Commands::Transcribe {
            audio_dir,
            transcripts_dir,
            model,
            quiet_inference,
            format,
        } => {
            let options =
                config.transcribe_options(audio_dir, transcripts_dir, model, quiet_inference, format);
            commands::transcribe(&config, &options, reporter, report_path).await
        }
        Commands::FetchModel { model, cache_dir } => {
            commands::fetch_model(&config, &model, cache_dir.as_deref(), reporter).await
        }
        Commands::Config { show: _, init } => commands::config(&config, init, reporter),
    }
}

/// Check for required external tools (non-fatal; they may live outside PATH)
async fn warn_missing_dependencies(command: &Commands, config: &Config) {
    let tools = commands::required_tools(command, config);
    if tools.is_empty() {
        return;
    }

    let missing = utils::check_dependencies(&tools).await;
    if !missing.is_empty() {
        eprintln!("Dependency check warnings:");
        for dep in missing {
            eprintln!("   - {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}
