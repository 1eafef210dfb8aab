use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use scan_uploader::app::{App, ProgressSink, UploadOptions};
use scan_uploader::config::ConfigLoader;
use scan_uploader::error::UploadError;
use scan_uploader::internet_archive::IaSession;
use scan_uploader::output::{
    ConsoleSink, JsonOutput, OutputMode, print_check_summary, print_upload_summary,
};

#[derive(Parser)]
#[command(name = "scan-upload")]
#[command(
    about = "Zip scan directories listed in a spreadsheet and upload them to the Internet Archive"
)]
#[command(version, author)]
struct Cli {
    /// Path to the JSON config (defaults to ./scan-upload.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print JSON reports instead of progress text
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check that every row's scan directory exists")]
    Check,
    #[command(about = "Check, then zip and upload every row")]
    Upload(UploadArgs),
}

#[derive(Args, Clone, Default)]
struct UploadArgs {
    /// Stop after this many uploads
    #[arg(long)]
    count: Option<usize>,

    /// Upload into the test collection instead of the row's collection
    #[arg(long)]
    test: bool,

    /// Skip the pre-flight directory check
    #[arg(long)]
    skip_check: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<UploadError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &UploadError) -> u8 {
    match error {
        UploadError::MissingConfig | UploadError::MissingScanDirectory(_) => 2,
        UploadError::ArchiveHttp(_)
        | UploadError::ArchiveStatus { .. }
        | UploadError::MissingCredentials => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    tracing::info!(workbook = %config.workbook, base_dir = %config.base_dir, "config loaded");
    let session = IaSession::from_config(&config)?;
    let app = App::new(config, session);

    match cli.command.unwrap_or(Commands::Upload(UploadArgs::default())) {
        Commands::Check => run_check(&app, output_mode),
        Commands::Upload(args) => run_upload(&app, args, output_mode),
    }
}

fn sink_for(output_mode: OutputMode) -> Box<dyn ProgressSink> {
    match output_mode {
        OutputMode::Interactive => Box::new(ConsoleSink::new()),
        OutputMode::NonInteractive => Box::new(JsonOutput),
    }
}

fn preflight(
    app: &App<IaSession>,
    sink: &dyn ProgressSink,
) -> miette::Result<scan_uploader::app::CheckResult> {
    app.preflight(sink).map_err(|err| {
        if matches!(err, UploadError::MissingScanDirectory(_)) {
            eprintln!("Some items in the spreadsheet don't exist");
        }
        miette::Report::new(err)
    })
}

fn run_check(app: &App<IaSession>, output_mode: OutputMode) -> miette::Result<()> {
    let sink = sink_for(output_mode);
    let result = preflight(app, sink.as_ref())?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_check(&result).into_diagnostic()?,
        OutputMode::Interactive => print_check_summary(&result),
    }
    Ok(())
}

fn run_upload(
    app: &App<IaSession>,
    args: UploadArgs,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let sink = sink_for(output_mode);
    if !args.skip_check {
        preflight(app, sink.as_ref())?;
    }

    let options = UploadOptions {
        count: args.count,
        test: args.test,
    };
    let result = app.upload(options, sink.as_ref())?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print_upload(&result).into_diagnostic()?,
        OutputMode::Interactive => print_upload_summary(&result),
    }
    Ok(())
}
