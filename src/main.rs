use clap::Parser;
use memories_dl::media::{CliMediaTool, MediaTool};
use memories_dl::{
    Config, Pipeline, ProcessingMode, ProgressSnapshot, RunReport, cancel_on_signal,
    clean_stale_artifacts, load_records,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "memories-dl",
    version,
    about = "Download and rebuild a personal media export"
)]
struct Cli {
    /// Path to the export document.
    #[arg(default_value = "json/memories_history.json")]
    input: PathBuf,

    /// Output directory.
    #[arg(short, long, default_value = "./downloads", env = "MEMORIES_DL_OUTPUT")]
    output: PathBuf,

    /// Do not write capture date and location metadata.
    #[arg(long)]
    no_exif: bool,

    /// Worker slots (0 = min(cpus + 4, 20)).
    #[arg(short, long, default_value_t = 0)]
    workers: usize,

    /// Use CUDA decode and NVENC encode for video overlays.
    #[arg(long)]
    gpu: bool,

    /// Where permanently failed records are written.
    #[arg(long, default_value = "failed_memories.json")]
    ledger: PathBuf,

    /// Processing mode (keep-both, optimized, raw-only); prompts when omitted.
    #[arg(long)]
    mode: Option<ProcessingMode>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let mode = match cli.mode {
        Some(mode) => mode,
        None => match prompt_mode() {
            Some(mode) => mode,
            None => {
                tracing::error!("no processing mode selected");
                return ExitCode::FAILURE;
            }
        },
    };

    let config = Config {
        output_dir: cli.output.clone(),
        ledger_path: cli.ledger.clone(),
        mode,
        workers: cli.workers,
        stamp_metadata: !cli.no_exif,
        hardware_accel: cli.gpu,
        ..Config::default()
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .max_blocking_threads(config.blocking_threads())
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.input, config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, code = e.code(), "run failed");
            ExitCode::FAILURE
        }
    }
}

/// Ask for the processing mode until a valid choice is entered
///
/// Returns `None` when stdin is closed.
fn prompt_mode() -> Option<ProcessingMode> {
    println!("Select processing mode:");
    println!("[1] Keep Both:   saves the original raw file AND the merged file with overlay.");
    println!("[2] Optimized:   keeps the merged version if available, otherwise the raw file.");
    println!("[3] Raw Only:    discards all overlays and saves only the original raw media.");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("Enter choice (1/2/3): ");
        std::io::stdout().flush().ok();

        let line = lines.next()?.ok()?;
        match line.trim().parse::<u8>().ok().and_then(ProcessingMode::from_choice) {
            Some(mode) => return Some(mode),
            None => println!("Invalid choice, please enter 1, 2 or 3."),
        }
    }
}

async fn run(input: PathBuf, config: Config) -> memories_dl::Result<()> {
    tokio::fs::create_dir_all(&config.output_dir).await?;
    clean_stale_artifacts(&config.output_dir).await?;

    let tool = CliMediaTool::from_path()
        .with_stamp_timeout(config.stamp_timeout)
        .with_probe_timeout(config.probe_timeout);
    if !tool.can_transcode() {
        tracing::warn!("ffmpeg not found in PATH, video overlays will fail");
    }
    if config.stamp_metadata && !tool.can_stamp() {
        tracing::warn!("exiftool not found in PATH, only file times will be set");
    }

    println!("Mode:     {}", config.mode);
    println!("Output:   {}", config.output_dir.display());
    println!("Workers:  {} slots", config.worker_slots());
    println!("Fetches:  {} concurrent", config.fetch_permits());
    println!("GPU:      {}", if config.hardware_accel { "on" } else { "off" });
    println!("Metadata: {}", if config.stamp_metadata { "on" } else { "off" });

    let loaded = load_records(&input).await?;
    if !loaded.rejected.is_empty() {
        tracing::warn!(count = loaded.rejected.len(), "some records were rejected");
    }

    let tool: Arc<dyn MediaTool> = Arc::new(tool);
    let pipeline = Pipeline::new(config, tool)?;

    let cancel = CancellationToken::new();
    let signal_task = cancel_on_signal(cancel.clone());
    let display_task = spawn_display(&pipeline);

    let report = pipeline.run(&loaded.records, &cancel).await;

    signal_task.abort();
    display_task.abort();
    eprintln!();
    print_summary(&report, pipeline.config());
    Ok(())
}

/// Redraw a one-line counter on every finished record
fn spawn_display(pipeline: &Pipeline) -> tokio::task::JoinHandle<()> {
    let mut events = pipeline.progress().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => draw(&event.snapshot),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn draw(s: &ProgressSnapshot) {
    eprint!(
        "\rimages {}/{}  videos {}/{}  total {}/{}  errors {}   ",
        s.images.done,
        s.images.total,
        s.videos.done,
        s.videos.total,
        s.done(),
        s.total(),
        s.errors
    );
    std::io::stderr().flush().ok();
}

fn print_summary(report: &RunReport, config: &Config) {
    let main = &report.main_pass;
    println!(
        "Main pass:   {} downloaded, {} already present, {} failed",
        main.downloaded, main.already_present, main.failed
    );
    if main.skipped > 0 {
        println!("Cancelled:   {} records not started", main.skipped);
    }
    if report.repair_candidates > 0 {
        let repair = &report.repair_pass;
        println!(
            "Repair pass: {} retried, {} recovered, {} failed",
            report.repair_candidates, repair.downloaded, repair.failed
        );
    }
    if report.still_missing > 0 {
        println!(
            "{} records still missing, see {}",
            report.still_missing,
            config.ledger_path.display()
        );
    } else {
        println!("All records have output in {}", config.output_dir.display());
    }
}
