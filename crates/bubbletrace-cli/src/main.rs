//! bubbletrace CLI: bubble callout detection on drawing page images.

use std::path::{Path, PathBuf};

use bubbletrace::{BubbleTraceConfig, BubbleTracer, RasterPage};
use clap::{Args, Parser, Subcommand};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "bubbletrace")]
#[command(about = "Detect numbered bubble callouts and trace their leader directions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect bubbles on a page image and write the page result.
    Detect(CliDetectArgs),

    /// Print the four capture boxes of one bubble.
    CaptureBoxes(CliCaptureArgs),

    /// Print the default configuration as JSON.
    Config,
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    /// Path to the rendered page image.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the page result (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Optional JSON config; omitted fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to write a versioned debug dump (JSON).
    #[arg(long)]
    debug_json: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliCaptureArgs {
    /// Path to the rendered page image.
    #[arg(long)]
    image: PathBuf,

    /// 1-based bubble number in reading order.
    #[arg(long)]
    bubble: u32,

    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::CaptureBoxes(args) => run_capture_boxes(&args),
        Commands::Config => run_config(),
    }
}

fn load_tracer(config: Option<&Path>) -> CliResult<BubbleTracer> {
    match config {
        Some(path) => {
            tracing::info!("Loading config: {}", path.display());
            BubbleTracer::from_config_file(path)
        }
        None => Ok(BubbleTracer::new()),
    }
}

fn load_page(path: &Path) -> CliResult<RasterPage> {
    tracing::info!("Loading image: {}", path.display());
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    let page = RasterPage::from_dynamic(img);
    tracing::info!("Image size: {}x{}", page.width(), page.height());
    Ok(page)
}

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    let tracer = load_tracer(args.config.as_deref())?;
    let page = load_page(&args.image)?;

    let (result, dump) = if args.debug_json.is_some() {
        let (result, dump) = tracer.process_with_debug(&page);
        (result, Some(dump))
    } else {
        (tracer.process(&page), None)
    };

    let with_direction = result.with_direction_count();
    tracing::info!(
        "Detected {} bubbles ({} with direction)",
        result.bubbles.len(),
        with_direction
    );

    let json = serde_json::to_string_pretty(&result)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Results written to {}", args.out.display());

    if let (Some(path), Some(dump)) = (&args.debug_json, dump) {
        let debug_json = serde_json::to_string_pretty(&dump)?;
        std::fs::write(path, &debug_json)?;
        tracing::info!("Debug dump written to {}", path.display());
    }
    Ok(())
}

fn run_capture_boxes(args: &CliCaptureArgs) -> CliResult<()> {
    let tracer = load_tracer(args.config.as_deref())?;
    let page = load_page(&args.image)?;
    let result = tracer.process(&page);

    let bubble = result.bubble(args.bubble).ok_or_else(|| -> CliError {
        format!(
            "bubble {} not found ({} detected)",
            args.bubble,
            result.bubbles.len()
        )
        .into()
    })?;
    let Some(boxes) = tracer.capture_boxes(&result, args.bubble) else {
        let reason = bubble
            .no_direction
            .map(|r| format!("{:?}", r))
            .unwrap_or_else(|| "unknown".to_string());
        return Err(format!("bubble {} has no direction ({})", args.bubble, reason).into());
    };
    println!("{}", serde_json::to_string_pretty(&boxes)?);
    Ok(())
}

fn run_config() -> CliResult<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&BubbleTraceConfig::default())?
    );
    Ok(())
}
