//! idcapture CLI: inspect, crop and verify identity-card images, or replay a
//! directory of frames through a full front/back capture.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use idcapture::capture::{CaptureConfig, CaptureController, CaptureEvent, ImageSequenceSource};
use idcapture::core::Side;
use idcapture::pipeline;
use idcapture::verify::{
    IdValidator, LocalVerificationService, TesseractRecognizer, VerificationClient,
    VerificationService,
};
use serde_json::json;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "idcapture")]
#[command(about = "Detect, crop and verify identity-card images")]
#[command(version)]
struct Cli {
    /// JSON capture configuration; defaults are used for missing keys.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level. Otherwise `IDCAPTURE_LOG` sets the level (default `info`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the detection sample for an image as JSON.
    Analyze {
        /// Path to the input image.
        image: PathBuf,
    },

    /// Crop the card out of an image and write the canonical PNG.
    Normalize {
        /// Path to the input image.
        image: PathBuf,
        /// Path to write the normalized PNG.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Verify one side of a card with the local OCR service.
    Verify(VerifyArgs),

    /// Read the fields off one side of a card and print them as JSON,
    /// without accepting or rejecting the image.
    Ocr(VerifyArgs),

    /// Replay a directory of frames as a camera and capture both sides.
    Scan(ScanArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SideArg {
    Front,
    Back,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Front => Side::Front,
            SideArg::Back => Side::Back,
        }
    }
}

#[derive(Debug, Clone, Args)]
struct VerifyArgs {
    /// Path to the input image.
    image: PathBuf,

    /// Card side the image is expected to show.
    #[arg(long, value_enum, default_value_t = SideArg::Front)]
    side: SideArg,

    /// Tesseract language set.
    #[arg(long, default_value = "eng+ara")]
    lang: String,
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Directory of frames, replayed in file-name order.
    frames: PathBuf,

    /// Tesseract language set.
    #[arg(long, default_value = "eng+ara")]
    lang: String,

    /// Give up after this many seconds without a completed back side.
    #[arg(long, default_value = "60")]
    max_seconds: u64,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    init_logging(cli.verbose)?;

    let config = match &cli.config {
        Some(path) => CaptureConfig::load_json(path)?,
        None => CaptureConfig::default(),
    };

    match cli.command {
        Commands::Analyze { image } => run_analyze(&image, &config),
        Commands::Normalize { image, out } => run_normalize(&image, &out, &config),
        Commands::Verify(args) => run_verify(&args, &config),
        Commands::Ocr(args) => run_ocr(&args, &config),
        Commands::Scan(args) => run_scan(&args, config),
    }
}

#[cfg(feature = "tracing")]
fn init_logging(_verbose: bool) -> CliResult<()> {
    idcapture::core::init_tracing(false);
    Ok(())
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: bool) -> CliResult<()> {
    if verbose {
        idcapture::core::init_with_level(log::LevelFilter::Debug)?;
    } else {
        idcapture::core::init_from_env(log::LevelFilter::Info)?;
    }
    Ok(())
}

fn local_ocr(lang: &str) -> LocalVerificationService<TesseractRecognizer> {
    LocalVerificationService::with_validator(TesseractRecognizer::with_lang(lang), IdValidator::default())
}

fn local_service(lang: &str) -> Arc<dyn VerificationService> {
    Arc::new(local_ocr(lang))
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?)
}

// ── analyze ────────────────────────────────────────────────────────────

fn run_analyze(image: &Path, config: &CaptureConfig) -> CliResult<()> {
    let report = pipeline::analyze_image(image, config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

// ── normalize ──────────────────────────────────────────────────────────

fn run_normalize(image: &Path, out: &Path, config: &CaptureConfig) -> CliResult<()> {
    let normalized = pipeline::normalize_image(image, config)?;
    std::fs::write(out, &normalized.bytes)?;
    log::info!(
        "wrote {}x{} card to {}",
        normalized.width,
        normalized.height,
        out.display()
    );
    Ok(())
}

// ── verify ─────────────────────────────────────────────────────────────

fn run_verify(args: &VerifyArgs, config: &CaptureConfig) -> CliResult<()> {
    let side = Side::from(args.side);
    let image = pipeline::prepare_upload(&args.image, config)?;
    let client = VerificationClient::new(local_service(&args.lang), config.client.clone());
    let outcome = runtime()?.block_on(pipeline::verify_image(&client, side, &image))?;

    let verdict = outcome.judge(side);
    let report = json!({
        "side": side,
        "accepted": outcome.accepted,
        "isTargetType": outcome.is_target_document_type,
        "detectedSide": outcome.detected_side,
        "detail": outcome.detail,
        "verdict": match &verdict {
            Ok(()) => "captured".to_string(),
            Err(rejection) => rejection.to_string(),
        },
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    verdict.map_err(Into::into)
}

// ── ocr ────────────────────────────────────────────────────────────────

fn run_ocr(args: &VerifyArgs, config: &CaptureConfig) -> CliResult<()> {
    let side = Side::from(args.side);
    let image = pipeline::prepare_upload(&args.image, config)?;
    let extraction = runtime()?.block_on(local_ocr(&args.lang).extract(side, &image))?;
    println!("{}", serde_json::to_string_pretty(&extraction)?);
    Ok(())
}

// ── scan ───────────────────────────────────────────────────────────────

fn run_scan(args: &ScanArgs, config: CaptureConfig) -> CliResult<()> {
    let source = ImageSequenceSource::from_dir(&args.frames)?;
    if source.is_empty() {
        return Err(format!("no image files in {}", args.frames.display()).into());
    }
    let service = local_service(&args.lang);
    let deadline = Duration::from_secs(args.max_seconds);
    runtime()?.block_on(scan(config, source, service, deadline))
}

async fn scan(
    config: CaptureConfig,
    source: ImageSequenceSource,
    service: Arc<dyn VerificationService>,
    deadline: Duration,
) -> CliResult<()> {
    let (controller, mut events) = CaptureController::new(config, source, service);
    controller.start_scan(Side::Front)?;

    let watch = async {
        while let Some(event) = events.recv().await {
            print_event(&event);
            match event {
                CaptureEvent::Completed {
                    side: Side::Back, ..
                } => return Ok(()),
                CaptureEvent::Failed { reason, .. } => return Err(reason),
                _ => {}
            }
        }
        Ok(())
    };

    match tokio::time::timeout(deadline, watch).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(reason.into()),
        Err(_) => {
            controller.abandon();
            Err(format!("no complete capture within {}s", deadline.as_secs()).into())
        }
    }
}

fn print_event(event: &CaptureEvent) {
    match event {
        CaptureEvent::Started { session, side } => println!("{session} {side}: started"),
        CaptureEvent::Progress {
            session,
            side,
            state,
            remaining_ms,
        } => match remaining_ms {
            Some(ms) => println!("{session} {side}: {state:?}, {ms} ms to capture"),
            None => log::debug!("{session} {side}: {state:?}"),
        },
        CaptureEvent::Locked { session, side } => println!("{session} {side}: captured, verifying"),
        CaptureEvent::Completed {
            session,
            side,
            image,
        } => println!(
            "{session} {side}: verified ({}x{}, rectified: {})",
            image.width, image.height, image.rectified
        ),
        CaptureEvent::Failed {
            session,
            side,
            reason,
        } => println!("{session} {side}: failed: {reason}"),
    }
}
