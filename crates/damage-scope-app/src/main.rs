use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use damage_scope_app::{
    APP_VERSION, AppConfig, AppError, ConfigInput, DEFAULT_OUTPUT_DIR, DEFAULT_SERVICE_URL,
    FONT_ENV, OUTPUT_DIR_ENV, SERVICE_URL_ENV, TICKS_PER_SECOND_ENV, Workbench,
    download_file_name, init_tracing, load_font, read_media_file, write_artifact,
    write_report_images, write_webcam_overlay,
};
use damage_scope_capture::{DEFAULT_TICKS_PER_SECOND, ImageSequenceCamera, SyntheticCamera};
use damage_scope_client::HttpDetectionTransport;
use damage_scope_overlay::LabelFont;
use damage_scope_ui::Tab;
use tracing::info;

#[derive(Parser)]
#[command(name = "damage-scope")]
#[command(about = "Client for the vehicle damage detection service")]
#[command(version = APP_VERSION)]
struct Cli {
    /// Detection service base URL
    #[arg(long, global = true, env = SERVICE_URL_ENV, default_value = DEFAULT_SERVICE_URL)]
    service_url: String,

    /// TTF/OTF font overriding the bundled label font
    #[arg(long, global = true, env = FONT_ENV)]
    font: Option<PathBuf>,

    /// Directory receiving annotated images and downloads
    #[arg(long, global = true, env = OUTPUT_DIR_ENV, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Webcam capture-and-detect ticks per second
    #[arg(long, global = true, env = TICKS_PER_SECOND_ENV, default_value_t = DEFAULT_TICKS_PER_SECOND)]
    ticks_per_second: u32,

    /// Export annotated images as PNG instead of JPEG
    #[arg(long, global = true)]
    png: bool,

    /// Log at info level when RUST_LOG is unset
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze 1 to 5 images and write annotated reports
    Images {
        /// Image files, one per slot
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Analyze one video and print its damage summary
    Video {
        /// Video file
        file: PathBuf,

        /// Download the processed video into the output directory
        #[arg(long)]
        download: bool,
    },

    /// Replay a directory of stills as a webcam and run live detection
    Webcam {
        /// Directory of jpg/png frames, played in file-name order
        #[arg(long)]
        frames: PathBuf,

        /// How long to run live detection
        #[arg(long, default_value = "5")]
        seconds: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = AppConfig::resolve(ConfigInput {
        service_url: cli.service_url,
        font: cli.font,
        output_dir: cli.output_dir,
        ticks_per_second: cli.ticks_per_second,
        png: cli.png,
    })?;
    let font = load_font(config.font.as_deref())?;
    let transport = Arc::new(HttpDetectionTransport::new(config.endpoint.clone())?);
    info!(service = %config.endpoint.base(), version = APP_VERSION, "damage-scope starting");

    match cli.command {
        Commands::Images { files } => run_images(&config, transport, font, files),
        Commands::Video { file, download } => run_video(&config, transport, font, file, download),
        Commands::Webcam { frames, seconds } => {
            run_webcam(&config, transport, font, frames, seconds)
        }
    }
}

fn run_images(
    config: &AppConfig,
    transport: Arc<HttpDetectionTransport>,
    font: Option<LabelFont>,
    files: Vec<PathBuf>,
) -> Result<(), AppError> {
    // No camera in this mode.
    let camera = Arc::new(SyntheticCamera::unavailable());
    let mut workbench = Workbench::new(config, transport, camera, font);

    workbench.configure_images(files.len())?;
    for (index, path) in files.iter().enumerate() {
        workbench.select_image(index, read_media_file(path)?)?;
    }

    let cards = workbench.submit_images()?;
    for card in cards {
        println!("{}", card.title);
        for entry in &card.report.damage_list {
            match entry.detail() {
                Some(detail) => println!("  {}  {detail}", entry.label),
                None => println!("  {}", entry.label),
            }
        }
    }

    for path in write_report_images(cards, &config.output_dir)? {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn run_video(
    config: &AppConfig,
    transport: Arc<HttpDetectionTransport>,
    font: Option<LabelFont>,
    file: PathBuf,
    download: bool,
) -> Result<(), AppError> {
    let camera = Arc::new(SyntheticCamera::unavailable());
    let mut workbench = Workbench::new(config, transport.clone(), camera, font);
    workbench.switch_tab(Tab::Video);

    workbench.select_video(read_media_file(&file)?)?;
    let outcome = workbench.submit_video()?;

    println!("Detected Damages:");
    for line in &outcome.summary {
        match &line.detail {
            Some(detail) => println!("  {}  {detail}", line.label),
            None => println!("  {}", line.label),
        }
    }
    println!("video: {}", outcome.video_url);

    if download {
        let bytes = transport.fetch_asset(outcome.video_url.as_str())?;
        let path = write_artifact(
            &config.output_dir,
            &download_file_name(&outcome.video_url),
            &bytes,
        )?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn run_webcam(
    config: &AppConfig,
    transport: Arc<HttpDetectionTransport>,
    font: Option<LabelFont>,
    frames: PathBuf,
    seconds: u64,
) -> Result<(), AppError> {
    let camera = Arc::new(ImageSequenceCamera::new(frames));
    let mut workbench = Workbench::new(config, transport, camera, font);
    workbench.switch_tab(Tab::Webcam);

    workbench.start_webcam()?;
    std::thread::sleep(Duration::from_secs(seconds));

    let labels = workbench.webcam().labels();
    let overlay = write_webcam_overlay(workbench.webcam(), &config.output_dir)?;
    workbench.stop_webcam();

    if labels.is_empty() {
        println!("No damage detected");
    }
    for entry in labels {
        println!("  {}  {}", entry.label, entry.status);
    }
    println!("wrote {}", overlay.display());
    Ok(())
}
