use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use display_info::DisplayInfo;
use sysinfo::System;

use pacman_perception::capture::{CapturedFrame, WindowCapturer, WindowEnumerator, XcapWindows};
use pacman_perception::detection::{BoardAssembler, CaptureScheduler, TileClassifier};
use pacman_perception::messaging::{EventSink, PerceptionEvent};
use pacman_perception::preprocessing::{CanonicalFrame, FramePreprocessor, GameGeometry};
use pacman_perception::scheduler::{Clock, ShutdownSignal, SystemClock};
use pacman_perception::session::{PerceptionSession, SessionExit};
use pacman_perception::state::{AcquisitionOutcome, AcquisitionStateMachine};
use pacman_perception::{AppResult, Config};

const LOG_TARGET_STARTUP: &str = "pacman_perception::startup";

#[derive(Parser)]
#[command(name = "pacman-perception", version, about = "Watch a Pac-Man window and classify its maze")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Acquire the game window and classify frames until Ctrl+C
    Run {
        /// Print every board as ASCII
        #[arg(long)]
        print_boards: bool,
    },

    /// List on-screen windows
    Windows,

    /// Capture one frame, save the canonical image and print its board
    Snapshot {
        #[arg(long, default_value = "snapshot.png")]
        out: PathBuf,
    },

    /// Classify an image file offline
    Classify {
        image: PathBuf,

        /// Backing scale factor of a raw screenshot
        #[arg(long, default_value_t = 1.0)]
        scale: f64,

        /// Treat the image as a raw window screenshot and preprocess it first
        #[arg(long)]
        raw: bool,
    },
}

/// Initialize tracing with file rotation
///
/// Logs are written to:
/// - macOS: ~/Library/Application Support/PacmanPerception/logs/
/// - Windows: %APPDATA%/PacmanPerception/logs/
/// - Linux: ~/.config/PacmanPerception/logs/
///
/// Log output:
/// - Debug builds: Console (stderr) + File
/// - Release builds: File only
fn initialize_tracing() {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = Config::app_dir()
        .map(|dir| dir.join("logs"))
        .unwrap_or_else(|_| PathBuf::from("logs"));

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    // Create file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "pacman-perception.log");

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true);

    // Boards go to stdout, so the console log uses stderr
    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
}

fn log_runtime_environment() {
    let version = env!("CARGO_PKG_VERSION");
    let os_name = System::long_os_version()
        .or_else(System::name)
        .unwrap_or_else(|| "Unknown OS".to_string());
    let kernel = System::kernel_version().unwrap_or_else(|| "Unknown Kernel".to_string());
    let architecture = std::env::consts::ARCH;

    tracing::info!(target: LOG_TARGET_STARTUP, "Starting Pac-Man Perception v{} on ({})", version, architecture);
    tracing::info!(target: LOG_TARGET_STARTUP, "Operating System: {} (kernel {})", os_name, kernel);

    if let Ok(displays) = DisplayInfo::all() {
        tracing::info!(target: LOG_TARGET_STARTUP, "Displays: {} detected", displays.len());
        for (index, disp) in displays.iter().enumerate() {
            tracing::debug!(
                target: LOG_TARGET_STARTUP,
                "  Display {}: {}x{} @{}x{}",
                index,
                disp.width,
                disp.height,
                disp.scale_factor,
                if disp.is_primary { " (primary)" } else { "" }
            );
        }
    }
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();

    initialize_tracing();
    log_runtime_environment();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Run { print_boards } => run(&config, print_boards),
        Command::Windows => list_windows(&config),
        Command::Snapshot { out } => snapshot(&config, &out),
        Command::Classify { image, scale, raw } => classify_file(&config, &image, scale, raw),
    }
}

fn load_classifier(config: &Config) -> AppResult<TileClassifier> {
    TileClassifier::load_model(config.model_path.as_deref()).context("Failed to load tile model")
}

fn preprocessor(config: &Config) -> FramePreprocessor {
    FramePreprocessor::new(GameGeometry::ARCADE, config.borders())
}

/// Acquire and capture until Ctrl+C
fn run(config: &Config, print_boards: bool) -> AppResult<()> {
    // Model problems are fatal and must surface before capture starts
    let classifier = load_classifier(config)?;

    let (sink, events) = EventSink::channel();
    let consumer = thread::Builder::new()
        .name("board-consumer".to_string())
        .spawn(move || {
            let mut boards = 0u64;
            for event in events {
                match &event {
                    PerceptionEvent::BoardProduced(board) => {
                        boards += 1;
                        tracing::debug!("{}", event.description());
                        if print_boards {
                            println!("{}", board);
                        }
                    }
                    PerceptionEvent::WindowAcquired(_) => tracing::info!("{}", event.description()),
                    PerceptionEvent::AcquisitionFailed { .. } => tracing::warn!("{}", event.description()),
                }
            }
            boards
        })
        .context("Failed to spawn event consumer")?;

    let acquisition = AcquisitionStateMachine::with_timing(
        XcapWindows::new(),
        config.target(),
        sink.clone(),
        config.poll_interval(),
        config.acquisition_timeout(),
    );
    let capture = CaptureScheduler::with_interval(
        XcapWindows::new(),
        preprocessor(config),
        BoardAssembler::new(classifier, config.layout()),
        sink,
        config.capture_interval(),
    );
    let mut session = PerceptionSession::new(acquisition, capture, SystemClock)
        .with_restart_on_timeout(config.restart_on_timeout);

    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_clone = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        tracing::info!("Shutting down...");
        shutdown_clone.trigger();
    })
    .context("Failed to set Ctrl+C handler")?;

    tracing::info!("Press Ctrl+C to quit");
    session.start();
    let exit = session.run(&shutdown);

    session.capture().stats().report(config.capture_interval());
    tracing::info!(
        "Capture summary: {} boards delivered, {} ticks missed",
        session.capture().delivered(),
        session.capture().missed()
    );

    // Dropping the session closes the channel and ends the consumer
    drop(session);
    match consumer.join() {
        Ok(boards) => tracing::info!("✓ Consumer received {} boards", boards),
        Err(_) => tracing::warn!("Event consumer panicked"),
    }

    if exit == SessionExit::AcquisitionFailed {
        bail!(
            "Window \"{}\" of {} did not appear within {} ms",
            config.window_title,
            config.app_name,
            config.acquisition_timeout_ms
        );
    }
    Ok(())
}

/// Print every on-screen window, marking the configured target
fn list_windows(config: &Config) -> AppResult<()> {
    let target = config.target();
    let windows = XcapWindows::new()
        .on_screen_windows()
        .context("Failed to enumerate windows")?;

    println!("{} windows on screen:", windows.len());
    for window in &windows {
        println!(
            "{} {:>8}  {:<24} {:<40} {}x{} at {},{}",
            if target.matches(window) { "*" } else { " " },
            window.id,
            window.app_name,
            window.title,
            window.bounds.width,
            window.bounds.height,
            window.bounds.x,
            window.bounds.y
        );
    }
    Ok(())
}

/// Acquire the window, capture one frame and save its canonical image
fn snapshot(config: &Config, out: &Path) -> AppResult<()> {
    let classifier = load_classifier(config)?;
    let clock = SystemClock;
    let shutdown = ShutdownSignal::new();

    let mut acquisition = AcquisitionStateMachine::with_timing(
        XcapWindows::new(),
        config.target(),
        EventSink::detached(),
        config.poll_interval(),
        config.acquisition_timeout(),
    );
    acquisition.start(clock.now());

    let window = loop {
        let Some(deadline) = acquisition.next_deadline() else {
            bail!("Window acquisition stopped unexpectedly");
        };
        clock.sleep_until(deadline, &shutdown);
        match acquisition.poll(clock.now()) {
            Some(AcquisitionOutcome::Acquired(window)) => break window,
            Some(AcquisitionOutcome::TimedOut) => {
                bail!("Window \"{}\" not found", config.window_title)
            }
            None => {}
        }
    };

    let raw = XcapWindows::new()
        .capture(window.id)
        .context("Failed to capture window")?;
    let frame = CapturedFrame::from_raw(raw, Instant::now());
    let canonical = preprocessor(config)
        .process(&frame)
        .context("Failed to preprocess frame")?;

    canonical
        .image()
        .save(out)
        .with_context(|| format!("Failed to save {}", out.display()))?;
    tracing::info!("✓ Saved canonical frame to {}", out.display());

    let board = BoardAssembler::new(classifier, config.layout()).assemble(&canonical);
    println!("{}", board);
    println!("{}", board.summary());
    Ok(())
}

/// Classify an image from disk
fn classify_file(config: &Config, path: &Path, scale: f64, raw: bool) -> AppResult<()> {
    let classifier = load_classifier(config)?;
    let image = image::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .to_rgba8();

    let preprocessor = preprocessor(config);
    let canonical = if raw {
        preprocessor
            .process(&CapturedFrame::new(image, scale, Instant::now()))
            .context("Failed to preprocess screenshot")?
    } else {
        CanonicalFrame::new(preprocessor.resize(&image, 1.0), Instant::now())
    };

    let board = BoardAssembler::new(classifier, config.layout()).assemble(&canonical);
    println!("{}", board);
    println!("{}", board.summary());
    Ok(())
}
