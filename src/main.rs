use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use visioncam::{DetectorKind, VisionApp, VisionConfig};

#[derive(Parser, Debug)]
#[command(name = "visioncam")]
#[command(about = "Webcam object detection and hand tracking with live overlays")]
#[command(version)]
#[command(long_about = "Captures a camera stream, runs object detection or hand landmark \
detection on each new frame, and renders mirrored overlays aligned with the video. \
Camera and detector are released on every exit path.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "visioncam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Detection mode, overriding the configuration
    #[arg(short, long, value_name = "MODE", help = "Detection mode: object or hand")]
    mode: Option<DetectorKind>,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting a session")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - build the backends but don't open the camera
    #[arg(long, help = "Perform dry run - build camera and engine backends without starting")]
    dry_run: bool,

    /// Write the final overlay composite to a PNG file on exit
    #[arg(long, value_name = "PNG", help = "Save the last frame with its overlay on exit")]
    snapshot: Option<PathBuf>,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting visioncam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match VisionConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(mode) = args.mode {
        config.detector.mode = mode;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        if args.validate_config {
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
        return Err(e.into());
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let mut app = VisionApp::new(config).map_err(|e| {
        error!("Failed to create application: {}", e);
        e
    })?;
    app.set_snapshot_path(args.snapshot);

    if args.dry_run {
        info!("Dry run mode - backends built but no session started");
        println!("✓ Dry run completed successfully - camera and engine backends ready");
        return Ok(());
    }

    let exit_code = app.run().await.map_err(|e| {
        error!("Session error: {}", e);
        e
    })?;

    info!("visioncam exited with code: {}", exit_code);
    std::process::exit(exit_code);
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("visioncam={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# visioncam configuration file");
    println!("# Every option with its default value. Environment variables");
    println!("# override the file, e.g. VISIONCAM__DETECTOR__MODE=hand");
    println!();
    print!("{}", toml::to_string_pretty(&VisionConfig::default())?);
    Ok(())
}
