use anyhow::Result;
use clap::Parser;
use poetrycam::camera::{default_backend, FeedController};
use poetrycam::{
    InferenceClient, KeyboardInputHandler, OllamaClient, PoetryCamApp, PoetryCamConfig, StatusView,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "poetrycam")]
#[command(about = "Capture a camera frame and have a local vision model write a poem about it")]
#[command(version)]
#[command(long_about = "Shows a live camera feed in the terminal. Press c or space to capture \
the current frame; it is sent to an Ollama-compatible vision model which answers with a short \
poem. Use n/p or 0-9 to switch cameras, m to type a new model name, s to save the poem \
and q to quit.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "poetrycam.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Write logs to a file instead of stderr
    #[arg(long, value_name = "PATH", help = "Write logs to this file instead of the terminal")]
    log_file: Option<String>,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without opening a camera")]
    validate_config: bool,

    /// Probe cameras and exit
    #[arg(long, help = "List working cameras and exit")]
    list_devices: bool,

    /// Override the vision model
    #[arg(short, long, value_name = "MODEL", help = "Vision model to use, e.g. llava:7b")]
    model: Option<String>,

    /// Override the camera index
    #[arg(long, value_name = "INDEX", help = "Camera index to open (0 for /dev/video0)")]
    device: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting poetrycam v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let mut config = match PoetryCamConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(model) = &args.model {
        config.inference.model = model.clone();
    }
    if let Some(device) = args.device {
        config.camera.device = device;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    if args.list_devices {
        list_devices(&config);
        return Ok(());
    }

    let client = OllamaClient::new(&config.inference)?;
    check_inference_service(&client, &config).await;

    let backend = default_backend(&config.camera);
    let mut app = PoetryCamApp::new(config, backend, Arc::new(client), StatusView::stdout());
    app.start().await?;

    let keyboard = KeyboardInputHandler::new(app.command_sender());
    keyboard.start().await?;

    let result = app.run().await;
    keyboard.stop().await?;

    let reason = result.map_err(|e| {
        error!("System error during execution: {}", e);
        e
    })?;
    info!("poetrycam exited: {:?}", reason);

    Ok(())
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
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
        .unwrap_or_else(|_| EnvFilter::new(format!("poetrycam={}", log_level)));

    // stdout belongs to the status view
    let (writer, guard, ansi) = match &args.log_file {
        Some(path) => {
            let path = Path::new(path);
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), None, true),
    };

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# poetrycam configuration file");
    println!("# Every key can be overridden with POETRYCAM__<SECTION>__<KEY>");
    println!();
    println!("{}", toml::to_string_pretty(&PoetryCamConfig::default())?);
    Ok(())
}

fn list_devices(config: &PoetryCamConfig) {
    let backend = default_backend(&config.camera);
    let backend_name = backend.name();
    let mut feed = FeedController::new(backend, config.camera.clone());

    println!(
        "Probing {} camera indices ({} backend)...",
        config.camera.probe_limit, backend_name
    );
    for device in feed.discover() {
        println!("  camera {} (/dev/video{})", device, device.index());
    }
}

/// Warn early when the inference service is down; captures still fail
/// gracefully later, so this is never fatal
async fn check_inference_service(client: &OllamaClient, config: &PoetryCamConfig) {
    match client.check_liveness().await {
        Ok(()) => info!("Inference service reachable at {}", client.base_url()),
        Err(e) => {
            warn!("Inference service check failed: {}", e);
            eprintln!("Warning: could not reach Ollama at {}", client.base_url());
            eprintln!("  Install it from https://ollama.ai and start it with 'ollama serve'");
            eprintln!("  Then pull the model with 'ollama pull {}'", config.inference.model);
        }
    }
}
