use anyhow::{Context, Result};
use clap::Parser;
use doorbell::notify::UnavailablePublisher;
use doorbell::{
    CommandCapture, CommandDisplay, Credentials, DebounceWindows, DoorbellConfig,
    DoorbellController, EdgeSource, EventBus, KeyboardInputHandler, MessagePublisher,
    MqttPublisher, ProcessLauncher, S3ObjectStore, SessionControls, SoftwareEdgeSource,
    TriggerArbiter,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser, Debug)]
#[command(name = "doorbell")]
#[command(about = "Smart doorbell that turns motion or button rings into video calls")]
#[command(version)]
#[command(long_about = "Watches a PIR motion sensor and a push button on the Raspberry Pi GPIO \
header. Each ring captures an evidence photo, uploads it to object storage, publishes a ring \
message to the MQTT broker and opens a video call on the attached display.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "doorbell.toml", help = "Path to TOML configuration file")]
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

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting the system")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Also write logs to daily files in this directory
    #[arg(long, value_name = "DIR", help = "Directory for daily rotated log files")]
    log_file: Option<String>,

    /// Drive triggers from the keyboard instead of GPIO
    #[arg(long, help = "Simulate the motion sensor and button from the keyboard")]
    simulate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Held until exit so buffered file logs are flushed
    let log_guard = init_logging(&args)?;

    info!("Starting doorbell v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match DoorbellConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        eprintln!("✗ Configuration validation failed: {}", e);
        std::process::exit(1);
    }
    let issues = config.readiness_issues();
    if args.validate_config {
        if !issues.is_empty() {
            for issue in &issues {
                error!("Configuration not ready: {}", issue);
                eprintln!("✗ {}", issue);
            }
            std::process::exit(1);
        }
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }
    for issue in &issues {
        warn!("Configuration not ready: {}", issue);
    }

    let credentials = Credentials::load(&config.storage, &config.broker)
        .context("Failed to load credentials")?;

    let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
    let controls = SessionControls::new();

    let capture = Arc::new(CommandCapture::new(&config.capture));
    let store = Arc::new(S3ObjectStore::new(
        &config.storage,
        credentials.storage.as_ref(),
    ));
    let publisher: Arc<dyn MessagePublisher> =
        match MqttPublisher::connect(&config.broker, &credentials.broker).await {
            Ok(publisher) => Arc::new(publisher),
            Err(e) => {
                error!("Broker client unavailable, rings will not be announced: {}", e);
                Arc::new(UnavailablePublisher::new(e.to_string()))
            }
        };
    let launcher = Arc::new(ProcessLauncher::new(&config.call));
    let display = Arc::new(CommandDisplay::new(&config.display));

    let windows = DebounceWindows {
        motion: config.device.motion_debounce(),
        button: config.device.button_debounce(),
    };

    let mut keyboard = None;
    let (motion, button): (Arc<dyn EdgeSource>, Arc<dyn EdgeSource>) = if args.simulate {
        warn!("Simulation mode: space rings the button, 'm' fires motion, 'e' ends a call, 'q' quits");
        let motion = Arc::new(SoftwareEdgeSource::new("simulated motion sensor"));
        let button = Arc::new(SoftwareEdgeSource::new("simulated button"));
        keyboard = Some(KeyboardInputHandler::new(
            Arc::clone(&motion),
            Arc::clone(&button),
            controls.clone(),
        ));
        (motion as Arc<dyn EdgeSource>, button as Arc<dyn EdgeSource>)
    } else {
        open_gpio_sources(&config)?
    };

    let (arbiter, triggers) = TriggerArbiter::new(motion, button, windows);
    let arbiter = Arc::new(arbiter.with_event_bus(Arc::clone(&event_bus)));

    let mut builder = DoorbellController::builder()
        .with_config(config)
        .with_event_bus(event_bus)
        .with_arbiter(arbiter, triggers)
        .with_capture(capture)
        .with_store(store)
        .with_publisher(publisher)
        .with_launcher(launcher)
        .with_display(display)
        .with_controls(controls);
    if let Some(handler) = keyboard {
        builder = builder.with_keyboard(handler);
    }

    let mut controller = builder.build().map_err(|e| {
        error!("Failed to create controller: {}", e);
        e
    })?;

    controller.start().await.map_err(|e| {
        error!("Failed to start doorbell: {}", e);
        e
    })?;

    let exit_code = controller.run().await.map_err(|e| {
        error!("Doorbell error during execution: {}", e);
        e
    })?;

    // Releases the GPIO pins before the process exits
    drop(controller);

    info!("Doorbell exited with code: {}", exit_code);
    drop(log_guard);
    std::process::exit(exit_code);
}

#[cfg(all(feature = "gpio", target_os = "linux"))]
fn open_gpio_sources(config: &DoorbellConfig) -> Result<(Arc<dyn EdgeSource>, Arc<dyn EdgeSource>)> {
    use doorbell::trigger::GpioEdgeSource;
    use rppal::gpio::Gpio;

    let gpio = Gpio::new().context("Failed to open the GPIO controller")?;
    let motion = GpioEdgeSource::open(&gpio, config.device.motion_pin, "motion sensor")?;
    let button = GpioEdgeSource::open(&gpio, config.device.button_pin, "button")?;
    let motion: Arc<dyn EdgeSource> = Arc::new(motion);
    let button: Arc<dyn EdgeSource> = Arc::new(button);
    Ok((motion, button))
}

#[cfg(not(all(feature = "gpio", target_os = "linux")))]
fn open_gpio_sources(_config: &DoorbellConfig) -> Result<(Arc<dyn EdgeSource>, Arc<dyn EdgeSource>)> {
    anyhow::bail!("Built without GPIO support; run with --simulate")
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
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
        .unwrap_or_else(|_| EnvFilter::new(format!("doorbell={}", log_level)));

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

    let (file_layer, guard) = match args.log_file.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(Path::new(dir), "doorbell.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(file_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Doorbell Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Set device.id to the room name before the first ring");
    println!();

    let rendered = toml::to_string_pretty(&DoorbellConfig::default())
        .context("Failed to render default configuration")?;
    println!("{}", rendered);
    Ok(())
}
