//! MQTT IP Reporter - announce and monitor host IP addresses over MQTT
//!
//! This CLI tool provides three operational modes:
//! - **Monitor**: Subscribe to report topics and keep an HTML page of the latest reports
//! - **Publish**: Read an interface's IPv4 address and publish it once as JSON
//! - **Lookup**: Print interface addresses without contacting a broker
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success (including graceful shutdown) |
//! | 1 | Configuration/argument error |
//! | 2 | Connection/authentication/TLS/timeout error |
//! | 3 | File I/O error |
//! | 4 | Interface error |

use clap::Parser;
use std::net::Ipv4Addr;
use std::process::ExitCode;
use tokio::sync::broadcast;
use tracing::{error, info};

use mqtt_ip_reporter::cli::{Args, Mode};
use mqtt_ip_reporter::config::{ConfigFile, PublisherSettings};
use mqtt_ip_reporter::error::ReporterError;
use mqtt_ip_reporter::interface::{interface_ipv4, ipv4_interfaces};
use mqtt_ip_reporter::logging::init_logging;
use mqtt_ip_reporter::monitor::Monitor;
use mqtt_ip_reporter::mqtt::MqttClient;
use mqtt_ip_reporter::publisher::{IpReport, Publisher};

/// Exit code for success (including graceful shutdown)
const EXIT_SUCCESS: u8 = 0;
/// Exit code for configuration/argument errors
const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for connection/authentication errors
const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for file I/O errors
const EXIT_IO_ERROR: u8 = 3;
/// Exit code for interface lookup errors
const EXIT_INTERFACE_ERROR: u8 = 4;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = args.validate().map_err(ReporterError::InvalidArgument) {
        eprintln!("Error: {}", e);
        eprintln!("  Hint: Use --help for usage information");
        return ExitCode::from(error_to_exit_code(&e));
    }

    let result = match args.mode {
        Mode::Monitor => run_monitor_mode(&args).await,
        Mode::Publish => run_publish_mode(&args).await,
        Mode::Lookup => run_lookup_mode(&args),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        // Error message already printed or logged by the mode handler
        Err(e) => ExitCode::from(error_to_exit_code(&e)),
    }
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM signals.
async fn wait_for_shutdown_signal() -> Result<(), ReporterError> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).map_err(ReporterError::Io)?;
        let mut sigterm = signal(SignalKind::terminate()).map_err(ReporterError::Io)?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, initiating graceful shutdown...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map_err(ReporterError::Io)?;
        info!("Received Ctrl+C, initiating graceful shutdown...");
    }

    Ok(())
}

/// Load the config file, reporting failures on stderr since logging is not
/// set up yet.
fn load_config(args: &Args) -> Result<ConfigFile, ReporterError> {
    ConfigFile::load(&args.config_file_path).map_err(|e| {
        eprintln!("Error: {}", e);
        if matches!(e, ReporterError::ConfigNotFound(_)) {
            eprintln!("  Hint: Pass the config file with -c/--config_file_path");
        }
        e
    })
}

/// Run in monitor mode until SIGINT/SIGTERM.
async fn run_monitor_mode(args: &Args) -> Result<(), ReporterError> {
    let settings = load_config(args)?.monitor_settings().map_err(|e| {
        eprintln!("Error: {}", e);
        e
    })?;

    init_logging(Some(&settings.log_file_name)).map_err(|e| {
        eprintln!(
            "Error: Failed to open log file {}: {}",
            settings.log_file_name.display(),
            e
        );
        e
    })?;

    info!(
        "Starting monitor: {} topic(s), page {} every {}s, {} entries max",
        settings.broker.topics.len(),
        settings.html_file_name.display(),
        settings.sleep_time.as_secs(),
        settings.msg_truncate_value
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let shutdown_tx_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!("Error setting up signal handler: {}", e);
        }
        let _ = shutdown_tx_signal.send(());
    });

    let client = MqttClient::new(settings.broker.client.clone())
        .await
        .map_err(|e| {
            error!("Failed to create MQTT client: {}", e);
            e
        })?;

    let renders = Monitor::new(settings, client)
        .run(shutdown_rx)
        .await
        .map_err(|e| {
            error!("Connection failed: {}", e);
            error!("  Hint: Verify the broker is running and the host/port/credentials are correct");
            e
        })?;

    info!("Monitor complete. {} page render(s).", renders);
    Ok(())
}

/// Publish this host's address once and exit.
async fn run_publish_mode(args: &Args) -> Result<(), ReporterError> {
    let mut config = load_config(args)?;
    if let Some(ifname) = &args.ifname {
        config.ifname = Some(ifname.clone());
    }
    if let Some(topics) = args.topic_override() {
        config.topic_list = Some(topics);
    }

    let settings = config.publisher_settings().map_err(|e| {
        eprintln!("Error: {}", e);
        e
    })?;

    init_logging(Some(&settings.log_file_name)).map_err(|e| {
        eprintln!(
            "Error: Failed to open log file {}: {}",
            settings.log_file_name.display(),
            e
        );
        e
    })?;

    publish_report(&settings).await
}

/// Resolve the interface address and publish it to every configured topic.
async fn publish_report(settings: &PublisherSettings) -> Result<(), ReporterError> {
    let ip = interface_ipv4(&settings.ifname).map_err(|e| {
        error!("{}", e);
        e
    })?;
    info!("IP address on {}: {}", settings.ifname, ip);

    let client = MqttClient::new(settings.broker.client.clone())
        .await
        .map_err(|e| {
            error!("Failed to create MQTT client: {}", e);
            e
        })?;
    info!(
        "[{}] Connecting to MQTT broker at {}:{}",
        settings.broker.name, settings.broker.client.host, settings.broker.client.port
    );

    let publisher = Publisher::new(
        client,
        settings.broker.topics.clone(),
        settings.publish_qos,
        settings.broker.connect_timeout,
    );
    let confirmed = publisher.run(&IpReport::now(ip)).await.map_err(|e| {
        error!("Publish failed: {}", e);
        e
    })?;

    info!("Publish complete. {} message(s) confirmed.", confirmed);
    Ok(())
}

/// Print interface addresses. Never touches the broker.
fn run_lookup_mode(args: &Args) -> Result<(), ReporterError> {
    // Console-only logging; lookup writes its results to stdout.
    let _ = init_logging(None);

    let ifname = match &args.ifname {
        Some(name) => Some(name.clone()),
        None => match ConfigFile::load(&args.config_file_path) {
            Ok(config) => config.ifname,
            Err(ReporterError::ConfigNotFound(_)) => None,
            Err(e) => {
                eprintln!("Error: {}", e);
                return Err(e);
            }
        },
    };

    match ifname {
        Some(name) => {
            let ip = interface_ipv4(&name).map_err(|e| {
                eprintln!("Error: {}", e);
                e
            })?;
            println!("{}", ip);
        }
        None => print_interfaces(ipv4_interfaces())?,
    }

    Ok(())
}

/// Print one `name<TAB>address` line per interface, or report the listing failure.
fn print_interfaces(
    interfaces: Result<Vec<(String, Ipv4Addr)>, ReporterError>,
) -> Result<(), ReporterError> {
    let interfaces = interfaces.map_err(|e| {
        eprintln!("Error: {}", e);
        e
    })?;
    for (name, ip) in interfaces {
        println!("{}\t{}", name, ip);
    }
    Ok(())
}

/// Convert an error to the appropriate exit code.
fn error_to_exit_code(error: &ReporterError) -> u8 {
    match error {
        ReporterError::InvalidArgument(_) => EXIT_CONFIG_ERROR,
        ReporterError::Config(_) => EXIT_CONFIG_ERROR,
        ReporterError::ConfigNotFound(_) => EXIT_CONFIG_ERROR,
        ReporterError::Json(_) => EXIT_CONFIG_ERROR,
        ReporterError::Connection(_) => EXIT_CONNECTION_ERROR,
        ReporterError::Client(_) => EXIT_CONNECTION_ERROR,
        ReporterError::Tls(_) => EXIT_CONNECTION_ERROR,
        ReporterError::Timeout(_) => EXIT_CONNECTION_ERROR,
        ReporterError::Io(_) => EXIT_IO_ERROR,
        ReporterError::Interface(_) => EXIT_INTERFACE_ERROR,
    }
}
