//! Device Bridge CLI
//!
//! Drives the device event bridge against the simulated device.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, RecvTimeoutError, Select};
use device_event_bridge::{
    config::{Config, SensorSelection},
    registry::{self, methods, APP_ID_ARGUMENT, APP_MANAGER_CHANNEL},
    stats::create_shared_stats,
    ChannelEvent, ChannelSink, MethodCall, Registry, SamplingOptions, SensorBackend, SensorType,
    SharedStats, SimulatedAppManager, SimulatedSensorBackend, StreamEvent, VERSION,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Application brought to the foreground when the simulated device boots.
const BOOT_APP: &str = "org.example.clock";

#[derive(Parser)]
#[command(name = "device-bridge")]
#[command(version = VERSION)]
#[command(about = "Device sensor and application lifecycle bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List stream channels and request methods
    Channels,

    /// Listen to sensor streams and print readings
    Sensors {
        /// Sensors to listen to (accelerometer, gyroscope, user_accel, magnetometer, or all)
        #[arg(long)]
        sensors: Option<String>,

        /// Stop after this many readings
        #[arg(long)]
        count: Option<usize>,

        /// Sampling interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Query the application manager
    Apps {
        #[command(subcommand)]
        action: AppsAction,
    },

    /// Print application launch and terminate events
    WatchApps {
        /// Stop after this many events
        #[arg(long)]
        events: Option<usize>,
    },

    /// Show supported sensors and sink settings
    Status,

    /// Show configuration
    Config,
}

#[derive(Subcommand)]
enum AppsAction {
    /// Id of the foreground application
    Current,
    /// All installed applications
    List,
    /// Details of one application
    Info { app_id: String },
    /// Whether an application is running
    Running { app_id: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    init_tracing(&config.log_filter);

    match cli.command {
        Commands::Channels => cmd_channels(),
        Commands::Sensors {
            sensors,
            count,
            interval_ms,
        } => cmd_sensors(&config, sensors.as_deref(), count, interval_ms),
        Commands::Apps { action } => cmd_apps(action),
        Commands::WatchApps { events } => cmd_watch_apps(&config, events),
        Commands::Status => cmd_status(&config),
        Commands::Config => cmd_config(&config),
    }
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Boot the simulated application manager with one app in the foreground.
fn simulated_device() -> anyhow::Result<Arc<SimulatedAppManager>> {
    let apps = Arc::new(SimulatedAppManager::with_demo_apps());
    apps.launch(BOOT_APP)
        .with_context(|| format!("Failed to launch {BOOT_APP}"))?;
    Ok(apps)
}

fn build_registry(
    apps: Arc<SimulatedAppManager>,
    options: SamplingOptions,
    stats: SharedStats,
) -> Registry {
    Registry::new(
        Arc::new(SimulatedSensorBackend::periodic()),
        apps,
        options,
        stats,
    )
}

fn cmd_channels() -> anyhow::Result<()> {
    let bridge = build_registry(
        simulated_device()?,
        SamplingOptions::default(),
        create_shared_stats(),
    );

    println!("Stream channels:");
    for channel in bridge.stream_channels() {
        println!("  {channel}");
    }
    println!();
    println!("Request channel: {APP_MANAGER_CHANNEL}");
    for method in bridge.method_names() {
        println!("  {method}");
    }
    Ok(())
}

fn cmd_sensors(
    config: &Config,
    sensors: Option<&str>,
    count: Option<usize>,
    interval_ms: Option<u64>,
) -> anyhow::Result<()> {
    let selection = sensors
        .map(SensorSelection::from_csv)
        .unwrap_or_else(|| config.sensors.clone());
    if !selection.any_enabled() {
        bail!("At least one sensor must be selected");
    }

    let options = match interval_ms {
        Some(ms) => SamplingOptions::new(Duration::from_millis(ms)),
        None => config.sampling_options(),
    };

    let stats = create_shared_stats();
    let bridge = build_registry(simulated_device()?, options, stats.clone());

    println!("Device Bridge v{VERSION}");
    println!("  Interval: {}ms", options.interval.as_millis());
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let mut listening: Vec<(SensorType, Receiver<StreamEvent<ChannelEvent>>)> = Vec::new();
    for sensor in selection.selected() {
        let (sink, receiver) = ChannelSink::<ChannelEvent>::new(config.channel_capacity);
        let sink = Arc::new(sink.with_stats(stats.clone()));
        match bridge.listen(registry::sensor_channel(sensor), sink) {
            Ok(()) => listening.push((sensor, receiver)),
            Err(e) => eprintln!("Warning: {sensor} unavailable: {e}"),
        }
    }
    if listening.is_empty() {
        bail!("No selected sensor could be started");
    }

    let mut select = Select::new();
    for (_, receiver) in &listening {
        select.recv(receiver);
    }

    let mut live = listening.len();
    let mut received = 0usize;
    while live > 0 && running.load(Ordering::SeqCst) && count.map_or(true, |n| received < n) {
        let Ok(operation) = select.select_timeout(Duration::from_millis(100)) else {
            continue;
        };
        let index = operation.index();
        let (sensor, receiver) = &listening[index];
        match operation.recv(receiver) {
            Ok(StreamEvent::Data(ChannelEvent::Reading(reading))) => {
                received += 1;
                println!(
                    "[{}] {:<13} x={:>8.4} y={:>8.4} z={:>8.4} |v|={:.4}",
                    chrono::Local::now().format("%H:%M:%S%.3f"),
                    sensor.name(),
                    reading.x,
                    reading.y,
                    reading.z,
                    reading.magnitude()
                );
            }
            Ok(StreamEvent::Data(other)) => {
                tracing::warn!(?other, "unexpected event on sensor channel");
            }
            Ok(StreamEvent::Error(e)) => eprintln!("{sensor}: {e}"),
            Err(_) => {
                eprintln!("{sensor} stream disconnected unexpectedly");
                select.remove(index);
                live -= 1;
            }
        }
    }

    println!();
    println!("Stopping...");
    for (sensor, _) in &listening {
        bridge.cancel(registry::sensor_channel(*sensor))?;
    }

    println!();
    println!("Session Statistics:");
    println!("{}", stats.snapshot());
    Ok(())
}

fn cmd_apps(action: AppsAction) -> anyhow::Result<()> {
    let bridge = build_registry(
        simulated_device()?,
        SamplingOptions::default(),
        create_shared_stats(),
    );

    let call = match action {
        AppsAction::Current => MethodCall::new(methods::GET_CURRENT_APP_ID, Value::Null),
        AppsAction::List => MethodCall::new(methods::GET_INSTALLED_APPS, Value::Null),
        AppsAction::Info { app_id } => {
            MethodCall::new(methods::GET_APP_INFO, json!({ APP_ID_ARGUMENT: app_id }))
        }
        AppsAction::Running { app_id } => {
            MethodCall::new(methods::IS_RUNNING, json!({ APP_ID_ARGUMENT: app_id }))
        }
    };

    match bridge.invoke(&call) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(e) => bail!("{} failed: {e}", call.method),
    }
}

fn cmd_watch_apps(config: &Config, events: Option<usize>) -> anyhow::Result<()> {
    let apps = simulated_device()?;
    let stats = create_shared_stats();
    let bridge = build_registry(apps.clone(), SamplingOptions::default(), stats.clone());

    let (sink, receiver) = ChannelSink::<ChannelEvent>::new(config.channel_capacity);
    let sink = Arc::new(sink.with_stats(stats.clone()));
    bridge.listen(registry::APP_LAUNCHED_CHANNEL, sink.clone())?;
    bridge.listen(registry::APP_TERMINATED_CHANNEL, sink)?;

    println!("Watching application lifecycle events");
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    // Scripted activity on the simulated device
    let script = {
        let running = running.clone();
        let apps = apps.clone();
        thread::spawn(move || {
            let ids = [
                "org.example.gallery",
                "org.example.weather",
                "org.example.settings",
            ];
            for id in ids.iter().cycle() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(e) = apps.launch(id) {
                    tracing::warn!(app_id = %id, error = %e, "scripted launch failed");
                }
                thread::sleep(Duration::from_millis(400));
                if let Err(e) = apps.terminate(id) {
                    tracing::warn!(app_id = %id, error = %e, "scripted terminate failed");
                }
                thread::sleep(Duration::from_millis(400));
            }
        })
    };

    let mut received = 0usize;
    while running.load(Ordering::SeqCst) && events.map_or(true, |n| received < n) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(StreamEvent::Data(ChannelEvent::App(event))) => {
                received += 1;
                println!(
                    "[{}] {:<10} {} ({})",
                    chrono::Local::now().format("%H:%M:%S"),
                    event.kind.to_string(),
                    event.app.id,
                    event.app.label
                );
            }
            Ok(StreamEvent::Data(other)) => {
                tracing::warn!(?other, "unexpected event on application channel");
            }
            Ok(StreamEvent::Error(e)) => eprintln!("Error: {e}"),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                eprintln!("Event stream disconnected unexpectedly");
                break;
            }
        }
    }

    running.store(false, Ordering::SeqCst);
    if script.join().is_err() {
        eprintln!("Warning: simulation thread panicked");
    }
    bridge.cancel(registry::APP_LAUNCHED_CHANNEL)?;
    bridge.cancel(registry::APP_TERMINATED_CHANNEL)?;

    println!();
    println!("Session Statistics:");
    println!("{}", stats.snapshot());
    Ok(())
}

fn cmd_status(config: &Config) -> anyhow::Result<()> {
    println!("Device Bridge Status");
    println!("====================");
    println!();

    let backend = SimulatedSensorBackend::manual();
    println!("Sensors:");
    for sensor in SensorType::ALL {
        let supported = backend.is_supported(sensor).unwrap_or(false);
        println!(
            "  {:<13} {}{}",
            sensor.name(),
            if supported { "supported" } else { "unsupported" },
            if config.sensors.contains(sensor) {
                ", selected"
            } else {
                ""
            }
        );
    }
    println!();
    println!(
        "Sampling interval: {}ms",
        config.sampling_options().interval.as_millis()
    );
    println!(
        "Channel capacity: {}",
        config
            .channel_capacity
            .map_or_else(|| "unbounded".to_string(), |c| c.to_string())
    );
    Ok(())
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl+C handler")
}
