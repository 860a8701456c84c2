//! Geofence Tracker CLI Application
//!
//! This is the command-line interface for the geofence tracker.
//! It uses the geofence-engine library and adds:
//! - TOML configuration and logging setup
//! - Geofence management commands (add/update/delete/toggle)
//! - Alert history reports
//! - Replay of recorded samples and simulated live tracking

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use geofence_engine::{
    evaluator, AlertType, Coordinate, GeofenceDraft, GeofenceMonitor, GeofenceStore,
    GeofenceType, GeofenceUpdate, JsonFilePersistence, Location, ReplaySource,
    SamplingScheduler, WriteBehindPersistence,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

mod config;
mod notifier;
mod report;
mod simulation;

use config::AppConfig;
use notifier::ConsoleNotifier;
use simulation::SimulatedSource;

/// Geofence Tracker - Watch a device position against geographic regions
#[derive(Parser, Debug)]
#[command(name = "geofence-cli")]
#[command(about = "Evaluate location samples against geofences and raise enter/exit alerts", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Geofence data file (overrides [storage] data_file)
    #[arg(short, long, value_name = "FILE", global = true)]
    data: Option<PathBuf>,

    /// Disable notifications for new alerts
    #[arg(long, global = true)]
    no_notify: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all geofences
    List,

    /// Create a geofence
    Add {
        /// Display name
        #[arg(long)]
        name: String,

        /// factory, school, construction or custom
        #[arg(long = "type", value_name = "TYPE", default_value = "custom")]
        kind: GeofenceType,

        #[arg(long, value_enum, default_value_t = ShapeArg::Circle)]
        shape: ShapeArg,

        /// Center as "lat,lon" (required for circles)
        #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
        center: Option<Coordinate>,

        /// Radius in meters (type default if omitted)
        #[arg(long)]
        radius: Option<f64>,

        /// Polygon vertex as "lat,lon" (repeat in edge order; type template if omitted)
        #[arg(long = "vertex", value_parser = parse_coordinate, allow_hyphen_values = true)]
        vertices: Vec<Coordinate>,

        /// Display color (hex)
        #[arg(long)]
        color: Option<String>,

        /// Assigned user id (can be repeated)
        #[arg(long = "user")]
        users: Vec<String>,

        /// Create the geofence disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Change fields of an existing geofence
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<GeofenceType>,
        #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
        center: Option<Coordinate>,
        #[arg(long)]
        radius: Option<f64>,
        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a geofence and its alerts
    Delete { id: String },

    /// Enable or disable a geofence
    Toggle { id: String },

    /// Show the alert history
    Alerts {
        /// Only show enter or exit alerts
        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<AlertType>,

        /// Show at most this many alerts
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Remove every alert
    ClearAlerts,

    /// Test one position against every geofence (no alerts, no state)
    Check {
        #[arg(allow_hyphen_values = true)]
        latitude: f64,
        #[arg(allow_hyphen_values = true)]
        longitude: f64,
    },

    /// Feed recorded samples (JSON array, null = no sample) through the engine
    Replay { samples: PathBuf },

    /// Track a simulated device on a timer
    Track {
        /// Sampling interval (overrides [tracking] interval_ms)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many samples (overrides [tracking] max_ticks)
        #[arg(long)]
        ticks: Option<u64>,

        /// Seed the simulated device for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShapeArg {
    Circle,
    Polygon,
}

fn parse_coordinate(s: &str) -> std::result::Result<Coordinate, String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got '{}'", s))?;
    let lat: f64 = lat.trim().parse().map_err(|e| format!("bad latitude: {}", e))?;
    let lon: f64 = lon.trim().parse().map_err(|e| format!("bad longitude: {}", e))?;
    let coordinate = Coordinate::new(lat, lon);
    if !coordinate.is_valid() {
        return Err(format!("{} is out of range", coordinate));
    }
    Ok(coordinate)
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Geofence Tracker CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using engine library v{}", geofence_engine::VERSION);

    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    if let Some(data) = &args.data {
        config.storage.data_file = data.clone();
    }
    if args.no_notify {
        config.notifications.enabled = false;
    }

    let mut store = open_store(&config.storage.data_file)?;

    match args.command {
        Command::List => {
            print!("{}", report::render_geofences(store.geofences()));
        }
        Command::Add {
            name,
            kind,
            shape,
            center,
            radius,
            vertices,
            color,
            users,
            disabled,
        } => {
            let mut draft = match shape {
                ShapeArg::Circle => {
                    let Some(center) = center else {
                        bail!("--center is required for circle geofences");
                    };
                    GeofenceDraft::circle(name, kind, center, radius.unwrap_or_else(|| kind.default_radius()))
                }
                ShapeArg::Polygon => {
                    let mut draft = GeofenceDraft::polygon(name, kind, vertices);
                    draft.center = center;
                    draft.radius = radius;
                    draft
                }
            };
            draft.color = color;
            draft.enabled = !disabled;
            draft.assigned_users = users.into_iter().collect();

            let geofence = store.add_geofence(draft).context("Failed to add geofence")?;
            println!("✓ Added {} ({})", geofence.name, geofence.id);
        }
        Command::Update {
            id,
            name,
            kind,
            center,
            radius,
            color,
        } => {
            let update = GeofenceUpdate {
                name,
                kind,
                center,
                radius,
                color,
                ..Default::default()
            };
            let geofence = store
                .update_geofence(&id, update)
                .context("Failed to update geofence")?;
            println!("✓ Updated {} ({})", geofence.name, geofence.id);
        }
        Command::Delete { id } => {
            let removed = store.delete_geofence(&id).context("Failed to delete geofence")?;
            println!("✓ Deleted {} ({})", removed.name, removed.id);
        }
        Command::Toggle { id } => {
            let enabled = store.toggle_geofence(&id).context("Failed to toggle geofence")?;
            println!("✓ Geofence {} is now {}", id, if enabled { "enabled" } else { "disabled" });
        }
        Command::Alerts { kind, limit } => {
            let alerts = store.alerts();
            let shown = report::filter_alerts(alerts, kind, limit);
            print!("{}", report::render_alerts(&shown, report::AlertStats::from_alerts(alerts)));
        }
        Command::ClearAlerts => {
            store.clear_alerts();
            println!("✓ Alerts cleared");
        }
        Command::Check { latitude, longitude } => {
            check_position(&store, latitude, longitude);
        }
        Command::Replay { samples } => {
            replay_mode(&config, store, &samples)?;
        }
        Command::Track {
            interval_ms,
            ticks,
            seed,
        } => {
            if let Some(interval_ms) = interval_ms {
                config.tracking.interval_ms = interval_ms;
            }
            if ticks.is_some() {
                config.tracking.max_ticks = ticks;
            }
            track_mode(&config, store, seed)?;
        }
    }

    Ok(())
}

/// Open the data file; saves are written by a background thread
fn open_store(data_file: &Path) -> Result<GeofenceStore> {
    log::debug!("Using data file: {:?}", data_file);
    let persistence = WriteBehindPersistence::spawn(JsonFilePersistence::new(data_file))
        .context("Failed to start the data file writer")?;
    Ok(GeofenceStore::open(Box::new(persistence)))
}

/// Evaluate one position against every geofence without touching any state
fn check_position(store: &GeofenceStore, latitude: f64, longitude: f64) {
    let sample = Location::now(latitude, longitude, 0.0);
    println!("Position {}", sample.coordinate());

    for geofence in store.geofences() {
        let verdict = match evaluator::is_inside(&sample, geofence) {
            Ok(true) => "inside".to_string(),
            Ok(false) if !geofence.enabled => "outside (disabled)".to_string(),
            Ok(false) => "outside".to_string(),
            Err(e) => format!("skipped: {}", e),
        };
        println!("  {:<30} {}", geofence.name, verdict);
    }
}

/// Replay mode - run recorded samples through a monitor, one tick each
fn replay_mode(config: &AppConfig, store: GeofenceStore, samples: &Path) -> Result<()> {
    let source = ReplaySource::from_json_file(samples)
        .with_context(|| format!("Failed to load samples: {:?}", samples))?;
    let ticks = source.remaining();

    let mut monitor = GeofenceMonitor::new(
        &config.engine_config(),
        store,
        Box::new(source),
        Box::new(ConsoleNotifier),
    );

    let mut produced = 0;
    for _ in 0..ticks {
        produced += monitor.tick().len();
    }

    println!(
        "\n✓ Replayed {} ticks ({} samples), {} alerts raised",
        ticks,
        monitor.passes(),
        produced
    );
    Ok(())
}

/// Track mode - simulated device sampled by the scheduler
fn track_mode(config: &AppConfig, store: GeofenceStore, seed: Option<u64>) -> Result<()> {
    let engine_config = config.engine_config();
    engine_config.validate()?;

    let source = match seed {
        Some(seed) => SimulatedSource::seeded(&config.simulation, seed),
        None => SimulatedSource::new(&config.simulation),
    };

    let monitor = Arc::new(Mutex::new(GeofenceMonitor::new(
        &engine_config,
        store,
        Box::new(source),
        Box::new(ConsoleNotifier),
    )));

    let mut scheduler =
        SamplingScheduler::for_monitor(engine_config.tracking_interval_ms, Arc::clone(&monitor))?;
    scheduler.start()?;

    match config.tracking.max_ticks {
        Some(max_ticks) => {
            println!("Tracking for {} samples, every {}ms", max_ticks, engine_config.tracking_interval_ms);
            loop {
                thread::sleep(Duration::from_millis(50));
                let passes = match monitor.lock() {
                    Ok(guard) => guard.passes(),
                    Err(_) => bail!("monitor lock poisoned"),
                };
                if passes >= max_ticks {
                    break;
                }
            }
            scheduler.stop();
        }
        None => {
            println!(
                "Tracking every {}ms, press Ctrl-C to stop",
                engine_config.tracking_interval_ms
            );
            loop {
                thread::park();
            }
        }
    }

    let guard = monitor.lock().map_err(|_| anyhow::anyhow!("monitor lock poisoned"))?;
    if let Some(last) = guard.last_location() {
        println!("\nLast position: {}", last.coordinate());
    }
    println!("✓ {} alerts in history", guard.store().alerts().len());
    Ok(())
}

/// Log level for the `-v` count and `--quiet` flag
fn log_level(verbose: u8, quiet: bool) -> log::LevelFilter {
    use log::LevelFilter;

    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use std::io::Write;

    Builder::new()
        .filter_level(log_level(verbose, quiet))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
