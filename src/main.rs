//! pump-sentinel - pump telemetry analytics and alerting
//!
//! # Usage
//!
//! ```bash
//! # Analyse a JSON array of samples
//! pump-sentinel analyze --input samples.json --device P-001
//!
//! # Analyse a seeded synthetic window with a failing bearing
//! pump-sentinel analyze --synthetic --degrading --format text
//!
//! # Run the scheduler against synthetic devices for five minutes
//! pump-sentinel monitor --devices 4 --duration-secs 300
//!
//! # Print the default configuration / validate a file
//! pump-sentinel config show
//! pump-sentinel config validate pump_sentinel.toml
//! ```
//!
//! # Environment Variables
//!
//! - `PUMP_SENTINEL_CONFIG`: path to the engine configuration TOML
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pump_sentinel::advisor;
use pump_sentinel::alerting::AlertManager;
use pump_sentinel::config::{self, EngineConfig};
use pump_sentinel::notify::{LogTransport, NotificationDispatcher};
use pump_sentinel::pipeline::{AnalysisEngine, DeviceMonitor, Scheduler};
use pump_sentinel::scoring;
use pump_sentinel::storage::{
    MemoryAlertStore, MemoryNotificationStore, MemoryRuleStore, MemorySampleStore,
};
use pump_sentinel::types::{AlertLevel, AlertRule, NotificationMethod, RuleType, Sample};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pump-sentinel")]
#[command(about = "Pump telemetry analytics and alerting engine")]
#[command(version)]
struct CliArgs {
    /// Engine configuration file (overrides PUMP_SENTINEL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one device window and print the report
    Analyze {
        /// JSON file holding an array of samples
        #[arg(long, conflicts_with = "synthetic")]
        input: Option<PathBuf>,

        /// Generate a synthetic window instead of reading a file
        #[arg(long)]
        synthetic: bool,

        #[arg(long, default_value = "P-001")]
        device: String,

        /// Hours of synthetic data (one sample every 10 minutes)
        #[arg(long, default_value = "48")]
        hours: i64,

        /// Inject a developing bearing fault into synthetic data
        #[arg(long)]
        degrading: bool,

        #[arg(long, default_value = "42")]
        seed: u64,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Run the background scheduler against synthetic in-memory devices
    Monitor {
        #[arg(long, default_value = "3")]
        devices: usize,

        /// Stop after this many seconds (Ctrl-C stops earlier)
        #[arg(long, default_value = "120")]
        duration_secs: u64,

        /// JSON file holding an array of alert rules (default: built-in set)
        #[arg(long)]
        rules: Option<PathBuf>,

        #[arg(long, default_value = "7")]
        seed: u64,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate a configuration file
    Validate { path: PathBuf },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.json_logs);

    let engine_config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::load(),
    };
    config::init(engine_config);

    match args.command {
        Command::Analyze {
            input,
            synthetic,
            device,
            hours,
            degrading,
            seed,
            format,
        } => run_analyze(input, synthetic, &device, hours, degrading, seed, format),
        Command::Monitor {
            devices,
            duration_secs,
            rules,
            seed,
        } => run_monitor(devices, duration_secs, rules, seed).await,
        Command::Config { action } => run_config(action),
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

// ============================================================================
// Subcommands
// ============================================================================

fn run_analyze(
    input: Option<PathBuf>,
    synthetic: bool,
    device: &str,
    hours: i64,
    degrading: bool,
    seed: u64,
    format: OutputFormat,
) -> Result<()> {
    let now = Utc::now();
    let samples = match (input, synthetic) {
        (Some(path), _) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<Vec<Sample>>(&raw)
                .with_context(|| format!("parsing samples from {}", path.display()))?
        }
        (None, true) => synthetic_samples(device, now - Duration::hours(hours), hours, degrading, seed),
        (None, false) => bail!("either --input <file> or --synthetic is required"),
    };

    info!(device_id = %device, samples = samples.len(), "Analysing window");
    let engine = AnalysisEngine::new(config::get());
    let report = engine.analyze(device, &samples, now);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report).context("serializing report")?);
        }
        OutputFormat::Text => {
            println!(
                "Device {} | {} samples | health {:.1} | risk {} | confidence {:.0}%",
                report.device_id,
                report.sample_count,
                report.health_score,
                report.risk_level,
                report.confidence * 100.0
            );
            for f in &report.findings {
                println!("  [{:?}] {}: {}", f.severity, f.analysis_type, f.description);
            }
            println!(
                "Failure probability {:.1}% | RUL {} days | {:?}",
                report.prediction.failure_probability * 100.0,
                report.prediction.remaining_useful_life_days,
                report.prediction.degradation_trend
            );
            println!();
            println!("{}", scoring::render(&report.performance));
            println!("{}", advisor::render(&report.plan));
        }
    }
    Ok(())
}

async fn run_monitor(
    devices: usize,
    duration_secs: u64,
    rules: Option<PathBuf>,
    seed: u64,
) -> Result<()> {
    let cfg = config::get();
    let now = Utc::now();
    let lookback = cfg.scheduler.lookback_hours;

    let samples = Arc::new(MemorySampleStore::new());
    for i in 0..devices {
        let device_id = format!("P-{:03}", i + 1);
        // every third pump carries a developing fault
        let degrading = i % 3 == 2;
        let window = synthetic_samples(
            &device_id,
            now - Duration::hours(lookback),
            lookback,
            degrading,
            seed.wrapping_add(i as u64),
        );
        samples.extend(window).context("seeding samples")?;
    }

    let rule_set = match rules {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<Vec<AlertRule>>(&raw)
                .with_context(|| format!("parsing rules from {}", path.display()))?
        }
        None => default_rules(),
    };
    info!(devices, rules = rule_set.len(), "Starting monitor");

    let dispatcher = NotificationDispatcher::new(
        cfg.notification.clone(),
        Arc::new(MemoryNotificationStore::new()),
        Arc::new(LogTransport),
    );
    let manager = AlertManager::new(
        cfg.alerting.clone(),
        Arc::new(MemoryRuleStore::new(rule_set)),
        Arc::new(MemoryAlertStore::new()),
    )
    .with_dispatcher(dispatcher.clone());
    let monitor = Arc::new(DeviceMonitor::new(
        Arc::new(AnalysisEngine::new(cfg)),
        samples,
        Arc::new(manager),
        lookback,
    ));

    let cancel = CancellationToken::new();
    let scheduler = Scheduler::new(cfg.scheduler.clone(), Arc::clone(&monitor)).with_dispatcher(dispatcher);
    let handle = tokio::spawn(scheduler.run(cancel.clone()));

    tokio::select! {
        _ = tokio::time::sleep(std::time::Duration::from_secs(duration_secs)) => {
            info!(duration_secs, "Monitor duration elapsed");
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Ctrl-C received");
        }
    }
    cancel.cancel();
    let stats = handle.await.context("scheduler task panicked")?;

    let open = monitor.alert_manager().active_alerts(None)?;
    println!(
        "rule checks: {} | alerts created: {} | open alerts: {} | retries: {}",
        stats.rule_checks,
        stats.alerts_created,
        open.len(),
        stats.retries_claimed
    );
    for alert in open {
        println!("  {} {}", alert.alert_id, alert.title);
    }
    Ok(())
}

fn run_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", config::get().to_toml()?);
        }
        ConfigAction::Validate { path } => {
            EngineConfig::load_from_file(&path)
                .with_context(|| format!("{} is not a valid configuration", path.display()))?;
            println!("{}: OK", path.display());
        }
    }
    Ok(())
}

// ============================================================================
// Synthetic data
// ============================================================================

/// A seeded pump window sampled every 10 minutes.
///
/// A degrading pump shows rising vibration, creeping power draw and
/// sagging discharge pressure over the window.
fn synthetic_samples(
    device_id: &str,
    start: DateTime<Utc>,
    hours: i64,
    degrading: bool,
    seed: u64,
) -> Vec<Sample> {
    let mut rng = StdRng::seed_from_u64(seed);
    let steps = (hours.max(1) * 6) as usize;
    let mut running = false;

    (0..steps)
        .map(|i| {
            let progress = i as f64 / steps as f64;
            let wear = if degrading { progress } else { 0.0 };

            // a start roughly every two hours
            if rng.gen_bool(0.08) {
                running = !running;
            }
            let base_power = 15.0 * (1.0 + 0.25 * wear);

            Sample {
                pump_status: Some(u8::from(running)),
                runtime_minutes: Some(if running { 10.0 } else { 0.0 }),
                current_amperage: Some(28.0 * (1.0 + 0.2 * wear) + rng.gen_range(-0.8..0.8)),
                voltage: Some(380.0 + rng.gen_range(-4.0..4.0)),
                power_kw: Some(base_power + rng.gen_range(-0.5..0.5)),
                energy_kwh: Some(base_power / 6.0 + rng.gen_range(-0.05..0.05)),
                water_pressure_kpa: Some(320.0 * (1.0 - 0.2 * wear) + rng.gen_range(-3.0..3.0)),
                flow_rate_m3h: Some(42.0 * (1.0 - 0.1 * wear) + rng.gen_range(-1.0..1.0)),
                water_temp_c: Some(35.0 + 30.0 * wear + rng.gen_range(-1.0..1.0)),
                vibration_mm_s: Some(1.8 + 6.0 * wear * wear + rng.gen_range(-0.2..0.2)),
                noise_db: Some(68.0 + 8.0 * wear + rng.gen_range(-1.0..1.0)),
                fault_code: (degrading && progress > 0.8 && rng.gen_bool(0.2))
                    .then(|| "B-104".to_string()),
                alarm_level: Some(if degrading && progress > 0.7 { 2 } else { 0 }),
                maintenance_flag: false,
                ..Sample::new(device_id, start + Duration::minutes(10 * i as i64))
            }
        })
        .collect()
}

fn default_rules() -> Vec<AlertRule> {
    vec![
        AlertRule {
            suppression_minutes: 60,
            notification_methods: vec![NotificationMethod::Email, NotificationMethod::Websocket],
            ..AlertRule::new("VIB-HIGH", "Vibration above limit", RuleType::Threshold, AlertLevel::Critical)
                .with_condition("metric", "max_vibration")
                .with_condition("comparison", ">")
                .with_condition("threshold", 7.0)
        },
        AlertRule {
            consecutive_trigger_count: 2,
            suppression_minutes: 240,
            notification_methods: vec![NotificationMethod::Email],
            ..AlertRule::new("HEALTH-LOW", "Health score low", RuleType::HealthScore, AlertLevel::Warning)
        },
        AlertRule {
            suppression_minutes: 720,
            notification_methods: vec![NotificationMethod::All],
            ..AlertRule::new("FAIL-PRED", "Failure predicted", RuleType::FaultPrediction, AlertLevel::Critical)
        },
        AlertRule::new("ANOMALY", "Anomalous operation", RuleType::AnomalyDetection, AlertLevel::Info),
    ]
}
