use clap::{Parser, ValueEnum};
use smart_traffic_signal::control_system::{
    InterruptibleSleeper, IntersectionScheduler, LoggingActuator, PhaseTiming, SignalActuator,
    SysfsGpioActuator,
};
use smart_traffic_signal::demand_store::DemandStore;
use smart_traffic_signal::flow_analyzer::{
    run_and_record_detection_pass, Detector, RandomDetector, SidecarDetector,
};
use smart_traffic_signal::global_variables::GPIO_SYSFS_ROOT;
use smart_traffic_signal::monitoring::{
    listen_accident_reports, AccidentMonitor, AlertDispatcher, AmqpAlertDispatcher,
    JournaledAlerts, LogAlertDispatcher,
};
use smart_traffic_signal::SignalConfig;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ActuatorKind {
    /// Log commands only
    Log,
    /// Linux sysfs GPIO
    Sysfs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DetectorKind {
    Sidecar,
    Random,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AlertKind {
    Log,
    Amqp,
}

#[derive(Parser)]
#[command(name = "traffic_signal")]
#[command(about = "Demand-driven traffic signal controller with accident preemption", long_about = None)]
struct Cli {
    /// JSON configuration file. Without it the built-in lanes read their frames from ./Images
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "log")]
    actuator: ActuatorKind,

    /// sysfs GPIO root used by the sysfs actuator
    #[arg(long, default_value = GPIO_SYSFS_ROOT)]
    gpio_root: PathBuf,

    #[arg(long, value_enum, default_value = "sidecar")]
    detector: DetectorKind,

    /// Seed for the random detector
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value = "log")]
    alerts: AlertKind,

    /// Start from the persisted tables without running detection first
    #[arg(long)]
    skip_detection: bool,
}

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    println!("Starting traffic signal controller...");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Controller error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let config = SignalConfig::load_or_default(cli.config.as_deref())?;
    let accidents = Arc::new(AccidentMonitor::new());

    if !cli.skip_detection {
        let mut detector: Box<dyn Detector> = match cli.detector {
            DetectorKind::Sidecar => Box::new(SidecarDetector),
            DetectorKind::Random => Box::new(RandomDetector::new(cli.seed, &config.detection)),
        };
        run_and_record_detection_pass(detector.as_mut(), &config, &accidents)?;
    }

    // Startup reads the persisted tables back; any problem refuses to start.
    let snapshot = DemandStore::from_config(&config.storage).load()?;

    let actuator: Box<dyn SignalActuator + Send> = match cli.actuator {
        ActuatorKind::Log => Box::new(LoggingActuator::new(&config.lanes)),
        ActuatorKind::Sysfs => Box::new(SysfsGpioActuator::open(&cli.gpio_root, &config.lanes)?),
    };
    let journal = config.storage.alert_journal_path();
    let alerts: Box<dyn AlertDispatcher + Send> = match cli.alerts {
        AlertKind::Log => Box::new(JournaledAlerts::new(LogAlertDispatcher, journal)),
        AlertKind::Amqp => Box::new(JournaledAlerts::new(
            AmqpAlertDispatcher::new(&config.alerts.amqp_url, &config.alerts.queue),
            journal,
        )),
    };

    let stop = Arc::new(AtomicBool::new(false));
    let mut scheduler = IntersectionScheduler::new(
        &config.lane_ids(),
        snapshot.green_times,
        PhaseTiming::from_config(&config.timing),
        actuator,
        InterruptibleSleeper::new(Arc::clone(&stop)),
        alerts,
        config.alerts.destination_id.clone(),
    )?
    .with_accident_monitor(Arc::clone(&accidents))
    .with_stop_flag(Arc::clone(&stop));

    if config.accident_reports.enabled {
        let monitor = Arc::clone(&accidents);
        let reports = config.accident_reports.clone();
        thread::spawn(move || {
            if let Err(e) = listen_accident_reports(monitor, &reports.amqp_url, &reports.queue) {
                log::error!("Error in accident report listener: {}", e);
            }
        });
    }

    let stop_on_interrupt = Arc::clone(&stop);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("Stop requested by operator");
                stop_on_interrupt.store(true, Ordering::SeqCst);
            }
            Err(e) => log::error!("Unable to listen for interrupt: {}", e),
        }
    });

    tokio::task::spawn_blocking(move || scheduler.run()).await??;
    Ok(())
}
