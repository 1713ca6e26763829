//! dfp-agent CLI
//!
//! Shows the device fingerprint and live telemetry in the terminal.

use chrono::Utc;
use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;
use dfp_agent::{
    collector::{
        BaseStationStream, CachedLocationInfo, FixtureSource, LocationInfoProvider, NoopCellScanner,
        NoopLocationSource, ScheduledBaseStationStream, SystemHardwareInfo,
    },
    config::{CapabilityConfig, Config},
    core::{CollectionOrchestrator, Collaborators, ObservableState, Phase},
    fingerprint::MachineIdFingerprint,
    logging,
    permission::{GrantTable, InteractivePermissionGate, PermissionRequest},
    PRIVACY_DECLARATION, VERSION,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

#[derive(Parser)]
#[command(name = "dfp-agent")]
#[command(version = VERSION)]
#[command(about = "Local device fingerprint and telemetry viewer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start collecting and display telemetry
    Start {
        /// JSON fixture standing in for the radio and location service
        #[arg(long)]
        fixture: Option<PathBuf>,

        /// Capabilities to require (phone, fine, coarse, or all)
        #[arg(long)]
        capabilities: Option<String>,

        /// Treat every required capability as already granted
        #[arg(long)]
        grant: bool,

        /// Stop after this many seconds instead of waiting for Ctrl+C
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Show required permissions and configuration
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    match cli.command {
        Commands::Start {
            fixture,
            capabilities,
            grant,
            duration,
        } => {
            cmd_start(fixture, capabilities, grant, duration);
        }
        Commands::Status => {
            cmd_status();
        }
        Commands::Privacy => {
            cmd_privacy();
        }
        Commands::Config { init } => {
            cmd_config(init);
        }
    }
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load configuration, using defaults: {e}");
        Config::default()
    })
}

fn cmd_start(
    fixture: Option<PathBuf>,
    capabilities: Option<String>,
    grant: bool,
    duration: Option<u64>,
) {
    println!("dfp-agent v{VERSION}");
    println!();

    let mut config = load_config();
    if fixture.is_some() {
        config.fixture_path = fixture;
    }
    if let Some(capabilities) = capabilities {
        config.capabilities = CapabilityConfig::from_csv(&capabilities);
    }

    let required = config.capabilities.permission_set();
    let grants = Arc::new(GrantTable::new());
    if grant {
        for capability in required.iter() {
            grants.grant(*capability);
        }
    }

    println!("Starting collection...");
    println!(
        "  Required permissions: {}",
        describe_capabilities(&config.capabilities)
    );
    println!("  Refresh interval: {}s", config.refresh_interval.as_secs());
    match &config.fixture_path {
        Some(path) => println!("  Telemetry source: fixture {path:?}"),
        None => println!("  Telemetry source: none (no modem or location service)"),
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    };

    runtime.block_on(run(config, grants, duration));
}

async fn run(config: Config, grants: Arc<GrantTable>, duration: Option<u64>) {
    let required = config.capabilities.permission_set();
    let (gate, requests) = InteractivePermissionGate::new(required, grants.clone());

    let (stream, location): (Arc<dyn BaseStationStream>, Arc<dyn LocationInfoProvider>) =
        match &config.fixture_path {
            Some(path) => {
                let source = FixtureSource::new(path);
                (
                    Arc::new(
                        ScheduledBaseStationStream::new(source.clone(), config.scan_interval)
                            .with_grants(grants.clone()),
                    ),
                    Arc::new(CachedLocationInfo::with_timing(
                        source,
                        config.location_cache,
                        config.fix_max_age,
                    )),
                )
            }
            None => (
                Arc::new(
                    ScheduledBaseStationStream::new(NoopCellScanner, config.scan_interval)
                        .with_grants(grants.clone()),
                ),
                Arc::new(CachedLocationInfo::with_timing(
                    NoopLocationSource,
                    config.location_cache,
                    config.fix_max_age,
                )),
            ),
        };

    let orchestrator = CollectionOrchestrator::new(
        Collaborators {
            gate: Arc::new(gate),
            stream,
            hardware: Arc::new(SystemHardwareInfo),
            location,
            fingerprint: Arc::new(MachineIdFingerprint::new()),
        },
        config.orchestrator_config(),
    );

    // Prompts are answered on stdin from a blocking thread.
    let (results_tx, mut results_rx) = mpsc::unbounded_channel::<Vec<bool>>();
    spawn_prompt_host(requests, grants, results_tx);

    // Set up Ctrl+C handler
    let (stop_tx, mut stop_rx) = watch::channel(false);
    ctrlc_handler(stop_tx);

    let mut state = orchestrator.state();
    render(&state.current());

    match orchestrator.evaluate() {
        Ok(Phase::Running) => print_session(&orchestrator),
        Ok(_) => {}
        Err(e) => {
            eprintln!("Error starting collection: {e}");
            std::process::exit(1);
        }
    }

    let deadline = duration.map(|secs| tokio::time::Instant::now() + Duration::from_secs(secs));

    loop {
        tokio::select! {
            Ok(()) = stop_rx.changed() => break,

            _ = wait_until(deadline) => break,

            Some(flags) = results_rx.recv() => {
                match orchestrator.on_permission_result(&flags) {
                    Ok(true) => {
                        println!("Permission granted.");
                        print_session(&orchestrator);
                    }
                    Ok(false) => {
                        println!("Permission denied. Collection will not start.");
                        println!("Restart the agent to be asked again.");
                    }
                    Err(e) => eprintln!("Error starting collection: {e}"),
                }
            }

            changed = state.changed() => {
                if !changed {
                    break;
                }
                let snapshot = state.current();
                render(&snapshot);
                if snapshot.permission_prompt_visible {
                    orchestrator.acknowledge_permission_prompt();
                }
            }
        }
    }

    println!();
    println!("Stopping collection...");
    orchestrator.shutdown().await;

    println!();
    println!("{}", orchestrator.stats().summary());
}

fn print_session(orchestrator: &CollectionOrchestrator) {
    if let (Some(id), Some(started_at)) =
        (orchestrator.session_id(), orchestrator.session_started_at())
    {
        println!(
            "Collecting since {} (session {id})",
            started_at.format("%H:%M:%S")
        );
    }
}

async fn wait_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Answer permission prompts on stdin and report the flags back.
fn spawn_prompt_host(
    requests: Receiver<PermissionRequest>,
    grants: Arc<GrantTable>,
    results: mpsc::UnboundedSender<Vec<bool>>,
) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for request in requests.iter() {
            let mut flags = Vec::with_capacity(request.capabilities.len());
            for capability in request.capabilities.iter() {
                print!("Allow access to {capability}? [y/N] ");
                let _ = std::io::stdout().flush();

                let mut answer = String::new();
                if stdin.lock().read_line(&mut answer).is_err() {
                    answer.clear();
                }
                flags.push(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"));
            }

            grants.apply(&request.capabilities, &flags);
            if results.send(flags).is_err() {
                break;
            }
        }
    });
}

fn render(state: &ObservableState) {
    let or_pending = |text: &str| {
        if text.is_empty() {
            "(pending)".to_string()
        } else {
            text.to_string()
        }
    };

    println!("[{}]", Utc::now().format("%H:%M:%S"));
    println!("  Fingerprint: {}", state.fingerprint);
    println!("  Hardware: {}", or_pending(&state.hardware_info));
    println!("  Location: {}", or_pending(&state.location_info));
    println!("  Base stations: {}", state.base_stations.len());
    for record in &state.base_stations {
        for line in record.display_text().lines() {
            println!("    {line}");
        }
        println!();
    }
    if state.permission_prompt_visible {
        println!("  Permissions are required to collect telemetry.");
    }
}

fn describe_capabilities(capabilities: &CapabilityConfig) -> String {
    let names: Vec<String> = capabilities
        .permission_set()
        .iter()
        .map(|c| c.to_string())
        .collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

fn cmd_status() {
    let config = load_config();

    println!("dfp-agent Status");
    println!("================");
    println!();
    println!(
        "Required permissions: {}",
        describe_capabilities(&config.capabilities)
    );
    println!();
    println!("Configuration:");
    println!("  Refresh interval: {}s", config.refresh_interval.as_secs());
    println!("  Scan interval: {}s", config.scan_interval.as_secs());
    println!("  Location cache: {}s", config.location_cache.as_secs());
    println!("  Fix max age: {}s", config.fix_max_age.as_secs());
    match &config.fixture_path {
        Some(path) => println!(
            "  Fixture: {:?} ({})",
            path,
            if path.exists() { "found" } else { "missing" }
        ),
        None => println!("  Fixture: none"),
    }
}

fn cmd_privacy() {
    println!("{PRIVACY_DECLARATION}");
}

fn cmd_config(init: bool) {
    if init {
        let config = Config::default();
        if let Err(e) = config.save() {
            eprintln!("Error saving config: {e}");
            std::process::exit(1);
        }
        println!("Wrote default configuration to {:?}", Config::config_path());
        return;
    }

    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(stop: watch::Sender<bool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = stop.send(true);
    }) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }
}
