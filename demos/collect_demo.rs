//! Demonstration of dfp-agent collection.
//!
//! This example shows how to:
//! 1. Build an orchestrator over a fixture-backed radio and location source
//! 2. Answer the permission prompt from code
//! 3. Watch the observable state change
//!
//! Run with: cargo run --example collect_demo

use std::sync::Arc;
use std::time::Duration;

use dfp_agent::{
    collector::{CachedLocationInfo, FixtureSource, ScheduledBaseStationStream, SystemHardwareInfo},
    core::{CollectionOrchestrator, Collaborators, OrchestratorConfig},
    fingerprint::MachineIdFingerprint,
    logging,
    permission::{GrantTable, InteractivePermissionGate, PermissionSet},
    PRIVACY_DECLARATION,
};

const FIXTURE: &str = r#"{
  "location_service": true,
  "fixes": [{ "provider": "network", "latitude": 52.52, "longitude": 13.405 }],
  "cells": [
    { "radio": "LTE", "mcc": "262", "mnc": "01", "cid": 21034, "lac": 410, "signal_dbm": -87 },
    { "radio": "NR", "mcc": "262", "mnc": "01", "cid": 88120, "lac": 410, "signal_dbm": -101 }
  ]
}"#;

#[tokio::main]
async fn main() {
    logging::init();

    println!("dfp-agent - Collection Demo");
    println!("===========================");
    println!();
    println!("{PRIVACY_DECLARATION}");
    println!();

    let path = std::env::temp_dir().join("dfp-agent-demo-fixture.json");
    if let Err(e) = std::fs::write(&path, FIXTURE) {
        eprintln!("Error writing fixture: {e}");
        return;
    }

    let grants = Arc::new(GrantTable::new());
    let (gate, requests) = InteractivePermissionGate::new(PermissionSet::default(), grants.clone());
    let source = FixtureSource::new(&path);

    let orchestrator = CollectionOrchestrator::new(
        Collaborators {
            gate: Arc::new(gate),
            stream: Arc::new(
                ScheduledBaseStationStream::new(source.clone(), Duration::from_secs(5))
                    .with_grants(grants.clone()),
            ),
            hardware: Arc::new(SystemHardwareInfo),
            location: Arc::new(CachedLocationInfo::new(source)),
            fingerprint: Arc::new(MachineIdFingerprint::new()),
        },
        OrchestratorConfig {
            refresh_interval: Duration::from_secs(5),
        },
    );

    let mut state = orchestrator.state();
    println!("Fingerprint: {}", state.current().fingerprint);

    if let Err(e) = orchestrator.evaluate() {
        eprintln!("Error: {e}");
        return;
    }
    println!("Phase: {}", orchestrator.phase());

    if state.current().permission_prompt_visible {
        println!("Permission prompt shown, granting everything...");
        orchestrator.acknowledge_permission_prompt();

        if let Ok(request) = requests.try_recv() {
            let flags = vec![true; request.capabilities.len()];
            grants.apply(&request.capabilities, &flags);
            if let Err(e) = orchestrator.on_permission_result(&flags) {
                eprintln!("Error: {e}");
                return;
            }
        }
    }
    println!("Phase: {}", orchestrator.phase());
    println!();

    let deadline = tokio::time::sleep(Duration::from_secs(12));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = state.changed() => {
                if !changed {
                    break;
                }
                let snapshot = state.current();
                println!("Hardware: {}", snapshot.hardware_info);
                println!("Location: {}", snapshot.location_info);
                for record in &snapshot.base_stations {
                    println!("{record}");
                    println!();
                }
            }
        }
    }

    orchestrator.shutdown().await;
    let _ = std::fs::remove_file(&path);

    println!("{}", orchestrator.stats().summary());
}
