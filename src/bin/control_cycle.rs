//! Runs newline-delimited JSON snapshots through the control loop.
//!
//! Usage: control_cycle <snapshots.jsonl>
//!   PERSIST=1      also store each snapshot in SQLITE_PATH
//!   PARTICIPATION  optional participation rate fed to the incentive optimizer
//!   AVG_CONTRIB    average contribution paired with PARTICIPATION

use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result};
use serde_json::json;

use econloop::control::ControlLoop;
use econloop::logging::{log, obj, v_str, Domain, Level};
use econloop::policy::BehavioralTelemetry;
use econloop::state::{EconomicSystemState, PolicyConfig};
use econloop::store::SnapshotStore;

fn telemetry_from_env() -> Option<BehavioralTelemetry> {
    let participation_rate = std::env::var("PARTICIPATION").ok()?.parse().ok()?;
    let average_contribution = std::env::var("AVG_CONTRIB")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0);
    Some(BehavioralTelemetry { participation_rate, average_contribution })
}

fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SNAPSHOTS").ok())
        .context("usage: control_cycle <snapshots.jsonl>")?;
    let cfg = PolicyConfig::from_env();
    let mut control = ControlLoop::new(&cfg)?;
    let telemetry = telemetry_from_env();

    let persist = std::env::var("PERSIST").map(|v| v == "1").unwrap_or(false);
    let mut store = if persist {
        let mut s = SnapshotStore::new(&cfg.sqlite_path)?;
        s.init()?;
        Some(s)
    } else {
        None
    };

    let reader = BufReader::new(File::open(&path).with_context(|| format!("open {}", path))?);
    let mut cycles = 0u64;
    let mut halted = 0u64;
    let mut rejected = 0u64;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let snapshot: EconomicSystemState = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: bad snapshot", path, lineno + 1))?;
        let report = match control.evaluate(&snapshot, telemetry.as_ref()) {
            Ok(r) => r,
            Err(e) => {
                log(
                    Level::Error,
                    Domain::System,
                    "cycle_rejected",
                    obj(&[("line", json!(lineno + 1)), ("msg", v_str(&e.to_string()))]),
                );
                rejected += 1;
                continue;
            }
        };
        cycles += 1;
        if report.is_halted() {
            halted += 1;
        }
        println!("{}", serde_json::to_string(&report)?);
        if let Some(s) = store.as_mut() {
            s.save_snapshot(&snapshot)?;
        }
    }

    log(
        Level::Info,
        Domain::System,
        "run_complete",
        obj(&[
            ("cycles", json!(cycles)),
            ("halted", json!(halted)),
            ("rejected", json!(rejected)),
            ("consecutive_high_risk_days", json!(control.consecutive_high_risk_days())),
        ]),
    );
    Ok(())
}
