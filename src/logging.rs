//! Structured JSON-lines logging for the control loop.
//!
//! Every record carries a run id, a process-wide sequence number, a level,
//! a domain and a free-form `data` object. Records are printed to stdout and,
//! when `LOG_DIR` is set, appended to `<LOG_DIR>/<RUN_ID>/events.jsonl`
//! (trace and debug go to `trace.jsonl`).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// Record severity. `LOG_LEVEL` sets the floor; unknown values fall back to info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl Level {
    const ALL: [Level; 6] = [Level::Trace, Level::Debug, Level::Info, Level::Warn, Level::Error, Level::Fatal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }

    /// Floor read from `LOG_LEVEL` on first use.
    pub fn threshold() -> Level {
        static FLOOR: OnceLock<Level> = OnceLock::new();
        *FLOOR.get_or_init(|| {
            std::env::var("LOG_LEVEL")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(Level::Info)
        })
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Level::ALL
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| format!("unknown log level {:?}", raw))
    }
}

/// Subsystem tag on every record, filterable through `LOG_DOMAINS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Risk,
    Breaker,
    Policy,
    Issuance,
    Redistribution,
    Venture,
    Store,
    System,
    /// State hash checks.
    Audit,
}

impl Domain {
    const ALL: [Domain; 9] = [
        Domain::Risk,
        Domain::Breaker,
        Domain::Policy,
        Domain::Issuance,
        Domain::Redistribution,
        Domain::Venture,
        Domain::Store,
        Domain::System,
        Domain::Audit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Risk => "risk",
            Domain::Breaker => "breaker",
            Domain::Policy => "policy",
            Domain::Issuance => "issuance",
            Domain::Redistribution => "redistribution",
            Domain::Venture => "venture",
            Domain::Store => "store",
            Domain::System => "system",
            Domain::Audit => "audit",
        }
    }

    pub fn is_enabled(&self) -> bool {
        static FILTER: OnceLock<Option<Vec<Domain>>> = OnceLock::new();
        FILTER
            .get_or_init(|| std::env::var("LOG_DOMAINS").ok().and_then(|raw| domain_filter(&raw)))
            .as_ref()
            .map_or(true, |allowed| allowed.contains(self))
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == raw)
            .ok_or_else(|| format!("unknown log domain {:?}", raw))
    }
}

/// `None` means every domain is logged. Unknown names are skipped.
fn domain_filter(raw: &str) -> Option<Vec<Domain>> {
    if raw.trim() == "all" {
        return None;
    }
    Some(raw.split(',').filter_map(|d| d.parse().ok()).collect())
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

struct FileSinks {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

struct RunContext {
    run_id: String,
    sinks: Option<FileSinks>,
}

fn open_sinks(run_id: &str) -> Option<FileSinks> {
    let base = std::env::var("LOG_DIR").ok()?;
    let mut run_dir = PathBuf::from(base);
    run_dir.push(run_id);
    if let Err(err) = create_dir_all(&run_dir) {
        eprintln!("[log] failed to create run dir: {}", err);
        return None;
    }
    let events = File::create(run_dir.join("events.jsonl"))
        .map_err(|err| eprintln!("[log] failed to create events log: {}", err))
        .ok()?;
    let trace = File::create(run_dir.join("trace.jsonl"))
        .map_err(|err| eprintln!("[log] failed to create trace log: {}", err))
        .ok()?;
    Some(FileSinks {
        events: Mutex::new(BufWriter::new(events)),
        trace: Mutex::new(BufWriter::new(trace)),
    })
}

fn run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let sinks = open_sinks(&run_id);
        RunContext { run_id, sinks }
    })
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::threshold() || !domain.is_enabled() {
        return;
    }
    let line = render(level, domain, event, fields);
    let ctx = run_context();
    if let Some(sinks) = &ctx.sinks {
        match level {
            Level::Trace | Level::Debug => write_line(&sinks.trace, &line),
            _ => write_line(&sinks.events, &line),
        }
    }
    println!("{}", line);
}

fn render(level: Level, domain: Domain, event: &str, mut fields: Map<String, Value>) -> String {
    let ctx = run_context();
    let msg = fields.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("domain".to_string(), json!(domain.as_str()));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    if let Some(id) = fields.remove("aggregate_id") {
        entry.insert("aggregate_id".to_string(), id);
    }
    entry.insert("data".to_string(), Value::Object(fields));
    Value::Object(entry).to_string()
}

/// Outcome of one risk assessment
pub fn log_assessment(overall: &str, dimensions: &[(&str, &str)], consecutive_days: u32, tripped: bool) {
    let dims: Map<String, Value> = dimensions
        .iter()
        .map(|(k, v)| ((*k).to_string(), v_str(v)))
        .collect();
    let level = if tripped { Level::Warn } else { Level::Info };
    log(
        level,
        Domain::Risk,
        "assessment",
        obj(&[
            ("overall", v_str(overall)),
            ("dimensions", Value::Object(dims)),
            ("consecutive_high_risk_days", json!(consecutive_days)),
            ("circuit_breaker_triggered", json!(tripped)),
        ]),
    );
}

pub fn log_breaker_trip(reason: &str, recovery_minutes: u32) {
    log(
        Level::Warn,
        Domain::Breaker,
        "trip",
        obj(&[
            ("msg", v_str(reason)),
            ("recovery_minutes", json!(recovery_minutes)),
        ]),
    );
}

pub fn log_policy(rate: f64, pmp_adjustment: f64, pmc_adjustment: f64, rationale: &str) {
    log(
        Level::Info,
        Domain::Policy,
        "taylor_rule",
        obj(&[
            ("recommended_rate", v_num(rate)),
            ("pmp_issuance_adjustment", v_num(pmp_adjustment)),
            ("pmc_conversion_adjustment", v_num(pmc_adjustment)),
            ("msg", v_str(rationale)),
        ]),
    );
}

/// One aggregate moved between lifecycle states
pub fn log_transition(domain: Domain, aggregate_id: &str, from: &str, to: &str, action: &str) {
    log(
        Level::Info,
        domain,
        "transition",
        obj(&[
            ("aggregate_id", v_str(aggregate_id)),
            ("from", v_str(from)),
            ("to", v_str(to)),
            ("action", v_str(action)),
        ]),
    );
}

/// A transition was refused
pub fn log_rejected(domain: Domain, aggregate_id: &str, action: &str, reason: &str) {
    log(
        Level::Warn,
        domain,
        "rejected",
        obj(&[
            ("aggregate_id", v_str(aggregate_id)),
            ("action", v_str(action)),
            ("msg", v_str(reason)),
        ]),
    );
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}
