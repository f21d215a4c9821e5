//! Structured logging for analysis sessions.
//!
//! Every record is one JSON line with a run id, a sequence number, a level,
//! a domain and a `data` object. Lines go to `LOG_DIR/<run_id>/events.jsonl`
//! (info and above) or `trace.jsonl` (trace/debug), and are mirrored on
//! stderr so stdout stays reserved for results.
//!
//! Filters (`LOG_LEVEL`, `LOG_DOMAINS`, `PROFILE_SAMPLE`) are read once, when
//! the first record is emitted.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Levels and domains
// =============================================================================

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

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|l| l.as_str().eq_ignore_ascii_case(s))
    }

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

    fn is_verbose(&self) -> bool {
        *self <= Level::Debug
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Session, // entry, undo, clear, restore
    Pattern,
    Scorer,
    Storage,
    System,
    Profile,
    Audit,
}

impl Domain {
    const ALL: [Domain; 7] = [
        Domain::Session,
        Domain::Pattern,
        Domain::Scorer,
        Domain::Storage,
        Domain::System,
        Domain::Profile,
        Domain::Audit,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL.into_iter().find(|d| d.as_str().eq_ignore_ascii_case(s))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Session => "session",
            Domain::Pattern => "pattern",
            Domain::Scorer => "scorer",
            Domain::Storage => "storage",
            Domain::System => "system",
            Domain::Profile => "profile",
            Domain::Audit => "audit",
        }
    }
}

// =============================================================================
// Filter
// =============================================================================

/// Which records get written. `domains == None` means every domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub min_level: Level,
    pub domains: Option<Vec<Domain>>,
    pub profile_rate: f64,
}

impl Default for Filter {
    fn default() -> Self {
        Self { min_level: Level::Info, domains: None, profile_rate: 1.0 }
    }
}

impl Filter {
    pub fn from_env() -> Self {
        let d = Self::default();
        let min_level = std::env::var("LOG_LEVEL")
            .ok()
            .and_then(|v| Level::parse(&v))
            .unwrap_or(d.min_level);
        let domains = std::env::var("LOG_DOMAINS").ok().and_then(|v| parse_domains(&v));
        let profile_rate = std::env::var("PROFILE_SAMPLE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 1.0))
            .unwrap_or(d.profile_rate);
        Self { min_level, domains, profile_rate }
    }

    pub fn allows(&self, level: Level, domain: Domain) -> bool {
        level >= self.min_level && self.domains.as_ref().map_or(true, |ds| ds.contains(&domain))
    }
}

/// `"all"` (or an empty list) disables domain filtering. Unknown names are ignored.
fn parse_domains(raw: &str) -> Option<Vec<Domain>> {
    if raw.trim().eq_ignore_ascii_case("all") {
        return None;
    }
    let ds: Vec<Domain> = raw.split(',').filter_map(Domain::parse).collect();
    if ds.is_empty() {
        None
    } else {
        Some(ds)
    }
}

// =============================================================================
// Run context and sinks
// =============================================================================

type Sink = Option<Mutex<BufWriter<File>>>;

struct RunContext {
    run_id: String,
    filter: Filter,
    events: Sink,
    trace: Sink,
}

static SEQ: AtomicU64 = AtomicU64::new(0);
static PROFILE_TICKS: AtomicU64 = AtomicU64::new(0);
static CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn open_sink(path: &Path) -> Sink {
    File::create(path)
        .map(|f| Mutex::new(BufWriter::new(f)))
        .map_err(|err| eprintln!("[log] cannot create {}: {}", path.display(), err))
        .ok()
}

fn context() -> &'static RunContext {
    CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", Utc::now().timestamp_millis(), process::id()));
        let dir: PathBuf = [std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".into()), run_id.clone()]
            .iter()
            .collect();
        if let Err(err) = create_dir_all(&dir) {
            eprintln!("[log] cannot create {}: {}", dir.display(), err);
        }
        RunContext {
            events: open_sink(&dir.join("events.jsonl")),
            trace: open_sink(&dir.join("trace.jsonl")),
            filter: Filter::from_env(),
            run_id,
        }
    })
}

fn write_line(sink: &Sink, line: &str) {
    let Some(lock) = sink else { return };
    if let Ok(mut w) = lock.lock() {
        let _ = writeln!(w, "{}", line).and_then(|_| w.flush());
    }
}

// =============================================================================
// Records
// =============================================================================

/// Keys promoted from `data` to the top level of a record.
const TOP_LEVEL_KEYS: [&str; 2] = ["session_id", "outcome"];

/// Build one log line. `msg` and the top-level keys are lifted out of `fields`.
fn render(
    run_id: &str,
    seq: u64,
    level: Level,
    domain: Domain,
    event: &str,
    mut fields: Map<String, Value>,
) -> Value {
    let ts = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let mut entry = Map::new();
    entry.insert("ts".into(), json!(ts));
    entry.insert("run_id".into(), json!(run_id));
    entry.insert("seq".into(), json!(seq));
    entry.insert("lvl".into(), json!(level.as_str().to_uppercase()));
    entry.insert("component".into(), json!(domain.as_str()));
    entry.insert("event".into(), json!(event));
    entry.insert("msg".into(), fields.remove("msg").unwrap_or_else(|| json!("")));
    for key in TOP_LEVEL_KEYS {
        if let Some(v) = fields.remove(key) {
            entry.insert(key.into(), v);
        }
    }
    entry.insert("data".into(), Value::Object(fields));
    Value::Object(entry)
}

/// Emit a structured log entry if the run filter allows it.
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let ctx = context();
    if !ctx.filter.allows(level, domain) {
        return;
    }
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let line = render(&ctx.run_id, seq, level, domain, event, fields).to_string();
    write_line(if level.is_verbose() { &ctx.trace } else { &ctx.events }, &line);
    eprintln!("{}", line);
}

// =============================================================================
// Session
// =============================================================================

pub fn log_round(session_id: &str, outcome: &str, card: Option<&str>, len: usize, evicted: bool) {
    log(
        Level::Info,
        Domain::Session,
        "round",
        obj(&[
            ("session_id", v_str(session_id)),
            ("outcome", v_str(outcome)),
            ("card", card.map_or(Value::Null, v_str)),
            ("history_len", json!(len)),
            ("evicted", json!(evicted)),
        ]),
    );
}

/// Undo / clear / restore.
pub fn log_history_edit(session_id: &str, action: &str, len: usize) {
    log(
        Level::Info,
        Domain::Session,
        action,
        obj(&[("session_id", v_str(session_id)), ("history_len", json!(len))]),
    );
}

pub fn log_rejected_entry(session_id: &str, input: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Session,
        "entry_rejected",
        obj(&[("session_id", v_str(session_id)), ("input", v_str(input)), ("msg", v_str(reason))]),
    );
}

pub fn log_session_summary(session_id: &str, rounds_entered: u64, undos: u64, clears: u64, rejected: u64) {
    log(
        Level::Info,
        Domain::System,
        "session_summary",
        obj(&[
            ("session_id", v_str(session_id)),
            ("rounds_entered", json!(rounds_entered)),
            ("undos", json!(undos)),
            ("clears", json!(clears)),
            ("rejected", json!(rejected)),
        ]),
    );
}

// =============================================================================
// Analysis
// =============================================================================

pub fn log_detection(label: &str, suggestion: Option<&str>, weight: f64) {
    log(
        Level::Trace,
        Domain::Pattern,
        "detection",
        obj(&[
            ("label", v_str(label)),
            ("suggestion", suggestion.map_or(Value::Null, v_str)),
            ("weight", v_num(weight)),
        ]),
    );
}

/// The call plus the probability of every outcome it was chosen over.
pub fn log_recommendation(
    session_id: &str,
    call: Option<&str>,
    confidence: f64,
    alternatives: &[(&str, f64)],
    fingerprint: &str,
) {
    let distribution: Map<String, Value> =
        alternatives.iter().map(|(outcome, pct)| ((*outcome).to_string(), v_num(*pct))).collect();
    log(
        Level::Debug,
        Domain::Pattern,
        "recommendation",
        obj(&[
            ("session_id", v_str(session_id)),
            ("call", v_str(call.unwrap_or("wait"))),
            ("confidence", v_num(confidence)),
            ("distribution", Value::Object(distribution)),
            ("fingerprint", v_str(fingerprint)),
        ]),
    );
}

pub fn log_level(session_id: &str, level: u8, tier: &str, raw: f64) {
    log(
        Level::Debug,
        Domain::Scorer,
        "manipulation_level",
        obj(&[
            ("session_id", v_str(session_id)),
            ("level", json!(level)),
            ("tier", v_str(tier)),
            ("raw", v_num(raw)),
        ]),
    );
}

pub fn log_storage(event: &str, session_id: &str, rows: usize) {
    log(
        Level::Debug,
        Domain::Storage,
        event,
        obj(&[("session_id", v_str(session_id)), ("rows", json!(rows))]),
    );
}

/// Pairs a history fingerprint with the hash of the record produced for it,
/// so a replay can be checked line by line.
pub fn log_audit(event: &str, history_fingerprint: &str, record_hash: &str) {
    log(
        Level::Info,
        Domain::Audit,
        event,
        obj(&[("history_fingerprint", v_str(history_fingerprint)), ("record_hash", v_str(record_hash))]),
    );
}

// =============================================================================
// Helpers
// =============================================================================

/// First 16 hex chars of the SHA-256 of `body`.
pub fn record_hash(body: &str) -> String {
    let digest = Sha256::digest(body.as_bytes());
    hex::encode(&digest[..8])
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling
// =============================================================================

/// Emits elapsed time on drop, for a `PROFILE_SAMPLE` fraction of scopes.
pub struct ProfileScope {
    label: &'static str,
    fields: Option<Map<String, Value>>,
    started: Instant,
}

impl ProfileScope {
    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        let sampled = sampled(context().filter.profile_rate, PROFILE_TICKS.fetch_add(1, Ordering::Relaxed));
        Self { label, fields: sampled.then(|| obj(fields)), started: Instant::now() }
    }
}

/// Deterministic sampling: tick `n` is kept when its position in a 10k cycle falls under `rate`.
fn sampled(rate: f64, n: u64) -> bool {
    rate >= 1.0 || ((n % 10_000) as f64 / 10_000.0) < rate
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        let Some(mut fields) = self.fields.take() else { return };
        fields.insert("label".into(), v_str(self.label));
        fields.insert("elapsed_ms".into(), v_num(self.started.elapsed().as_secs_f64() * 1000.0));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse_and_order() {
        assert_eq!(Level::parse("WARN"), Some(Level::Warn));
        assert_eq!(Level::parse("loud"), None);
        assert!(Level::Trace < Level::Info);
        assert!(Level::Debug.is_verbose());
        assert!(!Level::Info.is_verbose());
    }

    #[test]
    fn test_domain_filter() {
        assert_eq!(parse_domains("all"), None);
        assert_eq!(parse_domains("pattern, audit,bogus"), Some(vec![Domain::Pattern, Domain::Audit]));
        let f = Filter { domains: parse_domains("pattern"), ..Filter::default() };
        assert!(f.allows(Level::Info, Domain::Pattern));
        assert!(!f.allows(Level::Info, Domain::Session));
        assert!(!f.allows(Level::Debug, Domain::Pattern));
    }

    #[test]
    fn test_render_lifts_top_level_keys() {
        let fields = obj(&[("session_id", v_str("s1")), ("msg", v_str("hi")), ("weight", v_num(1.5))]);
        let v = render("run", 7, Level::Info, Domain::Pattern, "detection", fields);
        assert_eq!(v["session_id"], "s1");
        assert_eq!(v["msg"], "hi");
        assert_eq!(v["component"], "pattern");
        assert_eq!(v["lvl"], "INFO");
        assert_eq!(v["seq"], 7);
        assert_eq!(v["data"]["weight"], 1.5);
        assert!(v["data"].get("session_id").is_none());
    }

    #[test]
    fn test_record_hash_deterministic() {
        assert_eq!(record_hash("RRB"), record_hash("RRB"));
        assert_ne!(record_hash("RRB"), record_hash("RBR"));
        assert_eq!(record_hash("RRB").len(), 16);
    }

    #[test]
    fn test_sampling_rate() {
        assert!(sampled(1.0, 12345));
        assert!(!sampled(0.0, 0));
        let kept = (0..10_000).filter(|&n| sampled(0.25, n)).count();
        assert_eq!(kept, 2_500);
    }
}
