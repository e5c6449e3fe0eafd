use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::config::RuntimeConfig;
use crate::error::{categorize_error, redacted_error_chain};
use crate::table::{Column, render_table};

pub fn unix_ms_now() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[derive(Debug, Clone)]
pub struct TelemetrySink {
    pub enabled: bool,
    pub path: PathBuf,
    pub run_id: String,
    pub command: String,
    pub session_id: String,
    pub file_lock: Arc<std::sync::Mutex<()>>,
}

impl TelemetrySink {
    pub fn new(cfg: &RuntimeConfig, command: String) -> Self {
        let run_id = format!("run-{}-{}", unix_ms_now(), std::process::id());
        Self {
            enabled: cfg.telemetry_enabled,
            path: PathBuf::from(&cfg.telemetry_path),
            run_id,
            command,
            session_id: cfg.session_id.clone(),
            file_lock: Arc::new(std::sync::Mutex::new(())),
        }
    }

    /// Sink that drops every event; used where no config is resolved.
    pub fn disabled(command: impl Into<String>) -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
            run_id: format!("run-{}-{}", unix_ms_now(), std::process::id()),
            command: command.into(),
            session_id: String::new(),
            file_lock: Arc::new(std::sync::Mutex::new(())),
        }
    }

    pub fn emit(&self, event: &str, payload: Value) {
        if !self.enabled {
            return;
        }

        let mut record = serde_json::Map::new();
        record.insert("ts_unix_ms".to_string(), json!(unix_ms_now()));
        record.insert("event".to_string(), json!(event));
        record.insert("run_id".to_string(), json!(self.run_id));
        record.insert("command".to_string(), json!(self.command));
        record.insert("session_id".to_string(), json!(self.session_id));

        if let Some(map) = payload.as_object() {
            for (key, value) in map {
                record.insert(key.clone(), value.clone());
            }
        }

        let value = Value::Object(record);
        if let Err(err) = self.append_event_line(&value) {
            tracing::warn!(
                event = event,
                path = %self.path.display(),
                error = %err,
                "telemetry write failed"
            );
        }
    }

    /// `command.failed` with the error chain masked.
    pub fn emit_command_failed(&self, err: &anyhow::Error, duration_ms: u128) {
        self.emit(
            "command.failed",
            json!({
                "duration_ms": duration_ms,
                "category": categorize_error(err).code(),
                "error": redacted_error_chain(err)
            }),
        );
    }

    fn append_event_line(&self, value: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create telemetry directory '{}'",
                    parent.display()
                )
            })?;
        }

        let _guard = self.file_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open telemetry path '{}'", self.path.display()))?;

        serde_json::to_writer(&mut file, value).with_context(|| {
            format!("failed to serialize telemetry event for '{}'", self.command)
        })?;
        writeln!(file).context("failed to write telemetry newline")
    }
}

/// Pass/fail tally for one benchmark across every bench invocation in the file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioTally {
    pub passed: usize,
    pub failed: usize,
}

impl ScenarioTally {
    /// Scenarios that both passed and failed across runs.
    pub fn is_flaky(&self) -> bool {
        self.passed > 0 && self.failed > 0
    }
}

#[derive(Debug, Default)]
pub struct TelemetrySummary {
    pub total_lines: usize,
    pub parsed_events: usize,
    pub parse_errors: usize,
    pub unique_runs: BTreeSet<String>,
    pub command_counts: BTreeMap<String, usize>,
    pub event_counts: BTreeMap<String, usize>,
    pub scenarios: BTreeMap<String, ScenarioTally>,
    pub best_eval_scores: BTreeMap<String, f64>,
    pub last_event_ts_unix_ms: Option<u128>,
}

impl TelemetrySummary {
    pub fn count(&self, event: &str) -> usize {
        self.event_counts.get(event).copied().unwrap_or_default()
    }

    fn record(&mut self, event: &Value) {
        let name = event
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if !name.is_empty() {
            *self.event_counts.entry(name.to_string()).or_default() += 1;
        }

        match name {
            "benchmark.passed" | "benchmark.failed" => {
                if let Some(benchmark) = event.get("benchmark").and_then(Value::as_str) {
                    let tally = self.scenarios.entry(benchmark.to_string()).or_default();
                    if name == "benchmark.passed" {
                        tally.passed += 1;
                    } else {
                        tally.failed += 1;
                    }
                }
            }
            "eval.variant_scored" => {
                if let (Some(variant), Some(score)) = (
                    event.get("variant").and_then(Value::as_str),
                    event.get("avg_score").and_then(Value::as_f64),
                ) {
                    let best = self.best_eval_scores.entry(variant.to_string()).or_insert(score);
                    *best = best.max(score);
                }
            }
            _ => {}
        }
    }
}

/// Summarize the newest `limit` lines of a JSONL telemetry stream.
pub fn summarize_telemetry_lines(lines: Vec<String>, limit: usize) -> TelemetrySummary {
    let mut summary = TelemetrySummary {
        total_lines: lines.len(),
        ..TelemetrySummary::default()
    };

    for line in lines.iter().rev().take(limit.max(1)) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(parsed) = serde_json::from_str::<Value>(line) else {
            summary.parse_errors += 1;
            continue;
        };
        summary.parsed_events += 1;

        if let Some(run_id) = parsed.get("run_id").and_then(Value::as_str)
            && !run_id.is_empty()
        {
            summary.unique_runs.insert(run_id.to_string());
        }
        if let Some(command) = parsed.get("command").and_then(Value::as_str)
            && !command.is_empty()
        {
            *summary.command_counts.entry(command.to_string()).or_default() += 1;
        }
        if let Some(ts) = parsed.get("ts_unix_ms").and_then(Value::as_u64) {
            let ts = u128::from(ts);
            summary.last_event_ts_unix_ms = Some(summary.last_event_ts_unix_ms.map_or(ts, |t| t.max(ts)));
        }
        summary.record(&parsed);
    }

    summary
}

pub fn format_telemetry_report(path: &Path, summary: &TelemetrySummary) -> String {
    let mut out = format!(
        "Telemetry report\nPath: {}\nEvents analyzed: {} of {} lines (parse_errors={})\nUnique runs: {}\n",
        path.display(),
        summary.parsed_events,
        summary.total_lines,
        summary.parse_errors,
        summary.unique_runs.len()
    );
    out.push_str(&format!(
        "Commands: completed={} failed={} | Tools: succeeded={} failed={} | Approvals granted: {}\n",
        summary.count("command.completed"),
        summary.count("command.failed"),
        summary.count("tool.succeeded"),
        summary.count("tool.failed"),
        summary.count("approval.granted")
    ));

    if !summary.scenarios.is_empty() {
        let rows = summary
            .scenarios
            .iter()
            .map(|(name, tally)| {
                vec![
                    name.clone(),
                    tally.passed.to_string(),
                    tally.failed.to_string(),
                    if tally.is_flaky() { "flaky" } else { "" }.to_string(),
                ]
            })
            .collect::<Vec<Vec<String>>>();
        out.push('\n');
        out.push_str(&render_table(
            &[
                Column::left("Benchmark", 22),
                Column::right("Passed", 6),
                Column::right("Failed", 6),
                Column::left("Note", 5),
            ],
            &rows,
        ));
    }

    if !summary.best_eval_scores.is_empty() {
        let rows = summary
            .best_eval_scores
            .iter()
            .map(|(variant, score)| vec![variant.clone(), format!("{score:.3}")])
            .collect::<Vec<Vec<String>>>();
        out.push('\n');
        out.push_str(&render_table(
            &[Column::left("Variant", 16), Column::right("Best score", 10)],
            &rows,
        ));
    }

    if let Some(last_ts) = summary.last_event_ts_unix_ms {
        out.push_str(&format!("\nLast event ts_unix_ms: {last_ts}\n"));
    }
    out
}

pub fn run_telemetry_report(
    cfg: &RuntimeConfig,
    path_override: Option<String>,
    limit: usize,
) -> Result<()> {
    let path = PathBuf::from(path_override.unwrap_or_else(|| cfg.telemetry_path.clone()));
    if !path.exists() {
        println!("No telemetry file found at '{}'.", path.display());
        return Ok(());
    }

    let file = std::fs::File::open(&path)
        .with_context(|| format!("failed to open telemetry file '{}'", path.display()))?;
    let lines = io::BufReader::new(file)
        .lines()
        .collect::<std::result::Result<Vec<String>, std::io::Error>>()
        .with_context(|| format!("failed to read telemetry file '{}'", path.display()))?;

    print!("{}", format_telemetry_report(&path, &summarize_telemetry_lines(lines, limit)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_tallies_scenarios_and_skips_bad_lines() {
        let lines = [
            r#"{"ts_unix_ms":10,"event":"command.started","run_id":"r1","command":"bench"}"#,
            r#"{"ts_unix_ms":11,"event":"benchmark.passed","run_id":"r1","command":"bench","benchmark":"streaming"}"#,
            r#"{"ts_unix_ms":12,"event":"benchmark.passed","run_id":"r1","command":"bench","benchmark":"approval_flow"}"#,
            "not json",
            r#"{"ts_unix_ms":15,"event":"benchmark.failed","run_id":"r2","command":"bench","benchmark":"streaming"}"#,
            r#"{"ts_unix_ms":20,"event":"eval.variant_scored","run_id":"r3","command":"eval","variant":"concise","avg_score":0.6}"#,
            r#"{"ts_unix_ms":21,"event":"eval.variant_scored","run_id":"r4","command":"eval","variant":"concise","avg_score":0.8}"#,
        ]
        .map(str::to_string)
        .to_vec();

        let summary = summarize_telemetry_lines(lines, 100);
        assert_eq!(summary.parsed_events, 6);
        assert_eq!(summary.parse_errors, 1);
        assert_eq!(summary.unique_runs.len(), 4);
        assert_eq!(summary.count("benchmark.passed"), 2);
        assert_eq!(summary.count("tool.failed"), 0);
        assert!(summary.scenarios["streaming"].is_flaky());
        assert!(!summary.scenarios["approval_flow"].is_flaky());
        assert_eq!(summary.best_eval_scores["concise"], 0.8);
        assert_eq!(summary.command_counts.get("bench"), Some(&4));
        assert_eq!(summary.last_event_ts_unix_ms, Some(21));

        let report = format_telemetry_report(Path::new("events.jsonl"), &summary);
        assert!(report.contains("streaming"));
        assert!(report.contains("flaky"));
        assert!(report.contains("0.800"));
    }

    #[test]
    fn limit_keeps_the_newest_lines() {
        let lines = (0..5)
            .map(|idx| format!(r#"{{"ts_unix_ms":{idx},"event":"tool.succeeded"}}"#))
            .collect::<Vec<String>>();
        let summary = summarize_telemetry_lines(lines, 2);
        assert_eq!(summary.count("tool.succeeded"), 2);
        assert_eq!(summary.last_event_ts_unix_ms, Some(4));
    }

    #[test]
    fn command_failed_event_masks_api_keys() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let mut sink = TelemetrySink::disabled("eval");
        sink.enabled = true;
        sink.path = dir.path().join("events.jsonl");

        let err = anyhow::anyhow!("No such file or directory")
            .context("failed to read eval dataset at 'sk-abcdef1234567890.json'");
        sink.emit_command_failed(&err, 7);

        let written = std::fs::read_to_string(&sink.path).expect("telemetry should be written");
        assert!(!written.contains("abcdef1234567890"), "{written}");
        let event: Value = serde_json::from_str(written.trim()).expect("line should be json");
        assert_eq!(event["event"], "command.failed");
        assert_eq!(event["category"], "INPUT");
        assert_eq!(event["duration_ms"], 7);
        assert_eq!(
            event["error"],
            "failed to read eval dataset at 'sk-[REDACTED].json': No such file or directory"
        );
    }

    #[test]
    fn disabled_sink_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let mut sink = TelemetrySink::disabled("bench");
        sink.path = dir.path().join("telemetry.jsonl");
        sink.emit("command.started", json!({}));
        assert!(!sink.path.exists());

        sink.enabled = true;
        sink.emit("command.started", json!({ "extra": 1 }));
        let written = std::fs::read_to_string(&sink.path).expect("telemetry should be written");
        let event: Value = serde_json::from_str(written.trim()).expect("line should be json");
        assert_eq!(event["event"], "command.started");
        assert_eq!(event["command"], "bench");
        assert_eq!(event["extra"], 1);
    }
}
