use crate::report::ConversionReport;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSON-lines sink shared by every conversion of one converter.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: BTreeMap<String, u64>,
    skipped: ConversionReport,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: BTreeMap::new(),
                skipped: ConversionReport::default(),
            })),
        })
    }

    pub fn log_value(&self, value: &Value) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{value}");
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if amount == 0 {
            return;
        }
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    /// One `convert.summary` line. Skip counts are also folded into the
    /// running totals, and the key is left out when nothing was skipped.
    pub fn log_conversion(&self, doc_id: usize, entities: usize, patterns: usize, report: &ConversionReport) {
        if let Ok(mut state) = self.inner.lock() {
            state.skipped.merge(report);
        }
        self.increment("conversions", 1);
        self.increment("entities", entities as u64);
        let mut line = json!({
            "type": "convert.summary",
            "doc_id": doc_id,
            "entities": entities,
            "patterns": patterns,
        });
        if !report.is_empty() {
            line["skipped"] = Value::Object(skipped_map(report));
        }
        self.log_value(&line);
    }

    /// Writes the accumulated counters and skip totals as a `debug.summary`
    /// line and resets them.
    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let counters = std::mem::take(&mut state.counters);
            let skipped = std::mem::take(&mut state.skipped);
            let line = json!({
                "type": "debug.summary",
                "context": context,
                "counts": counters,
                "skipped": skipped_map(&skipped),
            });
            let _ = writeln!(state.writer, "{line}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

fn skipped_map(report: &ConversionReport) -> Map<String, Value> {
    report
        .entries()
        .into_iter()
        .map(|(reason, count)| (reason.as_str().to_string(), json!(count)))
        .collect()
}
