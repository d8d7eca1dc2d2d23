//! Rebuild progress reporting.
//!
//! Progress goes to **stderr** so stdout stays parseable for scripts. Events
//! follow the rebuild state machine: one `Scanning` event as each source
//! starts, then `Merging` and the final outcome.

use std::io::Write;

/// Phase of a rebuild.
#[derive(Clone, Debug, PartialEq)]
pub enum RebuildState {
    NotStarted,
    /// Reading records from one source.
    Scanning { source: String },
    /// Writing batch metadata and committing.
    Merging,
    /// The new index replaced the live one.
    Swapped,
    /// Nothing was swapped; the previous index is untouched.
    Aborted { reason: String },
}

impl RebuildState {
    pub fn label(&self) -> &'static str {
        match self {
            RebuildState::NotStarted => "not-started",
            RebuildState::Scanning { .. } => "scanning",
            RebuildState::Merging => "merging",
            RebuildState::Swapped => "swapped",
            RebuildState::Aborted { .. } => "aborted",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, RebuildState::Swapped | RebuildState::Aborted { .. })
    }
}

#[derive(Clone, Debug)]
pub struct ProgressEvent {
    pub state: RebuildState,
    /// Documents accepted so far in the batch.
    pub documents: u64,
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "rebuild desktop  scanning  1,234 documents".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let docs = format_number(event.documents);
        let line = match &event.state {
            RebuildState::Scanning { source } => {
                format!("rebuild {}  scanning  {} documents\n", source, docs)
            }
            RebuildState::Aborted { reason } => format!("rebuild  aborted: {}\n", reason),
            other => format!("rebuild  {}  {} documents\n", other.label(), docs),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let mut obj = serde_json::json!({
            "event": "progress",
            "phase": event.state.label(),
            "documents": event.documents,
        });
        match &event.state {
            RebuildState::Scanning { source } => obj["source"] = source.clone().into(),
            RebuildState::Aborted { reason } => obj["reason"] = reason.clone().into(),
            _ => {}
        }
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Keeps every event; used by tests to check state transitions.
#[derive(Default)]
pub struct RecordingProgress {
    events: std::sync::Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn states(&self) -> Vec<RebuildState> {
        match self.events.lock() {
            Ok(events) => events.iter().map(|e| e.state.clone()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn terminal_states() {
        assert!(RebuildState::Swapped.is_finished());
        assert!(RebuildState::Aborted { reason: "x".into() }.is_finished());
        assert!(!RebuildState::Merging.is_finished());
        assert_eq!(
            RebuildState::Scanning { source: "desktop".into() }.label(),
            "scanning"
        );
    }
}
