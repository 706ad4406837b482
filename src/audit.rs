//! Per-request audit trail.
//!
//! Every pipeline run builds an ordered event sequence - request
//! received, each specialist result, each review attempt, the final
//! synthesis - keyed by a generated request id, and hands it to an
//! `AuditSink` once finalized. Sink failures are logged and swallowed:
//! auditing never aborts a pipeline run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

/// Kind of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RequestReceived,
    SpecialistResult,
    ReviewFeedback,
    ReworkAttempt,
    FinalSynthesis,
    Error,
}

/// One audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialist_id: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<usize>,
    pub payload: Value,
}

/// The complete audit trail for one request.
///
/// Owned exclusively by the coordinator for the duration of the request;
/// nothing here is shared across concurrent runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrail {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    pub request_payload: Value,
    pub events: Vec<AuditEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl AuditTrail {
    /// Start a new trail for one request.
    pub fn start(request_id: String, request_payload: Value) -> Self {
        Self {
            request_id,
            started_at: Utc::now(),
            request_payload,
            events: Vec::new(),
            response: None,
            duration_seconds: None,
        }
    }

    /// Append an event.
    pub fn record(
        &mut self,
        kind: EventKind,
        specialist_id: Option<u8>,
        attempt: Option<usize>,
        payload: Value,
    ) {
        self.events.push(AuditEvent {
            timestamp: Utc::now(),
            kind,
            specialist_id,
            attempt,
            payload,
        });
    }

    /// Attach the terminal response payload and total duration.
    pub fn finalize(&mut self, response: Value, duration_seconds: f64) {
        self.response = Some(response);
        self.duration_seconds = Some(duration_seconds);
    }
}

/// Destination for finalized audit trails.
pub trait AuditSink: Send + Sync {
    fn persist(&self, trail: &AuditTrail) -> Result<()>;
}

/// Writes one JSON file per request under a log directory.
pub struct FileAuditSink {
    log_dir: PathBuf,
}

impl FileAuditSink {
    /// Create the sink, making sure the log directory exists.
    pub fn new(log_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
        Ok(Self { log_dir })
    }
}

impl AuditSink for FileAuditSink {
    fn persist(&self, trail: &AuditTrail) -> Result<()> {
        let filename = format!(
            "request_{}_{}.json",
            trail.request_id,
            trail.started_at.format("%Y%m%d_%H%M%S")
        );
        let path = self.log_dir.join(filename);

        let json = serde_json::to_string_pretty(trail).context("Failed to serialize audit trail")?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write audit trail: {}", path.display()))?;

        debug!("Audit trail written to {}", path.display());
        Ok(())
    }
}

/// Discards every trail. Used with `--no-audit`.
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn persist(&self, _trail: &AuditTrail) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink for tests.
#[cfg(test)]
pub struct MemoryAuditSink {
    pub trails: std::sync::Mutex<Vec<AuditTrail>>,
}

#[cfg(test)]
impl MemoryAuditSink {
    pub fn new() -> Self {
        Self {
            trails: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl AuditSink for MemoryAuditSink {
    fn persist(&self, trail: &AuditTrail) -> Result<()> {
        self.trails.lock().unwrap().push(trail.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_trail_records_ordered_events() {
        let mut trail = AuditTrail::start("req-1".to_string(), json!({"responses": 5}));
        trail.record(EventKind::RequestReceived, None, None, json!({}));
        trail.record(
            EventKind::SpecialistResult,
            Some(2),
            None,
            json!({"score": 40.0}),
        );
        trail.record(EventKind::ReviewFeedback, Some(2), Some(0), json!({}));

        assert_eq!(trail.events.len(), 3);
        assert_eq!(trail.events[0].kind, EventKind::RequestReceived);
        assert_eq!(trail.events[1].specialist_id, Some(2));
        assert_eq!(trail.events[2].attempt, Some(0));
    }

    #[test]
    fn test_finalize_attaches_response_and_duration() {
        let mut trail = AuditTrail::start("req-2".to_string(), json!({}));
        trail.finalize(json!({"final_score": 40.0}), 12.5);
        assert_eq!(trail.duration_seconds, Some(12.5));
        assert!(trail.response.is_some());
    }

    #[test]
    fn test_file_sink_writes_one_file_per_request() {
        let dir = TempDir::new().unwrap();
        let sink = FileAuditSink::new(dir.path().join("logs")).unwrap();

        let mut trail = AuditTrail::start("abc123".to_string(), json!({}));
        trail.record(EventKind::RequestReceived, None, None, json!({}));
        sink.persist(&trail).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .collect::<std::io::Result<_>>()
            .unwrap();
        assert_eq!(entries.len(), 1);
        let name = entries[0].file_name().into_string().unwrap();
        assert!(name.starts_with("request_abc123_"));
        assert!(name.ends_with(".json"));

        let content = std::fs::read_to_string(entries[0].path()).unwrap();
        let parsed: AuditTrail = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.request_id, "abc123");
        assert_eq!(parsed.events.len(), 1);
    }

    #[test]
    fn test_event_kind_serialization() {
        let json = serde_json::to_string(&EventKind::ReworkAttempt).unwrap();
        assert_eq!(json, r#""rework_attempt""#);
    }
}
