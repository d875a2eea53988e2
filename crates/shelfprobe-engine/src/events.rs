//! Structured run events and the sinks that receive them.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shelfprobe_core::{SourceKind, TerminalStatus};

/// Why a candidate or markup block did not become a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MalformedMarkup,
    ParseError,
}

/// One observable fact about a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Transition {
        run_id: String,
        retailer_code: String,
        from: &'static str,
        to: &'static str,
        step_index: u32,
        at: DateTime<Utc>,
    },
    CandidateDropped {
        run_id: String,
        retailer_code: String,
        step_index: u32,
        document_index: usize,
        reason: DropReason,
        detail: String,
    },
    MarkupSkipped {
        run_id: String,
        retailer_code: String,
        step_index: u32,
        source: SourceKind,
        reason: DropReason,
        detail: String,
    },
    /// An accept click cleared the cookie wall seen at step 0.
    ConsentDismissed {
        run_id: String,
        retailer_code: String,
        selector: String,
        at: DateTime<Utc>,
    },
    RunFinished {
        run_id: String,
        retailer_code: String,
        status: TerminalStatus,
        records: usize,
        step_count: u32,
        at: DateTime<Utc>,
    },
}

/// Receives run events. Implementations must not block for long; the
/// orchestrator calls them inline.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RunEvent);
}

/// Logs each event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: RunEvent) {
        match &event {
            RunEvent::Transition {
                run_id,
                retailer_code,
                from,
                to,
                step_index,
                ..
            } => tracing::info!(
                run_id = %run_id,
                retailer = %retailer_code,
                from,
                to,
                step = step_index,
                "run transition"
            ),
            RunEvent::CandidateDropped {
                run_id,
                step_index,
                document_index,
                reason,
                detail,
                ..
            } => tracing::debug!(
                run_id = %run_id,
                step = step_index,
                document_index,
                reason = ?reason,
                detail = %detail,
                "candidate dropped"
            ),
            RunEvent::MarkupSkipped {
                run_id,
                step_index,
                source,
                detail,
                ..
            } => tracing::debug!(
                run_id = %run_id,
                step = step_index,
                source = %source,
                detail = %detail,
                "markup skipped"
            ),
            RunEvent::ConsentDismissed {
                run_id,
                retailer_code,
                selector,
                ..
            } => tracing::info!(
                run_id = %run_id,
                retailer = %retailer_code,
                selector = %selector,
                "consent dismissed"
            ),
            RunEvent::RunFinished {
                run_id,
                retailer_code,
                status,
                records,
                step_count,
                ..
            } => tracing::info!(
                run_id = %run_id,
                retailer = %retailer_code,
                status = %status,
                records,
                steps = step_count,
                "run finished"
            ),
        }
    }
}

/// Keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<RunEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: RunEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        for step in 0..3 {
            sink.emit(RunEvent::MarkupSkipped {
                run_id: "r".into(),
                retailer_code: "x".into(),
                step_index: step,
                source: SourceKind::Jsonld,
                reason: DropReason::MalformedMarkup,
                detail: String::new(),
            });
        }
        let steps: Vec<u32> = sink
            .events()
            .into_iter()
            .map(|e| match e {
                RunEvent::MarkupSkipped { step_index, .. } => step_index,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(steps, vec![0, 1, 2]);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = RunEvent::CandidateDropped {
            run_id: "r1".into(),
            retailer_code: "ah_nl".into(),
            step_index: 2,
            document_index: 4,
            reason: DropReason::ParseError,
            detail: "no numeric amount in \"free\"".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "candidate_dropped");
        assert_eq!(json["reason"], "parse_error");
        assert_eq!(json["step_index"], 2);
    }
}
