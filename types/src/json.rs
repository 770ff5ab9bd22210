//! Decoder for the newline-delimited JSON event file (`--build_event_json_file`).
//!
//! Each line holds one event: the id under `"id"` keyed by id kind, and the
//! payload under its kind key (`"started"`, `"action"`, ...). Kinds this
//! client does not interpret decode to [`BuildEventPayload::Unknown`].

use serde::Deserialize;
use serde::de::IgnoredAny;
use thiserror::Error;

use crate::event::{
    ActionExecuted, BuildEvent, BuildEventId, BuildEventPayload, BuildFinished, BuildStarted,
    NamedSetOfFiles, TargetComplete, TargetConfigured, TestResult, WorkspaceConfig,
};

#[derive(Debug, Error)]
#[error("malformed build event on line {line}: {source}")]
pub struct JsonEventError {
    line: u64,
    #[source]
    source: serde_json::Error,
}

impl JsonEventError {
    #[must_use]
    pub fn line(&self) -> u64 {
        self.line
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireActionId {
    label: Option<String>,
    primary_output: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireKeyId {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireLabelId {
    label: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WireTestId {
    label: String,
    run: i32,
    shard: i32,
    attempt: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireId {
    started: Option<IgnoredAny>,
    workspace: Option<IgnoredAny>,
    action_completed: Option<WireActionId>,
    named_set: Option<WireKeyId>,
    target_configured: Option<WireLabelId>,
    target_completed: Option<WireLabelId>,
    test_result: Option<WireTestId>,
    build_finished: Option<IgnoredAny>,
}

impl From<WireId> for BuildEventId {
    fn from(wire: WireId) -> Self {
        if wire.started.is_some() {
            Self::Started
        } else if wire.workspace.is_some() {
            Self::WorkspaceInfo
        } else if let Some(action) = wire.action_completed {
            Self::Action {
                label: action.label,
                primary_output: action.primary_output,
            }
        } else if let Some(set) = wire.named_set {
            Self::NamedSet { id: set.id }
        } else if let Some(target) = wire.target_configured {
            Self::TargetConfigured {
                label: target.label,
            }
        } else if let Some(target) = wire.target_completed {
            Self::TargetCompleted {
                label: target.label,
            }
        } else if let Some(test) = wire.test_result {
            Self::TestResult {
                label: test.label,
                run: test.run,
                shard: test.shard,
                attempt: test.attempt,
            }
        } else if wire.build_finished.is_some() {
            Self::BuildFinished
        } else {
            Self::Unknown
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireEvent {
    id: WireId,
    started: Option<BuildStarted>,
    workspace_info: Option<WorkspaceConfig>,
    action: Option<ActionExecuted>,
    named_set_of_files: Option<NamedSetOfFiles>,
    configured: Option<TargetConfigured>,
    completed: Option<TargetComplete>,
    test_result: Option<TestResult>,
    finished: Option<BuildFinished>,
}

impl WireEvent {
    fn into_event(self, sequence: u64) -> BuildEvent {
        let payload = if let Some(started) = self.started {
            BuildEventPayload::Started(started)
        } else if let Some(workspace) = self.workspace_info {
            BuildEventPayload::WorkspaceInfo(workspace)
        } else if let Some(action) = self.action {
            BuildEventPayload::Action(action)
        } else if let Some(set) = self.named_set_of_files {
            BuildEventPayload::NamedSetOfFiles(set)
        } else if let Some(configured) = self.configured {
            BuildEventPayload::Configured(configured)
        } else if let Some(completed) = self.completed {
            BuildEventPayload::Completed(completed)
        } else if let Some(result) = self.test_result {
            BuildEventPayload::TestResult(result)
        } else if let Some(finished) = self.finished {
            BuildEventPayload::Finished(finished)
        } else {
            BuildEventPayload::Unknown
        };
        BuildEvent::new(sequence, self.id.into(), payload)
    }
}

/// Stateful line decoder assigning sequence numbers in arrival order.
#[derive(Debug, Default)]
pub struct JsonEventReader {
    next_sequence: u64,
    line: u64,
}

impl JsonEventReader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one line. Blank lines yield `Ok(None)` and consume no sequence number.
    pub fn decode_line(&mut self, line: &str) -> Result<Option<BuildEvent>, JsonEventError> {
        self.line += 1;
        if line.trim().is_empty() {
            return Ok(None);
        }
        let wire: WireEvent = serde_json::from_str(line).map_err(|source| JsonEventError {
            line: self.line,
            source,
        })?;
        let event = wire.into_event(self.next_sequence);
        self.next_sequence += 1;
        Ok(Some(event))
    }
}

/// Decode a whole event file, skipping blank lines.
pub fn decode_stream(text: &str) -> Result<Vec<BuildEvent>, JsonEventError> {
    let mut reader = JsonEventReader::new();
    let mut events = Vec::new();
    for line in text.lines() {
        if let Some(event) = reader.decode_line(line)? {
            events.push(event);
        }
    }
    Ok(events)
}
