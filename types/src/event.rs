//! Build event envelope and payload variants.
//!
//! Field names follow the build event protocol's JSON mapping (camelCase,
//! int64 values as strings) so payloads deserialize straight from a
//! `--build_event_json_file` stream. Every field is defaulted: a missing
//! sub-field degrades to empty rather than rejecting the event.

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// One decoded message of the build event stream.
#[derive(Debug, Clone)]
pub struct BuildEvent {
    sequence: u64,
    id: BuildEventId,
    payload: BuildEventPayload,
}

impl BuildEvent {
    #[must_use]
    pub fn new(sequence: u64, id: BuildEventId, payload: BuildEventPayload) -> Self {
        Self {
            sequence,
            id,
            payload,
        }
    }

    /// Monotonically increasing position within the build.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    #[must_use]
    pub fn id(&self) -> &BuildEventId {
        &self.id
    }

    #[must_use]
    pub fn payload(&self) -> &BuildEventPayload {
        &self.payload
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// Target label carried by the event id, if the id kind has one.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match &self.id {
            BuildEventId::Action { label, .. } => label.as_deref(),
            BuildEventId::TargetConfigured { label }
            | BuildEventId::TargetCompleted { label }
            | BuildEventId::TestResult { label, .. } => Some(label),
            _ => None,
        }
    }
}

/// Discriminated event identifier.
///
/// `NamedSet` and `TargetConfigured` carry the stable key later events use
/// to refer back to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildEventId {
    Started,
    WorkspaceInfo,
    Action {
        label: Option<String>,
        primary_output: Option<String>,
    },
    NamedSet {
        id: String,
    },
    TargetConfigured {
        label: String,
    },
    TargetCompleted {
        label: String,
    },
    TestResult {
        label: String,
        run: i32,
        shard: i32,
        attempt: i32,
    },
    BuildFinished,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Started,
    WorkspaceInfo,
    Action,
    NamedSetOfFiles,
    TargetConfigured,
    TargetCompleted,
    TestResult,
    Finished,
    Unknown,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::WorkspaceInfo => "workspaceInfo",
            Self::Action => "action",
            Self::NamedSetOfFiles => "namedSetOfFiles",
            Self::TargetConfigured => "configured",
            Self::TargetCompleted => "completed",
            Self::TestResult => "testResult",
            Self::Finished => "finished",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Payload variant matching the event kind.
#[derive(Debug, Clone)]
pub enum BuildEventPayload {
    Started(BuildStarted),
    WorkspaceInfo(WorkspaceConfig),
    Action(ActionExecuted),
    NamedSetOfFiles(NamedSetOfFiles),
    Configured(TargetConfigured),
    Completed(TargetComplete),
    TestResult(TestResult),
    Finished(BuildFinished),
    /// Payload kinds this client does not interpret (progress, options, ...).
    Unknown,
}

impl BuildEventPayload {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Started(_) => EventKind::Started,
            Self::WorkspaceInfo(_) => EventKind::WorkspaceInfo,
            Self::Action(_) => EventKind::Action,
            Self::NamedSetOfFiles(_) => EventKind::NamedSetOfFiles,
            Self::Configured(_) => EventKind::TargetConfigured,
            Self::Completed(_) => EventKind::TargetCompleted,
            Self::TestResult(_) => EventKind::TestResult,
            Self::Finished(_) => EventKind::Finished,
            Self::Unknown => EventKind::Unknown,
        }
    }
}

/// Accepts an int64 encoded either as a JSON string (proto3 mapping) or a number.
fn int64_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn parse_millis(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|text| text.trim().parse().ok())
}

// ============================================================================
// Files
// ============================================================================

/// A build output file reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct File {
    pub name: String,
    pub uri: Option<String>,
    /// Inline contents, base64 encoded.
    pub contents: Option<String>,
    pub path_prefix: Vec<String>,
}

impl File {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    #[must_use]
    pub fn with_contents(mut self, bytes: &[u8]) -> Self {
        self.contents = Some(STANDARD.encode(bytes));
        self
    }

    /// Decoded inline contents. Invalid base64 is treated as absent.
    #[must_use]
    pub fn inline_contents(&self) -> Option<Vec<u8>> {
        self.contents
            .as_deref()
            .and_then(|encoded| STANDARD.decode(encoded).ok())
    }

    /// Workspace-relative path: path prefix segments joined with the name.
    #[must_use]
    pub fn display_path(&self) -> String {
        if self.path_prefix.is_empty() {
            return self.name.clone();
        }
        let mut path = self.path_prefix.join("/");
        path.push('/');
        path.push_str(&self.name);
        path
    }

    /// Identity used to deduplicate files collected from several sets.
    #[must_use]
    pub fn identity(&self) -> &str {
        self.uri.as_deref().unwrap_or(&self.name)
    }
}

/// Reference to a named set of files by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileSetRef {
    pub id: String,
}

impl FileSetRef {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NamedSetOfFiles {
    pub files: Vec<File>,
    pub file_sets: Vec<FileSetRef>,
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildStarted {
    pub uuid: String,
    #[serde(deserialize_with = "int64_text")]
    pub start_time_millis: Option<String>,
    pub build_tool_version: String,
    pub command: String,
    pub working_directory: String,
    pub workspace_directory: String,
}

impl BuildStarted {
    /// Start timestamp, `None` when absent or unparseable.
    #[must_use]
    pub fn start_millis(&self) -> Option<i64> {
        parse_millis(self.start_time_millis.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkspaceConfig {
    pub local_exec_root: Option<String>,
}

/// Structured failure cause. The category is the single extra key next to
/// `message` (e.g. `"spawn": {"code": "NON_ZERO_EXIT"}`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FailureDetail {
    pub message: String,
    #[serde(flatten)]
    pub detail: BTreeMap<String, Value>,
}

impl FailureDetail {
    #[must_use]
    pub fn new(category: impl Into<String>, message: impl Into<String>) -> Self {
        let mut detail = BTreeMap::new();
        detail.insert(category.into(), Value::Object(Map::new()));
        Self {
            message: message.into(),
            detail,
        }
    }

    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.detail.keys().next().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionExecuted {
    pub success: bool,
    pub label: Option<String>,
    /// Tool mnemonic (e.g. "CppCompile"); selects the problem matcher.
    #[serde(rename = "type")]
    pub mnemonic: String,
    pub exit_code: i32,
    pub stdout: Option<File>,
    pub stderr: Option<File>,
    pub primary_output: Option<File>,
    pub command_line: Vec<String>,
    pub failure_detail: Option<FailureDetail>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetConfigured {
    /// e.g. "cc_library rule".
    pub target_kind: String,
    pub test_size: Option<String>,
    pub tag: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputGroup {
    pub name: String,
    pub file_sets: Vec<FileSetRef>,
    pub incomplete: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetComplete {
    pub success: bool,
    pub output_group: Vec<OutputGroup>,
    pub important_output: Vec<File>,
    pub failure_detail: Option<FailureDetail>,
    pub tag: Vec<String>,
}

impl TargetComplete {
    /// File set ids referenced by all output groups, in declaration order.
    #[must_use]
    pub fn file_set_ids(&self) -> Vec<String> {
        self.output_group
            .iter()
            .flat_map(|group| group.file_sets.iter().map(|set| set.id.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    #[default]
    NoStatus,
    Passed,
    Flaky,
    Timeout,
    Failed,
    Incomplete,
    RemoteFailure,
    FailedToBuild,
    ToolHaltedBeforeTesting,
    #[serde(other)]
    Unknown,
}

impl TestStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NoStatus => "NO_STATUS",
            Self::Passed => "PASSED",
            Self::Flaky => "FLAKY",
            Self::Timeout => "TIMEOUT",
            Self::Failed => "FAILED",
            Self::Incomplete => "INCOMPLETE",
            Self::RemoteFailure => "REMOTE_FAILURE",
            Self::FailedToBuild => "FAILED_TO_BUILD",
            Self::ToolHaltedBeforeTesting => "TOOL_HALTED_BEFORE_TESTING",
            Self::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TestResult {
    pub status: TestStatus,
    pub status_details: Option<String>,
    pub test_action_output: Vec<File>,
    #[serde(deserialize_with = "int64_text")]
    pub test_attempt_duration_millis: Option<String>,
    pub cached_locally: bool,
}

impl TestResult {
    /// Name of the primary test output among the action outputs.
    pub const PRIMARY_OUTPUT: &'static str = "test.log";

    /// The test's `test.log`, if the runner reported one.
    #[must_use]
    pub fn primary_output(&self) -> Option<&File> {
        self.test_action_output
            .iter()
            .find(|file| file.name == Self::PRIMARY_OUTPUT)
    }

    #[must_use]
    pub fn duration_millis(&self) -> Option<i64> {
        parse_millis(self.test_attempt_duration_millis.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExitCode {
    pub name: String,
    pub code: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildFinished {
    pub overall_success: Option<bool>,
    pub exit_code: Option<ExitCode>,
    #[serde(deserialize_with = "int64_text")]
    pub finish_time_millis: Option<String>,
}

impl BuildFinished {
    /// Overall outcome: exit code 0 when an exit code is present, otherwise
    /// the legacy `overallSuccess` flag.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code
            .as_ref()
            .map(|exit| exit.code == 0)
            .or(self.overall_success)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn finish_millis(&self) -> Option<i64> {
        parse_millis(self.finish_time_millis.as_deref())
    }
}
