//! Presentable items derived from build events.

use std::fmt;
use std::sync::Arc;

use bep_types::{
    ActionExecuted, BuildEvent, BuildEventPayload, FailureDetail, File, Marker, TargetComplete,
    TestResult,
};

use crate::state::TargetIcon;

/// Identity of an item within one session. Never reused, not even across
/// builds, so a stale id can be detected rather than aliased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(u64);

impl ItemId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Variant-specific data of an item.
#[derive(Debug, Clone)]
pub enum ItemKind {
    BuildStarted,
    BuildFinished {
        success: bool,
        elapsed_millis: Option<i64>,
        passed_tests: usize,
    },
    ActionSuccess,
    ActionFailed {
        /// Whether a problem matcher exists for the action's mnemonic.
        has_matcher: bool,
    },
    TestResultFailed,
    TargetComplete {
        kind: Option<String>,
        icon: TargetIcon,
    },
    FailureDetail(FailureDetail),
    File(File),
    /// Markers parsed from tool output, grouped by resource.
    ProblemFile {
        resource: String,
        markers: Vec<Marker>,
    },
    FileMarker(Marker),
}

impl ItemKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BuildStarted => "BuildStarted",
            Self::BuildFinished { .. } => "BuildFinished",
            Self::ActionSuccess => "ActionSuccess",
            Self::ActionFailed { .. } => "ActionFailed",
            Self::TestResultFailed => "TestResultFailed",
            Self::TargetComplete { .. } => "TargetComplete",
            Self::FailureDetail(_) => "FailureDetail",
            Self::File(_) => "File",
            Self::ProblemFile { .. } => "ProblemFile",
            Self::FileMarker(_) => "FileMarker",
        }
    }
}

/// One node of the presented build tree.
///
/// Every item keeps the event it was derived from; child items keep their
/// parent's event.
#[derive(Debug, Clone)]
pub struct BuildEventItem {
    id: ItemId,
    event: Arc<BuildEvent>,
    kind: ItemKind,
}

impl BuildEventItem {
    pub(crate) fn new(id: ItemId, event: Arc<BuildEvent>, kind: ItemKind) -> Self {
        Self { id, event, kind }
    }

    #[must_use]
    pub fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub fn event(&self) -> &BuildEvent {
        &self.event
    }

    pub(crate) fn event_arc(&self) -> &Arc<BuildEvent> {
        &self.event
    }

    #[must_use]
    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    fn action(&self) -> Option<&ActionExecuted> {
        match self.event.payload() {
            BuildEventPayload::Action(action) => Some(action),
            _ => None,
        }
    }

    fn test_result(&self) -> Option<&TestResult> {
        match self.event.payload() {
            BuildEventPayload::TestResult(result) => Some(result),
            _ => None,
        }
    }

    fn completed(&self) -> Option<&TargetComplete> {
        match self.event.payload() {
            BuildEventPayload::Completed(completed) => Some(completed),
            _ => None,
        }
    }

    fn action_label(&self) -> String {
        self.event
            .label()
            .or_else(|| self.action().and_then(|action| action.label.as_deref()))
            .or_else(|| self.action().map(|action| action.mnemonic.as_str()))
            .unwrap_or("action")
            .to_string()
    }

    /// Primary display text.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.kind {
            ItemKind::BuildStarted => "Build started".to_string(),
            ItemKind::BuildFinished {
                success,
                elapsed_millis,
                ..
            } => {
                let outcome = if *success {
                    "Build succeeded"
                } else {
                    "Build failed"
                };
                match elapsed_millis {
                    Some(elapsed) => format!("{outcome} ({elapsed}ms)"),
                    None => outcome.to_string(),
                }
            }
            ItemKind::ActionSuccess | ItemKind::ActionFailed { .. } => self.action_label(),
            ItemKind::TestResultFailed | ItemKind::TargetComplete { .. } => {
                self.event.label().unwrap_or("target").to_string()
            }
            ItemKind::FailureDetail(detail) => detail.category().unwrap_or("failure").to_string(),
            ItemKind::File(file) => file.display_path(),
            ItemKind::ProblemFile { resource, .. } => resource.clone(),
            ItemKind::FileMarker(marker) => format!(
                "{}:{} {}",
                marker.start_line(),
                marker.start_column(),
                marker.message()
            ),
        }
    }

    /// Secondary display text.
    #[must_use]
    pub fn description(&self) -> Option<String> {
        match &self.kind {
            ItemKind::BuildStarted => {
                let started = match self.event.payload() {
                    BuildEventPayload::Started(started) => started,
                    _ => return None,
                };
                let text = [started.command.as_str(), started.build_tool_version.as_str()]
                    .into_iter()
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ");
                (!text.is_empty()).then_some(text)
            }
            ItemKind::BuildFinished { passed_tests, .. } => {
                let exit = match self.event.payload() {
                    BuildEventPayload::Finished(finished) => finished
                        .exit_code
                        .as_ref()
                        .map(|exit| exit.name.clone())
                        .filter(|name| !name.is_empty()),
                    _ => None,
                };
                let tests = (*passed_tests > 0).then(|| match *passed_tests {
                    1 => "1 test passed".to_string(),
                    n => format!("{n} tests passed"),
                });
                let text = exit.into_iter().chain(tests).collect::<Vec<_>>().join(", ");
                (!text.is_empty()).then_some(text)
            }
            ItemKind::ActionSuccess => self.action().map(|action| action.mnemonic.clone()),
            ItemKind::ActionFailed { .. } => self
                .action()
                .map(|action| format!("{} exited with {}", action.mnemonic, action.exit_code)),
            ItemKind::TestResultFailed => self.test_result().map(|result| {
                match result.duration_millis() {
                    Some(duration) => format!("{} in {duration}ms", result.status.label()),
                    None => result.status.label().to_string(),
                }
            }),
            ItemKind::TargetComplete { kind, .. } => kind.clone(),
            ItemKind::FailureDetail(detail) => {
                (!detail.message.is_empty()).then(|| detail.message.clone())
            }
            ItemKind::File(file) => file.uri.clone(),
            ItemKind::ProblemFile { markers, .. } => Some(match markers.len() {
                1 => "1 problem".to_string(),
                n => format!("{n} problems"),
            }),
            ItemKind::FileMarker(marker) => Some(match marker.code() {
                Some(code) => format!("{} [{code}]", marker.severity()),
                None => marker.severity().to_string(),
            }),
        }
    }

    /// Whether the item survives the end-of-build filter.
    #[must_use]
    pub fn attention(&self) -> bool {
        match &self.kind {
            ItemKind::BuildStarted
            | ItemKind::BuildFinished { .. }
            | ItemKind::ActionFailed { .. }
            | ItemKind::TestResultFailed => true,
            ItemKind::TargetComplete { icon, .. } => *icon == TargetIcon::Stop,
            ItemKind::FileMarker(marker) => marker.severity().is_error(),
            ItemKind::ActionSuccess
            | ItemKind::FailureDetail(_)
            | ItemKind::File(_)
            | ItemKind::ProblemFile { .. } => false,
        }
    }

    #[must_use]
    pub fn icon(&self) -> Option<&TargetIcon> {
        match &self.kind {
            ItemKind::TargetComplete { icon, .. } => Some(icon),
            _ => None,
        }
    }

    /// Whether asking for children may yield any.
    #[must_use]
    pub fn may_have_children(&self) -> bool {
        match &self.kind {
            ItemKind::ActionFailed { has_matcher } => *has_matcher,
            ItemKind::TestResultFailed => self
                .test_result()
                .is_some_and(|result| !result.test_action_output.is_empty()),
            ItemKind::TargetComplete { .. } => self.completed().is_some_and(|completed| {
                completed.failure_detail.is_some() || !completed.file_set_ids().is_empty()
            }),
            ItemKind::ProblemFile { markers, .. } => !markers.is_empty(),
            ItemKind::BuildStarted
            | ItemKind::BuildFinished { .. }
            | ItemKind::ActionSuccess
            | ItemKind::FailureDetail(_)
            | ItemKind::File(_)
            | ItemKind::FileMarker(_) => false,
        }
    }
}
