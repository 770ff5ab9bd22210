//! Per-build state: lifecycle phase, named file sets, configured targets.

use std::collections::{HashMap, HashSet};

use bep_types::{
    BuildEvent, BuildEventId, BuildEventPayload, BuildStarted, File, NamedSetOfFiles,
    TargetComplete, WorkspaceConfig,
};

/// Where the tracker is in the current build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildPhase {
    /// No build started (or state was reset).
    #[default]
    Idle,
    /// Started event seen, nothing else yet.
    Started,
    Building,
    Finished,
}

/// Icon a completed target is shown with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetIcon {
    /// Target failed.
    Stop,
    /// Rule kind with the `" rule"` suffix removed, e.g. `cc_library`.
    Rule(String),
    /// Successful target whose kind is unknown or not a rule.
    Interface,
}

const RULE_SUFFIX: &str = " rule";

/// Accumulated state for one build.
///
/// Named sets and configured targets are only meaningful inside the build
/// that declared them; [`BuildState::reset`] drops everything.
#[derive(Debug, Default)]
pub struct BuildState {
    phase: BuildPhase,
    started: Option<BuildStarted>,
    workspace: Option<WorkspaceConfig>,
    file_sets: HashMap<String, NamedSetOfFiles>,
    target_kinds: HashMap<String, String>,
}

impl BuildState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all per-build data. Idempotent.
    pub fn reset(&mut self) {
        self.phase = BuildPhase::Idle;
        self.started = None;
        self.workspace = None;
        self.file_sets.clear();
        self.target_kinds.clear();
    }

    #[must_use]
    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    /// Record the started payload and enter [`BuildPhase::Started`].
    pub fn begin(&mut self, started: BuildStarted) {
        self.started = Some(started);
        self.phase = BuildPhase::Started;
    }

    /// Any event after the started one moves the build along.
    pub fn advance(&mut self) {
        if self.phase == BuildPhase::Started {
            self.phase = BuildPhase::Building;
        }
    }

    pub fn finish(&mut self) {
        self.phase = BuildPhase::Finished;
    }

    #[must_use]
    pub fn started(&self) -> Option<&BuildStarted> {
        self.started.as_ref()
    }

    pub fn set_workspace(&mut self, workspace: WorkspaceConfig) {
        self.workspace = Some(workspace);
    }

    /// Directory that `${workspaceRoot}` in matcher output stands for: the
    /// execution root when known, otherwise the workspace directory.
    #[must_use]
    pub fn workspace_root(&self) -> Option<&str> {
        self.workspace
            .as_ref()
            .and_then(|ws| ws.local_exec_root.as_deref())
            .or_else(|| {
                self.started
                    .as_ref()
                    .map(|started| started.workspace_directory.as_str())
            })
            .filter(|root| !root.is_empty())
    }

    /// Store a named set under its id. Later sets with the same id replace
    /// earlier ones.
    pub fn handle_named_set_of_files(&mut self, event: &BuildEvent) {
        let (BuildEventId::NamedSet { id }, BuildEventPayload::NamedSetOfFiles(set)) =
            (event.id(), event.payload())
        else {
            tracing::warn!(
                sequence = event.sequence(),
                kind = %event.kind(),
                "Skipping malformed named set event"
            );
            return;
        };
        self.file_sets.insert(id.clone(), set.clone());
    }

    /// Remember the kind of a configured target by label.
    pub fn handle_target_configured(&mut self, event: &BuildEvent) {
        let (BuildEventId::TargetConfigured { label }, BuildEventPayload::Configured(configured)) =
            (event.id(), event.payload())
        else {
            tracing::warn!(
                sequence = event.sequence(),
                kind = %event.kind(),
                "Skipping malformed target configured event"
            );
            return;
        };
        self.target_kinds
            .insert(label.clone(), configured.target_kind.clone());
    }

    #[must_use]
    pub fn file_set(&self, id: &str) -> Option<&NamedSetOfFiles> {
        self.file_sets.get(id)
    }

    /// Flattened, de-duplicated files of the given sets and every set they
    /// transitively reference. Unknown ids contribute nothing and each set
    /// is visited at most once, so reference cycles terminate.
    #[must_use]
    pub fn collect_files_from_file_set_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<File> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut files = Vec::new();
        let mut stack: Vec<&str> = ids.iter().rev().map(AsRef::as_ref).collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(set) = self.file_sets.get(id) else {
                tracing::debug!(id, "Unresolved file set reference");
                continue;
            };
            for file in &set.files {
                if seen.insert(file.identity()) {
                    files.push(file.clone());
                }
            }
            stack.extend(set.file_sets.iter().rev().map(|set| set.id.as_str()));
        }
        files
    }

    /// Kind recorded for the event's target, if it was configured.
    #[must_use]
    pub fn get_target_kind(&self, event: &BuildEvent) -> Option<&str> {
        event
            .label()
            .and_then(|label| self.target_kinds.get(label))
            .map(String::as_str)
    }

    #[must_use]
    pub fn get_target_icon(&self, event: &BuildEvent, completed: &TargetComplete) -> TargetIcon {
        if !completed.success {
            return TargetIcon::Stop;
        }
        match self
            .get_target_kind(event)
            .and_then(|kind| kind.strip_suffix(RULE_SUFFIX))
        {
            Some(rule) => TargetIcon::Rule(rule.to_string()),
            None => TargetIcon::Interface,
        }
    }
}
