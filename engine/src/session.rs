//! Build event session: classification of incoming events into items.
//!
//! The session owns everything scoped to one build (state tracker, item
//! list, child cache, marker registry). A started event resets all of it and
//! bumps the generation, which invalidates child computations still in
//! flight for the previous build.

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::Arc;

use bep_matcher::{
    MarkerFilter, MarkerRegistry, PathResolver, ProblemCollector, ProblemMatcherRegistry,
    WORKSPACE_ROOT_PLACEHOLDER,
};
use bep_types::{
    ActionExecuted, BuildEvent, BuildEventPayload, BuildFinished, BuildStarted, File, TestStatus,
};
use encoding_rs::{Encoding, UTF_8};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::children::{ChildrenRequest, ProblemScan, ResolvedChildren, Work};
use crate::error::ChildrenError;
use crate::item::{BuildEventItem, ItemId, ItemKind};
use crate::resolver::{ByteStreamResolver, FileUriResolver};
use crate::state::{BuildPhase, BuildState, TargetIcon};

/// Capacity of the inbound event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Mnemonic whose matchers scan failed tests' `test.log`.
pub const TEST_RUNNER_MNEMONIC: &str = "TestRunner";

/// Which output stream of a failed action is scanned for problems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticStream {
    /// stderr, or stdout when the action reported no stderr.
    #[default]
    Stderr,
    /// stdout, or stderr when the action reported no stdout.
    Stdout,
    Both,
}

impl DiagnosticStream {
    fn select(self, action: &ActionExecuted) -> Vec<File> {
        let stderr = action.stderr.clone();
        let stdout = action.stdout.clone();
        match self {
            Self::Stderr => stderr.or(stdout).into_iter().collect(),
            Self::Stdout => stdout.or(stderr).into_iter().collect(),
            Self::Both => stderr.into_iter().chain(stdout).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Encoding of action output and test logs.
    pub encoding: &'static Encoding,
    pub diagnostic_stream: DiagnosticStream,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            encoding: UTF_8,
            diagnostic_stream: DiagnosticStream::default(),
        }
    }
}

/// Change notifications for a presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotification {
    /// A started event cleared the session.
    BuildReset { generation: u64 },
    ItemAdded(ItemId),
    /// A collapsed success item was superseded by a newer one.
    ItemReplaced { previous: ItemId, current: ItemId },
    /// End-of-build filtering dropped `removed` items.
    ItemsFiltered { removed: usize },
    DiagnosticsUpdated { resource: String },
}

pub struct BuildEventSession<R = FileUriResolver> {
    matchers: ProblemMatcherRegistry,
    resolver: R,
    options: SessionOptions,
    state: BuildState,
    markers: MarkerRegistry,
    items: Vec<BuildEventItem>,
    children: HashMap<ItemId, Vec<BuildEventItem>>,
    generation: u64,
    next_id: u64,
    passed_tests: usize,
    last_sequence: Option<u64>,
    event_tx: mpsc::Sender<BuildEvent>,
    event_rx: mpsc::Receiver<BuildEvent>,
    notify_tx: Option<mpsc::UnboundedSender<SessionNotification>>,
}

impl<R: ByteStreamResolver> BuildEventSession<R> {
    #[must_use]
    pub fn new(matchers: ProblemMatcherRegistry, resolver: R, options: SessionOptions) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            matchers,
            resolver,
            options,
            state: BuildState::new(),
            markers: MarkerRegistry::new(),
            items: Vec::new(),
            children: HashMap::new(),
            generation: 0,
            next_id: 0,
            passed_tests: 0,
            last_sequence: None,
            event_tx,
            event_rx,
            notify_tx: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Top-level items in presentation order.
    #[must_use]
    pub fn items(&self) -> &[BuildEventItem] {
        &self.items
    }

    /// Any item known to the session: top-level or an already expanded child.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&BuildEventItem> {
        self.items
            .iter()
            .chain(self.children.values().flatten())
            .find(|item| item.id() == id)
    }

    #[must_use]
    pub fn state(&self) -> &BuildState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> BuildPhase {
        self.state.phase()
    }

    #[must_use]
    pub fn markers(&self) -> &MarkerRegistry {
        &self.markers
    }

    /// Incremented on every reset; child results from older generations
    /// are discarded.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn passed_test_count(&self) -> usize {
        self.passed_tests
    }

    /// Children already computed for `id`.
    #[must_use]
    pub fn cached_children(&self, id: ItemId) -> Option<&[BuildEventItem]> {
        self.children.get(&id).map(Vec::as_slice)
    }

    // ========================================================================
    // Event intake
    // ========================================================================

    /// Sender for producers feeding events from another task. Events are
    /// applied by [`BuildEventSession::poll_events`].
    #[must_use]
    pub fn event_sender(&self) -> mpsc::Sender<BuildEvent> {
        self.event_tx.clone()
    }

    /// Register the notification receiver, replacing any previous one.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionNotification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.notify_tx = Some(tx);
        rx
    }

    /// Apply queued events, up to `budget`. Non-blocking.
    pub fn poll_events(&mut self, budget: usize) -> usize {
        let mut count = 0;
        while count < budget {
            match self.event_rx.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    count += 1;
                }
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                    break;
                }
            }
        }
        count
    }

    /// Classify one event. Events must be handed over in stream order.
    pub fn handle_event(&mut self, event: BuildEvent) {
        let event = Arc::new(event);
        if !matches!(event.payload(), BuildEventPayload::Started(_)) {
            if self.state.phase() == BuildPhase::Finished {
                tracing::debug!(
                    sequence = event.sequence(),
                    kind = %event.kind(),
                    "Ignoring event after build finished"
                );
                return;
            }
            if let Some(last) = self.last_sequence
                && event.sequence() <= last
            {
                tracing::warn!(
                    sequence = event.sequence(),
                    last,
                    "Build event arrived out of order"
                );
            }
            self.state.advance();
        }

        match event.payload() {
            BuildEventPayload::Started(started) => self.on_started(&event, started),
            BuildEventPayload::WorkspaceInfo(workspace) => {
                self.state.set_workspace(workspace.clone());
            }
            BuildEventPayload::Action(action) if action.success => {
                self.on_action_success(&event);
            }
            BuildEventPayload::Action(action) => {
                let has_matcher = self.matchers.contains(&action.mnemonic);
                self.push(&event, ItemKind::ActionFailed { has_matcher });
            }
            BuildEventPayload::NamedSetOfFiles(_) => self.state.handle_named_set_of_files(&event),
            BuildEventPayload::Configured(_) => self.state.handle_target_configured(&event),
            BuildEventPayload::Completed(completed) => {
                let kind = self.state.get_target_kind(&event).map(str::to_string);
                let icon = self.state.get_target_icon(&event, completed);
                self.push(&event, ItemKind::TargetComplete { kind, icon });
            }
            BuildEventPayload::TestResult(result) => {
                if result.status == TestStatus::Passed {
                    self.passed_tests += 1;
                } else {
                    self.push(&event, ItemKind::TestResultFailed);
                }
            }
            BuildEventPayload::Finished(finished) => self.on_finished(&event, finished),
            BuildEventPayload::Unknown => {
                tracing::trace!(sequence = event.sequence(), "Ignoring uninterpreted event");
            }
        }
        self.last_sequence = Some(event.sequence());
    }

    fn on_started(&mut self, event: &Arc<BuildEvent>, started: &BuildStarted) {
        self.reset();
        tracing::info!(
            uuid = %started.uuid,
            command = %started.command,
            generation = self.generation,
            "Build started"
        );
        self.state.begin(started.clone());
        self.push(event, ItemKind::BuildStarted);
    }

    fn on_action_success(&mut self, event: &Arc<BuildEvent>) {
        let collapse = self
            .items
            .last()
            .is_some_and(|item| matches!(item.kind(), ItemKind::ActionSuccess));
        if !collapse {
            self.push(event, ItemKind::ActionSuccess);
            return;
        }
        let item = BuildEventItem::new(self.allocate_id(), Arc::clone(event), ItemKind::ActionSuccess);
        let current = item.id();
        if let Some(last) = self.items.last_mut() {
            let previous = mem::replace(last, item).id();
            self.notify(SessionNotification::ItemReplaced { previous, current });
        }
    }

    fn on_finished(&mut self, event: &Arc<BuildEvent>, finished: &BuildFinished) {
        let before = self.items.len();
        self.items.retain(BuildEventItem::attention);
        let removed = before - self.items.len();
        if removed > 0 {
            let kept: HashSet<ItemId> = self.items.iter().map(BuildEventItem::id).collect();
            self.children.retain(|parent, _| kept.contains(parent));
            self.notify(SessionNotification::ItemsFiltered { removed });
        }

        let start = self.state.started().and_then(BuildStarted::start_millis);
        let elapsed_millis = match (start, finished.finish_millis()) {
            (Some(start), Some(finish)) if finish >= start => Some(finish - start),
            _ => None,
        };
        let success = finished.success();
        tracing::info!(success, elapsed_ms = ?elapsed_millis, "Build finished");

        self.state.finish();
        self.push(
            event,
            ItemKind::BuildFinished {
                success,
                elapsed_millis,
                passed_tests: self.passed_tests,
            },
        );
    }

    /// Drop all per-build data and start a new generation.
    fn reset(&mut self) {
        self.generation += 1;
        self.state.reset();
        self.items.clear();
        self.children.clear();
        self.markers.clear();
        self.passed_tests = 0;
        self.last_sequence = None;
        self.notify(SessionNotification::BuildReset {
            generation: self.generation,
        });
    }

    fn allocate_id(&mut self) -> ItemId {
        self.next_id += 1;
        ItemId::new(self.next_id)
    }

    fn push(&mut self, event: &Arc<BuildEvent>, kind: ItemKind) {
        let item = BuildEventItem::new(self.allocate_id(), Arc::clone(event), kind);
        let id = item.id();
        self.items.push(item);
        self.notify(SessionNotification::ItemAdded(id));
    }

    fn notify(&mut self, notification: SessionNotification) {
        if let Some(tx) = &self.notify_tx
            && tx.send(notification).is_err()
        {
            tracing::debug!("Notification receiver dropped");
            self.notify_tx = None;
        }
    }

    // ========================================================================
    // Children
    // ========================================================================

    /// Resolve (or return the memoized) children of `id`.
    pub async fn children(&mut self, id: ItemId) -> Result<Vec<BuildEventItem>, ChildrenError> {
        if let Some(cached) = self.children.get(&id) {
            return Ok(cached.clone());
        }
        let request = self.request_children(id)?;
        let resolved = request.resolve(&self.resolver).await?;
        self.commit_children(resolved)
    }

    /// Snapshot what computing the children of `id` needs.
    pub fn request_children(&self, id: ItemId) -> Result<ChildrenRequest, ChildrenError> {
        let item = self.item(id).ok_or(ChildrenError::UnknownItem(id))?;
        let work = match (item.kind(), item.event().payload()) {
            (ItemKind::ActionFailed { .. }, BuildEventPayload::Action(action)) => {
                match self.collector(&action.mnemonic) {
                    Some(collector) => Work::Scan(ProblemScan {
                        collector,
                        sources: self.options.diagnostic_stream.select(action),
                        encoding: self.options.encoding,
                        fallback: Vec::new(),
                    }),
                    None => Work::Ready(Vec::new()),
                }
            }
            (ItemKind::TestResultFailed, BuildEventPayload::TestResult(result)) => {
                let outputs: Vec<ItemKind> = result
                    .test_action_output
                    .iter()
                    .cloned()
                    .map(ItemKind::File)
                    .collect();
                match (self.collector(TEST_RUNNER_MNEMONIC), result.primary_output()) {
                    (Some(collector), Some(log)) => Work::Scan(ProblemScan {
                        collector,
                        sources: vec![log.clone()],
                        encoding: self.options.encoding,
                        fallback: outputs,
                    }),
                    _ => Work::Ready(outputs),
                }
            }
            (ItemKind::TargetComplete { icon, .. }, BuildEventPayload::Completed(completed)) => {
                let detail = completed
                    .failure_detail
                    .as_ref()
                    .filter(|_| *icon == TargetIcon::Stop);
                let kinds = match detail {
                    Some(detail) => vec![ItemKind::FailureDetail(detail.clone())],
                    None => self
                        .state
                        .collect_files_from_file_set_ids(&completed.file_set_ids())
                        .into_iter()
                        .map(ItemKind::File)
                        .collect(),
                };
                Work::Ready(kinds)
            }
            (ItemKind::ProblemFile { markers, .. }, _) => {
                Work::Ready(markers.iter().cloned().map(ItemKind::FileMarker).collect())
            }
            _ => Work::Ready(Vec::new()),
        };
        Ok(ChildrenRequest::new(self.generation, id, work))
    }

    /// Install resolved children. Results from an earlier generation are
    /// discarded and leave the session untouched.
    pub fn commit_children(
        &mut self,
        resolved: ResolvedChildren,
    ) -> Result<Vec<BuildEventItem>, ChildrenError> {
        if resolved.generation != self.generation {
            tracing::debug!(
                parent = %resolved.parent,
                resolved = resolved.generation,
                current = self.generation,
                "Discarding stale children"
            );
            return Err(ChildrenError::Stale {
                resolved: resolved.generation,
                current: self.generation,
            });
        }
        if let Some(cached) = self.children.get(&resolved.parent) {
            return Ok(cached.clone());
        }
        let event = self
            .item(resolved.parent)
            .map(|parent| Arc::clone(parent.event_arc()))
            .ok_or(ChildrenError::UnknownItem(resolved.parent))?;

        for (resource, found) in resolved.markers {
            let mut merged = self.markers.read(&MarkerFilter::all().resource(resource.as_str()));
            merged.extend(found);
            self.markers.set(resource.as_str(), merged);
            self.notify(SessionNotification::DiagnosticsUpdated { resource });
        }

        let children: Vec<BuildEventItem> = resolved
            .kinds
            .into_iter()
            .map(|kind| BuildEventItem::new(self.allocate_id(), Arc::clone(&event), kind))
            .collect();
        self.children.insert(resolved.parent, children.clone());
        Ok(children)
    }

    fn collector(&self, mnemonic: &str) -> Option<ProblemCollector> {
        self.matchers
            .collector(mnemonic)
            .map(|collector| collector.with_path_resolver(self.path_resolver()))
    }

    /// Substitutes the workspace placeholder in matched paths. Without a
    /// known root, paths stay workspace-relative.
    fn path_resolver(&self) -> PathResolver {
        let root = self
            .state
            .workspace_root()
            .map(|root| root.trim_end_matches('/').to_string());
        Arc::new(move |path: &str| match &root {
            Some(root) => path.replace(WORKSPACE_ROOT_PLACEHOLDER, root),
            None => path
                .replace(&format!("{WORKSPACE_ROOT_PLACEHOLDER}/"), "")
                .replace(WORKSPACE_ROOT_PLACEHOLDER, ""),
        })
    }

    /// Release everything held for the current build. Any child request
    /// still in flight becomes stale.
    pub fn dispose(&mut self) {
        self.reset();
        self.notify_tx = None;
        tracing::debug!(generation = self.generation, "Build event session disposed");
    }
}
