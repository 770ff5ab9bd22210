//! Core engine for the build event client - state tracking and classification.
//!
//! A [`BuildEventSession`] consumes decoded build events in stream order,
//! tracks per-build state (named file sets, configured targets), and keeps
//! the list of presentable [`BuildEventItem`]s. Children of failed actions
//! and tests are computed lazily by running the action output through the
//! problem matchers registered for its mnemonic.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod children;
mod error;
mod item;
mod resolver;
mod session;
mod state;

pub use children::{ChildrenRequest, ResolvedChildren};
pub use error::{ChildrenError, ResolveError};
pub use item::{BuildEventItem, ItemId, ItemKind};
pub use resolver::{ByteStreamResolver, FileUriResolver, file_contents};
pub use session::{
    BuildEventSession, DiagnosticStream, EVENT_CHANNEL_CAPACITY, SessionNotification,
    SessionOptions, TEST_RUNNER_MNEMONIC,
};
pub use state::{BuildPhase, BuildState, TargetIcon};
