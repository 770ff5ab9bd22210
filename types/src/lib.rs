//! Core domain types for the build event stream.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Decoded build events, output file references, and diagnostic markers live here so
//! every layer (matcher, engine, CLI) can share them.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod event;
pub mod json;
mod marker;

pub use event::{
    ActionExecuted, BuildEvent, BuildEventId, BuildEventPayload, BuildFinished, BuildStarted,
    EventKind, ExitCode, FailureDetail, File, FileSetRef, NamedSetOfFiles, OutputGroup,
    TargetComplete, TargetConfigured, TestResult, TestStatus, WorkspaceConfig,
};
pub use marker::{Marker, Severity};
