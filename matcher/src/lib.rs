//! Problem matching for build tool output.
//!
//! Raw bytes from an action's stdout/stderr go through [`LineDecoder`], the
//! resulting lines through a [`ProblemCollector`] selected by mnemonic from a
//! [`ProblemMatcherRegistry`], and the markers land in a [`MarkerRegistry`].

pub mod decoder;
pub mod types;

pub(crate) mod pattern;

mod collector;
mod error;
mod markers;
mod registry;

pub use collector::{Markers, PathResolver, ProblemCollector};
pub use decoder::{LineDecoder, Lines};
pub use error::{MatcherError, UnknownEncoding};
pub use markers::{MarkerFilter, MarkerRegistry};
pub use registry::ProblemMatcherRegistry;
pub use types::{
    ApplyTo, MatcherConfig, PatternConfig, ProblemMatchersConfig, WORKSPACE_ROOT_PLACEHOLDER,
    builtin_matchers,
};
