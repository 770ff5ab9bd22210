//! Build event stream replay for the `bep` binary.
//!
//! ```text
//! events.json -> stream_events() -> mpsc -> BuildEventSession::poll_events()
//!                                                  |
//!                                                  v
//!                                   render() -> expanded item tree
//! ```

mod render;
mod replay;

pub use render::{RenderOptions, render};
pub use replay::{POLL_INTERVAL, build_outcome, replay, stream_events};
