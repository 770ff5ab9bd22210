use std::io;
use std::path::PathBuf;

use bep_matcher::MatcherError;
use thiserror::Error;

use crate::item::ItemId;

/// Failure fetching the bytes behind a build output file.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unsupported URI scheme '{scheme}' in {uri}")]
    UnsupportedScheme { uri: String, scheme: String },
    #[error("invalid file URI: {uri}")]
    InvalidUri { uri: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("file '{name}' has neither inline contents nor a URI")]
    MissingContent { name: String },
}

/// Failure resolving the lazy children of one item.
#[derive(Debug, Error)]
pub enum ChildrenError {
    #[error("no item with id {0}")]
    UnknownItem(ItemId),
    #[error("children resolved for build generation {resolved}, current is {current}")]
    Stale { resolved: u64, current: u64 },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Matcher(#[from] MatcherError),
}
