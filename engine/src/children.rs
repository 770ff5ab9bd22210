//! Lazy child computation for expandable items.
//!
//! Expanding an item is split in three so the caller never holds the session
//! across I/O: the session snapshots what it needs into a [`ChildrenRequest`],
//! the request resolves against a [`ByteStreamResolver`] without touching the
//! session, and the session commits the result only if the build generation
//! it was taken from is still current.

use std::collections::BTreeMap;

use bep_matcher::{LineDecoder, ProblemCollector};
use bep_types::{File, Marker};
use encoding_rs::Encoding;

use crate::error::ChildrenError;
use crate::item::{ItemId, ItemKind};
use crate::resolver::{ByteStreamResolver, file_contents};

/// Snapshot of the work needed to produce one item's children.
pub struct ChildrenRequest {
    generation: u64,
    parent: ItemId,
    work: Work,
}

pub(crate) enum Work {
    /// Children known without I/O.
    Ready(Vec<ItemKind>),
    Scan(ProblemScan),
}

/// Tool output to run through a problem collector.
pub(crate) struct ProblemScan {
    pub(crate) collector: ProblemCollector,
    pub(crate) sources: Vec<File>,
    pub(crate) encoding: &'static Encoding,
    /// Children used when the scan yields no markers.
    pub(crate) fallback: Vec<ItemKind>,
}

/// Children computed for a request, not yet committed to the session.
#[derive(Debug)]
pub struct ResolvedChildren {
    pub(crate) generation: u64,
    pub(crate) parent: ItemId,
    pub(crate) kinds: Vec<ItemKind>,
    pub(crate) markers: BTreeMap<String, Vec<Marker>>,
}

impl ResolvedChildren {
    #[must_use]
    pub fn parent(&self) -> ItemId {
        self.parent
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl ChildrenRequest {
    pub(crate) fn new(generation: u64, parent: ItemId, work: Work) -> Self {
        Self {
            generation,
            parent,
            work,
        }
    }

    #[must_use]
    pub fn parent(&self) -> ItemId {
        self.parent
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Fetch and scan whatever the children depend on.
    ///
    /// A source that cannot be read fails this request only.
    pub async fn resolve<R>(self, resolver: &R) -> Result<ResolvedChildren, ChildrenError>
    where
        R: ByteStreamResolver,
    {
        let (kinds, markers) = match self.work {
            Work::Ready(kinds) => (kinds, BTreeMap::new()),
            Work::Scan(scan) => scan.run(resolver).await?,
        };
        Ok(ResolvedChildren {
            generation: self.generation,
            parent: self.parent,
            kinds,
            markers,
        })
    }
}

type ScanOutput = (Vec<ItemKind>, BTreeMap<String, Vec<Marker>>);

impl ProblemScan {
    async fn run<R>(mut self, resolver: &R) -> Result<ScanOutput, ChildrenError>
    where
        R: ByteStreamResolver,
    {
        let mut markers: BTreeMap<String, Vec<Marker>> = BTreeMap::new();
        for source in &self.sources {
            let bytes = file_contents(source, resolver).await?;
            let lines = LineDecoder::decode_all(self.encoding, &bytes);
            tracing::debug!(source = %source.name, lines = lines.len(), "Scanning tool output");
            for (resource, found) in self.collector.parse(lines)? {
                markers.entry(resource).or_default().extend(found);
            }
        }
        self.collector.dispose();

        if markers.is_empty() {
            return Ok((self.fallback, markers));
        }
        let kinds = markers
            .iter()
            .map(|(resource, found)| ItemKind::ProblemFile {
                resource: resource.clone(),
                markers: found.clone(),
            })
            .collect();
        Ok((kinds, markers))
    }
}
