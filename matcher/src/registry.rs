//! Problem matchers registered by action mnemonic.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bep_types::Marker;

use crate::collector::ProblemCollector;
use crate::error::MatcherError;
use crate::pattern::CompiledMatcher;
use crate::types::{MatcherConfig, ProblemMatchersConfig};

/// Compiled matcher lists keyed by mnemonic.
///
/// Constructed explicitly and owned by the session that uses it. A mnemonic
/// whose configuration failed to compile stays registered with its error so
/// the failure is reported when that mnemonic is requested.
#[derive(Debug, Default)]
pub struct ProblemMatcherRegistry {
    entries: HashMap<String, Result<Arc<[CompiledMatcher]>, String>>,
}

impl ProblemMatcherRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile every mnemonic in `config`. Compilation failures are kept,
    /// not returned; they surface at [`ProblemMatcherRegistry::collector`].
    #[must_use]
    pub fn from_config(config: &ProblemMatchersConfig) -> Self {
        let mut registry = Self::new();
        for (mnemonic, matchers) in config {
            if let Err(e) = registry.register(mnemonic, matchers) {
                tracing::warn!(mnemonic = %mnemonic, "Invalid problem matcher configuration: {e}");
            }
        }
        registry
    }

    /// Register (or replace) the ordered matcher list for `mnemonic`.
    pub fn register(
        &mut self,
        mnemonic: &str,
        matchers: &[MatcherConfig],
    ) -> Result<(), MatcherError> {
        let compiled = matchers
            .iter()
            .map(CompiledMatcher::compile)
            .collect::<Result<Vec<_>, _>>();
        match compiled {
            Ok(compiled) => {
                self.entries
                    .insert(mnemonic.to_string(), Ok(Arc::from(compiled)));
                Ok(())
            }
            Err(e) => {
                self.entries.insert(mnemonic.to_string(), Err(e.to_string()));
                Err(e)
            }
        }
    }

    /// Whether a usable matcher list exists for `mnemonic`.
    #[must_use]
    pub fn contains(&self, mnemonic: &str) -> bool {
        matches!(self.entries.get(mnemonic), Some(Ok(_)))
    }

    #[must_use]
    pub fn mnemonics(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// A fresh collector for `mnemonic`, or `None` when no usable matcher is
    /// available (unregistered, or its configuration failed to compile).
    #[must_use]
    pub fn collector(&self, mnemonic: &str) -> Option<ProblemCollector> {
        match self.entries.get(mnemonic) {
            Some(Ok(matchers)) => Some(ProblemCollector::new(Arc::clone(matchers))),
            Some(Err(reason)) => {
                tracing::warn!(mnemonic = %mnemonic, "No problem matcher available: {reason}");
                None
            }
            None => {
                tracing::debug!(mnemonic = %mnemonic, "No problem matcher registered");
                None
            }
        }
    }

    /// One-shot parse of `lines` with the matchers for `mnemonic`.
    /// Returns an empty map when no matcher is available.
    pub fn parse<I>(
        &self,
        mnemonic: &str,
        lines: I,
    ) -> Result<BTreeMap<String, Vec<Marker>>, MatcherError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let Some(mut collector) = self.collector(mnemonic) else {
            return Ok(BTreeMap::new());
        };
        let result = collector.parse(lines);
        collector.dispose();
        result
    }
}
