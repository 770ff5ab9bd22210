//! Stateful line-by-line problem collection.
//!
//! A [`ProblemCollector`] runs an ordered list of compiled matchers over a
//! sequence of lines. Bare matchers emit markers as soon as their last stage
//! matches. Block matchers (with a begin trigger) take over every line between
//! their begin and end triggers and release the collected markers when the
//! block closes, or when [`ProblemCollector::done`] flushes it.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use bep_types::Marker;

use crate::error::MatcherError;
use crate::pattern::{CompiledMatcher, MatchState};

/// Maps a matched file path (possibly containing the workspace root
/// placeholder) to the final marker resource.
pub type PathResolver = Arc<dyn Fn(&str) -> String + Send + Sync>;

struct ActiveBlock {
    matcher: usize,
    state: MatchState,
    collected: Vec<Marker>,
}

struct CollectorState {
    matchers: Arc<[CompiledMatcher]>,
    states: Vec<MatchState>,
    block: Option<ActiveBlock>,
    resolve_path: PathResolver,
}

impl CollectorState {
    fn process(&mut self, raw: &str, out: &mut VecDeque<Marker>) {
        let line = strip_ansi_escapes::strip_str(raw);
        let matchers = Arc::clone(&self.matchers);

        if let Some(block) = &mut self.block {
            let matcher = &matchers[block.matcher];
            if matcher.ends_block(&line) {
                tracing::trace!(
                    matcher = matcher.name(),
                    markers = block.collected.len(),
                    "Problem block closed"
                );
                out.extend(block.collected.drain(..));
                self.block = None;
                return;
            }
            if let Some(marker) = matcher
                .step(&mut block.state, &line)
                .and_then(|data| matcher.finish(data, &*self.resolve_path))
            {
                block.collected.push(marker);
            }
            return;
        }

        if let Some(index) = matchers.iter().position(|m| m.begins_block(&line)) {
            tracing::trace!(matcher = matchers[index].name(), "Problem block opened");
            self.reset_states();
            self.block = Some(ActiveBlock {
                matcher: index,
                state: MatchState::default(),
                collected: Vec::new(),
            });
            return;
        }

        let mut winner = None;
        for (index, matcher) in matchers.iter().enumerate() {
            if matcher.is_block() {
                continue;
            }
            if let Some(data) = matcher.step(&mut self.states[index], &line) {
                if let Some(marker) = matcher.finish(data, &*self.resolve_path) {
                    out.push_back(marker);
                }
                winner = Some(index);
                break;
            }
        }

        // The winning matcher consumed the line; other partial matches are void.
        if let Some(winner) = winner {
            for (index, state) in self.states.iter_mut().enumerate() {
                if index != winner {
                    state.reset();
                }
            }
        }
    }

    fn flush(&mut self) -> Vec<Marker> {
        self.reset_states();
        self.block
            .take()
            .map(|block| block.collected)
            .unwrap_or_default()
    }

    fn reset_states(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }
}

/// Pull-based problem matcher run over one stream of tool output.
pub struct ProblemCollector {
    /// `None` once disposed.
    state: Option<CollectorState>,
}

impl ProblemCollector {
    pub(crate) fn new(matchers: Arc<[CompiledMatcher]>) -> Self {
        let states = vec![MatchState::default(); matchers.len()];
        Self {
            state: Some(CollectorState {
                matchers,
                states,
                block: None,
                resolve_path: Arc::new(|path: &str| path.to_string()),
            }),
        }
    }

    /// Install the resolver applied to every matched path.
    #[must_use]
    pub fn with_path_resolver(mut self, resolver: PathResolver) -> Self {
        if let Some(state) = &mut self.state {
            state.resolve_path = resolver;
        }
        self
    }

    /// Iterate the markers produced while consuming `lines`.
    ///
    /// ANSI escape sequences are stripped before matching. Markers inside a
    /// block that is still open when `lines` runs out are released by
    /// [`ProblemCollector::done`].
    pub fn markers<I>(&mut self, lines: I) -> Result<Markers<'_, I::IntoIter>, MatcherError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let state = self.state.as_mut().ok_or(MatcherError::Disposed)?;
        Ok(Markers {
            state,
            lines: lines.into_iter(),
            pending: VecDeque::new(),
        })
    }

    /// End of input: release markers of a still-open block and drop any
    /// incomplete multi-line match. The collector may be reused afterwards.
    pub fn done(&mut self) -> Result<Vec<Marker>, MatcherError> {
        let state = self.state.as_mut().ok_or(MatcherError::Disposed)?;
        Ok(state.flush())
    }

    /// Run `lines` to completion and group the markers by resource.
    /// Within a resource, markers keep their output order.
    pub fn parse<I>(&mut self, lines: I) -> Result<BTreeMap<String, Vec<Marker>>, MatcherError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut grouped: BTreeMap<String, Vec<Marker>> = BTreeMap::new();
        let mut add = |marker: Marker| {
            grouped
                .entry(marker.resource().to_string())
                .or_default()
                .push(marker);
        };
        for marker in self.markers(lines)? {
            add(marker);
        }
        for marker in self.done()? {
            add(marker);
        }
        Ok(grouped)
    }

    /// Release the compiled matchers. Any later use fails with [`MatcherError::Disposed`].
    pub fn dispose(&mut self) {
        self.state = None;
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.is_none()
    }
}

/// Iterator returned by [`ProblemCollector::markers`].
pub struct Markers<'a, I> {
    state: &'a mut CollectorState,
    lines: I,
    pending: VecDeque<Marker>,
}

impl<I> Iterator for Markers<'_, I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = Marker;

    fn next(&mut self) -> Option<Marker> {
        loop {
            if let Some(marker) = self.pending.pop_front() {
                return Some(marker);
            }
            let line = self.lines.next()?;
            self.state.process(line.as_ref(), &mut self.pending);
        }
    }
}
