//! Compiled matchers and the per-line stage machine.

use std::collections::HashMap;

use bep_types::{Marker, Severity};
use regex::{Captures, Regex};

use crate::error::MatcherError;
use crate::types::{ApplyTo, MatcherConfig, PatternConfig};

/// Capture slot: explicit group index, or conventional group names.
#[derive(Debug, Clone, Copy)]
struct Slot {
    index: Option<usize>,
    names: &'static [&'static str],
}

impl Slot {
    fn new(index: Option<usize>, names: &'static [&'static str]) -> Self {
        Self { index, names }
    }

    fn get<'h>(self, caps: &Captures<'h>) -> Option<&'h str> {
        let found = match self.index {
            Some(index) => caps.get(index),
            None => self.names.iter().find_map(|name| caps.name(name)),
        };
        found.map(|m| m.as_str()).filter(|text| !text.is_empty())
    }
}

#[derive(Debug)]
struct CompiledPattern {
    regex: Regex,
    file: Slot,
    line: Slot,
    column: Slot,
    end_line: Slot,
    end_column: Slot,
    severity: Slot,
    code: Slot,
    message: Slot,
    looping: bool,
}

impl CompiledPattern {
    fn compile(matcher: &str, config: &PatternConfig) -> Result<Self, MatcherError> {
        let regex = Regex::new(&config.regexp).map_err(|source| MatcherError::InvalidRegex {
            matcher: matcher.to_string(),
            source,
        })?;
        Ok(Self {
            regex,
            file: Slot::new(config.file, &["file"]),
            line: Slot::new(config.line, &["line"]),
            column: Slot::new(config.column, &["column", "col"]),
            end_line: Slot::new(config.end_line, &["end_line", "endLine"]),
            end_column: Slot::new(config.end_column, &["end_column", "endColumn"]),
            severity: Slot::new(config.severity, &["severity"]),
            code: Slot::new(config.code, &["code"]),
            message: Slot::new(config.message, &["message"]),
            looping: config.looping,
        })
    }
}

/// Fields accumulated across the stages of one multi-line match.
#[derive(Debug, Clone, Default)]
pub(crate) struct PartialMarker {
    file: Option<String>,
    line: Option<u32>,
    column: Option<u32>,
    end_line: Option<u32>,
    end_column: Option<u32>,
    severity: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

impl PartialMarker {
    fn absorb(&mut self, pattern: &CompiledPattern, caps: &Captures<'_>) {
        let text = |slot: Slot| slot.get(caps).map(str::to_string);
        let number = |slot: Slot| slot.get(caps).and_then(|t| t.parse::<u32>().ok());

        if let Some(file) = text(pattern.file) {
            self.file = Some(file);
        }
        if let Some(line) = number(pattern.line) {
            self.line = Some(line);
        }
        if let Some(column) = number(pattern.column) {
            self.column = Some(column);
        }
        if let Some(end_line) = number(pattern.end_line) {
            self.end_line = Some(end_line);
        }
        if let Some(end_column) = number(pattern.end_column) {
            self.end_column = Some(end_column);
        }
        if let Some(severity) = text(pattern.severity) {
            self.severity = Some(severity);
        }
        if let Some(code) = text(pattern.code) {
            self.code = Some(code);
        }
        if let Some(message) = text(pattern.message) {
            self.message = Some(message.trim().to_string());
        }
    }
}

/// Per-matcher progress through its stages.
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchState {
    stage: usize,
    partial: PartialMarker,
    in_loop: bool,
}

impl MatchState {
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug)]
struct BlockTriggers {
    begin: Regex,
    /// `None` means a blank line closes the block.
    end: Option<Regex>,
}

#[derive(Debug)]
pub(crate) struct CompiledMatcher {
    name: String,
    stages: Vec<CompiledPattern>,
    default_severity: Severity,
    severity_map: HashMap<String, Severity>,
    apply_to: ApplyTo,
    file_prefix: Option<String>,
    block: Option<BlockTriggers>,
}

impl CompiledMatcher {
    pub(crate) fn compile(config: &MatcherConfig) -> Result<Self, MatcherError> {
        if config.patterns.is_empty() {
            return Err(MatcherError::NoPatterns {
                matcher: config.name.clone(),
            });
        }
        let stages = config
            .patterns
            .iter()
            .map(|pattern| CompiledPattern::compile(&config.name, pattern))
            .collect::<Result<Vec<_>, _>>()?;

        let trigger = |source: &str| {
            Regex::new(source).map_err(|source| MatcherError::InvalidRegex {
                matcher: config.name.clone(),
                source,
            })
        };
        let block = match &config.begin {
            Some(begin) => Some(BlockTriggers {
                begin: trigger(begin.as_str())?,
                end: config.end.as_deref().map(trigger).transpose()?,
            }),
            None => {
                if config.end.is_some() {
                    tracing::warn!(
                        matcher = %config.name,
                        "Problem matcher has an end trigger without a begin trigger; ignoring it"
                    );
                }
                None
            }
        };

        Ok(Self {
            name: config.name.clone(),
            stages,
            default_severity: config.severity.unwrap_or(Severity::Error),
            severity_map: config
                .severity_map
                .iter()
                .map(|(text, severity)| (text.to_ascii_lowercase(), *severity))
                .collect(),
            apply_to: config.apply_to,
            file_prefix: config.file_prefix.clone(),
            block,
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_block(&self) -> bool {
        self.block.is_some()
    }

    pub(crate) fn begins_block(&self, line: &str) -> bool {
        self.block
            .as_ref()
            .is_some_and(|block| block.begin.is_match(line))
    }

    pub(crate) fn ends_block(&self, line: &str) -> bool {
        match &self.block {
            Some(BlockTriggers { end: Some(end), .. }) => end.is_match(line),
            Some(BlockTriggers { end: None, .. }) => line.trim().is_empty(),
            None => false,
        }
    }

    /// Advance `state` by one line. Returns the fields of a completed match.
    ///
    /// Stages never backtrack: a later stage failing drops the partial match
    /// and the failing line is not re-tried. A looping last stage that stops
    /// matching ends the loop, and that line is re-tried from the first stage.
    pub(crate) fn step(&self, state: &mut MatchState, line: &str) -> Option<PartialMarker> {
        let last = self.stages.len() - 1;
        let pattern = &self.stages[state.stage];

        let Some(caps) = pattern.regex.captures(line) else {
            if state.in_loop {
                state.reset();
                return self.step(state, line);
            }
            state.reset();
            return None;
        };

        if state.stage < last {
            state.partial.absorb(pattern, &caps);
            state.stage += 1;
            return None;
        }

        let mut data = state.partial.clone();
        data.absorb(pattern, &caps);
        if pattern.looping && last > 0 {
            state.in_loop = true;
        } else {
            state.reset();
        }
        Some(data)
    }

    /// Turn completed fields into a marker. Matches without a file or message
    /// are dropped, as are markers filtered out by `apply_to`.
    pub(crate) fn finish(
        &self,
        data: PartialMarker,
        resolve_path: &dyn Fn(&str) -> String,
    ) -> Option<Marker> {
        let file = data.file?;
        let message = data.message.filter(|m| !m.is_empty())?;
        let severity = self.severity_of(data.severity.as_deref());
        if self.apply_to == ApplyTo::Diagnostics && severity < Severity::Warning {
            return None;
        }

        let path = match &self.file_prefix {
            Some(prefix) if !is_absolute(&file) => format!("{prefix}{file}"),
            _ => file,
        };
        let line = data.line.unwrap_or(1);
        let column = data.column.unwrap_or(1);
        let mut marker = Marker::new(resolve_path(&path), severity, message)
            .at(line, column)
            .to(
                data.end_line.unwrap_or(line),
                data.end_column.unwrap_or(column),
            );
        if let Some(code) = data.code {
            marker = marker.with_code(code);
        }
        Some(marker)
    }

    fn severity_of(&self, captured: Option<&str>) -> Severity {
        let Some(text) = captured else {
            return self.default_severity;
        };
        self.severity_map
            .get(&text.trim().to_ascii_lowercase())
            .copied()
            .or_else(|| Severity::parse(text))
            .unwrap_or(self.default_severity)
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || path.contains("://")
}
