//! Problem matcher configuration types.
//!
//! These types define the interface between `bep-matcher` and `bep-config`.
//! Settings deserialize into [`ProblemMatchersConfig`], keyed by the action
//! mnemonic each ordered list of matchers applies to.

use std::collections::{BTreeMap, HashMap};

use bep_types::Severity;
use serde::Deserialize;

/// Token in matcher output paths replaced by the caller's workspace root.
pub const WORKSPACE_ROOT_PLACEHOLDER: &str = "${workspaceRoot}";

/// Ordered matcher definitions keyed by mnemonic (e.g. "CppCompile").
pub type ProblemMatchersConfig = BTreeMap<String, Vec<MatcherConfig>>;

/// Which markers a matcher keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyTo {
    /// Every marker produced from every line.
    #[default]
    All,
    /// Only warnings and worse; informational markers are dropped.
    Diagnostics,
}

/// One named problem matcher.
#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    pub name: String,
    /// Severity used when a pattern captures none (or an unrecognised one). Default: error.
    #[serde(default)]
    pub severity: Option<Severity>,
    /// Captured severity text (case-insensitive) → severity.
    #[serde(default)]
    pub severity_map: HashMap<String, Severity>,
    #[serde(default)]
    pub apply_to: ApplyTo,
    /// Prepended to relative file paths, e.g. `"${workspaceRoot}/"`.
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Block start trigger. When set, the matcher only runs inside blocks.
    #[serde(default)]
    pub begin: Option<String>,
    /// Block end trigger. Default: a blank line.
    #[serde(default)]
    pub end: Option<String>,
    /// Pattern stages, matched against consecutive lines.
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternConfig>,
}

impl MatcherConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, patterns: Vec<PatternConfig>) -> Self {
        Self {
            name: name.into(),
            severity: None,
            severity_map: HashMap::new(),
            apply_to: ApplyTo::All,
            file_prefix: None,
            begin: None,
            end: None,
            patterns,
        }
    }

    #[must_use]
    pub fn with_block(mut self, begin: impl Into<String>, end: Option<String>) -> Self {
        self.begin = Some(begin.into());
        self.end = end;
        self
    }

    #[must_use]
    pub fn with_severity_map(mut self, text: &str, severity: Severity) -> Self {
        self.severity_map.insert(text.to_string(), severity);
        self
    }
}

/// One regex stage. Capture groups are located either by explicit index or
/// by conventional group name (`file`, `line`, `column`/`col`, `end_line`,
/// `end_column`, `severity`, `code`, `message`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatternConfig {
    pub regexp: String,
    #[serde(default)]
    pub file: Option<usize>,
    #[serde(default)]
    pub line: Option<usize>,
    #[serde(default)]
    pub column: Option<usize>,
    #[serde(default)]
    pub end_line: Option<usize>,
    #[serde(default)]
    pub end_column: Option<usize>,
    #[serde(default)]
    pub severity: Option<usize>,
    #[serde(default)]
    pub code: Option<usize>,
    #[serde(default)]
    pub message: Option<usize>,
    /// Last stage only: keep matching consecutive lines, one marker each.
    #[serde(default, rename = "loop")]
    pub looping: bool,
}

impl PatternConfig {
    #[must_use]
    pub fn new(regexp: impl Into<String>) -> Self {
        Self {
            regexp: regexp.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }
}

/// Pattern shared by gcc/clang, javac and the Go toolchain.
const FILE_LINE_COL_PATTERN: &str = r"^(?<file>[^:\s]+):(?<line>\d+):(?:(?<column>\d+):)?\s*(?<severity>fatal error|error|warning|note)?:?\s*(?<message>.+)$";

/// Matchers registered when no configuration provides any.
#[must_use]
pub fn builtin_matchers() -> ProblemMatchersConfig {
    let compile = |name: &str| {
        let mut matcher = MatcherConfig::new(name, vec![PatternConfig::new(FILE_LINE_COL_PATTERN)]);
        matcher.file_prefix = Some(format!("{WORKSPACE_ROOT_PLACEHOLDER}/"));
        matcher.severity_map.insert("fatal error".to_string(), Severity::Fatal);
        matcher
    };

    let mut config = ProblemMatchersConfig::new();
    for mnemonic in ["CppCompile", "ObjcCompile", "GoCompile", "GoCompilePkg"] {
        config.insert(mnemonic.to_string(), vec![compile("gcc")]);
    }
    config.insert("Javac".to_string(), vec![compile("javac")]);

    let mut test_runner = compile("test");
    test_runner.apply_to = ApplyTo::Diagnostics;
    config.insert("TestRunner".to_string(), vec![test_runner]);
    config
}
