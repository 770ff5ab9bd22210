//! Diagnostic markers produced from tool output.

use std::fmt;

use serde::Deserialize;

/// Severity level for a marker, ordered by increasing priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// Lenient parse of captured severity text.
    ///
    /// Returns `None` for unrecognised words; callers decide the fallback.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "info" | "information" | "note" | "hint" => Some(Self::Info),
            "warning" | "warn" => Some(Self::Warning),
            "error" | "err" => Some(Self::Error),
            "fatal" | "fatal error" => Some(Self::Fatal),
            _ => None,
        }
    }

    /// Error or worse.
    #[must_use]
    pub fn is_error(self) -> bool {
        self >= Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One diagnostic location.
///
/// Lines and columns are 1-based as produced by tools; consumers normalize
/// to their own indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    resource: String,
    severity: Severity,
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
    message: String,
    code: Option<String>,
}

impl Marker {
    /// A marker at line 1, column 1; narrow it with [`Marker::at`] / [`Marker::to`].
    #[must_use]
    pub fn new(resource: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            severity,
            start_line: 1,
            start_column: 1,
            end_line: 1,
            end_column: 1,
            message: message.into(),
            code: None,
        }
    }

    /// Set the start position; the end collapses onto it.
    #[must_use]
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.start_line = line.max(1);
        self.start_column = column.max(1);
        self.end_line = self.start_line;
        self.end_column = self.start_column;
        self
    }

    /// Set the end position. Ends before the start are clamped to the start.
    #[must_use]
    pub fn to(mut self, line: u32, column: u32) -> Self {
        if (line, column) >= (self.start_line, self.start_column) {
            self.end_line = line;
            self.end_column = column;
        }
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    #[must_use]
    pub fn start_column(&self) -> u32 {
        self.start_column
    }

    #[must_use]
    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    #[must_use]
    pub fn end_column(&self) -> u32 {
        self.end_column
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Optional category or tool-specific code.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl fmt::Display for Marker {
    /// `resource:line:col: severity: message`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: ",
            self.resource, self.start_line, self.start_column, self.severity
        )?;
        if let Some(code) = &self.code {
            write!(f, "[{code}] ")?;
        }
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
        assert!(Severity::Fatal.is_error());
        assert!(!Severity::Warning.is_error());
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("Error"), Some(Severity::Error));
        assert_eq!(Severity::parse("warn"), Some(Severity::Warning));
        assert_eq!(Severity::parse("note"), Some(Severity::Info));
        assert_eq!(Severity::parse("fatal error"), Some(Severity::Fatal));
        assert_eq!(Severity::parse("bogus"), None);
    }

    #[test]
    fn test_marker_positions() {
        let marker = Marker::new("a.cc", Severity::Error, "boom").at(10, 5);
        assert_eq!((marker.start_line(), marker.start_column()), (10, 5));
        assert_eq!((marker.end_line(), marker.end_column()), (10, 5));

        let marker = marker.to(12, 1);
        assert_eq!((marker.end_line(), marker.end_column()), (12, 1));
    }

    #[test]
    fn test_marker_end_before_start_is_ignored() {
        let marker = Marker::new("a.cc", Severity::Error, "boom").at(10, 5).to(3, 1);
        assert_eq!((marker.end_line(), marker.end_column()), (10, 5));
    }

    #[test]
    fn test_marker_display() {
        let marker = Marker::new("foo/bar.cc", Severity::Error, "missing semicolon")
            .at(10, 5)
            .with_code("C2143");
        assert_eq!(
            marker.to_string(),
            "foo/bar.cc:10:5: error: [C2143] missing semicolon"
        );
    }
}
