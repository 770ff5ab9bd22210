//! Per-resource diagnostic markers for one build session.

use std::collections::HashMap;

use bep_types::{Marker, Severity};

/// Optional resource/severity restriction for [`MarkerRegistry::read`].
#[derive(Debug, Clone, Default)]
pub struct MarkerFilter {
    resource: Option<String>,
    min_severity: Option<Severity>,
}

impl MarkerFilter {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Keep markers of this severity or worse.
    #[must_use]
    pub fn severity_at_least(mut self, severity: Severity) -> Self {
        self.min_severity = Some(severity);
        self
    }

    fn accepts(&self, marker: &Marker) -> bool {
        self.min_severity
            .is_none_or(|min| marker.severity() >= min)
    }
}

#[derive(Debug, Default)]
pub struct MarkerRegistry {
    data: HashMap<String, Vec<Marker>>,
}

impl MarkerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all markers for `resource`. An empty list removes the resource.
    pub fn set(&mut self, resource: impl Into<String>, markers: Vec<Marker>) {
        let resource = resource.into();
        if markers.is_empty() {
            self.data.remove(&resource);
        } else {
            self.data.insert(resource, markers);
        }
    }

    /// Markers matching `filter`. Order across resources is unspecified;
    /// within a resource it is insertion order.
    #[must_use]
    pub fn read(&self, filter: &MarkerFilter) -> Vec<Marker> {
        let matching = |markers: &Vec<Marker>| {
            markers
                .iter()
                .filter(|marker| filter.accepts(marker))
                .cloned()
                .collect::<Vec<_>>()
        };
        match &filter.resource {
            Some(resource) => self.data.get(resource).map(matching).unwrap_or_default(),
            None => self.data.values().flat_map(matching).collect(),
        }
    }

    /// Resources currently holding markers, sorted with error-bearing ones first.
    #[must_use]
    pub fn resources(&self) -> Vec<&str> {
        let mut resources: Vec<&str> = self.data.keys().map(String::as_str).collect();
        resources.sort_by(|a, b| {
            let a_errors = self.has_errors(a);
            let b_errors = self.has_errors(b);
            b_errors.cmp(&a_errors).then_with(|| a.cmp(b))
        });
        resources
    }

    fn has_errors(&self, resource: &str) -> bool {
        self.data
            .get(resource)
            .is_some_and(|markers| markers.iter().any(|m| m.severity().is_error()))
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn count_where(&self, predicate: impl Fn(Severity) -> bool) -> usize {
        self.data
            .values()
            .flatten()
            .filter(|marker| predicate(marker.severity()))
            .count()
    }

    /// Error and fatal markers.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count_where(Severity::is_error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count_where(|severity| severity == Severity::Warning)
    }

    /// Format a compact status string like "E:3 W:5".
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!("E:{} W:{}", self.error_count(), self.warning_count())
    }
}
