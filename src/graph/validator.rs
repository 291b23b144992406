//! Render Graph Validator
//!
//! Structural and semantic checks on a built graph. Error-severity entries
//! invalidate the build; warnings are advisory and configurable.

use super::types::{PassHandle, ResourceHandle};

/// Kinds of validation findings.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValidationErrorKind {
    /// Cycle in explicit deps or hazard-derived ordering.
    CircularDependency,
    /// A resource is read but never produced.
    MissingDependency,
    /// Explicit dependency violates a queue/lifetime rule.
    InvalidDependencyOrder,
    /// A pass references a freed or unknown handle.
    ResourceNotFound,
    /// Target state incompatible with declared usage flags.
    InvalidResourceState,
    /// Pass index outside the resource's usage interval.
    ResourceLifetimeViolation,
    /// Overlapping lifetimes of aliased transient resources.
    ResourceAliasHazard,
    /// Pass scope contradicts resource scope without view iteration.
    ViewScopeViolation,
    /// A per-view pass with no active views configured.
    ViewContextMissing,
    /// Scheduling could be improved (warning).
    SuboptimalScheduling,
    /// High memory usage detected (warning).
    MemoryPressure,
}

/// Severity classes of validation findings.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    /// Invalidates the build.
    Error,
    /// Advisory only.
    Warning,
}

impl ValidationErrorKind {
    /// The fixed severity of this kind.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::SuboptimalScheduling | Self::MemoryPressure => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// One validation finding.
#[derive(Clone, Debug)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Severity, defaulted from the kind; analyses may downgrade (e.g. an
    /// alias scope conflict is advisory while an overlap is fatal).
    pub severity: Severity,
    pub message: String,
    pub affected_passes: Vec<PassHandle>,
    pub affected_resources: Vec<ResourceHandle>,
}

impl ValidationError {
    /// Creates a finding with no affected handles attached.
    #[must_use]
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            message: message.into(),
            affected_passes: Vec::new(),
            affected_resources: Vec::new(),
        }
    }

    /// Overrides the default severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Attaches affected passes.
    #[must_use]
    pub fn with_passes(mut self, passes: &[PassHandle]) -> Self {
        self.affected_passes.extend_from_slice(passes);
        self
    }

    /// Attaches affected resources.
    #[must_use]
    pub fn with_resources(mut self, resources: &[ResourceHandle]) -> Self {
        self.affected_resources.extend_from_slice(resources);
        self
    }
}

/// Aggregated validation outcome.
#[derive(Default, Clone, Debug)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    /// Creates an empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a finding into the error or warning list by severity.
    pub fn add(&mut self, finding: ValidationError) {
        match finding.severity {
            Severity::Error => self.errors.push(finding),
            Severity::Warning => self.warnings.push(finding),
        }
    }

    /// Whether the build is valid (no error-severity findings).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of error-severity findings.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Merges another result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validator configuration.
#[derive(Clone, Debug)]
pub struct ValidatorConfig {
    /// Escalate advisory checks (currently: run them at all).
    pub strict_validation: bool,
    /// Emit `SuboptimalScheduling` / `MemoryPressure` warnings.
    pub performance_warnings: bool,
    /// Total-memory threshold for `MemoryPressure`.
    pub memory_pressure_threshold: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            strict_validation: true,
            performance_warnings: true,
            memory_pressure_threshold: 1024 * 1024 * 1024,
        }
    }
}

/// Render graph validator.
///
/// The structural checks themselves run inside `RenderGraphBuilder::build`,
/// which owns the expanded tables; this type carries configuration and
/// report generation.
#[derive(Default, Clone, Debug)]
pub struct GraphValidator {
    config: ValidatorConfig,
}

impl GraphValidator {
    /// Creates a validator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validator with explicit configuration.
    #[must_use]
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Enables or disables strict validation.
    pub fn set_strict_validation(&mut self, enabled: bool) {
        self.config.strict_validation = enabled;
    }

    /// Enables or disables performance warnings.
    pub fn set_performance_warnings(&mut self, enabled: bool) {
        self.config.performance_warnings = enabled;
    }

    /// Sets the memory-pressure warning threshold.
    pub fn set_memory_pressure_threshold(&mut self, bytes: u64) {
        self.config.memory_pressure_threshold = bytes;
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Renders a human-readable validation report.
    #[must_use]
    pub fn generate_report(&self, result: &ValidationResult, frame_index: u64) -> String {
        use std::fmt::Write;

        let mut report = String::from("=== Render Graph Validation Report ===\n");
        let _ = writeln!(report, "Frame: {frame_index}");
        let _ = writeln!(
            report,
            "Status: {}",
            if result.is_valid() { "VALID" } else { "INVALID" }
        );
        let _ = writeln!(report, "Errors: {}", result.error_count());
        let _ = writeln!(report, "Warnings: {}", result.warning_count());

        if !result.errors.is_empty() {
            report.push_str("\nErrors:\n");
            for e in &result.errors {
                let _ = writeln!(report, "- [{:?}] {}", e.kind, e.message);
            }
        }
        if !result.warnings.is_empty() {
            report.push_str("\nWarnings:\n");
            for w in &result.warnings {
                let _ = writeln!(report, "- [{:?}] {}", w.kind, w.message);
            }
        }
        report
    }
}
