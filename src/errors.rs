//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`EngineError`] covers all failure modes including:
//! - Container mount and validation failures
//! - Asset and resource decoding errors
//! - Dependency graph violations
//! - Render graph build failures
//! - Cooperative cancellation
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, EngineError>`.
//!
//! Note that a *missing* asset is not an error: lookups for unknown keys
//! surface as `None` so callers can fall back without unwinding.

use thiserror::Error;

/// The main error type for the Cadence engine.
///
/// This enum covers all possible error conditions that can occur
/// during engine operation. Each variant provides specific context
/// about what went wrong.
#[derive(Error, Debug)]
pub enum EngineError {
    // ========================================================================
    // Container & Mount Errors
    // ========================================================================
    /// A mounted container failed structural or schema validation.
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// A cooked descriptor's SHA-256 digest did not match the index entry.
    #[error("Content hash mismatch for descriptor '{path}'")]
    ContentHashMismatch {
        /// Relative path of the offending descriptor file
        path: String,
    },

    // ========================================================================
    // Asset & Resource Errors
    // ========================================================================
    /// Malformed cooked payload encountered while decoding.
    #[error("Resource decode error: {0}")]
    ResourceDecode(String),

    /// No loader was registered for the requested asset/resource type.
    #[error("No loader registered for type '{0}'")]
    LoaderDispatch(&'static str),

    /// Inserting a dependency edge would create a cycle.
    #[error("Dependency cycle: edge {from} -> {to} would close a loop")]
    CycleDetected {
        /// Key of the dependent asset
        from: String,
        /// Key of the dependency
        to: String,
    },

    // ========================================================================
    // Render Graph Errors
    // ========================================================================
    /// A built render graph failed validation with error-severity entries.
    #[error("Render graph validation failed: {errors} error(s), {warnings} warning(s)")]
    GraphValidationFailed {
        /// Number of error-severity entries
        errors: usize,
        /// Number of warning-severity entries
        warnings: usize,
    },

    /// The executor refused to run a graph with an empty schedule.
    #[error("Render graph has no executable schedule: {0}")]
    EmptySchedule(String),

    // ========================================================================
    // I/O & Binary Parsing Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A binary read ran past the end of the backing buffer.
    #[error("Truncated read: {context} (wanted {wanted} bytes at offset {offset})")]
    TruncatedRead {
        /// Description of what was being parsed
        context: &'static str,
        /// Number of bytes requested
        wanted: usize,
        /// Offset at which the read was attempted
        offset: usize,
    },

    // ========================================================================
    // Concurrency Errors
    // ========================================================================
    /// A cooperative operation observed cancellation.
    #[error("Operation canceled")]
    Canceled,

    /// Task pool construction or join failure.
    #[error("Task pool error: {0}")]
    TaskPool(String),

    /// A module hook returned an error; carried by the manager for logging.
    #[error("Module '{module}' failed during {phase}: {message}")]
    ModuleFailure {
        /// Name of the failing module
        module: String,
        /// Phase during which the failure occurred
        phase: &'static str,
        /// Diagnostic message
        message: String,
    },
}

/// Alias for `Result<T, EngineError>`.
pub type Result<T> = std::result::Result<T, EngineError>;
