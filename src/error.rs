//! Compilation Errors
//!
//! Fatal conditions raised while loading a draft, inferring its edges, or
//! validating the wired graph. Any of these aborts the compilation of that
//! one workflow; nothing is partially emitted.
//!
//! Non-fatal outcomes (structural duplicates, an exhausted isomorphism
//! budget) are not errors and are reported through
//! [`DuplicateCheck`](crate::isomorphism::DuplicateCheck) instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the compiler.
pub type Result<T> = std::result::Result<T, InferenceError>;

/// Errors that abort the compilation of a single workflow.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Definition not found for step '{step}': '{run}' could not be resolved from the configured search paths")]
    DefinitionNotFound { step: String, run: String },

    #[error("Missing required input parameter '{port}' of '{step}': no compatible source, no default value")]
    MissingRequiredInput { step: String, port: String },

    #[error("Ambiguous binding for '{step}/{port}': equally specific candidates {}", .candidates.join(", "))]
    AmbiguousBinding {
        step: String,
        port: String,
        candidates: Vec<String>,
    },

    #[error("Cyclic dependency between steps: {}", .steps.join(", "))]
    CyclicDependency { steps: Vec<String> },

    #[error("Workflow '{0}' has no steps")]
    EmptyWorkflow(String),

    #[error("Duplicate step ID: '{0}'")]
    DuplicateStepId(String),

    #[error("Duplicate port ID '{port}' on '{step}'")]
    DuplicatePortId { step: String, port: String },

    #[error("'{step}' has no input port named '{port}'")]
    UnknownPort { step: String, port: String },

    #[error("Step '{step}' scatters over '{port}', which is not one of its input ports")]
    UnknownScatterPort { step: String, port: String },

    #[error("Binding for '{step}/{port}' references unknown source '{reference}'")]
    UnknownSource {
        step: String,
        port: String,
        reference: String,
    },

    #[error("Binding for '{step}/{port}' is incompatible: '{reference}' produces {source_type} but the port expects {sink_type}")]
    IncompatibleBinding {
        step: String,
        port: String,
        reference: String,
        source_type: String,
        sink_type: String,
    },

    #[error("Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{origin}': {message}")]
    Parse { origin: String, message: String },

    #[error("Failed to emit workflow '{workflow}': {message}")]
    Emit { workflow: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl InferenceError {
    /// Returns true for failures that fragment workflows (sub-workflows
    /// with deliberately free inputs) are expected to raise.
    pub fn is_expected_for_fragment(&self) -> bool {
        matches!(self, Self::MissingRequiredInput { .. })
    }

    /// Builds an [`InferenceError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an [`InferenceError::Parse`] for the given origin.
    pub fn parse(origin: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_binding_lists_candidates() {
        let err = InferenceError::AmbiguousBinding {
            step: "B".to_string(),
            port: "f2".to_string(),
            candidates: vec!["A/f1".to_string(), "C/f1b".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("B/f2"));
        assert!(message.contains("A/f1, C/f1b"));
    }

    #[test]
    fn test_missing_required_input_is_expected_for_fragments() {
        let err = InferenceError::MissingRequiredInput {
            step: "append".to_string(),
            port: "file".to_string(),
        };
        assert!(err.is_expected_for_fragment());
        assert!(err.to_string().contains("Missing required input parameter"));

        let err = InferenceError::CyclicDependency {
            steps: vec!["a".to_string(), "b".to_string()],
        };
        assert!(!err.is_expected_for_fragment());
    }

    #[test]
    fn test_io_error_display() {
        let err = InferenceError::io(
            "/missing/draft.yml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        assert!(err.to_string().contains("/missing/draft.yml"));
    }
}
