//! Tool Definition Loading
//!
//! Resolves a step's `run` reference into its typed port signature.
//!
//! - [`InMemoryLoader`]: definitions registered up front (tests, embedding)
//! - [`SearchPathLoader`]: CWL-style descriptors found on disk

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use super::model::Port;
use super::parser::parse_tool_definition;
use crate::error::{InferenceError, Result};

/// Extensions tried, in order, when a `run` reference has none.
const DESCRIPTOR_EXTENSIONS: &[&str] = &["cwl", "yml", "yaml"];

/// The typed port signature of a tool or sub-workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub id: String,
    pub inputs: Vec<Port>,
    pub outputs: Vec<Port>,
}

impl ToolDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, port: Port) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn with_output(mut self, port: Port) -> Self {
        self.outputs.push(port);
        self
    }
}

/// Source of tool definitions.
///
/// Returns `Ok(None)` when `run` cannot be resolved; the draft parser turns
/// that into [`InferenceError::DefinitionNotFound`] naming the step.
pub trait DefinitionLoader: Send + Sync {
    fn load(&self, run: &str) -> Result<Option<ToolDefinition>>;
}

/// Loader backed by a map of registered definitions.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    definitions: HashMap<String, ToolDefinition>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition under `run`.
    pub fn register(&mut self, run: impl Into<String>, definition: ToolDefinition) {
        self.definitions.insert(run.into(), definition);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, run: impl Into<String>, definition: ToolDefinition) -> Self {
        self.register(run, definition);
        self
    }
}

impl DefinitionLoader for InMemoryLoader {
    fn load(&self, run: &str) -> Result<Option<ToolDefinition>> {
        Ok(self.definitions.get(run).cloned())
    }
}

/// Loader that searches a list of directories for tool descriptors.
///
/// For each reference it tries the reference itself as a path, then for
/// every search path `<dir>/<run>` followed by `<dir>/<run>.cwl`,
/// `<dir>/<run>.yml` and `<dir>/<run>.yaml`.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLoader {
    search_paths: Vec<PathBuf>,
}

impl SearchPathLoader {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Finds the descriptor file for `run`, if any.
    pub fn locate(&self, run: &str) -> Option<PathBuf> {
        let direct = Path::new(run);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }

        for dir in &self.search_paths {
            let candidate = dir.join(run);
            if candidate.is_file() {
                return Some(candidate);
            }
            if candidate.extension().is_some() {
                continue;
            }
            for ext in DESCRIPTOR_EXTENSIONS {
                let with_ext = candidate.with_extension(ext);
                if with_ext.is_file() {
                    return Some(with_ext);
                }
            }
        }

        None
    }
}

impl DefinitionLoader for SearchPathLoader {
    fn load(&self, run: &str) -> Result<Option<ToolDefinition>> {
        let Some(path) = self.locate(run) else {
            debug!("No descriptor for '{}' in {} search paths", run, self.search_paths.len());
            return Ok(None);
        };

        debug!("Loading tool descriptor: {}", path.display());
        let content = fs::read_to_string(&path).map_err(|e| InferenceError::io(&path, e))?;
        let fallback_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| run.to_string());

        parse_tool_definition(&content, &fallback_id, &path.display().to_string()).map(Some)
    }
}
