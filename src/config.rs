//! Compiler Configuration
//!
//! Settings read from a JSON file at startup:
//!
//! ```json
//! {
//!   "search_paths": ["cwl_adapters", "../shared/tools"],
//!   "use_naming_conventions": false,
//!   "disable_inference": false,
//!   "renaming_conventions": [["output_file", "input_file"]],
//!   "format_hierarchy": {"edam:format_1929": "edam:format_1919"},
//!   "isomorphism": {"max_steps": 200000, "timeout_ms": 2000, "detect_subgraphs": false},
//!   "max_workers": 4,
//!   "policy_file": "inference_policy.yml"
//! }
//! ```
//!
//! Relative paths are resolved against the directory holding the config
//! file. Every key is optional.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};
use crate::inference::{InferenceOptions, NamingConventions};
use crate::isomorphism::IsomorphismBudget;
use crate::types::TypeHierarchy;

/// Isomorphism filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsomorphismConfig {
    pub max_steps: u64,
    /// Wall-clock limit per comparison; `null` disables it
    pub timeout_ms: Option<u64>,
    pub detect_subgraphs: bool,
}

impl Default for IsomorphismConfig {
    fn default() -> Self {
        let budget = IsomorphismBudget::default();
        Self {
            max_steps: budget.max_steps,
            timeout_ms: budget.timeout.map(|t| t.as_millis() as u64),
            detect_subgraphs: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Directories searched for tool descriptors, in order
    pub search_paths: Vec<PathBuf>,

    /// Break specificity ties by port-name match
    pub use_naming_conventions: bool,

    /// Compile with explicit edges only
    pub disable_inference: bool,

    /// Port-name pairs treated as matching
    pub renaming_conventions: Vec<(String, String)>,

    /// File formats mapped to their parent format
    pub format_hierarchy: BTreeMap<String, String>,

    pub isomorphism: IsomorphismConfig,

    /// Worker threads for batch compilation; defaults to the CPU count
    pub max_workers: Option<usize>,

    /// Inference policy document (JSON or YAML)
    pub policy_file: Option<PathBuf>,
}

impl CompilerConfig {
    /// Loads a config file and resolves its relative paths.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| InferenceError::io(path, e))?;
        let mut config: CompilerConfig = serde_json::from_str(&content)
            .map_err(|e| InferenceError::parse(path.display().to_string(), e))?;

        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let base = fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
        config.resolve_paths(&base);

        debug!("Search paths: {:?}", config.search_paths);
        Ok(config)
    }

    /// Loads the config if the file exists, otherwise returns defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            info!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        for search_path in &mut self.search_paths {
            if search_path.is_relative() {
                *search_path = base.join(&*search_path);
            }
        }
        if let Some(policy) = &mut self.policy_file {
            if policy.is_relative() {
                *policy = base.join(&*policy);
            }
        }
    }

    /// Builds the format hierarchy.
    pub fn hierarchy(&self) -> Result<TypeHierarchy> {
        TypeHierarchy::from_pairs(
            self.format_hierarchy
                .iter()
                .map(|(child, parent)| (child.as_str(), parent.as_str())),
        )
        .map_err(InferenceError::Config)
    }

    pub fn naming(&self) -> NamingConventions {
        NamingConventions::new(self.renaming_conventions.clone())
    }

    pub fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            use_naming_conventions: self.use_naming_conventions,
            disable_inference: self.disable_inference,
        }
    }

    pub fn budget(&self) -> IsomorphismBudget {
        IsomorphismBudget {
            max_steps: self.isomorphism.max_steps,
            timeout: self.isomorphism.timeout_ms.map(Duration::from_millis),
        }
    }

    /// Worker count for batch compilation, at least one.
    pub fn workers(&self) -> usize {
        self.max_workers.unwrap_or_else(num_cpus::get).max(1)
    }
}
