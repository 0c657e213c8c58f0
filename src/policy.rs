//! Inference Policy Registry
//!
//! Exclusion lists read once at startup and shared read-only afterwards:
//!
//! ```yaml
//! large_workflows: [nmr_hcomplex]       # never compared for duplicates
//! run_blacklist: [append_twice]         # never executed automatically
//! run_partial_failures: [test_rand_fail] # expected to fail
//! run_weekly: [gromacs_long]            # low-frequency test tier only
//! ```
//!
//! Unknown keys are ignored and missing lists default to empty.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{InferenceError, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferencePolicy {
    /// Identifiers exempt from isomorphism checks
    pub large_workflows: BTreeSet<String>,

    /// Identifiers never executed automatically, typically fragments with
    /// deliberately free inputs
    pub run_blacklist: BTreeSet<String>,

    /// Identifiers expected to fail; success is itself anomalous
    pub run_partial_failures: BTreeSet<String>,

    /// Identifiers deferred to the weekly test tier
    pub run_weekly: BTreeSet<String>,
}

impl InferencePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a policy document; `.json` files are read as JSON, anything
    /// else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading inference policy from: {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| InferenceError::io(path, e))?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let policy = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
        .map_err(|e| match e {
            InferenceError::Parse { message, .. } => {
                InferenceError::parse(path.display().to_string(), message)
            }
            other => other,
        })?;

        debug!(
            "Policy: {} large, {} blacklisted, {} partial failures, {} weekly",
            policy.large_workflows.len(),
            policy.run_blacklist.len(),
            policy.run_partial_failures.len(),
            policy.run_weekly.len()
        );
        Ok(policy)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| InferenceError::parse("policy", e))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| InferenceError::parse("policy", e))
    }

    pub fn is_large(&self, id: &str) -> bool {
        self.large_workflows.contains(id)
    }

    pub fn is_blacklisted(&self, id: &str) -> bool {
        self.run_blacklist.contains(id)
    }

    pub fn expects_failure(&self, id: &str) -> bool {
        self.run_partial_failures.contains(id)
    }

    pub fn is_weekly(&self, id: &str) -> bool {
        self.run_weekly.contains(id)
    }

    pub fn with_large_workflow(mut self, id: impl Into<String>) -> Self {
        self.large_workflows.insert(id.into());
        self
    }

    pub fn with_blacklisted(mut self, id: impl Into<String>) -> Self {
        self.run_blacklist.insert(id.into());
        self
    }

    pub fn with_partial_failure(mut self, id: impl Into<String>) -> Self {
        self.run_partial_failures.insert(id.into());
        self
    }

    pub fn with_weekly(mut self, id: impl Into<String>) -> Self {
        self.run_weekly.insert(id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_json_policy_ignores_unknown_keys() {
        let policy = InferencePolicy::from_json_str(
            r#"{
                "large_workflows": ["nmr"],
                "run_blacklist": ["append_twice", "test_rand_fail"],
                "run_partial_failures": ["test_rand_fail"],
                "notes": "ignored"
            }"#,
        )
        .unwrap();

        assert!(policy.is_large("nmr"));
        assert!(policy.is_blacklisted("append_twice"));
        assert!(policy.expects_failure("test_rand_fail"));
        assert!(policy.run_weekly.is_empty());
    }

    #[test]
    fn test_yaml_policy_defaults() {
        let policy = InferencePolicy::from_yaml_str("run_weekly: [gromacs]\n").unwrap();
        assert!(policy.is_weekly("gromacs"));
        assert!(!policy.is_large("gromacs"));

        assert_eq!(InferencePolicy::from_yaml_str("").unwrap(), InferencePolicy::default());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("policy.json");
        let yaml = dir.path().join("policy.yml");
        fs::write(&json, r#"{"run_blacklist": ["a"]}"#).unwrap();
        fs::write(&yaml, "run_blacklist:\n  - b\n").unwrap();

        assert!(InferencePolicy::load(&json).unwrap().is_blacklisted("a"));
        assert!(InferencePolicy::load(&yaml).unwrap().is_blacklisted("b"));
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        match InferencePolicy::load(&path).unwrap_err() {
            InferenceError::Parse { origin, .. } => assert!(origin.ends_with("broken.json")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_builders() {
        let policy = InferencePolicy::new()
            .with_large_workflow("big")
            .with_blacklisted("fragment")
            .with_partial_failure("flaky")
            .with_weekly("slow");
        assert!(policy.is_large("big"));
        assert!(policy.is_blacklisted("fragment"));
        assert!(policy.expects_failure("flaky"));
        assert!(policy.is_weekly("slow"));
    }
}
