//! Graph Isomorphism Filter
//!
//! Detects compiled workflows that are structurally identical to (or,
//! optionally, contained in) workflows compiled earlier in the process.
//!
//! # Structure
//!
//! - [`signature`]: name-independent labelled digraph plus digest
//! - [`matcher`]: budgeted VF2-style matching
//! - [`cache`]: the process-wide signature store

pub mod cache;
pub mod matcher;
pub mod signature;

pub use cache::{DuplicateCheck, Relation, SignatureCache};
pub use matcher::{is_isomorphic, is_subgraph, IsomorphismBudget, MatchError};
pub use signature::StructuralSignature;

use log::info;

use crate::policy::InferencePolicy;
use crate::workflow::CompiledGraph;

/// Dedup and size gate applied after inference.
pub struct IsomorphismFilter<'a> {
    policy: &'a InferencePolicy,
    cache: &'a SignatureCache,
    budget: IsomorphismBudget,
    detect_subgraphs: bool,
}

impl<'a> IsomorphismFilter<'a> {
    pub fn new(policy: &'a InferencePolicy, cache: &'a SignatureCache) -> Self {
        Self {
            policy,
            cache,
            budget: IsomorphismBudget::default(),
            detect_subgraphs: false,
        }
    }

    pub fn with_budget(mut self, budget: IsomorphismBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Also report workflows that embed into a cached one.
    pub fn with_subgraph_detection(mut self, enabled: bool) -> Self {
        self.detect_subgraphs = enabled;
        self
    }

    /// Checks a compiled graph against the cache under the policy
    /// identifier `id`, caching it when novel.
    ///
    /// Identifiers listed as large workflows are never compared or cached.
    pub fn check(&self, id: &str, graph: &CompiledGraph) -> DuplicateCheck {
        if self.policy.is_large(id) {
            info!("Skipping isomorphism check for large workflow '{}'", id);
            return DuplicateCheck::Skipped;
        }

        let signature = StructuralSignature::of(graph);
        self.cache
            .check_and_insert(id, signature, self.budget, self.detect_subgraphs)
    }
}
