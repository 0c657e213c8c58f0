//! Process-wide Signature Cache
//!
//! Holds the signatures of every workflow compiled so far in this process.
//! Comparisons run without holding the lock; a novel signature is appended
//! only if nothing was inserted since the snapshot it was compared against,
//! otherwise the newcomers are compared too and the insert is retried.
//! Nothing is persisted.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};
use once_cell::sync::Lazy;

use super::matcher::{is_isomorphic, is_subgraph, IsomorphismBudget};
use super::signature::StructuralSignature;

static GLOBAL_CACHE: Lazy<SignatureCache> = Lazy::new(SignatureCache::new);

/// How a duplicate relates to the cached graph it matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Isomorphic to the cached graph.
    Identical,
    /// Embeds into the cached graph.
    ContainedIn,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Identical => write!(f, "identical to"),
            Relation::ContainedIn => write!(f, "contained in"),
        }
    }
}

/// Outcome of the duplicate check for one compiled graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// No structural match; the signature was cached.
    Novel,
    /// Structurally matches an earlier workflow; nothing was cached.
    Duplicate { of: String, relation: Relation },
    /// A comparison ran out of budget and nothing else matched. Treated as
    /// a non-match; the signature was cached.
    Inconclusive { reason: String },
    /// Listed as a large workflow: no comparison, nothing cached.
    Skipped,
}

impl DuplicateCheck {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DuplicateCheck::Duplicate { .. })
    }

    /// Large workflows are kept out of the expensive test tiers.
    pub fn excluded_from_tests(&self) -> bool {
        matches!(self, DuplicateCheck::Skipped)
    }
}

impl fmt::Display for DuplicateCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateCheck::Novel => write!(f, "novel"),
            DuplicateCheck::Duplicate { of, relation } => {
                write!(f, "duplicate ({} '{}')", relation, of)
            }
            DuplicateCheck::Inconclusive { reason } => write!(f, "inconclusive ({})", reason),
            DuplicateCheck::Skipped => write!(f, "skipped (large workflow)"),
        }
    }
}

#[derive(Debug)]
struct CachedSignature {
    id: String,
    signature: StructuralSignature,
}

/// Thread-safe store of compiled signatures.
#[derive(Debug, Default)]
pub struct SignatureCache {
    entries: RwLock<Vec<Arc<CachedSignature>>>,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by the whole process.
    pub fn global() -> &'static SignatureCache {
        &GLOBAL_CACHE
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of cached workflows in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Compares `signature` with every cached entry and caches it unless a
    /// duplicate was found. Each comparison gets its own `budget`.
    pub fn check_and_insert(
        &self,
        id: &str,
        signature: StructuralSignature,
        budget: IsomorphismBudget,
        detect_subgraphs: bool,
    ) -> DuplicateCheck {
        let mut compared = 0;
        let mut inconclusive: Option<String> = None;
        let entry = Arc::new(CachedSignature {
            id: id.to_string(),
            signature,
        });

        loop {
            let snapshot: Vec<Arc<CachedSignature>> = {
                let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
                entries[compared.min(entries.len())..].to_vec()
            };

            for cached in &snapshot {
                match compare(&entry.signature, &cached.signature, budget, detect_subgraphs) {
                    Ok(Some(relation)) => {
                        info!("'{}' is {} '{}'", id, relation, cached.id);
                        return DuplicateCheck::Duplicate {
                            of: cached.id.clone(),
                            relation,
                        };
                    }
                    Ok(None) => {}
                    Err(reason) => {
                        warn!("Comparison of '{}' with '{}' is inconclusive: {}", id, cached.id, reason);
                        inconclusive.get_or_insert(reason);
                    }
                }
            }
            compared += snapshot.len();

            let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
            if entries.len() == compared {
                entries.push(Arc::clone(&entry));
                debug!("Cached signature of '{}' ({} entries)", id, entries.len());
                break;
            }
            debug!("Cache grew while comparing '{}'; rechecking newcomers", id);
        }

        match inconclusive {
            Some(reason) => DuplicateCheck::Inconclusive { reason },
            None => DuplicateCheck::Novel,
        }
    }
}

/// Compares a new signature against a cached one.
fn compare(
    new: &StructuralSignature,
    cached: &StructuralSignature,
    budget: IsomorphismBudget,
    detect_subgraphs: bool,
) -> Result<Option<Relation>, String> {
    if is_isomorphic(new, cached, budget).map_err(|e| e.to_string())? {
        return Ok(Some(Relation::Identical));
    }
    if detect_subgraphs
        && new.node_count() < cached.node_count()
        && is_subgraph(new, cached, budget).map_err(|e| e.to_string())?
    {
        return Ok(Some(Relation::ContainedIn));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn chain(labels: &[&str]) -> StructuralSignature {
        StructuralSignature::from_parts(
            labels.iter().map(|s| s.to_string()).collect(),
            (1..labels.len())
                .map(|i| (i - 1, i, "File->File:direct".to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_second_insert_is_duplicate() {
        let cache = SignatureCache::new();
        let budget = IsomorphismBudget::default();

        let first = cache.check_and_insert("first", chain(&["step:a", "step:b"]), budget, false);
        assert_eq!(first, DuplicateCheck::Novel);

        let second = cache.check_and_insert("second", chain(&["step:a", "step:b"]), budget, false);
        assert_eq!(
            second,
            DuplicateCheck::Duplicate {
                of: "first".to_string(),
                relation: Relation::Identical,
            }
        );
        assert!(second.is_duplicate());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_subgraph_detection_is_opt_in() {
        let cache = SignatureCache::new();
        let budget = IsomorphismBudget::default();
        cache.check_and_insert("large", chain(&["step:a", "step:b", "step:c"]), budget, false);

        let plain = cache.check_and_insert("part", chain(&["step:a", "step:b"]), budget, false);
        assert_eq!(plain, DuplicateCheck::Novel);

        let detected = cache.check_and_insert("part2", chain(&["step:b", "step:c"]), budget, true);
        assert_eq!(
            detected,
            DuplicateCheck::Duplicate {
                of: "large".to_string(),
                relation: Relation::ContainedIn,
            }
        );
    }

    #[test]
    fn test_budget_exhaustion_is_inconclusive_and_cached() {
        let cache = SignatureCache::new();
        let labels = ["step:x"; 6];
        let cycles = |edges: &[(usize, usize)]| {
            StructuralSignature::from_parts(
                labels.iter().map(|s| s.to_string()).collect(),
                edges
                    .iter()
                    .map(|&(a, b)| (a, b, "File->File:direct".to_string()))
                    .collect(),
            )
        };
        let two = cycles(&[(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)]);
        let one = cycles(&[(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0)]);

        cache.check_and_insert("two", two, IsomorphismBudget::default(), false);
        let outcome = cache.check_and_insert("one", one, IsomorphismBudget::steps(1), false);

        assert!(matches!(outcome, DuplicateCheck::Inconclusive { .. }));
        assert!(!outcome.is_duplicate());
        assert_eq!(cache.ids(), vec!["two", "one"]);
    }

    #[test]
    fn test_concurrent_inserts_keep_one_copy() {
        let cache = SignatureCache::new();
        let budget = IsomorphismBudget::default();

        let outcomes: Vec<DuplicateCheck> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let cache = &cache;
                    scope.spawn(move || {
                        cache.check_and_insert(
                            &format!("copy_{}", i),
                            chain(&["step:a", "step:b", "step:c"]),
                            budget,
                            false,
                        )
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let novel = outcomes.iter().filter(|o| **o == DuplicateCheck::Novel).count();
        assert_eq!(novel, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_excluded_from_tests() {
        assert!(DuplicateCheck::Skipped.excluded_from_tests());
        assert!(!DuplicateCheck::Novel.excluded_from_tests());
        assert_eq!(DuplicateCheck::Skipped.to_string(), "skipped (large workflow)");
    }
}
