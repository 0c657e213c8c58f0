//! Bounded Isomorphism Matching
//!
//! VF2-style backtracking over [`StructuralSignature`]s.
//!
//! - [`is_isomorphic`]: a label- and edge-preserving bijection exists
//! - [`is_subgraph`]: the pattern embeds into the target (every pattern
//!   edge appears between the mapped target nodes; the target may have more)
//!
//! Every feasibility check counts as one step against an
//! [`IsomorphismBudget`]. Running out of steps or time aborts the search
//! with [`MatchError::IsomorphismBudgetExceeded`].

use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use super::signature::StructuralSignature;

/// How often the wall clock is consulted, in steps.
const CLOCK_INTERVAL: u64 = 256;

/// Limits applied to a single comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsomorphismBudget {
    pub max_steps: u64,
    pub timeout: Option<Duration>,
}

impl Default for IsomorphismBudget {
    fn default() -> Self {
        Self {
            max_steps: 200_000,
            timeout: Some(Duration::from_secs(2)),
        }
    }
}

impl IsomorphismBudget {
    pub fn steps(max_steps: u64) -> Self {
        Self {
            max_steps,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("Isomorphism budget exceeded after {steps} steps ({elapsed_ms} ms)")]
    IsomorphismBudgetExceeded { steps: u64, elapsed_ms: u128 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Exact,
    Subgraph,
}

struct Matcher<'a> {
    pattern: &'a StructuralSignature,
    target: &'a StructuralSignature,
    mode: Mode,
    use_colors: bool,
    budget: IsomorphismBudget,
    started: Instant,
    steps: u64,
    order: Vec<usize>,
    mapping: Vec<Option<usize>>,
    used: Vec<bool>,
}

/// Returns true when `a` and `b` are isomorphic.
pub fn is_isomorphic(
    a: &StructuralSignature,
    b: &StructuralSignature,
    budget: IsomorphismBudget,
) -> Result<bool, MatchError> {
    if a.node_count() != b.node_count()
        || a.edge_count() != b.edge_count()
        || a.digest() != b.digest()
    {
        return Ok(false);
    }
    Matcher::new(a, b, Mode::Exact, budget).run()
}

/// Returns true when `pattern` embeds into `target`.
pub fn is_subgraph(
    pattern: &StructuralSignature,
    target: &StructuralSignature,
    budget: IsomorphismBudget,
) -> Result<bool, MatchError> {
    if pattern.node_count() > target.node_count() || pattern.edge_count() > target.edge_count() {
        return Ok(false);
    }
    if !contains_all(&target.label_multiset(), &pattern.label_multiset()) {
        return Ok(false);
    }
    Matcher::new(pattern, target, Mode::Subgraph, budget).run()
}

/// True when sorted `needles` is a sub-multiset of sorted `haystack`.
fn contains_all<T: Ord>(haystack: &[T], needles: &[T]) -> bool {
    let mut rest = haystack.iter();
    'outer: for needle in needles {
        for candidate in rest.by_ref() {
            match candidate.cmp(needle) {
                std::cmp::Ordering::Less => continue,
                std::cmp::Ordering::Equal => continue 'outer,
                std::cmp::Ordering::Greater => return false,
            }
        }
        return false;
    }
    true
}

impl<'a> Matcher<'a> {
    fn new(
        pattern: &'a StructuralSignature,
        target: &'a StructuralSignature,
        mode: Mode,
        budget: IsomorphismBudget,
    ) -> Self {
        Self {
            pattern,
            target,
            mode,
            use_colors: mode == Mode::Exact && pattern.rounds() == target.rounds(),
            budget,
            started: Instant::now(),
            steps: 0,
            order: matching_order(pattern),
            mapping: vec![None; pattern.node_count()],
            used: vec![false; target.node_count()],
        }
    }

    fn run(mut self) -> Result<bool, MatchError> {
        let found = self.extend(0)?;
        debug!(
            "{:?} match finished after {} steps: {}",
            self.mode, self.steps, found
        );
        Ok(found)
    }

    fn tick(&mut self) -> Result<(), MatchError> {
        self.steps += 1;
        let over_steps = self.steps > self.budget.max_steps;
        let over_time = self.steps % CLOCK_INTERVAL == 0
            && self
                .budget
                .timeout
                .map(|limit| self.started.elapsed() > limit)
                .unwrap_or(false);
        if over_steps || over_time {
            return Err(MatchError::IsomorphismBudgetExceeded {
                steps: self.steps,
                elapsed_ms: self.started.elapsed().as_millis(),
            });
        }
        Ok(())
    }

    fn extend(&mut self, depth: usize) -> Result<bool, MatchError> {
        if depth == self.order.len() {
            return Ok(true);
        }
        let node = self.order[depth];

        for candidate in 0..self.target.node_count() {
            if self.used[candidate] {
                continue;
            }
            self.tick()?;
            if !self.feasible(node, candidate) {
                continue;
            }

            self.mapping[node] = Some(candidate);
            self.used[candidate] = true;
            if self.extend(depth + 1)? {
                return Ok(true);
            }
            self.mapping[node] = None;
            self.used[candidate] = false;
        }

        Ok(false)
    }

    fn feasible(&self, node: usize, candidate: usize) -> bool {
        let (p, t) = (self.pattern, self.target);

        if p.label(node) != t.label(candidate) {
            return false;
        }
        if self.use_colors && p.color(node) != t.color(candidate) {
            return false;
        }

        let degrees_fit = match self.mode {
            Mode::Exact => {
                p.out_degree(node) == t.out_degree(candidate)
                    && p.in_degree(node) == t.in_degree(candidate)
            }
            Mode::Subgraph => {
                p.out_degree(node) <= t.out_degree(candidate)
                    && p.in_degree(node) <= t.in_degree(candidate)
            }
        };
        if !degrees_fit {
            return false;
        }

        if !self.edges_fit(p.edge_labels(node, node), t.edge_labels(candidate, candidate)) {
            return false;
        }

        // Edges to already mapped nodes must agree in both directions.
        let mapped = self
            .mapping
            .iter()
            .enumerate()
            .filter_map(|(other, image)| image.map(|image| (other, image)));
        for (other, image) in mapped {
            if !self.edges_fit(p.edge_labels(node, other), t.edge_labels(candidate, image))
                || !self.edges_fit(p.edge_labels(other, node), t.edge_labels(image, candidate))
            {
                return false;
            }
        }

        true
    }

    fn edges_fit(&self, pattern: &[String], target: &[String]) -> bool {
        match self.mode {
            Mode::Exact => pattern == target,
            Mode::Subgraph => contains_all(target, pattern),
        }
    }
}

/// Orders pattern nodes so each one is as connected as possible to the
/// nodes placed before it; ties go to higher degree, then lower index.
fn matching_order(signature: &StructuralSignature) -> Vec<usize> {
    let n = signature.node_count();
    let degree = |node: usize| signature.out_degree(node) + signature.in_degree(node);
    let neighbors: Vec<_> = (0..n).map(|node| signature.neighbors(node)).collect();
    let mut placed = vec![false; n];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let next = (0..n)
            .filter(|&node| !placed[node])
            .max_by_key(|&node| {
                let links = neighbors[node]
                    .iter()
                    .filter(|&&other| placed[other])
                    .count();
                (links, degree(node), std::cmp::Reverse(node))
            });
        match next {
            Some(node) => {
                placed[node] = true;
                order.push(node);
            }
            None => break,
        }
    }

    order
}
