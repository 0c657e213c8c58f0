//! Workflow Validation
//!
//! Provides structural validation for drafts and compiled graphs:
//! - Step and port identifier checks
//! - Reference integrity for scatter lists and bindings
//! - Stable topological sorting (Kahn's algorithm)
//! - Whole-graph acyclicity

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use log::{debug, info};

use super::model::{DraftGraph, Edge, NodeRef, Port};
use crate::error::{InferenceError, Result};

/// Pseudo step id used in errors about top-level inputs.
pub const INPUTS_SCOPE: &str = "inputs";
/// Pseudo step id used in errors about top-level outputs.
pub const OUTPUTS_SCOPE: &str = "outputs";

fn check_unique_ports(scope: &str, ports: &[Port]) -> Result<()> {
    let mut seen = HashSet::new();
    for port in ports {
        if !seen.insert(port.id.as_str()) {
            return Err(InferenceError::DuplicatePortId {
                step: scope.to_string(),
                port: port.id.clone(),
            });
        }
    }
    Ok(())
}

/// Validates the structure of a draft before inference.
///
/// Performs the following checks:
/// 1. Draft is not empty
/// 2. No duplicate step IDs
/// 3. No duplicate port IDs within a step or at the top level
/// 4. Every scatter entry names an input port of its step
/// 5. Every binding and output source names an existing port
pub fn validate_draft(draft: &DraftGraph) -> Result<()> {
    info!("Validating draft '{}' with {} steps", draft.id, draft.steps.len());

    if draft.steps.is_empty() {
        return Err(InferenceError::EmptyWorkflow(draft.id.clone()));
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &draft.steps {
        if !seen_ids.insert(step.id.as_str()) {
            return Err(InferenceError::DuplicateStepId(step.id.clone()));
        }
    }

    check_unique_ports(INPUTS_SCOPE, &draft.inputs)?;
    check_unique_ports(OUTPUTS_SCOPE, &draft.outputs)?;

    for step in &draft.steps {
        check_unique_ports(&step.id, &step.inputs)?;
        check_unique_ports(&step.id, &step.outputs)?;

        for port in &step.scatter {
            if step.input(port).is_none() {
                return Err(InferenceError::UnknownScatterPort {
                    step: step.id.clone(),
                    port: port.clone(),
                });
            }
        }

        for port in step.bindings.keys() {
            if step.input(port).is_none() {
                return Err(InferenceError::UnknownPort {
                    step: step.id.clone(),
                    port: port.clone(),
                });
            }
        }
    }

    for output in draft.output_sources.keys() {
        if !draft.outputs.iter().any(|p| &p.id == output) {
            return Err(InferenceError::UnknownPort {
                step: OUTPUTS_SCOPE.to_string(),
                port: output.clone(),
            });
        }
    }

    debug!("Draft '{}' is structurally valid", draft.id);
    Ok(())
}

/// Sorts `count` nodes topologically using Kahn's algorithm.
///
/// `dependencies` holds `(before, after)` index pairs. Among nodes that are
/// ready at the same time the lowest index goes first, so the result is
/// fully determined by the input. On a cycle, returns the indices of the
/// nodes that lie on or between cycles, ascending.
pub fn stable_topological_order(
    count: usize,
    dependencies: &[(usize, usize)],
) -> std::result::Result<Vec<usize>, Vec<usize>> {
    let mut in_degree = vec![0usize; count];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut seen: HashSet<(usize, usize)> = HashSet::new();

    for &(before, after) in dependencies {
        if seen.insert((before, after)) {
            successors[before].push(after);
            in_degree[after] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();

    let mut sorted_order = Vec::with_capacity(count);
    while let Some(Reverse(current)) = ready.pop() {
        sorted_order.push(current);
        for &next in &successors[current] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if sorted_order.len() == count {
        return Ok(sorted_order);
    }

    // Peel off nodes that merely hang below a cycle.
    let mut remaining: HashSet<usize> = (0..count).filter(|&i| in_degree[i] > 0).collect();
    loop {
        let sinks: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&node| !successors[node].iter().any(|s| remaining.contains(s)))
            .collect();
        if sinks.is_empty() {
            break;
        }
        for node in sinks {
            remaining.remove(&node);
        }
    }

    let mut cyclic: Vec<usize> = remaining.into_iter().collect();
    cyclic.sort_unstable();
    Err(cyclic)
}

/// Verifies that the step-to-step edges of a graph form a DAG.
///
/// Returns the step ids in stable topological order.
pub fn verify_acyclic(draft: &DraftGraph, edges: &[Edge]) -> Result<Vec<String>> {
    let index: HashMap<&str, usize> = draft
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let dependencies: Vec<(usize, usize)> = edges
        .iter()
        .filter_map(|edge| match (&edge.source.node, &edge.sink.node) {
            (NodeRef::Step(from), NodeRef::Step(to)) => {
                Some((*index.get(from.as_str())?, *index.get(to.as_str())?))
            }
            _ => None,
        })
        .collect();

    match stable_topological_order(draft.steps.len(), &dependencies) {
        Ok(order) => {
            let order: Vec<String> = order
                .into_iter()
                .map(|i| draft.steps[i].id.clone())
                .collect();
            debug!("Topological order: {:?}", order);
            Ok(order)
        }
        Err(cyclic) => Err(InferenceError::CyclicDependency {
            steps: cyclic
                .into_iter()
                .map(|i| draft.steps[i].id.clone())
                .collect(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeKind, PortType};
    use crate::workflow::model::{Endpoint, Provenance, Step};

    fn step(id: &str) -> Step {
        Step::new(id, "tool.cwl")
            .with_input(Port::input("in", PortType::file()))
            .with_output(Port::output("out", PortType::file()))
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge {
            source: Endpoint::step(from, "out"),
            sink: Endpoint::step(to, "in"),
            kind: EdgeKind::Direct,
            provenance: Provenance::Explicit,
        }
    }

    #[test]
    fn test_valid_draft() {
        let draft = DraftGraph::new("ok")
            .with_step(step("a"))
            .with_step(step("b").bind("in", "a/out"));
        assert!(validate_draft(&draft).is_ok());
    }

    #[test]
    fn test_empty_draft() {
        let err = validate_draft(&DraftGraph::new("nothing")).unwrap_err();
        assert!(matches!(err, InferenceError::EmptyWorkflow(id) if id == "nothing"));
    }

    #[test]
    fn test_duplicate_ids() {
        let draft = DraftGraph::new("dup").with_step(step("a")).with_step(step("a"));
        assert!(matches!(
            validate_draft(&draft),
            Err(InferenceError::DuplicateStepId(id)) if id == "a"
        ));

        let draft = DraftGraph::new("dup_port")
            .with_step(step("a").with_input(Port::input("in", PortType::String)));
        assert!(matches!(
            validate_draft(&draft),
            Err(InferenceError::DuplicatePortId { .. })
        ));

        let draft = DraftGraph::new("dup_input")
            .with_input(Port::input("x", PortType::String))
            .with_input(Port::input("x", PortType::Int))
            .with_step(step("a"));
        assert!(matches!(
            validate_draft(&draft),
            Err(InferenceError::DuplicatePortId { step, .. }) if step == INPUTS_SCOPE
        ));
    }

    #[test]
    fn test_unknown_scatter_and_binding_ports() {
        let draft = DraftGraph::new("scatter").with_step(step("a").with_scatter("missing"));
        assert!(matches!(
            validate_draft(&draft),
            Err(InferenceError::UnknownScatterPort { .. })
        ));

        let draft = DraftGraph::new("binding").with_step(step("a").bind("missing", "x"));
        assert!(matches!(
            validate_draft(&draft),
            Err(InferenceError::UnknownPort { port, .. }) if port == "missing"
        ));

        let draft = DraftGraph::new("output")
            .with_step(step("a"))
            .with_output_source("ghost", "a/out");
        assert!(matches!(
            validate_draft(&draft),
            Err(InferenceError::UnknownPort { step, .. }) if step == OUTPUTS_SCOPE
        ));
    }

    #[test]
    fn test_topological_sort_prefers_declaration_order() {
        // 2 -> 0, with 1 independent: 1 and 2 are ready first, 1 wins.
        let order = stable_topological_order(3, &[(2, 0)]).unwrap();
        assert_eq!(order, vec![1, 2, 0]);

        let order = stable_topological_order(4, &[]).unwrap();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_topological_sort_multiple_roots() {
        let order = stable_topological_order(4, &[(0, 2), (1, 2), (2, 3), (0, 2)]).unwrap();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_cycle_reports_members_only() {
        // 0 -> 1 -> 2 -> 1, and 2 -> 3 hangs below the cycle.
        let cyclic = stable_topological_order(4, &[(0, 1), (1, 2), (2, 1), (2, 3)]).unwrap_err();
        assert_eq!(cyclic, vec![1, 2]);
    }

    #[test]
    fn test_verify_acyclic() {
        let draft = DraftGraph::new("chain")
            .with_step(step("b"))
            .with_step(step("a"));

        let order = verify_acyclic(&draft, &[edge("a", "b")]).unwrap();
        assert_eq!(order, vec!["a", "b"]);

        let err = verify_acyclic(&draft, &[edge("a", "b"), edge("b", "a")]).unwrap_err();
        match err {
            InferenceError::CyclicDependency { steps } => assert_eq!(steps, vec!["b", "a"]),
            other => panic!("unexpected error: {}", other),
        }
    }
}
