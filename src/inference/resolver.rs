//! Candidate Resolver
//!
//! Enumerates the sources that may feed an unconnected sink port.
//!
//! # Visibility
//!
//! - Top-level inputs are visible to every sink, except `<step>___<port>`
//!   inputs, which only ever feed the port they name.
//! - A step output is visible to a sink step when the source step has a
//!   strictly lower position and is not already a descendant of the sink
//!   step through committed edges.
//! - Top-level outputs see every step output.
//!
//! Positions come from a stable topological sort of the explicit edges, so
//! they never change while inference commits new edges.
//!
//! # Ordering
//!
//! Top-level inputs first, then steps in declaration order, then ports in
//! declaration order.

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};

use super::engine::STEP_INPUT_SEPARATOR;
use super::naming::NamingConventions;
use crate::types::{Compatibility, EdgeContext, PortType, TypeHierarchy};
use crate::workflow::{DraftGraph, Edge, Endpoint, NodeRef};

/// A type-compatible, visible source for a sink port.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub source: Endpoint,
    pub source_type: PortType,
    pub compatibility: Compatibility,
    /// The source port name matches the sink's, directly or through a
    /// renaming convention.
    pub name_match: bool,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

pub struct CandidateResolver<'a> {
    draft: &'a DraftGraph,
    hierarchy: &'a TypeHierarchy,
    naming: &'a NamingConventions,
    positions: HashMap<&'a str, usize>,
    /// Steps linked by committed edges.
    committed: DiGraph<&'a str, ()>,
    nodes: HashMap<&'a str, NodeIndex>,
}

impl<'a> CandidateResolver<'a> {
    /// Creates a resolver; `order` lists step ids by position.
    pub fn new(
        draft: &'a DraftGraph,
        hierarchy: &'a TypeHierarchy,
        naming: &'a NamingConventions,
        order: &[String],
    ) -> Self {
        let positions = draft
            .steps
            .iter()
            .filter_map(|step| {
                order
                    .iter()
                    .position(|id| *id == step.id)
                    .map(|pos| (step.id.as_str(), pos))
            })
            .collect();

        let mut committed = DiGraph::with_capacity(draft.steps.len(), 0);
        let nodes = draft
            .steps
            .iter()
            .map(|step| (step.id.as_str(), committed.add_node(step.id.as_str())))
            .collect();

        Self {
            draft,
            hierarchy,
            naming,
            positions,
            committed,
            nodes,
        }
    }

    /// Records a committed edge for the reachability check.
    pub fn commit(&mut self, edge: &Edge) {
        if let (NodeRef::Step(from), NodeRef::Step(to)) = (&edge.source.node, &edge.sink.node) {
            let from = self.nodes.get(from.as_str()).copied();
            let to = self.nodes.get(to.as_str()).copied();
            if let (Some(from), Some(to)) = (from, to) {
                self.committed.update_edge(from, to, ());
            }
        }
    }

    /// True when `step` can be reached from `ancestor` through committed edges.
    pub fn is_descendant(&self, step: &str, ancestor: &str) -> bool {
        if step == ancestor {
            return false;
        }
        match (self.nodes.get(ancestor), self.nodes.get(step)) {
            (Some(&from), Some(&to)) => has_path_connecting(&self.committed, from, to, None),
            _ => false,
        }
    }

    pub fn position(&self, step: &str) -> Option<usize> {
        self.positions.get(step).copied()
    }

    fn visible(&self, source_step: &str, sink: &Endpoint) -> bool {
        match &sink.node {
            NodeRef::Outputs => true,
            NodeRef::Inputs => false,
            NodeRef::Step(sink_step) => {
                if source_step == sink_step {
                    return false;
                }
                match (self.position(source_step), self.position(sink_step)) {
                    (Some(from), Some(to)) if from < to => {
                        !self.is_descendant(source_step, sink_step)
                    }
                    _ => false,
                }
            }
        }
    }

    /// Returns all compatible, visible sources for `sink` in canonical order.
    pub fn candidates(&self, sink: &Endpoint) -> Vec<Candidate> {
        let Some(sink_port) = self.draft.sink_port(sink) else {
            return Vec::new();
        };
        let sink_scattered = sink
            .step_id()
            .and_then(|id| self.draft.step(id))
            .map(|step| step.scatters(&sink.port))
            .unwrap_or(false);

        let dedicated = sink
            .step_id()
            .map(|step| format!("{}{}{}", step, STEP_INPUT_SEPARATOR, sink.port));

        let mut found = Vec::new();

        for input in &self.draft.inputs {
            if input.id.contains(STEP_INPUT_SEPARATOR)
                && dedicated.as_deref() != Some(input.id.as_str())
            {
                continue;
            }
            let context = EdgeContext {
                sink_scattered,
                source_scattered: false,
            };
            if let Some(compatibility) =
                self.hierarchy
                    .assess(&input.port_type, &sink_port.port_type, context)
            {
                found.push(Candidate {
                    source: Endpoint::input(&input.id),
                    source_type: input.port_type.clone(),
                    compatibility,
                    name_match: self.naming.matches(&input.id, &sink.port),
                });
            }
        }

        for step in &self.draft.steps {
            if !self.visible(&step.id, sink) {
                continue;
            }
            let context = EdgeContext {
                sink_scattered,
                source_scattered: step.is_scattered(),
            };
            for output in &step.outputs {
                if let Some(compatibility) =
                    self.hierarchy
                        .assess(&output.port_type, &sink_port.port_type, context)
                {
                    found.push(Candidate {
                        source: Endpoint::step(&step.id, &output.id),
                        source_type: output.port_type.clone(),
                        compatibility,
                        name_match: self.naming.matches(&output.id, &sink.port),
                    });
                }
            }
        }

        found
    }
}
