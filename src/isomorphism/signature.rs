//! Structural Signatures
//!
//! A compiled graph reduced to a labelled digraph that ignores step and
//! port names:
//!
//! - node labels: `input:<type>`, `step:<run>`, `output:<type>`
//! - edge labels: `<source type>-><sink type>:<kind>`
//!
//! Each signature carries Weisfeiler-Lehman colours and a SHA-256 digest of
//! the refined colouring. Isomorphic graphs always share a digest; graphs
//! with equal digests still need the matcher to confirm.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::hash::{Hash, Hasher};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use sha2::{Digest, Sha256};

use crate::workflow::{CompiledGraph, Endpoint, NodeRef};

#[derive(Debug, Clone)]
pub struct StructuralSignature {
    /// Node weights are labels, edge weights are edge labels; node `i` of
    /// the input sits at `NodeIndex::new(i)`.
    graph: DiGraph<String, String>,
    /// Sorted labels per ordered node pair, for constant-time edge checks.
    edge_labels: BTreeMap<(usize, usize), Vec<String>>,
    colors: Vec<u64>,
    rounds: usize,
    digest: String,
}

impl PartialEq for StructuralSignature {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
            && self.colors == other.colors
            && self.edge_labels == other.edge_labels
            && self.graph.node_weights().eq(other.graph.node_weights())
    }
}

impl Eq for StructuralSignature {}

fn hash_of<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn distinct(colors: &[u64]) -> usize {
    colors.iter().collect::<HashSet<_>>().len()
}

impl StructuralSignature {
    /// Computes the signature of a compiled graph.
    pub fn of(graph: &CompiledGraph) -> Self {
        let draft = graph.draft();
        let input_count = draft.inputs.len();
        let step_count = draft.steps.len();

        let mut labels = Vec::with_capacity(draft.port_count());
        labels.extend(
            draft
                .inputs
                .iter()
                .map(|p| format!("input:{}", p.port_type.label())),
        );
        labels.extend(draft.steps.iter().map(|s| format!("step:{}", s.run)));
        labels.extend(
            draft
                .outputs
                .iter()
                .map(|p| format!("output:{}", p.port_type.label())),
        );

        let node_of = |endpoint: &Endpoint| -> Option<usize> {
            match &endpoint.node {
                NodeRef::Inputs => draft.inputs.iter().position(|p| p.id == endpoint.port),
                NodeRef::Step(id) => draft.step_index(id).map(|i| input_count + i),
                NodeRef::Outputs => draft
                    .outputs
                    .iter()
                    .position(|p| p.id == endpoint.port)
                    .map(|i| input_count + step_count + i),
            }
        };

        let edges: Vec<(usize, usize, String)> = graph
            .edges()
            .iter()
            .filter_map(|edge| {
                let from = node_of(&edge.source)?;
                let to = node_of(&edge.sink)?;
                let source_type = draft.source_port(&edge.source)?.port_type.label();
                let sink_type = draft.sink_port(&edge.sink)?.port_type.label();
                Some((from, to, format!("{}->{}:{}", source_type, sink_type, edge.kind)))
            })
            .collect();

        Self::from_parts(labels, edges)
    }

    /// Builds a signature from node labels and `(from, to, label)` edges.
    pub fn from_parts(labels: Vec<String>, edges: Vec<(usize, usize, String)>) -> Self {
        let n = labels.len();
        let mut graph: DiGraph<String, String> = DiGraph::with_capacity(n, edges.len());
        for label in labels {
            graph.add_node(label);
        }

        let mut edge_labels: BTreeMap<(usize, usize), Vec<String>> = BTreeMap::new();
        for (from, to, label) in edges {
            if from >= n || to >= n {
                continue;
            }
            edge_labels.entry((from, to)).or_default().push(label.clone());
            graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), label);
        }
        for list in edge_labels.values_mut() {
            list.sort();
        }

        let (colors, rounds) = refine(&graph);
        let digest = digest_of(&graph, &colors);

        Self {
            graph,
            edge_labels,
            colors,
            rounds,
            digest,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Hex SHA-256 digest of the refined colouring.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn label(&self, node: usize) -> &str {
        &self.graph[NodeIndex::new(node)]
    }

    pub fn color(&self, node: usize) -> u64 {
        self.colors[node]
    }

    /// Number of refinement rounds that changed the colouring.
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn out_degree(&self, node: usize) -> usize {
        self.graph
            .edges_directed(NodeIndex::new(node), Direction::Outgoing)
            .count()
    }

    pub fn in_degree(&self, node: usize) -> usize {
        self.graph
            .edges_directed(NodeIndex::new(node), Direction::Incoming)
            .count()
    }

    /// Sorted labels of the edges `from -> to`; empty when there are none.
    pub fn edge_labels(&self, from: usize, to: usize) -> &[String] {
        self.edge_labels
            .get(&(from, to))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Nodes adjacent to `node` in either direction.
    pub fn neighbors(&self, node: usize) -> BTreeSet<usize> {
        self.graph
            .neighbors_undirected(NodeIndex::new(node))
            .map(|other| other.index())
            .collect()
    }

    /// Sorted node labels, used for quick containment checks.
    pub fn label_multiset(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.graph.node_weights().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

/// Refines node colours until the number of colour classes stops growing.
fn refine(graph: &DiGraph<String, String>) -> (Vec<u64>, usize) {
    let n = graph.node_count();
    let mut colors: Vec<u64> = graph.node_weights().map(hash_of).collect();
    let mut classes = distinct(&colors);
    let mut rounds = 0;

    let around = |colors: &[u64], node: NodeIndex, direction: Direction| {
        let mut seen: Vec<(&str, u64)> = graph
            .edges_directed(node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (edge.weight().as_str(), colors[other.index()])
            })
            .collect();
        seen.sort_unstable();
        seen
    };

    for _ in 0..n {
        let next: Vec<u64> = graph
            .node_indices()
            .map(|node| {
                let out = around(&colors, node, Direction::Outgoing);
                let inc = around(&colors, node, Direction::Incoming);
                hash_of(&(colors[node.index()], out, inc))
            })
            .collect();

        let next_classes = distinct(&next);
        if next_classes <= classes {
            break;
        }
        colors = next;
        classes = next_classes;
        rounds += 1;
    }

    (colors, rounds)
}

fn digest_of(graph: &DiGraph<String, String>, colors: &[u64]) -> String {
    let mut node_colors = colors.to_vec();
    node_colors.sort_unstable();

    let mut edges: Vec<(u64, &str, u64)> = graph
        .edge_references()
        .map(|edge| {
            (
                colors[edge.source().index()],
                edge.weight().as_str(),
                colors[edge.target().index()],
            )
        })
        .collect();
    edges.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(format!("nodes:{};edges:{};", colors.len(), graph.edge_count()).as_bytes());
    for color in node_colors {
        hasher.update(color.to_le_bytes());
    }
    for (from, label, to) in edges {
        hasher.update(from.to_le_bytes());
        hasher.update(label.as_bytes());
        hasher.update(to.to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}
