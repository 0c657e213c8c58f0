//! Graphviz Rendering
//!
//! Draws a compiled graph as a DOT digraph:
//!
//! - steps are boxes, in execution order
//! - top-level outputs are ellipses; top-level inputs only when enabled
//! - inferred edges are dashed, explicit edges solid
//!
//! Render with `dot -Tpng pipeline.gv -o pipeline.png`.

use std::fmt::Write;

use super::emitter::WorkflowEmitter;
use super::model::{CompiledGraph, Edge, Endpoint, NodeRef, Provenance};
use crate::error::{InferenceError, Result};
use crate::types::EdgeKind;

/// Emits DOT documents for Graphviz.
#[derive(Debug, Clone, Default)]
pub struct DotEmitter {
    label_edges: bool,
    show_inputs: bool,
}

impl DotEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels each edge with its source and sink port names.
    pub fn with_edge_labels(mut self, enabled: bool) -> Self {
        self.label_edges = enabled;
        self
    }

    /// Draws top-level inputs and the edges leaving them.
    pub fn with_inputs(mut self, enabled: bool) -> Self {
        self.show_inputs = enabled;
        self
    }

    fn edge_label(edge: &Edge) -> String {
        let mut label = format!("{}:{}", edge.source.port, edge.sink.port);
        if edge.kind != EdgeKind::Direct {
            label.push_str(&format!(" ({})", edge.kind));
        }
        label
    }

    fn render(&self, graph: &CompiledGraph) -> std::result::Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {} {{", quote(graph.id()))?;
        writeln!(dot, "  rankdir=TB;")?;
        writeln!(dot, "  node [shape=box];")?;

        if self.show_inputs {
            for port in graph.inputs() {
                writeln!(
                    dot,
                    "  {} [label={}, shape=ellipse];",
                    quote(&format!("in:{}", port.id)),
                    quote(&port.id)
                )?;
            }
        }

        for step in graph.order() {
            writeln!(
                dot,
                "  {} [label={}];",
                quote(&format!("step:{}", step)),
                quote(step)
            )?;
        }

        for port in graph.outputs() {
            writeln!(
                dot,
                "  {} [label={}, shape=ellipse];",
                quote(&format!("out:{}", port.id)),
                quote(&port.id)
            )?;
        }

        for edge in graph.edges() {
            if edge.source.node == NodeRef::Inputs && !self.show_inputs {
                continue;
            }

            let mut attributes = Vec::new();
            if edge.provenance == Provenance::Inferred {
                attributes.push("style=dashed".to_string());
            }
            if self.label_edges {
                attributes.push(format!("label={}", quote(&Self::edge_label(edge))));
            }

            write!(
                dot,
                "  {} -> {}",
                quote(&node_id(&edge.source)),
                quote(&node_id(&edge.sink))
            )?;
            if attributes.is_empty() {
                writeln!(dot, ";")?;
            } else {
                writeln!(dot, " [{}];", attributes.join(", "))?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}

impl WorkflowEmitter for DotEmitter {
    fn emit(&self, graph: &CompiledGraph) -> Result<String> {
        self.render(graph).map_err(|e| InferenceError::Emit {
            workflow: graph.id().to_string(),
            message: e.to_string(),
        })
    }

    fn extension(&self) -> &str {
        "gv"
    }
}

fn node_id(endpoint: &Endpoint) -> String {
    match &endpoint.node {
        NodeRef::Inputs => format!("in:{}", endpoint.port),
        NodeRef::Step(step) => format!("step:{}", step),
        NodeRef::Outputs => format!("out:{}", endpoint.port),
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}
