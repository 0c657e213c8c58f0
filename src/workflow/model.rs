//! Workflow Data Model
//!
//! Core data structures for draft and compiled workflows.
//!
//! A draft lists steps with typed ports and zero or more explicit bindings.
//! Top-level inputs and outputs behave as virtual steps: inputs only produce
//! values, outputs only consume them.
//!
//! # Example YAML Format
//!
//! ```yaml
//! id: align_pipeline
//! inputs:
//!   reads: File
//! outputs:
//!   report: File
//! steps:
//!   - id: trim
//!     run: trim_reads.cwl
//!   - id: align
//!     run: bowtie2.cwl
//!     in:
//!       reads: trim/trimmed
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{EdgeKind, PortType};

/// Whether a port consumes or produces a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// A typed, named slot on a step.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    /// Unique within the owning step
    pub id: String,

    pub direction: Direction,

    pub port_type: PortType,

    /// Value used when nothing is wired into an input port
    pub default: Option<Value>,

    /// An optional input may stay unbound
    pub optional: bool,
}

impl Port {
    /// Creates an input port.
    pub fn input(id: impl Into<String>, port_type: PortType) -> Self {
        Self::new(id, Direction::Input, port_type)
    }

    /// Creates an output port.
    pub fn output(id: impl Into<String>, port_type: PortType) -> Self {
        Self::new(id, Direction::Output, port_type)
    }

    fn new(id: impl Into<String>, direction: Direction, port_type: PortType) -> Self {
        Self {
            id: id.into().trim().to_string(),
            direction,
            port_type,
            default: None,
            optional: false,
        }
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the port as optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// True when the port accepts or produces a sequence of values.
    pub fn is_multiple(&self) -> bool {
        self.port_type.is_array()
    }
}

/// A user-declared binding for an input port.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// Reference to a source: `step/port` or a top-level input id.
    Source(String),
    /// A constant value; satisfies the port without an edge.
    Literal(Value),
}

/// A single step in a workflow.
///
/// Steps are immutable once loaded: inference only adds edges between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Unique identifier for this step
    pub id: String,

    /// Reference to the underlying tool or sub-workflow definition
    pub run: String,

    /// Input ports, in declaration order
    pub inputs: Vec<Port>,

    /// Output ports, in declaration order
    pub outputs: Vec<Port>,

    /// Input ports this step scatters over
    pub scatter: Vec<String>,

    /// Explicit bindings keyed by input port id
    pub bindings: BTreeMap<String, Binding>,
}

impl Step {
    /// Creates a new step with no ports.
    ///
    /// # Example
    ///
    /// ```
    /// use inferflow::types::PortType;
    /// use inferflow::workflow::{Port, Step};
    ///
    /// let step = Step::new("align", "bowtie2.cwl")
    ///     .with_input(Port::input("reads", PortType::file()))
    ///     .with_output(Port::output("alignment", PortType::file()))
    ///     .bind("reads", "trim/trimmed");
    /// assert_eq!(step.inputs.len(), 1);
    /// ```
    pub fn new(id: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            run: run.into().trim().to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            scatter: Vec::new(),
            bindings: BTreeMap::new(),
        }
    }

    /// Adds an input port.
    pub fn with_input(mut self, mut port: Port) -> Self {
        port.direction = Direction::Input;
        self.inputs.push(port);
        self
    }

    /// Adds an output port.
    pub fn with_output(mut self, mut port: Port) -> Self {
        port.direction = Direction::Output;
        self.outputs.push(port);
        self
    }

    /// Scatters this step over the given input port.
    pub fn with_scatter(mut self, port: impl Into<String>) -> Self {
        self.scatter.push(port.into());
        self
    }

    /// Binds an input port to a source reference.
    pub fn bind(mut self, port: impl Into<String>, source: impl Into<String>) -> Self {
        self.bindings
            .insert(port.into(), Binding::Source(source.into()));
        self
    }

    /// Binds an input port to a literal value.
    pub fn bind_literal(mut self, port: impl Into<String>, value: Value) -> Self {
        self.bindings.insert(port.into(), Binding::Literal(value));
        self
    }

    /// Gets an input port by ID.
    pub fn input(&self, id: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == id)
    }

    /// Gets an output port by ID.
    pub fn output(&self, id: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.id == id)
    }

    /// True when the step is invoked once per element of a scattered port.
    pub fn is_scattered(&self) -> bool {
        !self.scatter.is_empty()
    }

    /// True when `port` is listed in this step's scatter.
    pub fn scatters(&self, port: &str) -> bool {
        self.scatter.iter().any(|p| p == port)
    }
}

/// The node an endpoint belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    /// Virtual step holding the top-level inputs.
    Inputs,
    Step(String),
    /// Virtual step holding the top-level outputs.
    Outputs,
}

/// One end of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub node: NodeRef,
    pub port: String,
}

impl Endpoint {
    /// A top-level input.
    pub fn input(port: impl Into<String>) -> Self {
        Self {
            node: NodeRef::Inputs,
            port: port.into(),
        }
    }

    /// A port of a real step.
    pub fn step(step: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            node: NodeRef::Step(step.into()),
            port: port.into(),
        }
    }

    /// A top-level output.
    pub fn output(port: impl Into<String>) -> Self {
        Self {
            node: NodeRef::Outputs,
            port: port.into(),
        }
    }

    /// Parses a source reference: `step/port` or a top-level input id.
    pub fn parse_source(reference: &str) -> Self {
        match reference.trim().split_once('/') {
            Some((step, port)) => Self::step(step.trim(), port.trim()),
            None => Self::input(reference.trim()),
        }
    }

    /// Returns the step id for endpoints on real steps.
    pub fn step_id(&self) -> Option<&str> {
        match &self.node {
            NodeRef::Step(id) => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node {
            NodeRef::Inputs => write!(f, "{}", self.port),
            NodeRef::Step(step) => write!(f, "{}/{}", step, self.port),
            NodeRef::Outputs => write!(f, "outputs/{}", self.port),
        }
    }
}

/// Whether an edge was declared by the user or inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    Explicit,
    Inferred,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Explicit => write!(f, "explicit"),
            Provenance::Inferred => write!(f, "inferred"),
        }
    }
}

/// A data dependency from an output to an input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: Endpoint,
    pub sink: Endpoint,
    pub kind: EdgeKind,
    pub provenance: Provenance,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}, {})",
            self.source, self.sink, self.kind, self.provenance
        )
    }
}

/// A workflow before edge inference.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftGraph {
    /// Workflow identifier, matched against the inference policy
    pub id: String,

    /// Top-level inputs; they produce values, so their direction is `Output`
    pub inputs: Vec<Port>,

    /// Top-level outputs; they consume values, so their direction is `Input`
    pub outputs: Vec<Port>,

    /// Explicit `outputSource` references keyed by output id
    pub output_sources: BTreeMap<String, String>,

    /// Steps in declaration order
    pub steps: Vec<Step>,
}

impl DraftGraph {
    /// Creates an empty draft.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            output_sources: BTreeMap::new(),
            steps: Vec::new(),
        }
    }

    /// Adds a top-level input.
    pub fn with_input(mut self, mut port: Port) -> Self {
        port.direction = Direction::Output;
        self.inputs.push(port);
        self
    }

    /// Adds a top-level output.
    pub fn with_output(mut self, mut port: Port) -> Self {
        port.direction = Direction::Input;
        self.outputs.push(port);
        self
    }

    /// Declares the source of a top-level output.
    pub fn with_output_source(
        mut self,
        output: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        self.output_sources.insert(output.into(), source.into());
        self
    }

    /// Appends a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Gets a step by ID.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Declaration index of a step.
    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// Gets a top-level input by ID.
    pub fn input(&self, id: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == id)
    }

    /// Port that produces values at a source endpoint.
    pub fn source_port(&self, endpoint: &Endpoint) -> Option<&Port> {
        match &endpoint.node {
            NodeRef::Inputs => self.input(&endpoint.port),
            NodeRef::Step(step) => self.step(step)?.output(&endpoint.port),
            NodeRef::Outputs => None,
        }
    }

    /// Port that consumes values at a sink endpoint.
    pub fn sink_port(&self, endpoint: &Endpoint) -> Option<&Port> {
        match &endpoint.node {
            NodeRef::Inputs => None,
            NodeRef::Step(step) => self.step(step)?.input(&endpoint.port),
            NodeRef::Outputs => self.outputs.iter().find(|p| p.id == endpoint.port),
        }
    }

    /// Total number of ports across steps and the top level.
    pub fn port_count(&self) -> usize {
        self.inputs.len()
            + self.outputs.len()
            + self
                .steps
                .iter()
                .map(|s| s.inputs.len() + s.outputs.len())
                .sum::<usize>()
    }
}

/// How a sink port was satisfied.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionState {
    /// Wired to a source by an edge.
    Resolved {
        source: Endpoint,
        provenance: Provenance,
    },
    /// Satisfied by a literal binding.
    Literal,
    /// No candidate; the port's default applies.
    Defaulted,
    /// No candidate; the port is optional.
    Unbound,
}

/// Resolution report for one sink port.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub sink: Endpoint,
    pub state: ResolutionState,
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            ResolutionState::Resolved { source, provenance } => {
                write!(f, "{} <- {} ({})", self.sink, source, provenance)
            }
            ResolutionState::Literal => write!(f, "{} <- literal", self.sink),
            ResolutionState::Defaulted => write!(f, "{} <- default", self.sink),
            ResolutionState::Unbound => write!(f, "{} unbound", self.sink),
        }
    }
}

/// A fully wired workflow. Immutable once built.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    draft: DraftGraph,
    edges: Vec<Edge>,
    order: Vec<String>,
    resolutions: Vec<Resolution>,
    compiled_at: DateTime<Utc>,
}

impl CompiledGraph {
    pub(crate) fn new(
        draft: DraftGraph,
        edges: Vec<Edge>,
        order: Vec<String>,
        resolutions: Vec<Resolution>,
    ) -> Self {
        Self {
            draft,
            edges,
            order,
            resolutions,
            compiled_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.draft.id
    }

    /// The draft this graph was compiled from.
    pub fn draft(&self) -> &DraftGraph {
        &self.draft
    }

    pub fn steps(&self) -> &[Step] {
        &self.draft.steps
    }

    pub fn inputs(&self) -> &[Port] {
        &self.draft.inputs
    }

    pub fn outputs(&self) -> &[Port] {
        &self.draft.outputs
    }

    /// Edges sorted by sink step declaration index, then sink port index.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Step ids in topological order.
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    /// Gets a step by ID.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.draft.step(id)
    }

    /// Edge feeding the given sink, if any.
    pub fn edge_into(&self, sink: &Endpoint) -> Option<&Edge> {
        self.edges.iter().find(|e| &e.sink == sink)
    }

    /// Number of real steps.
    pub fn len(&self) -> usize {
        self.draft.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draft.steps.is_empty()
    }
}
