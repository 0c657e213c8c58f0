//! Workflow Definition Module
//!
//! Provides data structures and utilities for loading, validating and
//! emitting workflows.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Step, Port, Edge, DraftGraph, CompiledGraph)
//! - [`parser`]: YAML parsing of drafts and tool descriptors
//! - [`loader`]: Tool definition lookup (in memory or on search paths)
//! - [`validator`]: Structural checks and topological sorting
//! - [`emitter`]: CWL output
//! - [`graphviz`]: DOT rendering for Graphviz

pub mod emitter;
pub mod graphviz;
pub mod loader;
pub mod model;
pub mod parser;
pub mod validator;

pub use emitter::{write_to_disk, CwlEmitter, WorkflowEmitter};
pub use graphviz::DotEmitter;
pub use loader::{DefinitionLoader, InMemoryLoader, SearchPathLoader, ToolDefinition};
pub use model::{
    Binding, CompiledGraph, Direction, DraftGraph, Edge, Endpoint, NodeRef, Port, Provenance,
    Resolution, ResolutionState, Step,
};
pub use parser::{load_draft, parse_draft, parse_tool_definition};
pub use validator::{stable_topological_order, validate_draft, verify_acyclic};
