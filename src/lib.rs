//! inferflow - Workflow Inference Compiler
//!
//! Compiles draft workflows, in which steps list tools and only some of
//! their connections, into complete CWL workflows. Missing edges are
//! inferred from port types, file formats and step order.
//!
//! # Architecture
//!
//! - [`types`]: port types, coercions and the format hierarchy
//! - [`workflow`]: draft/compiled graph model, parsing, validation, CWL output
//! - [`inference`]: candidate resolution and the edge inference engine
//! - [`isomorphism`]: structural duplicate detection across compilations
//! - [`policy`], [`ci`]: exclusion lists and CI verdicts
//! - [`config`], [`compiler`]: settings and the end-to-end pipeline
//!
//! # Example
//!
//! ```rust,no_run
//! use inferflow::{Compiler, CompilerConfig, CwlEmitter, InferencePolicy, SignatureCache};
//! use inferflow::workflow::{write_to_disk, SearchPathLoader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CompilerConfig::load_or_default("global_config.json")?;
//!     let policy = InferencePolicy::new();
//!     let loader = SearchPathLoader::new(config.search_paths.clone());
//!     let compiler = Compiler::new(&config, &policy, SignatureCache::global(), &loader)?;
//!
//!     let outcome = compiler.compile_file("pipeline.yml")?;
//!     write_to_disk(&CwlEmitter::default(), &outcome.graph, "autogenerated".as_ref())?;
//!     Ok(())
//! }
//! ```

pub mod ci;
pub mod compiler;
pub mod config;
pub mod error;
pub mod inference;
pub mod isomorphism;
pub mod policy;
pub mod types;
pub mod workflow;

// Re-export commonly used types
pub use compiler::{CompileOutcome, Compiler};
pub use config::CompilerConfig;
pub use error::{InferenceError, Result};
pub use inference::InferenceEngine;
pub use isomorphism::{DuplicateCheck, SignatureCache};
pub use policy::InferencePolicy;
pub use types::{PortType, TypeHierarchy};
pub use workflow::{CompiledGraph, CwlEmitter, DraftGraph, Port, Step};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "inferflow";
