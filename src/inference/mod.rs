//! Edge Inference
//!
//! # Structure
//!
//! - [`resolver`]: enumerates visible, type-compatible sources for a sink
//! - [`engine`]: resolves every sink, applies tie-breaks, checks acyclicity
//! - [`naming`]: port-name equivalences used as an opt-in tie-break

pub mod engine;
pub mod naming;
pub mod resolver;

pub use engine::{InferenceEngine, InferenceOptions, STEP_INPUT_SEPARATOR};
pub use naming::NamingConventions;
pub use resolver::{Candidate, CandidateResolver};
