//! Type compatibility model
//!
//! - [`PortType`]: the declared type of a port
//! - [`TypeHierarchy`]: format subtyping, coercions and edge-kind assessment

pub mod hierarchy;
pub mod port_type;

pub use hierarchy::{Compatibility, EdgeContext, EdgeKind, TypeHierarchy, ANY_DISTANCE};
pub use port_type::{PortType, TypeParseError, MAX_ARRAY_DEPTH};
