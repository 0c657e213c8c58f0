//! Type Compatibility
//!
//! Decides whether an output port may feed an input port, and how
//! specific that match is. Incompatibility is an ordinary negative result,
//! never an error.
//!
//! # Specificity
//!
//! Every compatible pair gets a [`Compatibility`] whose ordering key is
//! `(kind rank, distance)`, compared lexicographically; smaller is more
//! specific.
//!
//! - Kind rank: `Direct` is 0, `Gather` and `Scatter` are 1.
//! - Distance: 0 for identical types, one per format-hierarchy hop, one more
//!   to reach a generic `File`, the listed cost for numeric widening, and
//!   [`ANY_DISTANCE`] for an `Any` sink. Arrays take their element distance.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use log::debug;

use super::port_type::PortType;

/// Distance assigned when a sink accepts `Any`.
pub const ANY_DISTANCE: u32 = 100;

/// Numeric widening coercions: (source, sink, distance).
const COERCIONS: &[(PortType, PortType, u32)] = &[
    (PortType::Int, PortType::Long, 1),
    (PortType::Long, PortType::Double, 1),
    (PortType::Float, PortType::Double, 1),
    (PortType::Int, PortType::Double, 2),
];

/// How a source value reaches a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    /// One value per invocation.
    Direct,
    /// A scalar source feeds an array port that the sink step scatters
    /// over, invoking the sink once per element.
    Scatter,
    /// The per-invocation outputs of a scattered source are collected
    /// into an array port.
    Gather,
}

impl EdgeKind {
    fn rank(self) -> u8 {
        match self {
            EdgeKind::Direct => 0,
            EdgeKind::Scatter | EdgeKind::Gather => 1,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeKind::Direct => write!(f, "direct"),
            EdgeKind::Scatter => write!(f, "scatter"),
            EdgeKind::Gather => write!(f, "gather"),
        }
    }
}

/// Annotations of the two endpoints that affect compatibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeContext {
    /// The sink port is listed in its step's `scatter`.
    pub sink_scattered: bool,
    /// The source step scatters, producing one value per invocation.
    pub source_scattered: bool,
}

/// A successful compatibility assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compatibility {
    pub kind: EdgeKind,
    pub distance: u32,
}

impl Compatibility {
    /// Ordering key; smaller is more specific.
    pub fn specificity(&self) -> (u8, u32) {
        (self.kind.rank(), self.distance)
    }
}

/// The format hierarchy plus the fixed coercion rules.
///
/// Formats form a forest: each format has at most one parent, and a
/// generic `File` sits above every root.
#[derive(Debug, Clone, Default)]
pub struct TypeHierarchy {
    parents: BTreeMap<String, String>,
}

impl TypeHierarchy {
    /// Creates a hierarchy with no format relationships.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a hierarchy from `(child, parent)` pairs.
    pub fn from_pairs<I, C, P>(pairs: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = (C, P)>,
        C: Into<String>,
        P: Into<String>,
    {
        let mut hierarchy = Self::new();
        for (child, parent) in pairs {
            hierarchy.declare_subtype(child, parent)?;
        }
        Ok(hierarchy)
    }

    /// Declares `child` as a more specific format than `parent`.
    ///
    /// Fails if `child` already has a different parent or if the
    /// declaration would close a cycle.
    pub fn declare_subtype(
        &mut self,
        child: impl Into<String>,
        parent: impl Into<String>,
    ) -> Result<(), String> {
        let child = child.into();
        let parent = parent.into();

        if let Some(existing) = self.parents.get(&child) {
            if *existing != parent {
                return Err(format!(
                    "Format '{}' already has parent '{}', cannot also derive from '{}'",
                    child, existing, parent
                ));
            }
            return Ok(());
        }
        // A format is on its own chain, so this also rejects `a <: a`.
        if std::iter::once(parent.as_str())
            .chain(self.ancestors(&parent))
            .any(|format| format == child)
        {
            return Err(format!(
                "Declaring '{}' as a subtype of '{}' creates a cycle",
                child, parent
            ));
        }

        debug!("Format hierarchy: {} <: {}", child, parent);
        self.parents.insert(child, parent);
        Ok(())
    }

    /// Returns the ancestors of `format`, nearest first.
    pub fn ancestors(&self, format: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = format;
        while let Some(parent) = self.parents.get(current) {
            if !visited.insert(parent.as_str()) {
                break;
            }
            chain.push(parent.as_str());
            current = parent;
        }
        chain
    }

    /// Returns true when a value of `source` type may feed a `sink` port.
    pub fn compatible(&self, source: &PortType, sink: &PortType) -> bool {
        self.distance(source, sink).is_some()
    }

    /// Distance of a direct (non-scatter) match, or `None` when the types
    /// are unrelated.
    pub fn distance(&self, source: &PortType, sink: &PortType) -> Option<u32> {
        match (source, sink) {
            (PortType::File { format: from }, PortType::File { format: to }) => {
                self.format_distance(from.as_deref(), to.as_deref())
            }
            (PortType::Array(from), PortType::Array(to)) => self.distance(from, to),
            (from, to) if from == to => Some(0),
            (_, PortType::Any) => Some(ANY_DISTANCE),
            (from, to) => COERCIONS
                .iter()
                .find(|(s, t, _)| s == from && t == to)
                .map(|(_, _, cost)| *cost),
        }
    }

    /// Assesses a candidate edge including scatter/gather relationships.
    pub fn assess(
        &self,
        source: &PortType,
        sink: &PortType,
        context: EdgeContext,
    ) -> Option<Compatibility> {
        if context.source_scattered {
            // A scattered step yields one value per invocation; only an
            // array port can collect them.
            let element = sink.element()?;
            return self.distance(source, element).map(|distance| Compatibility {
                kind: EdgeKind::Gather,
                distance,
            });
        }

        if let Some(distance) = self.distance(source, sink) {
            return Some(Compatibility {
                kind: EdgeKind::Direct,
                distance,
            });
        }

        if context.sink_scattered {
            let element = sink.element()?;
            return self.distance(source, element).map(|distance| Compatibility {
                kind: EdgeKind::Scatter,
                distance,
            });
        }

        None
    }

    fn format_distance(&self, source: Option<&str>, sink: Option<&str>) -> Option<u32> {
        match (source, sink) {
            (None, None) => Some(0),
            (Some(from), None) => Some(self.ancestors(from).len() as u32 + 1),
            (None, Some(_)) => None,
            (Some(from), Some(to)) if from == to => Some(0),
            (Some(from), Some(to)) => self
                .ancestors(from)
                .iter()
                .position(|ancestor| *ancestor == to)
                .map(|index| index as u32 + 1),
        }
    }
}
