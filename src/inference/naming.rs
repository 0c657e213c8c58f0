//! Naming conventions used to break ties between equally specific candidates.

/// Port-name equivalences.
///
/// Two names match when they are equal or when they appear together in a
/// renaming pair, in either order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamingConventions {
    pairs: Vec<(String, String)>,
}

impl NamingConventions {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn matches(&self, source: &str, sink: &str) -> bool {
        source == sink
            || self
                .pairs
                .iter()
                .any(|(a, b)| (a == source && b == sink) || (a == sink && b == source))
    }
}
