//! Port Types
//!
//! The closed type vocabulary used by step ports, parsed from the CWL
//! shorthand found in tool descriptors and drafts:
//!
//! ```text
//! File        a single file
//! File[]      an array of files
//! string?     an optional string
//! int[][]     a two-dimensional array of integers
//! ```

use std::fmt;

use thiserror::Error;

/// Deepest array nesting a type expression may declare.
pub const MAX_ARRAY_DEPTH: usize = 8;

/// Error raised when a type string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeParseError {
    #[error("empty type expression")]
    Empty,
    #[error("unknown type '{0}'")]
    Unknown(String),
    #[error("arrays nested {0} deep, at most {} allowed", MAX_ARRAY_DEPTH)]
    TooDeep(usize),
}

/// The declared type of a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortType {
    Boolean,
    Int,
    Long,
    Float,
    Double,
    String,
    /// A file, optionally annotated with a format identifier
    /// (e.g. `edam:format_1929`).
    File { format: Option<String> },
    Directory,
    Array(Box<PortType>),
    /// Accepts any value.
    Any,
}

impl PortType {
    /// A generic file with no format annotation.
    pub fn file() -> Self {
        PortType::File { format: None }
    }

    /// A file annotated with `format`.
    pub fn file_with_format(format: impl Into<String>) -> Self {
        PortType::File {
            format: Some(format.into()),
        }
    }

    /// An array of `inner`.
    pub fn array(inner: PortType) -> Self {
        PortType::Array(Box::new(inner))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, PortType::Array(_))
    }

    /// Number of array levels around the innermost element type.
    pub fn array_depth(&self) -> usize {
        match self {
            PortType::Array(inner) => 1 + inner.array_depth(),
            _ => 0,
        }
    }

    /// Returns the element type of an array.
    pub fn element(&self) -> Option<&PortType> {
        match self {
            PortType::Array(inner) => Some(inner),
            _ => None,
        }
    }

    /// Attaches a format to the innermost `File` of this type.
    ///
    /// Types without a `File` are returned unchanged.
    pub fn with_format(self, format: impl Into<String>) -> Self {
        match self {
            PortType::File { .. } => PortType::File {
                format: Some(format.into()),
            },
            PortType::Array(inner) => PortType::Array(Box::new(inner.with_format(format))),
            other => other,
        }
    }

    /// Returns the format of the innermost `File`, if any.
    pub fn format(&self) -> Option<&str> {
        match self {
            PortType::File { format } => format.as_deref(),
            PortType::Array(inner) => inner.format(),
            _ => None,
        }
    }

    /// Human-readable label that includes the file format.
    ///
    /// Used in signatures and error messages where two differently
    /// formatted files must not look alike.
    pub fn label(&self) -> String {
        match self {
            PortType::File {
                format: Some(format),
            } => format!("File<{}>", format),
            PortType::Array(inner) => format!("{}[]", inner.label()),
            other => other.to_string(),
        }
    }

    /// Parses CWL shorthand into a type and an optional flag.
    ///
    /// # Example
    ///
    /// ```
    /// use inferflow::types::PortType;
    ///
    /// let (ty, optional) = PortType::parse("File[]?").unwrap();
    /// assert_eq!(ty, PortType::array(PortType::file()));
    /// assert!(optional);
    /// ```
    pub fn parse(text: &str) -> Result<(PortType, bool), TypeParseError> {
        let mut text = text.trim();
        if text.is_empty() {
            return Err(TypeParseError::Empty);
        }

        let optional = text.ends_with('?');
        if optional {
            text = text[..text.len() - 1].trim_end();
        }

        let mut depth = 0;
        while let Some(stripped) = text.strip_suffix("[]") {
            text = stripped.trim_end();
            depth += 1;
            if depth > MAX_ARRAY_DEPTH {
                return Err(TypeParseError::TooDeep(depth));
            }
        }

        let mut ty = Self::parse_base(text)?;
        for _ in 0..depth {
            ty = PortType::array(ty);
        }

        Ok((ty, optional))
    }

    /// Parses a single base type name.
    pub fn parse_base(name: &str) -> Result<PortType, TypeParseError> {
        let ty = match name {
            "" => return Err(TypeParseError::Empty),
            "boolean" => PortType::Boolean,
            "int" => PortType::Int,
            "long" => PortType::Long,
            "float" => PortType::Float,
            "double" => PortType::Double,
            "string" => PortType::String,
            "File" => PortType::file(),
            "Directory" => PortType::Directory,
            "Any" => PortType::Any,
            other => return Err(TypeParseError::Unknown(other.to_string())),
        };
        Ok(ty)
    }
}

impl fmt::Display for PortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortType::Boolean => write!(f, "boolean"),
            PortType::Int => write!(f, "int"),
            PortType::Long => write!(f, "long"),
            PortType::Float => write!(f, "float"),
            PortType::Double => write!(f, "double"),
            PortType::String => write!(f, "string"),
            PortType::File { .. } => write!(f, "File"),
            PortType::Directory => write!(f, "Directory"),
            PortType::Array(inner) => write!(f, "{}[]", inner),
            PortType::Any => write!(f, "Any"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(PortType::parse("string").unwrap(), (PortType::String, false));
        assert_eq!(PortType::parse("File").unwrap(), (PortType::file(), false));
        assert_eq!(PortType::parse(" int? ").unwrap(), (PortType::Int, true));
    }

    #[test]
    fn test_parse_nested_arrays() {
        let (ty, optional) = PortType::parse("string[][]").unwrap();
        assert_eq!(ty, PortType::array(PortType::array(PortType::String)));
        assert!(!optional);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(PortType::parse("  "), Err(TypeParseError::Empty));
        assert_eq!(
            PortType::parse("record"),
            Err(TypeParseError::Unknown("record".to_string()))
        );
        assert_eq!(PortType::parse("[]"), Err(TypeParseError::Empty));
    }

    #[test]
    fn test_array_nesting_is_capped() {
        let deepest = format!("int{}", "[]".repeat(MAX_ARRAY_DEPTH));
        let (ty, _) = PortType::parse(&deepest).unwrap();
        assert_eq!(ty.array_depth(), MAX_ARRAY_DEPTH);

        let too_deep = format!("int{}?", "[]".repeat(MAX_ARRAY_DEPTH + 1));
        assert_eq!(
            PortType::parse(&too_deep),
            Err(TypeParseError::TooDeep(MAX_ARRAY_DEPTH + 1))
        );
        assert_eq!(PortType::parse(&"[]".repeat(10_000)), Err(TypeParseError::TooDeep(9)));
    }

    #[test]
    fn test_with_format_targets_innermost_file() {
        let ty = PortType::array(PortType::file()).with_format("edam:format_1929");
        assert_eq!(ty.format(), Some("edam:format_1929"));
        assert_eq!(ty.label(), "File<edam:format_1929>[]");

        let untouched = PortType::String.with_format("edam:format_1929");
        assert_eq!(untouched, PortType::String);
    }

    #[test]
    fn test_display_is_cwl_shorthand() {
        let ty = PortType::array(PortType::file_with_format("edam:format_2330"));
        assert_eq!(ty.to_string(), "File[]");
        assert_eq!(PortType::Directory.to_string(), "Directory");
    }
}
