//! Soft-failure reporting.
//!
//! Generation, extraction and population never abort on per-field problems.
//! They log the problem and keep going; the same record is collected here so
//! callers that need strict correctness can inspect it afterwards.

use std::fmt;

use serde::Serialize;

/// Category of a recovered problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Object nesting exceeded `max_depth`; the type was built without slots.
    DepthTruncated,
    /// A recursive `$ref` was unrolled up to the bound and then cut.
    RecursionTruncated,
    /// More than one root-typed node was found; the first was used.
    MultipleRootInstances,
    /// No candidate node type exists for a structured value.
    UnresolvedSlotType,
    /// The property shape has no node-type mapping.
    UnsupportedShape,
    /// A value key has no counterpart in the node type.
    UnmappedProperty,
    /// A raw field value could not be coerced to its kind.
    CoercionFailed,
    /// A slot or sibling link points at a missing or already visited node.
    BrokenLink,
}

/// One recovered problem, located by schema path or node path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.path, self.message)
    }
}

/// Collector that logs every diagnostic as it is recorded.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// An empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem and emit it through `log`.
    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        path: impl Into<String>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            kind,
            path: path.into(),
            message: message.into(),
        };
        match kind {
            DiagnosticKind::UnmappedProperty => debug!("{diagnostic}"),
            _ => warn!("{diagnostic}"),
        }
        self.items.push(diagnostic);
    }

    /// Append `other` without logging its entries again.
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Entries in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Whether any recorded diagnostic has the given kind.
    pub fn has(&self, kind: DiagnosticKind) -> bool {
        self.items.iter().any(|d| d.kind == kind)
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

impl Serialize for Diagnostics {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}
