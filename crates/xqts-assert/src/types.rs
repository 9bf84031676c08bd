// crates/xqts-assert/src/types.rs
// ============================================================================
// Module: Type Descriptors
// Description: Sequence-type shapes matched against result items.
// Purpose: Back the type assertion with cardinality and item-type checks.
// Dependencies: serde, thiserror, crate::item
// ============================================================================

//! ## Overview
//! A [`TypeDescriptor`] is `empty-sequence()` or an item test followed by an
//! optional occurrence indicator (`?`, `*`, `+`). Atomic tests honour
//! derivation, so `xs:integer` items match `xs:decimal`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::item::AtomicType;
use crate::item::ItemKind;
use crate::item::ResultItem;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when parsing a type descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeDescriptorError {
    /// The descriptor was empty.
    #[error("type descriptor must be non-empty")]
    Empty,
    /// The item test is not recognized.
    #[error("unknown item type: {0}")]
    UnknownItemType(String),
}

// ============================================================================
// SECTION: Occurrence
// ============================================================================

/// Cardinality constraint of a sequence type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    /// No indicator.
    ExactlyOne,
    /// `?`
    ZeroOrOne,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Occurrence {
    /// Returns true when `count` items satisfy the constraint.
    #[must_use]
    pub const fn allows(self, count: usize) -> bool {
        match self {
            Self::ExactlyOne => count == 1,
            Self::ZeroOrOne => count <= 1,
            Self::ZeroOrMore => true,
            Self::OneOrMore => count >= 1,
        }
    }

    /// Returns the indicator suffix.
    #[must_use]
    pub const fn indicator(self) -> &'static str {
        match self {
            Self::ExactlyOne => "",
            Self::ZeroOrOne => "?",
            Self::ZeroOrMore => "*",
            Self::OneOrMore => "+",
        }
    }
}

// ============================================================================
// SECTION: Item Tests
// ============================================================================

/// Test applied to each item of a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemTest {
    /// `item()`
    AnyItem,
    /// `node()`
    AnyNode,
    /// `element()` or `element(name)`
    Element(Option<String>),
    /// `attribute()` or `attribute(name)`
    Attribute(Option<String>),
    /// `document-node()`
    Document,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction()`
    ProcessingInstruction,
    /// `namespace-node()`
    Namespace,
    /// `map(*)`
    Map,
    /// `array(*)`
    Array,
    /// `function(*)`; maps and arrays are functions too.
    Function,
    /// `xs:anyAtomicType`
    AnyAtomic,
    /// A named atomic type.
    Atomic(AtomicType),
}

impl ItemTest {
    /// Returns true when `item` passes the test.
    #[must_use]
    pub fn matches(&self, item: &ResultItem) -> bool {
        let kind = item.kind();
        match self {
            Self::AnyItem => true,
            Self::AnyNode => kind.is_node(),
            Self::Element(name) => kind == ItemKind::Element && name_matches(name.as_deref(), item),
            Self::Attribute(name) => {
                kind == ItemKind::Attribute && name_matches(name.as_deref(), item)
            }
            Self::Document => kind == ItemKind::Document,
            Self::Text => kind == ItemKind::Text,
            Self::Comment => kind == ItemKind::Comment,
            Self::ProcessingInstruction => kind == ItemKind::ProcessingInstruction,
            Self::Namespace => kind == ItemKind::Namespace,
            Self::Map => kind == ItemKind::Map,
            Self::Array => kind == ItemKind::Array,
            Self::Function => {
                matches!(kind, ItemKind::Function | ItemKind::Map | ItemKind::Array)
            }
            Self::AnyAtomic => matches!(kind, ItemKind::Atomic(_)),
            Self::Atomic(expected) => {
                matches!(kind, ItemKind::Atomic(actual) if actual.is_subtype_of(*expected))
            }
        }
    }
}

/// Checks an optional node name test; `None` and `*` match any name.
fn name_matches(expected: Option<&str>, item: &ResultItem) -> bool {
    match expected {
        None | Some("*") => true,
        Some(name) => item.markup().and_then(|node| node.name()) == Some(name),
    }
}

impl fmt::Display for ItemTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyItem => f.write_str("item()"),
            Self::AnyNode => f.write_str("node()"),
            Self::Element(None) => f.write_str("element()"),
            Self::Element(Some(name)) => write!(f, "element({name})"),
            Self::Attribute(None) => f.write_str("attribute()"),
            Self::Attribute(Some(name)) => write!(f, "attribute({name})"),
            Self::Document => f.write_str("document-node()"),
            Self::Text => f.write_str("text()"),
            Self::Comment => f.write_str("comment()"),
            Self::ProcessingInstruction => f.write_str("processing-instruction()"),
            Self::Namespace => f.write_str("namespace-node()"),
            Self::Map => f.write_str("map(*)"),
            Self::Array => f.write_str("array(*)"),
            Self::Function => f.write_str("function(*)"),
            Self::AnyAtomic => f.write_str("xs:anyAtomicType"),
            Self::Atomic(ty) => f.write_str(ty.name()),
        }
    }
}

impl FromStr for ItemTest {
    type Err = TypeDescriptorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let unknown = || TypeDescriptorError::UnknownItemType(value.to_string());
        let test = match value {
            "item()" => Self::AnyItem,
            "node()" => Self::AnyNode,
            "element()" | "element(*)" => Self::Element(None),
            "attribute()" | "attribute(*)" => Self::Attribute(None),
            "document-node()" => Self::Document,
            "text()" => Self::Text,
            "comment()" => Self::Comment,
            "processing-instruction()" => Self::ProcessingInstruction,
            "namespace-node()" => Self::Namespace,
            "map(*)" => Self::Map,
            "array(*)" => Self::Array,
            "function(*)" => Self::Function,
            "xs:anyAtomicType" => Self::AnyAtomic,
            other => {
                if let Some(name) = named_test(other, "element") {
                    Self::Element(Some(name.to_string()))
                } else if let Some(name) = named_test(other, "attribute") {
                    Self::Attribute(Some(name.to_string()))
                } else {
                    Self::Atomic(other.parse().map_err(|_| unknown())?)
                }
            }
        };
        Ok(test)
    }
}

/// Extracts `name` from `keyword(name)`.
fn named_test<'a>(value: &'a str, keyword: &str) -> Option<&'a str> {
    let inner = value.strip_prefix(keyword)?.strip_prefix('(')?.strip_suffix(')')?.trim();
    (!inner.is_empty() && !inner.contains(['(', ')', ','])).then_some(inner)
}

// ============================================================================
// SECTION: Type Descriptor
// ============================================================================

/// Sequence type matched by the type assertion.
///
/// # Invariants
/// - Serialized as its textual form, e.g. `xs:string+`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeDescriptor {
    /// `empty-sequence()`
    Empty,
    /// An item test with an occurrence constraint.
    Items {
        /// Per-item test.
        test: ItemTest,
        /// Cardinality constraint.
        occurrence: Occurrence,
    },
}

impl TypeDescriptor {
    /// Parses a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`TypeDescriptorError`] when the text is empty or names an
    /// unknown item type.
    pub fn parse(text: &str) -> Result<Self, TypeDescriptorError> {
        text.parse()
    }

    /// Returns true when the sequence matches this descriptor.
    #[must_use]
    pub fn matches(&self, items: &[ResultItem]) -> bool {
        match self {
            Self::Empty => items.is_empty(),
            Self::Items {
                test,
                occurrence,
            } => occurrence.allows(items.len()) && items.iter().all(|item| test.matches(item)),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty-sequence()"),
            Self::Items {
                test,
                occurrence,
            } => write!(f, "{test}{}", occurrence.indicator()),
        }
    }
}

impl FromStr for TypeDescriptor {
    type Err = TypeDescriptorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let text = value.trim();
        if text.is_empty() {
            return Err(TypeDescriptorError::Empty);
        }
        if text == "empty-sequence()" {
            return Ok(Self::Empty);
        }
        let (body, occurrence) = match text.as_bytes().last() {
            Some(b'?') => (&text[.. text.len() - 1], Occurrence::ZeroOrOne),
            Some(b'*') => (&text[.. text.len() - 1], Occurrence::ZeroOrMore),
            Some(b'+') => (&text[.. text.len() - 1], Occurrence::OneOrMore),
            _ => (text, Occurrence::ExactlyOne),
        };
        Ok(Self::Items {
            test: body.trim().parse()?,
            occurrence,
        })
    }
}

impl TryFrom<String> for TypeDescriptor {
    type Error = TypeDescriptorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeDescriptor> for String {
    fn from(descriptor: TypeDescriptor) -> Self {
        descriptor.to_string()
    }
}

/// Describes the dynamic types of a sequence for diagnostics.
#[must_use]
pub fn describe_types(items: &[ResultItem]) -> String {
    if items.is_empty() {
        return "empty-sequence()".to_string();
    }
    let labels: Vec<&str> = items.iter().map(|item| item.kind().label()).collect();
    format!("({})", labels.join(", "))
}
