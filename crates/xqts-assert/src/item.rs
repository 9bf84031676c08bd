// crates/xqts-assert/src/item.rs
// ============================================================================
// Module: Result Items
// Description: Typed items captured from a successful query evaluation.
// Purpose: Carry each item's dynamic type tag and canonical string projection.
// Dependencies: serde, crate::markup
// ============================================================================

//! ## Overview
//! A successful evaluation yields an ordered sequence of [`ResultItem`]s. Each
//! item carries its dynamic type ([`ItemKind`]) and a stable string projection
//! used by the equality and string-value assertions. Node items may also carry
//! their markup tree so they can be serialized.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::markup::Node;

// ============================================================================
// SECTION: Atomic Types
// ============================================================================

/// Built-in atomic types recognized by type assertions.
///
/// # Invariants
/// - Names are the `xs:` prefixed schema type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AtomicType {
    /// `xs:untypedAtomic`
    UntypedAtomic,
    /// `xs:string`
    String,
    /// `xs:anyURI`
    AnyUri,
    /// `xs:QName`
    QName,
    /// `xs:boolean`
    Boolean,
    /// `xs:decimal`
    Decimal,
    /// `xs:integer`
    Integer,
    /// `xs:double`
    Double,
    /// `xs:float`
    Float,
    /// `xs:date`
    Date,
    /// `xs:time`
    Time,
    /// `xs:dateTime`
    DateTime,
    /// `xs:duration`
    Duration,
    /// `xs:dayTimeDuration`
    DayTimeDuration,
    /// `xs:yearMonthDuration`
    YearMonthDuration,
    /// `xs:base64Binary`
    Base64Binary,
    /// `xs:hexBinary`
    HexBinary,
}

impl AtomicType {
    /// Every atomic type, in declaration order.
    pub const ALL: [Self; 17] = [
        Self::UntypedAtomic,
        Self::String,
        Self::AnyUri,
        Self::QName,
        Self::Boolean,
        Self::Decimal,
        Self::Integer,
        Self::Double,
        Self::Float,
        Self::Date,
        Self::Time,
        Self::DateTime,
        Self::Duration,
        Self::DayTimeDuration,
        Self::YearMonthDuration,
        Self::Base64Binary,
        Self::HexBinary,
    ];

    /// Returns the prefixed type name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::UntypedAtomic => "xs:untypedAtomic",
            Self::String => "xs:string",
            Self::AnyUri => "xs:anyURI",
            Self::QName => "xs:QName",
            Self::Boolean => "xs:boolean",
            Self::Decimal => "xs:decimal",
            Self::Integer => "xs:integer",
            Self::Double => "xs:double",
            Self::Float => "xs:float",
            Self::Date => "xs:date",
            Self::Time => "xs:time",
            Self::DateTime => "xs:dateTime",
            Self::Duration => "xs:duration",
            Self::DayTimeDuration => "xs:dayTimeDuration",
            Self::YearMonthDuration => "xs:yearMonthDuration",
            Self::Base64Binary => "xs:base64Binary",
            Self::HexBinary => "xs:hexBinary",
        }
    }

    /// Returns true when `self` is `other` or derives from it.
    #[must_use]
    pub const fn is_subtype_of(self, other: Self) -> bool {
        if self as u8 == other as u8 {
            return true;
        }
        matches!(
            (self, other),
            (Self::Integer, Self::Decimal)
                | (Self::DayTimeDuration | Self::YearMonthDuration, Self::Duration)
        )
    }

    /// Returns true for the numeric types.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Decimal | Self::Integer | Self::Double | Self::Float)
    }

    /// Returns true for types whose effective boolean value is string-based.
    #[must_use]
    pub const fn is_string_like(self) -> bool {
        matches!(self, Self::String | Self::AnyUri | Self::UntypedAtomic)
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AtomicType {
    type Err = ItemKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name() == value)
            .ok_or_else(|| ItemKindError::Unknown(value.to_string()))
    }
}

// ============================================================================
// SECTION: Item Kinds
// ============================================================================

/// Errors raised when parsing an item kind label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemKindError {
    /// The label does not name a known item kind.
    #[error("unknown item type: {0}")]
    Unknown(String),
}

/// Dynamic type tag of a result item.
///
/// # Invariants
/// - Serialized as its sequence-type label (`xs:integer`, `element()`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ItemKind {
    /// An atomic value of the given type.
    Atomic(AtomicType),
    /// A document node.
    Document,
    /// An element node.
    Element,
    /// An attribute node.
    Attribute,
    /// A text node.
    Text,
    /// A comment node.
    Comment,
    /// A processing-instruction node.
    ProcessingInstruction,
    /// A namespace node.
    Namespace,
    /// A map.
    Map,
    /// An array.
    Array,
    /// A function item.
    Function,
}

impl ItemKind {
    /// Returns true for node kinds.
    #[must_use]
    pub const fn is_node(self) -> bool {
        matches!(
            self,
            Self::Document
                | Self::Element
                | Self::Attribute
                | Self::Text
                | Self::Comment
                | Self::ProcessingInstruction
                | Self::Namespace
        )
    }

    /// Returns the sequence-type label of this kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Atomic(ty) => ty.name(),
            Self::Document => "document-node()",
            Self::Element => "element()",
            Self::Attribute => "attribute()",
            Self::Text => "text()",
            Self::Comment => "comment()",
            Self::ProcessingInstruction => "processing-instruction()",
            Self::Namespace => "namespace-node()",
            Self::Map => "map(*)",
            Self::Array => "array(*)",
            Self::Function => "function(*)",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ItemKind {
    type Err = ItemKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let kind = match value.trim() {
            "document-node()" => Self::Document,
            "element()" => Self::Element,
            "attribute()" => Self::Attribute,
            "text()" => Self::Text,
            "comment()" => Self::Comment,
            "processing-instruction()" => Self::ProcessingInstruction,
            "namespace-node()" => Self::Namespace,
            "map(*)" => Self::Map,
            "array(*)" => Self::Array,
            "function(*)" => Self::Function,
            other => Self::Atomic(other.parse()?),
        };
        Ok(kind)
    }
}

impl TryFrom<String> for ItemKind {
    type Error = ItemKindError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ItemKind> for String {
    fn from(kind: ItemKind) -> Self {
        kind.label().to_string()
    }
}

// ============================================================================
// SECTION: Result Item
// ============================================================================

/// One member of a successful result sequence.
///
/// # Invariants
/// - `value` is the canonical string projection of the item.
/// - `node`, when present, agrees with `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    /// Dynamic type of the item.
    kind: ItemKind,
    /// Canonical string projection.
    value: String,
    /// Markup tree for node items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    node: Option<Node>,
}

impl ResultItem {
    /// Creates an item from a kind and its string projection.
    pub fn new(kind: ItemKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            node: None,
        }
    }

    /// Creates an atomic item.
    pub fn atomic(ty: AtomicType, value: impl Into<String>) -> Self {
        Self::new(ItemKind::Atomic(ty), value)
    }

    /// Creates an `xs:boolean` item.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::atomic(AtomicType::Boolean, if value { "true" } else { "false" })
    }

    /// Creates an `xs:integer` item.
    #[must_use]
    pub fn integer(value: i64) -> Self {
        Self::atomic(AtomicType::Integer, value.to_string())
    }

    /// Creates an `xs:string` item.
    pub fn string(value: impl Into<String>) -> Self {
        Self::atomic(AtomicType::String, value)
    }

    /// Creates a node item whose projection is the node's string value.
    #[must_use]
    pub fn node(node: Node) -> Self {
        Self {
            kind: node.kind(),
            value: node.string_value(),
            node: Some(node),
        }
    }

    /// Returns the dynamic type of the item.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        self.kind
    }

    /// Returns the canonical string projection.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns the markup tree for node items.
    #[must_use]
    pub const fn markup(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    /// Returns true when the item is a node.
    #[must_use]
    pub const fn is_node(&self) -> bool {
        self.kind.is_node()
    }

    /// Returns the boolean value of an `xs:boolean` item.
    #[must_use]
    pub fn as_boolean(&self) -> Option<bool> {
        match self.kind {
            ItemKind::Atomic(AtomicType::Boolean) => parse_boolean(&self.value),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Effective Boolean Value
// ============================================================================

/// Computes the effective boolean value of a sequence.
///
/// Returns `None` when the sequence has no effective boolean value (for
/// example two atomic values, or a map).
#[must_use]
pub fn effective_boolean_value(items: &[ResultItem]) -> Option<bool> {
    let Some(first) = items.first() else {
        return Some(false);
    };
    if first.is_node() {
        return Some(true);
    }
    if items.len() > 1 {
        return None;
    }
    match first.kind {
        ItemKind::Atomic(AtomicType::Boolean) => parse_boolean(&first.value),
        ItemKind::Atomic(ty) if ty.is_string_like() => Some(!first.value.is_empty()),
        ItemKind::Atomic(ty) if ty.is_numeric() => numeric_truth(&first.value),
        _ => None,
    }
}

/// Parses a canonical or lexical boolean.
fn parse_boolean(value: &str) -> Option<bool> {
    match value.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Truth value of a numeric literal: false for zero and NaN.
fn numeric_truth(value: &str) -> Option<bool> {
    let parsed: f64 = value.trim().parse().ok()?;
    Some(parsed != 0.0 && !parsed.is_nan())
}
