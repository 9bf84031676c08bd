// crates/xqts-assert/src/serializer.rs
// ============================================================================
// Module: Canonical Serializer
// Description: Deterministic markup projection of a result sequence.
// Purpose: Provide the text compared by serialization assertions.
// Dependencies: thiserror, crate::{item, markup}
// ============================================================================

//! ## Overview
//! Serialization walks items in evaluation order. Elements write their
//! namespace declarations first and then their attributes in source order;
//! empty elements use the self-closing form. Character data gets the minimal
//! escaping the markup grammar requires and no whitespace is added.
//! Adjacent atomic values are separated by one space.
//!
//! With namespace normalization each top-level element declares every
//! prefix that is bound to a single URI anywhere in its subtree, so the
//! position of a prefixed declaration in the source does not matter. Default
//! namespace declarations and prefixes bound to several URIs stay where they
//! were written.
//!
//! For any canonical string `s`, `canonicalize(s)` returns `s` unchanged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

use crate::item::ItemKind;
use crate::item::ResultItem;
use crate::markup::Element;
use crate::markup::MarkupError;
use crate::markup::NamespaceDecl;
use crate::markup::Node;
use crate::markup::is_markup_space;
use crate::markup::parse_fragment;

/// Serialization error raised for items without a markup projection.
pub const NO_PROJECTION_CODE: &str = "SENR0001";

// ============================================================================
// SECTION: Options and Errors
// ============================================================================

/// Serialization options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Drop redundant namespace declarations and sort the rest by prefix.
    pub normalize_namespaces: bool,
}

impl SerializeOptions {
    /// Options with namespace normalization switched on or off.
    #[must_use]
    pub const fn with_normalized_namespaces(normalize_namespaces: bool) -> Self {
        Self {
            normalize_namespaces,
        }
    }
}

/// Errors raised while serializing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    /// An item has no markup projection.
    #[error("item of type {kind} has no markup projection")]
    NoProjection {
        /// Kind of the offending item.
        kind: ItemKind,
    },
    /// Markup text could not be parsed.
    #[error("markup error: {0}")]
    Markup(#[from] MarkupError),
}

impl SerializeError {
    /// Returns the serialization error code, when one applies.
    #[must_use]
    pub const fn code(&self) -> Option<&'static str> {
        match self {
            Self::NoProjection {
                ..
            } => Some(NO_PROJECTION_CODE),
            Self::Markup(_) => None,
        }
    }
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Serializes a result sequence.
///
/// # Errors
///
/// Returns [`SerializeError::NoProjection`] for attribute, namespace, map,
/// array and function items, and for node items that carry no tree.
pub fn serialize_items(
    items: &[ResultItem],
    options: SerializeOptions,
) -> Result<String, SerializeError> {
    let mut out = String::new();
    let mut previous_atomic = false;
    for item in items {
        match item.kind() {
            ItemKind::Atomic(_) => {
                if previous_atomic {
                    out.push(' ');
                }
                escape_text(item.value(), &mut out);
                previous_atomic = true;
                continue;
            }
            ItemKind::Attribute
            | ItemKind::Namespace
            | ItemKind::Map
            | ItemKind::Array
            | ItemKind::Function => {
                return Err(SerializeError::NoProjection {
                    kind: item.kind(),
                });
            }
            kind => match item.markup() {
                Some(node) => write_top(node, options, &mut out)?,
                None if kind == ItemKind::Text => escape_text(item.value(), &mut out),
                None => {
                    return Err(SerializeError::NoProjection {
                        kind,
                    });
                }
            },
        }
        previous_atomic = false;
    }
    Ok(out)
}

/// Serializes a single node.
///
/// # Errors
///
/// Returns [`SerializeError::NoProjection`] for a standalone attribute node.
pub fn serialize_node(node: &Node, options: SerializeOptions) -> Result<String, SerializeError> {
    let mut out = String::new();
    write_top(node, options, &mut out)?;
    Ok(out)
}

/// Parses markup text and serializes it back into canonical form.
///
/// # Errors
///
/// Returns [`SerializeError::Markup`] when the text is not well-formed.
pub fn canonicalize(markup: &str, options: SerializeOptions) -> Result<String, SerializeError> {
    let nodes = parse_fragment(markup)?;
    let mut out = String::new();
    for node in &nodes {
        write_top(node, options, &mut out)?;
    }
    Ok(out)
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// In-scope namespace bindings, prefix to URI.
#[derive(Debug, Default, Clone)]
struct Scope {
    /// Current bindings.
    bindings: BTreeMap<String, String>,
}

/// Writes a top-level node, hoisting prefixed declarations when normalizing.
fn write_top(node: &Node, options: SerializeOptions, out: &mut String) -> Result<(), SerializeError> {
    match node {
        Node::Document {
            children,
        } => children.iter().try_for_each(|child| write_top(child, options, out)),
        Node::Element(element) if options.normalize_namespaces => {
            let hoisted = hoistable_declarations(element);
            write_element(element, options, &mut Scope::default(), &hoisted, out)
        }
        other => write_node(other, options, &mut Scope::default(), out),
    }
}

/// Writes one node and its descendants.
fn write_node(
    node: &Node,
    options: SerializeOptions,
    scope: &mut Scope,
    out: &mut String,
) -> Result<(), SerializeError> {
    match node {
        Node::Document {
            children,
        } => {
            for child in children {
                write_node(child, options, scope, out)?;
            }
        }
        Node::Element(element) => write_element(element, options, scope, &[], out)?,
        Node::Attribute(_) => {
            return Err(SerializeError::NoProjection {
                kind: ItemKind::Attribute,
            });
        }
        Node::Text {
            value,
        } => escape_text(value, out),
        Node::Comment {
            value,
        } => {
            out.push_str("<!--");
            out.push_str(value);
            out.push_str("-->");
        }
        Node::ProcessingInstruction {
            target,
            data,
        } => {
            out.push_str("<?");
            out.push_str(target);
            let data = data.trim_start_matches(is_markup_space);
            if !data.is_empty() {
                out.push(' ');
                out.push_str(data);
            }
            out.push_str("?>");
        }
    }
    Ok(())
}

/// Writes an element, restoring the namespace scope afterwards.
///
/// `hoisted` declarations are written on this element ahead of its own.
fn write_element(
    element: &Element,
    options: SerializeOptions,
    scope: &mut Scope,
    hoisted: &[NamespaceDecl],
    out: &mut String,
) -> Result<(), SerializeError> {
    let saved = scope.bindings.clone();
    for decl in hoisted {
        scope.bindings.insert(decl.prefix.clone(), decl.uri.clone());
    }
    let declarations = if options.normalize_namespaces {
        let mut declarations = normalized_declarations(&element.namespaces, scope);
        declarations.extend(hoisted);
        declarations.sort_by(|left, right| left.prefix.cmp(&right.prefix));
        declarations
    } else {
        element.namespaces.iter().collect()
    };
    for decl in &element.namespaces {
        scope.bindings.insert(decl.prefix.clone(), decl.uri.clone());
    }

    out.push('<');
    out.push_str(&element.name);
    for decl in declarations {
        out.push_str(" xmlns");
        if !decl.prefix.is_empty() {
            out.push(':');
            out.push_str(&decl.prefix);
        }
        out.push_str("=\"");
        escape_attribute(&decl.uri, out);
        out.push('"');
    }
    for attribute in &element.attributes {
        out.push(' ');
        out.push_str(&attribute.name);
        out.push_str("=\"");
        escape_attribute(&attribute.value, out);
        out.push('"');
    }

    let result = if element.children.is_empty() {
        out.push_str("/>");
        Ok(())
    } else {
        out.push('>');
        let written = element
            .children
            .iter()
            .try_for_each(|child| write_node(child, options, scope, out));
        out.push_str("</");
        out.push_str(&element.name);
        out.push('>');
        written
    };
    scope.bindings = saved;
    result
}

/// Declarations that change the scope, sorted by prefix.
fn normalized_declarations<'a>(
    namespaces: &'a [NamespaceDecl],
    scope: &Scope,
) -> Vec<&'a NamespaceDecl> {
    let mut kept: BTreeMap<&str, &NamespaceDecl> = BTreeMap::new();
    for decl in namespaces {
        let in_scope = scope.bindings.get(&decl.prefix).map(String::as_str);
        let redundant = match in_scope {
            Some(uri) => uri == decl.uri,
            None => decl.prefix.is_empty() && decl.uri.is_empty(),
        };
        if !redundant {
            kept.insert(decl.prefix.as_str(), decl);
        }
    }
    kept.into_values().collect()
}

/// Prefixed bindings that map to one URI throughout the subtree of `root`.
fn hoistable_declarations(root: &Element) -> Vec<NamespaceDecl> {
    let mut bindings: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    collect_bindings(root, &mut bindings);
    bindings
        .into_iter()
        .filter_map(|(prefix, uri)| {
            uri.map(|uri| NamespaceDecl {
                prefix: prefix.to_string(),
                uri: uri.to_string(),
            })
        })
        .collect()
}

/// Records prefixed bindings of `element` and its descendants; `None` marks
/// a prefix bound to more than one URI.
fn collect_bindings<'a>(element: &'a Element, bindings: &mut BTreeMap<&'a str, Option<&'a str>>) {
    for decl in element.namespaces.iter().filter(|decl| !decl.prefix.is_empty()) {
        let uri = decl.uri.as_str();
        let known = bindings.entry(decl.prefix.as_str()).or_insert(Some(uri));
        if *known != Some(uri) {
            *known = None;
        }
    }
    for child in &element.children {
        if let Node::Element(child) = child {
            collect_bindings(child, bindings);
        }
    }
}

// ============================================================================
// SECTION: Escaping
// ============================================================================

/// Escapes character data.
fn escape_text(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}

/// Escapes an attribute value for double-quoted output.
fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#xA;"),
            '\t' => out.push_str("&#x9;"),
            '\r' => out.push_str("&#xD;"),
            other => out.push(other),
        }
    }
}
