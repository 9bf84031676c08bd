// crates/xqts-assert/src/markup.rs
// ============================================================================
// Module: Markup Trees
// Description: Node model and a small parser for canonical markup text.
// Purpose: Give node items a tree the serializer can project, and turn
//          expected markup literals and fixture documents back into trees.
// Dependencies: serde, thiserror, crate::item
// ============================================================================

//! ## Overview
//! The parser accepts well-formed markup: elements, attributes, namespace
//! declarations, text with the predefined and numeric character references,
//! comments, processing instructions and CDATA sections. A leading XML
//! declaration and a document type declaration are skipped. Attribute and
//! namespace declaration order is preserved exactly as written.
//! Security posture: markup inputs are untrusted; size and nesting are bounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::item::ItemKind;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted markup input in bytes.
pub const MAX_MARKUP_BYTES: usize = 64 * 1024 * 1024;
/// Maximum element nesting depth.
pub const MAX_MARKUP_NESTING: usize = 256;

// ============================================================================
// SECTION: Node Model
// ============================================================================

/// Namespace binding declared on an element.
///
/// # Invariants
/// - An empty `prefix` denotes the default namespace declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamespaceDecl {
    /// Bound prefix, empty for the default namespace.
    pub prefix: String,
    /// Namespace URI; empty undeclares the default namespace.
    pub uri: String,
}

/// Attribute as written on an element or returned as a standalone item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Qualified name.
    pub name: String,
    /// Attribute value after reference expansion.
    pub value: String,
}

/// Element node.
///
/// # Invariants
/// - `namespaces` and `attributes` keep their source order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Element {
    /// Qualified name.
    pub name: String,
    /// Namespace declarations in source order.
    #[serde(default)]
    pub namespaces: Vec<NamespaceDecl>,
    /// Attributes in source order.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    /// Child nodes.
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an element with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Appends an attribute.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Appends a namespace declaration.
    #[must_use]
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.push(NamespaceDecl {
            prefix: prefix.into(),
            uri: uri.into(),
        });
        self
    }

    /// Appends a child node.
    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the local part of the element name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        self.name.rsplit_once(':').map_or(self.name.as_str(), |(_, local)| local)
    }
}

/// Markup node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    /// Document node.
    Document {
        /// Top-level children.
        children: Vec<Node>,
    },
    /// Element node.
    Element(Element),
    /// Standalone attribute node.
    Attribute(Attribute),
    /// Text node.
    Text {
        /// Character data.
        value: String,
    },
    /// Comment node.
    Comment {
        /// Comment content.
        value: String,
    },
    /// Processing instruction.
    ProcessingInstruction {
        /// Target name.
        target: String,
        /// Instruction data.
        data: String,
    },
}

impl Node {
    /// Creates a text node.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    /// Returns the dynamic item kind of this node.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        match self {
            Self::Document {
                ..
            } => ItemKind::Document,
            Self::Element(_) => ItemKind::Element,
            Self::Attribute(_) => ItemKind::Attribute,
            Self::Text {
                ..
            } => ItemKind::Text,
            Self::Comment {
                ..
            } => ItemKind::Comment,
            Self::ProcessingInstruction {
                ..
            } => ItemKind::ProcessingInstruction,
        }
    }

    /// Returns the node name for elements, attributes and processing instructions.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Element(element) => Some(&element.name),
            Self::Attribute(attribute) => Some(&attribute.name),
            Self::ProcessingInstruction {
                target, ..
            } => Some(target),
            _ => None,
        }
    }

    /// Returns the string value: concatenated descendant text for documents
    /// and elements, the content for every other kind.
    #[must_use]
    pub fn string_value(&self) -> String {
        match self {
            Self::Document {
                children,
            } => descendant_text(children),
            Self::Element(element) => descendant_text(&element.children),
            Self::Attribute(attribute) => attribute.value.clone(),
            Self::Text {
                value,
            }
            | Self::Comment {
                value,
            } => value.clone(),
            Self::ProcessingInstruction {
                data, ..
            } => data.clone(),
        }
    }
}

/// Concatenates the text descendants of `nodes` in document order.
fn descendant_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    let mut stack: Vec<&Node> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        match node {
            Node::Text {
                value,
            } => out.push_str(value),
            Node::Element(element) => stack.extend(element.children.iter().rev()),
            Node::Document {
                children,
            } => stack.extend(children.iter().rev()),
            _ => {}
        }
    }
    out
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing markup.
///
/// # Invariants
/// - Positions are byte offsets into the original input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarkupError {
    /// Input exceeded the size limit.
    #[error("markup exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    InputTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length.
        actual_bytes: usize,
    },
    /// Input ended inside a construct.
    #[error("unexpected end of markup, expected {expected}")]
    UnexpectedEof {
        /// What the parser was looking for.
        expected: &'static str,
    },
    /// Unexpected character.
    #[error("unexpected `{found}` at {position}, expected {expected}")]
    UnexpectedChar {
        /// What the parser was looking for.
        expected: &'static str,
        /// Character seen.
        found: char,
        /// Byte offset.
        position: usize,
    },
    /// End tag does not match the open element.
    #[error("mismatched end tag `{found}` at {position}, expected `{expected}`")]
    MismatchedTag {
        /// Name of the open element.
        expected: String,
        /// Name in the end tag.
        found: String,
        /// Byte offset.
        position: usize,
    },
    /// Unknown or malformed character reference.
    #[error("unknown entity `{entity}` at {position}")]
    UnknownEntity {
        /// Reference text without `&` and `;`.
        entity: String,
        /// Byte offset.
        position: usize,
    },
    /// Attribute repeated on one element.
    #[error("duplicate attribute `{name}` at {position}")]
    DuplicateAttribute {
        /// Attribute name.
        name: String,
        /// Byte offset.
        position: usize,
    },
    /// Elements nested beyond the limit.
    #[error("markup nesting exceeds {max_depth} at {position}")]
    TooDeep {
        /// Maximum supported depth.
        max_depth: usize,
        /// Byte offset.
        position: usize,
    },
}

// ============================================================================
// SECTION: Public API
// ============================================================================

/// Parses a markup fragment into its top-level nodes.
///
/// All character data is kept, including whitespace between elements.
///
/// # Errors
///
/// Returns [`MarkupError`] when the input is not well-formed.
pub fn parse_fragment(input: &str) -> Result<Vec<Node>, MarkupError> {
    check_size(input)?;
    let mut parser = MarkupParser::new(input);
    parser.skip_prolog(false);
    parser.parse_content(None)
}

/// Parses a document into a document node.
///
/// Whitespace-only text outside the document element is dropped.
///
/// # Errors
///
/// Returns [`MarkupError`] when the input is not well-formed.
pub fn parse_document(input: &str) -> Result<Node, MarkupError> {
    check_size(input)?;
    let mut parser = MarkupParser::new(input);
    parser.skip_prolog(true);
    let children = parser
        .parse_content(None)?
        .into_iter()
        .filter(|node| !matches!(node, Node::Text { value } if value.trim().is_empty()))
        .collect();
    Ok(Node::Document {
        children,
    })
}

/// Rejects inputs above [`MAX_MARKUP_BYTES`].
const fn check_size(input: &str) -> Result<(), MarkupError> {
    if input.len() > MAX_MARKUP_BYTES {
        return Err(MarkupError::InputTooLarge {
            max_bytes: MAX_MARKUP_BYTES,
            actual_bytes: input.len(),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent markup parser.
struct MarkupParser<'a> {
    /// Source input.
    input: &'a str,
    /// Current byte offset.
    offset: usize,
    /// Current element depth.
    depth: usize,
}

impl<'a> MarkupParser<'a> {
    /// Creates a parser positioned at the start of `input`.
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
            depth: 0,
        }
    }

    /// Remaining unparsed input.
    fn rest(&self) -> &'a str {
        &self.input[self.offset ..]
    }

    /// Returns true when the remaining input starts with `prefix`.
    fn at(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    /// Next character, if any.
    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Skips whitespace.
    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches(is_markup_space);
        self.offset += rest.len() - trimmed.len();
    }

    /// Consumes `expected` or reports what was found instead.
    fn expect(&mut self, expected: &'static str) -> Result<(), MarkupError> {
        if self.at(expected) {
            self.offset += expected.len();
            return Ok(());
        }
        Err(self.unexpected(expected))
    }

    /// Builds an error for the current position.
    fn unexpected(&self, expected: &'static str) -> MarkupError {
        self.peek().map_or(
            MarkupError::UnexpectedEof {
                expected,
            },
            |found| MarkupError::UnexpectedChar {
                expected,
                found,
                position: self.offset,
            },
        )
    }

    /// Consumes input up to `terminator`, returning the text before it.
    fn take_until(
        &mut self,
        terminator: &str,
        expected: &'static str,
    ) -> Result<&'a str, MarkupError> {
        let rest = self.rest();
        let end = rest.find(terminator).ok_or(MarkupError::UnexpectedEof {
            expected,
        })?;
        self.offset += end + terminator.len();
        Ok(&rest[.. end])
    }

    /// Skips a byte-order mark, XML declaration and document type declaration.
    fn skip_prolog(&mut self, allow_doctype: bool) {
        if self.at("\u{feff}") {
            self.offset += '\u{feff}'.len_utf8();
        }
        if self.at("<?xml")
            && self.rest()[5 ..].starts_with(is_markup_space)
            && let Some(end) = self.rest().find("?>")
        {
            self.offset += end + 2;
        }
        if allow_doctype {
            self.skip_whitespace();
            if self.at("<!DOCTYPE") {
                self.skip_doctype();
            }
        }
    }

    /// Skips a document type declaration including any internal subset.
    fn skip_doctype(&mut self) {
        let mut brackets = 0usize;
        for (index, ch) in self.rest().char_indices() {
            match ch {
                '[' => brackets += 1,
                ']' => brackets = brackets.saturating_sub(1),
                '>' if brackets == 0 => {
                    self.offset += index + 1;
                    return;
                }
                _ => {}
            }
        }
        self.offset = self.input.len();
    }

    /// Parses content until end of input or the end tag of `open`.
    fn parse_content(&mut self, open: Option<&str>) -> Result<Vec<Node>, MarkupError> {
        let mut nodes = Vec::new();
        loop {
            if self.offset >= self.input.len() {
                return match open {
                    Some(_) => Err(MarkupError::UnexpectedEof {
                        expected: "end tag",
                    }),
                    None => Ok(nodes),
                };
            }
            if self.at("</") {
                let Some(name) = open else {
                    return Err(self.unexpected("content"));
                };
                self.parse_end_tag(name)?;
                return Ok(nodes);
            }
            if self.at("<!--") {
                self.offset += 4;
                let value = self.take_until("-->", "comment end")?;
                nodes.push(Node::Comment {
                    value: value.to_string(),
                });
            } else if self.at("<![CDATA[") {
                self.offset += 9;
                let value = self.take_until("]]>", "CDATA end")?;
                push_text(&mut nodes, value);
            } else if self.at("<?") {
                nodes.push(self.parse_processing_instruction()?);
            } else if self.at("<") {
                nodes.push(Node::Element(self.parse_element()?));
            } else {
                let start = self.offset;
                let rest = self.rest();
                let end = rest.find('<').unwrap_or(rest.len());
                self.offset += end;
                let raw = normalize_line_endings(&rest[.. end]);
                let value = unescape(&raw, start)?;
                push_text(&mut nodes, &value);
            }
        }
    }

    /// Parses `</name>` and checks it closes `open`.
    fn parse_end_tag(&mut self, open: &str) -> Result<(), MarkupError> {
        let position = self.offset;
        self.expect("</")?;
        let name = self.parse_name()?;
        self.skip_whitespace();
        self.expect(">")?;
        if name != open {
            return Err(MarkupError::MismatchedTag {
                expected: open.to_string(),
                found: name.to_string(),
                position,
            });
        }
        Ok(())
    }

    /// Parses `<?target data?>`.
    fn parse_processing_instruction(&mut self) -> Result<Node, MarkupError> {
        self.expect("<?")?;
        let target = self.parse_name()?.to_string();
        self.skip_whitespace();
        let data = self.take_until("?>", "processing instruction end")?;
        Ok(Node::ProcessingInstruction {
            target,
            data: data.to_string(),
        })
    }

    /// Parses an element with its attributes and content.
    fn parse_element(&mut self) -> Result<Element, MarkupError> {
        let position = self.offset;
        if self.depth >= MAX_MARKUP_NESTING {
            return Err(MarkupError::TooDeep {
                max_depth: MAX_MARKUP_NESTING,
                position,
            });
        }
        self.expect("<")?;
        let name = self.parse_name()?;
        let mut element = Element::new(name);
        loop {
            let had_space = self.rest().starts_with(is_markup_space);
            self.skip_whitespace();
            if self.at("/>") {
                self.offset += 2;
                return Ok(element);
            }
            if self.at(">") {
                self.offset += 1;
                break;
            }
            if !had_space {
                return Err(self.unexpected("whitespace, `>` or `/>`"));
            }
            self.parse_attribute(&mut element)?;
        }
        self.depth += 1;
        let children = self.parse_content(Some(name));
        self.depth -= 1;
        element.children = children?;
        Ok(element)
    }

    /// Parses one `name="value"` pair onto `element`.
    fn parse_attribute(&mut self, element: &mut Element) -> Result<(), MarkupError> {
        let position = self.offset;
        let name = self.parse_name()?;
        self.skip_whitespace();
        self.expect("=")?;
        self.skip_whitespace();
        let quote = match self.peek() {
            Some(ch @ ('"' | '\'')) => ch,
            _ => return Err(self.unexpected("quoted attribute value")),
        };
        self.offset += 1;
        let value_start = self.offset;
        let raw = self.take_until(if quote == '"' { "\"" } else { "'" }, "attribute value end")?;
        if let Some(index) = raw.find('<') {
            return Err(MarkupError::UnexpectedChar {
                expected: "attribute value",
                found: '<',
                position: value_start + index,
            });
        }
        let normalized: String = normalize_line_endings(raw)
            .chars()
            .map(|ch| if matches!(ch, '\t' | '\n' | '\r') { ' ' } else { ch })
            .collect();
        let value = unescape(&normalized, value_start)?;

        let duplicate = element.attributes.iter().any(|attr| attr.name == name)
            || element.namespaces.iter().any(|decl| namespace_attribute_name(decl) == name);
        if duplicate {
            return Err(MarkupError::DuplicateAttribute {
                name: name.to_string(),
                position,
            });
        }
        if name == "xmlns" {
            element.namespaces.push(NamespaceDecl {
                prefix: String::new(),
                uri: value,
            });
        } else if let Some(prefix) = name.strip_prefix("xmlns:") {
            element.namespaces.push(NamespaceDecl {
                prefix: prefix.to_string(),
                uri: value,
            });
        } else {
            element.attributes.push(Attribute {
                name: name.to_string(),
                value,
            });
        }
        Ok(())
    }

    /// Parses a (possibly prefixed) name.
    fn parse_name(&mut self) -> Result<&'a str, MarkupError> {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, ch)| !is_name_char(*ch))
            .map_or(rest.len(), |(index, _)| index);
        if end == 0 {
            return Err(self.unexpected("name"));
        }
        self.offset += end;
        Ok(&rest[.. end])
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Whitespace as defined by the markup grammar.
pub(crate) const fn is_markup_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

/// Characters permitted in names.
fn is_name_char(ch: char) -> bool {
    !(is_markup_space(ch)
        || matches!(ch, '<' | '>' | '/' | '=' | '"' | '\'' | '?' | '!' | '&' | ';'))
}

/// Attribute spelling of a namespace declaration.
fn namespace_attribute_name(decl: &NamespaceDecl) -> String {
    if decl.prefix.is_empty() { "xmlns".to_string() } else { format!("xmlns:{}", decl.prefix) }
}

/// Appends text, merging with a preceding text node.
fn push_text(nodes: &mut Vec<Node>, value: &str) {
    if value.is_empty() {
        return;
    }
    if let Some(Node::Text {
        value: existing,
    }) = nodes.last_mut()
    {
        existing.push_str(value);
        return;
    }
    nodes.push(Node::text(value));
}

/// Converts `\r\n` and lone `\r` to `\n`.
fn normalize_line_endings(raw: &str) -> String {
    if raw.contains('\r') { raw.replace("\r\n", "\n").replace('\r', "\n") } else { raw.to_string() }
}

/// Expands predefined and numeric character references.
fn unescape(raw: &str, base: usize) -> Result<String, MarkupError> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[.. amp]);
        let position = base + (raw.len() - rest.len()) + amp;
        let after = &rest[amp + 1 ..];
        let Some(semi) = after.find(';') else {
            return Err(MarkupError::UnknownEntity {
                entity: after.chars().take(16).collect(),
                position,
            });
        };
        let entity = &after[.. semi];
        out.push(resolve_entity(entity).ok_or_else(|| MarkupError::UnknownEntity {
            entity: entity.to_string(),
            position,
        })?);
        rest = &after[semi + 1 ..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Resolves one reference body (`lt`, `#60`, `#x3C`).
fn resolve_entity(entity: &str) -> Option<char> {
    match entity {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) =
                entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
