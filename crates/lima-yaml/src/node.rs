//! Comment-annotated YAML document tree.

use crate::scalar::{ResolvedScalar, needs_quotes, resolve_plain};

/// Comments attached to a node.
///
/// Each comment keeps its leading `#`. A head comment may span several
/// lines, joined with `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    /// Full-line comments directly above the node.
    pub head: Option<String>,
    /// Trailing comment on the node's line.
    pub line: Option<String>,
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.head.is_none() && self.line.is_none()
    }

    /// Fill each empty slot from `fallback`.
    pub fn or(self, fallback: Comments) -> Comments {
        Comments {
            head: self.head.or(fallback.head),
            line: self.line.or(fallback.line),
        }
    }
}

/// Presentation style of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

/// Presentation style of a sequence or mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionStyle {
    #[default]
    Block,
    Flow,
}

/// A scalar value together with the style it was written in.
///
/// `value` is the scalar's content after unquoting; a plain scalar keeps its
/// source text so that `1.10` stays `1.10`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    pub value: String,
    pub style: ScalarStyle,
}

impl Scalar {
    /// A string scalar whose style is chosen so the value reads back as the
    /// same string.
    pub fn string(value: impl Into<String>) -> Self {
        let value = value.into();
        let style = if value.contains('\n') {
            ScalarStyle::Literal
        } else if needs_quotes(&value, false) {
            ScalarStyle::DoubleQuoted
        } else {
            ScalarStyle::Plain
        };
        Scalar { value, style }
    }

    /// A plain scalar, written exactly as given.
    pub fn plain(value: impl Into<String>) -> Self {
        Scalar {
            value: value.into(),
            style: ScalarStyle::Plain,
        }
    }

    /// Resolve the scalar under the YAML 1.2 core schema.
    ///
    /// Only plain scalars are subject to resolution; every quoted or block
    /// scalar is a string.
    pub fn resolve(&self) -> ResolvedScalar<'_> {
        match self.style {
            ScalarStyle::Plain => resolve_plain(&self.value),
            _ => ResolvedScalar::Str(&self.value),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.resolve(), ResolvedScalar::Null)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    pub items: Vec<Node>,
    pub style: CollectionStyle,
}

impl Sequence {
    pub fn new(items: Vec<Node>, style: CollectionStyle) -> Self {
        Sequence { items, style }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.items.iter()
    }
}

/// A key-value pair in a mapping. Keys are always scalars.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub key: String,
    /// The value node; its comments annotate the whole entry.
    pub value: Node,
}

/// An ordered mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    pub entries: Vec<MappingEntry>,
    pub style: CollectionStyle,
}

impl Mapping {
    pub fn new(style: CollectionStyle) -> Self {
        Mapping {
            entries: Vec::new(),
            style,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|entry| entry.key == key)
            .map(|entry| &mut entry.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Replace the value of an existing key in place, or append a new entry.
    ///
    /// Returns the previous value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        let key = key.into();
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].value, value)),
            None => {
                self.entries.push(MappingEntry { key, value });
                None
            }
        }
    }

    /// Insert an entry at `index`, shifting later entries down.
    pub fn insert_at(&mut self, index: usize, key: impl Into<String>, value: Node) {
        let index = index.min(self.entries.len());
        self.entries.insert(
            index,
            MappingEntry {
                key: key.into(),
                value,
            },
        );
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.position(key)?;
        Some(self.entries.remove(index).value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries
            .iter()
            .map(|entry| (entry.key.as_str(), &entry.value))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Scalar(Scalar),
    Sequence(Sequence),
    Mapping(Mapping),
}

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub comments: Comments,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            comments: Comments::default(),
        }
    }

    pub fn scalar(scalar: Scalar) -> Self {
        Node::new(NodeKind::Scalar(scalar))
    }

    /// A string node, quoted as needed.
    pub fn string(value: impl Into<String>) -> Self {
        Node::scalar(Scalar::string(value))
    }

    /// An empty plain scalar, which reads back as null.
    pub fn null() -> Self {
        Node::scalar(Scalar::plain(""))
    }

    pub fn mapping(mapping: Mapping) -> Self {
        Node::new(NodeKind::Mapping(mapping))
    }

    pub fn sequence(sequence: Sequence) -> Self {
        Node::new(NodeKind::Sequence(sequence))
    }

    pub fn with_comments(mut self, comments: Comments) -> Self {
        self.comments = comments;
        self
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, NodeKind::Scalar(_))
    }

    pub fn is_null(&self) -> bool {
        match &self.kind {
            NodeKind::Scalar(scalar) => scalar.is_null(),
            _ => false,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    /// The scalar's text, unless the node is null or a collection.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar(scalar) if !scalar.is_null() => Some(&scalar.value),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match &self.kind {
            NodeKind::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match &mut self.kind {
            NodeKind::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match &self.kind {
            NodeKind::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match &mut self.kind {
            NodeKind::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    /// Compare two nodes by value, ignoring comments and presentation.
    pub fn value_eq(&self, other: &Node) -> bool {
        match (&self.kind, &other.kind) {
            (NodeKind::Scalar(a), NodeKind::Scalar(b)) => a.resolve() == b.resolve(),
            (NodeKind::Sequence(a), NodeKind::Sequence(b)) => {
                a.items.len() == b.items.len()
                    && a.items.iter().zip(&b.items).all(|(x, y)| x.value_eq(y))
            }
            (NodeKind::Mapping(a), NodeKind::Mapping(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).is_some_and(|other| value.value_eq(other)))
            }
            _ => false,
        }
    }
}

/// A parsed template document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Comments at the top of the document, separated from the first node by
    /// a blank line.
    pub head_comment: Option<String>,
    pub root: Node,
    /// Comments after the last node.
    pub foot_comment: Option<String>,
}

impl Default for Document {
    fn default() -> Self {
        Document {
            head_comment: None,
            root: Node::mapping(Mapping::default()),
            foot_comment: None,
        }
    }
}

impl Document {
    /// Parse a single YAML document, keeping its comments.
    ///
    /// An empty or comment-only input yields an empty root mapping.
    pub fn parse(source: &str) -> crate::Result<Document> {
        crate::parser::parse_document(source)
    }

    /// Parse a document whose root must be a mapping.
    pub fn parse_mapping(source: &str) -> crate::Result<Document> {
        let doc = Document::parse(source)?;
        if doc.root.as_mapping().is_none() {
            return Err(crate::Error::NotAMapping);
        }
        Ok(doc)
    }

    pub fn root_mapping(&self) -> Option<&Mapping> {
        self.root.as_mapping()
    }

    pub fn root_mapping_mut(&mut self) -> Option<&mut Mapping> {
        self.root.as_mapping_mut()
    }

    /// Render the document as YAML text.
    pub fn to_yaml_string(&self) -> String {
        crate::emitter::emit_document(self)
    }
}
