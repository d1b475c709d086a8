//! Construct tree types: nodes, property values, references.
//!
//! Properties are a typed, recursively defined value (scalar | list | mapping)
//! so that validation happens once at construction time. Mappings preserve
//! insertion order, which is what makes synthesis reproducible.

use indexmap::IndexMap;
use std::fmt;

/// Property mapping of a single node (order-preserving).
pub type Properties = IndexMap<String, PropertyValue>;

/// Build a property mapping from `(key, value)` pairs.
pub fn props<const N: usize>(entries: [(&str, PropertyValue); N]) -> Properties {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

// ============================================================================
// Property values
// ============================================================================

/// A property value: scalar, list, nested mapping, or a reference to another
/// node's attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Map(Properties),
    Reference(Reference),
}

impl PropertyValue {
    /// Render as JSON. References become Terraform interpolations.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Self::Reference(r) => Value::String(r.to_interpolation()),
        }
    }

    /// Visit every reference contained in this value, depth-first.
    pub fn for_each_reference<'a>(&'a self, f: &mut impl FnMut(&'a Reference)) {
        match self {
            Self::Reference(r) => f(r),
            Self::List(items) => {
                for v in items {
                    v.for_each_reference(&mut *f);
                }
            }
            Self::Map(map) => {
                for v in map.values() {
                    v.for_each_reference(&mut *f);
                }
            }
            _ => {}
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<Reference> for PropertyValue {
    fn from(r: Reference) -> Self {
        Self::Reference(r)
    }
}

impl From<Properties> for PropertyValue {
    fn from(map: Properties) -> Self {
        Self::Map(map)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// References
// ============================================================================

/// Reference to an attribute of an addressable node, e.g.
/// `docker_image.ubuntu.name` or `data.docker_registry_image.app.sha256_digest`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    address: String,
    attribute: String,
}

impl Reference {
    pub fn new(address: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            attribute: attribute.into(),
        }
    }

    /// Parse a dotted reference expression.
    pub fn parse(expr: &str) -> Result<Self, String> {
        let parts: Vec<&str> = expr.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(format!("reference '{}' has an empty segment", expr));
        }
        let address_len = if parts.first() == Some(&"data") { 3 } else { 2 };
        if parts.len() <= address_len {
            return Err(format!(
                "reference '{}' must name an attribute after the address",
                expr
            ));
        }
        Ok(Self {
            address: parts[..address_len].join("."),
            attribute: parts[address_len..].join("."),
        })
    }

    /// Address of the referenced node (`type.id` or `data.type.id`).
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Terraform interpolation form: `${address.attribute}`.
    pub fn to_interpolation(&self) -> String {
        format!("${{{}.{}}}", self.address, self.attribute)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.address, self.attribute)
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// Handle to a node inside one stack's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Top-level document block a node is emitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Block {
    Resource,
    Data,
    Provider,
}

impl Block {
    /// JSON key of the block.
    pub fn key(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::Data => "data",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Stack,
    Construct,
    Resource,
    DataSource,
    Provider,
}

impl NodeKind {
    /// Scopes may hold children; everything else is a leaf.
    pub fn is_scope(self) -> bool {
        matches!(self, Self::Stack | Self::Construct)
    }

    pub fn block(self) -> Option<Block> {
        match self {
            Self::Resource => Some(Block::Resource),
            Self::DataSource => Some(Block::Data),
            Self::Provider => Some(Block::Provider),
            Self::Stack | Self::Construct => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stack => write!(f, "stack"),
            Self::Construct => write!(f, "construct"),
            Self::Resource => write!(f, "resource"),
            Self::DataSource => write!(f, "data"),
            Self::Provider => write!(f, "provider"),
        }
    }
}

/// One declared unit in a stack.
#[derive(Debug, Clone)]
pub struct ConstructNode {
    pub(crate) id: String,
    pub(crate) path: String,
    pub(crate) kind: NodeKind,
    pub(crate) type_tag: Option<String>,
    pub(crate) logical_id: String,
    pub(crate) properties: Properties,
    pub(crate) depends_on: Vec<String>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl ConstructNode {
    /// Id, unique within the parent scope.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Slash-separated path from the stack root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn type_tag(&self) -> Option<&str> {
        self.type_tag.as_deref()
    }

    /// Instance key used in the synthesized document.
    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Addresses this node explicitly depends on.
    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Referenceable address, for resources and data sources only.
    pub fn address(&self) -> Option<String> {
        let type_tag = self.type_tag.as_deref()?;
        match self.kind {
            NodeKind::Resource => Some(format!("{}.{}", type_tag, self.logical_id)),
            NodeKind::DataSource => Some(format!("data.{}.{}", type_tag, self.logical_id)),
            _ => None,
        }
    }
}

/// Stack lifecycle. There is no way back from `Synthesized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Empty,
    Building,
    Synthesized,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "EMPTY"),
            Self::Building => write!(f, "BUILDING"),
            Self::Synthesized => write!(f, "SYNTHESIZED"),
        }
    }
}
