//! Resource graph builder — apps, stacks, and the construct tree.
//!
//! A `Stack` owns its nodes in an arena; callers hold `NodeId` handles.
//! All validation happens here so that errors surface where the offending
//! construct is declared, never later at query time.

use super::error::ConstructError;
use super::types::*;
use indexmap::IndexSet;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static STACK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"));
static CONSTRUCT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("valid regex"));
static TYPE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid regex"));

/// Reserved property key; explicit dependencies go through `add_dependency`.
pub const DEPENDS_ON: &str = "depends_on";

/// Application context: owns the set of stack names.
#[derive(Debug, Default)]
pub struct App {
    stacks: IndexSet<String>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, empty stack. Names are unique within the app.
    pub fn create_stack(&mut self, name: &str) -> Result<Stack, ConstructError> {
        check_identifier(&STACK_NAME, "stack name", name)?;
        if !self.stacks.insert(name.to_string()) {
            return Err(ConstructError::DuplicateName(name.to_string()));
        }
        debug!(stack = name, "created stack");
        Ok(Stack::new(name))
    }

    /// Stack names in creation order.
    pub fn stack_names(&self) -> impl Iterator<Item = &str> {
        self.stacks.iter().map(String::as_str)
    }
}

/// Root of one synthesis unit.
#[derive(Debug, Clone)]
pub struct Stack {
    name: String,
    nodes: Vec<ConstructNode>,
    sealed: bool,
}

impl Stack {
    fn new(name: &str) -> Self {
        let root = ConstructNode {
            id: name.to_string(),
            path: name.to_string(),
            kind: NodeKind::Stack,
            type_tag: None,
            logical_id: String::new(),
            properties: Properties::new(),
            depends_on: Vec::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            name: name.to_string(),
            nodes: vec![root],
            sealed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&ConstructNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing has been declared under the root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.sealed {
            Lifecycle::Synthesized
        } else if self.is_empty() {
            Lifecycle::Empty
        } else {
            Lifecycle::Building
        }
    }

    /// Add a grouping scope that emits nothing by itself.
    pub fn add_construct(&mut self, parent: NodeId, id: &str) -> Result<NodeId, ConstructError> {
        self.insert(parent, NodeKind::Construct, None, id, Properties::new())
    }

    /// Declare a managed resource of `type_tag`.
    pub fn add_resource(
        &mut self,
        parent: NodeId,
        type_tag: &str,
        id: &str,
        properties: Properties,
    ) -> Result<NodeId, ConstructError> {
        self.insert(parent, NodeKind::Resource, Some(type_tag), id, properties)
    }

    /// Declare a data source of `type_tag`.
    pub fn add_data_source(
        &mut self,
        parent: NodeId,
        type_tag: &str,
        id: &str,
        properties: Properties,
    ) -> Result<NodeId, ConstructError> {
        self.insert(parent, NodeKind::DataSource, Some(type_tag), id, properties)
    }

    /// Declare a provider configuration of `type_tag`.
    pub fn add_provider(
        &mut self,
        parent: NodeId,
        type_tag: &str,
        id: &str,
        properties: Properties,
    ) -> Result<NodeId, ConstructError> {
        self.insert(parent, NodeKind::Provider, Some(type_tag), id, properties)
    }

    /// Make `node` depend on the addressable node `on`.
    pub fn add_dependency(&mut self, node: NodeId, on: NodeId) -> Result<(), ConstructError> {
        let address = self.address_of(on)?;
        self.add_dependency_address(node, &address)
    }

    /// Make `node` depend on an address (`type.id` or `data.type.id`).
    ///
    /// The address is resolved at synthesis time.
    pub fn add_dependency_address(
        &mut self,
        node: NodeId,
        address: &str,
    ) -> Result<(), ConstructError> {
        self.ensure_open()?;
        let target = self.node_mut(node)?;
        if target.kind.block().is_none() {
            return Err(ConstructError::InvalidProperty {
                path: target.path.clone(),
                key: DEPENDS_ON.to_string(),
                reason: format!("{} nodes cannot declare dependencies", target.kind),
            });
        }
        if !target.depends_on.iter().any(|a| a == address) {
            target.depends_on.push(address.to_string());
        }
        Ok(())
    }

    /// A property value referencing `attribute` of the addressable node `node`.
    pub fn reference(&self, node: NodeId, attribute: &str) -> Result<PropertyValue, ConstructError> {
        let address = self.address_of(node)?;
        Reference::parse(&format!("{}.{}", address, attribute))
            .map(PropertyValue::Reference)
            .map_err(|reason| ConstructError::InvalidProperty {
                path: self.nodes[node.0].path.clone(),
                key: attribute.to_string(),
                reason,
            })
    }

    /// Nodes in pre-order (insertion order within each scope).
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut pending = vec![self.root()];
        while let Some(current) = pending.pop() {
            order.push(current);
            pending.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        order
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    fn insert(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        type_tag: Option<&str>,
        id: &str,
        properties: Properties,
    ) -> Result<NodeId, ConstructError> {
        self.ensure_open()?;
        check_identifier(&CONSTRUCT_ID, "construct id", id)?;
        if let Some(t) = type_tag {
            check_identifier(&TYPE_TAG, "type tag", t)?;
        }

        let scope = self.node(parent).ok_or(ConstructError::UnknownNode(parent.0))?;
        if !scope.kind.is_scope() {
            return Err(ConstructError::InvalidParent(scope.path.clone()));
        }
        if scope
            .children
            .iter()
            .any(|c| self.nodes[c.0].id == id)
        {
            return Err(ConstructError::DuplicateId {
                parent: scope.path.clone(),
                id: id.to_string(),
            });
        }

        let path = format!("{}/{}", scope.path, id);
        validate_properties(&path, &properties)?;

        let logical_id = if scope.kind == NodeKind::Stack {
            id.to_string()
        } else {
            format!("{}_{}", scope.logical_id, id)
        };
        self.check_logical_id(kind, type_tag, &logical_id, &path)?;

        let node_id = NodeId(self.nodes.len());
        debug!(stack = %self.name, node = %path, kind = %kind, "added node");
        self.nodes.push(ConstructNode {
            id: id.to_string(),
            path,
            kind,
            type_tag: type_tag.map(str::to_string),
            logical_id,
            properties,
            depends_on: Vec::new(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(node_id);
        Ok(node_id)
    }

    fn check_logical_id(
        &self,
        kind: NodeKind,
        type_tag: Option<&str>,
        logical_id: &str,
        path: &str,
    ) -> Result<(), ConstructError> {
        let Some(block) = kind.block() else {
            return Ok(());
        };
        let clash = self.nodes.iter().find(|n| {
            n.kind.block() == Some(block)
                && n.type_tag.as_deref() == type_tag
                && n.logical_id == logical_id
        });
        match clash {
            Some(existing) => Err(ConstructError::LogicalIdCollision {
                path: path.to_string(),
                existing: existing.path.clone(),
                address: format!("{}.{}.{}", block, type_tag.unwrap_or_default(), logical_id),
            }),
            None => Ok(()),
        }
    }

    fn address_of(&self, node: NodeId) -> Result<String, ConstructError> {
        let n = self.node(node).ok_or(ConstructError::UnknownNode(node.0))?;
        n.address().ok_or_else(|| ConstructError::InvalidProperty {
            path: n.path.clone(),
            key: DEPENDS_ON.to_string(),
            reason: format!("{} nodes are not addressable", n.kind),
        })
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut ConstructNode, ConstructError> {
        self.nodes
            .get_mut(node.0)
            .ok_or(ConstructError::UnknownNode(node.0))
    }

    fn ensure_open(&self) -> Result<(), ConstructError> {
        if self.sealed {
            return Err(ConstructError::StackSealed(self.name.clone()));
        }
        Ok(())
    }
}

fn check_identifier(pattern: &Regex, what: &'static str, value: &str) -> Result<(), ConstructError> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(ConstructError::InvalidIdentifier {
            what,
            value: value.to_string(),
        })
    }
}

/// Reject values that cannot be synthesized.
fn validate_properties(path: &str, properties: &Properties) -> Result<(), ConstructError> {
    for (key, value) in properties {
        let invalid = |reason: String| ConstructError::InvalidProperty {
            path: path.to_string(),
            key: key.clone(),
            reason,
        };
        if key == DEPENDS_ON {
            return Err(invalid("reserved key; use add_dependency".to_string()));
        }
        if key.is_empty() {
            return Err(invalid("empty key".to_string()));
        }
        validate_value(value).map_err(invalid)?;
    }
    Ok(())
}

fn validate_value(value: &PropertyValue) -> Result<(), String> {
    match value {
        PropertyValue::Float(f) if !f.is_finite() => {
            Err(format!("non-finite number {} has no serialized form", f))
        }
        PropertyValue::List(items) => items.iter().try_for_each(validate_value),
        PropertyValue::Map(map) => map.iter().try_for_each(|(k, v)| {
            if k.is_empty() {
                return Err("empty key in nested mapping".to_string());
            }
            validate_value(v).map_err(|e| format!("{}: {}", k, e))
        }),
        PropertyValue::Reference(r) => {
            if Reference::parse(&r.to_string())? == *r {
                Ok(())
            } else {
                Err(format!(
                    "reference '{}' does not split into address '{}'",
                    r,
                    r.address()
                ))
            }
        }
        _ => Ok(()),
    }
}
