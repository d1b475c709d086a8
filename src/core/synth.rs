//! Synthesis — walk a stack and emit its document.
//!
//! Traversal is pre-order in insertion order. Nothing is sorted: the same
//! unmodified stack always yields the same document.

use super::builder::{Stack, DEPENDS_ON};
use super::document::{Attributes, BlockEntries, Document};
use super::error::SynthesisError;
use super::resolver;
use super::types::{Block, ConstructNode};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, info};

/// Synthesize `stack`. The stack is sealed as soon as synthesis begins,
/// whether or not it succeeds.
pub fn synthesize(stack: &mut Stack) -> Result<Document, SynthesisError> {
    stack.seal();
    resolver::build_reference_order(stack)?;

    let mut providers: IndexMap<String, Vec<Attributes>> = IndexMap::new();
    let mut data = BlockEntries::new();
    let mut resources = BlockEntries::new();

    for id in stack.walk() {
        let Some(node) = stack.node(id) else {
            continue;
        };
        let (Some(block), Some(type_tag)) = (node.kind().block(), node.type_tag()) else {
            continue;
        };
        let attrs = render_attributes(node);
        debug!(stack = stack.name(), node = node.path(), block = %block, "synthesized node");
        match block {
            Block::Provider => providers.entry(type_tag.to_string()).or_default().push(attrs),
            Block::Data => insert_entry(&mut data, type_tag, node, attrs),
            Block::Resource => insert_entry(&mut resources, type_tag, node, attrs),
        }
    }

    let doc = Document::new(stack.name(), providers, data, resources);
    info!(
        stack = stack.name(),
        resources = doc.resource_count(),
        "synthesized stack"
    );
    Ok(doc)
}

fn insert_entry(entries: &mut BlockEntries, type_tag: &str, node: &ConstructNode, attrs: Attributes) {
    entries
        .entry(type_tag.to_string())
        .or_default()
        .insert(node.logical_id().to_string(), attrs);
}

fn render_attributes(node: &ConstructNode) -> Attributes {
    let mut attrs: Attributes = node
        .properties()
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    if !node.depends_on().is_empty() {
        let deps = node.depends_on().iter().cloned().map(Value::String).collect();
        attrs.insert(DEPENDS_ON.to_string(), Value::Array(deps));
    }
    attrs
}
