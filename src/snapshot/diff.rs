//! Snapshot diff — compare a fresh synthesis against a stored document.

use crate::core::document::{Attributes, BlockEntries, Document};
use crate::core::types::Block;
use crate::snapshot::hasher;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;

/// How an entry differs between the stored and the fresh document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Added,
    Removed,
    Changed,
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "ADDED"),
            Self::Removed => write!(f, "REMOVED"),
            Self::Changed => write!(f, "CHANGED"),
        }
    }
}

/// A single diff finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffFinding {
    pub block: Block,
    pub type_tag: String,
    /// Logical id, or the list index for providers.
    pub name: String,
    pub kind: DiffKind,
    pub expected_hash: Option<String>,
    pub actual_hash: Option<String>,
}

impl DiffFinding {
    /// `resource.docker_image.ubuntu` style label.
    pub fn address(&self) -> String {
        format!("{}.{}.{}", self.block, self.type_tag, self.name)
    }
}

/// Compare `expected` (stored) with `actual` (fresh). Findings follow the
/// order of `expected`, then entries only present in `actual`.
pub fn diff_documents(expected: &Document, actual: &Document) -> Vec<DiffFinding> {
    let mut findings = Vec::new();
    diff_entries(Block::Provider, &providers_as_entries(expected), &providers_as_entries(actual), &mut findings);
    diff_entries(Block::Data, expected.data_sources(), actual.data_sources(), &mut findings);
    diff_entries(Block::Resource, expected.resources(), actual.resources(), &mut findings);
    findings
}

fn providers_as_entries(doc: &Document) -> BlockEntries {
    doc.providers()
        .iter()
        .map(|(type_tag, configs)| {
            let indexed = configs
                .iter()
                .enumerate()
                .map(|(i, c)| (i.to_string(), c.clone()))
                .collect();
            (type_tag.clone(), indexed)
        })
        .collect()
}

fn diff_entries(
    block: Block,
    expected: &BlockEntries,
    actual: &BlockEntries,
    findings: &mut Vec<DiffFinding>,
) {
    let empty = IndexMap::new();
    let finding = |type_tag: &str, name: &str, kind, expected: Option<&Attributes>, actual: Option<&Attributes>| DiffFinding {
        block,
        type_tag: type_tag.to_string(),
        name: name.to_string(),
        kind,
        expected_hash: expected.map(attributes_hash),
        actual_hash: actual.map(attributes_hash),
    };

    for (type_tag, instances) in expected {
        let fresh = actual.get(type_tag).unwrap_or(&empty);
        for (name, attrs) in instances {
            match fresh.get(name) {
                None => findings.push(finding(type_tag, name, DiffKind::Removed, Some(attrs), None)),
                Some(now) if now != attrs => {
                    findings.push(finding(type_tag, name, DiffKind::Changed, Some(attrs), Some(now)))
                }
                Some(_) => {}
            }
        }
    }

    for (type_tag, instances) in actual {
        let stored = expected.get(type_tag).unwrap_or(&empty);
        for (name, attrs) in instances {
            if !stored.contains_key(name) {
                findings.push(finding(type_tag, name, DiffKind::Added, None, Some(attrs)));
            }
        }
    }
}

fn attributes_hash(attrs: &Attributes) -> String {
    hasher::hash_value(&Value::Object(attrs.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::App;
    use crate::core::synth::synthesize;
    use crate::core::types::{props, Properties};

    fn synth_with(image: &str, extra_volume: bool) -> Document {
        let mut app = App::new();
        let mut stack = app.create_stack("stack").unwrap();
        let root = stack.root();
        stack
            .add_provider(root, "docker", "docker", props([("host", "unix:///var/run/docker.sock".into())]))
            .unwrap();
        stack
            .add_resource(root, "docker_image", "img", props([("name", image.into())]))
            .unwrap();
        if extra_volume {
            stack.add_resource(root, "docker_volume", "data", Properties::new()).unwrap();
        }
        synthesize(&mut stack).unwrap()
    }

    #[test]
    fn test_diff_identical() {
        let a = synth_with("ubuntu:latest", false);
        let b = synth_with("ubuntu:latest", false);
        assert!(diff_documents(&a, &b).is_empty());
    }

    #[test]
    fn test_diff_changed() {
        let stored = synth_with("ubuntu:latest", false);
        let fresh = synth_with("debian:latest", false);
        let findings = diff_documents(&stored, &fresh);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.kind, DiffKind::Changed);
        assert_eq!(f.address(), "resource.docker_image.img");
        assert_ne!(f.expected_hash, f.actual_hash);
    }

    #[test]
    fn test_diff_added_and_removed() {
        let without = synth_with("ubuntu:latest", false);
        let with = synth_with("ubuntu:latest", true);

        let added = diff_documents(&without, &with);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].kind, DiffKind::Added);
        assert!(added[0].expected_hash.is_none());

        let removed = diff_documents(&with, &without);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].kind, DiffKind::Removed);
        assert_eq!(removed[0].address(), "resource.docker_volume.data");
    }

    #[test]
    fn test_diff_kind_display() {
        assert_eq!(DiffKind::Added.to_string(), "ADDED");
        assert_eq!(DiffKind::Changed.to_string(), "CHANGED");
    }
}
