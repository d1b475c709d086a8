//! Synthesized document — an immutable snapshot of one stack.
//!
//! Layout follows Terraform JSON: blocks keyed by type tag, then by logical
//! id. Providers are lists of configurations per provider type.
//!
//! ```json
//! {
//!   "//": { "metadata": { "stackName": "stack", "version": "synthtest 0.1.0" } },
//!   "provider": { "docker": [ { "host": "unix:///var/run/docker.sock" } ] },
//!   "resource": { "docker_image": { "resource-image": { "name": "ubuntu:latest" } } }
//! }
//! ```

use super::error::MalformedDocumentError;
use crate::snapshot::hasher;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Property mapping of one synthesized entry.
pub type Attributes = Map<String, Value>;

/// Entries of one block: type tag → logical id → attributes.
pub type BlockEntries = IndexMap<String, IndexMap<String, Attributes>>;

const METADATA_KEY: &str = "//";

/// Top-level Terraform blocks carried through untouched when parsing.
const PASSTHROUGH_BLOCKS: &[&str] = &["terraform", "output", "variable", "locals", "module"];

/// Immutable synthesized document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    stack: String,
    generator: String,
    providers: IndexMap<String, Vec<Attributes>>,
    data: BlockEntries,
    resources: BlockEntries,
}

impl Document {
    pub(crate) fn new(
        stack: &str,
        providers: IndexMap<String, Vec<Attributes>>,
        data: BlockEntries,
        resources: BlockEntries,
    ) -> Self {
        Self {
            stack: stack.to_string(),
            generator: format!("synthtest {}", env!("CARGO_PKG_VERSION")),
            providers,
            data,
            resources,
        }
    }

    /// Name of the stack this document was synthesized from.
    pub fn stack_name(&self) -> &str {
        &self.stack
    }

    pub fn resources(&self) -> &BlockEntries {
        &self.resources
    }

    pub fn data_sources(&self) -> &BlockEntries {
        &self.data
    }

    pub fn providers(&self) -> &IndexMap<String, Vec<Attributes>> {
        &self.providers
    }

    /// Total number of resource instances across all types.
    pub fn resource_count(&self) -> usize {
        self.resources.values().map(IndexMap::len).sum()
    }

    /// Attributes of a single resource instance.
    pub fn resource(&self, type_tag: &str, logical_id: &str) -> Option<&Attributes> {
        self.resources.get(type_tag)?.get(logical_id)
    }

    /// Render as a JSON value. `resource` is always present, other blocks
    /// only when non-empty.
    pub fn to_json_value(&self) -> Value {
        let mut root = Map::new();
        root.insert(
            METADATA_KEY.to_string(),
            serde_json::json!({
                "metadata": {
                    "stackName": self.stack,
                    "version": self.generator,
                }
            }),
        );
        if !self.providers.is_empty() {
            let providers = self
                .providers
                .iter()
                .map(|(t, configs)| {
                    let list = configs.iter().cloned().map(Value::Object).collect();
                    (t.clone(), Value::Array(list))
                })
                .collect();
            root.insert("provider".to_string(), Value::Object(providers));
        }
        if !self.data.is_empty() {
            root.insert("data".to_string(), entries_to_json(&self.data));
        }
        root.insert("resource".to_string(), entries_to_json(&self.resources));
        Value::Object(root)
    }

    /// Pretty-printed JSON text, as written to `cdk.tf.json`.
    pub fn to_json_pretty(&self) -> String {
        // Serializing a Value with string keys cannot fail.
        serde_json::to_string_pretty(&self.to_json_value()).unwrap_or_default()
    }

    /// Parse serialized text back into a document.
    pub fn from_json(text: &str) -> Result<Self, MalformedDocumentError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| MalformedDocumentError::new(format!("invalid JSON: {}", e)))?;
        Self::from_json_value(&value)
    }

    /// Validate the shape of a JSON value and convert it into a document.
    pub fn from_json_value(value: &Value) -> Result<Self, MalformedDocumentError> {
        let root = value
            .as_object()
            .ok_or_else(|| MalformedDocumentError::new("top level must be an object"))?;

        let mut stack = String::new();
        let mut generator = String::new();
        let mut providers = IndexMap::new();
        let mut data = BlockEntries::new();
        let mut resources = BlockEntries::new();

        for (key, block) in root {
            match key.as_str() {
                METADATA_KEY => {
                    let metadata = block.get("metadata").and_then(Value::as_object);
                    let field = |name: &str| {
                        metadata
                            .and_then(|m| m.get(name))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    };
                    stack = field("stackName").ok_or_else(|| {
                        MalformedDocumentError::new("metadata is missing 'stackName'")
                    })?;
                    generator = field("version").unwrap_or_default();
                }
                "provider" => providers = parse_providers(block)?,
                "data" => data = parse_entries("data", block)?,
                "resource" => resources = parse_entries("resource", block)?,
                other if PASSTHROUGH_BLOCKS.contains(&other) => {}
                other => {
                    return Err(MalformedDocumentError::new(format!(
                        "unexpected top-level block '{}'",
                        other
                    )))
                }
            }
        }

        Ok(Self {
            stack,
            generator,
            providers,
            data,
            resources,
        })
    }

    /// BLAKE3 fingerprint of the rendered document.
    pub fn fingerprint(&self) -> String {
        hasher::hash_value(&self.to_json_value())
    }
}

fn entries_to_json(entries: &BlockEntries) -> Value {
    Value::Object(
        entries
            .iter()
            .map(|(type_tag, instances)| {
                let instances = instances
                    .iter()
                    .map(|(id, attrs)| (id.clone(), Value::Object(attrs.clone())))
                    .collect();
                (type_tag.clone(), Value::Object(instances))
            })
            .collect(),
    )
}

fn parse_entries(block_name: &str, block: &Value) -> Result<BlockEntries, MalformedDocumentError> {
    let types = block.as_object().ok_or_else(|| {
        MalformedDocumentError::new(format!("'{}' must be an object", block_name))
    })?;
    let mut entries = BlockEntries::new();
    for (type_tag, instances) in types {
        let instances = instances.as_object().ok_or_else(|| {
            MalformedDocumentError::new(format!("'{}.{}' must be an object", block_name, type_tag))
        })?;
        let mut parsed = IndexMap::new();
        for (id, attrs) in instances {
            let attrs = attrs.as_object().ok_or_else(|| {
                MalformedDocumentError::new(format!(
                    "'{}.{}.{}' must be an object",
                    block_name, type_tag, id
                ))
            })?;
            parsed.insert(id.clone(), attrs.clone());
        }
        entries.insert(type_tag.clone(), parsed);
    }
    Ok(entries)
}

fn parse_providers(
    block: &Value,
) -> Result<IndexMap<String, Vec<Attributes>>, MalformedDocumentError> {
    let types = block
        .as_object()
        .ok_or_else(|| MalformedDocumentError::new("'provider' must be an object"))?;
    let mut providers = IndexMap::new();
    for (type_tag, configs) in types {
        // A single provider may be written as an object instead of a list.
        let configs: Vec<&Value> = match configs {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![configs],
            _ => {
                return Err(MalformedDocumentError::new(format!(
                    "'provider.{}' must be a list or an object",
                    type_tag
                )))
            }
        };
        let mut parsed = Vec::with_capacity(configs.len());
        for config in configs {
            let config = config.as_object().ok_or_else(|| {
                MalformedDocumentError::new(format!(
                    "'provider.{}' entries must be objects",
                    type_tag
                ))
            })?;
            parsed.push(config.clone());
        }
        providers.insert(type_tag.clone(), parsed);
    }
    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Document {
        let mut resources = BlockEntries::new();
        resources.insert(
            "docker_image".to_string(),
            IndexMap::from([(
                "resource-image".to_string(),
                json!({"name": "ubuntu:latest"}).as_object().unwrap().clone(),
            )]),
        );
        let providers = IndexMap::from([(
            "docker".to_string(),
            vec![json!({"host": "unix:///var/run/docker.sock"})
                .as_object()
                .unwrap()
                .clone()],
        )]);
        Document::new("stack", providers, BlockEntries::new(), resources)
    }

    #[test]
    fn test_document_render() {
        let doc = sample();
        let value = doc.to_json_value();
        assert_eq!(value["//"]["metadata"]["stackName"], "stack");
        assert_eq!(value["resource"]["docker_image"]["resource-image"]["name"], "ubuntu:latest");
        assert_eq!(value["provider"]["docker"][0]["host"], "unix:///var/run/docker.sock");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn test_document_empty_has_resource_block() {
        let doc = Document::new("empty", IndexMap::new(), BlockEntries::new(), BlockEntries::new());
        assert_eq!(doc.to_json_value()["resource"], json!({}));
        assert_eq!(doc.resource_count(), 0);
    }

    #[test]
    fn test_document_parse_rendered() {
        let doc = sample();
        let parsed = Document::from_json(&doc.to_json_pretty()).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(parsed.fingerprint(), doc.fingerprint());
    }

    #[test]
    fn test_document_lookup() {
        let doc = sample();
        assert_eq!(doc.resource_count(), 1);
        assert_eq!(
            doc.resource("docker_image", "resource-image").unwrap()["name"],
            "ubuntu:latest"
        );
        assert!(doc.resource("docker_image", "missing").is_none());
    }

    #[test]
    fn test_document_parse_single_provider_object() {
        let text = r#"{"provider": {"docker": {"host": "tcp://h:2375"}}, "resource": {}}"#;
        let doc = Document::from_json(text).unwrap();
        assert_eq!(doc.providers()["docker"].len(), 1);
        assert_eq!(doc.stack_name(), "");
    }

    #[test]
    fn test_document_parse_passthrough_blocks() {
        let text = r#"{"terraform": {"required_providers": {}}, "output": {}, "resource": {}}"#;
        assert!(Document::from_json(text).is_ok());
    }

    #[test]
    fn test_document_malformed() {
        let cases = [
            "not json",
            "[]",
            r#"{"resource": []}"#,
            r#"{"resource": {"docker_image": "ubuntu"}}"#,
            r#"{"resource": {"docker_image": {"img": 1}}}"#,
            r#"{"data": {"docker_image": {"img": null}}}"#,
            r#"{"provider": {"docker": "x"}}"#,
            r#"{"provider": {"docker": [1]}}"#,
            r#"{"resources": {}}"#,
            r#"{"//": {"metadata": {}}}"#,
        ];
        for text in cases {
            assert!(Document::from_json(text).is_err(), "accepted: {}", text);
        }
    }
}
