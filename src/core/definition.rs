//! App definition files — YAML parsing, validation, and stack building.
//!
//! Validates structural constraints before anything is built:
//! - Version must be "1.0"
//! - Name must not be empty, at least one stack
//! - Resources, data sources and providers need a type
//! - Only constructs may have children; constructs carry no type or properties

use super::builder::{App, Stack};
use super::error::{ConstructError, Error};
use super::types::{NodeId, Properties, PropertyValue, Reference};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value as YamlValue;
use std::path::{Path, PathBuf};
use tracing::debug;

/// YAML tag marking a reference, e.g. `!ref docker_image.app.name`.
pub const REF_TAG: &str = "ref";

/// Root of an app definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDefinition {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable app name
    pub name: String,

    /// Output directory for synthesized documents
    #[serde(default = "default_outdir")]
    pub outdir: PathBuf,

    /// Stacks, in synthesis order
    #[serde(default)]
    pub stacks: Vec<StackDefinition>,
}

fn default_outdir() -> PathBuf {
    PathBuf::from("cdktf.out")
}

/// One stack and its top-level constructs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackDefinition {
    pub name: String,

    #[serde(default)]
    pub constructs: Vec<ConstructDefinition>,
}

/// What a construct entry declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Construct,
    #[default]
    Resource,
    Data,
    Provider,
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Construct => write!(f, "construct"),
            Self::Resource => write!(f, "resource"),
            Self::Data => write!(f, "data"),
            Self::Provider => write!(f, "provider"),
        }
    }
}

/// A single construct entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructDefinition {
    #[serde(default)]
    pub kind: DefinitionKind,

    /// Type tag (resources, data sources, providers)
    #[serde(rename = "type", default)]
    pub type_tag: Option<String>,

    pub id: String,

    #[serde(default)]
    pub properties: IndexMap<String, YamlValue>,

    /// Addresses this entry depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Nested entries (constructs only)
    #[serde(default)]
    pub children: Vec<ConstructDefinition>,
}

/// Validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Parse an app definition file from disk.
pub fn parse_definition_file(path: &Path) -> Result<AppDefinition, Error> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_definition(&content)
}

/// Parse an app definition from a string.
pub fn parse_definition(yaml: &str) -> Result<AppDefinition, Error> {
    serde_yaml_ng::from_str(yaml).map_err(|e| Error::Definition(format!("YAML parse error: {}", e)))
}

/// Validate a parsed definition. Returns a list of errors (empty = valid).
pub fn validate_definition(def: &AppDefinition) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if def.version != "1.0" {
        errors.push(ValidationError {
            message: format!("version must be \"1.0\", got \"{}\"", def.version),
        });
    }
    if def.name.is_empty() {
        errors.push(ValidationError {
            message: "name must not be empty".to_string(),
        });
    }
    if def.stacks.is_empty() {
        errors.push(ValidationError {
            message: "at least one stack is required".to_string(),
        });
    }

    for stack in &def.stacks {
        for entry in &stack.constructs {
            validate_entry(&stack.name, entry, &mut errors);
        }
    }

    errors
}

fn validate_entry(scope: &str, entry: &ConstructDefinition, errors: &mut Vec<ValidationError>) {
    let path = format!("{}/{}", scope, entry.id);
    let mut fail = |message: String| errors.push(ValidationError { message });

    match entry.kind {
        DefinitionKind::Construct => {
            if entry.type_tag.is_some() {
                fail(format!("construct '{}' must not have a type", path));
            }
            if !entry.properties.is_empty() {
                fail(format!("construct '{}' must not have properties", path));
            }
            if !entry.depends_on.is_empty() {
                fail(format!("construct '{}' must not have depends_on", path));
            }
        }
        kind => {
            if entry.type_tag.is_none() {
                fail(format!("{} '{}' has no type", kind, path));
            }
            if !entry.children.is_empty() {
                fail(format!("{} '{}' cannot have children", kind, path));
            }
            if kind == DefinitionKind::Provider && !entry.depends_on.is_empty() {
                fail(format!("provider '{}' must not have depends_on", path));
            }
        }
    }

    for child in &entry.children {
        validate_entry(&path, child, errors);
    }
}

/// Build every stack of a definition. Stack names are checked for
/// uniqueness through the returned `App`.
pub fn build_stacks(def: &AppDefinition) -> Result<(App, Vec<Stack>), Error> {
    let mut app = App::new();
    let mut stacks = Vec::with_capacity(def.stacks.len());
    for stack_def in &def.stacks {
        let mut stack = app.create_stack(&stack_def.name)?;
        let root = stack.root();
        for entry in &stack_def.constructs {
            build_entry(&mut stack, root, entry)?;
        }
        debug!(stack = %stack_def.name, nodes = stack.len(), "built stack from definition");
        stacks.push(stack);
    }
    Ok((app, stacks))
}

fn build_entry(stack: &mut Stack, parent: NodeId, entry: &ConstructDefinition) -> Result<(), Error> {
    let type_tag = entry.type_tag.as_deref().unwrap_or_default();
    let properties = convert_properties(stack, parent, entry)?;

    let node = match entry.kind {
        DefinitionKind::Construct => {
            if let Some(key) = entry.properties.keys().next() {
                let scope = stack.node(parent).map(|n| n.path()).unwrap_or(stack.name());
                return Err(ConstructError::InvalidProperty {
                    path: format!("{}/{}", scope, entry.id),
                    key: key.clone(),
                    reason: "constructs carry no properties".to_string(),
                }
                .into());
            }
            stack.add_construct(parent, &entry.id)?
        }
        DefinitionKind::Resource => stack.add_resource(parent, type_tag, &entry.id, properties)?,
        DefinitionKind::Data => stack.add_data_source(parent, type_tag, &entry.id, properties)?,
        DefinitionKind::Provider => stack.add_provider(parent, type_tag, &entry.id, properties)?,
    };
    for address in &entry.depends_on {
        stack.add_dependency_address(node, address)?;
    }
    for child in &entry.children {
        build_entry(stack, node, child)?;
    }
    Ok(())
}

fn convert_properties(
    stack: &Stack,
    parent: NodeId,
    entry: &ConstructDefinition,
) -> Result<Properties, ConstructError> {
    let scope = stack.node(parent).map(|n| n.path()).unwrap_or(stack.name());
    entry
        .properties
        .iter()
        .map(|(key, value)| {
            yaml_to_property(value)
                .map(|v| (key.clone(), v))
                .map_err(|reason| ConstructError::InvalidProperty {
                    path: format!("{}/{}", scope, entry.id),
                    key: key.clone(),
                    reason,
                })
        })
        .collect()
}

/// Convert a YAML value into a property value.
///
/// `!ref` tags become references; any other tag, non-string mapping key, or
/// non-finite float is rejected.
pub fn yaml_to_property(value: &YamlValue) -> Result<PropertyValue, String> {
    match value {
        YamlValue::Null => Ok(PropertyValue::Null),
        YamlValue::Bool(b) => Ok(PropertyValue::Bool(*b)),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(PropertyValue::Int(i))
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => Ok(PropertyValue::Float(f)),
                    _ => Err(format!("unsupported number {}", n)),
                }
            }
        }
        YamlValue::String(s) => Ok(PropertyValue::String(s.clone())),
        YamlValue::Sequence(items) => items
            .iter()
            .map(yaml_to_property)
            .collect::<Result<Vec<_>, _>>()
            .map(PropertyValue::List),
        YamlValue::Mapping(map) => {
            let mut out = Properties::new();
            for (k, v) in map {
                let key = k
                    .as_str()
                    .ok_or_else(|| format!("mapping key {:?} is not a string", k))?;
                out.insert(key.to_string(), yaml_to_property(v)?);
            }
            Ok(PropertyValue::Map(out))
        }
        YamlValue::Tagged(tagged) => {
            if tagged.tag != REF_TAG {
                return Err(format!("unsupported tag {}", tagged.tag));
            }
            let expr = tagged
                .value
                .as_str()
                .ok_or_else(|| "!ref expects a string".to_string())?;
            Reference::parse(expr).map(PropertyValue::Reference)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::query::{has_resource_of_type, has_resource_with_properties, Predicate};
    use crate::core::synth::synthesize;

    const DOCKER_APP: &str = r#"
version: "1.0"
name: docker-app
stacks:
  - name: stack
    constructs:
      - kind: provider
        type: docker
        id: docker
        properties:
          host: unix:///var/run/docker.sock
      - kind: construct
        id: resource
        children:
          - type: docker_image
            id: image
            properties:
              name: ubuntu:latest
              keep_locally: true
          - type: docker_container
            id: container
            properties:
              image: !ref docker_image.resource_image.image_id
              ports:
                - internal: 80
                  external: 8000
            depends_on: [docker_image.resource_image]
"#;

    #[test]
    fn test_definition_parse_valid() {
        let def = parse_definition(DOCKER_APP).unwrap();
        assert_eq!(def.name, "docker-app");
        assert_eq!(def.outdir, PathBuf::from("cdktf.out"));
        assert_eq!(def.stacks.len(), 1);
        assert_eq!(def.stacks[0].constructs[1].kind, DefinitionKind::Construct);
        assert_eq!(def.stacks[0].constructs[1].children[0].kind, DefinitionKind::Resource);
        let errors = validate_definition(&def);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors.iter().map(|e| &e.message).collect::<Vec<_>>());
    }

    #[test]
    fn test_definition_build_and_synthesize() {
        let def = parse_definition(DOCKER_APP).unwrap();
        let (app, mut stacks) = build_stacks(&def).unwrap();
        assert_eq!(app.stack_names().collect::<Vec<_>>(), vec!["stack"]);
        let doc = synthesize(&mut stacks[0]).unwrap();
        assert!(has_resource_of_type(&doc, "docker_container"));
        assert!(has_resource_with_properties(
            &doc,
            "docker_image",
            &Predicate::new().with("name", "ubuntu:latest")
        ));
        let container = doc.resource("docker_container", "resource_container").unwrap();
        assert_eq!(container["image"], "${docker_image.resource_image.image_id}");
        assert_eq!(container["depends_on"][0], "docker_image.resource_image");
    }

    #[test]
    fn test_definition_bad_version_and_name() {
        let def = parse_definition(
            r#"
version: "2.0"
name: ""
stacks: []
"#,
        )
        .unwrap();
        let errors = validate_definition(&def);
        assert!(errors.iter().any(|e| e.message.contains("version")));
        assert!(errors.iter().any(|e| e.message.contains("name")));
        assert!(errors.iter().any(|e| e.message.contains("at least one stack")));
    }

    #[test]
    fn test_definition_structural_errors() {
        let def = parse_definition(
            r#"
version: "1.0"
name: bad
stacks:
  - name: stack
    constructs:
      - id: untyped
      - kind: construct
        id: scope
        type: docker_image
        properties: { name: x }
      - type: docker_image
        id: leaf
        children:
          - type: docker_volume
            id: nested
"#,
        )
        .unwrap();
        let errors = validate_definition(&def);
        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("'stack/untyped' has no type")));
        assert!(messages.iter().any(|m| m.contains("must not have a type")));
        assert!(messages.iter().any(|m| m.contains("must not have properties")));
        assert!(messages.iter().any(|m| m.contains("'stack/leaf' cannot have children")));
    }

    #[test]
    fn test_definition_duplicate_stack_name() {
        let def = parse_definition(
            r#"
version: "1.0"
name: dup
stacks:
  - name: stack
  - name: stack
"#,
        )
        .unwrap();
        let err = build_stacks(&def).unwrap_err();
        assert!(matches!(err, Error::Construct(ConstructError::DuplicateName(ref n)) if n == "stack"));
    }

    #[test]
    fn test_definition_duplicate_id() {
        let def = parse_definition(
            r#"
version: "1.0"
name: dup
stacks:
  - name: stack
    constructs:
      - { type: docker_image, id: img }
      - { type: docker_volume, id: img }
"#,
        )
        .unwrap();
        assert!(matches!(
            build_stacks(&def),
            Err(Error::Construct(ConstructError::DuplicateId { .. }))
        ));
    }

    #[test]
    fn test_definition_yaml_conversion() {
        let v: YamlValue = serde_yaml_ng::from_str("{a: 1, b: [true, 2.5, ~], c: {d: text}}").unwrap();
        let p = yaml_to_property(&v).unwrap();
        assert_eq!(
            p.to_json(),
            serde_json::json!({"a": 1, "b": [true, 2.5, null], "c": {"d": "text"}})
        );
    }

    #[test]
    fn test_definition_yaml_rejects_unsupported() {
        let non_string_key: YamlValue = serde_yaml_ng::from_str("{1: one}").unwrap();
        assert!(yaml_to_property(&non_string_key).is_err());
        let nan: YamlValue = serde_yaml_ng::from_str(".nan").unwrap();
        assert!(yaml_to_property(&nan).is_err());
        let other_tag: YamlValue = serde_yaml_ng::from_str("!secret hunter2").unwrap();
        assert!(yaml_to_property(&other_tag).is_err());
        let bad_ref: YamlValue = serde_yaml_ng::from_str("!ref docker_image").unwrap();
        assert!(yaml_to_property(&bad_ref).is_err());
    }

    #[test]
    fn test_definition_invalid_property_reported_with_path() {
        let def = parse_definition(
            r#"
version: "1.0"
name: bad-prop
stacks:
  - name: stack
    constructs:
      - type: docker_container
        id: web
        properties:
          labels: { 7: seven }
"#,
        )
        .unwrap();
        match build_stacks(&def).unwrap_err() {
            Error::Construct(ConstructError::InvalidProperty { path, key, .. }) => {
                assert_eq!(path, "stack/web");
                assert_eq!(key, "labels");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_definition_construct_properties_rejected_at_build() {
        let def = parse_definition(
            r#"
version: "1.0"
name: bad-construct
stacks:
  - name: stack
    constructs:
      - kind: construct
        id: app
        properties:
          name: web
"#,
        )
        .unwrap();
        match build_stacks(&def).unwrap_err() {
            Error::Construct(ConstructError::InvalidProperty { path, key, .. }) => {
                assert_eq!(path, "stack/app");
                assert_eq!(key, "name");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_definition_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("synth.yaml");
        std::fs::write(&path, DOCKER_APP).unwrap();
        let def = parse_definition_file(&path).unwrap();
        assert_eq!(def.name, "docker-app");
        assert!(parse_definition_file(&dir.path().join("missing.yaml")).is_err());
    }

    #[test]
    fn test_definition_parse_invalid_yaml() {
        assert!(parse_definition("not: [valid: yaml: {{").is_err());
    }
}
