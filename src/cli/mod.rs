//! CLI subcommands — init, validate, synth, assert, diff.

use crate::core::{definition, document::Document, output, query, synth};
use crate::snapshot::diff;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new synthtest project
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate an app definition without synthesizing
    Validate {
        /// Path to the app definition
        #[arg(short, long, default_value = "synth.yaml")]
        file: PathBuf,
    },

    /// Synthesize stacks into the output directory
    Synth {
        /// Path to the app definition
        #[arg(short, long, default_value = "synth.yaml")]
        file: PathBuf,

        /// Output directory (overrides the definition's outdir)
        #[arg(short, long)]
        outdir: Option<PathBuf>,

        /// Synthesize only this stack
        #[arg(short, long)]
        stack: Option<String>,
    },

    /// Assert that a synthesized document contains a matching entry
    Assert {
        /// Path to a synthesized cdk.tf.json
        #[arg(short, long)]
        document: PathBuf,

        /// Type tag to look for (e.g. docker_image)
        #[arg(short = 't', long = "type")]
        type_tag: String,

        /// Look in data sources instead of resources
        #[arg(long, conflicts_with = "provider")]
        data: bool,

        /// Look in providers instead of resources
        #[arg(long)]
        provider: bool,

        /// Expected property, KEY=VALUE (VALUE parsed as JSON, else string)
        #[arg(short = 'p', long = "property", value_name = "KEY=VALUE")]
        properties: Vec<String>,

        /// Expected properties as a JSON object
        #[arg(long = "properties", value_name = "JSON")]
        properties_json: Option<String>,

        /// Assert that no matching entry exists
        #[arg(long)]
        absent: bool,
    },

    /// Compare a fresh synthesis against documents on disk
    Diff {
        /// Path to the app definition
        #[arg(short, long, default_value = "synth.yaml")]
        file: PathBuf,

        /// Output directory (overrides the definition's outdir)
        #[arg(short, long)]
        outdir: Option<PathBuf>,

        /// Exit non-zero on any difference (for CI)
        #[arg(long)]
        strict: bool,
    },
}

/// Install the stderr log subscriber. `verbosity` counts `-v` flags.
pub fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Synth {
            file,
            outdir,
            stack,
        } => cmd_synth(&file, outdir.as_deref(), stack.as_deref()),
        Commands::Assert {
            document,
            type_tag,
            data,
            provider,
            properties,
            properties_json,
            absent,
        } => {
            let predicate = build_predicate(&properties, properties_json.as_deref())?;
            let target = if data {
                Target::Data
            } else if provider {
                Target::Provider
            } else {
                Target::Resource
            };
            cmd_assert(&document, target, &type_tag, predicate.as_ref(), absent)
        }
        Commands::Diff {
            file,
            outdir,
            strict,
        } => cmd_diff(&file, outdir.as_deref(), strict),
    }
}

const TEMPLATE: &str = r#"version: "1.0"
name: my-app
outdir: cdktf.out

stacks:
  - name: stack
    constructs:
      - kind: provider
        type: docker
        id: docker
      - kind: construct
        id: app
        children:
          - type: docker_image
            id: image
            properties:
              name: ubuntu:latest
          - type: docker_container
            id: container
            properties:
              name: app
              image: !ref docker_image.app_image.image_id
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let config_path = path.join("synth.yaml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    std::fs::write(&config_path, TEMPLATE)
        .map_err(|e| format!("cannot write {}: {}", config_path.display(), e))?;

    println!("Initialized synthtest project at {}", path.display());
    println!("  Created: {}", config_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let def = definition::parse_definition_file(file).map_err(|e| e.to_string())?;
    let errors = definition::validate_definition(&def);

    if errors.is_empty() {
        println!("OK: {} ({} stacks)", def.name, def.stacks.len());
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate a definition, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<definition::AppDefinition, String> {
    let def = definition::parse_definition_file(file).map_err(|e| e.to_string())?;
    let errors = definition::validate_definition(&def);
    if errors.is_empty() {
        return Ok(def);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

/// Build and synthesize every stack (or just `only`) of a definition.
fn synthesize_definition(
    def: &definition::AppDefinition,
    only: Option<&str>,
) -> Result<Vec<Document>, String> {
    let (_app, stacks) = definition::build_stacks(def).map_err(|e| e.to_string())?;
    let mut docs = Vec::new();
    for mut stack in stacks {
        if only.is_some_and(|name| name != stack.name()) {
            debug!(stack = stack.name(), "skipping stack");
            continue;
        }
        let doc = synth::synthesize(&mut stack)
            .map_err(|e| format!("stack '{}': {}", stack.name(), e))?;
        docs.push(doc);
    }
    if let Some(name) = only {
        if docs.is_empty() {
            return Err(format!("no stack named '{}'", name));
        }
    }
    Ok(docs)
}

fn cmd_synth(file: &Path, outdir: Option<&Path>, only: Option<&str>) -> Result<(), String> {
    let def = parse_and_validate(file)?;
    let outdir = outdir.unwrap_or(&def.outdir);
    let docs = synthesize_definition(&def, only)?;

    for doc in &docs {
        let path = output::write_document(outdir, doc).map_err(|e| e.to_string())?;
        println!(
            "{}: {} resource(s) -> {} ({})",
            doc.stack_name(),
            doc.resource_count(),
            path.display(),
            doc.fingerprint()
        );
    }
    // The manifest covers every stack on disk, not only the ones just written.
    let mut on_disk = Vec::with_capacity(def.stacks.len());
    for stack_def in &def.stacks {
        let stored = output::read_document(outdir, &stack_def.name).map_err(|e| e.to_string())?;
        on_disk.extend(stored);
    }
    output::write_manifest(outdir, &on_disk).map_err(|e| e.to_string())?;

    println!();
    println!("Synthesized {} stack(s).", docs.len());
    Ok(())
}

/// Which block an assertion looks in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Resource,
    Data,
    Provider,
}

/// Merge `KEY=VALUE` pairs and an optional JSON object into one predicate.
fn build_predicate(
    pairs: &[String],
    json: Option<&str>,
) -> Result<Option<query::Predicate>, String> {
    if pairs.is_empty() && json.is_none() {
        return Ok(None);
    }
    let mut predicate = match json {
        Some(text) => query::Predicate::from_json(text)?,
        None => query::Predicate::new(),
    };
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", pair))?;
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        predicate = predicate.with(key, value);
    }
    Ok(Some(predicate))
}

fn cmd_assert(
    document: &Path,
    target: Target,
    type_tag: &str,
    predicate: Option<&query::Predicate>,
    absent: bool,
) -> Result<(), String> {
    let doc = output::read_document_file(document).map_err(|e| e.to_string())?;
    let found = match (target, predicate) {
        (Target::Resource, None) => query::has_resource_of_type(&doc, type_tag),
        (Target::Resource, Some(p)) => query::has_resource_with_properties(&doc, type_tag, p),
        (Target::Data, None) => query::has_data_source_of_type(&doc, type_tag),
        (Target::Data, Some(p)) => query::has_data_source_with_properties(&doc, type_tag, p),
        (Target::Provider, None) => query::has_provider_of_type(&doc, type_tag),
        (Target::Provider, Some(p)) => query::has_provider_with_properties(&doc, type_tag, p),
    };

    let what = match target {
        Target::Resource => "resource",
        Target::Data => "data source",
        Target::Provider => "provider",
    };
    let qualifier = if predicate.is_some() { " with matching properties" } else { "" };

    match (found, absent) {
        (true, false) => {
            println!("PASS: {} '{}'{} found", what, type_tag, qualifier);
            Ok(())
        }
        (false, true) => {
            println!("PASS: no {} '{}'{}", what, type_tag, qualifier);
            Ok(())
        }
        (false, false) => Err(format!("no {} '{}'{} in {}", what, type_tag, qualifier, document.display())),
        (true, true) => Err(format!("unexpected {} '{}'{} in {}", what, type_tag, qualifier, document.display())),
    }
}

fn cmd_diff(file: &Path, outdir: Option<&Path>, strict: bool) -> Result<(), String> {
    let def = parse_and_validate(file)?;
    let outdir = outdir.unwrap_or(&def.outdir);
    let docs = synthesize_definition(&def, None)?;

    let mut total = 0;
    for fresh in &docs {
        let stored = output::read_document(outdir, fresh.stack_name()).map_err(|e| e.to_string())?;
        let Some(stored) = stored else {
            warn!(stack = fresh.stack_name(), "no stored document");
            println!("{}: not synthesized yet", fresh.stack_name());
            total += 1;
            continue;
        };

        let findings = diff::diff_documents(&stored, fresh);
        if findings.is_empty() {
            println!("{}: up to date.", fresh.stack_name());
            continue;
        }
        println!("{}:", fresh.stack_name());
        for f in &findings {
            println!("  {}: {}", f.kind, f.address());
            if let Some(ref h) = f.expected_hash {
                println!("    Stored: {}", h);
            }
            if let Some(ref h) = f.actual_hash {
                println!("    Fresh:  {}", h);
            }
        }
        total += findings.len();
    }

    if total > 0 {
        println!();
        println!("Differences: {}", total);
        if strict {
            return Err(format!("{} difference(s)", total));
        }
    } else {
        println!("No differences.");
    }
    Ok(())
}
