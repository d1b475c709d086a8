//! Output directory — write (atomic), read, and path derivation.
//!
//! Layout:
//! ```text
//! <outdir>/manifest.json
//! <outdir>/stacks/<stack>/cdk.tf.json
//! ```

use super::document::Document;
use super::error::Error;
use crate::snapshot::hasher;
use std::path::{Path, PathBuf};
use tracing::info;

const DOCUMENT_FILE: &str = "cdk.tf.json";
const MANIFEST_FILE: &str = "manifest.json";

/// Derive the document path for a stack within the output directory.
pub fn document_path(outdir: &Path, stack: &str) -> PathBuf {
    outdir.join("stacks").join(stack).join(DOCUMENT_FILE)
}

pub fn manifest_path(outdir: &Path) -> PathBuf {
    outdir.join(MANIFEST_FILE)
}

/// Load a stack's document. Returns None if the file doesn't exist.
pub fn read_document(outdir: &Path, stack: &str) -> Result<Option<Document>, Error> {
    let path = document_path(outdir, stack);
    if !path.exists() {
        return Ok(None);
    }
    read_document_file(&path).map(Some)
}

/// Load a document from an explicit path.
pub fn read_document_file(path: &Path) -> Result<Document, Error> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(Document::from_json(&content)?)
}

/// Write a stack's document atomically (write to temp, then rename).
pub fn write_document(outdir: &Path, doc: &Document) -> Result<PathBuf, Error> {
    let path = document_path(outdir, doc.stack_name());
    write_atomic(&path, &doc.to_json_pretty())?;
    info!(stack = doc.stack_name(), path = %path.display(), "wrote document");
    Ok(path)
}

/// Write `manifest.json` listing every stack, its document path and
/// fingerprint, plus a composite fingerprint over all stacks.
pub fn write_manifest(outdir: &Path, docs: &[Document]) -> Result<PathBuf, Error> {
    let fingerprints: Vec<String> = docs.iter().map(Document::fingerprint).collect();
    let mut stacks = serde_json::Map::new();
    for (doc, fingerprint) in docs.iter().zip(&fingerprints) {
        stacks.insert(
            doc.stack_name().to_string(),
            serde_json::json!({
                "name": doc.stack_name(),
                "synthesizedStackPath": format!("stacks/{}/{}", doc.stack_name(), DOCUMENT_FILE),
                "fingerprint": fingerprint,
            }),
        );
    }
    let refs: Vec<&str> = fingerprints.iter().map(String::as_str).collect();
    let manifest = serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "fingerprint": hasher::composite_hash(&refs),
        "stacks": stacks,
    });

    let path = manifest_path(outdir);
    let text = serde_json::to_string_pretty(&manifest)
        .map_err(|e| Error::Definition(format!("serialize error: {}", e)))?;
    write_atomic(&path, &text)?;
    Ok(path)
}

fn write_atomic(path: &Path, content: &str) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, content).map_err(|e| Error::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| Error::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::App;
    use crate::core::synth::synthesize;
    use crate::core::types::props;

    fn make_doc(stack: &str) -> Document {
        let mut app = App::new();
        let mut s = app.create_stack(stack).unwrap();
        let root = s.root();
        s.add_resource(root, "docker_image", "img", props([("name", "ubuntu:latest".into())]))
            .unwrap();
        synthesize(&mut s).unwrap()
    }

    #[test]
    fn test_output_document_path() {
        let p = document_path(Path::new("/out"), "stack");
        assert_eq!(p, PathBuf::from("/out/stacks/stack/cdk.tf.json"));
    }

    #[test]
    fn test_output_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let doc = make_doc("stack");
        write_document(dir.path(), &doc).unwrap();

        let loaded = read_document(dir.path(), "stack").unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[test]
    fn test_output_read_nonexistent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_document(dir.path(), "ghost").unwrap().is_none());
    }

    #[test]
    fn test_output_read_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = document_path(dir.path(), "broken");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"resource": "nope"}"#).unwrap();
        assert!(matches!(
            read_document(dir.path(), "broken"),
            Err(Error::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_output_atomic_write() {
        let dir = tempfile::tempdir().unwrap();
        let doc = make_doc("stack");
        let path = write_document(dir.path(), &doc).unwrap();

        // Verify temp file is cleaned up
        assert!(!path.with_extension("json.tmp").exists());
        assert!(path.exists());
    }

    #[test]
    fn test_output_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let docs = vec![make_doc("alpha"), make_doc("beta")];
        let path = write_manifest(dir.path(), &docs).unwrap();
        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(
            manifest["stacks"]["beta"]["synthesizedStackPath"],
            "stacks/beta/cdk.tf.json"
        );
        assert_eq!(manifest["stacks"]["alpha"]["fingerprint"], docs[0].fingerprint());
        assert!(manifest["fingerprint"].as_str().unwrap().starts_with("blake3:"));
    }
}
