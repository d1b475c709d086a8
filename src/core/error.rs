//! Error kinds for construction, synthesis, and document parsing.

use std::path::PathBuf;

/// Raised while building the construct tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstructError {
    #[error("stack name '{0}' is already used in this app")]
    DuplicateName(String),

    #[error("'{id}' is already defined under '{parent}'")]
    DuplicateId { parent: String, id: String },

    #[error("invalid property '{key}' on '{path}': {reason}")]
    InvalidProperty {
        path: String,
        key: String,
        reason: String,
    },

    #[error("invalid {what} '{value}'")]
    InvalidIdentifier { what: &'static str, value: String },

    #[error("'{0}' cannot hold child constructs")]
    InvalidParent(String),

    #[error("node {0} does not belong to this stack")]
    UnknownNode(usize),

    #[error("'{path}' and '{existing}' both synthesize to '{address}'")]
    LogicalIdCollision {
        path: String,
        existing: String,
        address: String,
    },

    #[error("stack '{0}' has already been synthesized")]
    StackSealed(String),
}

/// Raised while synthesizing a stack.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("'{path}' references itself via '{reference}'")]
    SelfReference { path: String, reference: String },

    #[error("'{path}' references unknown address '{address}'")]
    UnresolvedReference { path: String, address: String },

    #[error("reference cycle detected involving: {}", members.join(", "))]
    ReferenceCycle { members: Vec<String> },
}

/// Raised when text handed to the query layer is not a synthesized document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed document: {message}")]
pub struct MalformedDocumentError {
    pub message: String,
}

impl MalformedDocumentError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Crate-level error for the definition loader, output writer, and CLI.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Construct(#[from] ConstructError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    MalformedDocument(#[from] MalformedDocumentError),

    #[error("definition error: {0}")]
    Definition(String),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
