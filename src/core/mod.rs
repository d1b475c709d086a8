//! Core logic — construct tree, synthesis, documents, queries, definitions.

pub mod builder;
pub mod definition;
pub mod document;
pub mod error;
pub mod output;
pub mod query;
pub mod resolver;
pub mod synth;
pub mod types;
