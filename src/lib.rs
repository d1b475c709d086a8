//! synthtest — synthesize-and-assert harness for infrastructure constructs.
//!
//! Build a construct tree, synthesize it into a Terraform-JSON document,
//! and assert on resources and their properties.
//!
//! ```no_run
//! use synthtest::core::builder::App;
//! use synthtest::core::query::{has_resource_with_properties, Predicate};
//! use synthtest::core::synth::synthesize;
//! use synthtest::core::types::props;
//!
//! let mut app = App::new();
//! let mut stack = app.create_stack("stack")?;
//! let root = stack.root();
//! stack.add_resource(root, "docker_image", "ubuntu", props([("name", "ubuntu:latest".into())]))?;
//! let doc = synthesize(&mut stack)?;
//! assert!(has_resource_with_properties(&doc, "docker_image", &Predicate::new().with("name", "ubuntu:latest")));
//! # Ok::<(), synthtest::core::error::Error>(())
//! ```

pub mod cli;
pub mod core;
pub mod snapshot;
