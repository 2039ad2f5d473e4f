//! Site generation for antora-dev.
//!
//! Site generation itself is Antora's job. This crate spawns the generator
//! against a playbook file and reports how it went.

pub mod generator;

pub use generator::{GenerateError, GenerateResult, GeneratorConfig, SiteGenerator};
