//! Sonority: an interpreter for indentation-structured synth patch documents.
//!
//! A document declares components (oscillators, LFOs, envelopes, effects),
//! trigger scopes (`master`, `note <n>`, `key <k>`), and variables. The
//! [`dsl::Interpreter`] validates it against a [`schema::SchemaCatalog`] and
//! rebuilds a [`dsl::InstanceStore`] that rendering backends query for
//! components and per-trigger actions.

pub mod config;
pub mod dsl;
pub mod schema;
