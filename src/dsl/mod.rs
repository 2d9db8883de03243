//! DSL interpreter: indentation-structured patch documents → scoped instance store.
//!
//! A full parse is two passes over a freshly reset [`InstanceStore`]: the
//! [`parser`] builds every component, trigger, and variable, then [`resolve`]
//! settles references that could only be known once the whole document was read.

pub mod action;
pub mod error;
pub mod expr;
pub mod line;
pub mod note;
pub mod parser;
pub mod resolve;
pub mod scope;
pub mod store;
pub mod value;

pub use action::{Action, ActionTarget, ParamOffsets, Unit};
pub use error::{Diagnostic, EvalError, ParseResult, Severity, StoreError};
pub use parser::ParseOptions;
pub use resolve::effective_number;
pub use scope::{Scope, TriggerKey};
pub use store::{Component, InstanceStore, Owner, Variable};
pub use value::{AttributeValue, ComponentRef, Scalar, StoredAttribute, ValueKind};

use log::debug;

use crate::schema::SchemaCatalog;
use parser::Parser;

/// A parsed document: the rebuilt store and what went wrong building it.
#[derive(Debug, Clone)]
pub struct Document {
    pub store: InstanceStore,
    pub result: ParseResult,
}

/// The DSL interpreter.
///
/// Holds the catalog and options; every call parses the whole document from
/// scratch, so the same text always produces the same store.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter<'c> {
    catalog: &'c SchemaCatalog,
    options: ParseOptions,
}

impl<'c> Interpreter<'c> {
    pub fn new(catalog: &'c SchemaCatalog) -> Self {
        Self {
            catalog,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    /// Parse `source` into a new store.
    pub fn parse(&self, source: &str) -> Document {
        let mut store = InstanceStore::new();
        let result = self.reparse(&mut store, source);
        Document { store, result }
    }

    /// Rebuild `store` from `source`, discarding whatever it held.
    pub fn reparse(&self, store: &mut InstanceStore, source: &str) -> ParseResult {
        store.reset();

        if self.catalog.components.is_empty() {
            return ParseResult::from_diagnostics(vec![Diagnostic::error(
                0,
                "schema catalog is not loaded: it declares no component kinds",
            )]);
        }

        let structure = Parser::new(self.catalog, store).run(source);
        let mut diagnostics = structure.diagnostics;
        diagnostics.extend(resolve::resolve_references(
            store,
            self.catalog,
            self.options,
            &structure.origins,
        ));

        let result = ParseResult::from_diagnostics(diagnostics);
        debug!(
            "parsed document: {} errors, {} warnings, {} components, {} variables",
            result.errors.len(),
            result.warnings.len(),
            store.component_count(),
            store.variables().len()
        );
        result
    }
}
