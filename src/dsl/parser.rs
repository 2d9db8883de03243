//! Parser: the structural pass over a document.
//!
//! Walks the document line by line, tracks an indentation-derived scope
//! stack, classifies each line, and drives the [`InstanceStore`] to build
//! components, triggers, variables, and attributes. Words that might name
//! something declared later are left as [`ValueKind::Unresolved`] for the
//! resolver. Problems are recorded against their line and parsing continues.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use super::error::Diagnostic;
use super::expr::{is_expression, parse_number_literal};
use super::line::{self, is_identifier, Line, VariableDecl, Words};
use super::note::parse_note_name;
use super::resolve::attribute_schema_for;
use super::scope::{Scope, TriggerKey};
use super::store::{EntityKind, InstanceStore, Owner};
use super::value::{ComponentRef, Scalar, ValueKind};
use crate::schema::validate::{clamp_to_range, Bound};
use crate::schema::{AttributeSchema, Check, ComponentKind, SchemaCatalog, TriggerKind};

/// Knobs that change how a document is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Reject the old single-line modulation form instead of rewriting it.
    pub strict: bool,
}

/// Lines on which an attribute's value and modulation were written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Origin {
    pub value_line: usize,
    pub modulation_line: usize,
}

pub type Origins = HashMap<(Owner, String), Origin>;

/// Output of the structural pass, besides the populated store.
#[derive(Debug, Default)]
pub struct Structure {
    pub diagnostics: Vec<Diagnostic>,
    pub origins: Origins,
}

#[derive(Debug)]
struct ScopeFrame {
    scope: Scope,
    /// `-1` for the permanent global frame.
    indent: isize,
}

#[derive(Debug)]
struct ComponentCursor {
    name: String,
    indent: usize,
}

#[derive(Debug)]
struct AttributeCursor {
    owner: Owner,
    name: String,
    indent: usize,
}

pub struct Parser<'a> {
    catalog: &'a SchemaCatalog,
    store: &'a mut InstanceStore,
    scopes: Vec<ScopeFrame>,
    component: Option<ComponentCursor>,
    attribute: Option<AttributeCursor>,
    /// Lines indented deeper than this belong to a dropped declaration.
    skip_below: Option<usize>,
    declarations: usize,
    line: usize,
    structure: Structure,
}

impl<'a> Parser<'a> {
    pub fn new(catalog: &'a SchemaCatalog, store: &'a mut InstanceStore) -> Self {
        Self {
            catalog,
            store,
            scopes: vec![ScopeFrame {
                scope: Scope::Global,
                indent: -1,
            }],
            component: None,
            attribute: None,
            skip_below: None,
            declarations: 0,
            line: 0,
            structure: Structure::default(),
        }
    }

    /// Build the store from `source`.
    pub fn run(mut self, source: &str) -> Structure {
        for line in line::lines(source) {
            self.line = line.number;
            self.parse_line(line);
        }
        debug!(
            "structural pass done: {} components, {} diagnostics",
            self.store.component_count(),
            self.structure.diagnostics.len()
        );
        self.structure
    }

    fn parse_line(&mut self, line: Line<'_>) {
        if let Some(indent) = self.skip_below {
            if line.indent > indent {
                return;
            }
            self.skip_below = None;
        }
        self.unwind(line.indent);

        let content = line.content;
        if line::is_variable_line(content) {
            match line::parse_variable(content) {
                Ok(decl) => self.declare_variable(decl),
                Err(msg) => self.error(msg),
            }
            return;
        }

        let words = Words::split(content);
        if let Some(kind) = self.catalog.trigger_kind(words.head) {
            self.open_trigger(kind, words, line.indent);
        } else if words.head == "modulation" {
            self.attach_modulation(words);
        } else if line.indent > 0 && self.current_owner().is_some() && !self.opens_component(&words)
        {
            self.set_attribute(words, line.indent);
        } else if let Some(kind) = self.catalog.component_kind(words.head) {
            self.open_component(kind, words, line.indent);
        } else {
            self.set_attribute(words, line.indent);
        }
    }

    /// Close every scope and cursor that the line at `indent` is not nested in.
    fn unwind(&mut self, indent: usize) {
        let depth = indent as isize;
        while self.scopes.last().map_or(false, |f| f.indent >= depth) {
            self.scopes.pop();
        }
        if self.component.as_ref().map_or(false, |c| c.indent >= indent) {
            self.component = None;
        }
        if self.attribute.as_ref().map_or(false, |a| a.indent >= indent) {
            self.attribute = None;
        }
        if indent == 0 {
            self.scopes.truncate(1);
            self.component = None;
            self.attribute = None;
        }
    }

    fn current_scope(&self) -> Scope {
        self.scopes
            .last()
            .map(|f| f.scope.clone())
            .unwrap_or(Scope::Global)
    }

    fn current_owner(&self) -> Option<Owner> {
        if let Some(component) = &self.component {
            return Some(Owner::Component(component.name.clone()));
        }
        match self.current_scope() {
            Scope::Trigger(key) => Some(Owner::Trigger(key)),
            Scope::Global => None,
        }
    }

    /// An indented line headed by a component kind is a component declaration
    /// unless the active owner has an attribute of the same name. A missing
    /// name is reported by `open_component`.
    fn opens_component(&self, words: &Words<'_>) -> bool {
        if self.catalog.component_kind(words.head).is_none() {
            return false;
        }
        match self.current_owner() {
            Some(owner) => attribute_schema_for(self.catalog, self.store, &owner, words.head).is_none(),
            None => true,
        }
    }

    // ---- triggers ----

    fn open_trigger(&mut self, kind: TriggerKind, words: Words<'_>, indent: usize) {
        let Some(schema) = self.catalog.trigger(kind) else {
            return;
        };

        if let Some(component) = &self.component {
            let msg = format!(
                "trigger `{}` cannot be declared inside component `{}`",
                words.head, component.name
            );
            self.error(msg);
            self.skip_below = Some(indent);
            return;
        }

        let name = if schema.requires_name {
            match words.single_rest() {
                Some(name) => Some(name.to_string()),
                None => {
                    let msg = if words.rest.is_empty() {
                        format!("`{kind}` trigger requires a name")
                    } else {
                        format!("expected `{kind} <name>`, got `{}`", words.rest)
                    };
                    self.error(msg);
                    self.skip_below = Some(indent);
                    return;
                }
            }
        } else {
            if !words.rest.is_empty() {
                self.warning(format!("`{kind}` takes no name; `{}` ignored", words.rest));
            }
            None
        };

        if let (TriggerKind::Note, Some(note)) = (kind, &name) {
            if parse_note_name(note).is_none() {
                self.warning(format!("`{note}` is not a recognized note name"));
            }
        }

        let key = TriggerKey::new(kind, name);
        debug!("line {}: open trigger {key}", self.line);
        self.store.add_trigger(key.clone());
        self.scopes.push(ScopeFrame {
            scope: Scope::Trigger(key),
            indent: indent as isize,
        });
        self.attribute = None;
    }

    // ---- components ----

    fn open_component(&mut self, kind: ComponentKind, words: Words<'_>, indent: usize) {
        if let Some(parent) = &self.component {
            let msg = format!(
                "{kind} cannot be declared inside component `{}`; components hold only attributes",
                parent.name
            );
            self.error(msg);
            self.skip_below = Some(indent);
            return;
        }

        let name = match words.single_rest() {
            Some(name) if is_identifier(name) => name,
            Some(name) => {
                self.error(format!("`{name}` is not a valid component name"));
                self.skip_below = Some(indent);
                return;
            }
            None => {
                let msg = if words.rest.is_empty() {
                    format!("`{kind}` requires a name")
                } else {
                    format!("expected `{kind} <name>`, got `{}`", words.rest)
                };
                self.error(msg);
                self.skip_below = Some(indent);
                return;
            }
        };

        let scope = self.current_scope();
        match self.store.add_component(kind, name, &scope, BTreeMap::new()) {
            Ok(()) => {
                self.component = Some(ComponentCursor {
                    name: name.to_string(),
                    indent,
                });
                self.attribute = None;
            }
            Err(e) => {
                self.error(e.to_string());
                self.skip_below = Some(indent);
            }
        }
    }

    // ---- attributes ----

    fn set_attribute(&mut self, words: Words<'_>, indent: usize) {
        let attr = words.head;
        let Some(owner) = self.current_owner() else {
            if !self.catalog.is_attribute_name(attr) && words.single_rest().is_some() {
                self.error(format!("unknown component kind `{attr}`"));
                self.skip_below = Some(indent);
            } else {
                self.error(format!("attribute `{attr}` outside any component/trigger"));
            }
            return;
        };

        if let Owner::Trigger(key) = &owner {
            let accepts = self
                .catalog
                .trigger(key.kind())
                .map_or(false, |t| t.has_attributes);
            if !accepts {
                self.error(format!("`{}` triggers cannot have attributes", key.kind()));
                return;
            }
        }

        let schema = attribute_schema_for(self.catalog, self.store, &owner, attr);
        if schema.is_none() {
            self.warning(format!(
                "unknown attribute `{attr}` on {owner}; accepted as-is"
            ));
        }

        let value = if words.rest.is_empty() {
            None
        } else {
            self.classify_value(attr, words.rest, schema)
        };

        self.store.set_value(&owner, attr, value);
        self.structure
            .origins
            .entry((owner.clone(), attr.to_string()))
            .or_default()
            .value_line = self.line;
        self.attribute = Some(AttributeCursor {
            owner,
            name: attr.to_string(),
            indent,
        });
    }

    /// Decide what an attribute's text is. `None` means "use nothing" after
    /// a rejected literal with no schema default.
    fn classify_value(
        &mut self,
        attr: &str,
        text: &str,
        schema: Option<&AttributeSchema>,
    ) -> Option<ValueKind> {
        if let Some(n) = parse_number_literal(text) {
            return self.checked_literal(attr, Scalar::Number(n), schema);
        }
        if is_expression(text) {
            return Some(ValueKind::Expression(text.to_string()));
        }
        if is_identifier(text) {
            if schema.map_or(false, |s| s.allowed_values().contains(&text)) {
                return Some(ValueKind::text(text));
            }
            if self.store.lookup(text).map(|e| e.entity) == Some(EntityKind::Variable) {
                if let Some(s) = schema {
                    if !s.allows_variables() {
                        self.error(format!("`{attr}` cannot reference variable `{text}`"));
                        return s.default_value().map(ValueKind::Literal);
                    }
                }
                return Some(ValueKind::VariableRef(text.to_string()));
            }
            return Some(ValueKind::Unresolved(text.to_string()));
        }
        self.checked_literal(attr, Scalar::Text(text.to_string()), schema)
    }

    fn checked_literal(
        &mut self,
        attr: &str,
        value: Scalar,
        schema: Option<&AttributeSchema>,
    ) -> Option<ValueKind> {
        let Some(schema) = schema else {
            return Some(ValueKind::Literal(value));
        };
        match schema.check_literal(attr, &value) {
            Check::Accepted(value) => Some(ValueKind::Literal(value)),
            Check::Adjusted { value, warning } => {
                self.warning(warning);
                Some(ValueKind::Literal(value))
            }
            Check::Rejected(msg) => {
                self.error(msg);
                schema.default_value().map(ValueKind::Literal)
            }
        }
    }

    fn attach_modulation(&mut self, words: Words<'_>) {
        let Some(cursor) = &self.attribute else {
            self.error("modulation line with no active attribute");
            return;
        };
        let Some(source) = words.single_rest() else {
            self.error("expected `modulation <component>`");
            return;
        };

        let owner = cursor.owner.clone();
        let attr = cursor.name.clone();
        self.store
            .set_modulation(&owner, &attr, Some(ComponentRef::unresolved(source)));
        self.structure
            .origins
            .entry((owner, attr))
            .or_default()
            .modulation_line = self.line;
    }

    // ---- variables ----

    fn declare_variable(&mut self, decl: VariableDecl<'_>) {
        let scope = self.current_scope();
        let order = self.declarations;
        self.declarations += 1;

        let value = self.variable_value(&decl, &scope);
        let (min, max) = match decl.range {
            Some((lo, hi)) if lo > hi => {
                self.error(format!(
                    "range [{lo}, {hi}] for `{}` has min above max; range ignored",
                    decl.name
                ));
                (None, None)
            }
            Some((lo, hi)) => (Some(lo), Some(hi)),
            None => (None, None),
        };

        if let Scope::Trigger(key) = &scope {
            match self.store.lookup(decl.name).map(|e| e.entity) {
                Some(EntityKind::Variable) => {
                    if decl.range.is_some() {
                        self.warning(format!(
                            "range on override of `{}` ignored; the declaration's range applies",
                            decl.name
                        ));
                    }
                    let (vmin, vmax) = self
                        .store
                        .get_variable(decl.name)
                        .map_or((None, None), |v| (v.min, v.max));
                    let value = self.clamp_variable(decl.name, value, vmin, vmax);
                    self.store.set_variable_override(decl.name, value, key);
                    return;
                }
                Some(EntityKind::Component(kind)) => {
                    self.error(format!(
                        "cannot override `{}`: it is a {kind}, not a variable",
                        decl.name
                    ));
                    return;
                }
                None => {}
            }
        }

        let value = self.clamp_variable(decl.name, value, min, max);
        if let Err(e) = self
            .store
            .add_variable(decl.name, value, &scope, min, max, Some(order))
        {
            self.error(e.to_string());
        }
    }

    fn variable_value(&mut self, decl: &VariableDecl<'_>, scope: &Scope) -> Scalar {
        if let Some(n) = parse_number_literal(decl.expr) {
            return Scalar::Number(n);
        }
        if is_expression(decl.expr) {
            return match self.store.evaluate_expression(decl.expr, scope) {
                Ok(n) => Scalar::Number(n),
                Err(e) => {
                    self.error(format!(
                        "cannot evaluate `{}` for variable `{}`: {e}",
                        decl.expr, decl.name
                    ));
                    Scalar::Number(0.0)
                }
            };
        }
        if is_identifier(decl.expr) {
            if let Some(value) = self.store.resolve_variable(decl.expr, scope.trigger_key()) {
                return value.clone();
            }
        }
        Scalar::Text(decl.expr.to_string())
    }

    fn clamp_variable(
        &mut self,
        name: &str,
        value: Scalar,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Scalar {
        let Scalar::Number(n) = value else {
            return value;
        };
        let (clamped, bound) = clamp_to_range(n, min, max);
        match bound {
            Some(Bound::Below(lo)) => {
                self.warning(format!("`{name}` = {n} is below its minimum {lo}; clamped"))
            }
            Some(Bound::Above(hi)) => {
                self.warning(format!("`{name}` = {n} is above its maximum {hi}; clamped"))
            }
            None => {}
        }
        Scalar::Number(clamped)
    }

    // ---- diagnostics ----

    fn error(&mut self, message: impl Into<String>) {
        self.structure
            .diagnostics
            .push(Diagnostic::error(self.line, message));
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.structure
            .diagnostics
            .push(Diagnostic::warning(self.line, message));
    }
}
