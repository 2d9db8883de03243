//! Reference resolution, the second pass over a built store.
//!
//! Runs once every component, trigger, and variable exists, so forward
//! references work. Planning only reads the store; the resulting rewrites are
//! applied afterwards in a single step.

use log::debug;

use super::error::Diagnostic;
use super::parser::{Origins, ParseOptions};
use super::scope::Scope;
use super::store::{AttributeSite, EntityKind, InstanceStore, Owner};
use super::value::{ComponentRef, Scalar, ValueKind};
use crate::schema::{AttributeSchema, Check, ComponentKind, SchemaCatalog, ValueType};

/// The schema for `attr` on `owner`, if the catalog declares one.
pub fn attribute_schema_for<'c>(
    catalog: &'c SchemaCatalog,
    store: &InstanceStore,
    owner: &Owner,
    attr: &str,
) -> Option<&'c AttributeSchema> {
    match owner {
        Owner::Component(name) => {
            catalog.component_attribute(store.get_component(name)?.kind, attr)
        }
        Owner::Trigger(key) => catalog.trigger_attribute(key.kind(), attr),
    }
}

/// Resolve `value` to a number in `scope`, falling back to the schema default
/// when it is missing or cannot be evaluated.
pub fn effective_number(
    store: &InstanceStore,
    schema: Option<&AttributeSchema>,
    value: Option<&ValueKind>,
    scope: &Scope,
) -> Option<f64> {
    value
        .and_then(|v| store.numeric_value(v, scope).ok())
        .or_else(|| schema?.default_value()?.as_number())
}

/// Rewrites for one attribute. `None` leaves a slot untouched.
#[derive(Debug, Default)]
struct Resolution {
    value: Option<Option<ValueKind>>,
    modulation: Option<Option<ComponentRef>>,
}

impl Resolution {
    fn is_empty(&self) -> bool {
        self.value.is_none() && self.modulation.is_none()
    }
}

#[derive(Debug)]
struct Rewrite {
    owner: Owner,
    attribute: String,
    resolution: Resolution,
}

/// Resolve every pending reference in `store`.
pub fn resolve_references(
    store: &mut InstanceStore,
    catalog: &SchemaCatalog,
    options: ParseOptions,
    origins: &Origins,
) -> Vec<Diagnostic> {
    let (rewrites, diagnostics) = Resolver {
        catalog,
        store,
        options,
        origins,
        diagnostics: Vec::new(),
    }
    .plan();

    debug!("resolution pass: {} attributes rewritten", rewrites.len());
    for rewrite in rewrites {
        let Rewrite {
            owner,
            attribute,
            resolution,
        } = rewrite;
        if let Some(value) = resolution.value {
            store.set_value(&owner, &attribute, value);
        }
        if let Some(modulation) = resolution.modulation {
            store.set_modulation(&owner, &attribute, modulation);
        }
    }
    diagnostics
}

struct Resolver<'a> {
    catalog: &'a SchemaCatalog,
    store: &'a InstanceStore,
    options: ParseOptions,
    origins: &'a Origins,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Resolver<'a> {
    fn plan(mut self) -> (Vec<Rewrite>, Vec<Diagnostic>) {
        let mut rewrites = Vec::new();
        for site in self.store.attribute_sites() {
            let resolution = self.resolve_site(&site);
            if !resolution.is_empty() {
                rewrites.push(Rewrite {
                    owner: site.owner,
                    attribute: site.attribute,
                    resolution,
                });
            }
        }
        (rewrites, self.diagnostics)
    }

    fn resolve_site(&mut self, site: &AttributeSite) -> Resolution {
        let schema = attribute_schema_for(self.catalog, self.store, &site.owner, &site.attribute);
        let origin = self
            .origins
            .get(&(site.owner.clone(), site.attribute.clone()))
            .copied()
            .unwrap_or_default();
        let mut resolution = Resolution::default();

        match &site.value.value {
            Some(ValueKind::Unresolved(word)) => {
                self.resolve_word(site, schema, word, origin.value_line, &mut resolution)
            }
            Some(ValueKind::VariableRef(name)) => {
                self.check_visible(site, name, origin.value_line)
            }
            Some(value @ ValueKind::Expression(source)) => {
                let scope = self.store.owner_scope(&site.owner).unwrap_or(Scope::Global);
                if let Err(e) = self.store.numeric_value(value, &scope) {
                    let fallback = schema
                        .and_then(AttributeSchema::default_value)
                        .map_or_else(|| "no value".to_string(), |d| format!("default {d}"));
                    self.warning(
                        origin.value_line,
                        format!(
                            "`{}` = `{source}` cannot be evaluated ({e}); falls back to {fallback}",
                            site.attribute
                        ),
                    );
                }
            }
            _ => {}
        }

        if resolution.modulation.is_none() {
            if let Some(modulation) = &site.value.modulation {
                resolution.modulation =
                    self.resolve_modulation(site, schema, modulation, origin.modulation_line);
            }
        }
        resolution
    }

    /// A variable reference must name a variable reachable from the owner's
    /// scope: an override or local declaration in its trigger, or a global.
    fn check_visible(&mut self, site: &AttributeSite, name: &str, line: usize) {
        let scope = self.store.owner_scope(&site.owner).unwrap_or(Scope::Global);
        if self.store.resolve_variable(name, scope.trigger_key()).is_none() {
            self.error(
                line,
                format!(
                    "variable `{name}` is not visible from {}; `{}` has no value there",
                    site.owner, site.attribute
                ),
            );
        }
    }

    /// A bare word in value position: a variable declared later, a component
    /// reference, the old modulation form, or nothing at all.
    fn resolve_word(
        &mut self,
        site: &AttributeSite,
        schema: Option<&AttributeSchema>,
        word: &str,
        line: usize,
        resolution: &mut Resolution,
    ) {
        let attr = &site.attribute;
        let owner = &site.owner;

        match self.store.lookup(word).map(|e| e.entity) {
            Some(EntityKind::Variable) => match schema {
                Some(s) if !s.allows_variables() => {
                    self.error(line, format!("`{attr}` cannot reference variable `{word}`"));
                    resolution.value = Some(s.default_value().map(ValueKind::Literal));
                }
                _ => {
                    self.check_visible(site, word, line);
                    resolution.value = Some(Some(ValueKind::VariableRef(word.to_string())));
                }
            },
            Some(EntityKind::Component(kind)) => match schema {
                None => {
                    resolution.value = Some(Some(ValueKind::ComponentRef(ComponentRef::resolved(
                        word, kind,
                    ))))
                }
                Some(s) if s.is_reference_typed() => {
                    if s.accepts_component(kind) {
                        resolution.value = Some(Some(ValueKind::ComponentRef(
                            ComponentRef::resolved(word, kind),
                        )));
                    } else {
                        self.error(
                            line,
                            format!(
                                "`{attr}` on {owner} cannot reference {kind} `{word}`; expected {}",
                                kind_list(&s.accepts_components)
                            ),
                        );
                    }
                }
                Some(s) if s.receives_modulation() => {
                    self.modulation_shim(site, s, word, kind, line, resolution)
                }
                Some(_) => self.error(
                    line,
                    format!("`{attr}` on {owner} cannot reference {kind} `{word}`"),
                ),
            },
            None => match schema {
                None => resolution.value = Some(Some(ValueKind::text(word))),
                Some(s) if s.value_type == ValueType::String => {
                    resolution.value = Some(Some(ValueKind::text(word)))
                }
                Some(s) if s.value_type == ValueType::Enum => {
                    match s.check_literal(attr, &Scalar::from(word)) {
                        Check::Rejected(msg) => {
                            self.error(line, msg);
                            resolution.value = Some(s.default_value().map(ValueKind::Literal));
                        }
                        _ => resolution.value = Some(Some(ValueKind::text(word))),
                    }
                }
                Some(s) if s.is_reference_typed() => {
                    self.error(line, format!("unknown component `{word}` for `{attr}` on {owner}"))
                }
                Some(_) => {
                    self.error(line, format!("unknown name `{word}` for `{attr}` on {owner}"))
                }
            },
        }
    }

    /// Rewrite the old single-line form (`pitch vibrato`) as the attribute's
    /// default value with `vibrato` attached as modulation.
    fn modulation_shim(
        &mut self,
        site: &AttributeSite,
        schema: &AttributeSchema,
        word: &str,
        kind: ComponentKind,
        line: usize,
        resolution: &mut Resolution,
    ) {
        let attr = &site.attribute;
        let owner = &site.owner;

        if self.options.strict {
            self.error(
                line,
                format!(
                    "`{attr} {word}` names a component; write `modulation {word}` on its own line under `{attr}`"
                ),
            );
            return;
        }
        if !schema.accepts_modulator(kind) {
            self.error(
                line,
                format!(
                    "{kind} `{word}` cannot modulate `{attr}` on {owner}; accepted: {}",
                    kind_list(&schema.accepts_modulation)
                ),
            );
            return;
        }
        if site.value.modulation.is_some() {
            self.error(
                line,
                format!("`{attr}` on {owner} already has a modulation; `{word}` ignored"),
            );
            return;
        }

        let default = schema.default_value();
        self.warning(
            line,
            format!(
                "`{attr} {word}` rewritten as `{attr} {}` with `modulation {word}`",
                default
                    .as_ref()
                    .map_or_else(|| "<unset>".to_string(), ToString::to_string)
            ),
        );
        resolution.value = Some(default.map(ValueKind::Literal));
        resolution.modulation = Some(Some(ComponentRef::resolved(word, kind)));
    }

    /// Fill in the kind of a modulation source, or clear it if it is not allowed.
    fn resolve_modulation(
        &mut self,
        site: &AttributeSite,
        schema: Option<&AttributeSchema>,
        modulation: &ComponentRef,
        line: usize,
    ) -> Option<Option<ComponentRef>> {
        let attr = &site.attribute;
        let owner = &site.owner;
        let name = &modulation.name;

        match self.store.lookup(name).map(|e| e.entity) {
            Some(EntityKind::Component(kind)) => {
                if let Some(s) = schema {
                    if !s.accepts_modulator(kind) {
                        let msg = if s.receives_modulation() {
                            format!(
                                "{kind} `{name}` cannot modulate `{attr}` on {owner}; accepted: {}",
                                kind_list(&s.accepts_modulation)
                            )
                        } else {
                            format!("`{attr}` on {owner} does not accept modulation")
                        };
                        self.error(line, msg);
                        return Some(None);
                    }
                }
                let resolved = ComponentRef::resolved(name.clone(), kind);
                (*modulation != resolved).then_some(Some(resolved))
            }
            Some(EntityKind::Variable) => {
                self.error(
                    line,
                    format!("modulation source `{name}` is a variable, not a component"),
                );
                Some(None)
            }
            None => {
                self.error(line, format!("unknown modulation source `{name}`"));
                Some(None)
            }
        }
    }

    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error(line, message));
    }

    fn warning(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::warning(line, message));
    }
}

fn kind_list(kinds: &[ComponentKind]) -> String {
    kinds
        .iter()
        .map(|k| k.name())
        .collect::<Vec<_>>()
        .join(", ")
}
