//! Instance store: the scoped model of components, variables, and triggers
//! that a document describes.
//!
//! The store has no parsing logic. The parser, the reference resolver, and
//! external editors all mutate it through the same operations, and the whole
//! store is rebuilt with [`InstanceStore::reset`] before every full parse.
//!
//! Every name (component or variable) is registered once in a flat registry,
//! regardless of scope. That makes a bare word unambiguous everywhere.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use log::{debug, warn};

use super::error::{EvalError, StoreError};
use super::expr;
use super::scope::{Scope, TriggerKey};
use super::value::{AttributeValue, ComponentRef, Scalar, StoredAttribute, ValueKind};
use crate::schema::ComponentKind;

/// Components grouped by kind, then by name.
pub type ComponentTable = BTreeMap<ComponentKind, BTreeMap<String, Component>>;

/// A named functional unit holding only attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub kind: ComponentKind,
    pub name: String,
    pub scope: Scope,
    attributes: BTreeMap<String, StoredAttribute>,
}

impl Component {
    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.get(name).map(StoredAttribute::normalize)
    }

    /// All attributes in name order, normalized.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, AttributeValue)> + '_ {
        self.attributes
            .iter()
            .map(|(name, stored)| (name.as_str(), stored.normalize()))
    }
}

/// A declared variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub scope: Scope,
    pub value: Scalar,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Position of the declaration in the document.
    pub decl_order: Option<usize>,
}

/// A trigger scope and everything it owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    key: TriggerKey,
    attributes: BTreeMap<String, StoredAttribute>,
    components: ComponentTable,
    overrides: BTreeMap<String, Scalar>,
}

impl Trigger {
    fn new(key: TriggerKey) -> Self {
        Self {
            key,
            attributes: BTreeMap::new(),
            components: BTreeMap::new(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> &TriggerKey {
        &self.key
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.attributes.get(name).map(StoredAttribute::normalize)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, AttributeValue)> + '_ {
        self.attributes
            .iter()
            .map(|(name, stored)| (name.as_str(), stored.normalize()))
    }

    /// Components owned by this trigger only.
    pub fn components(&self) -> &ComponentTable {
        &self.components
    }

    pub fn overrides(&self) -> &BTreeMap<String, Scalar> {
        &self.overrides
    }
}

/// What a registered name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Component(ComponentKind),
    Variable,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Component(kind) => write!(f, "{kind}"),
            EntityKind::Variable => f.write_str("variable"),
        }
    }
}

/// A name registry entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub scope: Scope,
    pub entity: EntityKind,
}

impl RegistryEntry {
    fn describe(&self) -> String {
        format!("a {} in {} scope", self.entity, self.scope)
    }
}

/// Something that owns attributes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Owner {
    Component(String),
    Trigger(TriggerKey),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Component(name) => write!(f, "`{name}`"),
            Owner::Trigger(key) => write!(f, "`{key}`"),
        }
    }
}

/// One attribute of one owner, normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSite {
    pub owner: Owner,
    pub attribute: String,
    pub value: AttributeValue,
}

/// The scoped instance graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceStore {
    registry: HashMap<String, RegistryEntry>,
    components: ComponentTable,
    variables: BTreeMap<String, Variable>,
    triggers: BTreeMap<TriggerKey, Trigger>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn lookup(&self, name: &str) -> Option<&RegistryEntry> {
        self.registry.get(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    // ---- triggers ----

    /// Create a trigger record if it does not exist yet. Returns whether it was created.
    pub fn add_trigger(&mut self, key: TriggerKey) -> bool {
        if self.triggers.contains_key(&key) {
            return false;
        }
        self.triggers.insert(key.clone(), Trigger::new(key));
        true
    }

    pub fn trigger(&self, key: &TriggerKey) -> Option<&Trigger> {
        self.triggers.get(key)
    }

    pub fn triggers(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.values()
    }

    fn ensure_trigger(&mut self, key: &TriggerKey) -> &mut Trigger {
        self.triggers
            .entry(key.clone())
            .or_insert_with(|| Trigger::new(key.clone()))
    }

    // ---- components ----

    /// Declare a component. Fails without touching the store if the name is taken.
    pub fn add_component(
        &mut self,
        kind: ComponentKind,
        name: &str,
        scope: &Scope,
        initial: BTreeMap<String, StoredAttribute>,
    ) -> Result<(), StoreError> {
        if let Some(existing) = self.registry.get(name) {
            return Err(StoreError::NameTaken {
                name: name.to_string(),
                existing: existing.describe(),
            });
        }

        let table = match scope {
            Scope::Global => &mut self.components,
            Scope::Trigger(key) => &mut self.ensure_trigger(key).components,
        };
        table.entry(kind).or_default().insert(
            name.to_string(),
            Component {
                kind,
                name: name.to_string(),
                scope: scope.clone(),
                attributes: initial,
            },
        );
        self.registry.insert(
            name.to_string(),
            RegistryEntry {
                scope: scope.clone(),
                entity: EntityKind::Component(kind),
            },
        );
        debug!("added {kind} `{name}` in {scope} scope");
        Ok(())
    }

    pub fn get_component(&self, name: &str) -> Option<&Component> {
        let entry = self.registry.get(name)?;
        let EntityKind::Component(kind) = entry.entity else {
            return None;
        };
        let table = match &entry.scope {
            Scope::Global => &self.components,
            Scope::Trigger(key) => &self.triggers.get(key)?.components,
        };
        table.get(&kind)?.get(name)
    }

    fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        let entry = self.registry.get(name)?;
        let EntityKind::Component(kind) = entry.entity else {
            return None;
        };
        let table = match &entry.scope {
            Scope::Global => &mut self.components,
            Scope::Trigger(key) => &mut self.triggers.get_mut(key)?.components,
        };
        table.get_mut(&kind)?.get_mut(name)
    }

    /// Components of one kind owned directly by `scope`.
    pub fn get_components_by_type(&self, kind: ComponentKind, scope: &Scope) -> Vec<&Component> {
        let table = match scope {
            Scope::Global => Some(&self.components),
            Scope::Trigger(key) => self.triggers.get(key).map(|t| &t.components),
        };
        table
            .and_then(|t| t.get(&kind))
            .map(|bucket| bucket.values().collect())
            .unwrap_or_default()
    }

    /// The components visible from `scope`: the global table for the global
    /// scope, or a merged copy of global plus the trigger's own components.
    pub fn get_all_components_in_scope(&self, scope: &Scope) -> Cow<'_, ComponentTable> {
        match scope {
            Scope::Global => Cow::Borrowed(&self.components),
            Scope::Trigger(key) => {
                let mut merged = self.components.clone();
                if let Some(trigger) = self.triggers.get(key) {
                    merge_layer(&mut merged, &trigger.components, key);
                }
                Cow::Owned(merged)
            }
        }
    }

    /// Global components overlaid with a note scope and then a key scope.
    pub fn layered_components(
        &self,
        note: Option<&TriggerKey>,
        key: Option<&TriggerKey>,
    ) -> ComponentTable {
        let mut merged = self.components.clone();
        for layer in [note, key].into_iter().flatten() {
            if let Some(trigger) = self.triggers.get(layer) {
                merge_layer(&mut merged, &trigger.components, layer);
            }
        }
        merged
    }

    /// Total number of declared components across all scopes.
    pub fn component_count(&self) -> usize {
        self.registry
            .values()
            .filter(|e| matches!(e.entity, EntityKind::Component(_)))
            .count()
    }

    pub fn remove_component(&mut self, name: &str) -> bool {
        let Some(entry) = self.registry.get(name) else {
            return false;
        };
        let EntityKind::Component(kind) = entry.entity else {
            return false;
        };
        let table = match &entry.scope {
            Scope::Global => Some(&mut self.components),
            Scope::Trigger(key) => self.triggers.get_mut(key).map(|t| &mut t.components),
        };
        if let Some(table) = table {
            if let Some(bucket) = table.get_mut(&kind) {
                bucket.remove(name);
                if bucket.is_empty() {
                    table.remove(&kind);
                }
            }
        }
        self.registry.remove(name);
        true
    }

    // ---- attributes ----

    fn attributes_mut(&mut self, owner: &Owner) -> Option<&mut BTreeMap<String, StoredAttribute>> {
        match owner {
            Owner::Component(name) => self.component_mut(name).map(|c| &mut c.attributes),
            Owner::Trigger(key) => Some(&mut self.ensure_trigger(key).attributes),
        }
    }

    /// Replace an attribute's value, keeping its modulation.
    pub fn set_value(&mut self, owner: &Owner, attr: &str, value: Option<ValueKind>) -> bool {
        let Some(attrs) = self.attributes_mut(owner) else {
            return false;
        };
        let stored = attrs
            .remove(attr)
            .unwrap_or_else(|| StoredAttribute::Layered(AttributeValue::default()));
        attrs.insert(attr.to_string(), stored.replace_value(value));
        true
    }

    /// Replace an attribute's modulation, keeping its value.
    pub fn set_modulation(
        &mut self,
        owner: &Owner,
        attr: &str,
        modulation: Option<ComponentRef>,
    ) -> bool {
        let Some(attrs) = self.attributes_mut(owner) else {
            return false;
        };
        let stored = attrs
            .remove(attr)
            .unwrap_or_else(|| StoredAttribute::Layered(AttributeValue::default()));
        attrs.insert(attr.to_string(), stored.replace_modulation(modulation));
        true
    }

    pub fn attribute(&self, owner: &Owner, attr: &str) -> Option<AttributeValue> {
        match owner {
            Owner::Component(name) => self.get_component(name)?.attribute(attr),
            Owner::Trigger(key) => self.triggers.get(key)?.attribute(attr),
        }
    }

    /// The scope in which an owner's values are resolved.
    pub fn owner_scope(&self, owner: &Owner) -> Option<Scope> {
        match owner {
            Owner::Component(name) => self.get_component(name).map(|c| c.scope.clone()),
            Owner::Trigger(key) => Some(Scope::Trigger(key.clone())),
        }
    }

    pub fn update_component_attribute(&mut self, name: &str, attr: &str, value: ValueKind) -> bool {
        self.set_value(&Owner::Component(name.to_string()), attr, Some(value))
    }

    pub fn update_component_attribute_modulation(
        &mut self,
        name: &str,
        attr: &str,
        modulation: Option<ComponentRef>,
    ) -> bool {
        self.set_modulation(&Owner::Component(name.to_string()), attr, modulation)
    }

    pub fn set_trigger_attribute(&mut self, key: &TriggerKey, attr: &str, value: ValueKind) {
        self.set_value(&Owner::Trigger(key.clone()), attr, Some(value));
    }

    pub fn set_trigger_attribute_modulation(
        &mut self,
        key: &TriggerKey,
        attr: &str,
        modulation: Option<ComponentRef>,
    ) {
        self.set_modulation(&Owner::Trigger(key.clone()), attr, modulation);
    }

    pub fn get_trigger_attribute(&self, key: &TriggerKey, attr: &str) -> Option<AttributeValue> {
        self.triggers.get(key)?.attribute(attr)
    }

    pub fn get_trigger_attributes(&self, key: &TriggerKey) -> Vec<(String, AttributeValue)> {
        self.triggers
            .get(key)
            .map(|t| {
                t.attributes()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every attribute of every component and trigger, in a stable order:
    /// global components, then each trigger's components and its own attributes.
    pub fn attribute_sites(&self) -> Vec<AttributeSite> {
        fn push_components(sites: &mut Vec<AttributeSite>, table: &ComponentTable) {
            for component in table.values().flat_map(|bucket| bucket.values()) {
                for (attr, value) in component.attributes() {
                    sites.push(AttributeSite {
                        owner: Owner::Component(component.name.clone()),
                        attribute: attr.to_string(),
                        value,
                    });
                }
            }
        }

        let mut sites = Vec::new();
        push_components(&mut sites, &self.components);
        for trigger in self.triggers.values() {
            push_components(&mut sites, &trigger.components);
            for (attr, value) in trigger.attributes() {
                sites.push(AttributeSite {
                    owner: Owner::Trigger(trigger.key.clone()),
                    attribute: attr.to_string(),
                    value,
                });
            }
        }
        sites
    }

    // ---- variables ----

    /// Declare a variable. Redeclaring a variable in the same scope updates it
    /// in place; any other name collision fails.
    pub fn add_variable(
        &mut self,
        name: &str,
        value: Scalar,
        scope: &Scope,
        min: Option<f64>,
        max: Option<f64>,
        decl_order: Option<usize>,
    ) -> Result<(), StoreError> {
        if let Some(existing) = self.registry.get(name) {
            let same_variable = existing.entity == EntityKind::Variable && existing.scope == *scope;
            if !same_variable {
                return Err(StoreError::NameTaken {
                    name: name.to_string(),
                    existing: existing.describe(),
                });
            }
        }

        self.variables.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                scope: scope.clone(),
                value,
                min,
                max,
                decl_order,
            },
        );
        self.registry.insert(
            name.to_string(),
            RegistryEntry {
                scope: scope.clone(),
                entity: EntityKind::Variable,
            },
        );
        Ok(())
    }

    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// All declared variables in declaration order.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut vars: Vec<&Variable> = self.variables.values().collect();
        vars.sort_by_key(|v| v.decl_order.unwrap_or(usize::MAX));
        vars
    }

    pub fn remove_variable(&mut self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(entry) if entry.entity == EntityKind::Variable => {
                self.registry.remove(name);
                self.variables.remove(name);
                true
            }
            _ => false,
        }
    }

    /// Override a variable's effective value inside one trigger scope.
    /// Overrides are not registered names.
    pub fn set_variable_override(&mut self, name: &str, value: Scalar, key: &TriggerKey) {
        debug!("override `{name}` = {value} in {key}");
        self.ensure_trigger(key)
            .overrides
            .insert(name.to_string(), value);
    }

    pub fn clear_variable_override(&mut self, name: &str, key: &TriggerKey) -> bool {
        self.triggers
            .get_mut(key)
            .map_or(false, |t| t.overrides.remove(name).is_some())
    }

    pub fn variable_override(&self, name: &str, key: &TriggerKey) -> Option<&Scalar> {
        self.triggers.get(key)?.overrides.get(name)
    }

    /// Resolve a variable through the scope chain: an override on `key`, then
    /// a variable declared in `key`'s scope, then the global variable.
    pub fn resolve_variable(&self, name: &str, key: Option<&TriggerKey>) -> Option<&Scalar> {
        if let Some(key) = key {
            if let Some(value) = self.variable_override(name, key) {
                return Some(value);
            }
            if let Some(var) = self.variables.get(name) {
                if matches!(&var.scope, Scope::Trigger(k) if k == key) {
                    return Some(&var.value);
                }
            }
        }
        self.variables
            .get(name)
            .filter(|v| v.scope == Scope::Global)
            .map(|v| &v.value)
    }

    /// A variable's effective value as a number, if it has one.
    pub fn variable_number(&self, name: &str, key: Option<&TriggerKey>) -> Option<f64> {
        self.resolve_variable(name, key).and_then(Scalar::as_number)
    }

    /// Like [`variable_number`](Self::variable_number), but says why it failed.
    pub fn resolve_number(&self, name: &str, scope: &Scope) -> Result<f64, EvalError> {
        match self.resolve_variable(name, scope.trigger_key()) {
            Some(Scalar::Number(n)) => Ok(*n),
            Some(Scalar::Text(_)) => Err(EvalError::NotANumber(name.to_string())),
            None => Err(EvalError::UnknownVariable(name.to_string())),
        }
    }

    // ---- evaluation ----

    /// Evaluate arithmetic text with variables resolved from `scope`.
    pub fn evaluate_expression(&self, source: &str, scope: &Scope) -> Result<f64, EvalError> {
        expr::evaluate(source, |name| self.variable_number(name, scope.trigger_key()))
    }

    /// Resolve any value to a number in `scope`.
    pub fn numeric_value(&self, value: &ValueKind, scope: &Scope) -> Result<f64, EvalError> {
        match value {
            ValueKind::Literal(Scalar::Number(n)) => Ok(*n),
            ValueKind::Literal(Scalar::Text(text)) => Err(EvalError::NotANumber(text.clone())),
            ValueKind::VariableRef(name) | ValueKind::Unresolved(name) => {
                self.resolve_number(name, scope)
            }
            ValueKind::Expression(source) => self.evaluate_expression(source, scope),
            ValueKind::ComponentRef(r) => Err(EvalError::NotANumber(r.name.clone())),
        }
    }
}

fn merge_layer(base: &mut ComponentTable, layer: &ComponentTable, label: &TriggerKey) {
    for (kind, components) in layer {
        let bucket = base.entry(*kind).or_default();
        for (name, component) in components {
            if bucket.insert(name.clone(), component.clone()).is_some() {
                warn!("{kind} `{name}` from {label} shadows another component of the same name; name registry is inconsistent");
            }
        }
    }
}
