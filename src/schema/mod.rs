//! Schema catalog: the declarative description of which component, trigger,
//! and attribute kinds exist, loaded from YAML.
//!
//! The interpreter never carries per-kind code: everything it knows about an
//! `oscillator` or a `note` trigger comes from here.

pub mod chords;
pub mod validate;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsl::value::Scalar;

pub use validate::Check;

/// The catalog shipped with the crate.
const BUILTIN_CATALOG: &str = include_str!("builtin.yaml");

/// Errors raised while loading a catalog.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("failed to read schema catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid schema catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("schema catalog declares no component kinds")]
    Empty,
}

/// Kinds of functional units a document can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Oscillator,
    Lfo,
    Envelope,
    Noise,
    Filter,
    Delay,
    Reverb,
    Distortion,
    Compressor,
    Chorus,
}

impl ComponentKind {
    pub const ALL: [ComponentKind; 10] = [
        ComponentKind::Oscillator,
        ComponentKind::Lfo,
        ComponentKind::Envelope,
        ComponentKind::Noise,
        ComponentKind::Filter,
        ComponentKind::Delay,
        ComponentKind::Reverb,
        ComponentKind::Distortion,
        ComponentKind::Compressor,
        ComponentKind::Chorus,
    ];

    /// The keyword used for this kind in documents.
    pub fn name(self) -> &'static str {
        match self {
            ComponentKind::Oscillator => "oscillator",
            ComponentKind::Lfo => "lfo",
            ComponentKind::Envelope => "envelope",
            ComponentKind::Noise => "noise",
            ComponentKind::Filter => "filter",
            ComponentKind::Delay => "delay",
            ComponentKind::Reverb => "reverb",
            ComponentKind::Distortion => "distortion",
            ComponentKind::Compressor => "compressor",
            ComponentKind::Chorus => "chorus",
        }
    }

    pub fn from_name(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == word)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kinds of scope-creating declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Master,
    Note,
    Key,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 3] = [TriggerKind::Master, TriggerKind::Note, TriggerKind::Key];

    pub fn name(self) -> &'static str {
        match self {
            TriggerKind::Master => "master",
            TriggerKind::Note => "note",
            TriggerKind::Key => "key",
        }
    }

    pub fn from_name(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == word)
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a component does in the signal chain. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Source,
    Modulator,
    Filter,
    Effect,
    Dynamics,
}

/// The shape of an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    Number,
    Integer,
    Percentage,
    TimeMs,
    TimeSec,
    Frequency,
    Enum,
    VariableRef,
    ComponentRef,
    String,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::Number
                | ValueType::Integer
                | ValueType::Percentage
                | ValueType::TimeMs
                | ValueType::TimeSec
                | ValueType::Frequency
        )
    }
}

/// Reference kinds an attribute may hold in place of a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Variable,
    Component,
}

/// External tables an enum attribute can draw its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Chords,
}

/// Schema for a single attribute of a component or trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub values_from: Option<ValueSource>,
    #[serde(default)]
    pub default: Option<Scalar>,
    #[serde(default)]
    pub can_reference: Vec<RefKind>,
    #[serde(default)]
    pub accepts_components: Vec<ComponentKind>,
    #[serde(default)]
    pub accepts_modulation: Vec<ComponentKind>,
}

impl AttributeSchema {
    /// Whether the attribute's value itself is a component reference.
    pub fn is_reference_typed(&self) -> bool {
        self.value_type == ValueType::ComponentRef || !self.accepts_components.is_empty()
    }

    /// Whether other components may be attached to this attribute as modulation.
    pub fn receives_modulation(&self) -> bool {
        !self.accepts_modulation.is_empty()
    }

    pub fn accepts_component(&self, kind: ComponentKind) -> bool {
        self.accepts_components.contains(&kind)
    }

    pub fn accepts_modulator(&self, kind: ComponentKind) -> bool {
        self.accepts_modulation.contains(&kind)
    }

    pub fn allows_variables(&self) -> bool {
        self.value_type == ValueType::VariableRef || self.can_reference.contains(&RefKind::Variable)
    }

    /// Allowed enum values, including those drawn from an external table.
    pub fn allowed_values(&self) -> Vec<&str> {
        let mut values: Vec<&str> = self.values.iter().map(String::as_str).collect();
        if let Some(ValueSource::Chords) = self.values_from {
            for name in chords::chord_names() {
                values.push(name);
            }
        }
        values
    }

    /// The declared default, or a type-appropriate zero for numeric attributes.
    pub fn default_value(&self) -> Option<Scalar> {
        match &self.default {
            Some(value) => Some(value.clone()),
            None if self.value_type.is_numeric() => {
                let lo = self.min.unwrap_or(f64::MIN);
                let hi = self.max.unwrap_or(f64::MAX);
                Some(Scalar::Number(0.0_f64.max(lo).min(hi)))
            }
            None => self.allowed_values().first().map(|v| Scalar::Text(v.to_string())),
        }
    }
}

/// Schema for a component kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSchema {
    pub role: Role,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSchema>,
}

/// Schema for a trigger kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerSchema {
    #[serde(default)]
    pub requires_name: bool,
    #[serde(default)]
    pub has_attributes: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeSchema>,
}

/// The full catalog of component and trigger kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub components: BTreeMap<ComponentKind, ComponentSchema>,
    #[serde(default)]
    pub triggers: BTreeMap<TriggerKind, TriggerSchema>,
}

impl SchemaCatalog {
    /// The catalog embedded in the crate.
    pub fn builtin() -> Self {
        Self::from_yaml(BUILTIN_CATALOG).expect("embedded schema catalog is valid")
    }

    /// Parse a catalog from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let catalog: SchemaCatalog = serde_yaml::from_str(yaml)?;
        if catalog.components.is_empty() {
            return Err(SchemaError::Empty);
        }
        Ok(catalog)
    }

    /// Load a catalog from a YAML file.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn component(&self, kind: ComponentKind) -> Option<&ComponentSchema> {
        self.components.get(&kind)
    }

    pub fn trigger(&self, kind: TriggerKind) -> Option<&TriggerSchema> {
        self.triggers.get(&kind)
    }

    /// The component kind named by `word`, if the catalog declares it.
    pub fn component_kind(&self, word: &str) -> Option<ComponentKind> {
        ComponentKind::from_name(word).filter(|k| self.components.contains_key(k))
    }

    /// The trigger kind named by `word`, if the catalog declares it.
    pub fn trigger_kind(&self, word: &str) -> Option<TriggerKind> {
        TriggerKind::from_name(word).filter(|k| self.triggers.contains_key(k))
    }

    pub fn component_attribute(&self, kind: ComponentKind, name: &str) -> Option<&AttributeSchema> {
        self.component(kind)?.attributes.get(name)
    }

    pub fn trigger_attribute(&self, kind: TriggerKind, name: &str) -> Option<&AttributeSchema> {
        self.trigger(kind)?.attributes.get(name)
    }

    /// Whether any component or trigger declares an attribute with this name.
    pub fn is_attribute_name(&self, name: &str) -> bool {
        self.components
            .values()
            .any(|c| c.attributes.contains_key(name))
            || self
                .triggers
                .values()
                .any(|t| t.attributes.contains_key(name))
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
