//! Attribute and variable value types.
//!
//! Attribute values are stored in one of two shapes: the older single-value
//! form and the layered `{ value, modulation }` form. [`StoredAttribute::normalize`]
//! is the only way to read either of them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::ComponentKind;

/// A plain literal: a number or a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

/// A reference to a named component. `kind` is `None` until resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRef {
    pub name: String,
    pub kind: Option<ComponentKind>,
}

impl ComponentRef {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
        }
    }

    pub fn resolved(name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            name: name.into(),
            kind: Some(kind),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.kind.is_some()
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Some(kind) => write!(f, "{} ({kind})", self.name),
            None => write!(f, "{} (unresolved)", self.name),
        }
    }
}

/// The value part of an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    Literal(Scalar),
    VariableRef(String),
    ComponentRef(ComponentRef),
    /// Arithmetic source text, evaluated on demand in the owner's scope.
    Expression(String),
    /// A bare word that may name a component or variable declared later.
    Unresolved(String),
}

impl ValueKind {
    pub fn number(n: f64) -> Self {
        ValueKind::Literal(Scalar::Number(n))
    }

    pub fn text(s: impl Into<String>) -> Self {
        ValueKind::Literal(Scalar::Text(s.into()))
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Literal(s) => write!(f, "{s}"),
            ValueKind::VariableRef(name) => write!(f, "${name}"),
            ValueKind::ComponentRef(r) => write!(f, "@{r}"),
            ValueKind::Expression(src) => write!(f, "({src})"),
            ValueKind::Unresolved(word) => write!(f, "{word}?"),
        }
    }
}

/// The normalized view of an attribute.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeValue {
    pub value: Option<ValueKind>,
    pub modulation: Option<ComponentRef>,
}

impl AttributeValue {
    pub fn new(value: ValueKind) -> Self {
        Self {
            value: Some(value),
            modulation: None,
        }
    }

    pub fn with_modulation(mut self, modulation: ComponentRef) -> Self {
        self.modulation = Some(modulation);
        self
    }
}

/// An attribute as held in storage.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredAttribute {
    /// Older form with no modulation slot.
    Single(ValueKind),
    Layered(AttributeValue),
}

impl StoredAttribute {
    /// Read the attribute as `{ value, modulation }`.
    pub fn normalize(&self) -> AttributeValue {
        match self {
            StoredAttribute::Single(value) => AttributeValue::new(value.clone()),
            StoredAttribute::Layered(attr) => attr.clone(),
        }
    }

    fn into_layered(self) -> AttributeValue {
        match self {
            StoredAttribute::Single(value) => AttributeValue::new(value),
            StoredAttribute::Layered(attr) => attr,
        }
    }

    /// Replace the value, keeping any modulation.
    pub fn replace_value(self, value: Option<ValueKind>) -> Self {
        let mut attr = self.into_layered();
        attr.value = value;
        StoredAttribute::Layered(attr)
    }

    /// Replace the modulation, keeping the value.
    pub fn replace_modulation(self, modulation: Option<ComponentRef>) -> Self {
        let mut attr = self.into_layered();
        attr.modulation = modulation;
        StoredAttribute::Layered(attr)
    }
}

impl From<ValueKind> for StoredAttribute {
    fn from(value: ValueKind) -> Self {
        StoredAttribute::Single(value)
    }
}

impl From<AttributeValue> for StoredAttribute {
    fn from(attr: AttributeValue) -> Self {
        StoredAttribute::Layered(attr)
    }
}
