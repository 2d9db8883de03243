//! Scopes: the global scope and trigger scopes keyed by `master`,
//! `note_<name>`, and `key_<name>`.

use std::fmt;

use crate::schema::TriggerKind;

/// Identifies a trigger scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TriggerKey {
    kind: TriggerKind,
    name: Option<String>,
}

impl TriggerKey {
    pub fn new(kind: TriggerKind, name: Option<String>) -> Self {
        Self { kind, name }
    }

    pub fn master() -> Self {
        Self::new(TriggerKind::Master, None)
    }

    pub fn note(name: impl Into<String>) -> Self {
        Self::new(TriggerKind::Note, Some(name.into()))
    }

    pub fn key(name: impl Into<String>) -> Self {
        Self::new(TriggerKind::Key, Some(name.into()))
    }

    pub fn kind(&self) -> TriggerKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Parse a composite key such as `note_c4` or `master`.
    pub fn parse(composite: &str) -> Option<Self> {
        if let Some(kind) = TriggerKind::from_name(composite) {
            return Some(Self::new(kind, None));
        }
        let (kind, name) = composite.split_once('_')?;
        let kind = TriggerKind::from_name(kind)?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(kind, Some(name.to_string())))
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}_{name}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// A region of the document that owns components and variables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    Global,
    Trigger(TriggerKey),
}

impl Scope {
    pub fn trigger_key(&self) -> Option<&TriggerKey> {
        match self {
            Scope::Global => None,
            Scope::Trigger(key) => Some(key),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Trigger(key) => write!(f, "{key}"),
        }
    }
}

impl From<TriggerKey> for Scope {
    fn from(key: TriggerKey) -> Self {
        Scope::Trigger(key)
    }
}
