//! Action collection: turns a trigger scope's attributes into an ordered,
//! consumer-agnostic list of instructions.
//!
//! A rendering backend folds `SetValue` actions into parameter offsets and
//! `ApplyModulation` actions into live modulation sources, without ever
//! looking at scopes, schemas, or the name registry.

use std::fmt;

use log::warn;

use super::scope::{Scope, TriggerKey};
use super::store::InstanceStore;
use super::value::ComponentRef;

/// Unit a `SetValue` action is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Pitch offset in cents, applied additively.
    Cents,
    /// Level multiplier in percent, applied multiplicatively.
    Percentage,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Cents => f.write_str("cents"),
            Unit::Percentage => f.write_str("%"),
        }
    }
}

/// Parameters the action vocabulary understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTarget {
    Pitch,
    Volume,
}

impl ActionTarget {
    /// Map an attribute name to an action target. Attributes without an
    /// entry here produce no actions.
    pub fn for_attribute(name: &str) -> Option<Self> {
        match name {
            "pitch" => Some(ActionTarget::Pitch),
            "volume" => Some(ActionTarget::Volume),
            _ => None,
        }
    }

    pub fn unit(self) -> Unit {
        match self {
            ActionTarget::Pitch => Unit::Cents,
            ActionTarget::Volume => Unit::Percentage,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ActionTarget::Pitch => "pitch",
            ActionTarget::Volume => "volume",
        }
    }
}

impl fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A discrete instruction derived from a scope's attributes.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetValue {
        target: ActionTarget,
        value: f64,
        unit: Unit,
    },
    ApplyModulation {
        target: ActionTarget,
        modulator: ComponentRef,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::SetValue {
                target,
                value,
                unit,
            } => write!(f, "set {target} {value} {unit}"),
            Action::ApplyModulation { target, modulator } => {
                write!(f, "modulate {target} with {modulator}")
            }
        }
    }
}

/// Actions folded into the offsets a renderer applies to a voice.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamOffsets {
    /// Additive pitch offset in cents.
    pub cents: f64,
    /// Multiplicative gain, 1.0 = unchanged.
    pub gain: f64,
    pub modulations: Vec<(ActionTarget, ComponentRef)>,
}

impl Default for ParamOffsets {
    fn default() -> Self {
        Self {
            cents: 0.0,
            gain: 1.0,
            modulations: Vec::new(),
        }
    }
}

impl ParamOffsets {
    /// Fold a sequence of actions, in order.
    pub fn fold(actions: &[Action]) -> Self {
        actions.iter().fold(Self::default(), |mut acc, action| {
            match action {
                Action::SetValue { value, unit, .. } => match unit {
                    Unit::Cents => acc.cents += value,
                    Unit::Percentage => acc.gain *= value / 100.0,
                },
                Action::ApplyModulation { target, modulator } => {
                    acc.modulations.push((*target, modulator.clone()))
                }
            }
            acc
        })
    }
}

impl InstanceStore {
    /// Collect the actions a trigger scope asks for.
    ///
    /// For every attribute with an action target: a `SetValue` if the value
    /// resolves to a number, then an `ApplyModulation` if a resolved
    /// modulation is attached.
    pub fn collect_actions(&self, key: &TriggerKey) -> Vec<Action> {
        let Some(trigger) = self.trigger(key) else {
            return Vec::new();
        };
        let scope = Scope::Trigger(key.clone());
        let mut actions = Vec::new();

        for (name, attr) in trigger.attributes() {
            let Some(target) = ActionTarget::for_attribute(name) else {
                continue;
            };

            if let Some(value) = &attr.value {
                match self.numeric_value(value, &scope) {
                    Ok(n) => actions.push(Action::SetValue {
                        target,
                        value: n,
                        unit: target.unit(),
                    }),
                    Err(e) => warn!("{key}: skipping {name} = {value}: {e}"),
                }
            }

            if let Some(modulator) = attr.modulation.filter(ComponentRef::is_resolved) {
                actions.push(Action::ApplyModulation { target, modulator });
            }
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::value::{Scalar, ValueKind};
    use crate::schema::ComponentKind;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn value_then_modulation() {
        let mut store = InstanceStore::new();
        let key = TriggerKey::key("f");
        store.set_trigger_attribute(&key, "pitch", ValueKind::number(0.0));
        store.set_trigger_attribute_modulation(
            &key,
            "pitch",
            Some(ComponentRef::resolved("vibrato", ComponentKind::Lfo)),
        );
        assert_eq!(
            store.collect_actions(&key),
            vec![
                Action::SetValue {
                    target: ActionTarget::Pitch,
                    value: 0.0,
                    unit: Unit::Cents,
                },
                Action::ApplyModulation {
                    target: ActionTarget::Pitch,
                    modulator: ComponentRef::resolved("vibrato", ComponentKind::Lfo),
                },
            ]
        );
    }

    #[test]
    fn unknown_attributes_produce_nothing() {
        let mut store = InstanceStore::new();
        let key = TriggerKey::note("c4");
        store.set_trigger_attribute(&key, "velocity", ValueKind::number(64.0));
        assert!(store.collect_actions(&key).is_empty());
    }

    #[test]
    fn missing_scope_produces_nothing() {
        let store = InstanceStore::new();
        assert!(store.collect_actions(&TriggerKey::key("z")).is_empty());
    }

    #[test]
    fn unresolved_modulation_is_skipped() {
        let mut store = InstanceStore::new();
        let key = TriggerKey::master();
        store.set_trigger_attribute_modulation(
            &key,
            "volume",
            Some(ComponentRef::unresolved("ghost")),
        );
        assert!(store.collect_actions(&key).is_empty());
    }

    #[test]
    fn variable_values_resolve_in_trigger_scope() {
        let mut store = InstanceStore::new();
        let key = TriggerKey::key("g");
        store
            .add_variable("level", Scalar::Number(80.0), &Scope::Global, None, None, None)
            .unwrap();
        store.set_variable_override("level", Scalar::Number(150.0), &key);
        store.set_trigger_attribute(&key, "volume", ValueKind::VariableRef("level".into()));
        assert_eq!(
            store.collect_actions(&key),
            vec![Action::SetValue {
                target: ActionTarget::Volume,
                value: 150.0,
                unit: Unit::Percentage,
            }]
        );
    }

    #[test]
    fn fold_offsets() {
        let offsets = ParamOffsets::fold(&[
            Action::SetValue {
                target: ActionTarget::Pitch,
                value: 700.0,
                unit: Unit::Cents,
            },
            Action::SetValue {
                target: ActionTarget::Volume,
                value: 50.0,
                unit: Unit::Percentage,
            },
            Action::SetValue {
                target: ActionTarget::Volume,
                value: 120.0,
                unit: Unit::Percentage,
            },
            Action::ApplyModulation {
                target: ActionTarget::Pitch,
                modulator: ComponentRef::resolved("vibrato", ComponentKind::Lfo),
            },
        ]);
        assert_approx_eq!(offsets.cents, 700.0);
        assert_approx_eq!(offsets.gain, 0.6);
        assert_eq!(offsets.modulations.len(), 1);
    }
}
