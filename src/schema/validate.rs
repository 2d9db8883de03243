//! Literal validation against attribute schemas.

use super::{AttributeSchema, ValueType};
use crate::dsl::value::Scalar;

/// Outcome of checking a literal against an attribute schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    Accepted(Scalar),
    /// The literal was usable after adjustment (clamping, rounding).
    Adjusted {
        value: Scalar,
        warning: String,
    },
    Rejected(String),
}

/// Which side of a range a value fell outside of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Below(f64),
    Above(f64),
}

/// Clamp `n` into `[min, max]`, reporting which bound was hit.
pub fn clamp_to_range(n: f64, min: Option<f64>, max: Option<f64>) -> (f64, Option<Bound>) {
    if let Some(lo) = min {
        if n < lo {
            return (lo, Some(Bound::Below(lo)));
        }
    }
    if let Some(hi) = max {
        if n > hi {
            return (hi, Some(Bound::Above(hi)));
        }
    }
    (n, None)
}

impl AttributeSchema {
    /// Check a literal value for the attribute called `name`.
    pub fn check_literal(&self, name: &str, value: &Scalar) -> Check {
        match self.value_type {
            t if t.is_numeric() => self.check_number(name, value),
            ValueType::Enum => {
                let allowed = self.allowed_values();
                match value {
                    Scalar::Text(text) if allowed.contains(&text.as_str()) => {
                        Check::Accepted(value.clone())
                    }
                    _ => Check::Rejected(format!(
                        "`{value}` is not a valid {name}; expected one of: {}",
                        allowed.join(", ")
                    )),
                }
            }
            ValueType::ComponentRef => {
                Check::Rejected(format!("`{name}` expects a component name, got `{value}`"))
            }
            _ => Check::Accepted(value.clone()),
        }
    }

    fn check_number(&self, name: &str, value: &Scalar) -> Check {
        let Scalar::Number(n) = value else {
            return Check::Rejected(format!("`{name}` expects a number, got `{value}`"));
        };

        let mut warnings = Vec::new();
        let mut n = *n;
        if self.value_type == ValueType::Integer && n.fract() != 0.0 {
            warnings.push(format!("`{name}` is an integer; {n} rounded to {}", n.round()));
            n = n.round();
        }
        let (clamped, bound) = clamp_to_range(n, self.min, self.max);
        match bound {
            Some(Bound::Below(lo)) => {
                warnings.push(format!("{n} is below the minimum {lo} for `{name}`; clamped"))
            }
            Some(Bound::Above(hi)) => {
                warnings.push(format!("{n} is above the maximum {hi} for `{name}`; clamped"))
            }
            None => {}
        }

        if warnings.is_empty() {
            Check::Accepted(Scalar::Number(clamped))
        } else {
            Check::Adjusted {
                value: Scalar::Number(clamped),
                warning: warnings.join("; "),
            }
        }
    }
}
