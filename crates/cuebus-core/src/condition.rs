use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boolean expression gating whether a command fires on a given iteration.
///
/// Stored and sent over the wire in the legacy object shape:
///
/// | JSON                          | Variant                                   |
/// |-------------------------------|-------------------------------------------|
/// | `{}`                          | `Always`                                  |
/// | `{"mod": 3}`                  | `Leaf { modulo: 3 }`                      |
/// | `{"mod": 2, "AND": {...}}`    | `And { modulo: Some(2), child }`          |
/// | `{"mod": 2, "OR": {...}}`     | `Or { modulo: Some(2), child }`           |
///
/// An object carrying both `AND` and `OR` is rejected while decoding, so an
/// ambiguous node can never reach the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub enum Condition {
    #[default]
    Always,
    Leaf {
        modulo: u64,
    },
    And {
        modulo: Option<u64>,
        child: Box<Condition>,
    },
    Or {
        modulo: Option<u64>,
        child: Box<Condition>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
    /// Both `AND` and `OR` were set on the same node.
    #[error("condition node sets both AND and OR")]
    AmbiguousOperator,
}

impl Condition {
    pub fn leaf(modulo: u64) -> Self {
        Condition::Leaf { modulo }
    }

    pub fn and(modulo: Option<u64>, child: Condition) -> Self {
        Condition::And { modulo, child: Box::new(child) }
    }

    pub fn or(modulo: Option<u64>, child: Condition) -> Self {
        Condition::Or { modulo, child: Box::new(child) }
    }

    /// Decode a stored condition column. `None` and `"{}"` both mean `Always`.
    pub fn from_json(raw: Option<&str>) -> Result<Self, serde_json::Error> {
        match raw {
            None => Ok(Condition::Always),
            Some(s) if s.trim().is_empty() => Ok(Condition::Always),
            Some(s) => serde_json::from_str(s),
        }
    }
}

/// Loose object shape used only at the serialization boundary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawCondition {
    #[serde(rename = "mod", default, skip_serializing_if = "Option::is_none")]
    modulo: Option<u64>,
    #[serde(rename = "AND", default, skip_serializing_if = "Option::is_none")]
    and: Option<Box<RawCondition>>,
    #[serde(rename = "OR", default, skip_serializing_if = "Option::is_none")]
    or: Option<Box<RawCondition>>,
}

impl TryFrom<RawCondition> for Condition {
    type Error = ConditionError;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        match (raw.modulo, raw.and, raw.or) {
            (_, Some(_), Some(_)) => Err(ConditionError::AmbiguousOperator),
            (modulo, Some(child), None) => Ok(Condition::And {
                modulo,
                child: Box::new(Condition::try_from(*child)?),
            }),
            (modulo, None, Some(child)) => Ok(Condition::Or {
                modulo,
                child: Box::new(Condition::try_from(*child)?),
            }),
            (Some(modulo), None, None) => Ok(Condition::Leaf { modulo }),
            (None, None, None) => Ok(Condition::Always),
        }
    }
}

impl From<Condition> for RawCondition {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::Always => RawCondition::default(),
            Condition::Leaf { modulo } => RawCondition { modulo: Some(modulo), ..Default::default() },
            Condition::And { modulo, child } => RawCondition {
                modulo,
                and: Some(Box::new(RawCondition::from(*child))),
                or: None,
            },
            Condition::Or { modulo, child } => RawCondition {
                modulo,
                and: None,
                or: Some(Box::new(RawCondition::from(*child))),
            },
        }
    }
}
