//! Failure taxonomy for the resolution pipeline.
//!
//! Three tiers, per the propagation policy:
//!
//! - [`FailureCode`]: expected, user-facing requirement failures. Returned
//!   as tagged codes inside the success channel, never thrown, and always
//!   before any persistent mutation.
//! - [`UseWarning`]: recoverable problems (a malformed conditional
//!   formula). The offending piece is skipped and the invocation proceeds.
//! - [`CoreError`]: fatal. The acting entity's basic math must be
//!   trustworthy, so a broken core attack/damage/save formula aborts the
//!   whole invocation with no resource consumption.

/// Expected requirement failure, identified for display.
///
/// The string form is stable (`INSUFFICIENT_CHARGES` etc.) so hosts can key
/// localization off it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum FailureCode {
    /// The invoking user may not act through this actor.
    NoPermission,
    /// The source item is disabled.
    SourceDisabled,
    /// The physical item stack is empty.
    NoQuantity,
    /// The self-charge pool or charge pool cannot cover the cost.
    InsufficientCharges,
    /// Every attack lost its ammunition assignment.
    AmmoDepleted,
}

/// Recoverable problem surfaced to the user while the invocation proceeds.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UseWarning {
    #[error("conditional '{conditional}' has a malformed formula '{formula}'; skipped")]
    ConditionalFormula {
        conditional: String,
        formula: String,
    },
}

/// Fatal pipeline error. Guaranteed to occur before resource consumption.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("formula '{formula}' failed to evaluate ({role})")]
    Formula { role: FormulaRole, formula: String },
}

/// Which core formula failed, for error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum FormulaRole {
    Attack,
    Damage,
    AttackCount,
    AttackBonus,
    SaveDc,
    ChargeCost,
}

impl CoreError {
    pub fn formula(role: FormulaRole, formula: impl Into<String>) -> Self {
        Self::Formula {
            role,
            formula: formula.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_codes_have_stable_names() {
        let name: &'static str = FailureCode::InsufficientCharges.into();
        assert_eq!(name, "INSUFFICIENT_CHARGES");
        assert_eq!(FailureCode::AmmoDepleted.to_string(), "AMMO_DEPLETED");
        assert_eq!(FailureCode::NoPermission.to_string(), "NO_PERMISSION");
    }
}
