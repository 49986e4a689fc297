//! Use configuration.
//!
//! The configuration is a closed struct: every recognized option is an
//! explicit field, and deserialization rejects unknown keys instead of
//! silently ignoring them. Interactive hosts produce one of these from
//! their dialog; skipping the dialog synthesizes deterministic defaults.

use crate::action::ActionDefinition;
use crate::snapshot::{HeldMode, ItemId};

bitflags::bitflags! {
    /// Combat role toggles a user can enable for one invocation.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct RoleFlags: u8 {
        /// Trade attack bonus for damage, scaling with BAB.
        const POWER_ATTACK = 1 << 0;
        /// +1 attack and damage at short range.
        const POINT_BLANK = 1 << 1;
        /// One extra ranged attack; every attack takes -2.
        const RAPID_SHOT = 1 << 2;
        /// Fire an extra arrow with the first attack's damage.
        const MANYSHOT = 1 << 3;
        /// One extra attack at the full bonus, inserted after the primary.
        const HASTE = 1 << 4;
    }
}

/// House rules that change resolution mechanics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct HouseRules {
    /// When false, critical threats are not rolled for confirmation: they
    /// auto-confirm against the provided target defense instead.
    pub confirm_criticals: bool,
}

impl Default for HouseRules {
    fn default() -> Self {
        Self {
            confirm_criticals: true,
        }
    }
}

/// Closed configuration struct driving one invocation.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct UseConfiguration {
    /// Resolve the full multi-attack sequence instead of a single attack.
    pub full_attack: bool,
    /// Replace the base attack die (`"1d20"`) for this invocation.
    pub die_override: Option<String>,
    pub roles: RoleFlags,
    /// Override the held-weapon mode recorded in the actor snapshot.
    pub held_override: Option<HeldMode>,
    /// Explicit ability damage multiplier. Wins over the secondary
    /// natural-attack default and the held-mode default.
    pub ability_mult_override: Option<f64>,
    /// Treat the natural attack as primary/secondary regardless of the
    /// action definition.
    pub natural_primary_override: Option<bool>,
    /// Additional attack roll fragments chosen in the dialog.
    pub extra_attack_fragments: Vec<String>,
    /// Additional damage roll fragments chosen in the dialog.
    pub extra_damage_fragments: Vec<String>,
    /// Indices into the action's conditionals catalogue.
    pub conditionals: Vec<usize>,
    /// Explicit per-attack ammunition choice; `None` falls back to
    /// sequential assignment from the item's stacks.
    pub ammo_assignments: Option<Vec<Option<ItemId>>>,
    /// Known defense value of the target, used for confirmation outcomes
    /// and auto-confirmed criticals.
    pub target_defense: Option<i32>,
}

impl UseConfiguration {
    /// Deterministic defaults used when the configuration dialog is
    /// skipped: a single attack with the action's default-enabled
    /// conditionals pre-selected.
    pub fn defaults_for(action: &ActionDefinition, full_attack: bool) -> Self {
        let conditionals = action
            .conditionals
            .iter()
            .enumerate()
            .filter(|(_, c)| c.default_on)
            .map(|(i, _)| i)
            .collect();

        Self {
            full_attack,
            conditionals,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Conditional, ConditionalModifier, ConditionalTarget};

    #[test]
    fn defaults_preselect_default_on_conditionals() {
        let action = ActionDefinition::new("bite")
            .with_conditional(Conditional::new("optional").with_modifier(
                ConditionalModifier::new("1", ConditionalTarget::Attack),
            ))
            .with_conditional(
                Conditional::new("always")
                    .default_on()
                    .with_modifier(ConditionalModifier::new("2", ConditionalTarget::Damage)),
            );

        let config = UseConfiguration::defaults_for(&action, false);
        assert_eq!(config.conditionals, vec![1]);
        assert!(!config.full_attack);
    }
}
