//! Shared per-invocation context.

use std::collections::BTreeMap;

use crate::action::CritTiming;
use crate::attacks::AttackEntry;
use crate::chat_attack::ChatAttack;
use crate::error::UseWarning;
use crate::snapshot::{ItemId, RollData};

/// A formula fragment with its crit-timing gate.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fragment {
    pub formula: String,
    pub timing: CritTiming,
}

impl Fragment {
    pub fn new(formula: impl Into<String>) -> Self {
        Self {
            formula: formula.into(),
            timing: CritTiming::Always,
        }
    }

    pub fn with_timing(formula: impl Into<String>, timing: CritTiming) -> Self {
        Self {
            formula: formula.into(),
            timing,
        }
    }
}

/// Conditional formula fragments routed by target roll.
///
/// Only attack and damage contributions stay textual; effect, misc and
/// size contributions are pre-summed into snapshot fields at resolution
/// time because later pipeline stages consume them numerically.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentBuckets {
    pub attack: Vec<Fragment>,
    pub damage: Vec<Fragment>,
}

/// The single mutable record threaded through one invocation.
///
/// Created at invocation start, mutated in place by every pipeline stage,
/// and captured into the result bundle at the end. Exactly one exists per
/// invocation; it is never shared across concurrent invocations.
#[derive(Clone, Debug, Default)]
pub struct SharedUseContext {
    pub roll_data: RollData,
    /// Ordered attack list; the first entry is the primary attack.
    pub attacks: Vec<AttackEntry>,
    /// Dialog- and role-derived attack roll fragments.
    pub extra_attack_fragments: Vec<String>,
    /// Dialog- and role-derived damage roll fragments.
    pub extra_damage_fragments: Vec<String>,
    /// Fragments contributed by resolved conditionals.
    pub conditional_fragments: FragmentBuckets,
    /// Units of non-abundant ammunition actually consumed, by stack.
    pub ammo_ledger: BTreeMap<ItemId, u32>,
    /// Recoverable problems to surface alongside the result.
    pub warnings: Vec<UseWarning>,
    /// Resolved per-attack results, in attack-list order.
    pub chat_attacks: Vec<ChatAttack>,
}

impl SharedUseContext {
    pub fn new(roll_data: RollData) -> Self {
        Self {
            roll_data,
            ..Self::default()
        }
    }

    /// Record one unit of non-abundant ammunition use.
    pub fn record_ammo_use(&mut self, stack: ItemId) {
        *self.ammo_ledger.entry(stack).or_insert(0) += 1;
    }

    /// All attack roll fragments applicable at the given criticality, in
    /// contribution order (dialog extras first, then conditionals).
    pub fn attack_fragments(&self, critical: bool) -> Vec<&str> {
        self.extra_attack_fragments
            .iter()
            .map(String::as_str)
            .chain(
                self.conditional_fragments
                    .attack
                    .iter()
                    .filter(|f| f.timing.applies(critical))
                    .map(|f| f.formula.as_str()),
            )
            .collect()
    }

    /// All damage roll fragments applicable at the given criticality.
    pub fn damage_fragments(&self, critical: bool) -> Vec<&str> {
        self.extra_damage_fragments
            .iter()
            .map(String::as_str)
            .chain(
                self.conditional_fragments
                    .damage
                    .iter()
                    .filter(|f| f.timing.applies(critical))
                    .map(|f| f.formula.as_str()),
            )
            .collect()
    }
}
