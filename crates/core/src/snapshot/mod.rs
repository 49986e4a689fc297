//! Point-in-time snapshots used as formula evaluation context.
//!
//! [`RollData`] captures the acting entity's computed attributes once per
//! invocation. It is scratch space: pipeline stages may write resolved
//! values into it (conditional totals, power attack bonuses) so later
//! formulas see consistent numbers, but it is never written back to
//! persistent state.
//!
//! Transient per-evaluation variables (iterative attack counters, critical
//! repetition counters) never enter the snapshot at all; they live in a
//! short-lived [`EvalContext`] layer that is discarded with the context.

mod actor;
mod context;

pub use actor::{ActorSnapshot, AmmoSnapshot, ItemId, ItemSnapshot, UsesPool};
pub use context::EvalContext;

use std::collections::BTreeMap;

/// How the weapon behind an action is currently wielded.
///
/// Drives the ability damage multiplier and the power attack trade-off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum HeldMode {
    #[default]
    OneHanded,
    TwoHanded,
    OffHand,
}

impl HeldMode {
    /// Default ability damage multiplier for this mode.
    pub fn ability_damage_mult(self) -> f64 {
        match self {
            HeldMode::OneHanded => 1.0,
            HeldMode::TwoHanded => 1.5,
            HeldMode::OffHand => 0.5,
        }
    }
}

/// One ability score with its derived modifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilityScore {
    pub score: i32,
}

impl AbilityScore {
    pub const fn new(score: i32) -> Self {
        Self { score }
    }

    /// Standard d20 modifier: floor((score - 10) / 2), correct for
    /// below-10 scores.
    pub fn modifier(self) -> i32 {
        (self.score - 10).div_euclid(2)
    }
}

impl Default for AbilityScore {
    fn default() -> Self {
        Self { score: 10 }
    }
}

/// The six ability scores.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Abilities {
    pub str_: AbilityScore,
    pub dex: AbilityScore,
    pub con: AbilityScore,
    pub int: AbilityScore,
    pub wis: AbilityScore,
    pub cha: AbilityScore,
}

impl Abilities {
    /// Score for one ability, by scaling rule.
    pub fn score_of(&self, ability: crate::action::Ability) -> AbilityScore {
        use crate::action::Ability;
        match ability {
            Ability::Str => self.str_,
            Ability::Dex => self.dex,
            Ability::Con => self.con,
            Ability::Int => self.int,
            Ability::Wis => self.wis,
            Ability::Cha => self.cha,
        }
    }

    fn get(&self, name: &str) -> Option<AbilityScore> {
        match name {
            "str" => Some(self.str_),
            "dex" => Some(self.dex),
            "con" => Some(self.con),
            "int" => Some(self.int),
            "wis" => Some(self.wis),
            "cha" => Some(self.cha),
            _ => None,
        }
    }
}

/// Scalar combat attributes copied into the snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attributes {
    /// Base attack bonus.
    pub bab: i32,
    /// Caster level (conditionals may raise it for one invocation).
    pub cl: i32,
    /// Size modifier applied to attack rolls. Conditional `Size`
    /// contributions adjust this immediately, not deferred.
    pub size: i32,
}

/// Per-invocation evaluation snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RollData {
    pub abilities: Abilities,
    pub attributes: Attributes,
    /// Wield mode after configuration overrides.
    pub held: HeldMode,
    /// Die override supplied by the caller (replaces the base `1d20`).
    pub die_override: Option<String>,
    /// Save DC adjustment folded in from `Effect(Dc)` conditionals.
    pub dc_bonus: i32,
    /// Charge cost adjustment folded in from `Misc(Charges)` conditionals.
    pub charge_cost_bonus: i64,
    /// Named values injected by the pipeline so later formulas can
    /// reference them (`powerAttackBonus`, `conditionals.<name>`).
    pub vars: BTreeMap<String, f64>,
}

impl RollData {
    /// Build the snapshot for one invocation.
    pub fn for_use(actor: &ActorSnapshot, die_override: Option<String>) -> Self {
        Self {
            abilities: actor.abilities,
            attributes: actor.attributes,
            held: actor.held,
            die_override,
            ..Self::default()
        }
    }

    /// The base attack die for this invocation.
    pub fn base_die(&self) -> &str {
        self.die_override.as_deref().unwrap_or("1d20")
    }

    /// Inject a named value visible to later formula evaluations.
    pub fn set_var(&mut self, name: impl Into<String>, value: f64) {
        self.vars.insert(name.into(), value);
    }

    /// Resolve a dotted variable path against the snapshot.
    pub fn resolve(&self, path: &str) -> Option<f64> {
        match path {
            "bab" => return Some(self.attributes.bab as f64),
            "cl" => return Some(self.attributes.cl as f64),
            "size" => return Some(self.attributes.size as f64),
            "dcBonus" => return Some(self.dc_bonus as f64),
            _ => {}
        }

        if let Some(rest) = path.strip_prefix("abilities.") {
            let (ability, field) = rest.split_once('.')?;
            let score = self.abilities.get(ability)?;
            return match field {
                "score" => Some(score.score as f64),
                "mod" => Some(score.modifier() as f64),
                _ => None,
            };
        }

        self.vars.get(path).copied()
    }
}
