//! Combat role math: power attack and ability damage multipliers.

use crate::action::ActionDefinition;
use crate::config::UseConfiguration;
use crate::snapshot::HeldMode;

/// Fixed attack penalty on secondary natural attacks.
pub const SECONDARY_ATTACK_PENALTY: i32 = -5;

/// Resolved power attack trade-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PowerAttack {
    /// Attack roll penalty (negative).
    pub penalty: i32,
    /// Damage bonus (positive).
    pub damage_bonus: i32,
}

/// Compute the power attack trade-off.
///
/// The penalty deepens by 1 per 4 points of BAB. The damage side is the
/// penalty magnitude times a multiplier taken from the wield mode, or from
/// primariness for natural attacks: two-handed x3, one-handed and primary
/// natural x2, off-hand and secondary natural x1.
pub fn power_attack(bab: i32, held: HeldMode, secondary_natural: Option<bool>) -> PowerAttack {
    let magnitude = 1 + bab.max(0) / 4;

    let mult = match secondary_natural {
        Some(true) => 1,
        Some(false) => 2,
        None => match held {
            HeldMode::TwoHanded => 3,
            HeldMode::OneHanded => 2,
            HeldMode::OffHand => 1,
        },
    };

    PowerAttack {
        penalty: -magnitude,
        damage_bonus: magnitude * mult,
    }
}

/// Whether this invocation resolves as a secondary natural attack.
///
/// The configuration override wins over the action definition; non-natural
/// actions are never secondary.
pub fn is_secondary_natural(action: &ActionDefinition, config: &UseConfiguration) -> Option<bool> {
    let natural = action.natural?;
    Some(match config.natural_primary_override {
        Some(primary) => !primary,
        None => !natural.primary,
    })
}

/// Resolve the ability damage multiplier for this invocation.
///
/// `held` is the wield mode after configuration overrides have been applied
/// to the snapshot. Precedence (an explicit dialog override always wins,
/// including over the secondary natural-attack default):
///
/// 1. `config.ability_mult_override`
/// 2. secondary natural attack default (0.5)
/// 3. the action author's fixed multiplier
/// 4. held-mode default
pub fn ability_damage_mult(
    action: &ActionDefinition,
    config: &UseConfiguration,
    held: HeldMode,
) -> f64 {
    if let Some(mult) = config.ability_mult_override {
        return mult;
    }
    if is_secondary_natural(action, config) == Some(true) {
        return 0.5;
    }
    if let Some(mult) = action.ability.damage_mult {
        return mult;
    }
    held.ability_damage_mult()
}
