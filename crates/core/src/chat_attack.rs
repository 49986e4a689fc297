//! Per-attack resolution.
//!
//! Turns one attack-list entry into a [`ChatAttack`]: attack roll, threat
//! detection, critical confirmation, damage groups and effect notes.
//!
//! Critical handling is an explicit two-phase sequence (resolve the normal
//! roll, then conditionally resolve the confirmation) rather than a
//! recursive self-call, so the two states stay visible in the control
//! flow. Core formula failures here are fatal to the whole invocation.

use crate::action::ActionDefinition;
use crate::attacks::AttackEntry;
use crate::error::{CoreError, FormulaRole};
use crate::formula::{FormulaOracle, compute_seed, join_fragments};
use crate::snapshot::{ActorSnapshot, EvalContext, ItemSnapshot};
use crate::snapshot::ItemId;
use crate::use_context::SharedUseContext;

/// One resolved attack roll.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackRoll {
    pub formula: String,
    /// Natural d20 result, for threat detection and display.
    pub natural: u32,
    pub total: i32,
    /// Whether the natural roll falls in the threat range.
    pub threat: bool,
}

/// One resolved damage group (normal or critical).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageRoll {
    pub formula: String,
    pub total: i64,
    /// Textual flavor, e.g. the damage type labels.
    pub flavor: String,
}

/// The resolved outcome of one attack-list entry.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChatAttack {
    pub label: String,
    /// `None` for entries without an attack roll (pure damage actions).
    pub attack: Option<AttackRoll>,
    pub critical_confirmation: Option<AttackRoll>,
    /// Whether the critical was confirmed (rolled or auto-confirmed).
    pub critical_confirmed: bool,
    /// Normal damage group.
    pub damage: Option<DamageRoll>,
    /// Additional critical damage group, present only on confirmation.
    pub critical_damage: Option<DamageRoll>,
    pub nonlethal: bool,
    pub ammo: Option<ItemId>,
    pub notes: Vec<String>,
}

impl ChatAttack {
    /// True iff at least one damage roll was requested, regardless of the
    /// resulting total.
    pub fn has_damage(&self) -> bool {
        self.damage.is_some()
    }

    /// Combined damage across the normal and critical groups.
    pub fn total_damage(&self) -> i64 {
        self.damage.as_ref().map_or(0, |d| d.total)
            + self.critical_damage.as_ref().map_or(0, |d| d.total)
    }
}

/// Invocation-wide inputs the resolver needs beyond the shared context.
///
/// Computed once by the orchestrator from configuration, house rules and
/// role math, so per-attack resolution stays pure.
#[derive(Clone, Copy, Debug)]
pub struct ResolutionPolicy {
    /// When false, threats auto-confirm against `target_defense` instead
    /// of rolling.
    pub confirm_criticals: bool,
    /// Known defense value of the target, if any.
    pub target_defense: Option<i32>,
    /// Ability modifier joining every attack roll.
    pub ability_attack_mod: i32,
    /// Pre-multiplied ability bonus joining every damage group.
    pub ability_damage_bonus: i64,
    /// Secondary natural attacks take the fixed attack penalty.
    pub secondary: bool,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            confirm_criticals: true,
            target_defense: None,
            ability_attack_mod: 0,
            ability_damage_bonus: 0,
            secondary: false,
        }
    }
}

/// Resolves attack-list entries against the shared context.
pub struct PerAttackResolver<'a, F: FormulaOracle + ?Sized> {
    pub action: &'a ActionDefinition,
    pub actor: &'a ActorSnapshot,
    pub item: &'a ItemSnapshot,
    pub policy: ResolutionPolicy,
    pub evaluator: &'a F,
    /// Invocation seed; per-roll seeds derive from it.
    pub seed: u64,
}

// Roll contexts for seed derivation.
const CTX_ATTACK: u32 = 0;
const CTX_CONFIRM: u32 = 1;
const CTX_DAMAGE_BASE: u32 = 2;

impl<'a, F: FormulaOracle + ?Sized> PerAttackResolver<'a, F> {
    /// Resolve one entry into a chat attack.
    ///
    /// `attack_index` is the entry's position in the attack list; it keeps
    /// the derived roll seeds distinct across a full-attack sequence.
    pub fn resolve(
        &self,
        entry: &AttackEntry,
        attack_index: u32,
        ctx: &SharedUseContext,
    ) -> Result<ChatAttack, CoreError> {
        let mut chat = ChatAttack {
            label: entry.label.clone(),
            ammo: entry.ammo,
            nonlethal: self.action.nonlethal,
            ..ChatAttack::default()
        };

        if self.action.attack.is_some() {
            self.resolve_attack_roll(entry, attack_index, ctx, &mut chat)?;
            self.resolve_critical_confirmation(entry, attack_index, ctx, &mut chat)?;
        }

        if self.action.has_damage() {
            let normal = self.resolve_damage(entry, attack_index, ctx, false, &mut chat)?;
            chat.damage = Some(normal);

            if chat.critical_confirmed && self.action.critical.multiplier > 1 {
                let critical = self.resolve_damage(entry, attack_index, ctx, true, &mut chat)?;
                chat.critical_damage = Some(critical);
            }
        }

        chat.notes = self.effect_notes(entry);
        Ok(chat)
    }

    /// Phase one: the normal attack roll and threat detection.
    fn resolve_attack_roll(
        &self,
        entry: &AttackEntry,
        attack_index: u32,
        ctx: &SharedUseContext,
        chat: &mut ChatAttack,
    ) -> Result<(), CoreError> {
        let formula = self.attack_formula(entry, ctx, false);
        let seed = compute_seed(self.seed, attack_index, CTX_ATTACK);
        let outcome = self
            .evaluator
            .evaluate(&formula, &EvalContext::new(&ctx.roll_data), seed);
        if outcome.error {
            return Err(CoreError::formula(FormulaRole::Attack, formula));
        }

        let natural = outcome.natural_d20().unwrap_or(0);
        chat.attack = Some(AttackRoll {
            threat: natural >= self.action.critical.threat_range,
            natural,
            total: outcome.floored() as i32,
            formula,
        });
        Ok(())
    }

    /// Phase two: confirmation, only when phase one produced a threat.
    fn resolve_critical_confirmation(
        &self,
        entry: &AttackEntry,
        attack_index: u32,
        ctx: &SharedUseContext,
        chat: &mut ChatAttack,
    ) -> Result<(), CoreError> {
        let Some(attack) = &chat.attack else {
            return Ok(());
        };
        if !attack.threat || self.action.critical.multiplier <= 1 {
            return Ok(());
        }

        if !self.policy.confirm_criticals {
            // House rule: no confirmation roll; the threat confirms
            // against the known defense value.
            chat.critical_confirmed = match self.policy.target_defense {
                Some(defense) => attack.total >= defense,
                None => true,
            };
            return Ok(());
        }

        let formula = self.attack_formula(entry, ctx, true);
        let seed = compute_seed(self.seed, attack_index, CTX_CONFIRM);
        let outcome = self
            .evaluator
            .evaluate(&formula, &EvalContext::new(&ctx.roll_data), seed);
        if outcome.error {
            return Err(CoreError::formula(FormulaRole::Attack, formula));
        }

        let total = outcome.floored() as i32;
        chat.critical_confirmed = match self.policy.target_defense {
            Some(defense) => total >= defense,
            None => true,
        };
        chat.critical_confirmation = Some(AttackRoll {
            natural: outcome.natural_d20().unwrap_or(0),
            total,
            threat: false,
            formula,
        });
        Ok(())
    }

    /// Resolve one damage group.
    ///
    /// The critical group repeats the evaluation `multiplier - 1` times,
    /// with `critCount` bound to the 1-based repetition in a discarded
    /// context layer so multiplier-step-sensitive formulas work.
    fn resolve_damage(
        &self,
        entry: &AttackEntry,
        attack_index: u32,
        ctx: &SharedUseContext,
        critical: bool,
        chat: &mut ChatAttack,
    ) -> Result<DamageRoll, CoreError> {
        let formula = self.damage_formula(entry, ctx, critical);
        let repetitions = if critical {
            self.action.critical.multiplier.saturating_sub(1).max(1)
        } else {
            1
        };

        let mut total = 0i64;
        for repetition in 1..=repetitions {
            let roll_ctx = if critical {
                EvalContext::new(&ctx.roll_data).with_var("critCount", repetition as f64)
            } else {
                EvalContext::new(&ctx.roll_data)
            };
            let seed = compute_seed(
                self.seed,
                attack_index,
                CTX_DAMAGE_BASE + if critical { repetition } else { 0 },
            );
            let outcome = self.evaluator.evaluate(&formula, &roll_ctx, seed);
            if outcome.error {
                return Err(CoreError::formula(FormulaRole::Damage, formula));
            }
            total += outcome.floored();
        }

        // Minimum-damage policy: a completed resolution never deals less
        // than 1, and a raised total is reclassified as nonlethal.
        if total < 1 {
            total = 1;
            chat.nonlethal = true;
        }

        Ok(DamageRoll {
            formula,
            total,
            flavor: self.damage_flavor(),
        })
    }

    fn attack_formula(&self, entry: &AttackEntry, ctx: &SharedUseContext, critical: bool) -> String {
        let spec = self.action.attack.as_ref();
        let mut parts: Vec<String> = vec![ctx.roll_data.base_die().to_string()];

        if let Some(spec) = spec {
            parts.push(spec.bonus_formula.clone());
            if critical && let Some(confirm) = &spec.confirm_bonus_formula {
                parts.push(confirm.clone());
            }
        }
        parts.push(entry.bonus_formula.clone());
        if self.policy.ability_attack_mod != 0 {
            parts.push(self.policy.ability_attack_mod.to_string());
        }
        if ctx.roll_data.attributes.size != 0 {
            parts.push("@size".to_string());
        }
        if self.policy.secondary {
            parts.push(crate::attacks::SECONDARY_ATTACK_PENALTY.to_string());
        }
        parts.extend(ctx.attack_fragments(critical).iter().map(|s| s.to_string()));

        join_fragments(parts.iter().map(String::as_str))
    }

    fn damage_formula(&self, entry: &AttackEntry, ctx: &SharedUseContext, critical: bool) -> String {
        let mut parts: Vec<String> = self
            .action
            .damage
            .iter()
            .map(|part| part.formula.clone())
            .collect();

        // Manyshot: the first attack fires an extra arrow, merging one
        // additional base damage part into the normal group only.
        if entry.manyshot && !critical
            && let Some(first) = self.action.damage.first()
        {
            parts.push(first.formula.clone());
        }

        if self.policy.ability_damage_bonus != 0 {
            parts.push(self.policy.ability_damage_bonus.to_string());
        }
        parts.extend(ctx.damage_fragments(critical).iter().map(|s| s.to_string()));

        join_fragments(parts.iter().map(String::as_str))
    }

    fn damage_flavor(&self) -> String {
        let types: Vec<&str> = self
            .action
            .damage
            .iter()
            .map(|part| part.damage_type.as_str())
            .collect();
        types.join("/")
    }

    /// Descriptive notes: actor context notes, item notes, action notes,
    /// plus a synthesized misfire note for flagged ammunition.
    fn effect_notes(&self, entry: &AttackEntry) -> Vec<String> {
        let mut notes = Vec::new();
        notes.extend(self.actor.context_notes.iter().cloned());
        notes.extend(self.item.notes.iter().cloned());
        notes.extend(self.action.notes.iter().cloned());

        if let Some(stack) = entry.ammo.and_then(|id| self.item.ammo_stack(id))
            && stack.misfire
        {
            notes.push(format!("{} misfires!", stack.name));
        }

        notes
    }
}
