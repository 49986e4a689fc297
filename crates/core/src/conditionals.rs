//! Conditional modifier resolution.
//!
//! Runs once per invocation, after configuration and before the cost
//! re-check. Each selected modifier is evaluated against the current
//! snapshot; its numeric total is recorded under `conditionals.<name>` so
//! later formulas can reference it, and its formula text is routed into
//! the bucket matching its target:
//!
//! - attack / damage: kept textual, re-joined into the relevant rolls
//! - size: applied immediately to the snapshot's size modifier, since size
//!   feeds many downstream formulas
//! - effect (caster level, save DC) and misc (charges): pre-summed into
//!   snapshot fields, because those are consumed by later pipeline stages
//!   rather than by individual rolls
//!
//! A malformed modifier formula is never fatal: it is skipped with a
//! warning so the remaining conditionals still apply.

use crate::action::{ActionDefinition, ConditionalTarget, EffectSubtarget, MiscSubtarget};
use crate::error::UseWarning;
use crate::formula::{FormulaOracle, compute_seed};
use crate::snapshot::EvalContext;
use crate::use_context::{Fragment, SharedUseContext};

/// Resolve the selected conditionals into the shared context, in
/// selection order. Indices outside the catalogue are ignored.
pub fn resolve_conditionals<F: FormulaOracle + ?Sized>(
    action: &ActionDefinition,
    selected: &[usize],
    ctx: &mut SharedUseContext,
    evaluator: &F,
    seed: u64,
) {
    for (slot, &index) in selected.iter().enumerate() {
        let Some(conditional) = action.conditionals.get(index) else {
            continue;
        };

        for (mod_index, modifier) in conditional.modifiers.iter().enumerate() {
            let outcome = {
                let eval_ctx = EvalContext::new(&ctx.roll_data);
                let mod_seed = compute_seed(seed, slot as u32, mod_index as u32);
                evaluator.evaluate(&modifier.formula, &eval_ctx, mod_seed)
            };

            if outcome.error {
                ctx.warnings.push(UseWarning::ConditionalFormula {
                    conditional: conditional.name.clone(),
                    formula: modifier.formula.clone(),
                });
                continue;
            }

            // Namespaced running total so later formulas can ask "how much
            // did conditional X contribute".
            let key = format!("conditionals.{}", conditional.name);
            let total = ctx.roll_data.resolve(&key).unwrap_or(0.0) + outcome.total;
            ctx.roll_data.set_var(key, total);

            let delta = outcome.floored();
            match modifier.target {
                ConditionalTarget::Attack => {
                    ctx.conditional_fragments
                        .attack
                        .push(Fragment::with_timing(&modifier.formula, modifier.timing));
                }
                ConditionalTarget::Damage => {
                    ctx.conditional_fragments
                        .damage
                        .push(Fragment::with_timing(&modifier.formula, modifier.timing));
                }
                ConditionalTarget::Size => {
                    ctx.roll_data.attributes.size += delta as i32;
                }
                ConditionalTarget::Effect(EffectSubtarget::CasterLevel) => {
                    ctx.roll_data.attributes.cl += delta as i32;
                }
                ConditionalTarget::Effect(EffectSubtarget::SaveDc) => {
                    ctx.roll_data.dc_bonus += delta as i32;
                }
                ConditionalTarget::Misc(MiscSubtarget::Charges) => {
                    ctx.roll_data.charge_cost_bonus += delta;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Conditional, ConditionalModifier, CritTiming};
    use crate::formula::{DiceFormula, PcgRng};
    use crate::snapshot::RollData;

    fn evaluator() -> DiceFormula<PcgRng> {
        DiceFormula::new(PcgRng)
    }

    fn resolve(action: &ActionDefinition, selected: &[usize]) -> SharedUseContext {
        let mut ctx = SharedUseContext::new(RollData::default());
        resolve_conditionals(action, selected, &mut ctx, &evaluator(), 0);
        ctx
    }

    #[test]
    fn routes_attack_and_damage_fragments() {
        let action = ActionDefinition::new("shot").with_conditional(
            Conditional::new("flank")
                .with_modifier(ConditionalModifier::new("2", ConditionalTarget::Attack))
                .with_modifier(
                    ConditionalModifier::new("1d6", ConditionalTarget::Damage).crit_only(),
                ),
        );

        let ctx = resolve(&action, &[0]);
        assert_eq!(ctx.conditional_fragments.attack.len(), 1);
        assert_eq!(ctx.conditional_fragments.damage.len(), 1);
        assert_eq!(
            ctx.conditional_fragments.damage[0].timing,
            CritTiming::CritOnly
        );
    }

    #[test]
    fn records_namespaced_totals() {
        let action = ActionDefinition::new("shot").with_conditional(
            Conditional::new("insight")
                .with_modifier(ConditionalModifier::new("2", ConditionalTarget::Attack))
                .with_modifier(ConditionalModifier::new("3", ConditionalTarget::Damage)),
        );

        let ctx = resolve(&action, &[0]);
        assert_eq!(ctx.roll_data.resolve("conditionals.insight"), Some(5.0));
    }

    #[test]
    fn size_applies_immediately_to_snapshot() {
        let action = ActionDefinition::new("enlarge").with_conditional(
            Conditional::new("enlarged")
                .with_modifier(ConditionalModifier::new("-1", ConditionalTarget::Size)),
        );

        let ctx = resolve(&action, &[0]);
        assert_eq!(ctx.roll_data.attributes.size, -1);
    }

    #[test]
    fn effect_and_misc_fold_into_snapshot_fields() {
        let action = ActionDefinition::new("empower").with_conditional(
            Conditional::new("surge")
                .with_modifier(ConditionalModifier::new(
                    "2",
                    ConditionalTarget::Effect(EffectSubtarget::CasterLevel),
                ))
                .with_modifier(ConditionalModifier::new(
                    "1",
                    ConditionalTarget::Effect(EffectSubtarget::SaveDc),
                ))
                .with_modifier(ConditionalModifier::new(
                    "1",
                    ConditionalTarget::Misc(MiscSubtarget::Charges),
                )),
        );

        let ctx = resolve(&action, &[0]);
        assert_eq!(ctx.roll_data.attributes.cl, 2);
        assert_eq!(ctx.roll_data.dc_bonus, 1);
        assert_eq!(ctx.roll_data.charge_cost_bonus, 1);
    }

    #[test]
    fn malformed_formula_warns_and_continues() {
        let action = ActionDefinition::new("shot").with_conditional(
            Conditional::new("broken")
                .with_modifier(ConditionalModifier::new("1 +", ConditionalTarget::Attack))
                .with_modifier(ConditionalModifier::new("2", ConditionalTarget::Attack)),
        );

        let ctx = resolve(&action, &[0]);
        assert_eq!(ctx.warnings.len(), 1);
        // The healthy modifier still applied.
        assert_eq!(ctx.conditional_fragments.attack.len(), 1);
        assert_eq!(ctx.roll_data.resolve("conditionals.broken"), Some(2.0));
    }

    #[test]
    fn out_of_range_selection_is_ignored() {
        let action = ActionDefinition::new("shot");
        let ctx = resolve(&action, &[4]);
        assert!(ctx.warnings.is_empty());
        assert!(ctx.conditional_fragments.attack.is_empty());
    }
}
