//! Attack list generation.
//!
//! Produces the ordered list of distinct attacks for one invocation: a
//! single default attack, or the full multi-attack expansion (base attack,
//! configured extra parts, formulaic iteratives, role-derived bonus
//! attacks). Order matters: the first entry is the primary attack for
//! note-generation and manyshot purposes, and the haste attack is inserted
//! right after it rather than appended.

mod roles;

pub use roles::{
    PowerAttack, SECONDARY_ATTACK_PENALTY, ability_damage_mult, is_secondary_natural, power_attack,
};

use crate::action::ActionDefinition;
use crate::config::{RoleFlags, UseConfiguration};
use crate::error::{CoreError, FormulaRole};
use crate::formula::FormulaOracle;
use crate::snapshot::{EvalContext, ItemId, ItemSnapshot, RollData};

/// One attack to resolve, with its list-position-specific bonus.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackEntry {
    pub label: String,
    /// Per-entry attack bonus fragment (iterative penalties and the like);
    /// empty for full-bonus attacks.
    pub bonus_formula: String,
    /// Assigned ammunition stack; `None` after assignment means the entry
    /// found no ammunition and will be dropped.
    pub ammo: Option<ItemId>,
    /// First-attack manyshot merge: one extra base damage part.
    pub manyshot: bool,
}

impl AttackEntry {
    pub fn new(label: impl Into<String>, bonus_formula: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bonus_formula: bonus_formula.into(),
            ammo: None,
            manyshot: false,
        }
    }
}

/// Generate the ordered attack list for one invocation.
///
/// For full attacks the list is: base attack, configured extra parts,
/// formulaic iteratives, then role-derived entries (haste inserted after
/// the primary, rapid shot appended). The formulaic count formula is
/// evaluated once; the per-iteration bonus formula is evaluated with
/// `formulaicAttack` bound to the 1-based iteration number in a context
/// layer that is discarded after each evaluation, so the counter never
/// enters the snapshot.
pub fn generate_attack_list<F: FormulaOracle + ?Sized>(
    action: &ActionDefinition,
    config: &UseConfiguration,
    data: &RollData,
    evaluator: &F,
    seed: u64,
) -> Result<Vec<AttackEntry>, CoreError> {
    let mut entries = vec![AttackEntry::new(primary_label(action), "")];

    if config.full_attack {
        for part in &action.extra_attacks {
            entries.push(AttackEntry::new(&part.label, &part.bonus_formula));
        }

        if let Some(formulaic) = &action.formulaic {
            let count = {
                let ctx = EvalContext::new(data);
                let outcome = evaluator.evaluate(&formulaic.count_formula, &ctx, seed);
                if outcome.error {
                    return Err(CoreError::formula(
                        FormulaRole::AttackCount,
                        &formulaic.count_formula,
                    ));
                }
                outcome.floored().max(0) as u32
            };

            for iteration in 1..=count {
                let ctx = EvalContext::new(data).with_var("formulaicAttack", iteration as f64);
                let outcome = evaluator.evaluate(&formulaic.bonus_formula, &ctx, seed);
                if outcome.error {
                    return Err(CoreError::formula(
                        FormulaRole::AttackBonus,
                        &formulaic.bonus_formula,
                    ));
                }

                let label = match &formulaic.label {
                    Some(template) => template.replace("{0}", &iteration.to_string()),
                    None => format!("{} ({})", primary_label(action), iteration + 1),
                };
                entries.push(AttackEntry::new(label, outcome.floored().to_string()));
            }
        }

        if config.roles.contains(RoleFlags::RAPID_SHOT) {
            entries.push(AttackEntry::new("Rapid Shot", ""));
        }

        // The haste attack sits directly after the primary, not at the end
        // of the list. Like the other bonus attacks it only exists on a
        // full attack.
        if config.roles.contains(RoleFlags::HASTE) {
            entries.insert(1, AttackEntry::new("Haste", ""));
        }

        if config.roles.contains(RoleFlags::MANYSHOT)
            && let Some(first) = entries.first_mut()
        {
            first.manyshot = true;
        }
    }

    Ok(entries)
}

fn primary_label(action: &ActionDefinition) -> String {
    if action.name.is_empty() {
        "Attack".to_string()
    } else {
        action.name.clone()
    }
}

/// Assign ammunition stacks to the attack list.
///
/// An explicit dialog assignment is applied positionally. Otherwise stacks
/// are drained in inventory order; abundant stacks are never exhausted.
/// Entries beyond the available quantity keep `ammo: None` and are dropped
/// by the orchestrator's ammunition filter.
pub fn assign_ammunition(
    entries: &mut [AttackEntry],
    item: &ItemSnapshot,
    explicit: Option<&[Option<ItemId>]>,
) {
    if let Some(explicit) = explicit {
        for (entry, choice) in entries.iter_mut().zip(explicit) {
            entry.ammo = *choice;
        }
        return;
    }

    let mut remaining: Vec<(ItemId, Option<u32>)> = item
        .ammo
        .iter()
        .map(|stack| {
            let budget = (!stack.abundant).then_some(stack.quantity);
            (stack.id, budget)
        })
        .collect();

    for entry in entries.iter_mut() {
        entry.ammo = remaining.iter_mut().find_map(|(id, budget)| match budget {
            Some(0) => None,
            Some(n) => {
                *n -= 1;
                Some(*id)
            }
            None => Some(*id),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::AttackPart;
    use crate::formula::{DiceFormula, PcgRng};
    use crate::snapshot::AmmoSnapshot;

    fn evaluator() -> DiceFormula<PcgRng> {
        DiceFormula::new(PcgRng)
    }

    fn iterative_action() -> ActionDefinition {
        ActionDefinition::new("Longsword")
            .with_attack("@bab")
            .with_formulaic("ceil(@bab / 5) - 1", "@formulaicAttack * -5")
    }

    #[test]
    fn single_attack_without_full_flag() {
        let action = iterative_action();
        let data = RollData::default();
        let config = UseConfiguration::default();
        let list = generate_attack_list(&action, &config, &data, &evaluator(), 0).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].label, "Longsword");
    }

    #[test]
    fn full_attack_expands_parts_and_iteratives() {
        let mut action = iterative_action();
        action.extra_attacks.push(AttackPart::new("Off-hand", "-2"));
        let mut data = RollData::default();
        data.attributes.bab = 11; // ceil(11/5) - 1 = 2 iteratives

        let config = UseConfiguration {
            full_attack: true,
            ..UseConfiguration::default()
        };
        let list = generate_attack_list(&action, &config, &data, &evaluator(), 0).unwrap();

        // base + 1 configured part + 2 formulaic
        assert_eq!(list.len(), 4);
        assert_eq!(list[1].label, "Off-hand");
        assert_eq!(list[2].bonus_formula, "-5");
        assert_eq!(list[3].bonus_formula, "-10");
    }

    #[test]
    fn formulaic_counter_never_enters_snapshot() {
        let action = iterative_action();
        let mut data = RollData::default();
        data.attributes.bab = 20;
        assert!(data.resolve("formulaicAttack").is_none());

        let config = UseConfiguration {
            full_attack: true,
            ..UseConfiguration::default()
        };
        generate_attack_list(&action, &config, &data, &evaluator(), 0).unwrap();
        assert!(data.resolve("formulaicAttack").is_none());
    }

    #[test]
    fn haste_inserts_after_primary() {
        let mut action = iterative_action();
        action.extra_attacks.push(AttackPart::new("Off-hand", "-2"));
        let data = RollData::default();
        let config = UseConfiguration {
            full_attack: true,
            roles: RoleFlags::HASTE,
            ..UseConfiguration::default()
        };
        let list = generate_attack_list(&action, &config, &data, &evaluator(), 0).unwrap();
        assert_eq!(list[0].label, "Longsword");
        assert_eq!(list[1].label, "Haste");
        assert_eq!(list[2].label, "Off-hand");
    }

    #[test]
    fn haste_requires_full_attack() {
        let action = iterative_action();
        let data = RollData::default();
        let config = UseConfiguration {
            roles: RoleFlags::HASTE,
            ..UseConfiguration::default()
        };
        let list = generate_attack_list(&action, &config, &data, &evaluator(), 0).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].label, "Longsword");
    }

    #[test]
    fn broken_count_formula_is_fatal() {
        let mut action = iterative_action();
        action.formulaic.as_mut().unwrap().count_formula = "@nope +".into();
        let data = RollData::default();
        let config = UseConfiguration {
            full_attack: true,
            ..UseConfiguration::default()
        };
        let err = generate_attack_list(&action, &config, &data, &evaluator(), 0).unwrap_err();
        assert!(matches!(err, CoreError::Formula { .. }));
    }

    #[test]
    fn ammunition_assignment_stops_at_quantity() {
        let mut entries = vec![
            AttackEntry::new("1", ""),
            AttackEntry::new("2", ""),
            AttackEntry::new("3", ""),
        ];
        let item = ItemSnapshot {
            ammo: vec![AmmoSnapshot {
                id: ItemId(5),
                name: "arrows".into(),
                quantity: 2,
                abundant: false,
                misfire: false,
            }],
            ..ItemSnapshot::default()
        };

        assign_ammunition(&mut entries, &item, None);
        assert_eq!(entries[0].ammo, Some(ItemId(5)));
        assert_eq!(entries[1].ammo, Some(ItemId(5)));
        assert_eq!(entries[2].ammo, None);
    }

    #[test]
    fn abundant_ammunition_never_runs_out() {
        let mut entries = vec![AttackEntry::new("1", ""); 5];
        let item = ItemSnapshot {
            ammo: vec![AmmoSnapshot {
                id: ItemId(9),
                name: "blessed arrows".into(),
                quantity: 0,
                abundant: true,
                misfire: false,
            }],
            ..ItemSnapshot::default()
        };

        assign_ammunition(&mut entries, &item, None);
        assert!(entries.iter().all(|e| e.ammo == Some(ItemId(9))));
    }
}
