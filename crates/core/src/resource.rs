//! Resource and charge accounting.
//!
//! The pipeline checks resources at two points: a cheap requirement gate at
//! invocation start, and a cost re-check after conditional resolution (the
//! conditional-derived charge bonus can change the price). Both checks read
//! snapshots only; the actual deduction is issued once, as a batch, by the
//! runtime after dice resolution.

use crate::action::ActionDefinition;
use crate::error::{CoreError, FailureCode, FormulaRole};
use crate::formula::FormulaOracle;
use crate::snapshot::{ActorSnapshot, EvalContext, ItemSnapshot, RollData};

/// The charge price of one invocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChargeCost {
    Finite(i64),
    /// Uncoverable by definition: a spontaneous source with an empty pool
    /// asked to pay a positive cost.
    Infinite,
}

impl ChargeCost {
    /// Whether `available` charges cover this cost.
    pub fn covered_by(self, available: i64) -> bool {
        match self {
            Self::Finite(cost) => cost <= available,
            Self::Infinite => false,
        }
    }
}

/// Initial requirement gate, in precedence order: permission, disabled
/// source, physical quantity, self-charge pool. Always runs before any roll
/// or mutation, so a failed invocation is a pure no-op.
pub fn check_requirements(
    actor: &ActorSnapshot,
    item: &ItemSnapshot,
    action: &ActionDefinition,
) -> Result<(), FailureCode> {
    if !actor.can_use {
        return Err(FailureCode::NoPermission);
    }
    if item.disabled {
        return Err(FailureCode::SourceDisabled);
    }
    if item.physical && item.quantity == 0 {
        return Err(FailureCode::NoQuantity);
    }
    if action.uses.self_charge && item.self_uses.is_empty() {
        return Err(FailureCode::InsufficientCharges);
    }
    Ok(())
}

/// Seam between the pipeline and charge accounting, so hosts can price
/// actions differently (shared pools, pooled party resources).
pub trait ChargeOracle {
    /// Price of one invocation against the current snapshot.
    fn charge_cost(
        &self,
        action: &ActionDefinition,
        item: &ItemSnapshot,
        data: &RollData,
    ) -> Result<ChargeCost, CoreError>;

    /// Charges currently available to the action.
    fn current_charges(&self, action: &ActionDefinition, item: &ItemSnapshot) -> i64;
}

/// Default pricing: the action's cost formula plus the conditional-derived
/// charge bonus, read against the item snapshot.
pub struct SnapshotChargeOracle<'a, F: FormulaOracle + ?Sized> {
    pub evaluator: &'a F,
    pub seed: u64,
}

impl<'a, F: FormulaOracle + ?Sized> SnapshotChargeOracle<'a, F> {
    pub fn new(evaluator: &'a F, seed: u64) -> Self {
        Self { evaluator, seed }
    }
}

impl<F: FormulaOracle + ?Sized> ChargeOracle for SnapshotChargeOracle<'_, F> {
    fn charge_cost(
        &self,
        action: &ActionDefinition,
        item: &ItemSnapshot,
        data: &RollData,
    ) -> Result<ChargeCost, CoreError> {
        let base = match &action.uses.cost_formula {
            Some(formula) => {
                let outcome = self
                    .evaluator
                    .evaluate(formula, &EvalContext::new(data), self.seed);
                if outcome.error {
                    return Err(CoreError::formula(FormulaRole::ChargeCost, formula));
                }
                outcome.floored()
            }
            None => 0,
        };

        let cost = base + data.charge_cost_bonus;
        if item.spontaneous && item.charges == 0 && cost > 0 {
            return Ok(ChargeCost::Infinite);
        }
        Ok(ChargeCost::Finite(cost))
    }

    fn current_charges(&self, _action: &ActionDefinition, item: &ItemSnapshot) -> i64 {
        // Self-charge pool depth is gated by the requirement check and the
        // unit is deducted at consumption; the formula cost always prices
        // against the charge pool.
        item.charges
    }
}

/// Re-check the cost against available charges.
pub fn check_charges<O: ChargeOracle + ?Sized>(
    oracle: &O,
    action: &ActionDefinition,
    item: &ItemSnapshot,
    data: &RollData,
) -> Result<Result<ChargeCost, FailureCode>, CoreError> {
    let cost = oracle.charge_cost(action, item, data)?;
    if !matches!(cost, ChargeCost::Finite(c) if c <= 0) {
        let available = oracle.current_charges(action, item);
        if !cost.covered_by(available) {
            return Ok(Err(FailureCode::InsufficientCharges));
        }
    }
    Ok(Ok(cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{DiceFormula, PcgRng};
    use crate::snapshot::UsesPool;

    fn oracle() -> SnapshotChargeOracle<'static, DiceFormula<PcgRng>> {
        static EVAL: DiceFormula<PcgRng> = DiceFormula::new(PcgRng);
        SnapshotChargeOracle::new(&EVAL, 0)
    }

    #[test]
    fn requirement_gate_precedence() {
        let action = ActionDefinition::new("strike");
        let mut actor = ActorSnapshot::default();
        let mut item = ItemSnapshot {
            disabled: true,
            quantity: 0,
            ..ItemSnapshot::default()
        };

        // Permission first, even with everything else broken.
        assert_eq!(
            check_requirements(&actor, &item, &action),
            Err(FailureCode::NoPermission)
        );
        actor.can_use = true;
        assert_eq!(
            check_requirements(&actor, &item, &action),
            Err(FailureCode::SourceDisabled)
        );
        item.disabled = false;
        assert_eq!(
            check_requirements(&actor, &item, &action),
            Err(FailureCode::NoQuantity)
        );
        item.quantity = 1;
        assert_eq!(check_requirements(&actor, &item, &action), Ok(()));
    }

    #[test]
    fn nonphysical_item_ignores_quantity() {
        let action = ActionDefinition::new("ray");
        let actor = ActorSnapshot {
            can_use: true,
            ..ActorSnapshot::default()
        };
        let item = ItemSnapshot {
            physical: false,
            quantity: 0,
            ..ItemSnapshot::default()
        };
        assert_eq!(check_requirements(&actor, &item, &action), Ok(()));
    }

    #[test]
    fn empty_self_charge_pool_fails_the_gate() {
        let mut action = ActionDefinition::new("smite");
        action.uses.self_charge = true;
        let actor = ActorSnapshot {
            can_use: true,
            ..ActorSnapshot::default()
        };
        let mut item = ItemSnapshot {
            self_uses: UsesPool::new(0, 3),
            ..ItemSnapshot::default()
        };
        assert_eq!(
            check_requirements(&actor, &item, &action),
            Err(FailureCode::InsufficientCharges)
        );
        item.self_uses = UsesPool::new(1, 3);
        assert_eq!(check_requirements(&actor, &item, &action), Ok(()));
    }

    #[test]
    fn cost_includes_conditional_bonus() {
        let action = ActionDefinition::new("blast").with_cost("2");
        let item = ItemSnapshot {
            charges: 10,
            ..ItemSnapshot::default()
        };
        let mut data = RollData::default();
        data.charge_cost_bonus = 1;

        let cost = oracle().charge_cost(&action, &item, &data).unwrap();
        assert_eq!(cost, ChargeCost::Finite(3));
    }

    #[test]
    fn spontaneous_empty_pool_is_infinite() {
        let action = ActionDefinition::new("blast").with_cost("1");
        let item = ItemSnapshot {
            spontaneous: true,
            charges: 0,
            ..ItemSnapshot::default()
        };
        let data = RollData::default();

        let cost = oracle().charge_cost(&action, &item, &data).unwrap();
        assert_eq!(cost, ChargeCost::Infinite);
        assert!(!cost.covered_by(i64::MAX));
    }

    #[test]
    fn free_action_on_spontaneous_empty_pool_is_fine() {
        let action = ActionDefinition::new("cantrip");
        let item = ItemSnapshot {
            spontaneous: true,
            charges: 0,
            ..ItemSnapshot::default()
        };
        let data = RollData::default();

        let checked = check_charges(&oracle(), &action, &item, &data).unwrap();
        assert_eq!(checked, Ok(ChargeCost::Finite(0)));
    }

    #[test]
    fn self_charge_cost_still_prices_against_charges() {
        let mut action = ActionDefinition::new("smite").with_cost("1");
        action.uses.self_charge = true;
        let item = ItemSnapshot {
            charges: 5,
            self_uses: UsesPool::new(2, 3),
            ..ItemSnapshot::default()
        };
        let data = RollData::default();

        let checked = check_charges(&oracle(), &action, &item, &data).unwrap();
        assert_eq!(checked, Ok(ChargeCost::Finite(1)));
    }

    #[test]
    fn insufficient_charges_is_a_failure_code() {
        let action = ActionDefinition::new("blast").with_cost("5");
        let item = ItemSnapshot {
            charges: 3,
            ..ItemSnapshot::default()
        };
        let data = RollData::default();

        let checked = check_charges(&oracle(), &action, &item, &data).unwrap();
        assert_eq!(checked, Err(FailureCode::InsufficientCharges));
    }

    #[test]
    fn broken_cost_formula_is_fatal() {
        let action = ActionDefinition::new("blast").with_cost("2 +");
        let item = ItemSnapshot::default();
        let data = RollData::default();

        let err = oracle().charge_cost(&action, &item, &data).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Formula {
                role: FormulaRole::ChargeCost,
                ..
            }
        ));
    }
}
