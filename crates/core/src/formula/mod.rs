//! Formula evaluation seam.
//!
//! The engine never interprets dice expressions directly; it goes through
//! the [`FormulaOracle`] trait so hosts can plug in their own expression
//! engine. [`DiceFormula`] is the built-in evaluator used by the runtime
//! and by tests.
//!
//! Evaluation is total: malformed input is reported through
//! [`RollOutcome::error`], never as a panic. Whether an evaluation error is
//! fatal is the caller's decision (core attack/damage formulas: fatal;
//! conditional modifier formulas: skipped with a warning).

mod dice;
mod rng;

pub use dice::DiceFormula;
pub use rng::{PcgRng, RngOracle, SequenceRng, compute_seed};

use crate::snapshot::EvalContext;

/// Result of one die term inside an evaluated formula.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DieRoll {
    pub sides: u32,
    pub result: u32,
}

/// Outcome of evaluating one formula.
///
/// `dice` lists every die drawn, in evaluation order; the first d20 is the
/// "natural" roll used for threat detection on attack rolls.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RollOutcome {
    pub total: f64,
    pub dice: Vec<DieRoll>,
    pub error: bool,
}

impl RollOutcome {
    /// Outcome flagged as failed (total 0, no dice).
    pub fn failed() -> Self {
        Self {
            total: 0.0,
            dice: Vec::new(),
            error: true,
        }
    }

    /// The natural result of the first d20 in the formula, if any.
    pub fn natural_d20(&self) -> Option<u32> {
        self.dice.iter().find(|d| d.sides == 20).map(|d| d.result)
    }

    /// Total rounded toward negative infinity, as rolled values are.
    pub fn floored(&self) -> i64 {
        self.total.floor() as i64
    }
}

/// Side-effect-free formula evaluator.
///
/// `seed` addresses the dice drawn by this evaluation; two calls with the
/// same formula, context and seed must produce identical outcomes.
pub trait FormulaOracle: Send + Sync {
    fn evaluate(&self, formula: &str, ctx: &EvalContext<'_>, seed: u64) -> RollOutcome;
}

/// Join formula fragments into one additive expression.
///
/// Fragments written with a leading `+` (author convenience, e.g. `"+5"`)
/// are normalized so the joined expression stays parseable.
pub fn join_fragments<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    let mut joined = String::new();
    for fragment in fragments {
        let trimmed = fragment.trim().trim_start_matches('+').trim_start();
        if trimmed.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push_str(" + ");
        }
        joined.push_str(trimmed);
    }
    joined
}
