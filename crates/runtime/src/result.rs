//! The structured outcome of a completed invocation.

use arbiter_core::{ChatAttack, ItemId, SaveType};

/// Saving throw entry in the bundle: the action's DC formula with the
/// conditional DC bonus folded in.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SaveResult {
    pub save_type: SaveType,
    pub dc: i32,
}

/// Post-consumption ammunition accounting for one stack.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AmmoReport {
    pub stack: ItemId,
    pub name: String,
    pub used: u32,
    pub remaining: u32,
}

/// Serializable record of everything one invocation resolved.
///
/// Suitable for handing to a presentation layer or asserting against in
/// tests. `suppress_display` is set by a `PreDisplay` veto; at that point
/// resource consumption has already committed, so the bundle is still
/// delivered to the caller.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResultBundle {
    pub chat_attacks: Vec<ChatAttack>,
    pub save: Option<SaveResult>,
    /// Human-readable recoverable problems (skipped conditionals).
    pub warnings: Vec<String>,
    /// Non-abundant ammunition consumed, with post-deduction counts.
    pub ammo_report: Vec<AmmoReport>,
    /// Per-attack rolls, formulas and seeds, for replay and testing.
    pub rolls_metadata: serde_json::Value,
    pub suppress_display: bool,
}

impl ResultBundle {
    /// Combined damage across every chat attack.
    pub fn total_damage(&self) -> i64 {
        self.chat_attacks.iter().map(ChatAttack::total_damage).sum()
    }
}
