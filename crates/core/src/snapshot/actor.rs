//! Actor and item snapshots read by the pipeline.
//!
//! These are immutable copies of the persistence layer's computed state,
//! taken at invocation start. The pipeline only ever reads them; the single
//! mutation point is the batched resource update issued by the runtime
//! after dice resolution.

use super::{Abilities, Attributes, HeldMode};

/// Identifier of an item record in the host's persistence layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemId(pub u32);

impl core::fmt::Display for ItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "item:{}", self.0)
    }
}

/// Snapshot of the acting entity.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActorSnapshot {
    pub name: String,
    /// Whether the invoking user may act through this actor.
    pub can_use: bool,
    pub abilities: Abilities,
    pub attributes: Attributes,
    pub held: HeldMode,
    /// Descriptive notes contributed by the actor's context-note sources.
    pub context_notes: Vec<String>,
}

/// A limited-use pool (item self-charges, daily uses).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsesPool {
    pub current: u32,
    pub max: u32,
}

impl UsesPool {
    pub const fn new(current: u32, max: u32) -> Self {
        Self { current, max }
    }

    pub fn is_empty(&self) -> bool {
        self.current == 0
    }
}

/// One ammunition stack available to the item.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AmmoSnapshot {
    pub id: ItemId,
    pub name: String,
    pub quantity: u32,
    /// Abundant ammunition is assigned freely and never deducted.
    pub abundant: bool,
    /// Flagged stacks synthesize a misfire note on each attack using them.
    pub misfire: bool,
}

/// Snapshot of the item that owns the action being used.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub name: String,
    /// Disabled items cannot be used at all.
    pub disabled: bool,
    /// Physical stack size; zero means nothing left to use.
    pub quantity: u32,
    /// Whether this item is physical (quantity is meaningful).
    pub physical: bool,
    /// Charge pool drawn on by the action's resource cost.
    pub charges: i64,
    /// Spontaneous-casting style source: cost is taken from a shared pool
    /// and becomes infinite once the pool is empty.
    pub spontaneous: bool,
    /// Per-item limited-use pool consumed by self-charge actions.
    pub self_uses: UsesPool,
    pub notes: Vec<String>,
    pub ammo: Vec<AmmoSnapshot>,
}

impl ItemSnapshot {
    /// Ammunition stack by id.
    pub fn ammo_stack(&self, id: ItemId) -> Option<&AmmoSnapshot> {
        self.ammo.iter().find(|stack| stack.id == id)
    }
}

impl Default for ItemSnapshot {
    fn default() -> Self {
        Self {
            id: ItemId(0),
            name: String::new(),
            disabled: false,
            quantity: 1,
            physical: true,
            charges: 0,
            spontaneous: false,
            self_uses: UsesPool::new(0, 0),
            notes: Vec::new(),
            ammo: Vec::new(),
        }
    }
}
