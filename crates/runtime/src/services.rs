//! External service ports.
//!
//! The orchestrator never talks to a host system directly; every outward
//! dependency is an async trait object injected through the builder. Hosts
//! implement these against their actual UI and persistence layers; tests
//! implement them in-memory.

use async_trait::async_trait;

use arbiter_core::{
    ActionDefinition, ChatAttack, ItemId, RollData, TemplateSpec, UseConfiguration,
};

use crate::error::Result;

/// Interactive configuration step.
#[async_trait]
pub trait ConfigurationPrompt: Send + Sync {
    /// Show the configuration dialog. `None` means the user cancelled and
    /// the invocation aborts silently.
    async fn show(&self, action: &ActionDefinition, data: &RollData) -> Option<UseConfiguration>;
}

/// One resource deduction against a persistent record.
///
/// Deltas are negative for consumption. Each update targets exactly one
/// record; the batch as a whole is not atomic, so rejected updates are
/// reported individually.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ResourceUpdate {
    /// Physical quantity change (ammunition stacks).
    Quantity { item: ItemId, delta: i64 },
    /// Charge pool change.
    Charges { item: ItemId, delta: i64 },
    /// Per-item limited-use pool change.
    SelfUses { item: ItemId, delta: i64 },
}

impl ResourceUpdate {
    /// The record this update targets.
    pub fn item(&self) -> ItemId {
        match self {
            Self::Quantity { item, .. } | Self::Charges { item, .. } | Self::SelfUses { item, .. } => {
                *item
            }
        }
    }
}

/// An update the persistence layer refused to apply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateRejection {
    pub update: ResourceUpdate,
    pub reason: String,
}

/// Persistence port: the single write seam of the whole pipeline.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Apply a batch of resource updates. Atomic per record, not across
    /// records; rejected updates are returned, never silently dropped.
    async fn apply_updates(&self, updates: Vec<ResourceUpdate>) -> Vec<UpdateRejection>;
}

/// Opaque handle to a placed area template, used for veto rollback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TemplateHandle(pub u64);

/// Area-template placement port.
#[async_trait]
pub trait TemplateService: Send + Sync {
    async fn place(&self, template: &TemplateSpec) -> Result<TemplateHandle>;
    async fn remove(&self, handle: TemplateHandle) -> Result<()>;
}

/// Optional cosmetic dice display. Failures are logged, never propagated:
/// by the time this runs, dice are rolled and consumption is about to
/// commit.
#[async_trait]
pub trait DiceVisualizer: Send + Sync {
    async fn display(&self, attacks: &[ChatAttack]) -> Result<()>;
}
