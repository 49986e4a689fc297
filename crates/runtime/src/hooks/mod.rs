//! Extension-point hook system.
//!
//! External extensions observe or veto an invocation at four fixed points:
//!
//! 1. `UseCreated` — observer, fired after the snapshot is built
//! 2. `PreUse` — vetoable; a veto aborts before any resource consumption
//!    and rolls back placed templates
//! 3. `PreDisplay` — vetoable; a veto only suppresses presentation,
//!    consumption is already committed
//! 4. `PostUse` — observer, receives the final bundle
//!
//! Verdicts other than [`HookVerdict::Continue`] are honored only at the
//! vetoable points; a veto returned from an observer point is ignored with
//! a warning.

mod registry;

pub use registry::HookRegistry;

use async_trait::async_trait;

use arbiter_core::{ActionDefinition, ActorSnapshot, ItemSnapshot, SharedUseContext};

use crate::error::RuntimeError;
use crate::result::ResultBundle;

/// Where in the pipeline a hook is being fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ExtensionPoint {
    UseCreated,
    PreUse,
    PreDisplay,
    PostUse,
}

impl ExtensionPoint {
    /// Whether a veto at this point is honored.
    pub fn vetoable(self) -> bool {
        matches!(self, Self::PreUse | Self::PreDisplay)
    }
}

/// Hook return value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HookVerdict {
    #[default]
    Continue,
    Veto,
}

/// How a hook failure affects the invocation.
///
/// Mirrors the three-tier policy used elsewhere: critical failures abort
/// (before consumption they fail closed), important ones are logged as
/// errors, optional ones at debug.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookCriticality {
    Critical,
    Important,
    Optional,
}

/// Read-only view of the invocation handed to hooks.
pub struct HookEvent<'a> {
    pub point: ExtensionPoint,
    pub action: &'a ActionDefinition,
    pub actor: &'a ActorSnapshot,
    pub item: &'a ItemSnapshot,
    pub context: &'a SharedUseContext,
    /// Present at `PreDisplay` and `PostUse`.
    pub bundle: Option<&'a ResultBundle>,
}

/// One registered extension.
#[async_trait]
pub trait UseHook: Send + Sync {
    /// Stable name, used in logging.
    fn name(&self) -> &'static str;

    /// Firing order within a point; lower values fire first.
    fn priority(&self) -> i32 {
        0
    }

    fn criticality(&self) -> HookCriticality {
        HookCriticality::Important
    }

    /// Points this hook wants to receive. Defaults to all of them.
    fn interested_in(&self, _point: ExtensionPoint) -> bool {
        true
    }

    async fn on_event(&self, event: &HookEvent<'_>) -> Result<HookVerdict, RuntimeError>;
}
