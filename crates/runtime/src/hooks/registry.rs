//! Hook registry: ordered dispatch with per-criticality error handling.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::RuntimeError;

use super::{ExtensionPoint, HookCriticality, HookEvent, HookVerdict, UseHook};

/// Holds every registered hook, sorted by priority at construction.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn UseHook>>,
}

impl HookRegistry {
    /// Build a registry; hooks are sorted by priority (lower fires first).
    pub fn new(mut hooks: Vec<Arc<dyn UseHook>>) -> Self {
        hooks.sort_by_key(|h| h.priority());
        Self { hooks }
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hook names in firing order, for debugging.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.hooks.iter().map(|h| h.name())
    }

    /// Fire every interested hook at `point`.
    ///
    /// Returns `Veto` as soon as one hook vetoes at a vetoable point;
    /// remaining hooks do not fire. At observer points a veto is ignored
    /// with a warning. Failures follow criticality: `Critical` propagates,
    /// `Important` logs an error, `Optional` logs at debug.
    pub async fn dispatch(
        &self,
        point: ExtensionPoint,
        event: &HookEvent<'_>,
    ) -> Result<HookVerdict, RuntimeError> {
        for hook in &self.hooks {
            if !hook.interested_in(point) {
                continue;
            }

            match hook.on_event(event).await {
                Ok(HookVerdict::Continue) => {}
                Ok(HookVerdict::Veto) => {
                    if point.vetoable() {
                        debug!(
                            target: "arbiter::hooks",
                            hook = hook.name(),
                            %point,
                            "hook vetoed invocation"
                        );
                        return Ok(HookVerdict::Veto);
                    }
                    warn!(
                        target: "arbiter::hooks",
                        hook = hook.name(),
                        %point,
                        "veto returned at observer point; ignored"
                    );
                }
                Err(err) => self.handle_hook_error(hook.as_ref(), point, err)?,
            }
        }

        Ok(HookVerdict::Continue)
    }

    fn handle_hook_error(
        &self,
        hook: &dyn UseHook,
        point: ExtensionPoint,
        err: RuntimeError,
    ) -> Result<(), RuntimeError> {
        match hook.criticality() {
            HookCriticality::Critical => {
                error!(
                    target: "arbiter::hooks",
                    hook = hook.name(),
                    %point,
                    error = %err,
                    "critical hook failed, aborting invocation"
                );
                Err(RuntimeError::Hook {
                    hook: hook.name(),
                    point: point.into(),
                    reason: err.to_string(),
                })
            }
            HookCriticality::Important => {
                error!(
                    target: "arbiter::hooks",
                    hook = hook.name(),
                    %point,
                    error = %err,
                    "hook failed, continuing"
                );
                Ok(())
            }
            HookCriticality::Optional => {
                debug!(
                    target: "arbiter::hooks",
                    hook = hook.name(),
                    %point,
                    error = %err,
                    "optional hook failed"
                );
                Ok(())
            }
        }
    }
}
