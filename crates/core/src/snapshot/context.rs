//! Scoped evaluation context.

use super::RollData;

/// Read-only view of [`RollData`] plus a transient variable layer.
///
/// A context is built for one formula evaluation and dropped afterwards, so
/// transient bindings (`formulaicAttack`, `critCount`) can never leak into
/// the shared snapshot or into a later evaluation. Layered bindings shadow
/// snapshot values; the last binding for a name wins.
#[derive(Clone, Debug)]
pub struct EvalContext<'a> {
    data: &'a RollData,
    overlay: Vec<(&'a str, f64)>,
}

impl<'a> EvalContext<'a> {
    pub fn new(data: &'a RollData) -> Self {
        Self {
            data,
            overlay: Vec::new(),
        }
    }

    /// Layer a transient binding over the snapshot for this context's
    /// lifetime.
    pub fn with_var(mut self, name: &'a str, value: f64) -> Self {
        self.overlay.push((name, value));
        self
    }

    /// Resolve a variable path: overlay first, then the snapshot.
    pub fn var(&self, path: &str) -> Option<f64> {
        if let Some((_, value)) = self.overlay.iter().rev().find(|(name, _)| *name == path) {
            return Some(*value);
        }
        self.data.resolve(path)
    }

    pub fn data(&self) -> &'a RollData {
        self.data
    }
}
