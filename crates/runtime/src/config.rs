//! Invocation-level options supplied by the caller.
//!
//! These are distinct from [`UseConfiguration`](arbiter_core::UseConfiguration):
//! the configuration describes *what the user chose* (usually via the
//! prompt), while [`ProcessOptions`] describes *how the host invoked the
//! pipeline* (scripted vs. interactive, forced full attack, die override).

/// How one `process` call should run.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessOptions {
    /// Skip the interactive prompt and synthesize deterministic defaults.
    pub skip_prompt: bool,
    /// When the prompt is skipped, resolve the full multi-attack sequence
    /// instead of a single attack.
    pub full_attack: bool,
    /// Replace the base attack die for this invocation. A die override
    /// chosen in the prompt wins over this one.
    pub die_override: Option<String>,
}

impl ProcessOptions {
    /// Scripted invocation: no prompt, single attack.
    pub fn scripted() -> Self {
        Self {
            skip_prompt: true,
            ..Self::default()
        }
    }
}
