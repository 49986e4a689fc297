//! Conditional modifiers.
//!
//! A conditional is a named, optionally default-enabled bundle of formula
//! modifiers attached to an action. Selected conditionals are resolved once
//! per invocation: each modifier's total is recorded in the snapshot under
//! `conditionals.<name>` and its formula text is routed into a target
//! bucket (see `conditionals::resolve`).

/// Which roll a conditional modifier contributes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ConditionalTarget {
    /// Attack roll fragment.
    Attack,
    /// Damage roll fragment.
    Damage,
    /// Pre-summed into a snapshot field consumed by later stages.
    Effect(EffectSubtarget),
    /// Pre-summed into the charge-cost bonus.
    Misc(MiscSubtarget),
    /// Applied immediately as a delta to the snapshot's size modifier.
    Size,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EffectSubtarget {
    CasterLevel,
    SaveDc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MiscSubtarget {
    Charges,
}

/// When a fragment joins the roll it targets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CritTiming {
    /// Normal and critical rolls alike.
    #[default]
    Always,
    /// Only the confirmation roll / critical damage repetitions.
    CritOnly,
    /// Only the normal roll.
    NonCritOnly,
}

impl CritTiming {
    /// Whether a fragment with this timing participates in a roll of the
    /// given criticality.
    pub fn applies(self, critical: bool) -> bool {
        match self {
            CritTiming::Always => true,
            CritTiming::CritOnly => critical,
            CritTiming::NonCritOnly => !critical,
        }
    }
}

/// One formula contribution inside a conditional.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionalModifier {
    pub formula: String,
    pub target: ConditionalTarget,
    pub timing: CritTiming,
}

impl ConditionalModifier {
    pub fn new(formula: impl Into<String>, target: ConditionalTarget) -> Self {
        Self {
            formula: formula.into(),
            target,
            timing: CritTiming::Always,
        }
    }

    pub fn crit_only(mut self) -> Self {
        self.timing = CritTiming::CritOnly;
        self
    }

    pub fn non_crit_only(mut self) -> Self {
        self.timing = CritTiming::NonCritOnly;
        self
    }
}

/// Named bundle of conditional modifiers.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Conditional {
    pub name: String,
    /// Pre-selected when configuration is skipped.
    pub default_on: bool,
    pub modifiers: Vec<ConditionalModifier>,
}

impl Conditional {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_on: false,
            modifiers: Vec::new(),
        }
    }

    pub fn default_on(mut self) -> Self {
        self.default_on = true;
        self
    }

    pub fn with_modifier(mut self, modifier: ConditionalModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }
}
