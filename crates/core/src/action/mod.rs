//! Action definitions.
//!
//! An [`ActionDefinition`] is the declarative description of one usable
//! capability of an item: its formulas, scaling rules, critical behavior,
//! multi-attack configuration and resource cost. Definitions are owned by
//! the invoking item and read-only for the duration of a use.

mod conditional;

pub use conditional::{
    Conditional, ConditionalModifier, ConditionalTarget, CritTiming, EffectSubtarget,
    MiscSubtarget,
};

/// One of the six ability scores, used for scaling rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Ability {
    Str,
    Dex,
    Con,
    Int,
    Wis,
    Cha,
}

/// Attack roll configuration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackSpec {
    /// Bonus fragment appended to the base die (`"+5"`, `"@bab + 2"`).
    pub bonus_formula: String,
    /// Extra fragment applied only to the critical confirmation roll.
    pub confirm_bonus_formula: Option<String>,
}

/// One damage formula with its type label.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamagePart {
    pub formula: String,
    pub damage_type: String,
}

impl DamagePart {
    pub fn new(formula: impl Into<String>, damage_type: impl Into<String>) -> Self {
        Self {
            formula: formula.into(),
            damage_type: damage_type.into(),
        }
    }
}

/// Ability-score scaling for attack and damage rolls.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilityScaling {
    /// Ability whose modifier joins the attack roll.
    pub attack: Option<Ability>,
    /// Ability whose modifier joins each damage roll.
    pub damage: Option<Ability>,
    /// Author-fixed damage multiplier; `None` defers to held mode and
    /// natural-attack policy.
    pub damage_mult: Option<f64>,
}

/// Critical threat and multiplier configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CriticalSpec {
    /// Lowest natural roll that threatens a critical.
    pub threat_range: u32,
    /// Damage multiplier on a confirmed critical.
    pub multiplier: u32,
}

impl Default for CriticalSpec {
    fn default() -> Self {
        // Highest face only, double damage.
        Self {
            threat_range: 20,
            multiplier: 2,
        }
    }
}

/// A configured extra attack in a full-attack sequence.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackPart {
    pub label: String,
    pub bonus_formula: String,
}

impl AttackPart {
    pub fn new(label: impl Into<String>, bonus_formula: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bonus_formula: bonus_formula.into(),
        }
    }
}

/// Formula-derived iterative attacks.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormulaicAttacks {
    /// Evaluated once; yields the number of extra attacks.
    pub count_formula: String,
    /// Evaluated per iteration with `@formulaicAttack` bound to the
    /// 1-based iteration number.
    pub bonus_formula: String,
    /// Label template; `{0}` is replaced with the iteration number.
    pub label: Option<String>,
}

/// Natural (innate) attack configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NaturalAttack {
    /// Secondary natural attacks take a fixed attack penalty and halved
    /// ability damage unless explicitly overridden.
    pub primary: bool,
}

/// Saving throw categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SaveType {
    Fortitude,
    Reflex,
    Will,
}

/// Saving throw configuration.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SaveSpec {
    pub save_type: SaveType,
    /// DC formula; the folded conditional DC bonus is added on top.
    pub dc_formula: String,
}

/// Measure-template geometry placed before the attack resolves.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemplateSpec {
    pub shape: TemplateShape,
    /// Size in feet.
    pub size: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum TemplateShape {
    Cone,
    Circle,
    Ray,
    Rect,
}

/// Resource cost configuration.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsesSpec {
    /// Deduct one unit from the item's own limited-use pool.
    pub self_charge: bool,
    /// Charge cost formula; `None` means the action costs nothing.
    pub cost_formula: Option<String>,
}

/// Declarative description of one usable capability.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActionDefinition {
    pub name: String,
    /// `None` means the action has no attack roll (pure damage/effect).
    pub attack: Option<AttackSpec>,
    pub damage: Vec<DamagePart>,
    pub ability: AbilityScaling,
    pub critical: CriticalSpec,
    pub save: Option<SaveSpec>,
    /// Configured extra attacks for full-attack resolution.
    pub extra_attacks: Vec<AttackPart>,
    pub formulaic: Option<FormulaicAttacks>,
    pub natural: Option<NaturalAttack>,
    /// Whether each attack consumes a unit of ammunition.
    pub uses_ammo: bool,
    /// Damage is nonlethal by definition.
    pub nonlethal: bool,
    pub template: Option<TemplateSpec>,
    pub uses: UsesSpec,
    pub conditionals: Vec<Conditional>,
    pub notes: Vec<String>,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            critical: CriticalSpec::default(),
            ..Self::default()
        }
    }

    /// Whether this definition rolls any damage at all.
    pub fn has_damage(&self) -> bool {
        !self.damage.is_empty()
    }

    /// Whether this action belongs to a secondary natural attack.
    pub fn is_secondary_natural(&self) -> bool {
        matches!(self.natural, Some(NaturalAttack { primary: false }))
    }

    // Builder-style helpers, mainly for definition authoring and tests.

    pub fn with_attack(mut self, bonus_formula: impl Into<String>) -> Self {
        self.attack = Some(AttackSpec {
            bonus_formula: bonus_formula.into(),
            confirm_bonus_formula: None,
        });
        self
    }

    pub fn with_damage(mut self, part: DamagePart) -> Self {
        self.damage.push(part);
        self
    }

    pub fn with_critical(mut self, threat_range: u32, multiplier: u32) -> Self {
        self.critical = CriticalSpec {
            threat_range,
            multiplier,
        };
        self
    }

    pub fn with_cost(mut self, cost_formula: impl Into<String>) -> Self {
        self.uses.cost_formula = Some(cost_formula.into());
        self
    }

    pub fn with_conditional(mut self, conditional: Conditional) -> Self {
        self.conditionals.push(conditional);
        self
    }

    pub fn with_formulaic(mut self, count: impl Into<String>, bonus: impl Into<String>) -> Self {
        self.formulaic = Some(FormulaicAttacks {
            count_formula: count.into(),
            bonus_formula: bonus.into(),
            label: None,
        });
        self
    }
}
