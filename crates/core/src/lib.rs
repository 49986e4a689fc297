//! Deterministic action resolution logic shared across hosts.
//!
//! `arbiter-core` turns an action definition, an actor/item snapshot and a
//! use configuration into fully resolved per-attack results. Everything
//! here is pure and synchronous: dice come from a seed-addressed
//! [`formula::RngOracle`], persistence and user interaction live behind the
//! runtime's service ports, and the only mutable record is the
//! per-invocation [`SharedUseContext`].
pub mod action;
pub mod attacks;
pub mod chat_attack;
pub mod conditionals;
pub mod config;
pub mod error;
pub mod formula;
pub mod resource;
pub mod snapshot;
pub mod use_context;
pub use action::{
    Ability, AbilityScaling, ActionDefinition, AttackPart, AttackSpec, Conditional,
    ConditionalModifier, ConditionalTarget, CritTiming, CriticalSpec, DamagePart, EffectSubtarget,
    FormulaicAttacks, MiscSubtarget, NaturalAttack, SaveSpec, SaveType, TemplateShape,
    TemplateSpec, UsesSpec,
};
pub use attacks::{
    AttackEntry, PowerAttack, SECONDARY_ATTACK_PENALTY, ability_damage_mult, assign_ammunition,
    generate_attack_list, is_secondary_natural, power_attack,
};
pub use chat_attack::{AttackRoll, ChatAttack, DamageRoll, PerAttackResolver, ResolutionPolicy};
pub use conditionals::resolve_conditionals;
pub use config::{HouseRules, RoleFlags, UseConfiguration};
pub use error::{CoreError, FailureCode, FormulaRole, UseWarning};
pub use formula::{
    DiceFormula, DieRoll, FormulaOracle, PcgRng, RngOracle, RollOutcome, SequenceRng,
    compute_seed, join_fragments,
};
pub use resource::{
    ChargeCost, ChargeOracle, SnapshotChargeOracle, check_charges, check_requirements,
};
pub use snapshot::{
    Abilities, AbilityScore, ActorSnapshot, AmmoSnapshot, Attributes, EvalContext, HeldMode,
    ItemId, ItemSnapshot, RollData, UsesPool,
};
pub use use_context::{Fragment, FragmentBuckets, SharedUseContext};
