//! The action use orchestrator.
//!
//! [`ActionUse::process`] runs the whole resolution pipeline for one
//! invocation, strictly sequentially:
//!
//! 1. requirement check (permission, disabled, quantity, self-charge pool)
//! 2. snapshot construction
//! 3. configuration (prompt, or deterministic defaults)
//! 4. attack list generation, ammunition filtering, attack-count clamp
//! 5. conditional resolution
//! 6. cost re-check (conditional charge bonuses included)
//! 7. template placement
//! 8. dice resolution, save DC assembly
//! 9. pre-use veto (rolls back the template)
//! 10. resource consumption (the only persistent write)
//! 11. bundle assembly, pre-display veto, post-use observer
//!
//! Everything before step 10 fails closed: no persistent state has
//! changed. Everything at or after it fails open: failures are logged and
//! the bundle is still delivered.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use arbiter_core::{
    ActionDefinition, ActorSnapshot, ChargeCost, CoreError, DiceFormula,
    FailureCode, FormulaOracle, FormulaRole, HouseRules, ItemSnapshot, PcgRng, PerAttackResolver,
    ResolutionPolicy, RoleFlags, RollData, SharedUseContext, SnapshotChargeOracle,
    UseConfiguration, ability_damage_mult, assign_ammunition, check_charges, check_requirements,
    compute_seed, generate_attack_list, is_secondary_natural, power_attack, resolve_conditionals,
};

use crate::config::ProcessOptions;
use crate::error::{Result, RuntimeError};
use crate::hooks::{ExtensionPoint, HookEvent, HookRegistry, HookVerdict};
use crate::result::{AmmoReport, ResultBundle, SaveResult};
use crate::services::{
    ConfigurationPrompt, DiceVisualizer, Persistence, ResourceUpdate, TemplateHandle,
    TemplateService, UpdateRejection,
};

/// How one `process` call ended.
#[derive(Debug)]
pub enum UseOutcome {
    /// The invocation ran to completion; resources were consumed.
    Completed(Box<ResultBundle>),
    /// Silent abort: prompt cancelled or pre-use veto. Nothing consumed.
    Cancelled,
    /// Expected requirement failure. Nothing consumed, nothing rolled
    /// beyond what the failing check needed.
    Failed(FailureCode),
}

impl UseOutcome {
    pub fn bundle(&self) -> Option<&ResultBundle> {
        match self {
            Self::Completed(bundle) => Some(bundle),
            _ => None,
        }
    }
}

/// One use of one action, fully wired.
///
/// Owns the snapshots taken at invocation start and the injected service
/// ports. A single `ActionUse` runs one invocation at a time; independent
/// invocations get independent instances and share nothing mutable.
pub struct ActionUse {
    actor: ActorSnapshot,
    item: ItemSnapshot,
    action: ActionDefinition,
    house_rules: HouseRules,
    seed: u64,
    evaluator: Arc<dyn FormulaOracle>,
    prompt: Option<Arc<dyn ConfigurationPrompt>>,
    persistence: Arc<dyn Persistence>,
    templates: Option<Arc<dyn TemplateService>>,
    visualizer: Option<Arc<dyn DiceVisualizer>>,
    hooks: HookRegistry,
}

// Seed contexts outside the per-attack range.
const SAVE_DC_SLOT: u32 = u32::MAX;

impl ActionUse {
    pub fn builder() -> ActionUseBuilder {
        ActionUseBuilder::new()
    }

    /// Run the pipeline once.
    pub async fn process(&self, options: &ProcessOptions) -> Result<UseOutcome> {
        // Step 1: requirement gate. Pure read, so a failed invocation is
        // idempotent.
        if let Err(code) = check_requirements(&self.actor, &self.item, &self.action) {
            info!(
                target: "arbiter::use",
                action = %self.action.name,
                code = %code,
                "requirement check failed"
            );
            return Ok(UseOutcome::Failed(code));
        }

        // Step 2: snapshot.
        let data = RollData::for_use(&self.actor, options.die_override.clone());
        let mut ctx = SharedUseContext::new(data);

        self.dispatch(ExtensionPoint::UseCreated, &ctx, None).await?;

        // Step 3: configuration.
        let config = match self.configure(options, &ctx).await {
            Some(config) => config,
            None => {
                debug!(target: "arbiter::use", action = %self.action.name, "prompt cancelled");
                return Ok(UseOutcome::Cancelled);
            }
        };
        self.apply_configuration(&config, &mut ctx);

        // Step 4: attack list, ammunition filter, clamp.
        ctx.attacks =
            generate_attack_list(&self.action, &config, &ctx.roll_data, &*self.evaluator, self.seed)?;
        if self.action.uses_ammo {
            assign_ammunition(&mut ctx.attacks, &self.item, config.ammo_assignments.as_deref());
            ctx.attacks.retain(|entry| entry.ammo.is_some());
            if ctx.attacks.is_empty() {
                info!(target: "arbiter::use", action = %self.action.name, "ammunition depleted");
                return Ok(UseOutcome::Failed(FailureCode::AmmoDepleted));
            }
        }
        if !config.full_attack {
            ctx.attacks.truncate(1);
        }

        // Step 5: conditionals.
        resolve_conditionals(
            &self.action,
            &config.conditionals,
            &mut ctx,
            &*self.evaluator,
            self.seed,
        );
        for warning in &ctx.warnings {
            warn!(target: "arbiter::use", action = %self.action.name, %warning, "conditional skipped");
        }

        // Step 6: cost re-check, now that conditional charge bonuses are in.
        let oracle = SnapshotChargeOracle::new(&*self.evaluator, self.seed);
        let cost = match check_charges(&oracle, &self.action, &self.item, &ctx.roll_data)? {
            Ok(cost) => cost,
            Err(code) => {
                info!(target: "arbiter::use", action = %self.action.name, code = %code, "cost check failed");
                return Ok(UseOutcome::Failed(code));
            }
        };

        // Step 7: template placement. The only pre-commit side effect, so
        // every later abort path has to undo it.
        let template = self.place_template().await?;

        // Step 8: dice resolution and save DC.
        let save = match self.resolve_dice(&config, &mut ctx) {
            Ok(save) => save,
            Err(err) => {
                self.rollback_template(template).await;
                return Err(err.into());
            }
        };

        // Step 9: pre-use veto. Both a veto and a critical hook failure
        // abort before consumption, so both undo the placed template.
        match self.dispatch(ExtensionPoint::PreUse, &ctx, None).await {
            Ok(HookVerdict::Continue) => {}
            Ok(HookVerdict::Veto) => {
                self.rollback_template(template).await;
                return Ok(UseOutcome::Cancelled);
            }
            Err(err) => {
                self.rollback_template(template).await;
                return Err(err);
            }
        }

        // Step 10: consumption. From here the invocation is committed.
        let rejections = self
            .persistence
            .apply_updates(self.consumption_updates(cost, &ctx))
            .await;
        for rejection in &rejections {
            error!(
                target: "arbiter::use",
                action = %self.action.name,
                update = ?rejection.update,
                reason = %rejection.reason,
                "resource update rejected"
            );
        }

        if let Some(visualizer) = &self.visualizer
            && let Err(err) = visualizer.display(&ctx.chat_attacks).await
        {
            // Cosmetic; never blocks delivery.
            error!(target: "arbiter::use", error = %err, "dice visualization failed");
        }

        // Step 11: bundle, pre-display veto, post-use observer. Consumption
        // has committed, so hook failures here are logged, never propagated.
        let mut bundle = self.assemble_bundle(save, &ctx, &rejections);
        match self
            .dispatch(ExtensionPoint::PreDisplay, &ctx, Some(&bundle))
            .await
        {
            Ok(HookVerdict::Veto) => bundle.suppress_display = true,
            Ok(HookVerdict::Continue) => {}
            Err(err) => error!(target: "arbiter::use", error = %err, "pre-display hook failed"),
        }
        if let Err(err) = self.dispatch(ExtensionPoint::PostUse, &ctx, Some(&bundle)).await {
            error!(target: "arbiter::use", error = %err, "post-use hook failed");
        }

        info!(
            target: "arbiter::use",
            action = %self.action.name,
            attacks = bundle.chat_attacks.len(),
            "invocation completed"
        );
        Ok(UseOutcome::Completed(Box::new(bundle)))
    }

    async fn configure(
        &self,
        options: &ProcessOptions,
        ctx: &SharedUseContext,
    ) -> Option<UseConfiguration> {
        if options.skip_prompt {
            return Some(UseConfiguration::defaults_for(
                &self.action,
                options.full_attack,
            ));
        }
        match &self.prompt {
            Some(prompt) => prompt.show(&self.action, &ctx.roll_data).await,
            None => Some(UseConfiguration::defaults_for(
                &self.action,
                options.full_attack,
            )),
        }
    }

    /// Fold the chosen configuration into the shared context: snapshot
    /// overrides, dialog fragments, and role-flag math.
    fn apply_configuration(&self, config: &UseConfiguration, ctx: &mut SharedUseContext) {
        if let Some(die) = &config.die_override {
            ctx.roll_data.die_override = Some(die.clone());
        }
        if let Some(held) = config.held_override {
            ctx.roll_data.held = held;
        }

        ctx.extra_attack_fragments
            .extend(config.extra_attack_fragments.iter().cloned());
        ctx.extra_damage_fragments
            .extend(config.extra_damage_fragments.iter().cloned());

        if config.roles.contains(RoleFlags::POWER_ATTACK) {
            let trade = power_attack(
                ctx.roll_data.attributes.bab,
                ctx.roll_data.held,
                is_secondary_natural(&self.action, config),
            );
            ctx.roll_data
                .set_var("powerAttackPenalty", f64::from(trade.penalty));
            ctx.roll_data
                .set_var("powerAttackBonus", f64::from(trade.damage_bonus));
            ctx.extra_attack_fragments
                .push("@powerAttackPenalty".to_string());
            ctx.extra_damage_fragments
                .push("@powerAttackBonus".to_string());
        }
        if config.roles.contains(RoleFlags::POINT_BLANK) {
            ctx.extra_attack_fragments.push("1".to_string());
            ctx.extra_damage_fragments.push("1".to_string());
        }
        // Rapid shot grants its extra attack only on full attacks, so the
        // list-wide penalty is scoped the same way.
        if config.full_attack && config.roles.contains(RoleFlags::RAPID_SHOT) {
            ctx.extra_attack_fragments.push("-2".to_string());
        }
    }

    /// Resolve every attack entry and the save DC. Pure except for the
    /// ammunition ledger and chat-attack accumulation in `ctx`.
    fn resolve_dice(
        &self,
        config: &UseConfiguration,
        ctx: &mut SharedUseContext,
    ) -> std::result::Result<Option<SaveResult>, CoreError> {
        let policy = self.resolution_policy(config, &ctx.roll_data);
        let resolver = PerAttackResolver {
            action: &self.action,
            actor: &self.actor,
            item: &self.item,
            policy,
            evaluator: &*self.evaluator,
            seed: self.seed,
        };

        let entries = ctx.attacks.clone();
        let mut chats = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            chats.push(resolver.resolve(entry, index as u32, ctx)?);
        }
        ctx.chat_attacks = chats;

        // Ledger: only stacks that were actually assigned and rolled, and
        // only non-abundant ones.
        for entry in &entries {
            if let Some(id) = entry.ammo
                && let Some(stack) = self.item.ammo_stack(id)
                && !stack.abundant
            {
                ctx.record_ammo_use(id);
            }
        }

        self.resolve_save(ctx).map_err(|formula| {
            CoreError::formula(FormulaRole::SaveDc, formula)
        })
    }

    fn resolve_save(
        &self,
        ctx: &SharedUseContext,
    ) -> std::result::Result<Option<SaveResult>, String> {
        let Some(save) = &self.action.save else {
            return Ok(None);
        };

        let outcome = self.evaluator.evaluate(
            &save.dc_formula,
            &arbiter_core::EvalContext::new(&ctx.roll_data),
            compute_seed(self.seed, SAVE_DC_SLOT, 0),
        );
        if outcome.error {
            return Err(save.dc_formula.clone());
        }
        Ok(Some(SaveResult {
            save_type: save.save_type,
            dc: outcome.floored() as i32 + ctx.roll_data.dc_bonus,
        }))
    }

    fn resolution_policy(&self, config: &UseConfiguration, data: &RollData) -> ResolutionPolicy {
        let ability_attack_mod = self
            .action
            .ability
            .attack
            .map(|ability| data.abilities.score_of(ability).modifier())
            .unwrap_or(0);
        let ability_damage_bonus = self
            .action
            .ability
            .damage
            .map(|ability| {
                let modifier = f64::from(data.abilities.score_of(ability).modifier());
                (modifier * ability_damage_mult(&self.action, config, data.held)).floor() as i64
            })
            .unwrap_or(0);

        ResolutionPolicy {
            confirm_criticals: self.house_rules.confirm_criticals,
            target_defense: config.target_defense,
            ability_attack_mod,
            ability_damage_bonus,
            secondary: is_secondary_natural(&self.action, config) == Some(true),
        }
    }

    fn consumption_updates(&self, cost: ChargeCost, ctx: &SharedUseContext) -> Vec<ResourceUpdate> {
        let mut updates = Vec::new();

        for (&stack, &used) in &ctx.ammo_ledger {
            updates.push(ResourceUpdate::Quantity {
                item: stack,
                delta: -i64::from(used),
            });
        }
        if let ChargeCost::Finite(cost) = cost
            && cost > 0
        {
            updates.push(ResourceUpdate::Charges {
                item: self.item.id,
                delta: -cost,
            });
        }
        if self.action.uses.self_charge {
            updates.push(ResourceUpdate::SelfUses {
                item: self.item.id,
                delta: -1,
            });
        }

        updates
    }

    fn assemble_bundle(
        &self,
        save: Option<SaveResult>,
        ctx: &SharedUseContext,
        rejections: &[UpdateRejection],
    ) -> ResultBundle {
        let ammo_report = ctx
            .ammo_ledger
            .iter()
            .map(|(&stack, &used)| {
                let (name, remaining) = self
                    .item
                    .ammo_stack(stack)
                    .map(|s| (s.name.clone(), s.quantity.saturating_sub(used)))
                    .unwrap_or_default();
                AmmoReport {
                    stack,
                    name,
                    used,
                    remaining,
                }
            })
            .collect();

        // Rejected consumption writes belong to the caller-facing report,
        // not just the log.
        let warnings = ctx
            .warnings
            .iter()
            .map(ToString::to_string)
            .chain(rejections.iter().map(|rejection| {
                format!(
                    "resource update {:?} rejected: {}",
                    rejection.update, rejection.reason
                )
            }))
            .collect();

        ResultBundle {
            chat_attacks: ctx.chat_attacks.clone(),
            save,
            warnings,
            ammo_report,
            rolls_metadata: self.rolls_metadata(ctx),
            suppress_display: false,
        }
    }

    fn rolls_metadata(&self, ctx: &SharedUseContext) -> serde_json::Value {
        let attacks: Vec<serde_json::Value> = ctx
            .chat_attacks
            .iter()
            .map(|chat| {
                serde_json::json!({
                    "label": chat.label,
                    "attack": chat.attack.as_ref().map(|roll| serde_json::json!({
                        "formula": roll.formula,
                        "natural": roll.natural,
                        "total": roll.total,
                        "threat": roll.threat,
                    })),
                    "confirmation": chat.critical_confirmation.as_ref().map(|roll| serde_json::json!({
                        "formula": roll.formula,
                        "total": roll.total,
                    })),
                    "damage": chat.damage.as_ref().map(|dmg| serde_json::json!({
                        "formula": dmg.formula,
                        "total": dmg.total,
                    })),
                    "critical_damage": chat.critical_damage.as_ref().map(|dmg| serde_json::json!({
                        "formula": dmg.formula,
                        "total": dmg.total,
                    })),
                })
            })
            .collect();

        serde_json::json!({
            "seed": self.seed,
            "attacks": attacks,
        })
    }

    async fn place_template(&self) -> Result<Option<TemplateHandle>> {
        let (Some(spec), Some(service)) = (&self.action.template, &self.templates) else {
            return Ok(None);
        };
        let handle = service.place(spec).await?;
        debug!(target: "arbiter::use", action = %self.action.name, ?handle, "template placed");
        Ok(Some(handle))
    }

    async fn rollback_template(&self, handle: Option<TemplateHandle>) {
        let (Some(handle), Some(service)) = (handle, &self.templates) else {
            return;
        };
        if let Err(err) = service.remove(handle).await {
            warn!(target: "arbiter::use", ?handle, error = %err, "template rollback failed");
        }
    }

    async fn dispatch(
        &self,
        point: ExtensionPoint,
        ctx: &SharedUseContext,
        bundle: Option<&ResultBundle>,
    ) -> Result<HookVerdict> {
        let event = HookEvent {
            point,
            action: &self.action,
            actor: &self.actor,
            item: &self.item,
            context: ctx,
            bundle,
        };
        self.hooks.dispatch(point, &event).await
    }
}

/// Builder for [`ActionUse`] with optional ports defaulted.
pub struct ActionUseBuilder {
    actor: ActorSnapshot,
    item: ItemSnapshot,
    action: ActionDefinition,
    house_rules: HouseRules,
    seed: u64,
    evaluator: Option<Arc<dyn FormulaOracle>>,
    prompt: Option<Arc<dyn ConfigurationPrompt>>,
    persistence: Option<Arc<dyn Persistence>>,
    templates: Option<Arc<dyn TemplateService>>,
    visualizer: Option<Arc<dyn DiceVisualizer>>,
    hooks: HookRegistry,
}

impl ActionUseBuilder {
    fn new() -> Self {
        Self {
            actor: ActorSnapshot::default(),
            item: ItemSnapshot::default(),
            action: ActionDefinition::new(""),
            house_rules: HouseRules::default(),
            seed: 0,
            evaluator: None,
            prompt: None,
            persistence: None,
            templates: None,
            visualizer: None,
            hooks: HookRegistry::default(),
        }
    }

    pub fn actor(mut self, actor: ActorSnapshot) -> Self {
        self.actor = actor;
        self
    }

    pub fn item(mut self, item: ItemSnapshot) -> Self {
        self.item = item;
        self
    }

    pub fn action(mut self, action: ActionDefinition) -> Self {
        self.action = action;
        self
    }

    pub fn house_rules(mut self, house_rules: HouseRules) -> Self {
        self.house_rules = house_rules;
        self
    }

    /// Invocation seed; every die drawn during the use derives from it.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the default evaluator (scripted rolls in tests).
    pub fn evaluator(mut self, evaluator: impl FormulaOracle + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub fn prompt(mut self, prompt: impl ConfigurationPrompt + 'static) -> Self {
        self.prompt = Some(Arc::new(prompt));
        self
    }

    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn templates(mut self, templates: Arc<dyn TemplateService>) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn visualizer(mut self, visualizer: impl DiceVisualizer + 'static) -> Self {
        self.visualizer = Some(Arc::new(visualizer));
        self
    }

    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> Result<ActionUse> {
        let persistence = self.persistence.ok_or(RuntimeError::MissingPersistence)?;
        let evaluator = self
            .evaluator
            .unwrap_or_else(|| Arc::new(DiceFormula::new(PcgRng)));

        Ok(ActionUse {
            actor: self.actor,
            item: self.item,
            action: self.action,
            house_rules: self.house_rules,
            seed: self.seed,
            evaluator,
            prompt: self.prompt,
            persistence,
            templates: self.templates,
            visualizer: self.visualizer,
            hooks: self.hooks,
        })
    }
}
