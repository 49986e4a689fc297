//! End-to-end pipeline tests with in-memory service ports.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use arbiter_core::{
    ActionDefinition, ActorSnapshot, AmmoSnapshot, AttackPart, DamagePart, DiceFormula,
    EvalContext, FailureCode, FormulaOracle, ItemId, ItemSnapshot, RoleFlags, RollData,
    RollOutcome, SequenceRng, TemplateShape, TemplateSpec, UseConfiguration, UsesPool,
};
use arbiter_runtime::{
    ActionUse, ConfigurationPrompt, ExtensionPoint, HookCriticality, HookEvent, HookRegistry,
    HookVerdict, Persistence, ProcessOptions, ResourceUpdate, Result, RuntimeError,
    TemplateHandle, TemplateService, UpdateRejection, UseHook, UseOutcome,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Records every batch handed to the persistence layer.
#[derive(Default)]
struct MemoryPersistence {
    batches: Mutex<Vec<Vec<ResourceUpdate>>>,
}

impl MemoryPersistence {
    fn all_updates(&self) -> Vec<ResourceUpdate> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn apply_updates(&self, updates: Vec<ResourceUpdate>) -> Vec<UpdateRejection> {
        self.batches.lock().unwrap().push(updates);
        Vec::new()
    }
}

/// Counts placements and removals for rollback assertions.
#[derive(Default)]
struct CountingTemplates {
    placed: AtomicU64,
    removed: AtomicU64,
}

#[async_trait]
impl TemplateService for CountingTemplates {
    async fn place(&self, _template: &TemplateSpec) -> Result<TemplateHandle> {
        let id = self.placed.fetch_add(1, Ordering::SeqCst);
        Ok(TemplateHandle(id))
    }

    async fn remove(&self, _handle: TemplateHandle) -> Result<()> {
        self.removed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Evaluator wrapper that logs every formula it is asked to evaluate.
#[derive(Clone)]
struct Recording {
    inner: Arc<DiceFormula<SequenceRng>>,
    formulas: Arc<Mutex<Vec<String>>>,
}

impl Recording {
    fn new(rolls: Vec<u32>) -> Self {
        Self {
            inner: Arc::new(DiceFormula::new(SequenceRng::new(rolls))),
            formulas: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FormulaOracle for Recording {
    fn evaluate(&self, formula: &str, ctx: &EvalContext<'_>, seed: u64) -> RollOutcome {
        self.formulas.lock().unwrap().push(formula.to_string());
        self.inner.evaluate(formula, ctx, seed)
    }
}

/// Hook that vetoes at exactly one point.
struct VetoAt(ExtensionPoint);

#[async_trait]
impl UseHook for VetoAt {
    fn name(&self) -> &'static str {
        "veto-at"
    }

    async fn on_event(&self, event: &HookEvent<'_>) -> std::result::Result<HookVerdict, RuntimeError> {
        if event.point == self.0 {
            Ok(HookVerdict::Veto)
        } else {
            Ok(HookVerdict::Continue)
        }
    }
}

/// Critical hook that fails at exactly one point.
struct FailingAt(ExtensionPoint);

#[async_trait]
impl UseHook for FailingAt {
    fn name(&self) -> &'static str {
        "failing-at"
    }

    fn criticality(&self) -> HookCriticality {
        HookCriticality::Critical
    }

    async fn on_event(&self, event: &HookEvent<'_>) -> std::result::Result<HookVerdict, RuntimeError> {
        if event.point == self.0 {
            Err(RuntimeError::Hook {
                hook: "failing-at",
                point: self.0.into(),
                reason: "backend offline".into(),
            })
        } else {
            Ok(HookVerdict::Continue)
        }
    }
}

/// Persistence that rejects every update it is handed.
#[derive(Default)]
struct RejectingPersistence;

#[async_trait]
impl Persistence for RejectingPersistence {
    async fn apply_updates(&self, updates: Vec<ResourceUpdate>) -> Vec<UpdateRejection> {
        updates
            .into_iter()
            .map(|update| UpdateRejection {
                update,
                reason: "storage offline".into(),
            })
            .collect()
    }
}

/// Prompt that always answers with a fixed configuration.
struct FixedPrompt(UseConfiguration);

#[async_trait]
impl ConfigurationPrompt for FixedPrompt {
    async fn show(&self, _action: &ActionDefinition, _data: &RollData) -> Option<UseConfiguration> {
        Some(self.0.clone())
    }
}

struct CancellingPrompt;

#[async_trait]
impl ConfigurationPrompt for CancellingPrompt {
    async fn show(&self, _action: &ActionDefinition, _data: &RollData) -> Option<UseConfiguration> {
        None
    }
}

fn actor() -> ActorSnapshot {
    ActorSnapshot {
        can_use: true,
        ..ActorSnapshot::default()
    }
}

fn shortbow() -> ActionDefinition {
    ActionDefinition::new("Shortbow")
        .with_attack("+5")
        .with_damage(DamagePart::new("1d6+3", "piercing"))
        .with_critical(20, 2)
}

#[tokio::test]
async fn requirement_failure_is_idempotent_and_writes_nothing() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());
    let item = ItemSnapshot {
        disabled: true,
        ..ItemSnapshot::default()
    };
    let action_use = ActionUse::builder()
        .actor(actor())
        .item(item)
        .action(shortbow())
        .persistence(persistence.clone())
        .build()
        .unwrap();

    for _ in 0..2 {
        let outcome = action_use.process(&ProcessOptions::scripted()).await.unwrap();
        assert!(matches!(
            outcome,
            UseOutcome::Failed(FailureCode::SourceDisabled)
        ));
    }
    assert!(persistence.all_updates().is_empty());
}

#[tokio::test]
async fn insufficient_charges_fails_before_any_roll() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());
    let evaluator = Recording::new(vec![20]);
    let formulas = evaluator.formulas.clone();

    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot {
            charges: 0,
            ..ItemSnapshot::default()
        })
        .action(shortbow().with_cost("1"))
        .evaluator(evaluator)
        .persistence(persistence.clone())
        .build()
        .unwrap();

    let outcome = action_use.process(&ProcessOptions::scripted()).await.unwrap();
    assert!(matches!(
        outcome,
        UseOutcome::Failed(FailureCode::InsufficientCharges)
    ));

    // Only the cost formula was evaluated; no attack die was drawn.
    let evaluated = formulas.lock().unwrap();
    assert!(evaluated.iter().all(|f| !f.contains("d20")), "{evaluated:?}");
    assert!(persistence.all_updates().is_empty());
}

#[tokio::test]
async fn ammunition_exhaustion_limits_attacks_and_ledger() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());
    let mut action = shortbow();
    action.uses_ammo = true;
    action.extra_attacks.push(AttackPart::new("Second", "-5"));
    action.extra_attacks.push(AttackPart::new("Third", "-10"));

    let item = ItemSnapshot {
        ammo: vec![AmmoSnapshot {
            id: ItemId(7),
            name: "arrows".into(),
            quantity: 2,
            abundant: false,
            misfire: false,
        }],
        ..ItemSnapshot::default()
    };

    let action_use = ActionUse::builder()
        .actor(actor())
        .item(item)
        .action(action)
        .persistence(persistence.clone())
        .build()
        .unwrap();

    let options = ProcessOptions {
        skip_prompt: true,
        full_attack: true,
        ..ProcessOptions::default()
    };
    let outcome = action_use.process(&options).await.unwrap();
    let bundle = outcome.bundle().expect("completed");

    // Three entries generated, the unassigned third dropped.
    assert_eq!(bundle.chat_attacks.len(), 2);
    assert_eq!(bundle.ammo_report.len(), 1);
    assert_eq!(bundle.ammo_report[0].used, 2);
    assert_eq!(bundle.ammo_report[0].remaining, 0);

    let updates = persistence.all_updates();
    assert!(updates.contains(&ResourceUpdate::Quantity {
        item: ItemId(7),
        delta: -2,
    }));
}

#[tokio::test]
async fn depleted_ammunition_aborts_before_rolling() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());
    let mut action = shortbow();
    action.uses_ammo = true;

    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot::default()) // no ammo stacks at all
        .action(action)
        .persistence(persistence.clone())
        .build()
        .unwrap();

    let outcome = action_use.process(&ProcessOptions::scripted()).await.unwrap();
    assert!(matches!(
        outcome,
        UseOutcome::Failed(FailureCode::AmmoDepleted)
    ));
    assert!(persistence.all_updates().is_empty());
}

#[tokio::test]
async fn forced_natural_twenty_confirms_once_and_doubles_damage() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());

    // attack d20=20, confirmation d20=10, damage 1d6=4, crit 1d6=2
    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot::default())
        .action(shortbow())
        .evaluator(Recording::new(vec![20, 10, 4, 2]))
        .persistence(persistence.clone())
        .build()
        .unwrap();

    let outcome = action_use.process(&ProcessOptions::scripted()).await.unwrap();
    let bundle = outcome.bundle().expect("completed");
    assert_eq!(bundle.chat_attacks.len(), 1);

    let chat = &bundle.chat_attacks[0];
    let attack = chat.attack.as_ref().unwrap();
    assert_eq!(attack.total, 25);
    assert_eq!(attack.natural, 20);
    assert!(attack.threat);

    // Exactly one confirmation roll and one extra damage repetition.
    assert!(chat.critical_confirmation.is_some());
    assert!(chat.critical_confirmed);
    assert_eq!(chat.damage.as_ref().unwrap().total, 7);
    assert_eq!(chat.critical_damage.as_ref().unwrap().total, 5);
    assert_eq!(bundle.total_damage(), 12);
}

#[tokio::test]
async fn pre_use_veto_rolls_back_template_and_consumes_nothing() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());
    let templates = Arc::new(CountingTemplates::default());

    let mut action = shortbow().with_cost("1");
    action.template = Some(TemplateSpec {
        shape: TemplateShape::Cone,
        size: 15,
    });

    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot {
            charges: 5,
            ..ItemSnapshot::default()
        })
        .action(action)
        .persistence(persistence.clone())
        .templates(templates.clone())
        .hooks(HookRegistry::new(vec![
            Arc::new(VetoAt(ExtensionPoint::PreUse)) as Arc<dyn UseHook>,
        ]))
        .build()
        .unwrap();

    let outcome = action_use.process(&ProcessOptions::scripted()).await.unwrap();
    assert!(matches!(outcome, UseOutcome::Cancelled));
    assert_eq!(templates.placed.load(Ordering::SeqCst), 1);
    assert_eq!(templates.removed.load(Ordering::SeqCst), 1);
    assert!(persistence.all_updates().is_empty());
}

#[tokio::test]
async fn pre_display_veto_suppresses_display_after_commit() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());

    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot {
            charges: 5,
            ..ItemSnapshot::default()
        })
        .action(shortbow().with_cost("2"))
        .persistence(persistence.clone())
        .hooks(HookRegistry::new(vec![
            Arc::new(VetoAt(ExtensionPoint::PreDisplay)) as Arc<dyn UseHook>,
        ]))
        .build()
        .unwrap();

    let outcome = action_use.process(&ProcessOptions::scripted()).await.unwrap();
    let bundle = outcome.bundle().expect("completed");
    assert!(bundle.suppress_display);

    // Consumption already committed; the veto only gags presentation.
    assert!(persistence.all_updates().contains(&ResourceUpdate::Charges {
        item: ItemId(0),
        delta: -2,
    }));
}

#[tokio::test]
async fn cancelled_prompt_aborts_silently() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());
    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot::default())
        .action(shortbow())
        .prompt(CancellingPrompt)
        .persistence(persistence.clone())
        .build()
        .unwrap();

    let options = ProcessOptions::default(); // interactive
    let outcome = action_use.process(&options).await.unwrap();
    assert!(matches!(outcome, UseOutcome::Cancelled));
    assert!(persistence.all_updates().is_empty());
}

#[tokio::test]
async fn critical_hook_failure_before_consumption_rolls_back_template() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());
    let templates = Arc::new(CountingTemplates::default());

    let mut action = shortbow();
    action.template = Some(TemplateSpec {
        shape: TemplateShape::Cone,
        size: 15,
    });

    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot::default())
        .action(action)
        .persistence(persistence.clone())
        .templates(templates.clone())
        .hooks(HookRegistry::new(vec![
            Arc::new(FailingAt(ExtensionPoint::PreUse)) as Arc<dyn UseHook>,
        ]))
        .build()
        .unwrap();

    let result = action_use.process(&ProcessOptions::scripted()).await;
    assert!(matches!(result, Err(RuntimeError::Hook { .. })));

    // The abort happened before consumption, so the placed template is
    // undone and nothing is written.
    assert_eq!(templates.placed.load(Ordering::SeqCst), 1);
    assert_eq!(templates.removed.load(Ordering::SeqCst), 1);
    assert!(persistence.all_updates().is_empty());
}

#[tokio::test]
async fn rapid_shot_penalty_only_applies_on_full_attacks() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());
    let evaluator = Recording::new(vec![10, 3]);
    let formulas = evaluator.formulas.clone();

    let config = UseConfiguration {
        roles: RoleFlags::RAPID_SHOT,
        ..UseConfiguration::default()
    };
    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot::default())
        .action(shortbow())
        .evaluator(evaluator)
        .prompt(FixedPrompt(config))
        .persistence(persistence.clone())
        .build()
        .unwrap();

    let outcome = action_use.process(&ProcessOptions::default()).await.unwrap();
    let bundle = outcome.bundle().expect("completed");

    // Single attack: no extra rapid-shot entry and no list-wide penalty.
    assert_eq!(bundle.chat_attacks.len(), 1);
    let evaluated = formulas.lock().unwrap();
    assert!(evaluated.iter().all(|f| !f.contains("-2")), "{evaluated:?}");
}

#[tokio::test]
async fn rejected_updates_surface_as_bundle_warnings() {
    init_tracing();
    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot {
            charges: 5,
            ..ItemSnapshot::default()
        })
        .action(shortbow().with_cost("2"))
        .persistence(Arc::new(RejectingPersistence))
        .build()
        .unwrap();

    let outcome = action_use.process(&ProcessOptions::scripted()).await.unwrap();
    let bundle = outcome.bundle().expect("completed");
    assert!(
        bundle
            .warnings
            .iter()
            .any(|w| w.contains("storage offline")),
        "{:?}",
        bundle.warnings
    );
}

#[tokio::test]
async fn self_charge_action_consumes_one_pool_unit() {
    init_tracing();
    let persistence = Arc::new(MemoryPersistence::default());
    let mut action = shortbow();
    action.uses.self_charge = true;

    let action_use = ActionUse::builder()
        .actor(actor())
        .item(ItemSnapshot {
            id: ItemId(3),
            self_uses: UsesPool::new(2, 3),
            ..ItemSnapshot::default()
        })
        .action(action)
        .persistence(persistence.clone())
        .build()
        .unwrap();

    let outcome = action_use.process(&ProcessOptions::scripted()).await.unwrap();
    assert!(outcome.bundle().is_some());
    assert!(persistence.all_updates().contains(&ResourceUpdate::SelfUses {
        item: ItemId(3),
        delta: -1,
    }));
}
