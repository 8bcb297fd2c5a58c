use async_trait::async_trait;
use data_alchemist::translator::{GatewayOutcome, InsightResponse, Intent, ProposalKind, TranslatorGateway};
use data_alchemist::{
    CellValue, Client, EntityKind, EntitySnapshot, FieldFilter, FilterLogic, FilterOperator, FilterSpec,
    IntentTranslator, KeywordTranslator, ModificationAction, RuleDraft, RuleKind, Surface, Task, Translation,
    TranslationContext, TranslationRequest, TranslatorError, Worker,
};
use std::sync::Arc;
use std::time::Duration;

fn snapshot() -> EntitySnapshot {
    EntitySnapshot::new(
        vec![
            Client::new("C1", "Acme", 2).with_group("Enterprise"),
            Client::new("C2", "Globex", 5),
        ],
        vec![
            Worker::new("W1", "Ann", "python,sql", "1,2").with_group("Sales"),
            Worker::new("W2", "Bo", "design", "3").with_group("Ops"),
        ],
        vec![
            Task::new("T1", "ETL", 3).with_required_skills("python"),
            Task::new("T2", "Mockups", 1).with_required_skills("design,python"),
            Task::new("T3", "Report", 2).with_required_skills("ml"),
        ],
    )
}

fn translate(surface: Surface, text: &str) -> Result<Translation, TranslatorError> {
    KeywordTranslator::new().translate_text(&TranslationRequest::new(surface, text), &snapshot())
}

fn rule_draft(translation: &Translation) -> &RuleDraft {
    match &translation.intent {
        Intent::Rule(draft) => draft,
        other => panic!("expected a rule, got {other:?}"),
    }
}

#[test]
fn co_run_phrases_become_co_run_rules() {
    let translation = translate(Surface::Rule, "T1 and T2 should run together").unwrap();
    assert_eq!(rule_draft(&translation), &RuleDraft::co_run(["T1", "T2"]));
    assert_eq!(translation.confidence, 0.9);
}

#[test]
fn after_reverses_precedence_order() {
    let translation = translate(Surface::Rule, "T2 must start after T1").unwrap();
    assert_eq!(rule_draft(&translation), &RuleDraft::precedence("T1", "T2"));

    let forward = translate(Surface::Rule, "T3 before T1").unwrap();
    assert_eq!(rule_draft(&forward), &RuleDraft::precedence("T3", "T1"));
}

#[test]
fn phase_windows_expand_ranges() {
    let translation = translate(Surface::Rule, "T3 only in phases 1-3 or 5").unwrap();
    assert_eq!(
        rule_draft(&translation),
        &RuleDraft::phase_window("T3", vec![1, 2, 3, 5])
    );
}

#[test]
fn load_limits_pick_up_known_groups() {
    let translation = translate(Surface::Rule, "limit Sales to 3 slots per phase").unwrap();
    assert_eq!(rule_draft(&translation), &RuleDraft::load_limit("Sales", 3));
    assert_eq!(translation.confidence, 0.9);
}

#[test]
fn slot_restrictions_prefer_client_groups_when_clients_are_mentioned() {
    let translation = translate(Surface::Rule, "clients in Enterprise need 2 common slots").unwrap();
    assert!(matches!(
        &rule_draft(&translation).kind,
        RuleKind::SlotRestriction { group, min_common_slots: 2 } if group.name() == "Enterprise"
    ));
}

#[test]
fn unrelated_rule_text_is_unrecognized() {
    assert!(matches!(
        translate(Surface::Rule, "make everything faster"),
        Err(TranslatorError::Unrecognized(_))
    ));
    assert!(matches!(
        translate(Surface::Rule, "   "),
        Err(TranslatorError::Unrecognized(_))
    ));
}

#[test]
fn search_builds_numeric_filters() {
    let translation = translate(Surface::Search, "tasks with duration greater than 2").unwrap();
    let Intent::Filter(spec) = &translation.intent else {
        panic!("expected a filter");
    };
    assert_eq!(
        spec,
        &FilterSpec {
            entity: Some(EntityKind::Tasks),
            filters: vec![FieldFilter::new("Duration", FilterOperator::Greater, 2i64)],
            logic: FilterLogic::And,
        }
    );
    assert_eq!(spec.apply(&snapshot()).tasks, vec![0]);
}

#[test]
fn search_or_clauses_use_any_logic() {
    let translation = translate(Surface::Search, "workers with skill design or group Sales").unwrap();
    let Intent::Filter(spec) = &translation.intent else {
        panic!("expected a filter");
    };
    assert_eq!(spec.logic, FilterLogic::Or);
    assert_eq!(
        spec.filters,
        vec![
            FieldFilter::new("Skills", FilterOperator::Contains, "design"),
            FieldFilter::equals("WorkerGroup", "Sales"),
        ]
    );
    assert_eq!(spec.apply(&snapshot()).workers, vec![0, 1]);
}

#[test]
fn targeted_updates_are_scoped_to_one_record() {
    let translation = translate(Surface::Modification, "change priority level to 4 for C2").unwrap();
    let Intent::Modification(intent) = &translation.intent else {
        panic!("expected a modification");
    };
    assert_eq!(intent.action, ModificationAction::Update);
    assert_eq!(intent.entity, EntityKind::Clients);
    assert_eq!(intent.filters, vec![FieldFilter::equals("ClientID", "C2")]);
    assert_eq!(intent.changes.get("PriorityLevel"), Some(&CellValue::Integer(4)));
    assert_eq!(translation.confidence, 0.95);
}

#[test]
fn unscoped_updates_get_low_confidence() {
    let translation = translate(Surface::Modification, "set duration to 4").unwrap();
    let Intent::Modification(intent) = &translation.intent else {
        panic!("expected a modification");
    };
    assert!(intent.filters.is_empty());
    assert_eq!(translation.confidence, 0.5);
}

#[test]
fn deletes_target_the_named_record() {
    let translation = translate(Surface::Modification, "delete task T2").unwrap();
    let Intent::Modification(intent) = &translation.intent else {
        panic!("expected a modification");
    };
    assert_eq!(intent.action, ModificationAction::Delete);
    assert_eq!(intent.entity, EntityKind::Tasks);
    assert_eq!(intent.filters, vec![FieldFilter::equals("TaskID", "T2")]);
}

#[test]
fn insight_reports_skill_demand() {
    let translation = translate(Surface::Insight, "which skills are most in demand?").unwrap();
    let Intent::Insight(response) = &translation.intent else {
        panic!("expected an insight");
    };
    assert_eq!(response.answer, "Most requested skill: python (2 tasks)");
    assert_eq!(response.suggestions, vec!["Add a worker with ml skill"]);
}

#[test]
fn insight_falls_back_to_an_overview() {
    let translation = translate(Surface::Insight, "tell me about the data").unwrap();
    let Intent::Insight(response) = &translation.intent else {
        panic!("expected an insight");
    };
    assert_eq!(response.answer, "2 clients, 2 workers, 3 tasks loaded");
    assert_eq!(translation.confidence, 0.6);
}

/// Replies with a fixed translation after an optional delay, or fails.
struct Scripted {
    delay: Duration,
    reply: Result<Translation, TranslatorError>,
}

impl Scripted {
    fn replying(intent: Intent, confidence: f64) -> Self {
        Self {
            delay: Duration::ZERO,
            reply: Ok(Translation::new(intent, confidence)),
        }
    }

    fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl IntentTranslator for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn translate(
        &self,
        _request: &TranslationRequest,
        _context: &TranslationContext,
    ) -> Result<Translation, TranslatorError> {
        tokio::time::sleep(self.delay).await;
        self.reply.clone()
    }
}

/// Sleeps for as many milliseconds as the request text says.
struct Sleepy;

#[async_trait]
impl IntentTranslator for Sleepy {
    fn name(&self) -> &'static str {
        "sleepy"
    }

    async fn translate(
        &self,
        request: &TranslationRequest,
        _context: &TranslationContext,
    ) -> Result<Translation, TranslatorError> {
        let millis: u64 = request.text.parse().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(Translation::new(Intent::Filter(FilterSpec::default()), 0.9))
    }
}

fn gateway(translator: impl IntentTranslator + 'static, timeout: Duration) -> TranslatorGateway {
    TranslatorGateway::new(Arc::new(translator), timeout, 0.8)
}

async fn submit(gateway: &TranslatorGateway, surface: Surface, text: &str) -> GatewayOutcome {
    gateway
        .submit(
            TranslationRequest::new(surface, text),
            TranslationContext::new(snapshot()),
        )
        .await
}

#[tokio::test]
async fn change_proposals_above_threshold_are_returned_unapplied() {
    let gw = gateway(
        Scripted::replying(Intent::Rule(RuleDraft::co_run(["T1", "T2"])), 0.85),
        Duration::from_secs(1),
    );
    match submit(&gw, Surface::Rule, "T1 with T2").await {
        GatewayOutcome::Proposal(proposal) => {
            assert_eq!(proposal.kind, ProposalKind::Rule(RuleDraft::co_run(["T1", "T2"])));
            assert_eq!(proposal.source_text, "T1 with T2");
        }
        other => panic!("expected a proposal, got {other:?}"),
    }
    assert_eq!(gw.live_calls(), 0);
}

#[tokio::test]
async fn proposals_at_the_threshold_are_discarded() {
    let gw = gateway(
        Scripted::replying(Intent::Rule(RuleDraft::co_run(["T1", "T2"])), 0.8),
        Duration::from_secs(1),
    );
    assert_eq!(
        submit(&gw, Surface::Rule, "T1 with T2").await,
        GatewayOutcome::Discarded { confidence: 0.8 }
    );
}

#[tokio::test]
async fn low_confidence_searches_are_still_answered() {
    let gw = gateway(
        Scripted::replying(Intent::Filter(FilterSpec::default()), 0.3),
        Duration::from_secs(1),
    );
    assert!(matches!(
        submit(&gw, Surface::Search, "anything").await,
        GatewayOutcome::Filter { confidence, .. } if confidence == 0.3
    ));
}

#[tokio::test]
async fn slow_translators_time_out() {
    let gw = gateway(
        Scripted::replying(Intent::Filter(FilterSpec::default()), 0.9).after(Duration::from_millis(500)),
        Duration::from_millis(20),
    );
    assert_eq!(
        submit(&gw, Surface::Search, "slow").await,
        GatewayOutcome::Unavailable {
            reason: "Could not process the search request (timed out)".into()
        }
    );
}

#[tokio::test]
async fn translator_errors_become_unavailable() {
    let gw = gateway(
        Scripted {
            delay: Duration::ZERO,
            reply: Err(TranslatorError::Unavailable("quota exhausted".into())),
        },
        Duration::from_secs(1),
    );
    let GatewayOutcome::Unavailable { reason } = submit(&gw, Surface::Insight, "why").await else {
        panic!("expected unavailable");
    };
    assert!(reason.starts_with("Could not process the insight request"));
}

#[tokio::test]
async fn intents_for_another_surface_are_refused() {
    let gw = gateway(
        Scripted::replying(Intent::Insight(InsightResponse::default()), 0.95),
        Duration::from_secs(1),
    );
    assert_eq!(
        submit(&gw, Surface::Modification, "set it").await,
        GatewayOutcome::Unavailable {
            reason: "Could not process the modification request (malformed intent)".into()
        }
    );
}

#[tokio::test]
async fn out_of_range_confidence_is_refused() {
    for confidence in [1.5, -0.1, f64::NAN] {
        let gw = gateway(
            Scripted::replying(Intent::Filter(FilterSpec::default()), confidence),
            Duration::from_secs(1),
        );
        assert!(matches!(
            submit(&gw, Surface::Search, "x").await,
            GatewayOutcome::Unavailable { .. }
        ));
    }
}

#[tokio::test]
async fn newer_call_on_the_same_surface_supersedes_the_older() {
    let gw = gateway(Sleepy, Duration::from_secs(5));
    let (older, newer) = tokio::join!(submit(&gw, Surface::Search, "300"), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        submit(&gw, Surface::Search, "0").await
    });
    assert_eq!(older, GatewayOutcome::Superseded);
    assert!(matches!(newer, GatewayOutcome::Filter { .. }));
    assert_eq!(gw.live_calls(), 0);
}

#[tokio::test]
async fn calls_on_different_surfaces_run_side_by_side() {
    let gw = gateway(Sleepy, Duration::from_secs(5));
    let (first, second) = tokio::join!(submit(&gw, Surface::Search, "50"), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        // a filter intent on the insight surface is refused, but it must not cancel the search
        submit(&gw, Surface::Insight, "0").await
    });
    assert!(matches!(first, GatewayOutcome::Filter { .. }));
    assert!(matches!(second, GatewayOutcome::Unavailable { .. }));
}

#[tokio::test]
async fn keyword_translator_works_through_the_gateway() {
    let gw = gateway(KeywordTranslator::new(), Duration::from_secs(1));
    assert_eq!(gw.translator_name(), "keyword");
    match submit(&gw, Surface::Rule, "T1 and T2 run together").await {
        GatewayOutcome::Proposal(proposal) => {
            assert!((proposal.confidence - 0.9).abs() < f64::EPSILON);
        }
        other => panic!("expected a proposal, got {other:?}"),
    }
}
