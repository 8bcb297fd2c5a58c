use data_alchemist::export::{load_bundle_from_json, ValidationStatus, RULES_FILE, TASKS_FILE};
use data_alchemist::{
    AcceptError, Accepted, AlchemistConfig, CellValue, Edit, EntityKind, ExportError, FieldFilter, FilterSpec,
    ReferencePolicy, Row, RuleDraft, RuleRejection, Session, Surface, TranslationOutcome,
};

fn row(cells: &[(&str, &str)]) -> Row {
    cells
        .iter()
        .map(|(column, value)| (column.to_string(), CellValue::from(*value)))
        .collect()
}

fn loaded_session() -> Session {
    let session = Session::new(AlchemistConfig::default());
    session
        .load_rows(
            EntityKind::Clients,
            vec![
                row(&[
                    ("ClientID", "C1"),
                    ("ClientName", "Acme"),
                    ("PriorityLevel", "3"),
                    ("RequestedTaskIDs", "T1,T2"),
                    ("GroupTag", "Enterprise"),
                ]),
                row(&[("ClientID", "C2"), ("ClientName", "Globex"), ("PriorityLevel", "5")]),
            ],
        )
        .unwrap();
    session
        .load_rows(
            EntityKind::Workers,
            vec![row(&[
                ("WorkerID", "W1"),
                ("WorkerName", "Ann"),
                ("Skills", "python,design"),
                ("AvailableSlots", "1,2"),
                ("WorkerGroup", "Sales"),
            ])],
        )
        .unwrap();
    session
        .load_rows(
            EntityKind::Tasks,
            vec![
                row(&[
                    ("TaskID", "T1"),
                    ("TaskName", "ETL"),
                    ("Duration", "2"),
                    ("RequiredSkills", "python"),
                ]),
                row(&[
                    ("TaskID", "T2"),
                    ("TaskName", "Mockups"),
                    ("Duration", "1"),
                    ("RequiredSkills", "design"),
                ]),
            ],
        )
        .unwrap();
    session
}

#[test]
fn empty_session_is_not_ready() {
    let session = Session::new(AlchemistConfig::default());
    let readiness = session.readiness();
    assert!(!readiness.ok);
    assert_eq!(
        readiness.reasons,
        vec!["Data has not been validated", "No data loaded"]
    );

    session.validate_now();
    assert_eq!(session.readiness().reasons, vec!["No data loaded"]);
}

#[test]
fn validated_clean_data_is_ready_until_edited() {
    let session = loaded_session();
    assert_eq!(session.revision(), 3);

    let report = session.validate_now();
    assert!(report.is_valid, "{:?}", report.errors);
    assert!(session.report_is_current());
    assert!(session.readiness().ok);

    session
        .apply_edit(Edit::SetCell {
            entity: EntityKind::Clients,
            row: 1,
            column: "PriorityLevel".into(),
            value: Some(CellValue::from("9")),
        })
        .unwrap();
    assert!(!session.report_is_current());
    assert_eq!(
        session.readiness().reasons,
        vec!["Data changed since the last validation run"]
    );

    let report = session.validate_now();
    assert_eq!(report.total_errors, 1);
    assert_eq!(
        session.readiness().reasons,
        vec!["1 validation error(s) must be fixed before export"]
    );
}

#[tokio::test]
async fn revalidate_publishes_on_the_blocking_pool() {
    let session = loaded_session();
    let report = session.revalidate().await.unwrap();
    assert!(report.is_valid);
    assert_eq!(session.latest_report().unwrap(), report);
    assert!(session.report_is_current());
}

#[test]
fn search_and_keyword_search_read_the_current_data() {
    let session = loaded_session();
    let spec = FilterSpec {
        entity: Some(EntityKind::Clients),
        filters: vec![FieldFilter::equals("PriorityLevel", 5i64)],
        ..FilterSpec::default()
    };
    assert_eq!(session.search(&spec).clients, vec![1]);

    let hits = session.keyword_search("PYTHON");
    assert_eq!(hits.workers, vec![0]);
    assert_eq!(hits.tasks, vec![0]);
    assert!(hits.clients.is_empty());
}

#[tokio::test]
async fn accepted_modifications_go_through_the_edit_path() {
    let session = loaded_session();
    let before = session.revision();

    let TranslationOutcome::Suggestion(suggestion) = session
        .translate(Surface::Modification, "set priority level to 1 for C2")
        .await
    else {
        panic!("expected a suggestion");
    };
    // nothing is applied until accepted
    assert_eq!(session.revision(), before);
    assert_eq!(session.pending_suggestions(), vec![suggestion.clone()]);

    let accepted = session.accept_suggestion(suggestion.id).unwrap();
    assert_eq!(accepted, Accepted::Modified { rows: 1 });
    assert_eq!(session.revision(), before + 1);
    assert_eq!(session.snapshot().clients()[1].priority(), Some(1));
    assert!(session.pending_suggestions().is_empty());
}

#[tokio::test]
async fn accepted_rules_land_in_the_registry() {
    let session = loaded_session();
    let TranslationOutcome::Suggestion(suggestion) =
        session.translate(Surface::Rule, "T1 and T2 run together").await
    else {
        panic!("expected a suggestion");
    };
    let Accepted::RuleAdded(rule) = session.accept_suggestion(suggestion.id).unwrap() else {
        panic!("expected a rule");
    };
    assert_eq!(rule.id.to_string(), "R1");
    assert_eq!(session.rules(), vec![rule]);
}

#[tokio::test]
async fn rejected_rules_still_consume_the_suggestion() {
    let session = loaded_session();
    let TranslationOutcome::Suggestion(suggestion) =
        session.translate(Surface::Rule, "T8 and T9 run together").await
    else {
        panic!("expected a suggestion");
    };
    let err = session.accept_suggestion(suggestion.id).unwrap_err();
    assert!(matches!(err, AcceptError::Rule(RuleRejection::UnknownTask(ref id)) if id == "T8"));
    assert!(matches!(
        session.accept_suggestion(suggestion.id),
        Err(AcceptError::UnknownSuggestion(_))
    ));
    assert!(session.rules().is_empty());
}

#[tokio::test]
async fn newer_suggestion_replaces_older_one_on_the_same_surface() {
    let session = loaded_session();
    let TranslationOutcome::Suggestion(first) =
        session.translate(Surface::Rule, "T1 and T2 run together").await
    else {
        panic!("expected a suggestion");
    };
    let TranslationOutcome::Suggestion(second) =
        session.translate(Surface::Rule, "T1 before T2").await
    else {
        panic!("expected a suggestion");
    };
    let TranslationOutcome::Suggestion(edit) = session
        .translate(Surface::Modification, "delete client C1")
        .await
    else {
        panic!("expected a suggestion");
    };

    let pending: Vec<u64> = session.pending_suggestions().iter().map(|s| s.id).collect();
    assert_eq!(pending, vec![second.id, edit.id]);
    assert!(!session.reject_suggestion(first.id));
    assert!(session.reject_suggestion(edit.id));
    assert_eq!(session.counts().clients, 2);
}

#[tokio::test]
async fn low_confidence_edits_are_dropped() {
    let session = loaded_session();
    let outcome = session.translate(Surface::Modification, "set duration to 4").await;
    assert_eq!(outcome, TranslationOutcome::Discarded { confidence: 0.5 });
    assert!(session.pending_suggestions().is_empty());
}

#[tokio::test]
async fn search_outcomes_carry_matching_rows() {
    let session = loaded_session();
    let TranslationOutcome::Matches { hits, .. } =
        session.translate(Surface::Search, "clients with priority above 4").await
    else {
        panic!("expected matches");
    };
    assert_eq!(hits.clients, vec![1]);
}

#[tokio::test]
async fn unrecognized_text_is_reported_as_unavailable() {
    let session = loaded_session();
    let outcome = session.translate(Surface::Rule, "make it nicer").await;
    assert!(matches!(outcome, TranslationOutcome::Unavailable { ref reason } if reason.contains("rule request")));
}

#[test]
fn lenient_sessions_accept_rules_for_unloaded_tasks() {
    let config = AlchemistConfig {
        reference_policy: ReferencePolicy::Lenient,
        ..AlchemistConfig::default()
    };
    let session = Session::new(config);
    session.add_rule(RuleDraft::precedence("T1", "T2")).unwrap();
    assert_eq!(session.rules().len(), 1);
    assert!(session.remove_rule(session.rules()[0].id));
    assert!(session.rules().is_empty());
}

#[test]
fn rule_bundle_reflects_validation_state() {
    let session = loaded_session();
    session.add_rule(RuleDraft::load_limit("Sales", 2)).unwrap();
    session.apply_preset("urgent").unwrap();

    let bundle = session.rule_bundle();
    assert_eq!(bundle.metadata.total_rules, 1);
    assert_eq!(serde_json::to_value(bundle.metadata.validation_status).unwrap(), "failed");
    assert_eq!(bundle.priorities.urgency, 95);
    assert_eq!(bundle.metadata.version, "1.0");

    session.validate_now();
    let bundle = session.rule_bundle();
    assert_eq!(serde_json::to_value(bundle.metadata.validation_status).unwrap(), "passed");
}

#[test]
fn weights_round_trip_through_the_session() {
    let session = Session::new(AlchemistConfig::default());
    assert_eq!(session.set_weight("fairness".parse().unwrap(), 250), 100);
    assert_eq!(session.weights().fairness, 100);
    session.reset_weights();
    assert_eq!(session.weight_summary().total, 260);
}

#[test]
fn export_uses_the_report_that_opened_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let session = loaded_session();
    session
        .apply_edit(Edit::SetCell {
            entity: EntityKind::Tasks,
            row: 0,
            column: "Duration".into(),
            value: Some(CellValue::from("0")),
        })
        .unwrap();
    assert_eq!(session.validate_now().total_errors, 1);

    session
        .apply_edit(Edit::SetCell {
            entity: EntityKind::Tasks,
            row: 0,
            column: "Duration".into(),
            value: Some(CellValue::from("3")),
        })
        .unwrap();
    // the failing report is out of date, so it must not gate or feed the export
    match session.export_all(dir.path()) {
        Err(ExportError::NotReady { reasons }) => {
            assert_eq!(reasons, vec!["Data changed since the last validation run"]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());

    session.validate_now();
    session.export_all(dir.path()).unwrap();
    let bundle = load_bundle_from_json(dir.path().join(RULES_FILE)).unwrap();
    assert_eq!(bundle.metadata.validation_status, ValidationStatus::Passed);
    let tasks = std::fs::read_to_string(dir.path().join(TASKS_FILE)).unwrap();
    assert!(tasks.contains("T1,ETL,3,python"), "{tasks}");
}
