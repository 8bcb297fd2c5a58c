use data_alchemist::{
    validate, Client, EntityKind, EntitySnapshot, Severity, Task, ValidationErrorKind, ValidationPipeline, Worker,
};

fn clean_snapshot() -> EntitySnapshot {
    EntitySnapshot::new(
        vec![
            Client::new("C1", "Acme", 3).with_requested_tasks("T1,T2"),
            Client::new("C2", "Globex", 5).with_requested_tasks("T2"),
        ],
        vec![
            Worker::new("W1", "Ann", "python,sql", "1,2,3"),
            Worker::new("W2", "Bo", "design", "2,4"),
        ],
        vec![
            Task::new("T1", "ETL", 2).with_required_skills("python"),
            Task::new("T2", "Mockups", 1).with_required_skills("design"),
        ],
    )
}

#[test]
fn clean_data_passes_with_full_score() {
    let report = validate(&clean_snapshot());
    assert!(report.is_valid);
    assert!(report.errors.is_empty());
    assert_eq!(report.score, 100);
    assert_eq!(report.summary(), "All validations passed");
}

#[test]
fn empty_snapshot_has_no_findings() {
    let report = validate(&EntitySnapshot::default());
    assert!(report.is_valid);
    assert_eq!(report.total_errors, 0);
}

#[test]
fn duplicates_flag_every_repeat_but_not_the_first() {
    let snapshot = EntitySnapshot::new(
        vec![
            Client::new("C1", "Acme", 3),
            Client::new("C1", "Acme again", 3),
            Client::new("C1", "Acme thrice", 3),
        ],
        vec![],
        vec![],
    );
    let report = validate(&snapshot);
    let rows: Vec<Option<usize>> = report
        .errors
        .iter()
        .filter(|e| e.kind == ValidationErrorKind::DuplicateId)
        .map(|e| e.row_index)
        .collect();
    assert_eq!(rows, vec![Some(1), Some(2)]);
    assert_eq!(report.errors[0].message, "Duplicate ClientID: C1");
    assert_eq!(report.errors[0].field.as_deref(), Some("ClientID"));
}

#[test]
fn missing_priority_column_reports_header_and_range() {
    let mut client = Client::default();
    client.client_id = Some("C1".into());
    client.client_name = Some("Acme".into());
    let report = validate(&EntitySnapshot::new(vec![client], vec![], vec![]));

    assert_eq!(report.total_errors, 2);
    assert_eq!(report.errors[0].kind, ValidationErrorKind::MissingColumn);
    assert_eq!(report.errors[0].message, "Missing required column: PriorityLevel");
    assert_eq!(report.errors[0].row_index, None);
    assert_eq!(report.errors[1].kind, ValidationErrorKind::InvalidRange);
    assert_eq!(report.errors[1].message, "Invalid priority level: (empty). Must be 1-5");
}

#[test]
fn out_of_range_values_are_errors() {
    let mut stale = Task::new("T2", "Stale", 1);
    stale.duration = Some("soon".into());
    let snapshot = EntitySnapshot::new(
        vec![Client::new("C1", "Acme", 7), Client::new("C2", "Globex", 0)],
        vec![],
        vec![Task::new("T1", "Zero", 0), stale],
    );
    let report = validate(&snapshot);
    let messages: Vec<&str> = report.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "Invalid priority level: 7. Must be 1-5",
            "Invalid priority level: 0. Must be 1-5",
            "Invalid duration: 0. Must be >= 1",
            "Invalid duration: soon. Must be >= 1",
        ]
    );
}

#[test]
fn textual_numbers_are_accepted() {
    let mut client = Client::new("C1", "Acme", 1);
    client.priority_level = Some(" 4 ".into());
    let mut task = Task::new("T1", "ETL", 1);
    task.duration = Some("2.0".into());
    let report = validate(&EntitySnapshot::new(vec![client], vec![], vec![task]));
    assert!(report.is_valid, "{:?}", report.errors);
}

#[test]
fn unknown_task_references_are_reported_per_reference() {
    let snapshot = EntitySnapshot::new(
        vec![Client::new("C1", "Acme", 2).with_requested_tasks("T1, T9, T10")],
        vec![],
        vec![Task::new("T1", "ETL", 1)],
    );
    let report = validate(&snapshot);
    let unknown: Vec<&str> = report
        .errors
        .iter()
        .filter(|e| e.kind == ValidationErrorKind::UnknownReference)
        .map(|e| e.message.as_str())
        .collect();
    assert_eq!(
        unknown,
        vec!["Unknown task reference: T9", "Unknown task reference: T10"]
    );
}

#[test]
fn uncovered_skills_are_warnings_and_lower_the_score() {
    let snapshot = EntitySnapshot::new(
        vec![Client::new("C1", "Acme", 9)],
        vec![Worker::new("W1", "Ann", "sql", "1")],
        vec![Task::new("T1", "Model", 2).with_required_skills("ml, sql")],
    );
    let report = validate(&snapshot);
    assert_eq!(report.total_errors, 1);
    assert_eq!(report.total_warnings, 1);
    assert!(!report.is_valid);
    assert_eq!(report.score, 85);

    let warning = report.issues_for(EntityKind::Tasks).next().unwrap();
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(warning.message, "No worker has skill: ml");
    assert_eq!(report.summary(), "1 errors, 1 warnings (score 85%)");
}

#[test]
fn score_never_drops_below_zero() {
    let clients = (0..12).map(|i| Client::new(&format!("C{i}"), "X", 9)).collect();
    let report = validate(&EntitySnapshot::new(clients, vec![], vec![]));
    assert_eq!(report.total_errors, 12);
    assert_eq!(report.score, 0);
}

#[test]
fn standard_pipeline_runs_checks_in_fixed_order() {
    assert_eq!(
        ValidationPipeline::standard().validator_names(),
        vec![
            "required_columns.clients",
            "required_columns.workers",
            "required_columns.tasks",
            "duplicate_ids.clients",
            "duplicate_ids.workers",
            "duplicate_ids.tasks",
            "range.priority_level",
            "range.duration",
            "references.requested_tasks",
            "coverage.required_skills",
        ]
    );
}

#[test]
fn repeated_runs_produce_identical_reports() {
    let snapshot = EntitySnapshot::new(
        vec![Client::new("C1", "Acme", 0), Client::new("C1", "Dup", 2).with_requested_tasks("T5")],
        vec![Worker::new("W1", "Ann", "sql", "1")],
        vec![Task::new("T1", "Model", 0).with_required_skills("ml")],
    );
    let pipeline = ValidationPipeline::standard();
    let first = pipeline.validate(&snapshot);
    for _ in 0..5 {
        assert_eq!(pipeline.validate(&snapshot), first);
    }
}
