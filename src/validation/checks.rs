use super::{Severity, ValidationError, ValidationErrorKind, Validator};
use crate::entity::{CellValue, EntityKind, Record};
use crate::store::EntitySnapshot;
use std::collections::HashSet;

const CLIENT_REQUIRED: &[&str] = &["ClientID", "ClientName", "PriorityLevel"];
const WORKER_REQUIRED: &[&str] = &["WorkerID", "WorkerName", "Skills", "AvailableSlots"];
const TASK_REQUIRED: &[&str] = &["TaskID", "TaskName", "Duration", "RequiredSkills"];

/// Compares the header set of the first row against the columns the entity must carry.
pub struct RequiredColumns {
    entity: EntityKind,
}

impl RequiredColumns {
    pub fn new(entity: EntityKind) -> Self {
        Self { entity }
    }

    pub fn required(entity: EntityKind) -> &'static [&'static str] {
        match entity {
            EntityKind::Clients => CLIENT_REQUIRED,
            EntityKind::Workers => WORKER_REQUIRED,
            EntityKind::Tasks => TASK_REQUIRED,
        }
    }
}

fn missing_columns<R: Record>(rows: &[R], required: &[&str]) -> Vec<ValidationError> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let observed: HashSet<&str> = first.columns().into_iter().collect();
    let entity = R::KIND;
    required
        .iter()
        .filter(|column| !observed.contains(*column))
        .map(|column| {
            ValidationError::new(
                ValidationErrorKind::MissingColumn,
                Severity::Error,
                entity,
                format!("Missing required column: {column}"),
            )
            .suggest(format!("Add the {column} column to your {entity} data"))
        })
        .collect()
}

impl Validator for RequiredColumns {
    fn name(&self) -> &'static str {
        match self.entity {
            EntityKind::Clients => "required_columns.clients",
            EntityKind::Workers => "required_columns.workers",
            EntityKind::Tasks => "required_columns.tasks",
        }
    }

    fn check(&self, snapshot: &EntitySnapshot) -> Vec<ValidationError> {
        let required = Self::required(self.entity);
        match self.entity {
            EntityKind::Clients => missing_columns(snapshot.clients(), required),
            EntityKind::Workers => missing_columns(snapshot.workers(), required),
            EntityKind::Tasks => missing_columns(snapshot.tasks(), required),
        }
    }
}

/// Left-to-right scan: the first occurrence of an id is never flagged, every repeat is.
pub struct DuplicateIds {
    entity: EntityKind,
}

impl DuplicateIds {
    pub fn new(entity: EntityKind) -> Self {
        Self { entity }
    }
}

fn duplicate_ids<R: Record>(rows: &[R]) -> Vec<ValidationError> {
    let id_field = R::KIND.id_column();
    let mut seen = HashSet::with_capacity(rows.len());
    let mut errors = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let Some(id) = row.id() else {
            continue;
        };
        if seen.contains(&id) {
            errors.push(
                ValidationError::new(
                    ValidationErrorKind::DuplicateId,
                    Severity::Error,
                    R::KIND,
                    format!("Duplicate {id_field}: {id}"),
                )
                .at(index, id_field)
                .suggest(format!("Change the duplicate {id_field} to a unique value")),
            );
        } else {
            seen.insert(id);
        }
    }
    errors
}

impl Validator for DuplicateIds {
    fn name(&self) -> &'static str {
        match self.entity {
            EntityKind::Clients => "duplicate_ids.clients",
            EntityKind::Workers => "duplicate_ids.workers",
            EntityKind::Tasks => "duplicate_ids.tasks",
        }
    }

    fn check(&self, snapshot: &EntitySnapshot) -> Vec<ValidationError> {
        match self.entity {
            EntityKind::Clients => duplicate_ids(snapshot.clients()),
            EntityKind::Workers => duplicate_ids(snapshot.workers()),
            EntityKind::Tasks => duplicate_ids(snapshot.tasks()),
        }
    }
}

fn shown(cell: Option<&CellValue>) -> String {
    match cell {
        Some(value) if !value.is_blank() => value.to_string(),
        _ => "(empty)".to_string(),
    }
}

/// PriorityLevel must be a whole number from 1 to 5.
pub struct PriorityRange;

impl Validator for PriorityRange {
    fn name(&self) -> &'static str {
        "range.priority_level"
    }

    fn check(&self, snapshot: &EntitySnapshot) -> Vec<ValidationError> {
        snapshot
            .clients()
            .iter()
            .enumerate()
            .filter(|(_, client)| !client.priority().is_some_and(|p| (1..=5).contains(&p)))
            .map(|(index, client)| {
                ValidationError::new(
                    ValidationErrorKind::InvalidRange,
                    Severity::Error,
                    EntityKind::Clients,
                    format!(
                        "Invalid priority level: {}. Must be 1-5",
                        shown(client.get("PriorityLevel"))
                    ),
                )
                .at(index, "PriorityLevel")
                .suggest("Set priority level to a value between 1 and 5")
            })
            .collect()
    }
}

/// Duration must be a whole number of at least 1.
pub struct DurationRange;

impl Validator for DurationRange {
    fn name(&self) -> &'static str {
        "range.duration"
    }

    fn check(&self, snapshot: &EntitySnapshot) -> Vec<ValidationError> {
        snapshot
            .tasks()
            .iter()
            .enumerate()
            .filter(|(_, task)| !task.duration_value().is_some_and(|d| d >= 1))
            .map(|(index, task)| {
                ValidationError::new(
                    ValidationErrorKind::InvalidRange,
                    Severity::Error,
                    EntityKind::Tasks,
                    format!(
                        "Invalid duration: {}. Must be >= 1",
                        shown(task.get("Duration"))
                    ),
                )
                .at(index, "Duration")
                .suggest("Set duration to a positive number")
            })
            .collect()
    }
}

/// Every requested task id must name a loaded task.
pub struct TaskReferences;

impl Validator for TaskReferences {
    fn name(&self) -> &'static str {
        "references.requested_tasks"
    }

    fn check(&self, snapshot: &EntitySnapshot) -> Vec<ValidationError> {
        let task_ids = snapshot.task_ids();
        let mut errors = Vec::new();
        for (index, client) in snapshot.clients().iter().enumerate() {
            for reference in client.requested_tasks() {
                if task_ids.contains(&reference) {
                    continue;
                }
                errors.push(
                    ValidationError::new(
                        ValidationErrorKind::UnknownReference,
                        Severity::Error,
                        EntityKind::Clients,
                        format!("Unknown task reference: {reference}"),
                    )
                    .at(index, "RequestedTaskIDs")
                    .suggest(format!("Remove {reference} or add it to the tasks data")),
                );
            }
        }
        errors
    }
}

/// Required skills nobody on the workforce has. Advisory only, and skipped until workers
/// are loaded.
pub struct SkillCoverage;

impl Validator for SkillCoverage {
    fn name(&self) -> &'static str {
        "coverage.required_skills"
    }

    fn check(&self, snapshot: &EntitySnapshot) -> Vec<ValidationError> {
        if snapshot.workers().is_empty() {
            return Vec::new();
        }
        let available: HashSet<String> = snapshot
            .workers()
            .iter()
            .flat_map(|worker| worker.skill_list())
            .collect();
        let mut warnings = Vec::new();
        for (index, task) in snapshot.tasks().iter().enumerate() {
            for skill in task.required_skill_list() {
                if available.contains(&skill) {
                    continue;
                }
                warnings.push(
                    ValidationError::new(
                        ValidationErrorKind::MissingSkillCoverage,
                        Severity::Warning,
                        EntityKind::Tasks,
                        format!("No worker has skill: {skill}"),
                    )
                    .at(index, "RequiredSkills")
                    .suggest(format!(
                        "Add a worker with {skill} skill or modify the task requirements"
                    )),
                );
            }
        }
        warnings
    }
}
