//! Integrity checks over an entity snapshot.
//!
//! The pipeline holds validators in registration order. Each validator scans rows in
//! ascending index order and returns its findings; the pipeline concatenates them in
//! registration order, so a report only ever depends on the snapshot it was given.

use crate::entity::EntityKind;
use crate::store::EntitySnapshot;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

pub mod checks;
pub mod sequencer;

pub use checks::{DuplicateIds, DurationRange, PriorityRange, RequiredColumns, SkillCoverage, TaskReferences};
pub use sequencer::{AppliedReport, RunTicket, ValidationSequencer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    MissingColumn,
    DuplicateId,
    InvalidRange,
    UnknownReference,
    MissingSkillCoverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// One finding from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub severity: Severity,
    pub message: String,
    pub entity: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(
        kind: ValidationErrorKind,
        severity: Severity,
        entity: EntityKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            entity,
            field: None,
            row_index: None,
            suggestion: None,
        }
    }

    pub fn at(mut self, row_index: usize, field: &str) -> Self {
        self.row_index = Some(row_index);
        self.field = Some(field.to_string());
        self
    }

    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.entity, self.message)?;
        if let Some(row) = self.row_index {
            // rows are shown 1-based
            write!(f, " (row {}", row + 1)?;
            if let Some(field) = &self.field {
                write!(f, ", field {field}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub total_errors: usize,
    pub total_warnings: usize,
    pub is_valid: bool,
    pub score: u32,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        let total_errors = count(&errors, Severity::Error);
        let total_warnings = count(&errors, Severity::Warning);
        let penalty = total_errors
            .saturating_mul(10)
            .saturating_add(total_warnings.saturating_mul(5));
        let score = 100usize.saturating_sub(penalty) as u32;
        Self {
            errors,
            total_errors,
            total_warnings,
            is_valid: total_errors == 0,
            score,
        }
    }

    pub fn issues_for(&self, entity: EntityKind) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter().filter(move |issue| issue.entity == entity)
    }

    pub fn summary(&self) -> String {
        if self.total_errors == 0 && self.total_warnings == 0 {
            "All validations passed".to_string()
        } else {
            format!(
                "{} errors, {} warnings (score {}%)",
                self.total_errors, self.total_warnings, self.score
            )
        }
    }
}

fn count(errors: &[ValidationError], severity: Severity) -> usize {
    errors.iter().filter(|e| e.severity == severity).count()
}

/// A single independent check over a snapshot.
pub trait Validator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Findings for the snapshot, in ascending row order.
    fn check(&self, snapshot: &EntitySnapshot) -> Vec<ValidationError>;
}

#[derive(Default)]
pub struct ValidationPipeline {
    validators: Vec<Box<dyn Validator>>,
}

impl ValidationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard checks in their fixed order.
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        for entity in EntityKind::ALL {
            pipeline = pipeline.register(RequiredColumns::new(entity));
        }
        for entity in EntityKind::ALL {
            pipeline = pipeline.register(DuplicateIds::new(entity));
        }
        pipeline
            .register(PriorityRange)
            .register(DurationRange)
            .register(TaskReferences)
            .register(SkillCoverage)
    }

    pub fn register(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    pub fn validator_names(&self) -> Vec<&'static str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    pub fn validate(&self, snapshot: &EntitySnapshot) -> ValidationReport {
        // par_iter keeps input order on collect
        let batches: Vec<Vec<ValidationError>> = self
            .validators
            .par_iter()
            .map(|validator| validator.check(snapshot))
            .collect();
        let report = ValidationReport::from_errors(batches.into_iter().flatten().collect());
        debug!(
            revision = snapshot.revision(),
            errors = report.total_errors,
            warnings = report.total_warnings,
            score = report.score,
            "validation run finished"
        );
        report
    }
}

/// Runs the standard pipeline once.
pub fn validate(snapshot: &EntitySnapshot) -> ValidationReport {
    ValidationPipeline::standard().validate(snapshot)
}
