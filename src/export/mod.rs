use crate::priority::PriorityWeights;
use crate::rules::Rule;
use crate::store::EntityCounts;
use crate::validation::ValidationReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub mod file;

pub use file::{
    export_all, load_bundle_from_json, read_rows_csv, save_bundle_to_json, write_entity_csv, CLIENTS_FILE,
    RULES_FILE, TASKS_FILE, WORKERS_FILE,
};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("export blocked: {}", reasons.join("; "))]
    NotReady { reasons: Vec<String> },
    #[error("{} contained no rows", path.display())]
    NoRecords { path: PathBuf },
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Outcome of the export gate. `reasons` lists every condition that blocks export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub ok: bool,
    pub reasons: Vec<String>,
}

impl Readiness {
    pub fn blocked(reasons: Vec<String>) -> Self {
        Self {
            ok: reasons.is_empty(),
            reasons,
        }
    }

    pub fn into_result(self) -> ExportResult<()> {
        if self.ok {
            Ok(())
        } else {
            Err(ExportError::NotReady {
                reasons: self.reasons,
            })
        }
    }
}

pub fn ready(counts: EntityCounts, report: &ValidationReport) -> Readiness {
    let mut reasons = Vec::new();
    if report.total_errors > 0 {
        reasons.push(format!(
            "{} validation error(s) must be fixed before export",
            report.total_errors
        ));
    }
    if counts.total() == 0 {
        reasons.push("No data loaded".to_string());
    }
    Readiness::blocked(reasons)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Passed,
    Failed,
}

impl ValidationStatus {
    pub fn of(report: &ValidationReport) -> Self {
        if report.is_valid {
            ValidationStatus::Passed
        } else {
            ValidationStatus::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    pub exported_at: DateTime<Utc>,
    pub version: String,
    pub total_rules: usize,
    pub validation_status: ValidationStatus,
}

/// The `rules-config.json` document handed to the allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBundle {
    pub rules: Vec<Rule>,
    pub priorities: PriorityWeights,
    pub metadata: BundleMetadata,
}

impl RuleBundle {
    pub fn new(
        rules: Vec<Rule>,
        priorities: PriorityWeights,
        validation_status: ValidationStatus,
        version: impl Into<String>,
        exported_at: DateTime<Utc>,
    ) -> Self {
        let metadata = BundleMetadata {
            exported_at,
            version: version.into(),
            total_rules: rules.len(),
            validation_status,
        };
        Self {
            rules,
            priorities,
            metadata,
        }
    }
}
