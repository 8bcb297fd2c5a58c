//! Business rules handed to the downstream allocator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub mod precedence;
pub mod registry;

pub use registry::{ReferencePolicy, RuleRegistry, RuleRejection};

/// Registry-assigned rule identifier, rendered as `R<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RuleId(u64);

impl RuleId {
    pub(crate) fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl FromStr for RuleId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('R')
            .or_else(|| trimmed.strip_prefix('r'))
            .unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .map(RuleId)
            .map_err(|_| format!("invalid rule id '{s}'"))
    }
}

impl From<RuleId> for String {
    fn from(value: RuleId) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for RuleId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The group a slot restriction applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlotGroup {
    ClientGroup(String),
    WorkerGroup(String),
}

impl SlotGroup {
    pub fn name(&self) -> &str {
        match self {
            SlotGroup::ClientGroup(name) | SlotGroup::WorkerGroup(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RuleKind {
    /// Tasks that must run together.
    CoRun { tasks: Vec<String> },
    /// Members of a group must share at least this many common slots.
    SlotRestriction { group: SlotGroup, min_common_slots: u32 },
    /// Cap on slots a worker group may take per phase.
    LoadLimit {
        worker_group: String,
        max_slots_per_phase: u32,
    },
    /// Phases a task may be scheduled in.
    PhaseWindow { task_id: String, allowed_phases: Vec<u32> },
    /// `before` must complete ahead of `after`.
    Precedence { before: String, after: String },
}

impl RuleKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            RuleKind::CoRun { .. } => "coRun",
            RuleKind::SlotRestriction { .. } => "slotRestriction",
            RuleKind::LoadLimit { .. } => "loadLimit",
            RuleKind::PhaseWindow { .. } => "phaseWindow",
            RuleKind::Precedence { .. } => "precedence",
        }
    }

    /// Trims every referenced id and group name, and drops repeated co-run tasks
    /// keeping first-seen order.
    pub fn normalized(self) -> Self {
        let trimmed = |value: String| value.trim().to_string();
        match self {
            RuleKind::CoRun { tasks } => {
                let mut seen = HashSet::new();
                let tasks = tasks
                    .into_iter()
                    .map(trimmed)
                    .filter(|task| seen.insert(task.clone()))
                    .collect();
                RuleKind::CoRun { tasks }
            }
            RuleKind::SlotRestriction {
                group,
                min_common_slots,
            } => {
                let group = match group {
                    SlotGroup::ClientGroup(name) => SlotGroup::ClientGroup(trimmed(name)),
                    SlotGroup::WorkerGroup(name) => SlotGroup::WorkerGroup(trimmed(name)),
                };
                RuleKind::SlotRestriction {
                    group,
                    min_common_slots,
                }
            }
            RuleKind::LoadLimit {
                worker_group,
                max_slots_per_phase,
            } => RuleKind::LoadLimit {
                worker_group: trimmed(worker_group),
                max_slots_per_phase,
            },
            RuleKind::PhaseWindow {
                task_id,
                allowed_phases,
            } => RuleKind::PhaseWindow {
                task_id: trimmed(task_id),
                allowed_phases,
            },
            RuleKind::Precedence { before, after } => RuleKind::Precedence {
                before: trimmed(before),
                after: trimmed(after),
            },
        }
    }

    /// Human-readable sentence used when a rule has no description of its own.
    pub fn summary(&self) -> String {
        match self {
            RuleKind::CoRun { tasks } => format!("Co-run rule for {}", tasks.join(", ")),
            RuleKind::SlotRestriction {
                group,
                min_common_slots,
            } => format!(
                "Group {} needs at least {min_common_slots} common slots",
                group.name()
            ),
            RuleKind::LoadLimit {
                worker_group,
                max_slots_per_phase,
            } => format!("Load limit for {worker_group}: {max_slots_per_phase} slots per phase"),
            RuleKind::PhaseWindow {
                task_id,
                allowed_phases,
            } => {
                let phases = allowed_phases
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Task {task_id} limited to phases {phases}")
            }
            RuleKind::Precedence { before, after } => format!("Task {before} runs before {after}"),
        }
    }
}

/// A committed rule. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: RuleId,
    #[serde(flatten)]
    pub kind: RuleKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// An unconfirmed rule proposal, from the manual builder or the translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDraft {
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RuleDraft {
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    pub fn co_run<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RuleKind::CoRun {
            tasks: tasks.into_iter().map(Into::into).collect(),
        })
    }

    pub fn slot_restriction(group: SlotGroup, min_common_slots: u32) -> Self {
        Self::new(RuleKind::SlotRestriction {
            group,
            min_common_slots,
        })
    }

    pub fn load_limit(worker_group: impl Into<String>, max_slots_per_phase: u32) -> Self {
        Self::new(RuleKind::LoadLimit {
            worker_group: worker_group.into(),
            max_slots_per_phase,
        })
    }

    pub fn phase_window(task_id: impl Into<String>, allowed_phases: Vec<u32>) -> Self {
        Self::new(RuleKind::PhaseWindow {
            task_id: task_id.into(),
            allowed_phases,
        })
    }

    pub fn precedence(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self::new(RuleKind::Precedence {
            before: before.into(),
            after: after.into(),
        })
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.description = if description.trim().is_empty() {
            None
        } else {
            Some(description)
        };
        self
    }

    pub(crate) fn into_rule(self, id: RuleId, created_at: DateTime<Utc>) -> Rule {
        let description = self
            .description
            .unwrap_or_else(|| self.kind.summary());
        Rule {
            id,
            kind: self.kind,
            description,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_serializes_with_type_tag_and_camel_case_fields() {
        let created_at = DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let rule = RuleDraft::load_limit("Sales", 3).into_rule(RuleId::new(4), created_at);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "R4",
                "type": "loadLimit",
                "workerGroup": "Sales",
                "maxSlotsPerPhase": 3,
                "description": "Load limit for Sales: 3 slots per phase",
                "createdAt": "2025-03-01T10:00:00Z"
            })
        );
    }

    #[test]
    fn rule_ids_parse_with_or_without_prefix() {
        assert_eq!("R7".parse::<RuleId>().unwrap().value(), 7);
        assert_eq!("7".parse::<RuleId>().unwrap().value(), 7);
        assert!("RX".parse::<RuleId>().is_err());
    }
}
