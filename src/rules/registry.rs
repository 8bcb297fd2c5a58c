use super::precedence::PrecedenceGraph;
use super::{Rule, RuleDraft, RuleId, RuleKind, SlotGroup};
use crate::store::EntitySnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

/// Whether rule references are checked against the loaded data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferencePolicy {
    /// Unknown task ids and groups are rejected.
    #[default]
    Strict,
    /// References are accepted as written.
    Lenient,
}

impl FromStr for ReferencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ReferencePolicy::Strict),
            "lenient" => Ok(ReferencePolicy::Lenient),
            other => Err(format!("unknown reference policy '{other}'")),
        }
    }
}

/// Why a draft was not turned into a rule. The registry is unchanged when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleRejection {
    #[error("co-run rule needs at least two distinct tasks (got {0})")]
    TooFewTasks(usize),
    #[error("{field} must not be blank")]
    BlankIdentifier { field: &'static str },
    #[error("{field} must be at least 1")]
    ZeroLimit { field: &'static str },
    #[error("phase window for task {task_id} lists no phases")]
    EmptyPhaseWindow { task_id: String },
    #[error("phase window for task {task_id} contains phase 0; phases start at 1")]
    InvalidPhase { task_id: String },
    #[error("precedence rule cannot order task {0} relative to itself")]
    SelfPrecedence(String),
    #[error("unknown task {0}")]
    UnknownTask(String),
    #[error("unknown worker group {0}")]
    UnknownWorkerGroup(String),
    #[error("unknown client group {0}")]
    UnknownClientGroup(String),
    #[error("precedence {before} -> {after} would create a cycle through task {through}")]
    PrecedenceCycle {
        before: String,
        after: String,
        through: String,
    },
}

#[derive(Debug, Clone)]
struct RuleEntry {
    rule: Rule,
    removed: bool,
}

/// Append-only rule log. Removal leaves a tombstone so ids are never handed out twice.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    entries: Vec<RuleEntry>,
    last_id: u64,
    policy: ReferencePolicy,
}

impl RuleRegistry {
    pub fn new(policy: ReferencePolicy) -> Self {
        Self {
            entries: Vec::new(),
            last_id: 0,
            policy,
        }
    }

    pub fn policy(&self) -> ReferencePolicy {
        self.policy
    }

    pub fn add_rule(&mut self, draft: RuleDraft, snapshot: &EntitySnapshot) -> Result<Rule, RuleRejection> {
        self.add_rule_at(draft, snapshot, Utc::now())
    }

    pub fn add_rule_at(
        &mut self,
        draft: RuleDraft,
        snapshot: &EntitySnapshot,
        created_at: DateTime<Utc>,
    ) -> Result<Rule, RuleRejection> {
        let draft = RuleDraft {
            kind: draft.kind.normalized(),
            ..draft
        };
        let checked = check_structure(&draft.kind)
            .and_then(|()| match self.policy {
                ReferencePolicy::Strict => check_references(&draft.kind, snapshot),
                ReferencePolicy::Lenient => Ok(()),
            })
            .and_then(|()| self.check_precedence(&draft.kind));
        if let Err(rejection) = checked {
            warn!(rule_type = draft.kind.type_name(), %rejection, "rule rejected");
            return Err(rejection);
        }

        self.last_id += 1;
        let rule = draft.into_rule(RuleId::new(self.last_id), created_at);
        info!(id = %rule.id, rule_type = rule.kind.type_name(), "rule added");
        self.entries.push(RuleEntry {
            rule: rule.clone(),
            removed: false,
        });
        Ok(rule)
    }

    /// Tombstones a rule. Returns false if the id is unknown or already removed.
    pub fn remove_rule(&mut self, id: RuleId) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.rule.id == id && !entry.removed)
        {
            Some(entry) => {
                entry.removed = true;
                info!(%id, "rule removed");
                true
            }
            None => false,
        }
    }

    pub fn list_rules(&self) -> Vec<Rule> {
        self.active().cloned().collect()
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.active().find(|rule| rule.id == id)
    }

    pub fn len(&self) -> usize {
        self.active().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn active(&self) -> impl Iterator<Item = &Rule> {
        self.entries
            .iter()
            .filter(|entry| !entry.removed)
            .map(|entry| &entry.rule)
    }

    fn check_precedence(&self, kind: &RuleKind) -> Result<(), RuleRejection> {
        let RuleKind::Precedence { before, after } = kind else {
            return Ok(());
        };
        let existing = self.active().filter_map(|rule| match &rule.kind {
            RuleKind::Precedence { before, after } => Some((before.as_str(), after.as_str())),
            _ => None,
        });
        let graph = PrecedenceGraph::build(existing.chain([(before.as_str(), after.as_str())]));
        graph
            .order()
            .map(|_| ())
            .map_err(|through| RuleRejection::PrecedenceCycle {
                before: before.clone(),
                after: after.clone(),
                through,
            })
    }
}

fn non_blank(value: &str, field: &'static str) -> Result<(), RuleRejection> {
    if value.trim().is_empty() {
        Err(RuleRejection::BlankIdentifier { field })
    } else {
        Ok(())
    }
}

fn at_least_one(value: u32, field: &'static str) -> Result<(), RuleRejection> {
    if value == 0 {
        Err(RuleRejection::ZeroLimit { field })
    } else {
        Ok(())
    }
}

fn check_structure(kind: &RuleKind) -> Result<(), RuleRejection> {
    match kind {
        RuleKind::CoRun { tasks } => {
            for task in tasks {
                non_blank(task, "tasks")?;
            }
            if tasks.len() < 2 {
                return Err(RuleRejection::TooFewTasks(tasks.len()));
            }
            Ok(())
        }
        RuleKind::SlotRestriction {
            group,
            min_common_slots,
        } => {
            non_blank(group.name(), "group")?;
            at_least_one(*min_common_slots, "minCommonSlots")
        }
        RuleKind::LoadLimit {
            worker_group,
            max_slots_per_phase,
        } => {
            non_blank(worker_group, "workerGroup")?;
            at_least_one(*max_slots_per_phase, "maxSlotsPerPhase")
        }
        RuleKind::PhaseWindow {
            task_id,
            allowed_phases,
        } => {
            non_blank(task_id, "taskId")?;
            if allowed_phases.is_empty() {
                return Err(RuleRejection::EmptyPhaseWindow {
                    task_id: task_id.clone(),
                });
            }
            if allowed_phases.contains(&0) {
                return Err(RuleRejection::InvalidPhase {
                    task_id: task_id.clone(),
                });
            }
            Ok(())
        }
        RuleKind::Precedence { before, after } => {
            non_blank(before, "before")?;
            non_blank(after, "after")?;
            if before == after {
                return Err(RuleRejection::SelfPrecedence(before.clone()));
            }
            Ok(())
        }
    }
}

fn known_task(snapshot: &EntitySnapshot, task_id: &str) -> Result<(), RuleRejection> {
    if snapshot.has_task(task_id) {
        Ok(())
    } else {
        Err(RuleRejection::UnknownTask(task_id.to_string()))
    }
}

fn check_references(kind: &RuleKind, snapshot: &EntitySnapshot) -> Result<(), RuleRejection> {
    match kind {
        RuleKind::CoRun { tasks } => tasks.iter().try_for_each(|task| known_task(snapshot, task)),
        RuleKind::PhaseWindow { task_id, .. } => known_task(snapshot, task_id),
        RuleKind::Precedence { before, after } => {
            known_task(snapshot, before)?;
            known_task(snapshot, after)
        }
        RuleKind::LoadLimit { worker_group, .. } => {
            if snapshot.worker_groups().iter().any(|g| g == worker_group) {
                Ok(())
            } else {
                Err(RuleRejection::UnknownWorkerGroup(worker_group.clone()))
            }
        }
        RuleKind::SlotRestriction { group, .. } => match group {
            SlotGroup::WorkerGroup(name) => {
                if snapshot.worker_groups().iter().any(|g| g == name) {
                    Ok(())
                } else {
                    Err(RuleRejection::UnknownWorkerGroup(name.clone()))
                }
            }
            SlotGroup::ClientGroup(name) => {
                if snapshot.client_groups().iter().any(|g| g == name) {
                    Ok(())
                } else {
                    Err(RuleRejection::UnknownClientGroup(name.clone()))
                }
            }
        },
    }
}
