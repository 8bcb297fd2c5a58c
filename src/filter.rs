use crate::entity::{CellValue, EntityKind, Record, split_list};
use crate::store::EntitySnapshot;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Equals,
    Contains,
    Greater,
    Less,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterLogic {
    #[default]
    And,
    Or,
}

/// One `field <operator> value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub field: String,
    pub operator: FilterOperator,
    pub value: CellValue,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<CellValue>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self::new(field, FilterOperator::Equals, value)
    }

    pub fn matches<R: Record>(&self, record: &R) -> bool {
        let column = R::KIND.resolve_column(&self.field).unwrap_or(self.field.as_str());
        let Some(cell) = record.get(column) else {
            return false;
        };
        match self.operator {
            FilterOperator::Equals => compare(cell, &self.value) == Some(Ordering::Equal),
            FilterOperator::Greater => numeric_cmp(cell, &self.value) == Some(Ordering::Greater),
            FilterOperator::Less => numeric_cmp(cell, &self.value) == Some(Ordering::Less),
            FilterOperator::Contains => contains(cell, &self.value),
        }
    }
}

fn numeric_cmp(left: &CellValue, right: &CellValue) -> Option<Ordering> {
    left.as_number()?.partial_cmp(&right.as_number()?)
}

fn compare(left: &CellValue, right: &CellValue) -> Option<Ordering> {
    numeric_cmp(left, right).or_else(|| {
        let l = left.to_string().trim().to_lowercase();
        let r = right.to_string().trim().to_lowercase();
        Some(l.cmp(&r))
    })
}

/// List cells ("1,2,3" or "[1,2,3]") match on whole entries; scalar cells on substring.
fn contains(cell: &CellValue, needle: &CellValue) -> bool {
    let haystack = cell.to_string().to_lowercase();
    let needle = needle.to_string().trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let entries = split_list(haystack.trim_matches(|c| c == '[' || c == ']'));
    if entries.len() > 1 {
        entries.iter().any(|entry| *entry == needle)
    } else {
        haystack.contains(&needle)
    }
}

/// A structured query over one entity collection (or all of them when `entity` is unset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityKind>,
    pub filters: Vec<FieldFilter>,
    #[serde(default)]
    pub logic: FilterLogic,
}

impl FilterSpec {
    pub fn matches<R: Record>(&self, record: &R) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        match self.logic {
            FilterLogic::And => self.filters.iter().all(|f| f.matches(record)),
            FilterLogic::Or => self.filters.iter().any(|f| f.matches(record)),
        }
    }

    fn applies_to(&self, kind: EntityKind) -> bool {
        self.entity.is_none_or(|entity| entity == kind)
    }

    /// Row indices matching these filters, per collection.
    pub fn apply(&self, snapshot: &EntitySnapshot) -> SearchHits {
        SearchHits {
            clients: self.indices(snapshot.clients(), EntityKind::Clients),
            workers: self.indices(snapshot.workers(), EntityKind::Workers),
            tasks: self.indices(snapshot.tasks(), EntityKind::Tasks),
        }
    }

    fn indices<R: Record>(&self, rows: &[R], kind: EntityKind) -> Vec<usize> {
        if !self.applies_to(kind) {
            return Vec::new();
        }
        rows.iter()
            .enumerate()
            .filter(|(_, row)| self.matches(*row))
            .map(|(idx, _)| idx)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHits {
    pub clients: Vec<usize>,
    pub workers: Vec<usize>,
    pub tasks: Vec<usize>,
}

impl SearchHits {
    pub fn total(&self) -> usize {
        self.clients.len() + self.workers.len() + self.tasks.len()
    }

    pub fn for_entity(&self, kind: EntityKind) -> &[usize] {
        match kind {
            EntityKind::Clients => &self.clients,
            EntityKind::Workers => &self.workers,
            EntityKind::Tasks => &self.tasks,
        }
    }
}

/// Case-insensitive substring search over every cell. An empty query matches everything.
pub fn keyword_search(snapshot: &EntitySnapshot, query: &str) -> SearchHits {
    let needle = query.trim().to_lowercase();
    SearchHits {
        clients: keyword_indices(snapshot.clients(), &needle),
        workers: keyword_indices(snapshot.workers(), &needle),
        tasks: keyword_indices(snapshot.tasks(), &needle),
    }
}

fn keyword_indices<R: Record>(rows: &[R], needle: &str) -> Vec<usize> {
    rows.iter()
        .enumerate()
        .filter(|(_, row)| {
            needle.is_empty()
                || row.columns().into_iter().any(|column| {
                    row.get(column)
                        .is_some_and(|cell| cell.to_string().to_lowercase().contains(needle))
                })
        })
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Task;

    #[test]
    fn contains_matches_whole_list_entries() {
        let mut task = Task::new("T1", "Build", 2);
        task.preferred_phases = Some("1,2,12".into());
        assert!(FieldFilter::new("PreferredPhases", FilterOperator::Contains, 2i64).matches(&task));
        assert!(!FieldFilter::new("PreferredPhases", FilterOperator::Contains, 3i64).matches(&task));
    }

    #[test]
    fn numeric_comparisons_ignore_non_numeric_cells() {
        let task = Task::new("T1", "Build", 3);
        assert!(FieldFilter::new("duration", FilterOperator::Greater, 1i64).matches(&task));
        assert!(!FieldFilter::new("TaskName", FilterOperator::Greater, 1i64).matches(&task));
    }

    #[test]
    fn equality_falls_back_to_case_insensitive_text() {
        let task = Task::new("T1", "Build", 3);
        assert!(FieldFilter::equals("TaskName", "build").matches(&task));
        assert!(FieldFilter::equals("Duration", "3.0").matches(&task));
    }
}
