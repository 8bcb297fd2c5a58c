use crate::entity::{CellValue, Client, EntityKind, Record, Row, Task, Worker};
use crate::filter::FieldFilter;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub clients: usize,
    pub workers: usize,
    pub tasks: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.clients + self.workers + self.tasks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationAction {
    Update,
    Add,
    Delete,
}

/// A proposed change to one collection: which rows (all filters must hold) and what to
/// write into them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModificationIntent {
    pub action: ModificationAction,
    pub entity: EntityKind,
    #[serde(default)]
    pub filters: Vec<FieldFilter>,
    #[serde(default)]
    pub changes: Row,
}

/// Every change to the store goes through one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Replaces a whole collection, as a fresh upload does.
    Replace { entity: EntityKind, rows: Vec<Row> },
    SetCell {
        entity: EntityKind,
        row: usize,
        column: String,
        value: Option<CellValue>,
    },
    Append { entity: EntityKind, row: Row },
    RemoveRow { entity: EntityKind, row: usize },
    Modify(ModificationIntent),
}

impl Edit {
    pub fn entity(&self) -> EntityKind {
        match self {
            Edit::Replace { entity, .. }
            | Edit::SetCell { entity, .. }
            | Edit::Append { entity, .. }
            | Edit::RemoveRow { entity, .. } => *entity,
            Edit::Modify(intent) => intent.entity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("{entity} row {row} does not exist ({len} rows loaded)")]
    RowOutOfRange {
        entity: EntityKind,
        row: usize,
        len: usize,
    },
    #[error("{action:?} on {entity} needs at least one filter to select rows")]
    UnscopedModification {
        entity: EntityKind,
        action: ModificationAction,
    },
    #[error("modification of {entity} carries no values to write")]
    EmptyChanges { entity: EntityKind },
}

/// Immutable view of the three collections at one store revision.
#[derive(Debug, Clone, Default)]
pub struct EntitySnapshot {
    revision: u64,
    clients: Arc<Vec<Client>>,
    workers: Arc<Vec<Worker>>,
    tasks: Arc<Vec<Task>>,
}

impl EntitySnapshot {
    pub fn new(clients: Vec<Client>, workers: Vec<Worker>, tasks: Vec<Task>) -> Self {
        Self {
            revision: 0,
            clients: Arc::new(clients),
            workers: Arc::new(workers),
            tasks: Arc::new(tasks),
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn counts(&self) -> EntityCounts {
        EntityCounts {
            clients: self.clients.len(),
            workers: self.workers.len(),
            tasks: self.tasks.len(),
        }
    }

    pub fn task_ids(&self) -> HashSet<String> {
        self.tasks.iter().filter_map(Record::id).collect()
    }

    pub fn has_task(&self, id: &str) -> bool {
        self.tasks.iter().any(|task| task.id().as_deref() == Some(id))
    }

    /// Distinct worker groups in first-seen order.
    pub fn worker_groups(&self) -> Vec<String> {
        distinct(self.workers.iter().filter_map(Worker::group))
    }

    /// Distinct client group tags in first-seen order.
    pub fn client_groups(&self) -> Vec<String> {
        distinct(self.clients.iter().filter_map(|client| {
            client
                .text("GroupTag")
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
        }))
    }

    pub fn ids(&self, kind: EntityKind) -> Vec<String> {
        match kind {
            EntityKind::Clients => self.clients.iter().filter_map(Record::id).collect(),
            EntityKind::Workers => self.workers.iter().filter_map(Record::id).collect(),
            EntityKind::Tasks => self.tasks.iter().filter_map(Record::id).collect(),
        }
    }

    pub fn row(&self, kind: EntityKind, index: usize) -> Option<Row> {
        match kind {
            EntityKind::Clients => self.clients.get(index).map(Record::to_row),
            EntityKind::Workers => self.workers.get(index).map(Record::to_row),
            EntityKind::Tasks => self.tasks.get(index).map(Record::to_row),
        }
    }
}

fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values.filter(|value| seen.insert(value.clone())).collect()
}

/// Owner of the client, worker and task rows. Snapshots share storage until the next
/// edit touches the collection.
#[derive(Debug, Default)]
pub struct EntityStore {
    current: EntitySnapshot,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        self.current.clone()
    }

    pub fn revision(&self) -> u64 {
        self.current.revision
    }

    pub fn counts(&self) -> EntityCounts {
        self.current.counts()
    }

    /// Applies one edit and returns the number of rows it touched.
    pub fn apply(&mut self, edit: Edit) -> Result<usize, EditError> {
        let entity = edit.entity();
        let touched = match entity {
            EntityKind::Clients => apply_to(&mut self.current.clients, edit)?,
            EntityKind::Workers => apply_to(&mut self.current.workers, edit)?,
            EntityKind::Tasks => apply_to(&mut self.current.tasks, edit)?,
        };
        self.current.revision += 1;
        debug!(
            entity = entity.as_str(),
            touched,
            revision = self.current.revision,
            "store edit applied"
        );
        Ok(touched)
    }
}

fn apply_to<R: Record>(rows: &mut Arc<Vec<R>>, edit: Edit) -> Result<usize, EditError> {
    match edit {
        Edit::Replace { rows: new_rows, .. } => {
            let count = new_rows.len();
            *rows = Arc::new(new_rows.into_iter().map(R::from_row).collect());
            Ok(count)
        }
        Edit::SetCell {
            row, column, value, ..
        } => {
            let len = rows.len();
            let record = Arc::make_mut(rows)
                .get_mut(row)
                .ok_or(EditError::RowOutOfRange {
                    entity: R::KIND,
                    row,
                    len,
                })?;
            let column = R::KIND.resolve_column(&column).unwrap_or(column.as_str());
            record.set(column, value);
            Ok(1)
        }
        Edit::Append { row, .. } => {
            Arc::make_mut(rows).push(R::from_row(row));
            Ok(1)
        }
        Edit::RemoveRow { row, .. } => {
            if row >= rows.len() {
                return Err(EditError::RowOutOfRange {
                    entity: R::KIND,
                    row,
                    len: rows.len(),
                });
            }
            Arc::make_mut(rows).remove(row);
            Ok(1)
        }
        Edit::Modify(intent) => modify(rows, intent),
    }
}

fn modify<R: Record>(rows: &mut Arc<Vec<R>>, intent: ModificationIntent) -> Result<usize, EditError> {
    let ModificationIntent {
        action,
        entity,
        filters,
        changes,
    } = intent;
    if action != ModificationAction::Delete && changes.is_empty() {
        return Err(EditError::EmptyChanges { entity });
    }
    if action != ModificationAction::Add && filters.is_empty() {
        return Err(EditError::UnscopedModification { entity, action });
    }
    let selected = |record: &R| filters.iter().all(|filter| filter.matches(record));

    match action {
        ModificationAction::Update => {
            let mut touched = 0;
            for record in Arc::make_mut(rows).iter_mut().filter(|r| selected(&**r)) {
                for (column, value) in &changes {
                    let column = R::KIND.resolve_column(column).unwrap_or(column.as_str());
                    record.set(column, Some(value.clone()));
                }
                touched += 1;
            }
            Ok(touched)
        }
        ModificationAction::Delete => {
            let before = rows.len();
            Arc::make_mut(rows).retain(|record| !selected(record));
            Ok(before - rows.len())
        }
        ModificationAction::Add => {
            let row = changes
                .into_iter()
                .map(|(column, value)| {
                    let column = R::KIND
                        .resolve_column(&column)
                        .map(str::to_string)
                        .unwrap_or(column);
                    (column, value)
                })
                .collect();
            Arc::make_mut(rows).push(R::from_row(row));
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_row(id: &str, priority: &str) -> Row {
        let mut row = Row::new();
        row.insert("ClientID".into(), id.into());
        row.insert("PriorityLevel".into(), priority.into());
        row
    }

    #[test]
    fn snapshots_are_isolated_from_later_edits() {
        let mut store = EntityStore::new();
        store
            .apply(Edit::Replace {
                entity: EntityKind::Clients,
                rows: vec![client_row("C1", "3")],
            })
            .unwrap();
        let before = store.snapshot();
        store
            .apply(Edit::SetCell {
                entity: EntityKind::Clients,
                row: 0,
                column: "priority level".into(),
                value: Some("5".into()),
            })
            .unwrap();

        assert_eq!(before.clients()[0].priority(), Some(3));
        assert_eq!(store.snapshot().clients()[0].priority(), Some(5));
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn out_of_range_edits_leave_revision_untouched() {
        let mut store = EntityStore::new();
        let err = store
            .apply(Edit::RemoveRow {
                entity: EntityKind::Tasks,
                row: 0,
            })
            .unwrap_err();
        assert!(matches!(err, EditError::RowOutOfRange { len: 0, .. }));
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn unscoped_updates_are_refused() {
        let mut store = EntityStore::new();
        let mut changes = Row::new();
        changes.insert("PriorityLevel".into(), 5i64.into());
        let err = store
            .apply(Edit::Modify(ModificationIntent {
                action: ModificationAction::Update,
                entity: EntityKind::Clients,
                filters: Vec::new(),
                changes,
            }))
            .unwrap_err();
        assert!(matches!(err, EditError::UnscopedModification { .. }));
    }
}
