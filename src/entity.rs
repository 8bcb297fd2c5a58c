use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A single raw row as delivered by the ingestion boundary: column name to cell.
pub type Row = BTreeMap<String, CellValue>;

/// Raw contents of one cell. Ingestion hands over strings or numbers; the core never
/// assumes a column is already typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Parses the cell as a whole number. Text is trimmed first; floats are accepted only
    /// when they carry no fractional part.
    pub fn parse_integer(&self) -> Option<i64> {
        match self {
            CellValue::Integer(v) => Some(*v),
            CellValue::Float(v) => integral(*v),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
            }
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Integer(v) => Some(*v as f64),
            CellValue::Float(v) if v.is_finite() => Some(*v),
            CellValue::Float(_) => None,
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.trim().is_empty())
    }

    /// Comma-delimited list view of the cell: split, trimmed, empties dropped.
    pub fn list(&self) -> Vec<String> {
        split_list(&self.to_string())
    }

    /// Interprets free text coming from a user or translator. Numeric-looking input becomes
    /// a number so that edits keep the shape ingestion would have produced.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            return CellValue::Integer(v);
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Float(v),
            _ => CellValue::Text(raw.to_string()),
        }
    }
}

fn integral(v: f64) -> Option<i64> {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(v) => write!(f, "{v}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Integer(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

/// Splits a comma-delimited cell into trimmed, non-empty entries.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Clients,
    Workers,
    Tasks,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Clients, EntityKind::Workers, EntityKind::Tasks];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Clients => "clients",
            EntityKind::Workers => "workers",
            EntityKind::Tasks => "tasks",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            EntityKind::Clients => "ClientID",
            EntityKind::Workers => "WorkerID",
            EntityKind::Tasks => "TaskID",
        }
    }

    /// Known columns in canonical order.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            EntityKind::Clients => Client::COLUMNS,
            EntityKind::Workers => Worker::COLUMNS,
            EntityKind::Tasks => Task::COLUMNS,
        }
    }

    /// Resolves a loosely written column name ("priority level", "prioritylevel") to its
    /// canonical spelling.
    pub fn resolve_column(&self, name: &str) -> Option<&'static str> {
        let wanted = normalize_column(name);
        self.columns()
            .iter()
            .copied()
            .find(|column| normalize_column(column) == wanted)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clients" | "client" => Ok(EntityKind::Clients),
            "workers" | "worker" => Ok(EntityKind::Workers),
            "tasks" | "task" => Ok(EntityKind::Tasks),
            other => Err(format!("unknown entity '{other}' (expected clients, workers or tasks)")),
        }
    }
}

pub(crate) fn normalize_column(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Shared behavior of the three row types.
pub trait Record: Clone + Default + fmt::Debug + Send + Sync + 'static {
    const KIND: EntityKind;
    const COLUMNS: &'static [&'static str];

    fn get(&self, column: &str) -> Option<&CellValue>;

    /// Writes a cell; `None` clears it. Unknown columns land in the extras map.
    fn set(&mut self, column: &str, value: Option<CellValue>);

    fn extra(&self) -> &BTreeMap<String, CellValue>;

    fn from_row(row: Row) -> Self {
        let mut record = Self::default();
        for (column, value) in row {
            record.set(&column, Some(value));
        }
        record
    }

    fn to_row(&self) -> Row {
        self.columns()
            .into_iter()
            .filter_map(|column| {
                self.get(column)
                    .map(|value| (column.to_string(), value.clone()))
            })
            .collect()
    }

    /// The record's key, if present and non-blank.
    fn id(&self) -> Option<String> {
        self.get(Self::KIND.id_column())
            .map(|value| value.to_string().trim().to_string())
            .filter(|id| !id.is_empty())
    }

    /// Columns present on this record: known ones in canonical order, then extras.
    fn columns(&self) -> Vec<&str> {
        let mut present: Vec<&str> = Self::COLUMNS
            .iter()
            .copied()
            .filter(|column| self.get(column).is_some())
            .collect();
        present.extend(self.extra().keys().map(String::as_str));
        present
    }

    fn text(&self, column: &str) -> Option<String> {
        self.get(column).map(ToString::to_string)
    }

    fn list(&self, column: &str) -> Vec<String> {
        self.get(column).map(CellValue::list).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Client {
    #[serde(rename = "ClientID", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<CellValue>,
    #[serde(rename = "ClientName", default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<CellValue>,
    #[serde(rename = "PriorityLevel", default, skip_serializing_if = "Option::is_none")]
    pub priority_level: Option<CellValue>,
    #[serde(rename = "RequestedTaskIDs", default, skip_serializing_if = "Option::is_none")]
    pub requested_task_ids: Option<CellValue>,
    #[serde(rename = "GroupTag", default, skip_serializing_if = "Option::is_none")]
    pub group_tag: Option<CellValue>,
    #[serde(rename = "AttributesJSON", default, skip_serializing_if = "Option::is_none")]
    pub attributes_json: Option<CellValue>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, CellValue>,
}

impl Client {
    pub fn new(id: &str, name: &str, priority_level: i64) -> Self {
        Self {
            client_id: Some(id.into()),
            client_name: Some(name.into()),
            priority_level: Some(priority_level.into()),
            ..Self::default()
        }
    }

    pub fn with_requested_tasks(mut self, task_ids: &str) -> Self {
        self.requested_task_ids = Some(task_ids.into());
        self
    }

    pub fn with_group(mut self, group_tag: &str) -> Self {
        self.group_tag = Some(group_tag.into());
        self
    }

    pub fn priority(&self) -> Option<i64> {
        self.priority_level.as_ref().and_then(CellValue::parse_integer)
    }

    pub fn requested_tasks(&self) -> Vec<String> {
        self.list("RequestedTaskIDs")
    }
}

impl Record for Client {
    const KIND: EntityKind = EntityKind::Clients;
    const COLUMNS: &'static [&'static str] = &[
        "ClientID",
        "ClientName",
        "PriorityLevel",
        "RequestedTaskIDs",
        "GroupTag",
        "AttributesJSON",
    ];

    fn get(&self, column: &str) -> Option<&CellValue> {
        match column {
            "ClientID" => self.client_id.as_ref(),
            "ClientName" => self.client_name.as_ref(),
            "PriorityLevel" => self.priority_level.as_ref(),
            "RequestedTaskIDs" => self.requested_task_ids.as_ref(),
            "GroupTag" => self.group_tag.as_ref(),
            "AttributesJSON" => self.attributes_json.as_ref(),
            other => self.extra.get(other),
        }
    }

    fn set(&mut self, column: &str, value: Option<CellValue>) {
        match column {
            "ClientID" => self.client_id = value,
            "ClientName" => self.client_name = value,
            "PriorityLevel" => self.priority_level = value,
            "RequestedTaskIDs" => self.requested_task_ids = value,
            "GroupTag" => self.group_tag = value,
            "AttributesJSON" => self.attributes_json = value,
            other => set_extra(&mut self.extra, other, value),
        }
    }

    fn extra(&self) -> &BTreeMap<String, CellValue> {
        &self.extra
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    #[serde(rename = "WorkerID", default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<CellValue>,
    #[serde(rename = "WorkerName", default, skip_serializing_if = "Option::is_none")]
    pub worker_name: Option<CellValue>,
    #[serde(rename = "Skills", default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<CellValue>,
    #[serde(rename = "AvailableSlots", default, skip_serializing_if = "Option::is_none")]
    pub available_slots: Option<CellValue>,
    #[serde(rename = "MaxLoadPerPhase", default, skip_serializing_if = "Option::is_none")]
    pub max_load_per_phase: Option<CellValue>,
    #[serde(rename = "WorkerGroup", default, skip_serializing_if = "Option::is_none")]
    pub worker_group: Option<CellValue>,
    #[serde(rename = "QualificationLevel", default, skip_serializing_if = "Option::is_none")]
    pub qualification_level: Option<CellValue>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, CellValue>,
}

impl Worker {
    pub fn new(id: &str, name: &str, skills: &str, available_slots: &str) -> Self {
        Self {
            worker_id: Some(id.into()),
            worker_name: Some(name.into()),
            skills: Some(skills.into()),
            available_slots: Some(available_slots.into()),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.worker_group = Some(group.into());
        self
    }

    pub fn skill_list(&self) -> Vec<String> {
        self.list("Skills")
    }

    pub fn group(&self) -> Option<String> {
        self.text("WorkerGroup")
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
    }
}

impl Record for Worker {
    const KIND: EntityKind = EntityKind::Workers;
    const COLUMNS: &'static [&'static str] = &[
        "WorkerID",
        "WorkerName",
        "Skills",
        "AvailableSlots",
        "MaxLoadPerPhase",
        "WorkerGroup",
        "QualificationLevel",
    ];

    fn get(&self, column: &str) -> Option<&CellValue> {
        match column {
            "WorkerID" => self.worker_id.as_ref(),
            "WorkerName" => self.worker_name.as_ref(),
            "Skills" => self.skills.as_ref(),
            "AvailableSlots" => self.available_slots.as_ref(),
            "MaxLoadPerPhase" => self.max_load_per_phase.as_ref(),
            "WorkerGroup" => self.worker_group.as_ref(),
            "QualificationLevel" => self.qualification_level.as_ref(),
            other => self.extra.get(other),
        }
    }

    fn set(&mut self, column: &str, value: Option<CellValue>) {
        match column {
            "WorkerID" => self.worker_id = value,
            "WorkerName" => self.worker_name = value,
            "Skills" => self.skills = value,
            "AvailableSlots" => self.available_slots = value,
            "MaxLoadPerPhase" => self.max_load_per_phase = value,
            "WorkerGroup" => self.worker_group = value,
            "QualificationLevel" => self.qualification_level = value,
            other => set_extra(&mut self.extra, other, value),
        }
    }

    fn extra(&self) -> &BTreeMap<String, CellValue> {
        &self.extra
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "TaskID", default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<CellValue>,
    #[serde(rename = "TaskName", default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<CellValue>,
    #[serde(rename = "Category", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CellValue>,
    #[serde(rename = "Duration", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<CellValue>,
    #[serde(rename = "RequiredSkills", default, skip_serializing_if = "Option::is_none")]
    pub required_skills: Option<CellValue>,
    #[serde(rename = "PreferredPhases", default, skip_serializing_if = "Option::is_none")]
    pub preferred_phases: Option<CellValue>,
    #[serde(rename = "MaxConcurrent", default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent: Option<CellValue>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, CellValue>,
}

impl Task {
    pub fn new(id: &str, name: &str, duration: i64) -> Self {
        Self {
            task_id: Some(id.into()),
            task_name: Some(name.into()),
            duration: Some(duration.into()),
            required_skills: Some("".into()),
            ..Self::default()
        }
    }

    pub fn with_required_skills(mut self, skills: &str) -> Self {
        self.required_skills = Some(skills.into());
        self
    }

    pub fn duration_value(&self) -> Option<i64> {
        self.duration.as_ref().and_then(CellValue::parse_integer)
    }

    pub fn required_skill_list(&self) -> Vec<String> {
        self.list("RequiredSkills")
    }

    pub fn name(&self) -> Option<String> {
        self.text("TaskName")
    }
}

impl Record for Task {
    const KIND: EntityKind = EntityKind::Tasks;
    const COLUMNS: &'static [&'static str] = &[
        "TaskID",
        "TaskName",
        "Category",
        "Duration",
        "RequiredSkills",
        "PreferredPhases",
        "MaxConcurrent",
    ];

    fn get(&self, column: &str) -> Option<&CellValue> {
        match column {
            "TaskID" => self.task_id.as_ref(),
            "TaskName" => self.task_name.as_ref(),
            "Category" => self.category.as_ref(),
            "Duration" => self.duration.as_ref(),
            "RequiredSkills" => self.required_skills.as_ref(),
            "PreferredPhases" => self.preferred_phases.as_ref(),
            "MaxConcurrent" => self.max_concurrent.as_ref(),
            other => self.extra.get(other),
        }
    }

    fn set(&mut self, column: &str, value: Option<CellValue>) {
        match column {
            "TaskID" => self.task_id = value,
            "TaskName" => self.task_name = value,
            "Category" => self.category = value,
            "Duration" => self.duration = value,
            "RequiredSkills" => self.required_skills = value,
            "PreferredPhases" => self.preferred_phases = value,
            "MaxConcurrent" => self.max_concurrent = value,
            other => set_extra(&mut self.extra, other, value),
        }
    }

    fn extra(&self) -> &BTreeMap<String, CellValue> {
        &self.extra
    }
}

fn set_extra(extra: &mut BTreeMap<String, CellValue>, column: &str, value: Option<CellValue>) {
    match value {
        Some(value) => {
            extra.insert(column.to_string(), value);
        }
        None => {
            extra.remove(column);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_parsing_accepts_trimmed_text_and_whole_floats() {
        assert_eq!(CellValue::from(" 3 ").parse_integer(), Some(3));
        assert_eq!(CellValue::from("4.0").parse_integer(), Some(4));
        assert_eq!(CellValue::Float(2.5).parse_integer(), None);
        assert_eq!(CellValue::from("high").parse_integer(), None);
    }

    #[test]
    fn unknown_columns_are_kept_as_extras() {
        let mut row = Row::new();
        row.insert("ClientID".into(), "C1".into());
        row.insert("Region".into(), "EU".into());
        let client = Client::from_row(row);
        assert_eq!(client.id().as_deref(), Some("C1"));
        assert_eq!(client.columns(), vec!["ClientID", "Region"]);
        assert_eq!(client.text("Region").as_deref(), Some("EU"));
    }

    #[test]
    fn column_names_resolve_loosely() {
        assert_eq!(
            EntityKind::Clients.resolve_column("priority level"),
            Some("PriorityLevel")
        );
        assert_eq!(
            EntityKind::Tasks.resolve_column("preferredphases"),
            Some("PreferredPhases")
        );
        assert_eq!(EntityKind::Workers.resolve_column("salary"), None);
    }

    #[test]
    fn list_cells_split_and_trim() {
        let cell = CellValue::from("T1, T2,,T3 ");
        assert_eq!(cell.list(), vec!["T1", "T2", "T3"]);
    }
}
