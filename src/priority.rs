use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PriorityCategory {
    TaskFulfillment,
    Fairness,
    Efficiency,
    Urgency,
    SkillMatch,
    WorkloadBalance,
}

impl PriorityCategory {
    pub const ALL: [PriorityCategory; 6] = [
        PriorityCategory::TaskFulfillment,
        PriorityCategory::Fairness,
        PriorityCategory::Efficiency,
        PriorityCategory::Urgency,
        PriorityCategory::SkillMatch,
        PriorityCategory::WorkloadBalance,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PriorityCategory::TaskFulfillment => "taskFulfillment",
            PriorityCategory::Fairness => "fairness",
            PriorityCategory::Efficiency => "efficiency",
            PriorityCategory::Urgency => "urgency",
            PriorityCategory::SkillMatch => "skillMatch",
            PriorityCategory::WorkloadBalance => "workloadBalance",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PriorityCategory::TaskFulfillment => "Task Fulfillment",
            PriorityCategory::Fairness => "Fair Distribution",
            PriorityCategory::Efficiency => "Resource Efficiency",
            PriorityCategory::Urgency => "Priority Level",
            PriorityCategory::SkillMatch => "Skill Matching",
            PriorityCategory::WorkloadBalance => "Workload Balance",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PriorityCategory::TaskFulfillment => "How important is completing requested tasks",
            PriorityCategory::Fairness => "Equal workload distribution among workers",
            PriorityCategory::Efficiency => "Optimal use of available resources",
            PriorityCategory::Urgency => "Respect client priority levels",
            PriorityCategory::SkillMatch => "Match tasks to worker expertise",
            PriorityCategory::WorkloadBalance => "Prevent worker overload",
        }
    }
}

impl fmt::Display for PriorityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for PriorityCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        PriorityCategory::ALL
            .into_iter()
            .find(|category| category.key().to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown priority category '{s}'"))
    }
}

/// Weight per category, each within 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityWeights {
    #[serde(deserialize_with = "clamped")]
    pub task_fulfillment: u8,
    #[serde(deserialize_with = "clamped")]
    pub fairness: u8,
    #[serde(deserialize_with = "clamped")]
    pub efficiency: u8,
    #[serde(deserialize_with = "clamped")]
    pub urgency: u8,
    #[serde(deserialize_with = "clamped")]
    pub skill_match: u8,
    #[serde(deserialize_with = "clamped")]
    pub workload_balance: u8,
}

fn clamp_weight(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

fn clamped<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    i64::deserialize(deserializer).map(clamp_weight)
}

impl PriorityWeights {
    pub const DEFAULT: PriorityWeights = PriorityWeights {
        task_fulfillment: 50,
        fairness: 30,
        efficiency: 40,
        urgency: 60,
        skill_match: 45,
        workload_balance: 35,
    };

    pub fn get(&self, category: PriorityCategory) -> u8 {
        match category {
            PriorityCategory::TaskFulfillment => self.task_fulfillment,
            PriorityCategory::Fairness => self.fairness,
            PriorityCategory::Efficiency => self.efficiency,
            PriorityCategory::Urgency => self.urgency,
            PriorityCategory::SkillMatch => self.skill_match,
            PriorityCategory::WorkloadBalance => self.workload_balance,
        }
    }

    fn slot(&mut self, category: PriorityCategory) -> &mut u8 {
        match category {
            PriorityCategory::TaskFulfillment => &mut self.task_fulfillment,
            PriorityCategory::Fairness => &mut self.fairness,
            PriorityCategory::Efficiency => &mut self.efficiency,
            PriorityCategory::Urgency => &mut self.urgency,
            PriorityCategory::SkillMatch => &mut self.skill_match,
            PriorityCategory::WorkloadBalance => &mut self.workload_balance,
        }
    }

    /// Categories with their weights, canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (PriorityCategory, u8)> + '_ {
        PriorityCategory::ALL
            .into_iter()
            .map(move |category| (category, self.get(category)))
    }
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Efficiency,
    Fairness,
    Urgent,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Efficiency, Preset::Fairness, Preset::Urgent];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Efficiency => "efficiency",
            Preset::Fairness => "fairness",
            Preset::Urgent => "urgent",
        }
    }

    pub fn weights(&self) -> PriorityWeights {
        let [task_fulfillment, fairness, efficiency, urgency, skill_match, workload_balance] = match self {
            Preset::Efficiency => [80, 20, 90, 40, 70, 30],
            Preset::Fairness => [40, 90, 30, 50, 60, 80],
            Preset::Urgent => [60, 40, 50, 95, 70, 25],
        };
        PriorityWeights {
            task_fulfillment,
            fairness,
            efficiency,
            urgency,
            skill_match,
            workload_balance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("unknown preset '{0}' (expected efficiency, fairness or urgent)")]
    Unknown(String),
}

impl FromStr for Preset {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "efficiency" => Ok(Preset::Efficiency),
            "fairness" => Ok(Preset::Fairness),
            "urgent" => Ok(Preset::Urgent),
            _ => Err(PresetError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightSummary {
    pub total: u32,
    pub average: f64,
    pub highest: PriorityCategory,
    pub lowest: PriorityCategory,
}

#[derive(Debug, Clone, Default)]
pub struct PriorityModel {
    weights: PriorityWeights,
}

impl PriorityModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn weights(&self) -> PriorityWeights {
        self.weights
    }

    /// Sets one weight, clamped into 0..=100. Returns the stored value.
    pub fn set_weight(&mut self, category: PriorityCategory, value: i64) -> u8 {
        let stored = clamp_weight(value);
        *self.weights.slot(category) = stored;
        stored
    }

    pub fn apply_preset(&mut self, name: &str) -> Result<(), PresetError> {
        let preset: Preset = name.parse()?;
        self.apply(preset);
        Ok(())
    }

    pub fn apply(&mut self, preset: Preset) {
        self.weights = preset.weights();
        info!(preset = preset.name(), "priority preset applied");
    }

    pub fn reset_to_default(&mut self) {
        self.weights = PriorityWeights::DEFAULT;
    }

    pub fn summary(&self) -> WeightSummary {
        let total: u32 = self.weights.iter().map(|(_, w)| u32::from(w)).sum();
        let mut highest = PriorityCategory::ALL[0];
        let mut lowest = PriorityCategory::ALL[0];
        for (category, weight) in self.weights.iter() {
            // strict comparisons keep the earliest category on ties
            if weight > self.weights.get(highest) {
                highest = category;
            }
            if weight < self.weights.get(lowest) {
                lowest = category;
            }
        }
        WeightSummary {
            total,
            average: f64::from(total) / PriorityCategory::ALL.len() as f64,
            highest,
            lowest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_summary_matches_known_values() {
        let summary = PriorityModel::new().summary();
        assert_eq!(summary.total, 260);
        assert!((summary.average - 260.0 / 6.0).abs() < 1e-9);
        assert_eq!(summary.highest, PriorityCategory::Urgency);
        assert_eq!(summary.lowest, PriorityCategory::Fairness);
    }

    #[test]
    fn deserialized_weights_are_clamped() {
        let weights: PriorityWeights = serde_json::from_str(
            r#"{"taskFulfillment":150,"fairness":-3,"efficiency":40,"urgency":60,"skillMatch":45,"workloadBalance":35}"#,
        )
        .unwrap();
        assert_eq!(weights.task_fulfillment, 100);
        assert_eq!(weights.fairness, 0);
    }

    #[test]
    fn categories_parse_from_keys_loosely() {
        assert_eq!("skillMatch".parse::<PriorityCategory>().unwrap(), PriorityCategory::SkillMatch);
        assert_eq!("skill_match".parse::<PriorityCategory>().unwrap(), PriorityCategory::SkillMatch);
        assert!("speed".parse::<PriorityCategory>().is_err());
    }
}
