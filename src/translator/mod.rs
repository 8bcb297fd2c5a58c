//! Natural-language translation port.
//!
//! A translator turns free text into one structured intent plus a confidence. Nothing it
//! returns touches the store or the rule registry directly: the gateway screens the result
//! and the session holds any change proposal until a user accepts it.

use crate::filter::FilterSpec;
use crate::rules::RuleDraft;
use crate::store::{EntitySnapshot, ModificationIntent};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub mod gateway;
pub mod keyword;

pub use gateway::{GatewayOutcome, Proposal, ProposalKind, TranslatorGateway};
pub use keyword::KeywordTranslator;

/// The request channel a call belongs to. At most one call per surface is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Search,
    Modification,
    Rule,
    Insight,
}

impl Surface {
    pub const ALL: [Surface; 4] = [
        Surface::Search,
        Surface::Modification,
        Surface::Rule,
        Surface::Insight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Surface::Search => "search",
            Surface::Modification => "modification",
            Surface::Rule => "rule",
            Surface::Insight => "insight",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Surface::ALL
            .into_iter()
            .find(|surface| surface.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown surface '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub surface: Surface,
    pub text: String,
}

impl TranslationRequest {
    pub fn new(surface: Surface, text: impl Into<String>) -> Self {
        Self {
            surface,
            text: text.into(),
        }
    }
}

/// What a translator may look at: a read-only snapshot of the data.
#[derive(Debug, Clone, Default)]
pub struct TranslationContext {
    pub snapshot: EntitySnapshot,
}

impl TranslationContext {
    pub fn new(snapshot: EntitySnapshot) -> Self {
        Self { snapshot }
    }
}

/// Free-form answer to a question about the data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightResponse {
    pub answer: String,
    #[serde(default)]
    pub data_points: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "camelCase")]
pub enum Intent {
    Filter(FilterSpec),
    Modification(ModificationIntent),
    Rule(RuleDraft),
    Insight(InsightResponse),
}

impl Intent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Intent::Filter(_) => "filter",
            Intent::Modification(_) => "modification",
            Intent::Rule(_) => "rule",
            Intent::Insight(_) => "insight",
        }
    }

    /// Whether this kind of intent is an answer to a request on `surface`.
    pub fn belongs_to(&self, surface: Surface) -> bool {
        matches!(
            (self, surface),
            (Intent::Filter(_), Surface::Search)
                | (Intent::Modification(_), Surface::Modification)
                | (Intent::Rule(_), Surface::Rule)
                | (Intent::Insight(_), Surface::Insight)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub intent: Intent,
    /// In 0.0..=1.0.
    pub confidence: f64,
}

impl Translation {
    pub fn new(intent: Intent, confidence: f64) -> Self {
        Self { intent, confidence }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslatorError {
    #[error("could not make sense of the request: {0}")]
    Unrecognized(String),
    #[error("translator unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IntentTranslator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn translate(
        &self,
        request: &TranslationRequest,
        context: &TranslationContext,
    ) -> Result<Translation, TranslatorError>;
}
