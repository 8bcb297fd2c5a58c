//! One working session: the store, rules, priorities and translator behind a single handle.
//!
//! Components sit behind their own `RwLock`, so every writer is serialized per component.
//! Validation always runs on an owned snapshot and publishes through the sequencer.
//! Translator change proposals wait in the pending table until accepted, and acceptance
//! goes through the same edit and rule paths as manual input.

use crate::config::AlchemistConfig;
use crate::entity::{EntityKind, Row};
use crate::export::{self, ExportResult, Readiness, RuleBundle, ValidationStatus};
use crate::filter::{self, FilterSpec, SearchHits};
use crate::priority::{PresetError, PriorityCategory, PriorityModel, PriorityWeights, WeightSummary};
use crate::rules::{Rule, RuleDraft, RuleId, RuleRegistry, RuleRejection};
use crate::store::{Edit, EditError, EntityCounts, EntitySnapshot, EntityStore};
use crate::translator::{
    GatewayOutcome, InsightResponse, IntentTranslator, KeywordTranslator, Proposal, ProposalKind, Surface,
    TranslationContext, TranslationRequest, TranslatorGateway,
};
use crate::validation::{AppliedReport, ValidationPipeline, ValidationReport, ValidationSequencer};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PendingSuggestion {
    pub id: u64,
    pub surface: Surface,
    pub proposal: Proposal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranslationOutcome {
    Matches {
        spec: FilterSpec,
        hits: SearchHits,
        confidence: f64,
    },
    Insight {
        response: InsightResponse,
        confidence: f64,
    },
    Suggestion(PendingSuggestion),
    Discarded {
        confidence: f64,
    },
    Superseded,
    Unavailable {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accepted {
    Modified { rows: usize },
    RuleAdded(Rule),
}

#[derive(Debug, Error)]
pub enum AcceptError {
    #[error("no pending suggestion #{0}")]
    UnknownSuggestion(u64),
    #[error("edit rejected: {0}")]
    Edit(#[from] EditError),
    #[error("rule rejected: {0}")]
    Rule(#[from] RuleRejection),
}

pub struct Session {
    config: AlchemistConfig,
    store: RwLock<EntityStore>,
    rules: RwLock<RuleRegistry>,
    priorities: RwLock<PriorityModel>,
    pipeline: Arc<ValidationPipeline>,
    sequencer: ValidationSequencer,
    gateway: TranslatorGateway,
    pending: Mutex<BTreeMap<u64, PendingSuggestion>>,
    next_suggestion: AtomicU64,
}

impl Session {
    pub fn new(config: AlchemistConfig) -> Self {
        Self::with_translator(config, Arc::new(KeywordTranslator::new()))
    }

    pub fn with_translator(config: AlchemistConfig, translator: Arc<dyn IntentTranslator>) -> Self {
        let gateway = TranslatorGateway::new(translator, config.translator_timeout, config.min_confidence);
        Self {
            store: RwLock::new(EntityStore::new()),
            rules: RwLock::new(RuleRegistry::new(config.reference_policy)),
            priorities: RwLock::new(PriorityModel::new()),
            pipeline: Arc::new(ValidationPipeline::standard()),
            sequencer: ValidationSequencer::new(),
            gateway,
            pending: Mutex::new(BTreeMap::new()),
            next_suggestion: AtomicU64::new(1),
            config,
        }
    }

    pub fn config(&self) -> &AlchemistConfig {
        &self.config
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        self.store.read().snapshot()
    }

    pub fn revision(&self) -> u64 {
        self.store.read().revision()
    }

    pub fn counts(&self) -> EntityCounts {
        self.store.read().counts()
    }

    pub fn apply_edit(&self, edit: Edit) -> Result<usize, EditError> {
        self.store.write().apply(edit)
    }

    /// Replaces a collection with freshly ingested rows.
    pub fn load_rows(&self, entity: EntityKind, rows: Vec<Row>) -> Result<usize, EditError> {
        let loaded = self.apply_edit(Edit::Replace { entity, rows })?;
        info!(entity = entity.as_str(), rows = loaded, "collection loaded");
        Ok(loaded)
    }

    /// Validates the current snapshot on the calling thread and returns this run's report.
    /// The report is published only if no later run has started meanwhile.
    pub fn validate_now(&self) -> ValidationReport {
        let snapshot = self.snapshot();
        let ticket = self.sequencer.begin(snapshot.revision());
        let report = self.pipeline.validate(&snapshot);
        self.sequencer.complete(ticket, report.clone());
        report
    }

    /// Validates on the blocking pool. Returns the report if it was published, `None` if a
    /// newer run overtook it.
    pub async fn revalidate(&self) -> Option<Arc<ValidationReport>> {
        let snapshot = self.snapshot();
        let ticket = self.sequencer.begin(snapshot.revision());
        let pipeline = Arc::clone(&self.pipeline);
        let report = match tokio::task::spawn_blocking(move || pipeline.validate(&snapshot)).await {
            Ok(report) => report,
            Err(error) => {
                warn!(%error, "validation task failed");
                return None;
            }
        };
        if self.sequencer.complete(ticket, report) {
            self.sequencer.latest_report()
        } else {
            None
        }
    }

    pub fn latest_report(&self) -> Option<Arc<ValidationReport>> {
        self.sequencer.latest_report()
    }

    /// Whether the published report describes the store as it is now.
    pub fn report_is_current(&self) -> bool {
        self.sequencer
            .latest()
            .is_some_and(|applied| applied.revision == self.revision())
    }

    pub fn add_rule(&self, draft: RuleDraft) -> Result<Rule, RuleRejection> {
        let snapshot = self.snapshot();
        self.rules.write().add_rule(draft, &snapshot)
    }

    pub fn remove_rule(&self, id: RuleId) -> bool {
        self.rules.write().remove_rule(id)
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.rules.read().list_rules()
    }

    pub fn weights(&self) -> PriorityWeights {
        self.priorities.read().weights()
    }

    pub fn set_weight(&self, category: PriorityCategory, value: i64) -> u8 {
        self.priorities.write().set_weight(category, value)
    }

    pub fn apply_preset(&self, name: &str) -> Result<(), PresetError> {
        self.priorities.write().apply_preset(name)
    }

    pub fn reset_weights(&self) {
        self.priorities.write().reset_to_default();
    }

    pub fn weight_summary(&self) -> WeightSummary {
        self.priorities.read().summary()
    }

    pub fn search(&self, spec: &FilterSpec) -> SearchHits {
        spec.apply(&self.snapshot())
    }

    pub fn keyword_search(&self, query: &str) -> SearchHits {
        filter::keyword_search(&self.snapshot(), query)
    }

    /// Sends free text through the translator gateway. Change proposals are parked as
    /// pending suggestions; a newer proposal on the same surface replaces the older one.
    pub async fn translate(&self, surface: Surface, text: &str) -> TranslationOutcome {
        let context = TranslationContext::new(self.snapshot());
        let outcome = self
            .gateway
            .submit(TranslationRequest::new(surface, text), context)
            .await;
        match outcome {
            GatewayOutcome::Filter { spec, confidence } => {
                let hits = self.search(&spec);
                TranslationOutcome::Matches {
                    spec,
                    hits,
                    confidence,
                }
            }
            GatewayOutcome::Insight {
                response,
                confidence,
            } => TranslationOutcome::Insight {
                response,
                confidence,
            },
            GatewayOutcome::Proposal(proposal) => {
                TranslationOutcome::Suggestion(self.park(surface, proposal))
            }
            GatewayOutcome::Discarded { confidence } => TranslationOutcome::Discarded { confidence },
            GatewayOutcome::Superseded => TranslationOutcome::Superseded,
            GatewayOutcome::Unavailable { reason } => TranslationOutcome::Unavailable { reason },
        }
    }

    fn park(&self, surface: Surface, proposal: Proposal) -> PendingSuggestion {
        let id = self.next_suggestion.fetch_add(1, Ordering::SeqCst);
        let suggestion = PendingSuggestion {
            id,
            surface,
            proposal,
        };
        let mut pending = self.pending.lock();
        pending.retain(|_, existing| existing.surface != surface);
        pending.insert(id, suggestion.clone());
        info!(id, %surface, confidence = suggestion.proposal.confidence, "suggestion pending");
        suggestion
    }

    pub fn pending_suggestions(&self) -> Vec<PendingSuggestion> {
        self.pending.lock().values().cloned().collect()
    }

    /// Applies a pending suggestion. The suggestion is consumed even when the edit or rule
    /// is rejected.
    pub fn accept_suggestion(&self, id: u64) -> Result<Accepted, AcceptError> {
        let suggestion = self
            .pending
            .lock()
            .remove(&id)
            .ok_or(AcceptError::UnknownSuggestion(id))?;
        let accepted = match suggestion.proposal.kind {
            ProposalKind::Modification(intent) => Accepted::Modified {
                rows: self.apply_edit(Edit::Modify(intent))?,
            },
            ProposalKind::Rule(draft) => Accepted::RuleAdded(self.add_rule(draft)?),
        };
        info!(id, "suggestion accepted");
        Ok(accepted)
    }

    pub fn reject_suggestion(&self, id: u64) -> bool {
        let removed = self.pending.lock().remove(&id).is_some();
        if removed {
            info!(id, "suggestion rejected");
        }
        removed
    }

    /// Export gate for the current state. A missing or out-of-date validation report blocks
    /// export on its own.
    pub fn readiness(&self) -> Readiness {
        let (counts, revision) = {
            let store = self.store.read();
            (store.counts(), store.revision())
        };
        gate(self.sequencer.latest().as_ref(), revision, counts)
    }

    pub fn rule_bundle(&self) -> RuleBundle {
        let revision = self.revision();
        let status = match self.sequencer.latest() {
            Some(applied) if applied.revision == revision => ValidationStatus::of(&applied.report),
            _ => ValidationStatus::Failed,
        };
        self.bundle_with(status)
    }

    /// Writes the validated files. The gate decision and the exported report come from the
    /// same published run, taken against the same store revision as the exported rows.
    pub fn export_all<P: AsRef<Path>>(&self, dir: P) -> ExportResult<Vec<PathBuf>> {
        let (snapshot, revision) = {
            let store = self.store.read();
            (store.snapshot(), store.revision())
        };
        let applied = self.sequencer.latest();
        gate(applied.as_ref(), revision, snapshot.counts()).into_result()?;
        let applied = applied.ok_or_else(|| export::ExportError::NotReady {
            reasons: vec!["Data has not been validated".to_string()],
        })?;
        let bundle = self.bundle_with(ValidationStatus::of(&applied.report));
        export::export_all(dir, &snapshot, &applied.report, &bundle)
    }

    fn bundle_with(&self, status: ValidationStatus) -> RuleBundle {
        RuleBundle::new(
            self.rules(),
            self.weights(),
            status,
            self.config.export_version.clone(),
            Utc::now(),
        )
    }
}

fn gate(applied: Option<&AppliedReport>, revision: u64, counts: EntityCounts) -> Readiness {
    match applied {
        Some(applied) if applied.revision == revision => export::ready(counts, &applied.report),
        latest => {
            let mut reasons = vec![if latest.is_none() {
                "Data has not been validated".to_string()
            } else {
                "Data changed since the last validation run".to_string()
            }];
            if counts.total() == 0 {
                reasons.push("No data loaded".to_string());
            }
            Readiness::blocked(reasons)
        }
    }
}
