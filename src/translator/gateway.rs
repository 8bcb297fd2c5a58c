use super::{
    InsightResponse, Intent, IntentTranslator, Surface, Translation, TranslationContext, TranslationRequest,
};
use crate::filter::FilterSpec;
use crate::rules::RuleDraft;
use crate::store::ModificationIntent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// A change proposal held back until a user accepts it.
#[derive(Debug, Clone, PartialEq)]
pub enum ProposalKind {
    Modification(ModificationIntent),
    Rule(RuleDraft),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub kind: ProposalKind,
    pub confidence: f64,
    pub source_text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    Filter { spec: FilterSpec, confidence: f64 },
    Insight { response: InsightResponse, confidence: f64 },
    Proposal(Proposal),
    /// A change proposal at or below the confidence threshold.
    Discarded { confidence: f64 },
    /// A newer call on the same surface replaced this one.
    Superseded,
    Unavailable { reason: String },
}

struct LiveCall {
    generation: u64,
    abort: AbortHandle,
}

/// Runs translator calls with a timeout, one live call per surface, and screens what comes
/// back. Translator failures never escape as errors.
pub struct TranslatorGateway {
    translator: Arc<dyn IntentTranslator>,
    timeout: Duration,
    min_confidence: f64,
    live: Mutex<HashMap<Surface, LiveCall>>,
    generation: AtomicU64,
}

impl TranslatorGateway {
    pub fn new(translator: Arc<dyn IntentTranslator>, timeout: Duration, min_confidence: f64) -> Self {
        Self {
            translator,
            timeout,
            min_confidence,
            live: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn translator_name(&self) -> &'static str {
        self.translator.name()
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn live_calls(&self) -> usize {
        self.live.lock().len()
    }

    /// Must be called from within a tokio runtime.
    pub async fn submit(&self, request: TranslationRequest, context: TranslationContext) -> GatewayOutcome {
        let surface = request.surface;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let translator = Arc::clone(&self.translator);
        let timeout = self.timeout;
        let call = request.clone();
        let handle = tokio::spawn(async move {
            tokio::time::timeout(timeout, translator.translate(&call, &context)).await
        });

        if let Some(previous) = self.live.lock().insert(
            surface,
            LiveCall {
                generation,
                abort: handle.abort_handle(),
            },
        ) {
            previous.abort.abort();
            debug!(%surface, superseded = previous.generation, generation, "translator call superseded");
        }

        let joined = handle.await;

        let still_current = {
            let mut live = self.live.lock();
            match live.get(&surface) {
                Some(call) if call.generation == generation => {
                    live.remove(&surface);
                    true
                }
                _ => false,
            }
        };
        if !still_current {
            return GatewayOutcome::Superseded;
        }

        match joined {
            Err(join_error) if join_error.is_cancelled() => GatewayOutcome::Superseded,
            Err(join_error) => {
                warn!(%surface, error = %join_error, "translator task failed");
                unavailable(surface, "translator failed")
            }
            Ok(Err(_elapsed)) => {
                warn!(%surface, timeout_ms = timeout.as_millis() as u64, "translator timed out");
                unavailable(surface, "timed out")
            }
            Ok(Ok(Err(error))) => {
                warn!(%surface, %error, "translator returned an error");
                unavailable(surface, &error.to_string())
            }
            Ok(Ok(Ok(translation))) => self.screen(surface, request.text, translation),
        }
    }

    fn screen(&self, surface: Surface, source_text: String, translation: Translation) -> GatewayOutcome {
        let Translation { intent, confidence } = translation;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            warn!(%surface, confidence, "translator confidence out of range");
            return unavailable(surface, "malformed confidence");
        }
        if !intent.belongs_to(surface) {
            warn!(%surface, intent = intent.kind_name(), "intent does not match surface");
            return unavailable(surface, "malformed intent");
        }
        match intent {
            Intent::Filter(spec) => GatewayOutcome::Filter { spec, confidence },
            Intent::Insight(response) => GatewayOutcome::Insight {
                response,
                confidence,
            },
            Intent::Modification(intent) => {
                self.gate(ProposalKind::Modification(intent), confidence, source_text)
            }
            Intent::Rule(draft) => self.gate(ProposalKind::Rule(draft), confidence, source_text),
        }
    }

    fn gate(&self, kind: ProposalKind, confidence: f64, source_text: String) -> GatewayOutcome {
        if confidence <= self.min_confidence {
            debug!(confidence, threshold = self.min_confidence, "low-confidence proposal discarded");
            return GatewayOutcome::Discarded { confidence };
        }
        GatewayOutcome::Proposal(Proposal {
            kind,
            confidence,
            source_text,
        })
    }
}

fn unavailable(surface: Surface, cause: &str) -> GatewayOutcome {
    GatewayOutcome::Unavailable {
        reason: format!("Could not process the {surface} request ({cause})"),
    }
}
