pub mod config;
pub mod entity;
pub mod export;
pub mod filter;
pub mod priority;
pub mod rules;
pub mod session;
pub mod store;
pub mod translator;
pub mod validation;

pub use config::{AlchemistConfig, ConfigError};
pub use entity::{CellValue, Client, EntityKind, Record, Row, Task, Worker};
pub use export::{
    export_all, read_rows_csv, ready, save_bundle_to_json, ExportError, Readiness, RuleBundle,
};
pub use filter::{FieldFilter, FilterLogic, FilterOperator, FilterSpec, SearchHits};
pub use priority::{Preset, PresetError, PriorityCategory, PriorityModel, PriorityWeights};
pub use rules::{ReferencePolicy, Rule, RuleDraft, RuleId, RuleKind, RuleRegistry, RuleRejection, SlotGroup};
pub use session::{AcceptError, Accepted, PendingSuggestion, Session, TranslationOutcome};
pub use store::{
    Edit, EditError, EntityCounts, EntitySnapshot, EntityStore, ModificationAction, ModificationIntent,
};
pub use translator::{
    IntentTranslator, KeywordTranslator, Surface, Translation, TranslationContext, TranslationRequest,
    TranslatorError,
};
pub use validation::{
    validate, Severity, ValidationError, ValidationErrorKind, ValidationPipeline, ValidationReport,
};
