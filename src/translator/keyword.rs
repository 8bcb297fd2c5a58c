//! Deterministic keyword translator. Matches phrases and known identifiers; no model behind it.

use super::{
    InsightResponse, Intent, IntentTranslator, Surface, Translation, TranslationContext, TranslationRequest,
    TranslatorError,
};
use crate::entity::{CellValue, EntityKind, Record, Row};
use crate::filter::{FieldFilter, FilterLogic, FilterOperator, FilterSpec};
use crate::rules::{RuleDraft, SlotGroup};
use crate::store::{EntitySnapshot, ModificationAction, ModificationIntent};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

const MAX_PHASE_SPAN: u32 = 64;

const OPERATORS: &[(&str, FilterOperator)] = &[
    ("greater than", FilterOperator::Greater),
    ("more than", FilterOperator::Greater),
    ("above", FilterOperator::Greater),
    ("over", FilterOperator::Greater),
    (">", FilterOperator::Greater),
    ("less than", FilterOperator::Less),
    ("fewer than", FilterOperator::Less),
    ("below", FilterOperator::Less),
    ("under", FilterOperator::Less),
    ("<", FilterOperator::Less),
    ("contains", FilterOperator::Contains),
    ("contain", FilterOperator::Contains),
    ("includes", FilterOperator::Contains),
    ("include", FilterOperator::Contains),
    ("including", FilterOperator::Contains),
    ("has", FilterOperator::Contains),
    ("have", FilterOperator::Contains),
    ("equals", FilterOperator::Equals),
    ("equal to", FilterOperator::Equals),
    ("is", FilterOperator::Equals),
    ("of", FilterOperator::Equals),
    ("=", FilterOperator::Equals),
];

const ALIASES: &[(EntityKind, &str, &str)] = &[
    (EntityKind::Clients, "priority", "PriorityLevel"),
    (EntityKind::Clients, "name", "ClientName"),
    (EntityKind::Clients, "group", "GroupTag"),
    (EntityKind::Clients, "requested tasks", "RequestedTaskIDs"),
    (EntityKind::Workers, "name", "WorkerName"),
    (EntityKind::Workers, "skill", "Skills"),
    (EntityKind::Workers, "slots", "AvailableSlots"),
    (EntityKind::Workers, "group", "WorkerGroup"),
    (EntityKind::Workers, "max load", "MaxLoadPerPhase"),
    (EntityKind::Workers, "qualification", "QualificationLevel"),
    (EntityKind::Tasks, "name", "TaskName"),
    (EntityKind::Tasks, "skill", "RequiredSkills"),
    (EntityKind::Tasks, "skills", "RequiredSkills"),
    (EntityKind::Tasks, "phase", "PreferredPhases"),
    (EntityKind::Tasks, "phases", "PreferredPhases"),
];

const LIST_COLUMNS: &[&str] = &[
    "Skills",
    "RequiredSkills",
    "RequestedTaskIDs",
    "PreferredPhases",
    "AvailableSlots",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordTranslator;

impl KeywordTranslator {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of [`IntentTranslator::translate`].
    pub fn translate_text(
        &self,
        request: &TranslationRequest,
        snapshot: &EntitySnapshot,
    ) -> Result<Translation, TranslatorError> {
        let text = Utterance::new(&request.text);
        if text.tokens.is_empty() {
            return Err(TranslatorError::Unrecognized("empty request".to_string()));
        }
        match request.surface {
            Surface::Search => search(&text),
            Surface::Modification => modification(&text, snapshot),
            Surface::Rule => rule(&text, snapshot),
            Surface::Insight => Ok(insight(&text, snapshot)),
        }
    }
}

#[async_trait]
impl IntentTranslator for KeywordTranslator {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn translate(
        &self,
        request: &TranslationRequest,
        context: &TranslationContext,
    ) -> Result<Translation, TranslatorError> {
        self.translate_text(request, &context.snapshot)
    }
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

/// The request text with an ASCII-lowercased copy. Byte offsets are shared between the two.
struct Utterance<'a> {
    raw: &'a str,
    lower: String,
    tokens: Vec<Token<'a>>,
}

impl<'a> Utterance<'a> {
    fn new(raw: &'a str) -> Self {
        let mut tokens = Vec::new();
        let mut start = None;
        for (idx, ch) in raw.char_indices() {
            if ch.is_alphanumeric() || ch == '_' {
                start.get_or_insert(idx);
            } else if let Some(s) = start.take() {
                tokens.push(Token {
                    text: &raw[s..idx],
                    start: s,
                    end: idx,
                });
            }
        }
        if let Some(s) = start {
            tokens.push(Token {
                text: &raw[s..],
                start: s,
                end: raw.len(),
            });
        }
        Self {
            raw,
            lower: raw.to_ascii_lowercase(),
            tokens,
        }
    }

    fn find(&self, phrase: &str) -> Option<usize> {
        find_phrase(&self.lower, phrase, 0)
    }

    fn has_any(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|phrase| self.find(phrase).is_some())
    }

    /// Earliest of `phrases`, as (start, end).
    fn first_of(&self, phrases: &[&str], from: usize) -> Option<(usize, usize)> {
        phrases
            .iter()
            .filter_map(|phrase| find_phrase(&self.lower, phrase, from).map(|at| (at, at + phrase.len())))
            .min_by_key(|&(at, end)| (at, std::cmp::Reverse(end)))
    }

    fn numbers(&self) -> Vec<(u32, Token<'a>)> {
        self.tokens
            .iter()
            .filter_map(|token| token.text.parse::<u32>().ok().map(|n| (n, *token)))
            .collect()
    }

    /// Task ids in mention order, deduplicated. Known ids win; otherwise `T<digits>` counts.
    fn task_mentions(&self, snapshot: &EntitySnapshot) -> Vec<String> {
        let known = snapshot.ids(EntityKind::Tasks);
        let mut found: Vec<String> = Vec::new();
        for token in &self.tokens {
            let id = known
                .iter()
                .find(|id| id.eq_ignore_ascii_case(token.text))
                .cloned()
                .or_else(|| match id_pattern(token.text) {
                    Some((EntityKind::Tasks, id)) => Some(id),
                    _ => None,
                });
            if let Some(id) = id {
                if !found.contains(&id) {
                    found.push(id);
                }
            }
        }
        found
    }

    /// Which of `candidates` appear in the text, in order of first appearance.
    fn mentions(&self, candidates: &[String]) -> Vec<String> {
        let mut hits: Vec<(usize, String)> = candidates
            .iter()
            .filter_map(|candidate| {
                find_phrase(&self.lower, &candidate.to_ascii_lowercase(), 0).map(|at| (at, candidate.clone()))
            })
            .collect();
        hits.sort_by_key(|(at, _)| *at);
        hits.into_iter().map(|(_, name)| name).collect()
    }

    /// The token following the word "group", for groups not present in the data.
    fn named_group(&self) -> Option<String> {
        let at = self.find("group")?;
        let end = at + "group".len();
        self.tokens
            .iter()
            .find(|token| token.start >= end)
            .map(|token| token.text.to_string())
    }

    /// First entity id within `from..limit`, with the collection it belongs to.
    fn id_mention(&self, snapshot: &EntitySnapshot, from: usize, limit: usize) -> Option<(EntityKind, String)> {
        self.tokens
            .iter()
            .filter(|token| token.start >= from && token.end <= limit)
            .find_map(|token| {
                EntityKind::ALL
                    .into_iter()
                    .find_map(|kind| {
                        snapshot
                            .ids(kind)
                            .into_iter()
                            .find(|id| id.eq_ignore_ascii_case(token.text))
                            .map(|id| (kind, id))
                    })
                    .or_else(|| id_pattern(token.text))
            })
    }
}

fn find_phrase(haystack: &str, phrase: &str, from: usize) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let tail = haystack.get(from..)?;
    let starts_word = phrase.as_bytes().first().is_some_and(u8::is_ascii_alphanumeric);
    let ends_word = phrase.as_bytes().last().is_some_and(u8::is_ascii_alphanumeric);
    tail.match_indices(phrase).map(|(i, _)| from + i).find(|&at| {
        let end = at + phrase.len();
        let before_ok = !starts_word || at == 0 || !bytes[at - 1].is_ascii_alphanumeric();
        let after_ok = !ends_word || end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        before_ok && after_ok
    })
}

/// `C12`, `W3`, `T7` style identifiers.
fn id_pattern(token: &str) -> Option<(EntityKind, String)> {
    let mut chars = token.chars();
    let kind = match chars.next()?.to_ascii_uppercase() {
        'C' => EntityKind::Clients,
        'W' => EntityKind::Workers,
        'T' => EntityKind::Tasks,
        _ => return None,
    };
    let digits = chars.as_str();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((kind, token.to_ascii_uppercase()))
}

fn clean_value(raw: &str) -> &str {
    raw.trim()
        .trim_end_matches(['?', '.', '!', ','])
        .trim()
        .trim_matches(['"', '\''])
        .trim()
}

fn rule(text: &Utterance, snapshot: &EntitySnapshot) -> Result<Translation, TranslatorError> {
    let tasks = text.task_mentions(snapshot);

    if text.has_any(&["co-run", "corun", "run together", "together", "same time"]) {
        if tasks.len() < 2 {
            return Err(TranslatorError::Unrecognized(
                "a co-run rule needs at least two tasks".to_string(),
            ));
        }
        return Ok(Translation::new(Intent::Rule(RuleDraft::co_run(tasks)), 0.9));
    }

    if tasks.len() >= 2 && text.has_any(&["before", "after", "precede", "precedes", "followed by"]) {
        let reversed = text.find("after").is_some() && !text.has_any(&["before", "precede", "precedes"]);
        let (before, after) = if reversed {
            (tasks[1].clone(), tasks[0].clone())
        } else {
            (tasks[0].clone(), tasks[1].clone())
        };
        let confidence = if tasks.len() == 2 { 0.9 } else { 0.6 };
        return Ok(Translation::new(
            Intent::Rule(RuleDraft::precedence(before, after)),
            confidence,
        ));
    }

    if let (Some(task), true) = (tasks.first(), text.has_any(&["phase", "phases"])) {
        let allowed = phases(text);
        if allowed.is_empty() {
            return Err(TranslatorError::Unrecognized(format!(
                "no phase numbers given for task {task}"
            )));
        }
        return Ok(Translation::new(
            Intent::Rule(RuleDraft::phase_window(task.clone(), allowed)),
            0.85,
        ));
    }

    if text.has_any(&["common slot", "common slots", "slot restriction", "shared slots"]) {
        let worker_groups = text.mentions(&snapshot.worker_groups());
        let client_groups = text.mentions(&snapshot.client_groups());
        let prefers_clients = text.has_any(&["client", "clients"]);
        let group = match (client_groups.first(), worker_groups.first()) {
            (Some(name), _) if prefers_clients || worker_groups.is_empty() => Some(SlotGroup::ClientGroup(name.clone())),
            (_, Some(name)) => Some(SlotGroup::WorkerGroup(name.clone())),
            _ => text.named_group().map(|name| {
                if prefers_clients {
                    SlotGroup::ClientGroup(name)
                } else {
                    SlotGroup::WorkerGroup(name)
                }
            }),
        };
        let group = group.ok_or_else(|| TranslatorError::Unrecognized("no group named".to_string()))?;
        let min_common_slots = first_number(text)?;
        return Ok(Translation::new(
            Intent::Rule(RuleDraft::slot_restriction(group, min_common_slots)),
            0.85,
        ));
    }

    if text.has_any(&["load limit", "maximum", "max", "at most", "limit"]) {
        let groups = text.mentions(&snapshot.worker_groups());
        let (worker_group, confidence) = match groups.as_slice() {
            [only] => (only.clone(), 0.9),
            [first, ..] => (first.clone(), 0.6),
            [] => match text.named_group() {
                Some(name) => (name, 0.85),
                None => return Err(TranslatorError::Unrecognized("no worker group named".to_string())),
            },
        };
        let max_slots_per_phase = first_number(text)?;
        return Ok(Translation::new(
            Intent::Rule(RuleDraft::load_limit(worker_group, max_slots_per_phase)),
            confidence,
        ));
    }

    Err(TranslatorError::Unrecognized(
        "no rule pattern matched".to_string(),
    ))
}

fn first_number(text: &Utterance) -> Result<u32, TranslatorError> {
    text.numbers()
        .first()
        .map(|(n, _)| *n)
        .ok_or_else(|| TranslatorError::Unrecognized("no number given".to_string()))
}

/// Phase numbers, with `1-3` and `1 to 3` expanded. Sorted and deduplicated.
fn phases(text: &Utterance) -> Vec<u32> {
    let numbers = text.numbers();
    let mut phases = BTreeSet::new();
    let mut i = 0;
    while i < numbers.len() {
        let (n, token) = numbers[i];
        if let Some(&(m, next)) = numbers.get(i + 1) {
            let gap = text.lower[token.end..next.start].trim();
            if matches!(gap, "-" | "to" | "through") && m >= n && m - n <= MAX_PHASE_SPAN {
                phases.extend(n..=m);
                i += 2;
                continue;
            }
        }
        phases.insert(n);
        i += 1;
    }
    phases.into_iter().collect()
}

struct ColumnMatch {
    entity: EntityKind,
    column: &'static str,
    start: usize,
    end: usize,
}

/// "PriorityLevel" -> "priority level".
fn spaced(column: &str) -> String {
    let mut out = String::with_capacity(column.len() + 4);
    let mut prev_lower = false;
    for ch in column.chars() {
        if ch.is_ascii_uppercase() && prev_lower {
            out.push(' ');
        }
        prev_lower = ch.is_ascii_lowercase() || ch.is_ascii_digit();
        out.push(ch.to_ascii_lowercase());
    }
    out
}

fn column_phrases(kind: EntityKind) -> Vec<(String, &'static str)> {
    let mut phrases = Vec::new();
    for &column in kind.columns() {
        phrases.push((spaced(column), column));
        phrases.push((column.to_ascii_lowercase(), column));
    }
    phrases.extend(
        ALIASES
            .iter()
            .filter(|(entity, _, _)| *entity == kind)
            .map(|(_, alias, column)| (alias.to_string(), *column)),
    );
    phrases
}

/// Earliest column mention; the longest phrase wins at the same position.
fn find_column(lower: &str, entity: Option<EntityKind>) -> Option<ColumnMatch> {
    let kinds: Vec<EntityKind> = match entity {
        Some(kind) => vec![kind],
        None => EntityKind::ALL.to_vec(),
    };
    let mut best: Option<ColumnMatch> = None;
    for kind in kinds {
        for (phrase, column) in column_phrases(kind) {
            let Some(at) = find_phrase(lower, &phrase, 0) else {
                continue;
            };
            let end = at + phrase.len();
            let better = match &best {
                None => true,
                Some(current) => at < current.start || (at == current.start && end > current.end),
            };
            if better {
                best = Some(ColumnMatch {
                    entity: kind,
                    column,
                    start: at,
                    end,
                });
            }
        }
    }
    best
}

fn entity_mention(lower: &str) -> Option<EntityKind> {
    [
        ("client", EntityKind::Clients),
        ("clients", EntityKind::Clients),
        ("worker", EntityKind::Workers),
        ("workers", EntityKind::Workers),
        ("task", EntityKind::Tasks),
        ("tasks", EntityKind::Tasks),
    ]
    .into_iter()
    .filter_map(|(word, kind)| find_phrase(lower, word, 0).map(|at| (at, kind)))
    .min_by_key(|(at, _)| *at)
    .map(|(_, kind)| kind)
}

fn earliest_operator(lower: &str, from: usize) -> Option<(usize, &'static str, FilterOperator)> {
    OPERATORS
        .iter()
        .filter_map(|&(phrase, op)| find_phrase(lower, phrase, from).map(|at| (at, phrase, op)))
        .min_by_key(|&(at, phrase, _)| (at, std::cmp::Reverse(phrase.len())))
}

fn is_weak(phrase: &str) -> bool {
    matches!(phrase, "is" | "of" | "=")
}

/// Operator following `from`. Returns the operator, whether it was only implied, and where
/// the value starts.
fn operator_after(lower: &str, from: usize) -> (FilterOperator, bool, usize) {
    let Some((at, phrase, op)) = earliest_operator(lower, from) else {
        return (FilterOperator::Equals, true, from);
    };
    let end = at + phrase.len();
    if !is_weak(phrase) {
        return (op, false, end);
    }
    // "is greater than", "is over"
    let skip = lower[end..].len() - lower[end..].trim_start().len();
    match earliest_operator(lower, end) {
        Some((next_at, next_phrase, next_op)) if next_at == end + skip => {
            (next_op, is_weak(next_phrase), next_at + next_phrase.len())
        }
        _ => (op, true, end),
    }
}

/// Parses one `column operator value` clause covering `start..end` of the text.
fn parse_clause(
    text: &Utterance,
    start: usize,
    end: usize,
    entity: Option<EntityKind>,
) -> Option<(EntityKind, FieldFilter)> {
    let lower = &text.lower[start..end];
    let found = find_column(lower, entity).or_else(|| entity.and_then(|_| find_column(lower, None)))?;
    let (op, implied, value_at) = operator_after(lower, found.end);
    let value = clean_value(&text.raw[start + value_at..end]);
    if value.is_empty() {
        return None;
    }
    let op = if implied && LIST_COLUMNS.contains(&found.column) {
        FilterOperator::Contains
    } else {
        op
    };
    Some((
        found.entity,
        FieldFilter::new(found.column, op, CellValue::infer(value)),
    ))
}

/// Byte ranges between the connective words.
fn clauses(text: &Utterance, start: usize, end: usize) -> Vec<(usize, usize)> {
    let mut cuts: Vec<(usize, usize)> = Vec::new();
    for word in ["and", "or"] {
        let mut from = start;
        while let Some(at) = find_phrase(&text.lower, word, from) {
            if at >= end {
                break;
            }
            cuts.push((at, at + word.len()));
            from = at + word.len();
        }
    }
    cuts.sort_unstable();
    let mut ranges = Vec::with_capacity(cuts.len() + 1);
    let mut cursor = start;
    for (at, after) in cuts {
        ranges.push((cursor, at));
        cursor = after;
    }
    ranges.push((cursor, end));
    ranges
}

fn search(text: &Utterance) -> Result<Translation, TranslatorError> {
    let entity = entity_mention(&text.lower);
    let ranges = clauses(text, 0, text.lower.len());
    let total = ranges.len();
    let parsed: Vec<(EntityKind, FieldFilter)> = ranges
        .into_iter()
        .filter_map(|(start, end)| parse_clause(text, start, end, entity))
        .collect();
    if parsed.is_empty() {
        return Err(TranslatorError::Unrecognized(
            "no column condition found".to_string(),
        ));
    }

    let entity = entity.or_else(|| {
        let first = parsed[0].0;
        parsed.iter().all(|(kind, _)| *kind == first).then_some(first)
    });
    let logic = if text.find("or").is_some() {
        FilterLogic::Or
    } else {
        FilterLogic::And
    };
    let confidence = 0.5 + 0.45 * parsed.len() as f64 / total as f64;
    let spec = FilterSpec {
        entity,
        filters: parsed.into_iter().map(|(_, filter)| filter).collect(),
        logic,
    };
    Ok(Translation::new(Intent::Filter(spec), confidence))
}

fn modification(text: &Utterance, snapshot: &EntitySnapshot) -> Result<Translation, TranslatorError> {
    if text.has_any(&["delete", "remove"]) {
        let (entity, id) = text
            .id_mention(snapshot, 0, text.raw.len())
            .ok_or_else(|| TranslatorError::Unrecognized("no record id to delete".to_string()))?;
        let intent = ModificationIntent {
            action: ModificationAction::Delete,
            entity,
            filters: vec![FieldFilter::equals(entity.id_column(), id)],
            changes: Row::new(),
        };
        return Ok(Translation::new(Intent::Modification(intent), 0.9));
    }

    let (_, verb_end) = text
        .first_of(&["set", "change", "update", "make"], 0)
        .ok_or_else(|| TranslatorError::Unrecognized("expected 'set <column> to <value>'".to_string()))?;
    let (to_at, to_end) = text
        .first_of(&["to"], verb_end)
        .ok_or_else(|| TranslatorError::Unrecognized("expected 'to <value>'".to_string()))?;

    let scope = text.first_of(&["where", "for"], to_end);
    let target = text.id_mention(snapshot, 0, to_at).or_else(|| {
        scope.and_then(|(_, scope_end)| text.id_mention(snapshot, scope_end, text.raw.len()))
    });
    let hint = target
        .as_ref()
        .map(|(kind, _)| *kind)
        .or_else(|| entity_mention(&text.lower));
    let head = &text.lower[verb_end..to_at];
    let column = find_column(head, hint)
        .or_else(|| find_column(head, None))
        .ok_or_else(|| TranslatorError::Unrecognized("no column named".to_string()))?;

    let value_end = scope.map(|(at, _)| at).unwrap_or(text.raw.len());
    let value = clean_value(&text.raw[to_end..value_end]);
    if value.is_empty() {
        return Err(TranslatorError::Unrecognized("no value given".to_string()));
    }
    let mut changes = Row::new();
    changes.insert(column.column.to_string(), CellValue::infer(value));

    let (entity, filters, confidence) = match target {
        Some((kind, id)) if kind == column.entity => {
            (kind, vec![FieldFilter::equals(kind.id_column(), id)], 0.95)
        }
        _ => {
            let filters: Vec<FieldFilter> = scope
                .map(|(_, scope_end)| {
                    clauses(text, scope_end, text.raw.len())
                        .into_iter()
                        .filter_map(|(start, end)| parse_clause(text, start, end, Some(column.entity)))
                        .filter(|(kind, _)| *kind == column.entity)
                        .map(|(_, filter)| filter)
                        .collect()
                })
                .unwrap_or_default();
            let confidence = if filters.is_empty() { 0.5 } else { 0.85 };
            (column.entity, filters, confidence)
        }
    };

    let intent = ModificationIntent {
        action: ModificationAction::Update,
        entity,
        filters,
        changes,
    };
    Ok(Translation::new(Intent::Modification(intent), confidence))
}

fn insight(text: &Utterance, snapshot: &EntitySnapshot) -> Translation {
    if text.has_any(&["skill", "skills"]) {
        return skill_demand(snapshot);
    }
    if text.has_any(&["priority", "urgent", "important"]) {
        return high_priority_clients(snapshot);
    }
    overview(snapshot)
}

fn skill_demand(snapshot: &EntitySnapshot) -> Translation {
    let mut demand: BTreeMap<String, usize> = BTreeMap::new();
    for task in snapshot.tasks() {
        for skill in task.required_skill_list() {
            *demand.entry(skill).or_default() += 1;
        }
    }
    let mut supply: BTreeMap<String, usize> = BTreeMap::new();
    for worker in snapshot.workers() {
        for skill in worker.skill_list() {
            *supply.entry(skill).or_default() += 1;
        }
    }

    let top = demand
        .iter()
        .fold(None, |best: Option<(&String, usize)>, (skill, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((skill, count)),
        });
    let answer = match top {
        Some((skill, count)) => format!("Most requested skill: {skill} ({count} tasks)"),
        None => "No task lists any required skills".to_string(),
    };
    let data_points = demand
        .iter()
        .map(|(skill, count)| {
            let offered = supply.get(skill).copied().unwrap_or(0);
            format!("{skill}: required by {count} tasks, offered by {offered} workers")
        })
        .collect();
    let suggestions = demand
        .keys()
        .filter(|skill| !supply.contains_key(*skill))
        .map(|skill| format!("Add a worker with {skill} skill"))
        .collect();

    Translation::new(
        Intent::Insight(InsightResponse {
            answer,
            data_points,
            suggestions,
        }),
        0.8,
    )
}

fn high_priority_clients(snapshot: &EntitySnapshot) -> Translation {
    let urgent: Vec<String> = snapshot
        .clients()
        .iter()
        .filter(|client| client.priority().is_some_and(|p| p >= 4))
        .map(|client| {
            format!(
                "{} ({}): priority {}",
                client.id().unwrap_or_default(),
                client.text("ClientName").unwrap_or_default(),
                client.priority().unwrap_or_default()
            )
        })
        .collect();
    let answer = format!(
        "{} of {} clients have priority 4 or 5",
        urgent.len(),
        snapshot.clients().len()
    );
    let suggestions = if urgent.is_empty() {
        Vec::new()
    } else {
        vec!["Consider the urgent preset to favor these clients".to_string()]
    };
    Translation::new(
        Intent::Insight(InsightResponse {
            answer,
            data_points: urgent,
            suggestions,
        }),
        0.8,
    )
}

fn overview(snapshot: &EntitySnapshot) -> Translation {
    let counts = snapshot.counts();
    let mut data_points = Vec::new();
    let worker_groups = snapshot.worker_groups();
    if !worker_groups.is_empty() {
        data_points.push(format!("Worker groups: {}", worker_groups.join(", ")));
    }
    let client_groups = snapshot.client_groups();
    if !client_groups.is_empty() {
        data_points.push(format!("Client groups: {}", client_groups.join(", ")));
    }
    let suggestions = if counts.total() == 0 {
        vec!["Load clients, workers and tasks to get started".to_string()]
    } else {
        Vec::new()
    };
    Translation::new(
        Intent::Insight(InsightResponse {
            answer: format!(
                "{} clients, {} workers, {} tasks loaded",
                counts.clients, counts.workers, counts.tasks
            ),
            data_points,
            suggestions,
        }),
        0.6,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrases_respect_word_boundaries() {
        assert_eq!(find_phrase("run before lunch", "before", 0), Some(4));
        assert_eq!(find_phrase("beforehand", "before", 0), None);
        assert_eq!(find_phrase("duration>2", ">", 0), Some(8));
    }

    #[test]
    fn phase_ranges_expand() {
        let text = Utterance::new("T3 only in phases 1-3 or 5");
        assert_eq!(phases(&text), vec![1, 2, 3, 5]);
    }

    #[test]
    fn camel_case_columns_are_spaced() {
        assert_eq!(spaced("PriorityLevel"), "priority level");
        assert_eq!(spaced("RequestedTaskIDs"), "requested task ids");
        assert_eq!(spaced("AttributesJSON"), "attributes json");
    }

    #[test]
    fn id_pattern_recognizes_prefixed_numbers() {
        assert_eq!(id_pattern("t12"), Some((EntityKind::Tasks, "T12".to_string())));
        assert_eq!(id_pattern("Team"), None);
    }
}
