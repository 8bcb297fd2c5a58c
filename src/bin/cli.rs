use data_alchemist::entity::Record;
use data_alchemist::store::{EntitySnapshot, ModificationIntent};
use data_alchemist::translator::ProposalKind;
use data_alchemist::{
    read_rows_csv, save_bundle_to_json, AlchemistConfig, CellValue, Edit, EntityKind, PendingSuggestion,
    PriorityCategory, RuleDraft, RuleId, Row, Session, SlotGroup, Surface, TranslationOutcome,
};
use std::io::{self, Write};
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn render_text_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    for row in rows {
        for (ci, cell) in row.iter().enumerate() {
            if cell.len() > widths[ci] {
                widths[ci] = cell.len();
            }
        }
    }

    let mut sep = String::new();
    sep.push('+');
    for w in &widths {
        sep.push_str(&"-".repeat(*w + 2));
        sep.push('+');
    }

    let mut out = String::new();
    out.push_str(&sep);
    out.push('\n');

    let push_row = |out: &mut String, cells: &[String]| {
        out.push('|');
        for (ci, cell) in cells.iter().enumerate() {
            out.push(' ');
            out.push_str(cell);
            let pad = widths[ci].saturating_sub(cell.len());
            if pad > 0 {
                out.push_str(&" ".repeat(pad));
            }
            out.push(' ');
            out.push('|');
        }
        out.push('\n');
    };

    push_row(&mut out, columns);
    out.push_str(&sep);
    out.push('\n');
    for row in rows {
        push_row(&mut out, row);
    }
    out.push_str(&sep);
    out.push('\n');
    out
}

/// Table of the selected records, numbered 1-based.
fn render_records<R: Record>(records: &[R], only: Option<&[usize]>) -> String {
    let selected: Vec<usize> = match only {
        Some(indices) => indices.to_vec(),
        None => (0..records.len()).collect(),
    };
    let mut columns: Vec<String> = vec!["#".to_string()];
    for idx in &selected {
        for column in records[*idx].columns() {
            if !columns.iter().any(|c| c == column) {
                columns.push(column.to_string());
            }
        }
    }
    let rows: Vec<Vec<String>> = selected
        .iter()
        .map(|&idx| {
            let record = &records[idx];
            let mut cells = vec![(idx + 1).to_string()];
            cells.extend(columns[1..].iter().map(|column| record.text(column).unwrap_or_default()));
            cells
        })
        .collect();
    render_text_table(&columns, &rows)
}

fn render_entity(snapshot: &EntitySnapshot, entity: EntityKind, only: Option<&[usize]>) -> String {
    match entity {
        EntityKind::Clients => render_records(snapshot.clients(), only),
        EntityKind::Workers => render_records(snapshot.workers(), only),
        EntityKind::Tasks => render_records(snapshot.tasks(), only),
    }
}

fn print_help() {
    println!(
        "Commands:\n  help                                   Show this help\n  load <entity> <file.csv>               Replace clients|workers|tasks from a CSV file\n  show <entity>                          Show a collection\n  set <entity> <row> <column> <value...> Edit one cell (rows are 1-based)\n  add <entity> <Column=Value>...         Append a row\n  del <entity> <row>                     Remove a row\n  validate                               Run validation\n  issues [entity]                        List findings of the last run\n  ready                                  Show the export gate\n  rules                                  List rules\n  rule corun <T1,T2,...>                 Tasks that run together\n  rule loadlimit <group> <n>             Max slots per phase for a worker group\n  rule phase <task> <phases>             Allowed phases (e.g. 1-3 or 1,4)\n  rule precedence <before> <after>       Task ordering\n  rule slots <client|worker> <group> <n> Minimum common slots for a group\n  rule ask <text...>                     Suggest a rule from plain text\n  rule rm <id>                           Remove a rule\n  weights                                Show priority weights\n  weight <category> <0-100>              Set one weight\n  preset <efficiency|fairness|urgent>    Apply a preset\n  reset                                  Restore default weights\n  search <text...>                       Natural-language search\n  find <text...>                         Keyword search across all cells\n  modify <text...>                       Suggest an edit from plain text\n  insight <text...>                      Ask about the data\n  pending                                List pending suggestions\n  accept <id> | reject <id>              Resolve a suggestion\n  export <dir>                           Write validated CSVs and rules-config.json\n  bundle <file.json>                     Write only the rule bundle\n  quit|exit                              Exit"
    );
}

fn parse_entity(s: Option<&str>) -> Option<EntityKind> {
    s.and_then(|s| s.parse().ok())
}

fn parse_row(s: Option<&str>) -> Option<usize> {
    s.and_then(|s| s.parse::<usize>().ok())
        .filter(|n| *n >= 1)
        .map(|n| n - 1)
}

fn parse_phases(s: &str) -> Option<Vec<u32>> {
    let mut phases = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u32 = lo.trim().parse().ok()?;
                let hi: u32 = hi.trim().parse().ok()?;
                phases.extend(lo..=hi);
            }
            None => phases.push(part.parse().ok()?),
        }
    }
    Some(phases)
}

fn describe_intent(intent: &ModificationIntent) -> String {
    let target = if intent.filters.is_empty() {
        "all rows".to_string()
    } else {
        intent
            .filters
            .iter()
            .map(|f| format!("{} {:?} {}", f.field, f.operator, f.value).to_lowercase())
            .collect::<Vec<_>>()
            .join(" and ")
    };
    let changes = intent
        .changes
        .iter()
        .map(|(column, value)| format!("{column} = {value}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{:?} {} where {}: {}", intent.action, intent.entity, target, changes)
}

fn print_suggestion(suggestion: &PendingSuggestion) {
    let what = match &suggestion.proposal.kind {
        ProposalKind::Modification(intent) => describe_intent(intent),
        ProposalKind::Rule(draft) => format!("add rule: {}", draft.kind.summary()),
    };
    println!(
        "Suggestion #{} ({:.2}): {}\nType 'accept {}' or 'reject {}'.",
        suggestion.id, suggestion.proposal.confidence, what, suggestion.id, suggestion.id
    );
}

fn print_outcome(session: &Session, outcome: TranslationOutcome) {
    match outcome {
        TranslationOutcome::Matches {
            hits, confidence, ..
        } => {
            println!("Matched {} rows (confidence {:.2})", hits.total(), confidence);
            let snapshot = session.snapshot();
            for entity in EntityKind::ALL {
                let indices = hits.for_entity(entity);
                if !indices.is_empty() {
                    println!("{entity}:\n{}", render_entity(&snapshot, entity, Some(indices)));
                }
            }
        }
        TranslationOutcome::Insight { response, .. } => {
            println!("{}", response.answer);
            for point in &response.data_points {
                println!("  - {point}");
            }
            for suggestion in &response.suggestions {
                println!("  * {suggestion}");
            }
        }
        TranslationOutcome::Suggestion(suggestion) => print_suggestion(&suggestion),
        TranslationOutcome::Discarded { confidence } => {
            println!("Not confident enough ({confidence:.2}); nothing suggested.")
        }
        TranslationOutcome::Superseded => println!("Request superseded."),
        TranslationOutcome::Unavailable { reason } => println!("{reason}"),
    }
}

fn print_issues(session: &Session, entity: Option<EntityKind>) {
    match session.latest_report() {
        Some(report) => {
            println!("{}", report.summary());
            for issue in report
                .errors
                .iter()
                .filter(|issue| entity.is_none_or(|e| e == issue.entity))
            {
                println!("  {issue}");
                if let Some(suggestion) = &issue.suggestion {
                    println!("      fix: {suggestion}");
                }
            }
        }
        None => println!("Not validated yet. Run 'validate'."),
    }
}

fn load_config() -> Result<AlchemistConfig, String> {
    let args: Vec<String> = std::env::args().collect();
    let base = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).ok_or("--config needs a path")?;
            AlchemistConfig::from_json_file(path).map_err(|e| e.to_string())?
        }
        None => AlchemistConfig::default(),
    };
    base.with_env().map_err(|e| e.to_string())
}

fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "data_alchemist=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Cannot start runtime: {e}");
            std::process::exit(1);
        }
    };
    let session = Session::new(config);

    println!("Data Alchemist (CLI) - type 'help' for commands\n");

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or("");

        match cmd {
            "help" => print_help(),
            "quit" | "exit" => break,
            "load" => {
                let entity = parse_entity(parts.next());
                let path = parts.next();
                match (entity, path) {
                    (Some(entity), Some(path)) => match read_rows_csv(path) {
                        Ok(rows) => match session.load_rows(entity, rows) {
                            Ok(n) => println!("Loaded {n} {entity}."),
                            Err(e) => println!("Error: {e}"),
                        },
                        Err(e) => println!("Error: {e}"),
                    },
                    _ => println!("Usage: load <clients|workers|tasks> <file.csv>"),
                }
            }
            "show" => match parse_entity(parts.next()) {
                Some(entity) => println!("{}", render_entity(&session.snapshot(), entity, None)),
                None => {
                    let counts = session.counts();
                    println!(
                        "{} clients, {} workers, {} tasks (revision {})",
                        counts.clients,
                        counts.workers,
                        counts.tasks,
                        session.revision()
                    );
                }
            },
            "set" => {
                let entity = parse_entity(parts.next());
                let row = parse_row(parts.next());
                let column = parts.next();
                let value: Vec<&str> = parts.collect();
                match (entity, row, column, !value.is_empty()) {
                    (Some(entity), Some(row), Some(column), true) => {
                        let edit = Edit::SetCell {
                            entity,
                            row,
                            column: column.to_string(),
                            value: Some(CellValue::infer(&value.join(" "))),
                        };
                        match session.apply_edit(edit) {
                            Ok(_) => println!("{column} set.\n{}", render_entity(&session.snapshot(), entity, None)),
                            Err(e) => println!("Error: {e}"),
                        }
                    }
                    _ => println!("Usage: set <entity> <row> <column> <value...>"),
                }
            }
            "add" => match parse_entity(parts.next()) {
                Some(entity) => {
                    let row: Row = parts
                        .filter_map(|pair| pair.split_once('='))
                        .map(|(column, value)| (column.to_string(), CellValue::infer(value)))
                        .collect();
                    if row.is_empty() {
                        println!("Usage: add <entity> <Column=Value>...");
                        continue;
                    }
                    match session.apply_edit(Edit::Append { entity, row }) {
                        Ok(_) => println!("Row added.\n{}", render_entity(&session.snapshot(), entity, None)),
                        Err(e) => println!("Error: {e}"),
                    }
                }
                None => println!("Usage: add <entity> <Column=Value>..."),
            },
            "del" => match (parse_entity(parts.next()), parse_row(parts.next())) {
                (Some(entity), Some(row)) => match session.apply_edit(Edit::RemoveRow { entity, row }) {
                    Ok(_) => println!("Row {} removed.", row + 1),
                    Err(e) => println!("Error: {e}"),
                },
                _ => println!("Usage: del <entity> <row>"),
            },
            "validate" => match runtime.block_on(session.revalidate()) {
                Some(report) => println!("{}", report.summary()),
                None => println!("Validation result superseded."),
            },
            "issues" => print_issues(&session, parse_entity(parts.next())),
            "ready" => {
                let readiness = session.readiness();
                if readiness.ok {
                    println!("Ready to export.");
                } else {
                    println!("Not ready:");
                    for reason in &readiness.reasons {
                        println!("  - {reason}");
                    }
                }
            }
            "rules" => {
                let rules = session.rules();
                if rules.is_empty() {
                    println!("No rules.");
                }
                for rule in rules {
                    println!("  {} [{}] {}", rule.id, rule.kind.type_name(), rule.description);
                }
            }
            "rule" => {
                let sub = parts.next().unwrap_or("");
                let draft = match sub {
                    "corun" => parts
                        .next()
                        .map(|tasks| RuleDraft::co_run(tasks.split(',').map(str::trim))),
                    "loadlimit" => match (parts.next(), parts.next().and_then(|n| n.parse().ok())) {
                        (Some(group), Some(n)) => Some(RuleDraft::load_limit(group, n)),
                        _ => None,
                    },
                    "phase" => match (parts.next(), parts.next().and_then(parse_phases)) {
                        (Some(task), Some(phases)) => Some(RuleDraft::phase_window(task, phases)),
                        _ => None,
                    },
                    "precedence" => match (parts.next(), parts.next()) {
                        (Some(before), Some(after)) => Some(RuleDraft::precedence(before, after)),
                        _ => None,
                    },
                    "slots" => {
                        let side = parts.next();
                        let group = parts.next();
                        let n = parts.next().and_then(|n| n.parse().ok());
                        match (side, group, n) {
                            (Some("client"), Some(group), Some(n)) => {
                                Some(RuleDraft::slot_restriction(SlotGroup::ClientGroup(group.to_string()), n))
                            }
                            (Some("worker"), Some(group), Some(n)) => {
                                Some(RuleDraft::slot_restriction(SlotGroup::WorkerGroup(group.to_string()), n))
                            }
                            _ => None,
                        }
                    }
                    "ask" => {
                        let text: Vec<&str> = parts.collect();
                        let outcome = runtime.block_on(session.translate(Surface::Rule, &text.join(" ")));
                        print_outcome(&session, outcome);
                        continue;
                    }
                    "rm" => {
                        match parts.next().and_then(|id| id.parse::<RuleId>().ok()) {
                            Some(id) if session.remove_rule(id) => println!("Removed rule {id}."),
                            Some(id) => println!("No active rule {id}."),
                            None => println!("Usage: rule rm <id>"),
                        }
                        continue;
                    }
                    _ => None,
                };
                match draft {
                    Some(draft) => match session.add_rule(draft) {
                        Ok(rule) => println!("Added rule {}: {}", rule.id, rule.description),
                        Err(e) => println!("Rule rejected: {e}"),
                    },
                    None => println!("Usage: rule <corun|loadlimit|phase|precedence|slots|ask|rm> ... (see 'help')"),
                }
            }
            "weights" => {
                let weights = session.weights();
                for (category, weight) in weights.iter() {
                    println!("  {:<20} {:>3}  {}", category.label(), weight, category.description());
                }
                let summary = session.weight_summary();
                println!(
                    "  total {} | average {:.1} | highest {} | lowest {}",
                    summary.total,
                    summary.average,
                    summary.highest.label(),
                    summary.lowest.label()
                );
            }
            "weight" => {
                let category = parts.next().and_then(|c| c.parse::<PriorityCategory>().ok());
                let value = parts.next().and_then(|v| v.parse::<i64>().ok());
                match (category, value) {
                    (Some(category), Some(value)) => {
                        let stored = session.set_weight(category, value);
                        println!("{} set to {stored}.", category.label());
                    }
                    _ => println!("Usage: weight <category> <0-100>"),
                }
            }
            "preset" => match parts.next() {
                Some(name) => match session.apply_preset(name) {
                    Ok(()) => println!("Preset '{name}' applied."),
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("Usage: preset <efficiency|fairness|urgent>"),
            },
            "reset" => {
                session.reset_weights();
                println!("Weights reset to defaults.");
            }
            "search" | "modify" | "insight" => {
                let text: Vec<&str> = parts.collect();
                if text.is_empty() {
                    println!("Usage: {cmd} <text...>");
                    continue;
                }
                let surface = match cmd {
                    "search" => Surface::Search,
                    "modify" => Surface::Modification,
                    _ => Surface::Insight,
                };
                let outcome = runtime.block_on(session.translate(surface, &text.join(" ")));
                print_outcome(&session, outcome);
            }
            "find" => {
                let query: Vec<&str> = parts.collect();
                let hits = session.keyword_search(&query.join(" "));
                println!("Found {} rows.", hits.total());
                let snapshot = session.snapshot();
                for entity in EntityKind::ALL {
                    let indices = hits.for_entity(entity);
                    if !indices.is_empty() {
                        println!("{entity}:\n{}", render_entity(&snapshot, entity, Some(indices)));
                    }
                }
            }
            "pending" => {
                let pending = session.pending_suggestions();
                if pending.is_empty() {
                    println!("No pending suggestions.");
                }
                for suggestion in &pending {
                    print_suggestion(suggestion);
                }
            }
            "accept" => match parts.next().and_then(|id| id.parse::<u64>().ok()) {
                Some(id) => match session.accept_suggestion(id) {
                    Ok(accepted) => println!("Accepted #{id}: {accepted:?}"),
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("Usage: accept <id>"),
            },
            "reject" => match parts.next().and_then(|id| id.parse::<u64>().ok()) {
                Some(id) if session.reject_suggestion(id) => println!("Rejected #{id}."),
                Some(id) => println!("No pending suggestion #{id}."),
                None => println!("Usage: reject <id>"),
            },
            "export" => match parts.next() {
                Some(dir) => match session.export_all(dir) {
                    Ok(paths) => {
                        for path in paths {
                            println!("Wrote {}", path.display());
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("Usage: export <dir>"),
            },
            "bundle" => match parts.next() {
                Some(path) => match save_bundle_to_json(&session.rule_bundle(), path) {
                    Ok(()) => println!("Rule bundle written to {path}"),
                    Err(e) => println!("Error: {e}"),
                },
                None => println!("Usage: bundle <file.json>"),
            },
            _ => println!("Unknown command. Type 'help'."),
        }
    }
}
