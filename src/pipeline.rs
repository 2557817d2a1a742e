use std::collections::HashMap;

use rusqlite::Connection;

use crate::ai;
use crate::db;
use crate::error::{FintrackError, Result};
use crate::models::{CategoryProposal, RawRow, Transaction};
use crate::normalizer;
use crate::resolver;
use crate::rules::{self, CompiledRule};
use crate::settings::Settings;

pub const STAGE_DEDUPING: &str = "Deduping";
pub const STAGE_AI_CLASSIFYING: &str = "AiClassifying";
pub const STAGE_PERSISTING: &str = "Persisting";

/// Counters for one pipeline run. Per-record errors land here instead of
/// aborting the run; the caller renders this as the run report.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub total_rows: usize,
    pub admitted: usize,
    pub duplicates: usize,
    pub malformed_dates: usize,
    pub malformed_amounts: usize,
    pub rule_matched: usize,
    pub ai_matched: usize,
    pub unresolved: usize,
    pub ai_dropped: usize,
    pub ai_incomplete_batches: usize,
}

impl RunSummary {
    pub fn skipped_rows(&self) -> usize {
        self.malformed_dates + self.malformed_amounts
    }
}

/// Run the import pipeline over a batch of raw rows:
/// normalize -> dedup -> rule pass -> AI pass on the remainder ->
/// resolve -> persist. Stage boundaries are synchronization points; the
/// AI stage is the only one that goes out over the network and only runs
/// when `use_ai` is set and records remain uncategorized.
pub fn run_import(
    conn: &Connection,
    rows: &[RawRow],
    settings: &Settings,
    use_ai: bool,
) -> Result<RunSummary> {
    let taxonomy = db::category_names(conn)?;
    // Fatal at load time: a malformed rule set means the run never starts.
    let rule_set = rules::load_rules(conn, &taxonomy)?;

    let mut summary = RunSummary {
        total_rows: rows.len(),
        ..Default::default()
    };

    // Normalizing — per-record failures are counted and skipped.
    let mut canonical = Vec::with_capacity(rows.len());
    for row in rows {
        match normalizer::normalize(row) {
            Ok(txn) => canonical.push(txn),
            Err(FintrackError::MalformedDate(_)) => summary.malformed_dates += 1,
            Err(FintrackError::MalformedAmount(_)) => summary.malformed_amounts += 1,
            Err(e) => return Err(e),
        }
    }

    // Deduping — the idempotency boundary. Already-known fingerprints are
    // dropped here and never reach the classifiers.
    let mut fresh = Vec::new();
    for txn in canonical {
        match db::admit(conn, &txn).map_err(|e| e.at_stage(STAGE_DEDUPING))? {
            db::Admission::Admitted => {
                summary.admitted += 1;
                fresh.push(txn);
            }
            db::Admission::DuplicateSkipped => summary.duplicates += 1,
        }
    }

    categorize_records(conn, &fresh, &rule_set, &taxonomy, settings, use_ai, &mut summary)?;
    Ok(summary)
}

/// Re-run categorization over stored records that are still unresolved.
/// This is the explicit re-categorization trigger; imports never touch
/// records that already carry a category.
pub fn recategorize(conn: &Connection, settings: &Settings, use_ai: bool) -> Result<RunSummary> {
    let taxonomy = db::category_names(conn)?;
    let rule_set = rules::load_rules(conn, &taxonomy)?;
    let pending = db::list_unresolved(conn)?;

    let mut summary = RunSummary {
        total_rows: pending.len(),
        ..Default::default()
    };
    categorize_records(conn, &pending, &rule_set, &taxonomy, settings, use_ai, &mut summary)?;
    Ok(summary)
}

fn categorize_records(
    conn: &Connection,
    records: &[Transaction],
    rule_set: &[CompiledRule],
    taxonomy: &[String],
    settings: &Settings,
    use_ai: bool,
    summary: &mut RunSummary,
) -> Result<()> {
    // RuleClassifying — pure, sequential, cheap.
    let mut rule_proposals: HashMap<String, CategoryProposal> = HashMap::new();
    for txn in records {
        if let Some(p) = rules::classify(txn, rule_set) {
            rule_proposals.insert(txn.fingerprint.clone(), p);
        }
    }

    // AiClassifying — only for records the rules engine left uncovered or
    // covered below the confidence threshold. Bounds external-call volume.
    let threshold = settings.ai.confidence_threshold;
    let ai_proposals = if use_ai {
        let remainder: Vec<Transaction> = records
            .iter()
            .filter(|t| {
                rule_proposals
                    .get(&t.fingerprint)
                    .map_or(true, |p| p.confidence < threshold)
            })
            .cloned()
            .collect();
        let outcome = ai::classify_uncategorized(&settings.ai, taxonomy, &remainder)
            .map_err(|e| e.at_stage(STAGE_AI_CLASSIFYING))?;
        summary.ai_dropped = outcome.dropped;
        summary.ai_incomplete_batches = outcome.incomplete_batches;
        outcome.proposals
    } else {
        HashMap::new()
    };

    apply_resolutions(conn, records, &rule_proposals, &ai_proposals, threshold, rule_set, summary)
}

/// Resolving + Persisting. Split out so the precedence policy can be
/// exercised end to end with injected proposals and no network.
pub fn apply_resolutions(
    conn: &Connection,
    records: &[Transaction],
    rule_proposals: &HashMap<String, CategoryProposal>,
    ai_proposals: &HashMap<String, CategoryProposal>,
    threshold: f64,
    rule_set: &[CompiledRule],
    summary: &mut RunSummary,
) -> Result<()> {
    for txn in records {
        let rule_p = rule_proposals.get(&txn.fingerprint);
        let ai_p = ai_proposals.get(&txn.fingerprint);
        match resolver::resolve(rule_p, ai_p, threshold) {
            Some(res) => {
                db::set_category(conn, &txn.fingerprint, &res)
                    .map_err(|e| e.at_stage(STAGE_PERSISTING))?;
                match res.source {
                    crate::models::ProposalSource::Rule => {
                        summary.rule_matched += 1;
                        if let Some(id) = rules::matching_rule_id(txn, rule_set) {
                            rules::bump_hit_count(conn, id)
                                .map_err(|e| e.at_stage(STAGE_PERSISTING))?;
                        }
                    }
                    _ => summary.ai_matched += 1,
                }
            }
            // Valid terminal state: retained for a future run.
            None => summary.unresolved += 1,
        }
    }
    Ok(())
}
