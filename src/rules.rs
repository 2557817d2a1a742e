use regex::Regex;
use rusqlite::Connection;

use crate::error::{FintrackError, Result};
use crate::models::{CategoryProposal, ProposalSource, Rule, Transaction};

/// A rule whose pattern has passed load-time validation. Regex rules keep
/// their compiled form so per-record evaluation never fails.
#[derive(Debug)]
pub struct CompiledRule {
    pub rule: Rule,
    regex: Option<Regex>,
}

/// Load the active rule set in priority order and validate it once.
/// Any malformed rule is `RuleConfigInvalid` and the run does not start.
pub fn load_rules(conn: &Connection, taxonomy: &[String]) -> Result<Vec<CompiledRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, pattern, match_type, category, confidence, priority FROM rules \
         WHERE is_active = 1 ORDER BY priority DESC, id ASC",
    )?;
    let rules: Vec<Rule> = stmt
        .query_map([], |row| {
            Ok(Rule {
                id: row.get(0)?,
                pattern: row.get(1)?,
                match_type: row.get(2)?,
                category: row.get(3)?,
                confidence: row.get(4)?,
                priority: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut compiled = Vec::with_capacity(rules.len());
    for rule in rules {
        if !taxonomy.iter().any(|c| c == &rule.category) {
            return Err(FintrackError::RuleConfigInvalid(format!(
                "rule {} names unknown category '{}'",
                rule.id, rule.category
            )));
        }
        if !(0.0..=1.0).contains(&rule.confidence) {
            return Err(FintrackError::RuleConfigInvalid(format!(
                "rule {} has confidence {} outside [0,1]",
                rule.id, rule.confidence
            )));
        }
        let regex = match rule.match_type.as_str() {
            "regex" => Some(Regex::new(&rule.pattern).map_err(|e| {
                FintrackError::RuleConfigInvalid(format!(
                    "rule {} has invalid regex '{}': {e}",
                    rule.id, rule.pattern
                ))
            })?),
            "contains" | "starts_with" => None,
            other => {
                return Err(FintrackError::RuleConfigInvalid(format!(
                    "rule {} has unknown match type '{other}'",
                    rule.id
                )))
            }
        };
        compiled.push(CompiledRule { rule, regex });
    }
    Ok(compiled)
}

fn matches(rule: &CompiledRule, txn: &Transaction) -> bool {
    let view = txn.matching_view();
    match rule.rule.match_type.as_str() {
        "contains" => view.contains(&rule.rule.pattern.to_uppercase()),
        "starts_with" => view.starts_with(&rule.rule.pattern.to_uppercase()),
        // Regex rules run against the collapsed original-case text.
        "regex" => rule
            .regex
            .as_ref()
            .map(|re| re.is_match(&txn.description))
            .unwrap_or(false),
        _ => false,
    }
}

/// First matching rule wins; later matches are not consulted. Pure
/// function of (record, rule set) — no calls out, no per-record failures.
pub fn classify(txn: &Transaction, rules: &[CompiledRule]) -> Option<CategoryProposal> {
    rules.iter().find(|r| matches(r, txn)).map(|r| CategoryProposal {
        fingerprint: txn.fingerprint.clone(),
        category: r.rule.category.clone(),
        confidence: r.rule.confidence,
        source: ProposalSource::Rule,
    })
}

/// Deactivate a rule by id, returning its pattern and category for
/// display. Only a missing row means "no such rule"; any other lookup
/// failure is a real storage error and propagates as one.
pub fn deactivate(conn: &Connection, id: i64) -> Result<(String, String)> {
    let row: std::result::Result<(String, String, i64), rusqlite::Error> = conn.query_row(
        "SELECT pattern, category, is_active FROM rules WHERE id = ?1",
        [id],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    );
    match row {
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            Err(FintrackError::Other(format!("No rule with ID {id}")))
        }
        Err(e) => Err(e.into()),
        Ok((_, _, 0)) => Err(FintrackError::Other(format!("Rule {id} is already inactive"))),
        Ok((pattern, category, _)) => {
            conn.execute("UPDATE rules SET is_active = 0 WHERE id = ?1", [id])?;
            Ok((pattern, category))
        }
    }
}

pub fn bump_hit_count(conn: &Connection, rule_id: i64) -> Result<()> {
    conn.execute("UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1", [rule_id])?;
    Ok(())
}

/// Which rule produced a proposal, for hit counting.
pub fn matching_rule_id(txn: &Transaction, rules: &[CompiledRule]) -> Option<i64> {
    rules.iter().find(|r| matches(r, txn)).map(|r| r.rule.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};
    use crate::models::RawRow;
    use crate::normalizer::normalize;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn add_rule(conn: &Connection, pattern: &str, match_type: &str, category: &str, confidence: f64, priority: i64) {
        conn.execute(
            "INSERT INTO rules (pattern, match_type, category, confidence, priority) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![pattern, match_type, category, confidence, priority],
        )
        .unwrap();
    }

    fn txn(desc: &str) -> Transaction {
        normalize(&RawRow {
            date: "2025-01-15".to_string(),
            amount: "-50.00".to_string(),
            description: desc.to_string(),
            account: "chk-01".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_contains_match_is_case_insensitive() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "starbucks", "contains", "Coffee", 1.0, 0);
        let rules = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap();
        let p = classify(&txn("STARBUCKS #4521"), &rules).unwrap();
        assert_eq!(p.category, "Coffee");
        assert_eq!(p.confidence, 1.0);
        assert_eq!(p.source, ProposalSource::Rule);
    }

    #[test]
    fn test_starts_with_match() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "REWE", "starts_with", "Groceries", 0.9, 0);
        let rules = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap();
        assert!(classify(&txn("REWE Markt 223"), &rules).is_some());
        assert!(classify(&txn("Kiosk REWE"), &rules).is_none());
    }

    #[test]
    fn test_regex_match() {
        let (_dir, conn) = test_db();
        add_rule(&conn, r"ATM\s+\d{4}", "regex", "Cash Withdrawal", 1.0, 0);
        let rules = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap();
        assert!(classify(&txn("ATM 1234 MAIN ST"), &rules).is_some());
        assert!(classify(&txn("ATM FEE"), &rules).is_none());
    }

    #[test]
    fn test_first_match_wins_by_priority() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "STARBUCKS", "contains", "Dining", 0.8, 0);
        add_rule(&conn, "STARBUCKS", "contains", "Coffee", 1.0, 10);
        let rules = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap();
        let p = classify(&txn("STARBUCKS #4521"), &rules).unwrap();
        // Higher priority rule wins even though it was inserted later.
        assert_eq!(p.category, "Coffee");
    }

    #[test]
    fn test_no_match_returns_none() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "STARBUCKS", "contains", "Coffee", 1.0, 0);
        let rules = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap();
        assert!(classify(&txn("UNKNOWN VENDOR"), &rules).is_none());
    }

    #[test]
    fn test_load_rejects_unknown_category() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "X", "contains", "Not A Category", 1.0, 0);
        let err = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap_err();
        assert!(matches!(err, FintrackError::RuleConfigInvalid(_)));
    }

    #[test]
    fn test_load_rejects_bad_regex() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "([unclosed", "regex", "Coffee", 1.0, 0);
        let err = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap_err();
        assert!(matches!(err, FintrackError::RuleConfigInvalid(_)));
    }

    #[test]
    fn test_load_rejects_out_of_range_confidence() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "X", "contains", "Coffee", 1.5, 0);
        let err = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap_err();
        assert!(matches!(err, FintrackError::RuleConfigInvalid(_)));
    }

    #[test]
    fn test_load_rejects_unknown_match_type() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "X", "fuzzy", "Coffee", 1.0, 0);
        let err = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap_err();
        assert!(matches!(err, FintrackError::RuleConfigInvalid(_)));
    }

    #[test]
    fn test_deactivate_rule() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "STARBUCKS", "contains", "Coffee", 1.0, 0);
        let (pattern, category) = deactivate(&conn, 1).unwrap();
        assert_eq!(pattern, "STARBUCKS");
        assert_eq!(category, "Coffee");
        let active: i64 = conn
            .query_row("SELECT is_active FROM rules WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(active, 0);
        // Second deactivation is reported, not silently repeated.
        assert!(deactivate(&conn, 1).is_err());
    }

    #[test]
    fn test_deactivate_missing_rule() {
        let (_dir, conn) = test_db();
        let err = deactivate(&conn, 99).unwrap_err();
        assert!(matches!(err, FintrackError::Other(msg) if msg.contains("No rule with ID 99")));
    }

    #[test]
    fn test_deactivate_surfaces_storage_errors() {
        let (_dir, conn) = test_db();
        conn.execute_batch("DROP TABLE rules").unwrap();
        // A broken store must not masquerade as a missing rule.
        let err = deactivate(&conn, 1).unwrap_err();
        assert!(matches!(err, FintrackError::Db(_)));
    }

    #[test]
    fn test_bump_hit_count() {
        let (_dir, conn) = test_db();
        add_rule(&conn, "STARBUCKS", "contains", "Coffee", 1.0, 0);
        let rules = load_rules(&conn, &crate::db::category_names(&conn).unwrap()).unwrap();
        let t = txn("STARBUCKS #4521");
        let id = matching_rule_id(&t, &rules).unwrap();
        bump_hit_count(&conn, id).unwrap();
        let hits: i64 = conn
            .query_row("SELECT hit_count FROM rules WHERE id = ?1", [id], |r| r.get(0))
            .unwrap();
        assert_eq!(hits, 1);
    }
}
