use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::models::{ProposalSource, Resolution, Transaction};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    institution TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    is_active INTEGER DEFAULT 1
);

CREATE TABLE IF NOT EXISTS imports (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    account TEXT NOT NULL,
    import_date TEXT DEFAULT (datetime('now')),
    record_count INTEGER,
    date_range_start TEXT,
    date_range_end TEXT,
    checksum TEXT
);

CREATE TABLE IF NOT EXISTS transactions (
    fingerprint TEXT PRIMARY KEY,
    account TEXT NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    category TEXT,
    category_source TEXT NOT NULL DEFAULT 'none',
    category_confidence REAL,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS rules (
    id INTEGER PRIMARY KEY,
    pattern TEXT NOT NULL,
    match_type TEXT DEFAULT 'contains',
    category TEXT NOT NULL,
    confidence REAL DEFAULT 1.0,
    priority INTEGER DEFAULT 0,
    hit_count INTEGER DEFAULT 0,
    is_active INTEGER DEFAULT 1,
    created_at TEXT DEFAULT (datetime('now'))
);
";

// (name, description)
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Salary", "Wages and salary deposits"),
    ("Interest Income", "Bank interest"),
    ("Other Income", "Refunds, reimbursements, anything else incoming"),
    ("Groceries", "Supermarkets, food stores"),
    ("Dining", "Restaurants, cafes, takeout"),
    ("Coffee", "Coffee shops"),
    ("Rent", "Rent and housing payments"),
    ("Utilities", "Electricity, water, gas, internet, phone"),
    ("Transport", "Public transit, fuel, parking, rideshare"),
    ("Travel", "Flights, hotels, holidays"),
    ("Health", "Pharmacy, doctors, fitness"),
    ("Insurance", "Insurance premiums"),
    ("Shopping", "Retail, clothing, household goods"),
    ("Subscriptions", "Streaming, software, memberships"),
    ("Entertainment", "Events, games, media"),
    ("Education", "Courses, books, tuition"),
    ("Fees", "Bank charges, card fees"),
    ("Cash Withdrawal", "ATM withdrawals"),
    ("Transfers", "Transfers between own accounts"),
    ("Other", "Needs review"),
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM categories", [], |row| row.get(0))?;
    if count == 0 {
        for (name, description) in DEFAULT_CATEGORIES {
            conn.execute(
                "INSERT INTO categories (name, description) VALUES (?1, ?2)",
                rusqlite::params![name, description],
            )?;
        }
    }
    Ok(())
}

/// The closed set of valid category names. Rules and AI responses are
/// validated against this.
pub fn category_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM categories WHERE is_active = 1 ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

// ---------------------------------------------------------------------------
// Store operations keyed by fingerprint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    DuplicateSkipped,
}

/// Insert a transaction unless its fingerprint is already present. An
/// existing row is left untouched, category data included — re-imports of
/// overlapping date ranges are no-ops for known fingerprints.
pub fn admit(conn: &Connection, txn: &Transaction) -> Result<Admission> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO transactions \
         (fingerprint, account, date, description, amount_cents, category, category_source, category_confidence) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            txn.fingerprint,
            txn.account,
            txn.date,
            txn.description,
            txn.amount_cents,
            txn.category,
            txn.category_source.as_str(),
            txn.category_confidence,
        ],
    )?;
    Ok(if changed == 1 {
        Admission::Admitted
    } else {
        Admission::DuplicateSkipped
    })
}

pub fn get(conn: &Connection, fingerprint: &str) -> Result<Option<Transaction>> {
    let mut stmt = conn.prepare_cached(
        "SELECT fingerprint, account, date, description, amount_cents, category, category_source, category_confidence \
         FROM transactions WHERE fingerprint = ?1",
    )?;
    let mut rows = stmt.query_map([fingerprint], row_to_transaction)?;
    match rows.next() {
        Some(row) => Ok(Some(row?)),
        None => Ok(None),
    }
}

/// The one sanctioned category mutation: record the resolved category
/// together with its audit trail (winning source, confidence).
pub fn set_category(conn: &Connection, fingerprint: &str, res: &Resolution) -> Result<()> {
    conn.execute(
        "UPDATE transactions SET category = ?1, category_source = ?2, category_confidence = ?3 \
         WHERE fingerprint = ?4",
        rusqlite::params![res.category, res.source.as_str(), res.confidence, fingerprint],
    )?;
    Ok(())
}

/// Records still awaiting a category, in stable date order.
pub fn list_unresolved(conn: &Connection) -> Result<Vec<Transaction>> {
    let mut stmt = conn.prepare(
        "SELECT fingerprint, account, date, description, amount_cents, category, category_source, category_confidence \
         FROM transactions WHERE category IS NULL ORDER BY date, fingerprint",
    )?;
    let txns = stmt
        .query_map([], row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(txns)
}

fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
    let source: String = row.get(6)?;
    Ok(Transaction {
        fingerprint: row.get(0)?,
        account: row.get(1)?,
        date: row.get(2)?,
        description: row.get(3)?,
        amount_cents: row.get(4)?,
        category: row.get(5)?,
        category_source: ProposalSource::from_db_value(&source),
        category_confidence: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRow;
    use crate::normalizer::normalize;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn sample_txn() -> Transaction {
        normalize(&RawRow {
            date: "2024-03-01".to_string(),
            amount: "-45.20".to_string(),
            description: "STARBUCKS #4521".to_string(),
            account: "chk-01".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["accounts", "categories", "transactions", "rules", "imports"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT count(*) FROM categories", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count as usize, DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn test_category_names_closed_set() {
        let (_dir, conn) = test_db();
        let names = category_names(&conn).unwrap();
        assert!(names.contains(&"Groceries".to_string()));
        assert!(names.contains(&"Coffee".to_string()));
        assert!(!names.contains(&"Made Up".to_string()));
    }

    #[test]
    fn test_admit_then_duplicate_skipped() {
        let (_dir, conn) = test_db();
        let txn = sample_txn();
        assert_eq!(admit(&conn, &txn).unwrap(), Admission::Admitted);
        assert_eq!(admit(&conn, &txn).unwrap(), Admission::DuplicateSkipped);
        let count: i64 = conn
            .query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_admit_never_overwrites_category() {
        let (_dir, conn) = test_db();
        let txn = sample_txn();
        admit(&conn, &txn).unwrap();
        set_category(
            &conn,
            &txn.fingerprint,
            &Resolution {
                category: "Coffee".to_string(),
                source: ProposalSource::Rule,
                confidence: 1.0,
            },
        )
        .unwrap();

        // Re-import of the same row must not clear the category.
        admit(&conn, &txn).unwrap();
        let stored = get(&conn, &txn.fingerprint).unwrap().unwrap();
        assert_eq!(stored.category.as_deref(), Some("Coffee"));
        assert_eq!(stored.category_source, ProposalSource::Rule);
        assert_eq!(stored.category_confidence, Some(1.0));
    }

    #[test]
    fn test_get_missing_fingerprint() {
        let (_dir, conn) = test_db();
        assert!(get(&conn, "no-such-key").unwrap().is_none());
    }

    #[test]
    fn test_list_unresolved() {
        let (_dir, conn) = test_db();
        let a = sample_txn();
        let mut b = sample_txn();
        b.fingerprint = "different".to_string();
        b.date = "2024-03-02".to_string();
        admit(&conn, &a).unwrap();
        admit(&conn, &b).unwrap();
        set_category(
            &conn,
            &a.fingerprint,
            &Resolution {
                category: "Coffee".to_string(),
                source: ProposalSource::Rule,
                confidence: 1.0,
            },
        )
        .unwrap();
        let unresolved = list_unresolved(&conn).unwrap();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].fingerprint, "different");
        assert_eq!(unresolved[0].category_source, ProposalSource::None);
    }
}
