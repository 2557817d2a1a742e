use chrono::Datelike;
use rusqlite::Connection;

use crate::error::Result;

fn date_filter(year: Option<i32>, month: Option<u32>) -> (String, Vec<String>) {
    if let (Some(y), Some(m)) = (year, month) {
        return ("date LIKE ?1".to_string(), vec![format!("{y:04}-{m:02}%")]);
    }
    if let Some(y) = year {
        return ("date LIKE ?1".to_string(), vec![format!("{y}%")]);
    }
    let current_year = chrono::Local::now().year();
    ("date LIKE ?1".to_string(), vec![format!("{current_year}%")])
}

pub struct CategoryTotal {
    pub category: String,
    pub total_cents: i64,
    pub count: i64,
}

/// Per-category totals over the filtered period. Records still awaiting a
/// category are reported under "(unresolved)" so the table always adds up
/// to the full statement.
pub fn category_summary(
    conn: &Connection,
    year: Option<i32>,
    month: Option<u32>,
) -> Result<Vec<CategoryTotal>> {
    let (clause, params) = date_filter(year, month);
    let sql = format!(
        "SELECT COALESCE(category, '(unresolved)') AS cat, SUM(amount_cents), COUNT(*) \
         FROM transactions WHERE {clause} \
         GROUP BY cat ORDER BY SUM(amount_cents) ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_values: Vec<&dyn rusqlite::types::ToSql> = params
        .iter()
        .map(|p| p as &dyn rusqlite::types::ToSql)
        .collect();
    let rows = stmt.query_map(param_values.as_slice(), |row| {
        Ok(CategoryTotal {
            category: row.get(0)?,
            total_cents: row.get(1)?,
            count: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub struct MonthlySpend {
    pub month: String,
    pub spent_cents: i64,
    pub cumulative_cents: i64,
}

/// Monthly outflows (debits only) with a running cumulative column — the
/// cumulative-spending trend consumed by the plotting layer.
pub fn cumulative_spending(conn: &Connection, year: Option<i32>) -> Result<Vec<MonthlySpend>> {
    let (clause, params) = date_filter(year, None);
    let sql = format!(
        "SELECT substr(date, 1, 7) AS month, SUM(amount_cents) \
         FROM transactions WHERE {clause} AND amount_cents < 0 \
         GROUP BY month ORDER BY month"
    );
    let mut stmt = conn.prepare(&sql)?;
    let param_values: Vec<&dyn rusqlite::types::ToSql> = params
        .iter()
        .map(|p| p as &dyn rusqlite::types::ToSql)
        .collect();
    let monthly: Vec<(String, i64)> = stmt
        .query_map(param_values.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut cumulative = 0i64;
    Ok(monthly
        .into_iter()
        .map(|(month, spent)| {
            cumulative += spent;
            MonthlySpend {
                month,
                spent_cents: spent,
                cumulative_cents: cumulative,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{admit, get_connection, init_db, set_category};
    use crate::models::{ProposalSource, RawRow, Resolution};
    use crate::normalizer::normalize;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn insert(conn: &Connection, date: &str, amount: &str, desc: &str, category: Option<&str>) {
        let txn = normalize(&RawRow {
            date: date.to_string(),
            amount: amount.to_string(),
            description: desc.to_string(),
            account: "chk-01".to_string(),
        })
        .unwrap();
        admit(conn, &txn).unwrap();
        if let Some(cat) = category {
            set_category(
                conn,
                &txn.fingerprint,
                &Resolution {
                    category: cat.to_string(),
                    source: ProposalSource::Rule,
                    confidence: 1.0,
                },
            )
            .unwrap();
        }
    }

    #[test]
    fn test_category_summary_groups_and_sums() {
        let (_dir, conn) = test_db();
        insert(&conn, "2024-01-10", "-45.20", "STARBUCKS A", Some("Coffee"));
        insert(&conn, "2024-02-11", "-4.80", "STARBUCKS B", Some("Coffee"));
        insert(&conn, "2024-03-01", "-900.00", "LANDLORD", Some("Rent"));
        insert(&conn, "2024-03-02", "-12.00", "MYSTERY", None);

        let summary = category_summary(&conn, Some(2024), None).unwrap();
        let coffee = summary.iter().find(|c| c.category == "Coffee").unwrap();
        assert_eq!(coffee.total_cents, -5000);
        assert_eq!(coffee.count, 2);
        let unresolved = summary.iter().find(|c| c.category == "(unresolved)").unwrap();
        assert_eq!(unresolved.count, 1);
        // Largest outflow sorts first.
        assert_eq!(summary[0].category, "Rent");
    }

    #[test]
    fn test_category_summary_month_filter() {
        let (_dir, conn) = test_db();
        insert(&conn, "2024-01-10", "-45.20", "STARBUCKS A", Some("Coffee"));
        insert(&conn, "2024-02-11", "-4.80", "STARBUCKS B", Some("Coffee"));
        let summary = category_summary(&conn, Some(2024), Some(1)).unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_cents, -4520);
    }

    #[test]
    fn test_cumulative_spending_accumulates_debits_only() {
        let (_dir, conn) = test_db();
        insert(&conn, "2024-01-10", "-100.00", "A", None);
        insert(&conn, "2024-01-20", "-50.00", "B", None);
        insert(&conn, "2024-02-05", "-25.00", "C", None);
        insert(&conn, "2024-02-06", "2500.00", "SALARY", Some("Salary"));

        let series = cumulative_spending(&conn, Some(2024)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].month, "2024-01");
        assert_eq!(series[0].spent_cents, -15000);
        assert_eq!(series[0].cumulative_cents, -15000);
        assert_eq!(series[1].spent_cents, -2500);
        assert_eq!(series[1].cumulative_cents, -17500);
    }

    #[test]
    fn test_empty_store_yields_empty_reports() {
        let (_dir, conn) = test_db();
        assert!(category_summary(&conn, Some(2024), None).unwrap().is_empty());
        assert!(cumulative_spending(&conn, Some(2024)).unwrap().is_empty());
    }
}
