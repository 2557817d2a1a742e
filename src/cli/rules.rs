use comfy_table::{Cell, Table};

use crate::db::{category_names, get_connection};
use crate::error::{FintrackError, Result};
use crate::settings::db_path;

pub fn add(
    pattern: &str,
    category: &str,
    match_type: &str,
    confidence: f64,
    priority: i64,
) -> Result<()> {
    let conn = get_connection(&db_path())?;

    if !category_names(&conn)?.iter().any(|c| c == category) {
        return Err(FintrackError::UnknownCategory(category.to_string()));
    }
    if !(0.0..=1.0).contains(&confidence) {
        return Err(FintrackError::RuleConfigInvalid(format!(
            "confidence {confidence} outside [0,1]"
        )));
    }
    if match_type == "regex" {
        regex::Regex::new(pattern).map_err(|e| {
            FintrackError::RuleConfigInvalid(format!("invalid regex '{pattern}': {e}"))
        })?;
    } else if !matches!(match_type, "contains" | "starts_with") {
        return Err(FintrackError::RuleConfigInvalid(format!(
            "unknown match type '{match_type}'"
        )));
    }

    conn.execute(
        "INSERT INTO rules (pattern, match_type, category, confidence, priority) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![pattern, match_type, category, confidence, priority],
    )?;
    println!("Added rule: '{pattern}' \u{2192} {category}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let mut stmt = conn.prepare(
        "SELECT id, pattern, match_type, category, confidence, priority, hit_count \
         FROM rules WHERE is_active = 1 ORDER BY priority DESC, id ASC",
    )?;
    let rows: Vec<(i64, String, String, String, f64, i64, i64)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Pattern", "Type", "Category", "Confidence", "Priority", "Hits"]);
    for (id, pattern, match_type, category, confidence, priority, hits) in rows {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(pattern),
            Cell::new(match_type),
            Cell::new(category),
            Cell::new(format!("{confidence:.2}")),
            Cell::new(priority),
            Cell::new(hits),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let (pattern, category) = crate::rules::deactivate(&conn, id)?;
    println!("Deleted rule {id}: '{pattern}' \u{2192} {category}");
    Ok(())
}
