use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::db_path;

pub fn add(name: &str, institution: Option<&str>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    conn.execute(
        "INSERT INTO accounts (name, institution) VALUES (?1, ?2)",
        rusqlite::params![name, institution],
    )?;
    println!("Added account: {name}");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let mut stmt = conn.prepare(
        "SELECT a.name, a.institution, COUNT(t.fingerprint) \
         FROM accounts a LEFT JOIN transactions t ON t.account = a.name \
         GROUP BY a.id ORDER BY a.name",
    )?;
    let rows: Vec<(String, Option<String>, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["Account", "Institution", "Transactions"]);
    for (name, institution, count) in rows {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(institution.unwrap_or_default()),
            Cell::new(count),
        ]);
    }
    println!("Accounts\n{table}");
    Ok(())
}
