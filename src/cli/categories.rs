use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::settings::db_path;

pub fn list() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let mut stmt = conn.prepare(
        "SELECT name, description FROM categories WHERE is_active = 1 ORDER BY name",
    )?;
    let rows: Vec<(String, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Description"]);
    for (name, description) in rows {
        table.add_row(vec![Cell::new(name), Cell::new(description.unwrap_or_default())]);
    }
    println!("Categories\n{table}");
    Ok(())
}

pub fn add(name: &str, description: Option<&str>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    conn.execute(
        "INSERT INTO categories (name, description) VALUES (?1, ?2)",
        rusqlite::params![name, description],
    )?;
    println!("Added category: {name}");
    Ok(())
}
