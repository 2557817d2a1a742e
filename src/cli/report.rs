use comfy_table::{Cell, CellAlignment, Table};

use crate::db::{get_connection, list_unresolved};
use crate::error::Result;
use crate::fmt::money;
use crate::reports;
use crate::settings::db_path;

pub fn summary(year: Option<i32>, month: Option<u32>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let totals = reports::category_summary(&conn, year, month)?;

    let mut table = Table::new();
    table.set_header(vec!["Category", "Total", "Transactions"]);
    let mut grand_total = 0i64;
    for row in &totals {
        grand_total += row.total_cents;
        table.add_row(vec![
            Cell::new(&row.category),
            Cell::new(money(row.total_cents)).set_alignment(CellAlignment::Right),
            Cell::new(row.count).set_alignment(CellAlignment::Right),
        ]);
    }
    table.add_row(vec![
        Cell::new("Net"),
        Cell::new(money(grand_total)).set_alignment(CellAlignment::Right),
        Cell::new(""),
    ]);
    println!("Category summary\n{table}");
    Ok(())
}

pub fn cumulative(year: Option<i32>) -> Result<()> {
    let conn = get_connection(&db_path())?;
    let series = reports::cumulative_spending(&conn, year)?;

    let mut table = Table::new();
    table.set_header(vec!["Month", "Spent", "Cumulative"]);
    for row in &series {
        table.add_row(vec![
            Cell::new(&row.month),
            Cell::new(money(row.spent_cents)).set_alignment(CellAlignment::Right),
            Cell::new(money(row.cumulative_cents)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Cumulative spending\n{table}");
    Ok(())
}

pub fn unresolved() -> Result<()> {
    let conn = get_connection(&db_path())?;
    let pending = list_unresolved(&conn)?;
    if pending.is_empty() {
        println!("No unresolved transactions.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Account", "Description", "Amount"]);
    for txn in &pending {
        table.add_row(vec![
            Cell::new(&txn.date),
            Cell::new(&txn.account),
            Cell::new(&txn.description),
            Cell::new(money(txn.amount_cents)).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("Unresolved transactions ({})\n{table}", pending.len());
    Ok(())
}
