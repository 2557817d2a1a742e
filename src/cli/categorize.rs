use crate::cli::print_run_summary;
use crate::db::get_connection;
use crate::error::Result;
use crate::pipeline;
use crate::settings::{db_path, load_settings};

pub fn run(use_ai: bool) -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&db_path())?;

    let summary = pipeline::recategorize(&conn, &settings, use_ai)?;
    if summary.total_rows == 0 {
        println!("Nothing to categorize.");
        return Ok(());
    }
    print_run_summary(&summary);
    Ok(())
}
