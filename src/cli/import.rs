use std::path::PathBuf;

use crate::cli::print_run_summary;
use crate::db::get_connection;
use crate::error::Result;
use crate::importer;
use crate::pipeline;
use crate::settings::{db_path, load_settings};

pub fn run(file: &str, account: &str, use_ai: bool) -> Result<()> {
    let settings = load_settings();
    let conn = get_connection(&db_path())?;

    let path = PathBuf::from(file);
    let read = importer::read_file(&conn, &path, account)?;
    if read.duplicate_file {
        println!("This file has already been imported (duplicate checksum).");
        return Ok(());
    }

    let summary = pipeline::run_import(&conn, &read.rows, &settings, use_ai)?;
    // The imports row lands only after the run went through; a failed run
    // leaves the file eligible for retry.
    importer::record_import(&conn, &path, account, &read)?;
    print_run_summary(&summary);
    Ok(())
}
