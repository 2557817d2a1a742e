use std::path::Path;

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::error::{FintrackError, Result};
use crate::models::RawRow;

// Statement exports name their columns inconsistently; these are the
// spellings we map onto (date, description, amount).
const DATE_HEADERS: &[&str] = &["Date", "Posting Date", "Transaction Date", "Booking Date"];
const DESC_HEADERS: &[&str] = &["Description", "Payee", "Details", "Purpose"];
const AMOUNT_HEADERS: &[&str] = &["Amount", "Transaction Amount"];

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

struct ColumnMap {
    date: usize,
    description: usize,
    amount: usize,
}

fn match_header(record: &csv::StringRecord) -> Option<ColumnMap> {
    let mut date = None;
    let mut description = None;
    let mut amount = None;
    for (i, field) in record.iter().enumerate() {
        let f = field.trim();
        if date.is_none() && DATE_HEADERS.contains(&f) {
            date = Some(i);
        } else if description.is_none() && DESC_HEADERS.contains(&f) {
            description = Some(i);
        } else if amount.is_none() && AMOUNT_HEADERS.contains(&f) {
            amount = Some(i);
        }
    }
    Some(ColumnMap {
        date: date?,
        description: description?,
        amount: amount?,
    })
}

/// Parse a statement CSV into raw rows. Bank exports routinely carry a
/// preamble (account metadata, balance summaries) before the real header,
/// so the header row is located by its column names rather than assumed
/// to be first. Rows are returned untyped; normalization decides what is
/// malformed.
pub fn parse_csv(file_path: &Path, account: &str) -> Result<Vec<RawRow>> {
    let file = std::fs::File::open(file_path)?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let mut rows = Vec::new();
    let mut columns: Option<ColumnMap> = None;

    for result in rdr.records() {
        let record = result?;
        let Some(cols) = &columns else {
            columns = match_header(&record);
            continue;
        };
        let min_len = [cols.date, cols.description, cols.amount]
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1;
        if record.len() < min_len || record[cols.date].trim().is_empty() {
            continue;
        }
        let description = record[cols.description].trim();
        if description.is_empty() || description.contains("Beginning balance") {
            continue;
        }
        rows.push(RawRow {
            date: record[cols.date].to_string(),
            amount: record[cols.amount].to_string(),
            description: description.to_string(),
            account: account.to_string(),
        });
    }

    if columns.is_none() {
        return Err(FintrackError::Other(format!(
            "no recognizable header row (Date/Description/Amount) in {}",
            file_path.display()
        )));
    }
    Ok(rows)
}

#[derive(Debug)]
pub struct FileImport {
    pub rows: Vec<RawRow>,
    pub checksum: String,
    pub duplicate_file: bool,
}

/// Read a statement file for a known account, short-circuiting if the
/// identical file was imported before. Row-level dedup still applies
/// downstream; the checksum just avoids re-parsing whole files.
pub fn read_file(conn: &Connection, file_path: &Path, account: &str) -> Result<FileImport> {
    let exists: bool = conn
        .prepare("SELECT 1 FROM accounts WHERE name = ?1")?
        .exists([account])?;
    if !exists {
        return Err(FintrackError::UnknownAccount(account.to_string()));
    }

    let checksum = compute_checksum(file_path)?;
    let already: bool = conn
        .prepare("SELECT 1 FROM imports WHERE checksum = ?1 AND account = ?2")?
        .exists(rusqlite::params![checksum, account])?;
    if already {
        return Ok(FileImport {
            rows: Vec::new(),
            checksum,
            duplicate_file: true,
        });
    }

    let rows = parse_csv(file_path, account)?;
    Ok(FileImport {
        rows,
        checksum,
        duplicate_file: false,
    })
}

/// Record a completed import. Called only after the rows have been
/// persisted; a run that fails leaves no imports row, so the same file
/// can be retried without tripping the checksum check.
pub fn record_import(
    conn: &Connection,
    file_path: &Path,
    account: &str,
    import: &FileImport,
) -> Result<()> {
    let dates: Vec<&str> = import.rows.iter().map(|r| r.date.as_str()).collect();
    conn.execute(
        "INSERT INTO imports (filename, account, record_count, date_range_start, date_range_end, checksum) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            file_path.file_name().and_then(|n| n.to_str()).unwrap_or(""),
            account,
            import.rows.len() as i64,
            dates.iter().min().copied(),
            dates.iter().max().copied(),
            import.checksum,
        ],
    )?;
    Ok(())
}
