use sha2::{Digest, Sha256};

use crate::error::{FintrackError, Result};
use crate::models::{ProposalSource, RawRow, Transaction};

/// Accepted date formats, tried in order. The separator disambiguates
/// US (slash) from European (dot) field order, so parsing never guesses.
///
///   2025-01-15    ISO
///   1/15/2025     M/D/YYYY
///   15.1.2025     D.M.YYYY
pub fn parse_date(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if let Ok(d) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(d.format("%Y-%m-%d").to_string());
    }
    if raw.contains('/') {
        if let Some(d) = parse_ymd_parts(raw, '/', 2, 0, 1) {
            return Ok(d);
        }
    }
    if raw.contains('.') {
        if let Some(d) = parse_ymd_parts(raw, '.', 2, 1, 0) {
            return Ok(d);
        }
    }
    Err(FintrackError::MalformedDate(raw.to_string()))
}

fn parse_ymd_parts(raw: &str, sep: char, yi: usize, mi: usize, di: usize) -> Option<String> {
    let parts: Vec<&str> = raw.split(sep).collect();
    if parts.len() != 3 {
        return None;
    }
    let y: i32 = parts[yi].trim().parse().ok()?;
    let m: u32 = parts[mi].trim().parse().ok()?;
    let d: u32 = parts[di].trim().parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(y, m, d).map(|dt| dt.format("%Y-%m-%d").to_string())
}

/// Parse an amount string into integer cents.
///
/// Convention (applied to every row of every run): `.` is the decimal
/// separator, `,` separates thousands, `$` is ignored, and a debit is
/// written either with a leading `-` or in parentheses. Debits come out
/// negative, credits positive. Anything else is `MalformedAmount`.
pub fn parse_amount_cents(raw: &str) -> Result<i64> {
    let cleaned = raw.replace(',', "").replace('"', "").replace('$', "");
    let mut s = cleaned.trim();

    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner.trim();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = !negative;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    let malformed = || FintrackError::MalformedAmount(raw.trim().to_string());

    // After sign handling only digits and one decimal point may remain.
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(malformed());
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(malformed());
    }
    if frac_part.len() > 2 {
        return Err(malformed());
    }
    let int_val: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| malformed())?
    };
    let frac_val: i64 = if frac_part.is_empty() {
        0
    } else {
        let padded = format!("{frac_part:0<2}");
        padded.parse().map_err(|_| malformed())?
    };

    let cents = int_val * 100 + frac_val;
    Ok(if negative { -cents } else { cents })
}

/// Trim and collapse internal whitespace runs. Casing is preserved; the
/// rules engine derives its own case-folded view.
pub fn normalize_description(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Identity key over the four identity fields. Recomputing from the same
/// canonical inputs always yields the same value.
pub fn fingerprint(account: &str, date: &str, amount_cents: i64, description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{account}|{date}|{amount_cents}|{description}"));
    hex::encode(hasher.finalize())
}

/// Convert a raw statement row into a canonical transaction. Pure: the
/// same row always normalizes to the same record.
pub fn normalize(row: &RawRow) -> Result<Transaction> {
    let date = parse_date(&row.date)?;
    let amount_cents = parse_amount_cents(&row.amount)?;
    let description = normalize_description(&row.description);
    let account = row.account.trim().to_string();
    let fingerprint = fingerprint(&account, &date, amount_cents, &description);
    Ok(Transaction {
        fingerprint,
        account,
        date,
        description,
        amount_cents,
        category: None,
        category_source: ProposalSource::None,
        category_confidence: None,
    })
}
