//! CSV transaction import
//!
//! Columns are located by header name, so exports from most banks and
//! budgeting apps work without a per-bank parser. Recognised headers
//! (case-insensitive):
//!
//! - date: `date`, `transaction date`, `posted date`
//! - amount: `amount`, `debit`/`credit` pairs
//! - merchant: `merchant`, `description`, `payee`, `name`
//! - optional: `category`, `mood`, `hour`

use std::io::Read;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, TransactionSource};
use crate::normalize::resolve_category;

/// How the file signs spending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignConvention {
    /// Pick whichever sign the majority of rows use for spending
    #[default]
    Auto,
    /// Purchases are positive
    SpendPositive,
    /// Purchases are negative (typical bank export)
    SpendNegative,
}

/// Result of importing one file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportReport {
    pub parsed: usize,
    pub inserted: usize,
    pub duplicates: usize,
}

#[derive(Debug)]
struct Columns {
    date: usize,
    amount: Option<usize>,
    debit: Option<usize>,
    credit: Option<usize>,
    merchant: usize,
    category: Option<usize>,
    mood: Option<usize>,
    hour: Option<usize>,
}

fn find(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim().to_lowercase();
        names.iter().any(|n| *n == h)
    })
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let date = find(headers, &["date", "transaction date", "posted date", "post date"])
            .ok_or_else(|| Error::Import("No date column".into()))?;
        let merchant = find(headers, &["merchant", "description", "payee", "name", "memo"])
            .ok_or_else(|| Error::Import("No merchant/description column".into()))?;
        let amount = find(headers, &["amount", "value"]);
        let debit = find(headers, &["debit", "withdrawal"]);
        let credit = find(headers, &["credit", "deposit"]);
        if amount.is_none() && debit.is_none() {
            return Err(Error::Import("No amount or debit column".into()));
        }

        Ok(Self {
            date,
            amount,
            debit,
            credit,
            merchant,
            category: find(headers, &["category", "type"]),
            mood: find(headers, &["mood"]),
            hour: find(headers, &["hour"]),
        })
    }
}

/// Parse a date string in various common formats
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    let formats = [
        "%Y-%m-%d", // 2026-01-15
        "%m/%d/%Y", // 01/15/2026
        "%m/%d/%y", // 01/15/26
        "%m-%d-%Y", // 01-15-2026
        "%d.%m.%Y", // 15.01.2026
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    Err(Error::Import(format!("Unable to parse date: {}", s)))
}

/// Parse an amount string, handling currency symbols and commas
fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', '€', '£', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned
        .parse::<f64>()
        .map_err(|_| Error::Import(format!("Unable to parse amount: {}", s)))
}

fn field<'a>(record: &'a StringRecord, index: Option<usize>) -> Option<&'a str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse a CSV export into transactions, with positive amounts for spending
pub fn parse_csv<R: Read>(reader: R, sign: SignConvention) -> Result<Vec<NewTransaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?)?;
    debug!(?columns, "Resolved CSV columns");

    // Raw signed amounts; debit/credit files are already spend-positive
    let mut rows = Vec::new();
    let mut split_columns = false;

    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let line = i + 2;
        let wrap = |e: Error| Error::Import(format!("line {}: {}", line, e));

        let date = parse_date(field(&record, Some(columns.date)).unwrap_or_default()).map_err(wrap)?;
        let merchant = field(&record, Some(columns.merchant))
            .ok_or_else(|| Error::Import(format!("line {}: missing merchant", line)))?
            .to_string();

        let amount = match field(&record, columns.amount) {
            Some(raw) => parse_amount(raw).map_err(wrap)?,
            None => {
                split_columns = true;
                let debit = field(&record, columns.debit)
                    .map(parse_amount)
                    .transpose()
                    .map_err(wrap)?
                    .unwrap_or(0.0);
                let credit = field(&record, columns.credit)
                    .map(parse_amount)
                    .transpose()
                    .map_err(wrap)?
                    .unwrap_or(0.0);
                debit.abs() - credit.abs()
            }
        };

        let raw_category = field(&record, columns.category).map(String::from);
        let mood = field(&record, columns.mood).and_then(|m| m.parse().ok());
        let hour = field(&record, columns.hour)
            .and_then(|h| h.parse::<u8>().ok())
            .filter(|h| *h < 24);

        rows.push(NewTransaction {
            date,
            amount,
            category: resolve_category(raw_category.as_deref(), &merchant),
            merchant,
            raw_category,
            mood,
            hour,
            source: TransactionSource::Import,
        });
    }

    let flip = match sign {
        SignConvention::SpendPositive => false,
        SignConvention::SpendNegative => !split_columns,
        SignConvention::Auto => {
            let negative = rows.iter().filter(|t| t.amount < 0.0).count();
            !split_columns && negative * 2 > rows.len()
        }
    };
    if flip {
        for tx in &mut rows {
            tx.amount = -tx.amount;
        }
    }

    Ok(rows)
}

/// Parse and store a CSV export for a user
pub fn import_csv<R: Read>(
    db: &Database,
    user_id: &str,
    reader: R,
    sign: SignConvention,
) -> Result<ImportReport> {
    let txs = parse_csv(reader, sign)?;
    let (inserted, duplicates) = db.insert_transactions(user_id, &txs)?;
    info!(user_id, parsed = txs.len(), inserted, duplicates, "Imported CSV");
    Ok(ImportReport {
        parsed: txs.len(),
        inserted,
        duplicates,
    })
}
