use std::collections::HashMap;

use chrono::Utc;

use crate::error::{Result, SchedcError};
use crate::models::{CanonicalTransaction, UploadBatch, UploadSource, UNCATEGORIZED};
use crate::normalize::{card_name, extract_vendor, is_payment_or_transfer, parse_amount, parse_date};
use crate::store::Store;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Header map
// ---------------------------------------------------------------------------

/// Lower-cased header names and their column positions, built once per file.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn new(record: &csv::StringRecord) -> Self {
        let names: Vec<String> = record
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
            .collect();
        let mut index = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Self { names, index }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The cell under the exact (lower-case) header `name`, if both exist.
    pub fn get<'r>(&self, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
        self.index.get(name).and_then(|&i| record.get(i))
    }
}

// ---------------------------------------------------------------------------
// Format detection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvFormat {
    /// Status, Date, Description, Debit, Credit (Chase-style).
    ColumnarDebitCredit,
    /// Date, Description, Amount, Extended Details, Category (Amex-style).
    SignedAmount,
    Generic,
}

/// What one data row turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Parsed(CanonicalTransaction),
    Payment,
}

impl CsvFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ColumnarDebitCredit => "columnar debit/credit",
            Self::SignedAmount => "signed amount",
            Self::Generic => "generic",
        }
    }

    /// Pick a parser from the header row alone. Never fails.
    pub fn detect(headers: &HeaderMap) -> Self {
        let joined = headers.names().join(",");
        if joined.contains("status") && joined.contains("debit") && joined.contains("credit") {
            Self::ColumnarDebitCredit
        } else if joined.contains("amount") && joined.contains("extended details") {
            Self::SignedAmount
        } else {
            Self::Generic
        }
    }

    /// Fill `shell` from one row. The shell arrives with id, card, source file
    /// and type already set.
    pub fn parse_row(
        &self,
        record: &csv::StringRecord,
        headers: &HeaderMap,
        shell: CanonicalTransaction,
    ) -> Result<RowOutcome> {
        let outcome = match self {
            Self::ColumnarDebitCredit => parse_columnar(record, headers, shell)?,
            Self::SignedAmount => parse_signed_amount(record, headers, shell)?,
            Self::Generic => parse_generic(record, headers, shell)?,
        };
        Ok(match outcome {
            RowOutcome::Parsed(mut tx) => {
                tx.purpose = String::new();
                tx.expensable = tx.default_expensable();
                RowOutcome::Parsed(tx)
            }
            RowOutcome::Payment => RowOutcome::Payment,
        })
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Shared date/description handling for the two known layouts. Returns true
/// when the row is a payment or transfer and must be dropped.
fn read_date_and_vendor(
    record: &csv::StringRecord,
    headers: &HeaderMap,
    tx: &mut CanonicalTransaction,
) -> Result<bool> {
    let description = headers.get(record, "description").map(str::trim).unwrap_or("");
    if is_payment_or_transfer(description) {
        return Ok(true);
    }
    let raw_date = headers
        .get(record, "date")
        .ok_or(SchedcError::MissingRequiredField("date"))?;
    tx.date = parse_date(raw_date)?;
    tx.vendor = extract_vendor(description);
    if tx.vendor.is_empty() {
        return Err(SchedcError::MissingRequiredField("description"));
    }
    Ok(false)
}

fn parse_columnar(
    record: &csv::StringRecord,
    headers: &HeaderMap,
    mut tx: CanonicalTransaction,
) -> Result<RowOutcome> {
    if read_date_and_vendor(record, headers, &mut tx)? {
        return Ok(RowOutcome::Payment);
    }
    // Unparsable cells count as empty.
    let debit = headers.get(record, "debit").and_then(parse_amount);
    let credit = headers.get(record, "credit").and_then(parse_amount);
    tx.amount = match (debit.filter(|d| *d != 0.0), credit) {
        (Some(d), _) => d.abs(),
        (None, Some(c)) => -c.abs(),
        (None, None) => 0.0,
    };
    tx.category = UNCATEGORIZED.to_string();
    Ok(RowOutcome::Parsed(tx))
}

fn parse_signed_amount(
    record: &csv::StringRecord,
    headers: &HeaderMap,
    mut tx: CanonicalTransaction,
) -> Result<RowOutcome> {
    if read_date_and_vendor(record, headers, &mut tx)? {
        return Ok(RowOutcome::Payment);
    }
    let raw = headers
        .get(record, "amount")
        .ok_or(SchedcError::MissingRequiredField("amount"))?;
    tx.amount = parse_amount(raw).ok_or_else(|| SchedcError::InvalidAmount(raw.to_string()))?;
    tx.category = headers
        .get(record, "category")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORIZED)
        .to_string();
    Ok(RowOutcome::Parsed(tx))
}

/// Scan every column and take the first usable date, description and amount.
fn parse_generic(
    record: &csv::StringRecord,
    headers: &HeaderMap,
    mut tx: CanonicalTransaction,
) -> Result<RowOutcome> {
    let mut date = None;
    let mut vendor: Option<String> = None;
    let mut amount = None;

    for (header, value) in headers.names().iter().zip(record.iter()) {
        let value = value.trim();
        if date.is_none() && header.contains("date") {
            date = parse_date(value).ok();
        }
        if vendor.is_none() && (header.contains("description") || header.contains("vendor")) {
            if is_payment_or_transfer(value) {
                return Ok(RowOutcome::Payment);
            }
            vendor = Some(extract_vendor(value)).filter(|v| !v.is_empty());
        }
        if amount.is_none() && header.contains("amount") {
            amount = parse_amount(value);
        }
    }

    tx.date = date.ok_or(SchedcError::MissingRequiredField("date"))?;
    tx.vendor = vendor.ok_or(SchedcError::MissingRequiredField("vendor"))?;
    tx.amount = amount.unwrap_or(0.0);
    tx.category = UNCATEGORIZED.to_string();
    Ok(RowOutcome::Parsed(tx))
}

// ---------------------------------------------------------------------------
// Ingestion pipeline
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ParsedBatch {
    pub format: CsvFormat,
    pub transactions: Vec<CanonicalTransaction>,
    pub payments_excluded: usize,
    pub skipped_rows: usize,
}

impl ParsedBatch {
    pub fn parsed_count(&self) -> usize {
        self.transactions.len()
    }
}

/// Bank exports are often Windows-1252. Invalid bytes become U+FFFD instead
/// of costing the row.
fn decode(record: &csv::ByteRecord) -> csv::StringRecord {
    csv::StringRecord::from(
        record
            .iter()
            .map(String::from_utf8_lossy)
            .collect::<Vec<_>>(),
    )
}

/// Parse a whole file into canonical transactions. Bad rows are skipped and
/// counted; only an empty file aborts.
pub fn ingest(
    content: &[u8],
    source: UploadSource,
    filename: &str,
    file_id: &str,
) -> Result<ParsedBatch> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);
    let mut records = rdr.byte_records();

    let headers = match records.next() {
        Some(Ok(record)) => HeaderMap::new(&decode(&record)),
        Some(Err(e)) => {
            tracing::warn!(file = filename, error = %e, "unreadable header row");
            return Err(SchedcError::EmptyFile);
        }
        None => return Err(SchedcError::EmptyFile),
    };
    if headers.is_empty() {
        return Err(SchedcError::EmptyFile);
    }

    let format = CsvFormat::detect(&headers);
    let card = card_name(filename);
    let transaction_type = source.transaction_type();
    tracing::debug!(file = filename, format = format.name(), "detected CSV format");

    let mut batch = ParsedBatch {
        format,
        transactions: Vec::new(),
        payments_excluded: 0,
        skipped_rows: 0,
    };

    // Row numbers are 1-based and count the header, like a spreadsheet.
    for (i, result) in records.enumerate() {
        let row_number = i + 2;
        let record = match result {
            Ok(record) => decode(&record),
            Err(e) => {
                tracing::warn!(row = row_number, error = %e, "skipping unreadable row");
                batch.skipped_rows += 1;
                continue;
            }
        };
        if record.len() < headers.len() {
            tracing::warn!(row = row_number, "skipping short row");
            batch.skipped_rows += 1;
            continue;
        }

        let shell = CanonicalTransaction::shell(file_id, &card, transaction_type);
        match format.parse_row(&record, &headers, shell) {
            Ok(RowOutcome::Parsed(tx)) => batch.transactions.push(tx),
            Ok(RowOutcome::Payment) => batch.payments_excluded += 1,
            Err(e) => {
                tracing::warn!(row = row_number, error = %e, "skipping row");
                batch.skipped_rows += 1;
            }
        }
    }

    Ok(batch)
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

/// Checks the transport applies before the pipeline ever sees the bytes.
pub fn validate_upload(filename: &str, size: usize) -> Result<()> {
    if !filename.to_lowercase().ends_with(".csv") {
        return Err(SchedcError::NotCsv(filename.to_string()));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(SchedcError::UploadTooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub file_id: String,
    pub format: CsvFormat,
    pub parsed_count: usize,
    pub stored: usize,
    pub failed_inserts: usize,
    pub payments_excluded: usize,
    pub skipped_rows: usize,
}

/// Validate, ingest and persist one uploaded file.
///
/// Rows are inserted one at a time. A failed insert is logged and skipped,
/// so a storage error part-way through leaves the earlier rows in place.
pub fn import_upload(
    store: &dyn Store,
    content: &[u8],
    source: UploadSource,
    filename: &str,
) -> Result<UploadOutcome> {
    validate_upload(filename, content.len())?;

    let file_id = uuid::Uuid::new_v4().to_string();
    let batch = ingest(content, source, filename, &file_id)?;

    let mut stored = 0usize;
    let mut failed_inserts = 0usize;
    for tx in &batch.transactions {
        match store.insert_transaction(tx) {
            Ok(()) => stored += 1,
            Err(e) => {
                tracing::error!(id = %tx.id, vendor = %tx.vendor, error = %e, "failed to store transaction");
                failed_inserts += 1;
            }
        }
    }

    let upload = UploadBatch {
        id: file_id.clone(),
        filename: filename.to_string(),
        source,
        uploaded_at: Utc::now(),
    };
    if let Err(e) = store.insert_upload_batch(&upload) {
        tracing::error!(file_id = %file_id, error = %e, "failed to record upload batch");
    }

    tracing::info!(
        file = filename,
        format = batch.format.name(),
        parsed = batch.parsed_count(),
        stored,
        payments_excluded = batch.payments_excluded,
        skipped = batch.skipped_rows,
        "upload complete"
    );

    Ok(UploadOutcome {
        file_id,
        format: batch.format,
        parsed_count: batch.parsed_count(),
        stored,
        failed_inserts,
        payments_excluded: batch.payments_excluded,
        skipped_rows: batch.skipped_rows,
    })
}
