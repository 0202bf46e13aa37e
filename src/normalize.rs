use std::path::Path;

use chrono::NaiveDate;

use crate::error::{Result, SchedcError};
use crate::models::MAX_VENDOR_LEN;

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

// chrono's %Y accepts any digit count, so "24" would parse as year 0024.
// Two-digit-year layouts therefore go before their four-digit twins (%y
// rejects "2024"), and the month-first dash forms go before ISO so that
// "03-04-24" is never read as 0003-04-24.
//
// Day-first layouts come last, so they only ever match when the first number
// is above 12. "02/01/2024" is always read as February 1st. Whether that is
// right depends on the bank, and nothing here can tell.
const DATE_LAYOUTS: &[&str] = &[
    "%m/%d/%y",
    "%m/%d/%Y",
    "%m-%d-%y",
    "%m-%d-%Y",
    "%Y-%m-%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d/%m/%y",
    "%d/%m/%Y",
];

/// Parse a statement date by trying each known layout in order.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(raw, layout).ok())
        .ok_or_else(|| SchedcError::InvalidDate(raw.to_string()))
}

// ---------------------------------------------------------------------------
// Amounts
// ---------------------------------------------------------------------------

/// Parse a money column, tolerating `$`, thousands separators, quotes and
/// parenthesized negatives. Blank cells are `None`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return inner.trim().parse::<f64>().ok().map(|v| -v);
    }
    s.parse().ok()
}

// ---------------------------------------------------------------------------
// Vendors
// ---------------------------------------------------------------------------

const NOISE_PREFIXES: &[&str] = &["AplPay ", "TST* ", "SQC*", "GOOGLE *", "PAYPAL *"];

fn looks_like_state_code(word: &str) -> bool {
    word.len() == 2 && word.chars().all(|c| c.is_ascii_uppercase())
}

fn clean_vendor_once(vendor: &str) -> String {
    let mut vendor = vendor.trim();
    if let Some(rest) = NOISE_PREFIXES.iter().find_map(|p| vendor.strip_prefix(p)) {
        vendor = rest.trim_start();
    }

    let words: Vec<&str> = vendor.split_whitespace().collect();
    let vendor = match words.split_last() {
        Some((last, rest)) if !rest.is_empty() && looks_like_state_code(last) => rest.join(" "),
        _ => vendor.to_string(),
    };

    let truncated: String = vendor.chars().take(MAX_VENDOR_LEN).collect();
    truncated.trim().to_string()
}

/// Turn a raw description into a display vendor name.
///
/// Strips one wallet/processor prefix, drops a trailing two-letter state code,
/// and caps the result at 50 characters. The cleanup repeats until the string
/// stops changing, so the result is stable under re-extraction.
pub fn extract_vendor(description: &str) -> String {
    let mut current = clean_vendor_once(description);
    loop {
        let next = clean_vendor_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

// ---------------------------------------------------------------------------
// Payments and transfers
// ---------------------------------------------------------------------------

const PAYMENT_KEYWORDS: &[&str] = &[
    "online payment",
    "payment thank you",
    "payment - thank you",
    "autopay",
    "automatic payment",
    "paypal transfer",
    "venmo payment",
    "zelle payment",
    "wire transfer",
    "transfer to",
    "transfer from",
];

/// Card payments and account transfers move money between the user's own
/// accounts and never count as income or expense.
pub fn is_payment_or_transfer(description: &str) -> bool {
    let lower = description.to_lowercase();
    PAYMENT_KEYWORDS.iter().any(|k| lower.contains(k))
}

// ---------------------------------------------------------------------------
// Card label
// ---------------------------------------------------------------------------

/// "Amex_Gold_2024.csv" -> "Amex Gold 2024"
pub fn card_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    stem.replace('_', " ").trim().to_string()
}
