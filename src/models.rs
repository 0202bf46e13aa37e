use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::SchedcError;

pub const UNCATEGORIZED: &str = "uncategorized";
pub const OTHER_EXPENSES_LINE: i32 = 27;
pub const OTHER_EXPENSES_CATEGORY: &str = "Other business expenses";
pub const MAX_VENDOR_LEN: usize = 50;

/// Valid Schedule C expense lines are 8-27; 0 means unassigned.
pub fn is_valid_line(line: i32) -> bool {
    line == 0 || (8..=27).contains(&line)
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What the user declared an uploaded file to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadSource {
    Income,
    Expenses,
    Both,
}

impl UploadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expenses => "expenses",
            Self::Both => "both",
        }
    }

    /// Transaction type stamped on every row of a file with this source.
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Self::Income => TransactionType::Income,
            Self::Expenses => TransactionType::Expense,
            Self::Both => TransactionType::Uncategorized,
        }
    }
}

impl FromStr for UploadSource {
    type Err = SchedcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expenses" => Ok(Self::Expenses),
            "both" => Ok(Self::Both),
            other => Err(SchedcError::InvalidSource(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Income,
    Expense,
    Refund,
    Uncategorized,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Refund => "refund",
            Self::Uncategorized => "uncategorized",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = SchedcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "refund" => Ok(Self::Refund),
            "uncategorized" => Ok(Self::Uncategorized),
            other => Err(SchedcError::InvalidTransactionType(other.to_string())),
        }
    }
}

/// Which path last wrote a transaction's classification fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifiedBy {
    Manual,
    Rule,
    Classifier,
}

impl ClassifiedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Rule => "rule",
            Self::Classifier => "classifier",
        }
    }
}

impl FromStr for ClassifiedBy {
    type Err = SchedcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "rule" => Ok(Self::Rule),
            "classifier" => Ok(Self::Classifier),
            other => Err(SchedcError::Other(format!("Unknown classification source: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One bank or card statement row after parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTransaction {
    pub id: String,
    pub date: NaiveDate,
    pub vendor: String,
    /// Positive = money leaving the account, negative = money entering.
    pub amount: f64,
    pub card: String,
    pub category: String,
    pub purpose: String,
    pub expensable: bool,
    pub transaction_type: TransactionType,
    pub source_file: String,
    pub schedule_c_line: i32,
    pub is_business: bool,
    pub classified_by: Option<ClassifiedBy>,
}

impl CanonicalTransaction {
    /// A fresh record with upload context filled in and everything else defaulted.
    /// Parsers fill in date, vendor and amount.
    pub fn shell(source_file: &str, card: &str, transaction_type: TransactionType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date: NaiveDate::default(),
            vendor: String::new(),
            amount: 0.0,
            card: card.to_string(),
            category: UNCATEGORIZED.to_string(),
            purpose: String::new(),
            expensable: false,
            transaction_type,
            source_file: source_file.to_string(),
            schedule_c_line: 0,
            is_business: false,
            classified_by: None,
        }
    }

    /// Only positive-amount expenses start out expensable.
    pub fn default_expensable(&self) -> bool {
        self.amount > 0.0 && self.transaction_type == TransactionType::Expense
    }

    pub fn is_uncategorized(&self) -> bool {
        self.category.is_empty() || self.category == UNCATEGORIZED
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadBatch {
    pub id: String,
    pub filename: String,
    pub source: UploadSource,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VendorRule {
    pub id: Option<i64>,
    pub vendor: String,
    pub transaction_type: TransactionType,
    pub expensable: bool,
    pub category: String,
    pub schedule_c_line: i32,
}

#[derive(Debug, Clone)]
pub struct ScheduleCCategory {
    pub name: String,
    pub line_number: i32,
    pub description: String,
}

/// What the classifier is asked about for one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyRequest {
    pub id: String,
    pub vendor: String,
    pub amount: f64,
    pub description: String,
}

impl From<&CanonicalTransaction> for ClassifyRequest {
    fn from(tx: &CanonicalTransaction) -> Self {
        Self {
            id: tx.id.clone(),
            vendor: tx.vendor.clone(),
            amount: tx.amount,
            description: tx.purpose.clone(),
        }
    }
}

/// Classifier answer for one transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Classification {
    pub category: String,
    pub schedule_c_line: i32,
    pub expensable: bool,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub confidence: f64,
}

impl Classification {
    /// Coerce an out-of-range line to "Other business expenses". `expensable` is left alone.
    pub fn validated(mut self) -> Self {
        if !(8..=27).contains(&self.schedule_c_line) {
            tracing::warn!(
                line = self.schedule_c_line,
                category = %self.category,
                "invalid schedule_c_line, converting to line 27"
            );
            self.schedule_c_line = OTHER_EXPENSES_LINE;
            self.category = OTHER_EXPENSES_CATEGORY.to_string();
        }
        self
    }
}

/// A user edit. `None` leaves the stored field as it is.
#[derive(Debug, Clone, Default)]
pub struct ManualClassification {
    pub category: Option<String>,
    pub purpose: Option<String>,
    pub expensable: Option<bool>,
    pub schedule_c_line: Option<i32>,
}

/// The single row of vehicle and home-office inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct DeductionData {
    pub business_miles: i64,
    pub home_office_sqft: i64,
    pub total_home_sqft: i64,
    pub use_simplified: bool,
    pub updated_at: Option<String>,
}

impl Default for DeductionData {
    fn default() -> Self {
        Self {
            business_miles: 0,
            home_office_sqft: 0,
            total_home_sqft: 0,
            use_simplified: true,
            updated_at: None,
        }
    }
}
