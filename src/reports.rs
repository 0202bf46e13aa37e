use std::collections::HashMap;

use crate::error::{Result, SchedcError};
use crate::models::{CanonicalTransaction, DeductionData, TransactionType};
use crate::store::{LineScope, LineTotal, Store, TransactionFilter};

/// 2024 IRS standard mileage rate, dollars per mile.
pub const MILEAGE_RATE: f64 = 0.67;
pub const HOME_OFFICE_RATE: f64 = 5.0;
pub const HOME_OFFICE_MAX_SQFT: i64 = 300;

pub const VEHICLE_LINE: i32 = 9;

/// Form label for a Schedule C line number.
pub fn line_label(line: i32) -> &'static str {
    match line {
        1 => "Gross receipts",
        8 => "Advertising",
        9 => "Car and truck expenses",
        10 => "Commissions and fees",
        11 => "Contract labor",
        12 => "Depletion",
        13 => "Depreciation",
        14 => "Employee benefit programs",
        15 => "Insurance",
        16 => "Interest",
        17 => "Legal and professional services",
        18 => "Office expense",
        19 => "Pension and profit-sharing plans",
        20 => "Rent or lease",
        21 => "Repairs and maintenance",
        22 => "Supplies",
        23 => "Taxes and licenses",
        24 => "Travel and meals",
        25 => "Utilities",
        26 => "Wages",
        27 => "Other expenses",
        28 => "Total expenses",
        30 => "Business use of home",
        31 => "Net profit or (loss)",
        _ => "Unknown line",
    }
}

// ---------------------------------------------------------------------------
// Deductions
// ---------------------------------------------------------------------------

pub fn vehicle_deduction(business_miles: i64) -> f64 {
    business_miles as f64 * MILEAGE_RATE
}

/// Simplified method only; the actual-expense method needs home costs this
/// tool does not track, so it yields 0.
pub fn home_office_deduction(data: &DeductionData) -> f64 {
    if data.use_simplified {
        data.home_office_sqft.min(HOME_OFFICE_MAX_SQFT) as f64 * HOME_OFFICE_RATE
    } else {
        0.0
    }
}

pub fn business_use_pct(data: &DeductionData) -> Option<f64> {
    (data.total_home_sqft > 0)
        .then(|| data.home_office_sqft as f64 / data.total_home_sqft as f64 * 100.0)
}

pub struct DeductionSummary {
    pub data: DeductionData,
    pub vehicle: f64,
    pub home_office: f64,
    pub method: String,
}

impl DeductionSummary {
    fn from_data(data: DeductionData) -> Self {
        let method = if data.use_simplified {
            format!("simplified (${HOME_OFFICE_RATE:.0}/sq ft, max {HOME_OFFICE_MAX_SQFT} sq ft)")
        } else {
            match business_use_pct(&data) {
                Some(pct) => format!("actual ({pct:.1}% of home)"),
                None => "actual".to_string(),
            }
        };
        Self {
            vehicle: vehicle_deduction(data.business_miles),
            home_office: home_office_deduction(&data),
            method,
            data,
        }
    }
}

pub fn deduction_summary(store: &dyn Store) -> Result<DeductionSummary> {
    let data = store.deductions()?.unwrap_or_default();
    Ok(DeductionSummary::from_data(data))
}

pub fn record_business_miles(store: &dyn Store, miles: i64) -> Result<DeductionSummary> {
    if miles < 0 {
        return Err(SchedcError::InvalidDeduction(format!(
            "business miles cannot be negative: {miles}"
        )));
    }
    store.save_business_miles(miles)?;
    deduction_summary(store)
}

pub fn record_home_office(
    store: &dyn Store,
    sqft: i64,
    total_sqft: i64,
    use_simplified: bool,
) -> Result<DeductionSummary> {
    if sqft < 0 || total_sqft < 0 {
        return Err(SchedcError::InvalidDeduction(
            "square footage cannot be negative".to_string(),
        ));
    }
    if !use_simplified && sqft > total_sqft {
        return Err(SchedcError::InvalidDeduction(format!(
            "office area ({sqft} sq ft) exceeds total home area ({total_sqft} sq ft)"
        )));
    }
    store.save_home_office(sqft, total_sqft, use_simplified)?;
    deduction_summary(store)
}

// ---------------------------------------------------------------------------
// Schedule C
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub line: i32,
    pub label: &'static str,
    pub amount: f64,
}

impl From<LineTotal> for LineItem {
    fn from(t: LineTotal) -> Self {
        Self {
            line: t.line,
            label: line_label(t.line),
            amount: t.total,
        }
    }
}

pub struct ScheduleCReport {
    pub gross_receipts: f64,
    /// Lines 8-27 that carry an amount, vehicle deduction folded into line 9.
    pub lines: Vec<LineItem>,
    pub vehicle_deduction: f64,
    pub total_expenses: f64,
    pub home_office: f64,
    pub net_profit: f64,
    pub income_count: i64,
    pub expense_count: i64,
    pub uncategorized_count: i64,
}

impl ScheduleCReport {
    pub fn line(&self, line: i32) -> f64 {
        self.lines
            .iter()
            .find(|l| l.line == line)
            .map(|l| l.amount)
            .unwrap_or(0.0)
    }
}

pub fn schedule_c_summary(store: &dyn Store) -> Result<ScheduleCReport> {
    let deductions = deduction_summary(store)?;
    let mut lines: Vec<LineItem> = store
        .line_totals(LineScope::Expensable)?
        .into_iter()
        .map(LineItem::from)
        .collect();

    if deductions.vehicle > 0.0 {
        match lines.iter_mut().find(|l| l.line == VEHICLE_LINE) {
            Some(item) => item.amount += deductions.vehicle,
            None => {
                lines.push(LineItem {
                    line: VEHICLE_LINE,
                    label: line_label(VEHICLE_LINE),
                    amount: deductions.vehicle,
                });
                lines.sort_by_key(|l| l.line);
            }
        }
    }

    let gross_receipts = store.business_income_total()?;
    let total_expenses: f64 = lines.iter().map(|l| l.amount).sum();
    let counts = store.transaction_counts()?;

    Ok(ScheduleCReport {
        gross_receipts,
        lines,
        vehicle_deduction: deductions.vehicle,
        total_expenses,
        home_office: deductions.home_office,
        net_profit: gross_receipts - total_expenses - deductions.home_office,
        income_count: counts.business_income,
        expense_count: counts.expensable_expense,
        uncategorized_count: counts.uncategorized,
    })
}

pub struct BusinessSummary {
    pub lines: Vec<LineItem>,
    pub business_income: f64,
    pub business_expenses: f64,
    pub net: f64,
    pub business_expense_count: i64,
    pub personal_count: i64,
}

/// Every business-flagged expense by line, expensable or not.
pub fn business_summary(store: &dyn Store) -> Result<BusinessSummary> {
    let lines: Vec<LineItem> = store
        .line_totals(LineScope::Business)?
        .into_iter()
        .map(LineItem::from)
        .collect();
    let business_expenses: f64 = lines.iter().map(|l| l.amount).sum();
    let business_income = store.business_income_total()?;
    let counts = store.transaction_counts()?;
    Ok(BusinessSummary {
        lines,
        business_income,
        business_expenses,
        net: business_income - business_expenses,
        business_expense_count: counts.business_expense,
        personal_count: counts.personal,
    })
}

// ---------------------------------------------------------------------------
// Transaction listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionSummary {
    pub total_income: f64,
    pub income_count: usize,
    pub total_expenses: f64,
    pub expense_count: usize,
    pub refunds: f64,
    pub refund_count: usize,
    pub unique_vendors: usize,
    /// Vendors seen more than once, most frequent first.
    pub recurring_vendors: Vec<(String, usize)>,
}

pub fn transaction_summary(transactions: &[CanonicalTransaction]) -> TransactionSummary {
    let mut summary = TransactionSummary::default();
    let mut vendor_counts: HashMap<&str, usize> = HashMap::new();

    for tx in transactions {
        *vendor_counts.entry(tx.vendor.as_str()).or_default() += 1;
        match tx.transaction_type {
            TransactionType::Income => {
                summary.total_income += tx.amount.abs();
                summary.income_count += 1;
            }
            TransactionType::Expense if tx.amount > 0.0 => {
                summary.total_expenses += tx.amount;
                summary.expense_count += 1;
            }
            TransactionType::Expense if tx.amount < 0.0 => {
                summary.refunds += tx.amount.abs();
                summary.refund_count += 1;
            }
            _ => {}
        }
    }

    summary.unique_vendors = vendor_counts.len();
    let mut recurring: Vec<(String, usize)> = vendor_counts
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(v, n)| (v.to_string(), n))
        .collect();
    recurring.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    summary.recurring_vendors = recurring;
    summary
}

pub struct TransactionListing {
    pub transactions: Vec<CanonicalTransaction>,
    pub summary: TransactionSummary,
}

pub fn list_transactions(store: &dyn Store, filter: &TransactionFilter) -> Result<TransactionListing> {
    let transactions = store.list_transactions(filter)?;
    let summary = transaction_summary(&transactions);
    Ok(TransactionListing {
        transactions,
        summary,
    })
}
