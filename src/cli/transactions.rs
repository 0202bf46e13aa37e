use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::{check, money, statement_amount};
use crate::reports;
use crate::settings::load_settings;
use crate::store::TransactionFilter;

use super::open_db;

pub fn run(filter: TransactionFilter) -> Result<()> {
    let conn = open_db(&load_settings())?;
    let listing = reports::list_transactions(&conn, &filter)?;

    if listing.transactions.is_empty() {
        println!("No transactions found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID", "Date", "Vendor", "Amount", "Type", "Category", "Line", "Business", "Expensable", "Card",
    ]);
    for tx in &listing.transactions {
        let line = if tx.schedule_c_line > 0 {
            tx.schedule_c_line.to_string()
        } else {
            String::new()
        };
        let category = if tx.is_uncategorized() {
            tx.category.yellow().to_string()
        } else {
            tx.category.clone()
        };
        table.add_row(vec![
            Cell::new(&tx.id),
            Cell::new(tx.date),
            Cell::new(&tx.vendor),
            Cell::new(statement_amount(tx.amount)),
            Cell::new(tx.transaction_type),
            Cell::new(category),
            Cell::new(line),
            Cell::new(check(tx.is_business)),
            Cell::new(check(tx.expensable)),
            Cell::new(&tx.card),
        ]);
    }
    println!("Transactions\n{table}");

    let s = &listing.summary;
    println!(
        "{} {} ({} transactions)",
        "Income:".bold(),
        money(s.total_income),
        s.income_count
    );
    println!(
        "{} {} ({} transactions)",
        "Expenses:".bold(),
        money(s.total_expenses),
        s.expense_count
    );
    if s.refund_count > 0 {
        println!("{} {} ({} transactions)", "Refunds:".bold(), money(s.refunds), s.refund_count);
    }
    println!("{} {}", "Unique vendors:".bold(), s.unique_vendors);
    if !s.recurring_vendors.is_empty() {
        let top: Vec<String> = s
            .recurring_vendors
            .iter()
            .take(5)
            .map(|(vendor, n)| format!("{vendor} ({n})"))
            .collect();
        println!("{} {}", "Recurring:".bold(), top.join(", "));
    }
    Ok(())
}
