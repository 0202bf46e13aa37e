use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::money;
use crate::reports::{self, line_label};
use crate::settings::load_settings;

use super::open_db;

fn net_cell(net: f64) -> Cell {
    if net >= 0.0 {
        Cell::new(money(net).green().bold())
    } else {
        Cell::new(money(net).red().bold())
    }
}

pub fn schedule_c() -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let report = reports::schedule_c_summary(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["Line", "Description", "Amount"]);
    table.add_row(vec![
        Cell::new(1),
        Cell::new(line_label(1)),
        Cell::new(money(report.gross_receipts)),
    ]);
    for item in &report.lines {
        table.add_row(vec![
            Cell::new(item.line),
            Cell::new(item.label),
            Cell::new(money(item.amount)),
        ]);
    }
    table.add_row(vec![
        Cell::new(28),
        Cell::new(line_label(28).bold()),
        Cell::new(money(report.total_expenses).bold()),
    ]);
    table.add_row(vec![
        Cell::new(30),
        Cell::new(line_label(30)),
        Cell::new(money(report.home_office)),
    ]);
    table.add_row(vec![
        Cell::new(31),
        Cell::new(line_label(31).bold()),
        net_cell(report.net_profit),
    ]);
    println!("Schedule C ({})\n{table}", settings.tax_year);

    if report.vehicle_deduction > 0.0 {
        println!("Line 9 includes {} mileage deduction", money(report.vehicle_deduction));
    }
    println!(
        "{} income, {} expense, {} uncategorized transactions",
        report.income_count, report.expense_count, report.uncategorized_count
    );
    if report.uncategorized_count > 0 {
        println!(
            "{}",
            "Run `schedc categorize` to classify the remaining transactions.".yellow()
        );
    }
    Ok(())
}

pub fn business() -> Result<()> {
    let conn = open_db(&load_settings())?;
    let summary = reports::business_summary(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["Line", "Description", "Amount"]);
    for item in &summary.lines {
        table.add_row(vec![
            Cell::new(item.line),
            Cell::new(item.label),
            Cell::new(money(item.amount)),
        ]);
    }
    table.add_row(vec![
        Cell::new(""),
        Cell::new("Business expenses".bold()),
        Cell::new(money(summary.business_expenses).bold()),
    ]);
    table.add_row(vec![
        Cell::new(""),
        Cell::new("Business income".bold()),
        Cell::new(money(summary.business_income).bold()),
    ]);
    table.add_row(vec![Cell::new(""), Cell::new("NET".bold()), net_cell(summary.net)]);
    println!("Business summary\n{table}");
    println!(
        "{} business expense transactions, {} personal",
        summary.business_expense_count, summary.personal_count
    );
    Ok(())
}
