use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::money;
use crate::reports::{self, DeductionSummary, MILEAGE_RATE};
use crate::settings::load_settings;

use super::open_db;

fn print(summary: &DeductionSummary) {
    let d = &summary.data;
    let mut table = Table::new();
    table.set_header(vec!["Deduction", "Input", "Amount"]);
    table.add_row(vec![
        Cell::new("Vehicle (line 9)"),
        Cell::new(format!("{} mi @ ${MILEAGE_RATE}/mi", d.business_miles)),
        Cell::new(money(summary.vehicle)),
    ]);
    let area = if d.total_home_sqft > 0 {
        format!("{} of {} sq ft", d.home_office_sqft, d.total_home_sqft)
    } else {
        format!("{} sq ft", d.home_office_sqft)
    };
    table.add_row(vec![
        Cell::new("Home office (line 30)"),
        Cell::new(format!("{area}, {}", summary.method)),
        Cell::new(money(summary.home_office)),
    ]);
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(""),
        Cell::new(money(summary.vehicle + summary.home_office).bold()),
    ]);
    println!("Deductions\n{table}");
    if let Some(updated) = &d.updated_at {
        println!("Last updated {updated}");
    }
}

pub fn show() -> Result<()> {
    let conn = open_db(&load_settings())?;
    print(&reports::deduction_summary(&conn)?);
    Ok(())
}

pub fn vehicle(miles: i64) -> Result<()> {
    let conn = open_db(&load_settings())?;
    print(&reports::record_business_miles(&conn, miles)?);
    Ok(())
}

pub fn home_office(sqft: i64, total_sqft: i64, use_simplified: bool) -> Result<()> {
    let conn = open_db(&load_settings())?;
    print(&reports::record_home_office(&conn, sqft, total_sqft, use_simplified)?);
    Ok(())
}
