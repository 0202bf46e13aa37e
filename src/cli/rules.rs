use comfy_table::{Cell, Table};

use crate::categorizer::apply_vendor_rules;
use crate::error::Result;
use crate::fmt::check;
use crate::models::{TransactionType, VendorRule};
use crate::settings::load_settings;
use crate::store::Store;

use super::open_db;

pub fn add(
    vendor: &str,
    category: &str,
    line: i32,
    transaction_type: TransactionType,
    expensable: bool,
) -> Result<()> {
    let conn = open_db(&load_settings())?;
    let rule = VendorRule {
        id: None,
        vendor: vendor.to_string(),
        transaction_type,
        expensable,
        category: category.to_string(),
        schedule_c_line: line,
    };
    let id = conn.upsert_vendor_rule(&rule)?;
    println!("Saved rule {id}: '{vendor}' \u{2192} {category} (line {line})");
    Ok(())
}

pub fn list() -> Result<()> {
    let conn = open_db(&load_settings())?;
    let rules = conn.vendor_rules()?;
    if rules.is_empty() {
        println!("No vendor rules.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Vendor", "Type", "Category", "Line", "Expensable"]);
    for rule in rules {
        table.add_row(vec![
            Cell::new(rule.id.unwrap_or_default()),
            Cell::new(rule.vendor),
            Cell::new(rule.transaction_type),
            Cell::new(rule.category),
            Cell::new(rule.schedule_c_line),
            Cell::new(check(rule.expensable)),
        ]);
    }
    println!("Vendor rules\n{table}");
    Ok(())
}

pub fn apply() -> Result<()> {
    let conn = open_db(&load_settings())?;
    let applied = apply_vendor_rules(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["Vendor", "Updated"]);
    let mut total = 0;
    for a in &applied {
        total += a.updated;
        table.add_row(vec![Cell::new(&a.vendor), Cell::new(a.updated)]);
    }
    println!("Rules applied\n{table}");
    println!("{total} transaction(s) updated");
    Ok(())
}
