use crate::error::Result;
use crate::models::TransactionType;
use crate::settings::load_settings;
use crate::store::Store;

use super::open_db;

fn label(is_business: bool) -> &'static str {
    if is_business {
        "business"
    } else {
        "personal"
    }
}

pub fn mark(ids: &[String], is_business: bool) -> Result<()> {
    let conn = open_db(&load_settings())?;
    let updated = conn.set_business(ids, is_business)?;
    println!("Marked {updated} transaction(s) as {}", label(is_business));
    if updated < ids.len() {
        println!("{} ID(s) not found", ids.len() - updated);
    }
    Ok(())
}

pub fn mark_all(
    card: Option<&str>,
    transaction_type: Option<TransactionType>,
    is_business: bool,
) -> Result<()> {
    let conn = open_db(&load_settings())?;
    let updated = conn.set_business_where(card, transaction_type, is_business)?;
    println!("Marked {updated} transaction(s) as {}", label(is_business));
    Ok(())
}
