use crate::categorizer::classify_manually;
use crate::error::{Result, SchedcError};
use crate::fmt::money;
use crate::models::ManualClassification;
use crate::settings::load_settings;

use super::open_db;

pub fn run(id: &str, edit: ManualClassification) -> Result<()> {
    if edit.category.is_none()
        && edit.purpose.is_none()
        && edit.expensable.is_none()
        && edit.schedule_c_line.is_none()
    {
        return Err(SchedcError::Other(
            "nothing to change: pass --category, --purpose, --expensable, or --line".to_string(),
        ));
    }

    let conn = open_db(&load_settings())?;
    let tx = classify_manually(&conn, id, &edit)?;
    println!(
        "{} {} {} \u{2192} {} (line {}, expensable: {})",
        tx.date,
        tx.vendor,
        money(tx.amount),
        tx.category,
        tx.schedule_c_line,
        tx.expensable
    );
    Ok(())
}
