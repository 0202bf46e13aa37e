use crate::error::{Result, SchedcError};
use crate::settings::load_settings;
use crate::store::Store;

use super::open_db;

pub fn fix_income() -> Result<()> {
    let conn = open_db(&load_settings())?;
    let updated = conn.convert_income_to_expense()?;
    tracing::info!(updated, "converted income transactions to expenses");
    println!("Converted {updated} income transaction(s) to expenses");
    Ok(())
}

pub fn clear(yes: bool) -> Result<()> {
    if !yes {
        return Err(SchedcError::Other(
            "this deletes all uploaded data; re-run with --yes to confirm".to_string(),
        ));
    }
    let conn = open_db(&load_settings())?;
    for (table, deleted) in conn.clear_all()? {
        println!("{table}: {deleted} deleted");
    }
    Ok(())
}
