use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::settings::load_settings;
use crate::store::Store;

use super::open_db;

pub fn run() -> Result<()> {
    let conn = open_db(&load_settings())?;
    let mut table = Table::new();
    table.set_header(vec!["Line", "Category", "Description"]);
    for c in conn.schedule_c_categories()? {
        table.add_row(vec![
            Cell::new(c.line_number),
            Cell::new(c.name),
            Cell::new(c.description),
        ]);
    }
    println!("Schedule C categories\n{table}");
    Ok(())
}
