use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::background::spawn_auto_categorize;
use crate::error::Result;
use crate::importer::{import_upload, validate_upload};
use crate::models::UploadSource;
use crate::settings::load_settings;

use super::categorize::print_summary;
use super::{build_classifier, open_db};

pub fn run(file: &str, source: UploadSource, no_categorize: bool) -> Result<()> {
    let settings = load_settings();
    let path = Path::new(file);
    let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or(file);

    // Refuse oversized files before reading them into memory.
    validate_upload(filename, std::fs::metadata(path)?.len() as usize)?;
    let content = std::fs::read(path)?;

    let conn = open_db(&settings)?;
    let outcome = import_upload(&conn, &content, source, filename)?;

    let mut table = Table::new();
    table.set_header(vec!["", ""]);
    table.add_row(vec![Cell::new("Format"), Cell::new(outcome.format.name())]);
    table.add_row(vec![Cell::new("Source"), Cell::new(source.as_str())]);
    table.add_row(vec![Cell::new("Transactions parsed"), Cell::new(outcome.parsed_count)]);
    table.add_row(vec![Cell::new("Stored"), Cell::new(outcome.stored)]);
    table.add_row(vec![Cell::new("Payments excluded"), Cell::new(outcome.payments_excluded)]);
    table.add_row(vec![Cell::new("Rows skipped"), Cell::new(outcome.skipped_rows)]);
    println!("Uploaded {filename}\n{table}");
    println!("File ID: {}", outcome.file_id);
    if outcome.failed_inserts > 0 {
        println!(
            "{}",
            format!("{} transactions could not be stored", outcome.failed_inserts).red()
        );
    }

    if no_categorize || outcome.stored == 0 {
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let classifier = build_classifier(&settings, runtime.handle())?;
    let job = spawn_auto_categorize(runtime.handle(), settings.db_path(), classifier);
    println!("Auto-categorization running in the background...");

    // The runtime dies with the process, so let the job finish first.
    if let Some(summary) = job.wait(runtime.handle()) {
        print_summary(&summary);
    }
    Ok(())
}
