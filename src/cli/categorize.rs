use comfy_table::{Cell, Table};

use crate::categorizer::{auto_categorize, CategorizeSummary};
use crate::error::Result;
use crate::settings::load_settings;

use super::{build_classifier, open_db};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let conn = open_db(&settings)?;
    let runtime = tokio::runtime::Runtime::new()?;
    let classifier = build_classifier(&settings, runtime.handle())?;
    if classifier.is_none() {
        println!("No classifier configured, applying vendor rules only.");
    }

    let summary = auto_categorize(&conn, classifier.as_deref())?;
    print_summary(&summary);
    Ok(())
}

pub(crate) fn print_summary(summary: &CategorizeSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Step", "Count"]);
    for (step, count) in [
        ("Matched by vendor rules", summary.rules_applied),
        ("Waiting for classification", summary.candidates),
        ("Classified", summary.classified),
        ("No answer returned", summary.missing),
        ("Failed", summary.failed),
    ] {
        table.add_row(vec![Cell::new(step), Cell::new(count)]);
    }
    println!("Categorization\n{table}");
}
