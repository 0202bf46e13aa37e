use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path, split_command};

use super::open_db;

pub fn run(data_dir: Option<String>, classifier_cmd: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(cmd) = classifier_cmd {
        settings.classifier_command = split_command(&cmd);
    }
    save_settings(&settings)?;

    let conn = open_db(&settings)?;
    let categories: i64 =
        conn.query_row("SELECT count(*) FROM schedule_c_categories", [], |row| row.get(0))?;

    println!("Initialized schedc at {}", settings.data_path().display());
    println!("{categories} Schedule C categories available");
    if settings.classifier_command.is_empty() {
        println!("No classifier configured; set one with --classifier-cmd or SCHEDC_CLASSIFIER_CMD.");
    } else {
        println!("Classifier: {}", settings.classifier_command.join(" "));
    }
    Ok(())
}
