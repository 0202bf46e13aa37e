use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedcError};

pub const DB_FILE: &str = "schedc.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    #[serde(default = "default_tax_year")]
    pub tax_year: i32,
    /// argv of the completion command; empty disables the classifier.
    #[serde(default)]
    pub classifier_command: Vec<String>,
}

fn default_tax_year() -> i32 {
    2024
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            tax_year: default_tax_year(),
            classifier_command: Vec::new(),
        }
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_dir() -> PathBuf {
    match std::env::var_os("SCHEDC_CONFIG_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => home().join(".config").join("schedc"),
    }
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    home().join("Documents").join("schedc")
}

fn read_settings(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| SchedcError::Settings(format!("{}: {e}", path.display())))
}

/// Settings from disk with environment overrides applied. A missing or
/// unreadable file falls back to defaults.
pub fn load_settings() -> Settings {
    let path = settings_path();
    let mut settings = if path.exists() {
        read_settings(&path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "ignoring unreadable settings file");
            Settings::default()
        })
    } else {
        Settings::default()
    };
    apply_env_overrides(&mut settings);
    settings
}

fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(dir) = std::env::var("SCHEDC_DATA_DIR") {
        if !dir.trim().is_empty() {
            settings.data_dir = dir;
        }
    }
    if let Ok(cmd) = std::env::var("SCHEDC_CLASSIFIER_CMD") {
        settings.classifier_command = split_command(&cmd);
    }
}

pub fn split_command(cmd: &str) -> Vec<String> {
    cmd.split_whitespace().map(str::to_string).collect()
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| SchedcError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path().join(DB_FILE)
    }
}

pub fn shellexpand_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        return format!("{}{rest}", home().to_string_lossy());
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}
