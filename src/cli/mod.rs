pub mod business;
pub mod categories;
pub mod categorize;
pub mod classify;
pub mod deductions;
pub mod init;
pub mod maintenance;
pub mod report;
pub mod rules;
pub mod transactions;
pub mod upload;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use rusqlite::Connection;

use crate::classifier::{Classifier, CommandTransport, LlmClassifier};
use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::models::{TransactionType, UploadSource};
use crate::settings::Settings;

/// Open (creating if needed) the database under the configured data dir.
pub(crate) fn open_db(settings: &Settings) -> Result<Connection> {
    std::fs::create_dir_all(settings.data_path())?;
    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    Ok(conn)
}

/// The configured LLM classifier, or `None` when no command is set.
pub(crate) fn build_classifier(
    settings: &Settings,
    handle: &tokio::runtime::Handle,
) -> Result<Option<Arc<dyn Classifier>>> {
    if settings.classifier_command.is_empty() {
        return Ok(None);
    }
    let transport = CommandTransport::new(&settings.classifier_command, handle.clone())?;
    Ok(Some(Arc::new(LlmClassifier::new(transport))))
}

#[derive(Parser)]
#[command(
    name = "schedc",
    version,
    about = "Turn bank and credit-card CSV exports into Schedule C expense totals."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for schedc data (default: ~/Documents/schedc)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Command that reads a prompt on stdin and prints a completion
        #[arg(long = "classifier-cmd")]
        classifier_cmd: Option<String>,
    },
    /// Upload a bank or credit-card CSV export.
    Upload {
        /// Path to the CSV file
        file: String,
        /// What the file holds: income, expenses, or both
        #[arg(long, default_value = "expenses")]
        source: UploadSource,
        /// Skip background auto-categorization
        #[arg(long = "no-categorize")]
        no_categorize: bool,
    },
    /// List transactions with an income/expense summary.
    Transactions {
        /// income, expense, refund, or uncategorized
        #[arg(long = "type")]
        transaction_type: Option<TransactionType>,
        #[arg(long)]
        card: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Substring of vendor, category, or purpose
        #[arg(long)]
        search: Option<String>,
        /// Only business transactions
        #[arg(long)]
        business: bool,
        /// Minimum absolute amount
        #[arg(long = "min-amount")]
        min_amount: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Apply vendor rules, then classify uncategorized business transactions.
    Categorize,
    /// Classify one transaction by hand. Manual classifications always win.
    Classify {
        /// Transaction ID (shown in `schedc transactions`)
        id: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        purpose: Option<String>,
        #[arg(long)]
        expensable: Option<bool>,
        /// Schedule C line (8-27, or 0 to clear)
        #[arg(long)]
        line: Option<i32>,
    },
    /// Mark transactions as business or personal.
    Business {
        #[command(subcommand)]
        command: BusinessCommands,
    },
    /// Manage vendor rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Vehicle and home-office deductions.
    Deductions {
        #[command(subcommand)]
        command: DeductionsCommands,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// List the Schedule C categories the classifier may assign.
    Categories,
    /// Reclassify every income transaction as an expense.
    FixIncome,
    /// Delete all transactions, uploads, rules, and deductions.
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum BusinessCommands {
    /// Mark specific transactions.
    Mark {
        #[arg(required = true)]
        ids: Vec<String>,
        /// Mark as personal instead
        #[arg(long)]
        personal: bool,
    },
    /// Mark every transaction matching the filters.
    MarkAll {
        #[arg(long)]
        card: Option<String>,
        #[arg(long = "type")]
        transaction_type: Option<TransactionType>,
        /// Mark as personal instead
        #[arg(long)]
        personal: bool,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add or replace the rule for a vendor.
    Add {
        /// Vendor substring to match (case-insensitive)
        vendor: String,
        #[arg(long)]
        category: String,
        /// Schedule C line (8-27)
        #[arg(long)]
        line: i32,
        #[arg(long = "type", default_value = "expense")]
        transaction_type: TransactionType,
        #[arg(long = "not-expensable")]
        not_expensable: bool,
    },
    /// List vendor rules.
    List,
    /// Apply every rule to uncategorized transactions.
    Apply,
}

#[derive(Subcommand)]
pub enum DeductionsCommands {
    /// Show saved deduction data and computed amounts.
    Show,
    /// Record business miles driven.
    Vehicle { miles: i64 },
    /// Record home office square footage.
    HomeOffice {
        #[arg(long)]
        sqft: i64,
        #[arg(long = "total-sqft", default_value = "0")]
        total_sqft: i64,
        /// Use the actual-expense method instead of the simplified one
        #[arg(long)]
        actual: bool,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Schedule C line totals from expensable transactions.
    ScheduleC,
    /// Totals over every business transaction.
    Business,
}
