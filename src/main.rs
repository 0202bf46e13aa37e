mod background;
mod categorizer;
mod classifier;
mod cli;
mod db;
mod error;
mod fmt;
mod importer;
mod models;
mod normalize;
mod reports;
mod settings;
mod store;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{
    BusinessCommands, Cli, Commands, DeductionsCommands, ReportCommands, RulesCommands,
};

fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            classifier_cmd,
        } => cli::init::run(data_dir, classifier_cmd),
        Commands::Upload {
            file,
            source,
            no_categorize,
        } => cli::upload::run(&file, source, no_categorize),
        Commands::Transactions {
            transaction_type,
            card,
            category,
            search,
            business,
            min_amount,
            limit,
        } => cli::transactions::run(crate::store::TransactionFilter {
            transaction_type,
            card,
            category,
            search,
            business_only: business,
            min_amount,
            limit,
        }),
        Commands::Categorize => cli::categorize::run(),
        Commands::Classify {
            id,
            category,
            purpose,
            expensable,
            line,
        } => cli::classify::run(
            &id,
            crate::models::ManualClassification {
                category,
                purpose,
                expensable,
                schedule_c_line: line,
            },
        ),
        Commands::Business { command } => match command {
            BusinessCommands::Mark { ids, personal } => cli::business::mark(&ids, !personal),
            BusinessCommands::MarkAll {
                card,
                transaction_type,
                personal,
            } => cli::business::mark_all(card.as_deref(), transaction_type, !personal),
        },
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                vendor,
                category,
                line,
                transaction_type,
                not_expensable,
            } => cli::rules::add(&vendor, &category, line, transaction_type, !not_expensable),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Apply => cli::rules::apply(),
        },
        Commands::Deductions { command } => match command {
            DeductionsCommands::Show => cli::deductions::show(),
            DeductionsCommands::Vehicle { miles } => cli::deductions::vehicle(miles),
            DeductionsCommands::HomeOffice {
                sqft,
                total_sqft,
                actual,
            } => cli::deductions::home_office(sqft, total_sqft, !actual),
        },
        Commands::Report { command } => match command {
            ReportCommands::ScheduleC => cli::report::schedule_c(),
            ReportCommands::Business => cli::report::business(),
        },
        Commands::Categories => cli::categories::run(),
        Commands::FixIncome => cli::maintenance::fix_income(),
        Commands::Clear { yes } => cli::maintenance::clear(yes),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
