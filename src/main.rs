mod ai;
mod cli;
mod db;
mod error;
mod fmt;
mod importer;
mod models;
mod normalizer;
mod pipeline;
mod reports;
mod resolver;
mod rules;
mod settings;

use clap::Parser;

use cli::{AccountsCommands, CategoriesCommands, Cli, Commands, ReportCommands, RulesCommands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add { name, institution } => {
                cli::accounts::add(&name, institution.as_deref())
            }
            AccountsCommands::List => cli::accounts::list(),
        },
        Commands::Categories { command } => match command {
            CategoriesCommands::List => cli::categories::list(),
            CategoriesCommands::Add { name, description } => {
                cli::categories::add(&name, description.as_deref())
            }
        },
        Commands::Rules { command } => match command {
            RulesCommands::Add {
                pattern,
                category,
                match_type,
                confidence,
                priority,
            } => cli::rules::add(&pattern, &category, &match_type, confidence, priority),
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Delete { id } => cli::rules::delete(id),
        },
        Commands::Import { file, account, ai } => cli::import::run(&file, &account, ai),
        Commands::Categorize { ai } => cli::categorize::run(ai),
        Commands::Report { command } => match command {
            ReportCommands::Summary { year, month } => cli::report::summary(year, month),
            ReportCommands::Cumulative { year } => cli::report::cumulative(year),
            ReportCommands::Unresolved => cli::report::unresolved(),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
