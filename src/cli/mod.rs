pub mod accounts;
pub mod categories;
pub mod categorize;
pub mod import;
pub mod init;
pub mod report;
pub mod rules;

use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::pipeline::RunSummary;

#[derive(Parser)]
#[command(
    name = "fintrack",
    about = "Bank-statement import, dedup, and AI-assisted categorization."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Set up fintrack: choose a data directory and initialize the database.
    Init {
        /// Path for fintrack data (default: ~/Documents/fintrack)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Manage accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
    /// Manage the category taxonomy.
    Categories {
        #[command(subcommand)]
        command: CategoriesCommands,
    },
    /// Manage categorization rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Import a statement CSV and run the categorization pipeline.
    Import {
        /// Path to the CSV file
        file: String,
        /// Account name to import into
        #[arg(long)]
        account: String,
        /// Also send uncategorized records to the AI classifier
        #[arg(long)]
        ai: bool,
    },
    /// Re-run categorization over stored unresolved transactions.
    Categorize {
        /// Also send uncategorized records to the AI classifier
        #[arg(long)]
        ai: bool,
    },
    /// Generate reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
pub enum AccountsCommands {
    /// Add a new account.
    Add {
        /// Account name, e.g. 'chk-01'
        name: String,
        /// Institution name
        #[arg(long)]
        institution: Option<String>,
    },
    /// List all accounts.
    List,
}

#[derive(Subcommand)]
pub enum CategoriesCommands {
    /// List the category taxonomy.
    List,
    /// Add a category to the taxonomy.
    Add {
        /// Category name
        name: String,
        /// Short description
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// Add a categorization rule.
    Add {
        /// Pattern to match against transaction descriptions
        pattern: String,
        /// Category name to assign
        #[arg(long)]
        category: String,
        /// Match type: contains, starts_with, regex
        #[arg(long = "match-type", default_value = "contains")]
        match_type: String,
        /// Confidence assigned to matches, in [0,1]
        #[arg(long, default_value = "1.0")]
        confidence: f64,
        /// Rule priority (higher wins)
        #[arg(long, default_value = "0")]
        priority: i64,
    },
    /// List all categorization rules.
    List,
    /// Delete (deactivate) a rule by ID.
    Delete {
        /// Rule ID (shown in `fintrack rules list`)
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Per-category totals.
    Summary {
        /// Year filter: YYYY (default: current year)
        #[arg(long)]
        year: Option<i32>,
        /// Month filter: 1-12 (requires --year)
        #[arg(long)]
        month: Option<u32>,
    },
    /// Monthly spending with a cumulative column.
    Cumulative {
        #[arg(long)]
        year: Option<i32>,
    },
    /// Transactions still awaiting a category.
    Unresolved,
}

pub(crate) fn print_run_summary(summary: &RunSummary) {
    println!(
        "{} admitted, {} duplicates skipped",
        summary.admitted.to_string().green(),
        summary.duplicates
    );
    println!(
        "{} by rule, {} by AI, {} unresolved",
        summary.rule_matched, summary.ai_matched, summary.unresolved
    );
    if summary.skipped_rows() > 0 {
        println!(
            "{}",
            format!(
                "{} rows skipped ({} malformed dates, {} malformed amounts)",
                summary.skipped_rows(),
                summary.malformed_dates,
                summary.malformed_amounts
            )
            .yellow()
        );
    }
    if summary.ai_incomplete_batches > 0 || summary.ai_dropped > 0 {
        println!(
            "{}",
            format!(
                "AI: {} batch(es) incomplete after retries, {} response entries dropped",
                summary.ai_incomplete_batches, summary.ai_dropped
            )
            .yellow()
        );
    }
}
