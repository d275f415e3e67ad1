//! usertax command line
//!
//! Maintenance tasks against an on-disk user taxonomy store.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;
mod error;
mod formatter;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use formatter::OutputFormat;

/// usertax command line
#[derive(Parser, Debug)]
#[command(name = "usertax")]
#[command(version, about = "Maintenance tool for user taxonomy stores")]
pub struct Args {
    /// Data directory
    #[arg(short = 'd', long, default_value = "./usertax_data")]
    pub data: PathBuf,

    /// JSON file with the taxonomy definitions to register
    #[arg(short = 't', long)]
    pub taxonomies: PathBuf,

    /// Installation-wide table prefix
    #[arg(long, default_value = "wp_")]
    pub prefix: String,

    /// Blog the tables belong to
    #[arg(long, default_value_t = 1)]
    pub blog_id: u64,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    /// Disable profile field synchronization
    #[arg(long)]
    pub no_sync: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Recompute the usage counts of a taxonomy's terms
    Recount { taxonomy: String },

    /// List the terms of a user taxonomy
    Terms {
        taxonomy: String,
        /// Print the terms as a tree
        #[arg(long)]
        tree: bool,
    },

    /// Create a term
    AddTerm {
        taxonomy: String,
        name: String,
        #[arg(long)]
        slug: Option<String>,
        /// Parent term id
        #[arg(long, default_value_t = 0)]
        parent: u64,
    },

    /// Register a user account
    AddUser { user_id: u64, login: String },

    /// Replace a user's terms and mirror them into synced profile fields
    SetTerms {
        user_id: u64,
        taxonomy: String,
        slugs: Vec<String>,
    },

    /// Show the terms a user holds
    UserTerms { user_id: u64, taxonomy: String },

    /// Apply a bulk action (add-<slug>, remove-<slug>, set-<slug>, unset-all)
    Bulk {
        taxonomy: String,
        action: String,
        #[arg(required = true)]
        user_ids: Vec<u64>,
    },

    /// Create a taxonomy-backed profile field
    AddField {
        name: String,
        taxonomy: String,
        /// Allow several selections
        #[arg(long)]
        multiple: bool,
        /// Keep the field and the taxonomy in sync
        #[arg(long)]
        sync: bool,
    },

    /// Save a user's value for a profile field
    SetField {
        field_id: u64,
        user_id: u64,
        /// Selected slugs; none clears the value
        slugs: Vec<String>,
    },

    /// Push every stored value of a profile field into its taxonomy
    Backfill { field_id: u64 },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "usertax=info,usertax_core=info,usertax_sync=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match commands::run(&args) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
