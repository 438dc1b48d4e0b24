//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};

use nudge_core::SignConvention;

/// Nudge - a personal finance coach that nudges before you overspend
#[derive(Parser)]
#[command(name = "nudge")]
#[command(about = "Personal finance coaching backend with insights and nudges", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "nudge.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set NUDGE_DB_KEY environment variable with your passphrase.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import transactions from a bank CSV export
    Import {
        /// User the transactions belong to
        #[arg(short, long)]
        user: String,

        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// How the file signs spending
        #[arg(long, value_enum, default_value_t = SignArg::Auto)]
        sign: SignArg,
    },

    /// List persona datasets, or load one into a user's account
    Persona {
        /// User to load the persona into (required with --name)
        #[arg(short, long, requires = "name")]
        user: Option<String>,

        /// Persona to load; lists personas when omitted
        #[arg(short, long)]
        name: Option<String>,

        /// Only load transactions on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,

        /// Only load transactions on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Fill days without transactions with synthetic rows
        #[arg(long)]
        synthesize: bool,

        /// Persona directory (defaults to the coach config)
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// Run the insight engine for a user
    Insights {
        #[arg(short, long)]
        user: String,

        /// Store insights and create nudges instead of just printing
        #[arg(long)]
        persist: bool,

        /// Print insights as JSON
        #[arg(long)]
        json: bool,

        /// Evaluate as of this date (default today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Show spending analytics and projections for a user
    Analytics {
        #[arg(short, long)]
        user: String,

        /// Evaluate as of this date (default today)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },

    /// Ask the coach a question
    Chat {
        #[arg(short, long)]
        user: String,

        /// Message to send
        message: String,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires a bearer key from NUDGE_API_KEYS.
        #[arg(long)]
        no_auth: bool,
    },
}

/// Sign convention of an imported file
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SignArg {
    /// Detect from the data
    Auto,
    /// Purchases are positive
    SpendPositive,
    /// Purchases are negative
    SpendNegative,
}

impl From<SignArg> for SignConvention {
    fn from(arg: SignArg) -> Self {
        match arg {
            SignArg::Auto => SignConvention::Auto,
            SignArg::SpendPositive => SignConvention::SpendPositive,
            SignArg::SpendNegative => SignConvention::SpendNegative,
        }
    }
}
