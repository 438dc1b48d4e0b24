//! Nudge CLI - Personal finance coach
//!
//! Usage:
//!   nudge init                                Initialize database
//!   nudge import --user U --file CSV          Import transactions
//!   nudge persona --user U --name student     Load a persona dataset
//!   nudge insights --user U --persist         Run the insight engine
//!   nudge serve --port 3000                   Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;
use nudge_core::{AIClient, PersonaLibrary};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Import { user, file, sign } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import(&db, &user, &file, sign.into())
        }
        Commands::Persona {
            user,
            name,
            from,
            to,
            synthesize,
            dir,
        } => {
            let config = commands::load_config()?;
            let library = match dir {
                Some(dir) => PersonaLibrary::new(dir, config.personas.seed),
                None => PersonaLibrary::from_config(&config.personas),
            };
            match (user, name) {
                (Some(user), Some(name)) => {
                    let db = commands::open_db(&cli.db, cli.no_encrypt)?;
                    let options = nudge_core::LoadOptions {
                        from,
                        to,
                        synthesize: synthesize || config.personas.synthesize_missing,
                    };
                    commands::cmd_persona_load(&db, &library, &user, &name, options)
                }
                (None, Some(_)) => anyhow::bail!("--user is required when loading a persona"),
                _ => commands::cmd_persona_list(&library),
            }
        }
        Commands::Insights {
            user,
            persist,
            json,
            as_of,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config()?;
            commands::cmd_insights(&db, &config, &user, as_of, persist, json)
        }
        Commands::Analytics { user, as_of } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config()?;
            commands::cmd_analytics(&db, &config, &user, as_of)
        }
        Commands::Chat { user, message } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_chat(&db, AIClient::from_env(), &user, &message).await
        }
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, &host, port, no_auth, cli.no_encrypt).await,
    }
}
