// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use moviehub::{Config, MovieHub};

mod cli;
use cli::{AuthCommand, BookmarksCommand, CatalogCommand, CommandContext, OutputFormat};

fn cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser)]
#[command(name = "moviehub")]
#[command(about = "Command-line client for the MovieHub streaming API")]
#[command(version)]
#[command(styles = cargo_style())]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging to file (moviehub_debug.log)
    #[arg(long, global = true)]
    debug_log: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: String,

    /// API base URL (overrides config and MOVIEHUB_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create a new account
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: Option<String>,
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Sign out and forget stored credentials
    Logout,

    /// Show the signed-in user (confirms the session with the server)
    Whoami,

    /// Request a password reset email
    ForgotPassword {
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password using a reset token
    ResetPassword {
        #[arg(short, long)]
        token: String,
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Verify an email address
    Verify {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        token: String,
    },

    /// Update the signed-in user's profile
    Profile {
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        /// Avatar image URL
        #[arg(short, long)]
        avatar: Option<String>,
    },

    /// List movie categories
    Categories,

    /// Page through the whole movie library
    Library {
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },

    /// List movies in one or more categories
    Movies {
        /// Category id (repeatable)
        #[arg(short, long = "category", required = true)]
        categories: Vec<String>,
    },

    /// Show a single movie
    Movie { id: String },

    /// Show a series and its movies
    Series { id: String },

    /// List all series, optionally filtered by name
    SeriesList {
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Search movies by title
    Search { query: String },

    /// Every category with its movies
    Browse {
        /// Movies shown per category
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Manage bookmarked movies
    #[command(subcommand)]
    Bookmarks(BookmarksSubcommand),
}

#[derive(Subcommand)]
enum BookmarksSubcommand {
    /// List bookmarks
    List,
    /// Bookmark a movie
    Add { movie_id: String },
    /// Remove a bookmark
    Remove { movie_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    if cli.debug_log {
        let file = File::create("moviehub_debug.log")?;
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_level(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                EnvFilter::from_default_env()
                    .add_directive("moviehub=debug".parse()?)
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env()
                    .add_directive(tracing::Level::DEBUG.into())
                    .add_directive("hyper_util=error".parse()?),
            )
            .init();
    } else if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                EnvFilter::from_default_env().add_directive("hyper_util=error".parse()?),
            )
            .init();
    }

    let format = OutputFormat::from_str(&cli.format)?;

    let mut config = Config::load_or_default(Config::default_path()).with_env_overrides();
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    tracing::debug!("Using API at {}", config.api.base_url);

    let hub = Arc::new(MovieHub::from_config(config)?);
    let context = CommandContext::new(hub.clone(), format);

    let outcome = run(cli.command, context).await;
    hub.persist_after(outcome)
}

async fn run(command: Commands, context: CommandContext) -> Result<()> {
    match command {
        Commands::Login { email, password } => {
            AuthCommand::Login { email, password }.execute(context).await
        }
        Commands::Register {
            email,
            password,
            confirm_password,
        } => {
            AuthCommand::Register {
                email,
                password,
                confirm_password,
            }
            .execute(context)
            .await
        }
        Commands::Logout => AuthCommand::Logout.execute(context).await,
        Commands::Whoami => AuthCommand::WhoAmI.execute(context).await,
        Commands::ForgotPassword { email } => {
            AuthCommand::ForgotPassword { email }.execute(context).await
        }
        Commands::ResetPassword { token, password } => {
            AuthCommand::ResetPassword { token, password }
                .execute(context)
                .await
        }
        Commands::Verify { email, token } => {
            AuthCommand::Verify { email, token }.execute(context).await
        }
        Commands::Profile {
            username,
            email,
            avatar,
        } => {
            AuthCommand::UpdateProfile {
                username,
                email,
                avatar,
            }
            .execute(context)
            .await
        }

        Commands::Categories => CatalogCommand::Categories.execute(context).await,
        Commands::Library { page, per_page } => {
            CatalogCommand::Library { page, per_page }.execute(context).await
        }
        Commands::Movies { categories } => {
            CatalogCommand::Movies { categories }.execute(context).await
        }
        Commands::Movie { id } => CatalogCommand::Movie { id }.execute(context).await,
        Commands::Series { id } => CatalogCommand::Series { id }.execute(context).await,
        Commands::SeriesList { search } => {
            CatalogCommand::SeriesList { search }.execute(context).await
        }
        Commands::Search { query } => CatalogCommand::Search { query }.execute(context).await,
        Commands::Browse { limit } => CatalogCommand::Browse { limit }.execute(context).await,

        Commands::Bookmarks(subcommand) => {
            let cmd = match subcommand {
                BookmarksSubcommand::List => BookmarksCommand::List,
                BookmarksSubcommand::Add { movie_id } => BookmarksCommand::Add { movie_id },
                BookmarksSubcommand::Remove { movie_id } => BookmarksCommand::Remove { movie_id },
            };
            cmd.execute(context).await
        }
    }
}
