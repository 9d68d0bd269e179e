//! Sample Depot CLI - Database migrations, seeding and management tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations (including the session table)
//! depot-cli migrate
//!
//! # Insert the shelf layout and the initial admin account
//! depot-cli seed
//!
//! # Create a user
//! depot-cli user create -n anna -r user -p "first-password"
//!
//! # Follow a running server's events
//! depot-cli watch -u http://localhost:5000 -n admin -p admin
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::CliError;

#[derive(Parser)]
#[command(name = "depot-cli")]
#[command(author, version, about = "Sample Depot CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Insert shelves and the initial admin account
    Seed {
        /// Password for the initial admin account
        #[arg(short, long, default_value = "admin")]
        password: String,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Log in and follow live events
    Watch {
        /// Server base URL
        #[arg(short, long, default_value = "http://localhost:5000")]
        url: String,

        /// User name
        #[arg(short, long)]
        name: String,

        /// Password
        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a new user
    Create {
        /// Display name (unique)
        #[arg(short, long)]
        name: String,

        /// Role (`user`, `admin`, `super`)
        #[arg(short, long, default_value = "user")]
        role: String,

        /// Initial password
        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { password } => commands::seed::run(&password).await?,
        Commands::User { action } => match action {
            UserAction::Create {
                name,
                role,
                password,
            } => {
                commands::user::create(&name, &role, &password).await?;
            }
        },
        Commands::Watch {
            url,
            name,
            password,
        } => commands::watch::run(&url, &name, &password).await?,
    }
    Ok(())
}
