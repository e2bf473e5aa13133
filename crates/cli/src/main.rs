//! Storynest CLI - profile store and email delivery tools.
//!
//! # Usage
//!
//! ```bash
//! # List stored profile PINs
//! sn-cli profiles list
//!
//! # Print one profile as JSON
//! sn-cli profiles get 4821
//!
//! # Replace a profile
//! sn-cli profiles put 4821 --data '{"childName":"Maya","pronouns":"she"}'
//!
//! # Send a verification code through the configured provider
//! sn-cli email send-code --to parent@example.com
//! ```
//!
//! The profile document defaults to `STORYNEST_DATA_FILE`; email settings are
//! read from the same environment as the server.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sn-cli")]
#[command(author, version, about = "Storynest CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and edit stored profiles
    Profiles {
        /// Profile document path
        #[arg(
            long,
            env = "STORYNEST_DATA_FILE",
            default_value = "data/user_profiles.json"
        )]
        data_file: PathBuf,

        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Email delivery tools
    Email {
        #[command(subcommand)]
        action: EmailAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List stored profile PINs
    List,
    /// Print one profile as JSON
    Get {
        /// Profile PIN
        pin: String,
    },
    /// Replace one profile with a JSON object
    Put {
        /// Profile PIN
        pin: String,

        /// Profile JSON object
        #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
        data: Option<String>,

        /// Read the profile JSON object from a file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum EmailAction {
    /// Send a verification code email
    SendCode {
        /// Recipient address
        #[arg(short, long)]
        to: String,

        /// Code to send (6 digits); generated when omitted
        #[arg(short, long)]
        code: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env before clap reads env-backed arguments
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Profiles { data_file, action } => match action {
            ProfileAction::List => commands::profiles::list(&data_file).await?,
            ProfileAction::Get { pin } => commands::profiles::get(&data_file, &pin).await?,
            ProfileAction::Put { pin, data, file } => {
                let json = match (data, file) {
                    (Some(data), _) => data,
                    (None, Some(file)) => tokio::fs::read_to_string(file).await?,
                    (None, None) => return Err("either --data or --file is required".into()),
                };
                commands::profiles::put(&data_file, &pin, &json).await?;
            }
        },
        Commands::Email { action } => match action {
            EmailAction::SendCode { to, code } => {
                commands::email::send_code(&to, code.as_deref()).await?;
            }
        },
    }
    Ok(())
}
