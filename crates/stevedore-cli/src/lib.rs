//! Stevedore CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

/// Stevedore - declarative release deployment
#[derive(Parser, Debug)]
#[command(name = "stevedore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision a release from a document
    Create(commands::apply::ApplyArgs),
    /// Reconcile an existing release from a document
    Update(commands::apply::ApplyArgs),
    /// Tear down a release from its persisted snapshot
    Delete(commands::delete::DeleteArgs),
    /// Validate a release document without touching the cluster
    Validate(commands::validate::ValidateArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Create(args) => {
                commands::apply::run(args, stevedore_engine::Operation::Create).await
            }
            Commands::Update(args) => {
                commands::apply::run(args, stevedore_engine::Operation::Update).await
            }
            Commands::Delete(args) => commands::delete::run(args).await,
            Commands::Validate(args) => commands::validate::run(args).await,
        }
    }
}
