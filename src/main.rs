use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{ConfigCommand, ItemCommand, RecipeCommand, ReconcileCommand, WatchCommand};
use pantry::config::Config;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(version)]
#[command(about = "Track pantry items shared through a pantry server", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage pantry items
    Item(ItemCommand),

    /// Suggest a recipe from the current items
    Recipe(RecipeCommand),

    /// Print the item list every time it changes
    Watch(WatchCommand),

    /// Delete images no item refers to
    Reconcile(ReconcileCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Item(cmd)) => {
            cmd.run(&config).await?;
        }
        Some(Commands::Recipe(cmd)) => {
            cmd.run(&config).await?;
        }
        Some(Commands::Watch(cmd)) => {
            cmd.run(&config).await?;
        }
        Some(Commands::Reconcile(cmd)) => {
            cmd.run(&config).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
