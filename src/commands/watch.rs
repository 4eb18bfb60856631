use clap::Args;
use pantry::config::Config;

use super::{connect, print_items, OutputFormat};

#[derive(Args)]
pub struct WatchCommand {
    /// Only show items whose name contains this text
    #[arg(long, short)]
    search: Option<String>,
}

impl WatchCommand {
    /// Prints the item list on every change until interrupted.
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let sync = connect(config);
        let mut changes = sync.changes();
        sync.activate().await?;

        loop {
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() || !sync.is_active() {
                        break;
                    }
                    let items = match &self.search {
                        Some(query) => sync.search(query),
                        None => sync.items(),
                    };
                    println!();
                    print_items(&items, &OutputFormat::Text)?;
                }
                _ = tokio::signal::ctrl_c() => {
                    sync.deactivate();
                    return Ok(());
                }
            }
        }

        Err("Subscription closed by server".into())
    }
}
