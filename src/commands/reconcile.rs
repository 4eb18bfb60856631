use clap::Args;
use pantry::config::Config;

use super::connect;

#[derive(Args)]
pub struct ReconcileCommand {}

impl ReconcileCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let sync = connect(config);
        let removed = sync.reconcile().await?;

        if removed.is_empty() {
            println!("No orphaned images found");
            return Ok(());
        }

        for path in &removed {
            println!("Removed: {}", path);
        }
        println!("\nTotal: {} image(s) removed", removed.len());
        Ok(())
    }
}
