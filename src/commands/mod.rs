mod config_cmd;
mod item;
mod recipe;
mod reconcile;
mod watch;

pub use config_cmd::ConfigCommand;
pub use item::ItemCommand;
pub use recipe::RecipeCommand;
pub use reconcile::ReconcileCommand;
pub use watch::WatchCommand;

use clap::ValueEnum;
use pantry::config::Config;
use pantry::remote::{HttpBlobStore, HttpDocumentStore};
use pantry_core::{ChatCompletionsClient, Item, ItemSync, PantrySession, RecipeService};
use std::sync::Arc;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Builds the sync core against the configured server.
pub fn connect(config: &Config) -> Arc<ItemSync> {
    let server_url = &config.server_url.value;
    Arc::new(ItemSync::new(
        Arc::new(HttpDocumentStore::new(server_url)),
        Arc::new(HttpBlobStore::new(server_url)),
    ))
}

/// Recipe client, if an API key is configured.
pub fn recipe_service(config: &Config) -> Option<Arc<dyn RecipeService>> {
    if !config.recipe.is_configured() {
        return None;
    }
    let api_key = config.recipe.api_key.clone().unwrap_or_default();
    let client = ChatCompletionsClient::new(config.recipe.api_url.clone(), api_key)
        .with_model(config.recipe.model.clone());
    Some(Arc::new(client))
}

/// Opens a session and waits for the first snapshot of the collection.
pub async fn open_session(config: &Config) -> Result<PantrySession, Box<dyn std::error::Error>> {
    let sync = connect(config);
    sync.activate().await?;
    sync.wait_for_snapshot().await?;
    Ok(PantrySession::new(sync, recipe_service(config)))
}

/// Prints items as a table, or as JSON.
pub fn print_items(items: &[Item], format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items)?);
        }
        OutputFormat::Text => {
            if items.is_empty() {
                println!("No items found");
                return Ok(());
            }
            println!("{:<32}  {:<30}  {:>10}  UNIT", "ID", "NAME", "QUANTITY");
            println!("{}", "-".repeat(86));
            for item in items {
                let name = if item.name.chars().count() > 30 {
                    format!("{}...", item.name.chars().take(27).collect::<String>())
                } else {
                    item.name.clone()
                };
                println!(
                    "{:<32}  {:<30}  {:>10}  {}",
                    item.id, name, item.quantity, item.unit
                );
            }
            println!("\nTotal: {} item(s)", items.len());
        }
    }
    Ok(())
}
