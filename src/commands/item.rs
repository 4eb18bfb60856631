use clap::{Args, Subcommand};
use pantry::config::Config;
use pantry_core::{ImageUpload, Item, ItemDraft, PantrySession};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::{open_session, print_items, OutputFormat};

#[derive(Args)]
pub struct ItemCommand {
    #[command(subcommand)]
    pub command: ItemSubcommand,
}

#[derive(Subcommand)]
pub enum ItemSubcommand {
    /// Add a new item
    Add {
        /// Name of the item
        name: String,

        /// Quantity on hand
        #[arg(long, short)]
        quantity: f64,

        /// Unit of measurement
        #[arg(long, short)]
        unit: String,

        /// Image file to upload with the item
        #[arg(long, short)]
        image: Option<PathBuf>,
    },

    /// List all items
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Search items by name
    Search {
        /// Case-insensitive substring of the name
        query: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Edit an item's name, quantity, or unit
    Edit {
        /// Item ID
        id: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New quantity
        #[arg(long)]
        quantity: Option<f64>,

        /// New unit
        #[arg(long)]
        unit: Option<String>,
    },

    /// Delete an item and its image
    Delete {
        /// Item ID
        id: String,

        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

impl ItemCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ItemSubcommand::Add {
                name,
                quantity,
                unit,
                image,
            } => {
                let upload = image.as_deref().map(read_image).transpose()?;

                let mut session = open_session(config).await?;
                *session.draft_mut() = ItemDraft::new(name.as_str(), *quantity, unit.as_str());
                if let Some(upload) = upload {
                    session.attach_image(upload);
                }

                let id = session.add_item().await?;
                println!("Created item: {}", id);
                Ok(())
            }

            ItemSubcommand::List { format } => {
                let session = open_session(config).await?;
                print_items(&session.items(), format)
            }

            ItemSubcommand::Search { query, format } => {
                let session = open_session(config).await?;
                print_items(&session.search(query), format)
            }

            ItemSubcommand::Edit {
                id,
                name,
                quantity,
                unit,
            } => {
                if name.is_none() && quantity.is_none() && unit.is_none() {
                    return Err("Nothing to update. Provide at least one option.".into());
                }

                let mut session = open_session(config).await?;
                let item = find_item(&session, id)?;

                session.start_editing(&item);
                if let Some(fields) = session.editing_mut() {
                    if let Some(name) = name {
                        fields.name = name.clone();
                    }
                    if let Some(quantity) = quantity {
                        fields.quantity = *quantity;
                    }
                    if let Some(unit) = unit {
                        fields.unit = unit.clone();
                    }
                }
                if session.save_edit().await? {
                    println!("Updated item: {}", id);
                } else {
                    println!("Nothing to update. Values match the current item.");
                }
                Ok(())
            }

            ItemSubcommand::Delete { id, force } => {
                let session = open_session(config).await?;
                let item = find_item(&session, id)?;

                // Confirm deletion unless --force is used
                if !force {
                    print!("Delete item '{}'? [y/N] ", item.name);
                    io::stdout().flush()?;

                    let mut input = String::new();
                    io::stdin().read_line(&mut input)?;

                    if !input.trim().eq_ignore_ascii_case("y") {
                        println!("Deletion cancelled.");
                        return Ok(());
                    }
                }

                session.delete_item(&item.id, &item.image_url).await?;
                println!("Deleted item: {}", item.name);
                Ok(())
            }
        }
    }
}

fn find_item(session: &PantrySession, id: &str) -> Result<Item, Box<dyn std::error::Error>> {
    session
        .sync()
        .find(id)
        .ok_or_else(|| format!("Item not found: {}", id).into())
}

/// Reads an image file into an upload, keeping only its file name.
fn read_image(path: &Path) -> Result<ImageUpload, Box<dyn std::error::Error>> {
    let bytes = std::fs::read(path)
        .map_err(|e| format!("Failed to read image '{}': {}", path.display(), e))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());

    let upload = ImageUpload::new(filename, bytes);
    Ok(match image_content_type(path) {
        Some(content_type) => upload.with_content_type(content_type),
        None => upload,
    })
}

fn image_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
