use clap::{Args, Subcommand};
use pantry::config::Config;

use super::OutputFormat;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("server_url: {}", config.server_url.value);
                        println!("  source: {}", config.server_url.source);
                        println!();

                        println!("database_path: {}", config.database_path.value.display());
                        println!("  source: {}", config.database_path.source);
                        println!("blob_dir: {}", config.blob_dir.value.display());
                        println!("  source: {}", config.blob_dir.source);
                        println!("public_url: {}", config.public_url.value);
                        println!("  source: {}", config.public_url.source);
                        println!("port: {}", config.port.value);
                        println!("  source: {}", config.port.source);
                        println!("max_upload_bytes: {}", config.max_upload_bytes.value);
                        println!("  source: {}", config.max_upload_bytes.source);
                        println!();

                        println!("recipe:");
                        println!("  api_url: {}", config.recipe.api_url);
                        println!("  model: {}", config.recipe.model);
                        println!(
                            "  api_key: {}",
                            if config.recipe.is_configured() {
                                "(set)"
                            } else {
                                "(not set)"
                            }
                        );
                    }
                }
                Ok(())
            }
        }
    }
}
