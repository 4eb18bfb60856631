use clap::Args;
use pantry::config::Config;

use super::open_session;

#[derive(Args)]
pub struct RecipeCommand {}

impl RecipeCommand {
    pub async fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        if !config.recipe.is_configured() {
            return Err(pantry_core::RecipeError::NotConfigured.into());
        }

        let mut session = open_session(config).await?;
        let recipe = session.generate_recipe().await?;

        println!("{}", recipe);
        Ok(())
    }
}
