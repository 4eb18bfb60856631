//! Recipe suggestions from the current pantry contents.
//!
//! Builds a single prompt from the item names and sends it as a single-turn
//! request to a chat-completions style text generation API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PantryError, RecipeError, ValidationError};
use crate::models::Item;

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default API base URL.
pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";

/// A stateless text generation service.
#[async_trait]
pub trait RecipeService: Send + Sync {
    /// Sends `prompt` and returns the generated text.
    async fn complete(&self, prompt: &str) -> Result<String, RecipeError>;
}

/// Builds the recipe prompt from item names, comma-joined.
pub fn build_prompt(items: &[Item]) -> String {
    let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
    format!(
        "Suggest a recipe I can make using some or all of these pantry items: {}. \
         Include a title, the ingredients with amounts, and short step-by-step instructions.",
        names.join(", ")
    )
}

/// Requests one recipe suggestion for `items`.
///
/// No retry and no timeout beyond the service client's own.
pub async fn suggest_recipe(
    service: &dyn RecipeService,
    items: &[Item],
) -> Result<String, PantryError> {
    if items.is_empty() {
        return Err(ValidationError::NoItems.into());
    }
    let prompt = build_prompt(items);
    tracing::debug!("Requesting recipe for {} item(s)", items.len());
    Ok(service.complete(&prompt).await?)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, RecipeError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(RecipeError::EmptyResponse)
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    api_url: String,
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl ChatCompletionsClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_url.trim_end_matches('/'))
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

#[async_trait]
impl RecipeService for ChatCompletionsClient {
    async fn complete(&self, prompt: &str) -> Result<String, RecipeError> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| RecipeError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecipeError::Status(status.as_u16(), body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| RecipeError::Http(e.to_string()))?;

        body.into_text()
    }
}
