use std::fmt;

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::api_connection::connection::reject_in_band_error;
use crate::api_connection::endpoints::{
    GenerateRecipeRequest, GenerateRecipeResponse, DETECT_INGREDIENTS_PATH, GENERATE_RECIPE_PATH,
    PHOTO_FORM_FIELD,
};
use crate::api_connection::{ApiConnectionError, Connection};
use crate::config::ClientConfig;
use crate::photo::PhotoUpload;
use crate::session::BusyFlag;

/// What the user handed in for one attempt.
#[derive(Debug, Clone)]
pub enum InputModality {
    Photo(PhotoUpload),
    Manual(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalityKind {
    Photo,
    Manual,
}

impl InputModality {
    pub fn kind(&self) -> ModalityKind {
        match self {
            InputModality::Photo(_) => ModalityKind::Photo,
            InputModality::Manual(_) => ModalityKind::Manual,
        }
    }
}

/// The two backend collaborators: ingredient detection and recipe generation.
#[async_trait]
pub trait RecipeBackend: Send + Sync {
    async fn detect_ingredients(&self, photo: &PhotoUpload) -> Result<Value, ApiConnectionError>;

    async fn generate_recipes(
        &self,
        ingredients: &str,
    ) -> Result<GenerateRecipeResponse, ApiConnectionError>;
}

#[derive(Debug, Clone)]
pub struct HttpRecipeBackend {
    connection: Connection,
}

impl HttpRecipeBackend {
    pub fn new(config: &ClientConfig, client: reqwest::Client) -> Self {
        Self {
            connection: Connection::new(client, config.backend_url.clone()),
        }
    }
}

#[async_trait]
impl RecipeBackend for HttpRecipeBackend {
    async fn detect_ingredients(&self, photo: &PhotoUpload) -> Result<Value, ApiConnectionError> {
        // Passed on as received; an in-band `{"error": ..}` becomes the empty view.
        let form = Form::new().part(PHOTO_FORM_FIELD, photo.to_part()?);
        self.connection
            .post_multipart(DETECT_INGREDIENTS_PATH, form)
            .await
    }

    async fn generate_recipes(
        &self,
        ingredients: &str,
    ) -> Result<GenerateRecipeResponse, ApiConnectionError> {
        let request = GenerateRecipeRequest {
            ingredients: ingredients.to_string(),
        };
        let payload = self
            .connection
            .post_json(GENERATE_RECIPE_PATH, &request)
            .await?;
        let payload = reject_in_band_error(payload)?;
        Ok(serde_json::from_value(payload)?)
    }
}

#[derive(Debug, Error)]
pub enum CollectionError {
    #[error("no ingredients entered")]
    EmptyInput,
    #[error("no file selected")]
    NoFile,
    #[error("no recipes found in response")]
    NoRecipes { ingredients: Vec<String> },
    #[error("ingredient detection failed: {0}")]
    Detection(#[source] ApiConnectionError),
    #[error("recipe generation failed: {0}")]
    Generation(#[source] ApiConnectionError),
}

impl CollectionError {
    pub fn notification(&self) -> Notification {
        match self {
            CollectionError::EmptyInput => Notification {
                title: "No ingredients entered",
                description: "Please enter your ingredients first.",
            },
            CollectionError::NoFile => Notification {
                title: "No file selected",
                description: "Please select an image of your ingredients first.",
            },
            CollectionError::Detection(_) => Notification {
                title: "Processing failed",
                description: "Failed to process your image. Please try again or check if the backend is running.",
            },
            // `Session` opens the empty view for `NoRecipes`; this text is for
            // callers driving a `Collector` directly.
            CollectionError::NoRecipes { .. } | CollectionError::Generation(_) => Notification {
                title: "API Error",
                description: "Failed to fetch recipe. Try again.",
            },
        }
    }
}

/// A dismissible message shown when an attempt is aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    pub title: &'static str,
    pub description: &'static str,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// What the collector hands to the results view.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectedPayload {
    /// Detection response, untouched.
    Photo(Value),
    Manual {
        ingredients: Vec<String>,
        records: Value,
    },
}

impl CollectedPayload {
    pub fn records(&self) -> &Value {
        match self {
            CollectedPayload::Photo(payload) => payload,
            CollectedPayload::Manual { records, .. } => records,
        }
    }

    pub fn manual_ingredients(&self) -> &[String] {
        match self {
            CollectedPayload::Photo(_) => &[],
            CollectedPayload::Manual { ingredients, .. } => ingredients,
        }
    }
}

pub struct Collector<B> {
    backend: B,
}

impl<B: RecipeBackend> Collector<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Sends one request for `input`. The busy flag is raised for the
    /// duration of the request only; input rejected up front never raises it.
    /// Nothing is retried.
    pub async fn collect(
        &self,
        input: InputModality,
        busy: &BusyFlag,
    ) -> Result<CollectedPayload, CollectionError> {
        match input {
            InputModality::Photo(photo) => {
                if photo.is_empty() {
                    return Err(CollectionError::NoFile);
                }
                let _busy = busy.raise();
                info!(file = photo.file_name(), bytes = photo.bytes().len(), "detecting ingredients");
                let payload = self
                    .backend
                    .detect_ingredients(&photo)
                    .await
                    .map_err(|e| {
                        warn!("Error processing image: {e}");
                        CollectionError::Detection(e)
                    })?;
                Ok(CollectedPayload::Photo(payload))
            }
            InputModality::Manual(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(CollectionError::EmptyInput);
                }
                let _busy = busy.raise();
                info!(ingredients = text, "generating recipes");
                let response = self.backend.generate_recipes(text).await.map_err(|e| {
                    warn!("API Error: {e}");
                    CollectionError::Generation(e)
                })?;
                let ingredients = split_ingredients(text);
                match response.recipes {
                    Some(recipes) if !recipes.is_empty() => Ok(CollectedPayload::Manual {
                        ingredients,
                        records: Value::Array(recipes),
                    }),
                    _ => Err(CollectionError::NoRecipes { ingredients }),
                }
            }
        }
    }
}

/// Splits the free-text entry on commas for the results header. The text
/// itself is sent to the backend unsplit.
pub fn split_ingredients(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
