use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DETECT_INGREDIENTS_PATH: &str = "/detect-ingredients";
pub const GENERATE_RECIPE_PATH: &str = "/generate-recipe";
pub const SEARCH_PHOTOS_PATH: &str = "/search/photos";

/// Multipart field the detection endpoint reads the photo from.
pub const PHOTO_FORM_FIELD: &str = "file";

pub const SEARCH_ORIENTATION: &str = "landscape";

#[derive(Debug, Serialize, Clone)]
pub struct GenerateRecipeRequest {
    pub ingredients: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerateRecipeResponse {
    #[serde(default)]
    pub input: Option<String>,
    // Records stay raw here; shape checks belong to the normalizer.
    #[serde(default)]
    pub recipes: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchPhotosResponse {
    #[serde(default)]
    pub results: Vec<PhotoResult>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PhotoResult {
    #[serde(default)]
    pub urls: Option<PhotoUrls>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PhotoUrls {
    #[serde(default)]
    pub regular: Option<String>,
}

impl SearchPhotosResponse {
    /// Preview URL of the first match. Later matches are never consulted.
    pub fn first_regular_url(&self) -> Option<String> {
        self.results
            .first()
            .and_then(|result| result.urls.as_ref())
            .and_then(|urls| urls.regular.clone())
            .filter(|url| !url.is_empty())
    }
}
