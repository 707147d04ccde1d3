use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::api_connection::endpoints::{SearchPhotosResponse, SEARCH_ORIENTATION, SEARCH_PHOTOS_PATH};
use crate::api_connection::{ApiConnectionError, Connection};
use crate::config::{ClientConfig, UNSPLASH_KEY_ENV_VAR};
use crate::recipe::Recipe;

/// Third-party photo search keyed by free text.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    /// One search request. `Ok(None)` means the provider had no match.
    async fn search(&self, query: &str) -> Result<Option<String>, ApiConnectionError>;
}

#[derive(Debug)]
pub struct UnsplashImageSearch {
    connection: Connection,
    access_key: Option<String>,
    warned_missing_key: AtomicBool,
}

impl UnsplashImageSearch {
    pub fn new(config: &ClientConfig, client: reqwest::Client) -> Self {
        Self {
            connection: Connection::new(client, config.image_search_url.clone()),
            access_key: config.unsplash_access_key.clone(),
            warned_missing_key: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ImageSearch for UnsplashImageSearch {
    async fn search(&self, query: &str) -> Result<Option<String>, ApiConnectionError> {
        let Some(access_key) = self.access_key.as_deref() else {
            if !self.warned_missing_key.swap(true, Ordering::Relaxed) {
                warn!("{UNSPLASH_KEY_ENV_VAR} is not configured, skipping image search");
            }
            return Err(ApiConnectionError::MissingApiKey(UNSPLASH_KEY_ENV_VAR.to_string()));
        };
        let response: SearchPhotosResponse = self
            .connection
            .get_json(
                SEARCH_PHOTOS_PATH,
                &[
                    ("query", query),
                    ("client_id", access_key),
                    ("orientation", SEARCH_ORIENTATION),
                ],
            )
            .await?;
        Ok(response.first_regular_url())
    }
}

/// Resolves recipe images: the provider's answer, else the fixed fallback.
#[derive(Debug)]
pub struct ImageResolver<S> {
    search: S,
    fallback: String,
}

impl<S: ImageSearch> ImageResolver<S> {
    pub fn new(search: S, fallback: impl Into<String>) -> Self {
        Self {
            search,
            fallback: fallback.into(),
        }
    }

    pub fn search(&self) -> &S {
        &self.search
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Image for a single recipe. Lookup failures are logged and absorbed.
    pub async fn resolve(&self, recipe: &Recipe) -> String {
        let provided = match self.search.search(&recipe.title).await {
            Ok(found) => found,
            Err(ApiConnectionError::MissingApiKey(_)) => None,
            Err(e) => {
                warn!(title = %recipe.title, "Error fetching image: {e}");
                None
            }
        };
        provided.unwrap_or_else(|| {
            debug!(title = %recipe.title, "using fallback image");
            self.fallback.clone()
        })
    }

    /// Returns a new list where every recipe has an image. Lookups for the
    /// recipes that need one run concurrently; output order matches input.
    pub async fn enrich(&self, recipes: &[Recipe]) -> Vec<Recipe> {
        join_all(recipes.iter().map(|recipe| async move {
            if recipe.has_image() {
                return recipe.clone();
            }
            let url = self.resolve(recipe).await;
            recipe.clone().resolve_image(url)
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rand::Rng;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    const FALLBACK: &str = "https://placeholder.test/no-image";

    /// Answers from a fixed table after a random delay, recording each query.
    #[derive(Default)]
    struct TableSearch {
        answers: HashMap<String, Result<Option<String>, StatusCode>>,
        queries: Mutex<Vec<String>>,
    }

    impl TableSearch {
        fn with(mut self, title: &str, answer: Result<Option<&str>, StatusCode>) -> Self {
            self.answers
                .insert(title.to_string(), answer.map(|url| url.map(str::to_string)));
            self
        }
    }

    #[async_trait]
    impl ImageSearch for TableSearch {
        async fn search(&self, query: &str) -> Result<Option<String>, ApiConnectionError> {
            self.queries.lock().push(query.to_string());
            let delay = rand::thread_rng().gen_range(1..20);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            match self.answers.get(query).cloned().unwrap_or(Ok(None)) {
                Ok(url) => Ok(url),
                Err(status) => Err(ApiConnectionError::ApiError {
                    status,
                    error_body: "rate limited".into(),
                }),
            }
        }
    }

    fn recipe(title: &str, image: Option<&str>) -> Recipe {
        let mut value = json!({
            "title": title,
            "ingredients": [],
            "steps": ["Cook"],
            "estimated_time": "10 min"
        });
        if let Some(image) = image {
            value["image"] = json!(image);
        }
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn provider_url_or_fallback_is_always_assigned() {
        let search = TableSearch::default()
            .with("Tomato Rice", Ok(Some("https://images.test/tomato-rice.jpg")))
            .with("Garlic Bread", Err(StatusCode::SERVICE_UNAVAILABLE));
        let resolver = ImageResolver::new(search, FALLBACK);

        let enriched = resolver
            .enrich(&[
                recipe("Tomato Rice", None),
                recipe("Garlic Bread", None),
                recipe("Plain Toast", None),
            ])
            .await;

        let images: Vec<Option<&str>> = enriched.iter().map(Recipe::image).collect();
        assert_eq!(
            images,
            vec![
                Some("https://images.test/tomato-rice.jpg"),
                Some(FALLBACK),
                Some(FALLBACK)
            ]
        );
    }

    #[tokio::test]
    async fn supplied_images_are_never_searched() {
        let resolver = ImageResolver::new(TableSearch::default(), FALLBACK);
        let enriched = resolver
            .enrich(&[
                recipe("Bruschetta", Some("https://backend.test/bruschetta.jpg")),
                recipe("Garlic Bread", None),
            ])
            .await;

        assert_eq!(*resolver.search().queries.lock(), vec!["Garlic Bread".to_string()]);
        assert_eq!(enriched[0].image(), Some("https://backend.test/bruschetta.jpg"));
    }

    #[tokio::test]
    async fn order_survives_out_of_order_completion() {
        let titles: Vec<String> = (0..12).map(|i| format!("Recipe {i}")).collect();
        let mut search = TableSearch::default();
        for title in &titles {
            let url = format!("https://images.test/{}.jpg", title.replace(' ', "-"));
            search.answers.insert(title.clone(), Ok(Some(url)));
        }
        let resolver = ImageResolver::new(search, FALLBACK);
        let input: Vec<Recipe> = titles.iter().map(|t| recipe(t, None)).collect();

        let enriched = resolver.enrich(&input).await;

        assert_eq!(enriched.len(), input.len());
        for (before, after) in input.iter().zip(&enriched) {
            assert_eq!(before.title, after.title);
            let expected = format!("https://images.test/{}.jpg", before.title.replace(' ', "-"));
            assert_eq!(after.image(), Some(expected.as_str()));
        }
        assert_eq!(resolver.search().queries.lock().len(), titles.len());
    }

    #[tokio::test]
    async fn enrichment_leaves_input_untouched() {
        let resolver = ImageResolver::new(TableSearch::default(), FALLBACK);
        let input = vec![recipe("Garlic Bread", None)];
        let enriched = resolver.enrich(&input).await;
        assert!(!input[0].has_image());
        assert_eq!(enriched[0].image(), Some(FALLBACK));
    }

    #[tokio::test]
    async fn missing_key_resolves_to_fallback_without_request() {
        let config = ClientConfig::default().with_image_search_url("http://127.0.0.1:9");
        let search = UnsplashImageSearch::new(&config, reqwest::Client::new());
        let resolver = ImageResolver::new(search, FALLBACK);
        assert_eq!(resolver.resolve(&recipe("Garlic Bread", None)).await, FALLBACK);
    }
}
