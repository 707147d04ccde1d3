use std::fmt::Write;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::warn;

use crate::api_connection::ApiConnectionError;
use crate::recipe::Recipe;
use crate::view::{ResultsView, ViewAction, ViewState};

/// Loads an image the way the display would. A failure swaps the card to the
/// "not available" placeholder.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn load(&self, url: &str) -> Result<(), ApiConnectionError>;
}

#[derive(Debug, Clone)]
pub struct HttpImageProbe {
    client: reqwest::Client,
}

impl HttpImageProbe {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn load(&self, url: &str) -> Result<(), ApiConnectionError> {
        let response = self.client.head(url).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiConnectionError::ApiError {
                status,
                error_body: String::new(),
            })
        }
    }
}

/// A recipe ready for display. Rendering a card is pure; the image shown was
/// settled when the card was built.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeCard {
    pub position: usize,
    pub recipe: Recipe,
    pub displayed_image: String,
}

/// Builds one card per recipe, probing each image once when a probe is given.
pub async fn build_cards(
    recipes: &[Recipe],
    probe: Option<&dyn ImageProbe>,
    render_fallback: &str,
) -> Vec<RecipeCard> {
    join_all(recipes.iter().enumerate().map(|(index, recipe)| async move {
        let displayed_image = match (recipe.image(), probe) {
            (None, _) => render_fallback.to_string(),
            (Some(url), None) => url.to_string(),
            (Some(url), Some(probe)) => match probe.load(url).await {
                Ok(()) => url.to_string(),
                Err(e) => {
                    warn!("Image failed to load for recipe: {} ({e})", recipe.title);
                    render_fallback.to_string()
                }
            },
        };
        RecipeCard {
            position: index + 1,
            recipe: recipe.clone(),
            displayed_image,
        }
    }))
    .await
}

impl RecipeCard {
    pub fn render(&self) -> String {
        let recipe = &self.recipe;
        let mut out = String::new();
        let _ = writeln!(out, "{}. {}", self.position, recipe.title);
        let _ = writeln!(out, "   ⏱ {}", recipe.estimated_time);
        let _ = writeln!(out, "   🖼  {}", self.displayed_image);

        if let Some(nutrition) = &recipe.nutrition {
            let _ = writeln!(out, "   🥗 Nutrition");
            for entry in nutrition.entries() {
                let _ = writeln!(out, "     {}: {}", entry.name, entry.display_value());
            }
        }

        let _ = writeln!(out, "   🧂 Ingredients");
        for item in &recipe.ingredients {
            let _ = writeln!(out, "     • {item}");
        }

        let _ = writeln!(out, "   👨‍🍳 Steps");
        for (index, step) in recipe.steps.iter().enumerate() {
            let _ = writeln!(out, "     {}. {step}", index + 1);
        }

        if !recipe.tips.is_empty() {
            let _ = writeln!(out, "   💡 Tips");
            for tip in &recipe.tips {
                let _ = writeln!(out, "     • {tip}");
            }
        }
        out
    }
}

pub fn render_header(manual_ingredients: &[String]) -> String {
    let mut out = String::from("✨ Your Custom Recipes\n");
    if !manual_ingredients.is_empty() {
        let _ = writeln!(out, "Ingredients: {}", manual_ingredients.join(", "));
    }
    out
}

pub fn render_actions(actions: &[ViewAction]) -> String {
    let labels: Vec<String> = actions
        .iter()
        .map(|action| format!("[{}]", action.label()))
        .collect();
    format!("{}\n", labels.join(" "))
}

pub fn render_skeletons(pending: usize) -> String {
    (1..=pending)
        .map(|index| format!("{index}. ░░░░░░░░░░░░░░░░ loading…\n"))
        .collect()
}

pub fn render_empty() -> String {
    let mut out = String::from("No Recipes Found\nPlease go back and enter ingredients.\n");
    out.push_str(&render_actions(&[ViewAction::BackToHome]));
    out
}

/// Renders the whole view for its current state. Populated views require the
/// cards built from that state.
pub fn render_view(view: &ResultsView, cards: &[RecipeCard]) -> String {
    match view.state() {
        ViewState::Empty => render_empty(),
        ViewState::Loading { pending } => {
            let mut out = render_header(view.manual_ingredients());
            out.push_str(&render_actions(view.actions()));
            out.push('\n');
            out.push_str(&render_skeletons(pending));
            out
        }
        ViewState::Populated(_) => {
            let mut out = render_header(view.manual_ingredients());
            out.push_str(&render_actions(view.actions()));
            for card in cards {
                out.push('\n');
                out.push_str(&card.render());
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LOOKUP_FALLBACK: &str = "https://placeholder.test/no-image";
    const RENDER_FALLBACK: &str = "https://placeholder.test/not-available";

    struct FailingProbe {
        broken: &'static str,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl ImageProbe for FailingProbe {
        async fn load(&self, url: &str) -> Result<(), ApiConnectionError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if url == self.broken {
                Err(ApiConnectionError::ApiError {
                    status: StatusCode::NOT_FOUND,
                    error_body: String::new(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn tomato_rice() -> Recipe {
        serde_json::from_value::<Recipe>(json!({
            "title": "Tomato Rice",
            "ingredients": ["tomato", "rice", "garlic"],
            "steps": ["Cook rice", "Add tomato"],
            "tips": [],
            "estimated_time": "20 min"
        }))
        .unwrap()
        .resolve_image("https://images.test/tomato-rice.jpg".to_string())
    }

    #[tokio::test]
    async fn card_sections_follow_display_order() {
        let mut recipe = tomato_rice();
        recipe.tips = vec!["Rinse the rice".to_string()];
        recipe.nutrition = crate::recipe::Nutrition::from_value(json!({"calories": 350.0, "protein": 8.5}));
        let cards = build_cards(&[recipe], None, RENDER_FALLBACK).await;
        let text = cards[0].render();

        let order = [
            "1. Tomato Rice",
            "⏱ 20 min",
            "🥗 Nutrition",
            "calories: 350\n",
            "protein: 8.5g",
            "🧂 Ingredients",
            "• tomato",
            "• rice",
            "• garlic",
            "👨‍🍳 Steps",
            "1. Cook rice",
            "2. Add tomato",
            "💡 Tips",
            "• Rinse the rice",
        ];
        let mut cursor = 0;
        for needle in order {
            let found = text[cursor..]
                .find(needle)
                .unwrap_or_else(|| panic!("{needle:?} missing or out of order in:\n{text}"));
            cursor += found + needle.len();
        }
    }

    #[tokio::test]
    async fn empty_sections_are_omitted() {
        let cards = build_cards(&[tomato_rice()], None, RENDER_FALLBACK).await;
        let text = cards[0].render();
        assert!(!text.contains("Tips"));
        assert!(!text.contains("Nutrition"));
        assert!(text.contains("https://images.test/tomato-rice.jpg"));
    }

    #[tokio::test]
    async fn broken_image_swaps_to_render_fallback() {
        let probe = FailingProbe {
            broken: LOOKUP_FALLBACK,
            loads: AtomicUsize::new(0),
        };
        let broken: Recipe = serde_json::from_value::<Recipe>(json!({
            "title": "Garlic Bread",
            "ingredients": [],
            "steps": ["Toast"],
            "estimated_time": "5 min"
        }))
        .unwrap()
        .resolve_image(LOOKUP_FALLBACK.to_string());

        let cards = build_cards(&[tomato_rice(), broken], Some(&probe), RENDER_FALLBACK).await;

        assert_eq!(cards[0].displayed_image, "https://images.test/tomato-rice.jpg");
        assert_eq!(cards[1].displayed_image, RENDER_FALLBACK);
        assert_eq!(cards[1].position, 2);
        assert_eq!(cards[1].recipe.image(), Some(LOOKUP_FALLBACK));
        assert_eq!(probe.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rerender_is_stable_and_offline() {
        let probe = FailingProbe {
            broken: "never",
            loads: AtomicUsize::new(0),
        };
        let cards = build_cards(&[tomato_rice()], Some(&probe), RENDER_FALLBACK).await;
        let first = cards[0].render();
        let second = cards[0].render();
        assert_eq!(first, second);
        assert_eq!(probe.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_view_offers_one_action() {
        let text = render_empty();
        assert!(text.starts_with("No Recipes Found"));
        assert_eq!(text.matches('[').count(), 1);
        assert!(text.contains("[Back to Home]"));
    }

    #[test]
    fn header_lists_manual_ingredients() {
        let header = render_header(&["tomato".to_string(), "rice".to_string()]);
        assert!(header.contains("Ingredients: tomato, rice"));
        assert!(!render_header(&[]).contains("Ingredients"));
    }

    #[test]
    fn one_skeleton_per_pending_recipe() {
        assert_eq!(render_skeletons(3).lines().count(), 3);
        assert!(render_skeletons(0).is_empty());
    }
}
