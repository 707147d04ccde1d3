use serde_json::Value;
use tracing::warn;

use crate::recipe::Recipe;

/// Outcome of checking the collected records.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Nothing usable arrived; show the empty view and skip enrichment.
    Empty,
    Recipes(Vec<Recipe>),
}

impl Normalized {
    pub fn recipes(&self) -> &[Recipe] {
        match self {
            Normalized::Empty => &[],
            Normalized::Recipes(recipes) => recipes,
        }
    }

    /// Number of recipes that still need an image lookup.
    pub fn missing_images(&self) -> usize {
        self.recipes().iter().filter(|r| !r.has_image()).count()
    }
}

/// Accepts either a bare array of records (detection endpoint) or an object
/// with a `recipes` array (generation endpoint). Records are trusted as
/// supplied; a record lacking the recipe shape is dropped.
pub fn normalize(payload: &Value) -> Normalized {
    let Some(records) = record_list(payload) else {
        warn!("recipe payload is not a list, showing empty results");
        return Normalized::Empty;
    };

    let recipes: Vec<Recipe> = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value::<Recipe>(record.clone()) {
            Ok(recipe) if recipe.title.trim().is_empty() => {
                warn!(index, "dropping recipe record with a blank title");
                None
            }
            Ok(recipe) => Some(recipe),
            Err(e) => {
                warn!(index, "dropping malformed recipe record: {e}");
                None
            }
        })
        .collect();

    if recipes.is_empty() {
        Normalized::Empty
    } else {
        Normalized::Recipes(recipes)
    }
}

fn record_list(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(records) => Some(records),
        Value::Object(map) => map.get("recipes").and_then(Value::as_array),
        _ => None,
    }
}
