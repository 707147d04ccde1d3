use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// One generated recipe suggestion, as shown on a results card.
///
/// Every field except `image` is fixed once the record has been parsed. The
/// image moves from absent to present at most once, through
/// [`Recipe::resolve_image`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Recipe {
    pub title: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
    #[serde(default)]
    pub tips: Vec<String>,
    pub estimated_time: String,
    #[serde(
        default,
        deserialize_with = "deserialize_nutrition",
        skip_serializing_if = "Option::is_none"
    )]
    pub nutrition: Option<Nutrition>,
    #[serde(
        default,
        deserialize_with = "deserialize_image",
        skip_serializing_if = "Option::is_none"
    )]
    image: Option<String>,
}

impl Recipe {
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Returns the recipe with `url` as its image. A recipe that already has
    /// an image comes back unchanged.
    pub fn resolve_image(mut self, url: String) -> Self {
        if self.image.is_none() {
            self.image = Some(url);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NutrientEntry {
    pub name: String,
    pub value: f64,
}

impl NutrientEntry {
    /// Display suffix for this nutrient. Calories are unitless, the rest are grams.
    pub fn unit(&self) -> &'static str {
        if self.name == "calories" {
            ""
        } else {
            "g"
        }
    }

    pub fn display_value(&self) -> String {
        format!("{}{}", format_amount(self.value), self.unit())
    }
}

/// Nutrient totals attached by the backend, kept in the order it sent them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Nutrition {
    entries: Vec<NutrientEntry>,
}

impl Nutrition {
    /// Builds nutrition from a backend JSON object. Non-numeric entries (the
    /// backend's `{"error": ...}` marker) are skipped; an object with no numeric
    /// entry at all yields `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };
        let entries: Vec<NutrientEntry> = map
            .into_iter()
            .filter_map(|(name, value)| value.as_f64().map(|value| NutrientEntry { name, value }))
            .collect();
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    pub fn entries(&self) -> &[NutrientEntry] {
        &self.entries
    }
}

impl Serialize for Nutrition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.name, &entry.value)?;
        }
        map.end()
    }
}

fn deserialize_nutrition<'de, D>(deserializer: D) -> Result<Option<Nutrition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(Nutrition::from_value))
}

// A blank image string is as good as no image.
fn deserialize_image<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|url| !url.trim().is_empty()))
}

/// Formats a numeric amount the way the backend's JSON reads: whole numbers
/// without a trailing `.0`.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tomato_rice() -> Value {
        json!({
            "title": "Tomato Rice",
            "ingredients": ["tomato", "rice", "garlic"],
            "steps": ["Cook rice", "Add tomato"],
            "estimated_time": "20 min"
        })
    }

    #[test]
    fn missing_tips_default_to_empty() {
        let recipe: Recipe = serde_json::from_value(tomato_rice()).unwrap();
        assert!(recipe.tips.is_empty());
        assert!(recipe.nutrition.is_none());
        assert!(!recipe.has_image());
    }

    #[test]
    fn image_resolves_only_once() {
        let recipe: Recipe = serde_json::from_value(tomato_rice()).unwrap();
        let recipe = recipe.resolve_image("https://images.test/first.jpg".to_string());
        let recipe = recipe.resolve_image("https://images.test/second.jpg".to_string());
        assert_eq!(recipe.image(), Some("https://images.test/first.jpg"));
    }

    #[test]
    fn blank_image_counts_as_absent() {
        let mut raw = tomato_rice();
        raw["image"] = json!("  ");
        let recipe: Recipe = serde_json::from_value(raw).unwrap();
        assert!(!recipe.has_image());
    }

    #[test]
    fn nutrition_keeps_backend_order_and_units() {
        let mut raw = tomato_rice();
        raw["nutrition"] = json!({"calories": 412.0, "protein": 11.25, "fat": 7.0, "carbs": 80.5});
        let recipe: Recipe = serde_json::from_value(raw).unwrap();
        let nutrition = recipe.nutrition.unwrap();
        let shown: Vec<(String, String)> = nutrition
            .entries()
            .iter()
            .map(|e| (e.name.clone(), e.display_value()))
            .collect();
        assert_eq!(
            shown,
            vec![
                ("calories".to_string(), "412".to_string()),
                ("protein".to_string(), "11.25g".to_string()),
                ("fat".to_string(), "7g".to_string()),
                ("carbs".to_string(), "80.5g".to_string()),
            ]
        );
    }

    #[test]
    fn nutrition_error_marker_is_treated_as_absent() {
        let mut raw = tomato_rice();
        raw["nutrition"] = json!({"error": "quota exceeded"});
        let recipe: Recipe = serde_json::from_value(raw).unwrap();
        assert!(recipe.nutrition.is_none());
    }

    #[test]
    fn serialized_recipe_carries_resolved_image() {
        let recipe: Recipe = serde_json::from_value(tomato_rice()).unwrap();
        let recipe = recipe.resolve_image("https://images.test/rice.jpg".to_string());
        let value = serde_json::to_value(&recipe).unwrap();
        assert_eq!(value["image"], json!("https://images.test/rice.jpg"));
        assert!(value.get("nutrition").is_none());
    }
}
