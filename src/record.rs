//! Recipe record types
//!
//! A [`RecipeRecord`] is the unit of output. Everything on it is filled by the
//! extractor except the resolved image paths, which the asset resolver sets
//! exactly once per image before the record reaches a sink.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// One ingredient line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub amount: String,
}

/// A named group of ingredients ("主料", "辅料", ...) in page order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientSection {
    pub name: String,
    pub items: Vec<Ingredient>,
}

/// One cooking step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub text: String,

    /// Absolute URL of the step image, read from the lazy-load attribute
    #[serde(default)]
    pub image_ref: Option<String>,

    /// Path of the stored image relative to the image root
    #[serde(default)]
    pub resolved_path: Option<String>,
}

/// A harvested recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeRecord {
    pub recipe_id: String,
    pub title: String,

    /// Sections in page order; serialized as a JSON object keyed by section name
    #[serde(with = "ordered_sections", default)]
    pub ingredients: Vec<IngredientSection>,

    #[serde(default)]
    pub steps: Vec<Step>,

    #[serde(default)]
    pub tips: Vec<String>,

    /// Display categories, first-seen order, no duplicates
    #[serde(default)]
    pub categories: Vec<String>,

    pub detail_url: String,

    #[serde(default)]
    pub main_image_ref: Option<String>,

    #[serde(default)]
    pub main_image_resolved_path: Option<String>,
}

impl RecipeRecord {
    /// Creates an empty record for the given id and page
    pub fn new(recipe_id: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            recipe_id: recipe_id.into(),
            title: String::new(),
            ingredients: Vec::new(),
            steps: Vec::new(),
            tips: Vec::new(),
            categories: Vec::new(),
            detail_url: detail_url.into(),
            main_image_ref: None,
            main_image_resolved_path: None,
        }
    }

    /// Looks up a section by name
    pub fn section(&self, name: &str) -> Option<&IngredientSection> {
        self.ingredients.iter().find(|s| s.name == name)
    }

    /// Number of images the record references (main image plus step images)
    pub fn image_ref_count(&self) -> usize {
        usize::from(self.main_image_ref.is_some())
            + self.steps.iter().filter(|s| s.image_ref.is_some()).count()
    }

    /// All resolved image paths, main image first
    pub fn resolved_paths(&self) -> Vec<&str> {
        self.main_image_resolved_path
            .as_deref()
            .into_iter()
            .chain(self.steps.iter().filter_map(|s| s.resolved_path.as_deref()))
            .collect()
    }

    /// Adds a display category unless it is already present
    pub fn add_category(&mut self, category: String) {
        if !self.categories.contains(&category) {
            self.categories.push(category);
        }
    }
}

/// Serializes `Vec<IngredientSection>` as an order-preserving JSON object
mod ordered_sections {
    use super::*;

    pub fn serialize<S>(sections: &[IngredientSection], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(sections.len()))?;
        for section in sections {
            map.serialize_entry(&section.name, &section.items)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<IngredientSection>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct SectionsVisitor;

        impl<'de> Visitor<'de> for SectionsVisitor {
            type Value = Vec<IngredientSection>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of section name to ingredient list")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut sections = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, items)) = access.next_entry::<String, Vec<Ingredient>>()? {
                    sections.push(IngredientSection { name, items });
                }
                Ok(sections)
            }
        }

        deserializer.deserialize_map(SectionsVisitor)
    }
}
