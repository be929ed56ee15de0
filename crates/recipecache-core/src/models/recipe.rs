use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::decode::Decode;
use crate::error::DecodeError;

/// Recipe catalog endpoints.
pub const ALL_RECIPES_URL: &str = "https://d3jbb8n5wk0qxi.cloudfront.net/recipes.json";
pub const EMPTY_RECIPES_URL: &str = "https://d3jbb8n5wk0qxi.cloudfront.net/recipes-empty.json";
pub const MALFORMED_RECIPES_URL: &str =
    "https://d3jbb8n5wk0qxi.cloudfront.net/recipes-malformed.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub uuid: Uuid,
    pub name: String,
    pub cuisine: String,
    pub photo_url_large: Option<Url>,
    pub photo_url_small: Option<Url>,
    pub source_url: Option<Url>,
    pub youtube_url: Option<Url>,
}

impl Recipe {
    /// Smallest photo available, for thumbnails
    pub fn thumbnail_url(&self) -> Option<&Url> {
        self.photo_url_small
            .as_ref()
            .or(self.photo_url_large.as_ref())
    }
}

#[derive(Deserialize)]
struct CatalogResponse {
    recipes: Vec<Recipe>,
}

/// The recipe catalog, with the set of cuisines it covers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "CatalogResponse")]
pub struct Catalog {
    pub recipes: Vec<Recipe>,
    /// Sorted, de-duplicated cuisines of `recipes`
    pub cuisines: Vec<String>,
}

impl From<CatalogResponse> for Catalog {
    fn from(response: CatalogResponse) -> Self {
        Self::new(response.recipes)
    }
}

impl Catalog {
    pub fn new(recipes: Vec<Recipe>) -> Self {
        let cuisines: BTreeSet<&str> = recipes.iter().map(|r| r.cuisine.as_str()).collect();
        let cuisines = cuisines.into_iter().map(String::from).collect();
        Self { recipes, cuisines }
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Recipes of one cuisine, in catalog order
    pub fn select(&self, cuisine: &str) -> Vec<&Recipe> {
        self.recipes.iter().filter(|r| r.cuisine == cuisine).collect()
    }
}

impl Decode for Catalog {
    fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
