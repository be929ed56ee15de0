//! Payload models for the recipe catalog.
//!
//! - `Catalog`: the full recipe list and its cuisines
//! - `Recipe`: one recipe with its photo and source links

pub mod recipe;

pub use recipe::{Catalog, Recipe, ALL_RECIPES_URL, EMPTY_RECIPES_URL, MALFORMED_RECIPES_URL};
