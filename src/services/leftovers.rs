//! Replenishment suggestions after a home-cooked meal.
//!
//! Matching is a loose bidirectional substring test so that "Tomato" and "Tomatoes",
//! or "Rice" and "Basmati Rice", count as the same stock line.

use crate::models::draft::{DraftMeal, DraftStockItem, Ingredient, StockSource, DEFAULT_CATEGORY};
use crate::models::quantity::Quantity;

/// Only home-cooked meals with ingredients feed the heuristic.
pub fn applies_to(meal: &DraftMeal) -> bool {
    meal.is_home_cooked() && !meal.ingredients_used.is_empty()
}

/// Ingredients that match none of the known stock names, in input order.
pub fn infer_leftovers<S: AsRef<str>>(ingredients_used: &[Ingredient], known_stock_names: &[S]) -> Vec<Ingredient> {
    let known: Vec<String> = known_stock_names
        .iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    ingredients_used
        .iter()
        .filter(|ingredient| {
            let item = ingredient.item.trim().to_lowercase();
            !known
                .iter()
                .any(|stock| stock.contains(item.as_str()) || item.contains(stock.as_str()))
        })
        .cloned()
        .collect()
}

/// Turn candidates into stock drafts at twice the consumed amount. Category is a
/// placeholder for the user to correct.
pub fn replenishment_drafts(candidates: &[Ingredient]) -> Vec<DraftStockItem> {
    candidates
        .iter()
        .filter(|c| !c.item.trim().is_empty())
        .map(|c| DraftStockItem {
            item_name: c.item.trim().to_string(),
            quantity: Quantity::parse(&c.qty).scaled(2.0),
            category: DEFAULT_CATEGORY.to_string(),
            expiry_date: None,
            source: StockSource::Manual,
        })
        .collect()
}
