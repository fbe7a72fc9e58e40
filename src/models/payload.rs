use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::draft::{
    DraftMeal, DraftStockItem, Ingredient, MealSource, MealType, Nutrition, StockSource,
};

/// Body of `POST /stock/`, `POST /stock/batch` (as an array) and `PUT /stock/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockPayload {
    pub user_id: String,
    pub item_name: String,
    /// Always `"<value> <unit>"`.
    pub quantity: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<NaiveDate>,
    pub source: StockSource,
}

impl StockPayload {
    pub fn from_draft(user_id: &str, draft: &DraftStockItem) -> Self {
        Self {
            user_id: user_id.to_string(),
            item_name: draft.item_name.trim().to_string(),
            quantity: draft.quantity.format(),
            category: draft.category.clone(),
            expiry_date: draft.expiry_date,
            source: draft.source,
        }
    }
}

/// Body of `POST /meals/` and `PUT /meals/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPayload {
    pub user_id: String,
    pub name: String,
    pub meal_type: MealType,
    pub meal_source: MealSource,
    pub ingredients_used: Vec<Ingredient>,
    pub confidence: u8,
    pub calories: u32,
    pub protein_g: u32,
    pub carbs_g: u32,
    pub fat_g: u32,
}

impl MealPayload {
    pub fn from_draft(user_id: &str, draft: &DraftMeal) -> Self {
        let Nutrition {
            calories,
            protein_g,
            carbs_g,
            fat_g,
        } = draft.nutrition;

        Self {
            user_id: user_id.to_string(),
            name: draft.name.trim().to_string(),
            meal_type: draft.meal_type,
            meal_source: draft.meal_source,
            ingredients_used: draft.ingredients_used.clone(),
            confidence: draft.confidence,
            calories,
            protein_g,
            carbs_g,
            fat_g,
        }
    }
}

/// Response from `POST /meals/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealLogResponse {
    #[serde(default)]
    pub meal_id: Option<serde_json::Value>,
    #[serde(default)]
    pub deduction_report: Vec<String>,
}

/// A persisted stock row from `GET /stock/{user_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRecord {
    #[serde(default)]
    pub stock_id: Option<String>,
    pub item_name: String,
    #[serde(default)]
    pub quantity: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Body of `POST /meals/estimate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateRequest {
    pub meal_name: String,
}

/// Nutrition as the estimator names it (`protein` rather than `protein_g`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimatedNutrition {
    #[serde(default)]
    pub calories: f64,
    #[serde(default, alias = "protein_g")]
    pub protein: f64,
    #[serde(default, alias = "carbs_g")]
    pub carbs: f64,
    #[serde(default, alias = "fat_g")]
    pub fat: f64,
}

/// Response from `POST /meals/estimate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealEstimate {
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub nutrition: EstimatedNutrition,
}

impl MealEstimate {
    /// Prefill a manual meal draft from the estimate.
    pub fn into_draft(self, name: impl Into<String>) -> DraftMeal {
        let n = self.nutrition;
        DraftMeal {
            name: name.into(),
            ingredients_used: self.ingredients,
            nutrition: Nutrition {
                calories: round_non_negative(n.calories),
                protein_g: round_non_negative(n.protein),
                carbs_g: round_non_negative(n.carbs),
                fat_g: round_non_negative(n.fat),
            },
            ..DraftMeal::default()
        }
    }
}

fn round_non_negative(value: f64) -> u32 {
    value.round().max(0.0) as u32
}
