//! Maps raw analyzer output onto drafts.
//!
//! The analyzer is a language model, so its JSON is loosely shaped: stock scans may
//! come back as a bare array or wrapped in `{"items": [...]}`, numbers may be strings,
//! and fields go missing. Everything tolerable is tolerated here so the review queue
//! only ever sees well-formed drafts.

use chrono::NaiveDate;
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::models::draft::{
    DraftMeal, DraftStockItem, Ingredient, MealType, Nutrition, StockSource, DEFAULT_CATEGORY,
    SCANNED_CONFIDENCE,
};
use crate::models::job::{JobResult, UploadKind};
use crate::models::quantity::{Quantity, RawQuantity};

/// What the user photographed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ScanMode {
    /// A grocery receipt or online cart screenshot.
    Bill,
    /// One ingredient.
    SingleItem,
    /// A cooked dish.
    Meal,
}

impl ScanMode {
    pub fn upload_kind(self) -> UploadKind {
        match self {
            ScanMode::Bill | ScanMode::SingleItem => UploadKind::Stock,
            ScanMode::Meal => UploadKind::Meal,
        }
    }

    pub fn stock_source(self) -> StockSource {
        match self {
            ScanMode::Bill => StockSource::Bill,
            ScanMode::SingleItem | ScanMode::Meal => StockSource::Scan,
        }
    }
}

/// Drafts produced by one completed job.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Stock(Vec<DraftStockItem>),
    Meal(DraftMeal),
}

pub fn extract(mode: ScanMode, result: &JobResult) -> Result<Extraction, ExtractionError> {
    match mode.upload_kind() {
        UploadKind::Stock => stock_drafts(result, mode.stock_source()).map(Extraction::Stock),
        UploadKind::Meal => meal_draft(result).map(Extraction::Meal),
    }
}

#[derive(Deserialize)]
struct RawStockItem {
    #[serde(default, alias = "name")]
    item_name: Option<String>,
    #[serde(default)]
    quantity: Option<RawQuantity>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    expiry_date: Option<String>,
}

/// Decode a stock scan into drafts, in the order the analyzer listed them.
/// Entries without a name, or that do not decode, are dropped.
pub fn stock_drafts(result: &JobResult, source: StockSource) -> Result<Vec<DraftStockItem>, ExtractionError> {
    let items = match result {
        JobResult::Null => return Ok(Vec::new()),
        JobResult::Array(items) => items,
        JobResult::Object(map) => match map.get("items") {
            Some(JobResult::Array(items)) => items,
            Some(JobResult::Null) | None => return Ok(Vec::new()),
            Some(_) => return Err(ExtractionError::Shape("`items` is not a list".to_string())),
        },
        _ => return Err(ExtractionError::Shape("expected a list of items".to_string())),
    };

    let mut drafts = Vec::with_capacity(items.len());
    for value in items {
        let raw: RawStockItem = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(entry = %value, error = %e, "Skipping undecodable stock entry");
                continue;
            }
        };

        let item_name = raw.item_name.unwrap_or_default().trim().to_string();
        if item_name.is_empty() {
            tracing::debug!(entry = %value, "Dropping unnamed stock entry");
            continue;
        }

        let quantity = raw
            .quantity
            .map(|q| q.normalize())
            .unwrap_or_else(Quantity::default);
        let category = raw
            .category
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let expiry_date = raw
            .expiry_date
            .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok());

        drafts.push(DraftStockItem {
            item_name,
            quantity,
            category,
            expiry_date,
            source,
        });
    }

    Ok(drafts)
}

#[derive(Deserialize)]
struct RawMeal {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, alias = "ingredients_used")]
    ingredients: Option<Vec<Ingredient>>,
    #[serde(default)]
    nutrition: Option<Nutrition>,
    #[serde(default)]
    meal_type: Option<MealType>,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Decode a meal scan into a single draft.
pub fn meal_draft(result: &JobResult) -> Result<DraftMeal, ExtractionError> {
    if !result.is_object() {
        return Err(ExtractionError::Shape("expected a meal object".to_string()));
    }
    let raw: RawMeal = serde_json::from_value(result.clone()).map_err(ExtractionError::Decode)?;

    let name = raw
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "Unknown Meal".to_string());
    let confidence = raw
        .confidence
        .map(|c| c.round().clamp(0.0, 100.0) as u8)
        .unwrap_or(SCANNED_CONFIDENCE);

    Ok(DraftMeal {
        name,
        meal_type: raw.meal_type.unwrap_or_default(),
        nutrition: raw.nutrition.unwrap_or_default(),
        ingredients_used: raw.ingredients.unwrap_or_default(),
        confidence,
        ..DraftMeal::default()
    })
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Unexpected analyzer result shape: {0}")]
    Shape(String),

    #[error("Failed to decode analyzer result: {0}")]
    Decode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::quantity::Unit;
    use serde_json::json;

    #[test]
    fn test_bare_list_of_items() {
        let result = json!([
            {"item_name": "Milk", "quantity": "1l", "category": "dairy"},
            {"item_name": "Onion", "quantity": "1 kg", "category": "Vegetable"}
        ]);
        let drafts = stock_drafts(&result, StockSource::Bill).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].quantity, Quantity::new(1000.0, Unit::Ml));
        assert_eq!(drafts[1].quantity, Quantity::new(1000.0, Unit::G));
        assert_eq!(drafts[1].category, "vegetable");
        assert_eq!(drafts[0].source, StockSource::Bill);
    }

    #[test]
    fn test_wrapped_items_and_defaults() {
        let result = json!({
            "items": [
                {"item_name": "Button Mushroom"},
                {"item_name": "", "quantity": "2"},
                {"item_name": "Eggs", "quantity": 6, "expiry_date": "2026-11-01"}
            ],
            "confidence": 85
        });
        let drafts = stock_drafts(&result, StockSource::Scan).unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].quantity, Quantity::new(1.0, Unit::Pcs));
        assert_eq!(drafts[0].category, DEFAULT_CATEGORY);
        assert_eq!(drafts[1].quantity, Quantity::new(6.0, Unit::Pcs));
        assert_eq!(drafts[1].expiry_date, NaiveDate::from_ymd_opt(2026, 11, 1));
    }

    #[test]
    fn test_bad_line_does_not_sink_receipt() {
        let result = json!({
            "items": [
                {"item_name": "Milk", "quantity": "1l"},
                {"item_name": "Eggs", "quantity": {"value": 12}},
                {"item_name": 42},
                "Bread"
            ]
        });
        let drafts = stock_drafts(&result, StockSource::Bill).unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].item_name, "Milk");
        assert_eq!(drafts[0].quantity, Quantity::new(1000.0, Unit::Ml));
    }

    #[test]
    fn test_null_result_is_empty() {
        assert!(stock_drafts(&JobResult::Null, StockSource::Bill).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_result_rejected() {
        assert!(matches!(
            stock_drafts(&json!("oops"), StockSource::Bill),
            Err(ExtractionError::Shape(_))
        ));
    }

    #[test]
    fn test_meal_draft() {
        let result = json!({
            "name": "Spaghetti Bolognese",
            "ingredients": [{"item": "Pasta", "qty": "100g"}],
            "nutrition": {"calories": 500, "protein_g": 20, "carbs_g": 60, "fat_g": 15},
            "meal_type": "dinner",
            "confidence": 88
        });
        let meal = meal_draft(&result).unwrap();
        assert_eq!(meal.name, "Spaghetti Bolognese");
        assert_eq!(meal.meal_type, MealType::Dinner);
        assert_eq!(meal.nutrition.carbs_g, 60);
        assert_eq!(meal.confidence, 88);
        assert!(meal.is_home_cooked());
    }

    #[test]
    fn test_meal_defaults() {
        let meal = meal_draft(&json!({})).unwrap();
        assert_eq!(meal.name, "Unknown Meal");
        assert_eq!(meal.confidence, SCANNED_CONFIDENCE);
        assert!(meal.ingredients_used.is_empty());
    }

    #[test]
    fn test_scan_modes() {
        assert_eq!(ScanMode::SingleItem.upload_kind(), UploadKind::Stock);
        assert_eq!(ScanMode::Meal.upload_kind(), UploadKind::Meal);
        assert_eq!("single-item".parse::<ScanMode>().unwrap(), ScanMode::SingleItem);
    }
}
