use chrono::NaiveDate;
use garde::Validate;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

use crate::models::quantity::{Quantity, RawQuantity};

/// Category given to drafts nobody has classified yet.
pub const DEFAULT_CATEGORY: &str = "other";

/// Confidence recorded for hand-entered meals.
pub const MANUAL_CONFIDENCE: u8 = 100;

/// Confidence recorded for scanned meals when the analyzer reports none.
pub const SCANNED_CONFIDENCE: u8 = 90;

/// Behavior shared by every draft kind held in a review queue.
pub trait Draft: Clone + Default + Validate<Context = ()> {
    /// True when the identifying field (item name, meal name) is set.
    fn is_filled(&self) -> bool;

    /// Short human label used in logs and commit reports.
    fn label(&self) -> &str;
}

/// Where a stock draft came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StockSource {
    #[default]
    Manual,
    Bill,
    Scan,
}

/// Editable stock item awaiting commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DraftStockItem {
    #[garde(custom(not_blank))]
    pub item_name: String,

    #[garde(dive)]
    pub quantity: Quantity,

    #[garde(length(max = 100))]
    pub category: String,

    #[garde(skip)]
    pub expiry_date: Option<NaiveDate>,

    #[garde(skip)]
    pub source: StockSource,
}

impl Default for DraftStockItem {
    fn default() -> Self {
        Self {
            item_name: String::new(),
            quantity: Quantity::default(),
            category: DEFAULT_CATEGORY.to_string(),
            expiry_date: None,
            source: StockSource::Manual,
        }
    }
}

impl DraftStockItem {
    pub fn new(item_name: impl Into<String>, quantity: Quantity, category: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            quantity,
            category: category.into(),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: StockSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_expiry(mut self, expiry_date: NaiveDate) -> Self {
        self.expiry_date = Some(expiry_date);
        self
    }
}

impl Draft for DraftStockItem {
    fn is_filled(&self) -> bool {
        !self.item_name.trim().is_empty()
    }

    fn label(&self) -> &str {
        &self.item_name
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    #[default]
    #[serde(other)]
    Other,
}

/// Whether a meal was cooked from the pantry or eaten out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MealSource {
    #[default]
    Home,
    Outside,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Nutrition {
    #[garde(range(max = 20_000))]
    #[serde(default, deserialize_with = "lenient_u32")]
    pub calories: u32,

    #[garde(range(max = 2_000))]
    #[serde(default, deserialize_with = "lenient_u32")]
    pub protein_g: u32,

    #[garde(range(max = 2_000))]
    #[serde(default, deserialize_with = "lenient_u32")]
    pub carbs_g: u32,

    #[garde(range(max = 2_000))]
    #[serde(default, deserialize_with = "lenient_u32")]
    pub fat_g: u32,
}

/// An ingredient consumed by a meal, as the analyzer described it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(default)]
    pub item: String,

    #[serde(default, deserialize_with = "lenient_text")]
    pub qty: String,
}

impl Ingredient {
    pub fn new(item: impl Into<String>, qty: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            qty: qty.into(),
        }
    }
}

/// Editable meal awaiting commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DraftMeal {
    #[garde(custom(not_blank))]
    pub name: String,

    #[garde(skip)]
    pub meal_type: MealType,

    #[garde(skip)]
    pub meal_source: MealSource,

    #[garde(dive)]
    pub nutrition: Nutrition,

    #[garde(skip)]
    pub ingredients_used: Vec<Ingredient>,

    #[garde(range(max = 100))]
    pub confidence: u8,
}

impl Default for DraftMeal {
    fn default() -> Self {
        Self {
            name: String::new(),
            meal_type: MealType::Other,
            meal_source: MealSource::Home,
            nutrition: Nutrition::default(),
            ingredients_used: Vec::new(),
            confidence: MANUAL_CONFIDENCE,
        }
    }
}

impl DraftMeal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_home_cooked(&self) -> bool {
        self.meal_source == MealSource::Home
    }
}

impl Draft for DraftMeal {
    fn is_filled(&self) -> bool {
        !self.name.trim().is_empty()
    }

    fn label(&self) -> &str {
        &self.name
    }
}

fn not_blank(value: &str, _ctx: &()) -> garde::Result {
    if value.trim().is_empty() {
        return Err(garde::Error::new("is required"));
    }
    Ok(())
}

/// Accept `12`, `12.6`, `"12"` or `null`; fractional values are rounded, negatives clamp to 0.
fn lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let number = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(number.round().clamp(0.0, u32::MAX as f64) as u32)
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<RawQuantity>::deserialize(deserializer)?;
    Ok(value.map(|q| q.to_string()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_is_not_filled() {
        let mut item = DraftStockItem::default();
        assert!(!item.is_filled());
        item.item_name = "   ".to_string();
        assert!(!item.is_filled());
        item.item_name = "Milk".to_string();
        assert!(item.is_filled());
    }

    #[test]
    fn test_validation_reports_field() {
        let item = DraftStockItem::default();
        let report = item.validate().unwrap_err();
        assert!(report.to_string().contains("item_name"));

        let meal = DraftMeal::new("Dal");
        assert!(meal.validate().is_ok());
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let item = DraftStockItem::new("Rice", Quantity::new(-1.0, crate::models::quantity::Unit::G), "grain");
        assert!(item.validate().is_err());
    }

    #[test]
    fn test_nutrition_is_lenient() {
        let n: Nutrition =
            serde_json::from_str(r#"{"calories": 512.6, "protein_g": "20", "fat_g": null}"#).unwrap();
        assert_eq!(n.calories, 513);
        assert_eq!(n.protein_g, 20);
        assert_eq!(n.carbs_g, 0);
        assert_eq!(n.fat_g, 0);
    }

    #[test]
    fn test_unknown_meal_type_maps_to_other() {
        let t: MealType = serde_json::from_str("\"brunch\"").unwrap();
        assert_eq!(t, MealType::Other);
        assert_eq!("Dinner".parse::<MealType>().unwrap(), MealType::Dinner);
    }

    #[test]
    fn test_ingredient_qty_accepts_number() {
        let ing: Ingredient = serde_json::from_str(r#"{"item": "Egg", "qty": 2}"#).unwrap();
        assert_eq!(ing.qty, "2");
    }
}
