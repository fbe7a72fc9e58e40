//! Analyzer payloads captured in the shapes the backend returns.

#![allow(dead_code)]

use serde_json::{json, Value};

/// Single-line receipt: one litre of milk.
pub fn milk_receipt() -> Value {
    json!([{"item_name": "Milk", "quantity": "1l", "category": "dairy"}])
}

/// Multi-line receipt wrapped the way the vision prompt asks for it.
pub fn grocery_receipt() -> Value {
    json!({
        "items": [
            {"item_name": "Chilli Powder", "quantity": "100g", "category": "spices"},
            {"item_name": "Button Mushroom", "quantity": "1 pc", "category": "vegetable"},
            {"item_name": "Onion", "quantity": "1 kg", "category": "vegetable"},
            {"item_name": "Sunflower Oil", "quantity": "500 ml", "category": "other"}
        ],
        "confidence": 85
    })
}

/// Cooked dish with one tracked and one untracked ingredient.
pub fn saffron_rice() -> Value {
    json!({
        "name": "Saffron Rice",
        "ingredients": [
            {"item": "Rice", "qty": "100g"},
            {"item": "Saffron", "qty": "1g"}
        ],
        "nutrition": {"calories": 410, "protein_g": 8, "carbs_g": 82, "fat_g": 5},
        "meal_type": "lunch",
        "confidence": 88
    })
}
