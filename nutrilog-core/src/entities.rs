//! Records exchanged with the remote API

use crate::identity::{LogDate, MealItemId, TargetId, Timestamp};
use serde::{Deserialize, Serialize};

/// A single logged food item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealItem {
    pub id: MealItemId,
    pub date: LogDate,
    pub name: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub logged_at: Timestamp,
}

impl MealItem {
    /// Build the placeholder shown in the cache while a create is in flight.
    pub fn pending(new: &NewMealItem, logged_at: Timestamp) -> Self {
        Self {
            id: MealItemId::temporary(),
            date: new.date,
            name: new.name.clone(),
            calories: new.calories,
            protein_g: new.protein_g,
            carbs_g: new.carbs_g,
            fat_g: new.fat_g,
            logged_at,
        }
    }
}

/// Request body for logging a meal item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMealItem {
    pub date: LogDate,
    pub name: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

/// Partial update of a meal item. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protein_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carbs_g: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fat_g: Option<f64>,
}

impl MealItemPatch {
    pub fn apply(&self, item: &mut MealItem) {
        if let Some(name) = &self.name {
            item.name = name.clone();
        }
        if let Some(calories) = self.calories {
            item.calories = calories;
        }
        if let Some(protein_g) = self.protein_g {
            item.protein_g = protein_g;
        }
        if let Some(carbs_g) = self.carbs_g {
            item.carbs_g = carbs_g;
        }
        if let Some(fat_g) = self.fat_g {
            item.fat_g = fat_g;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.calories.is_none()
            && self.protein_g.is_none()
            && self.carbs_g.is_none()
            && self.fat_g.is_none()
    }
}

/// Daily nutrient goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionTarget {
    pub id: TargetId,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub active: bool,
}

impl NutritionTarget {
    /// Speculative active target built from an upsert request.
    pub fn pending(input: &TargetInput, existing: Option<&NutritionTarget>) -> Self {
        Self {
            id: existing
                .map(|target| target.id.clone())
                .unwrap_or_else(TargetId::temporary),
            calories: input.calories,
            protein_g: input.protein_g,
            carbs_g: input.carbs_g,
            fat_g: input.fat_g,
            active: true,
        }
    }
}

/// Request body for creating or replacing the active target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetInput {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

/// Summed macros.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

/// Server-aggregated totals for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: LogDate,
    pub totals: MacroTotals,
    pub item_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn new_item() -> NewMealItem {
        NewMealItem {
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            name: "Oatmeal".to_string(),
            calories: 300.0,
            protein_g: 10.0,
            carbs_g: 54.0,
            fat_g: 5.0,
        }
    }

    #[test]
    fn test_pending_meal_item_has_temporary_id() {
        let item = MealItem::pending(&new_item(), Utc::now());
        assert!(item.id.is_temporary());
        assert_eq!(item.name, "Oatmeal");
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut item = MealItem::pending(&new_item(), Utc::now());
        let patch = MealItemPatch {
            calories: Some(350.0),
            ..Default::default()
        };
        patch.apply(&mut item);
        assert_eq!(item.calories, 350.0);
        assert_eq!(item.protein_g, 10.0);
        assert!(!patch.is_empty());
        assert!(MealItemPatch::default().is_empty());
    }

    #[test]
    fn test_patch_omits_absent_fields_on_the_wire() {
        let patch = MealItemPatch {
            name: Some("Porridge".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Porridge" }));
    }

    #[test]
    fn test_pending_target_keeps_existing_id() {
        let input = TargetInput {
            calories: 2000.0,
            protein_g: 150.0,
            carbs_g: 200.0,
            fat_g: 70.0,
        };
        let existing = NutritionTarget::pending(&input, None);
        assert!(existing.id.is_temporary());

        let replaced = NutritionTarget::pending(&input, Some(&existing));
        assert_eq!(replaced.id, existing.id);
        assert!(replaced.active);
    }

    #[test]
    fn test_meal_item_date_is_iso_on_the_wire() {
        let item = MealItem::pending(&new_item(), Utc::now());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["date"], "2024-06-01");
    }
}
