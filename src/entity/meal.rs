use std::collections::BTreeMap;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Macros {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            calories: self.calories + rhs.calories,
            protein_g: self.protein_g + rhs.protein_g,
            carbs_g: self.carbs_g + rhs.carbs_g,
            fat_g: self.fat_g + rhs.fat_g,
        }
    }
}

impl AddAssign for Macros {
    fn add_assign(&mut self, rhs: Macros) {
        *self = *self + rhs;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedFood {
    pub name: String,
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub macros: Macros,
}

impl PlannedFood {
    pub fn new(name: &str, quantity: f64, unit: &str, macros: Macros) -> Self {
        Self {
            name: name.to_string(),
            quantity,
            unit: unit.to_string(),
            macros,
        }
    }
}

/// A day's meal plan: planned foods per timeslot plus foods eaten outside
/// the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MealPlan {
    #[serde(default)]
    pub slots: BTreeMap<String, Vec<PlannedFood>>,
    #[serde(default)]
    pub external: Vec<PlannedFood>,
    #[serde(default)]
    pub totals: Macros,
}

impl MealPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_food(&mut self, slot: &str, food: PlannedFood) {
        self.slots.entry(slot.to_string()).or_default().push(food);
        self.recompute_totals();
    }

    pub fn add_external(&mut self, food: PlannedFood) {
        self.external.push(food);
        self.recompute_totals();
    }

    /// Timeslots with at least one planned food.
    pub fn filled_slots(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|(_, foods)| !foods.is_empty())
            .map(|(slot, _)| slot.as_str())
    }

    pub fn recompute_totals(&mut self) {
        let mut totals = Macros::default();
        for food in self.slots.values().flatten().chain(self.external.iter()) {
            totals += food.macros;
        }
        self.totals = totals;
    }
}
