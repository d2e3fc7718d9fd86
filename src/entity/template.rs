use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Exercise;

/// A named, reusable snapshot of a workout's exercise list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: Uuid,
    pub user_id: String,
    pub workout_type: String,
    pub name: String,
    pub exercises: Vec<Exercise>,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl WorkoutTemplate {
    pub fn new(user_id: &str, input: TemplateInput) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            workout_type: input.workout_type,
            name: input.name,
            exercises: input.exercises,
            created_at: now,
            last_used: now,
        }
    }

    /// Most recently used first; equal timestamps fall back to id order so
    /// the result is deterministic.
    pub fn recency_cmp(&self, other: &Self) -> Ordering {
        other
            .last_used
            .cmp(&self.last_used)
            .then_with(|| self.id.to_string().cmp(&other.id.to_string()))
    }
}

/// Content supplied when saving a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInput {
    pub workout_type: String,
    pub name: String,
    pub exercises: Vec<Exercise>,
}
