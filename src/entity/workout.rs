use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutStatus {
    #[default]
    Scheduled,
    Completed,
    Skipped,
}

impl std::fmt::Display for WorkoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkoutStatus::Scheduled => write!(f, "scheduled"),
            WorkoutStatus::Completed => write!(f, "completed"),
            WorkoutStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for WorkoutStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(WorkoutStatus::Scheduled),
            "completed" | "done" => Ok(WorkoutStatus::Completed),
            "skipped" => Ok(WorkoutStatus::Skipped),
            _ => Err(format!("Invalid workout status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub name: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub sets: u32,
    #[serde(default)]
    pub reps: u32,
    #[serde(default)]
    pub rest_seconds: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Exercise {
    pub fn new(name: &str, weight: f64, sets: u32, reps: u32) -> Self {
        Self {
            name: name.to_string(),
            weight,
            sets,
            reps,
            rest_seconds: 90,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledWorkout {
    pub workout_type: String,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    pub scheduled_for: NaiveDate,
    #[serde(default)]
    pub status: WorkoutStatus,
}

impl ScheduledWorkout {
    pub fn new(workout_type: &str, scheduled_for: NaiveDate) -> Self {
        Self {
            workout_type: workout_type.to_string(),
            exercises: Vec::new(),
            scheduled_for,
            status: WorkoutStatus::default(),
        }
    }
}
