mod meal;
mod template;
mod water;
mod workout;

pub use meal::{Macros, MealPlan, PlannedFood};
pub use template::{TemplateInput, WorkoutTemplate};
pub use water::WaterLog;
pub use workout::{Exercise, ScheduledWorkout, WorkoutStatus};
