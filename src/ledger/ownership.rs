use serde::{Deserialize, Serialize};

const MEAL_PREFIX: &str = "meal-";
const GYM_TAG: &str = "gym-workout";
const WATER_TAG: &str = "water";

/// A feature module that writes tags into the task ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Meal,
    Gym,
    Water,
}

impl Domain {
    pub const ALL: [Domain; 3] = [Domain::Meal, Domain::Gym, Domain::Water];

    /// Whether this domain is the one allowed to set or clear `tag`.
    pub fn owns(self, tag: &str) -> bool {
        match self {
            Domain::Meal => tag.starts_with(MEAL_PREFIX) && tag.len() > MEAL_PREFIX.len(),
            Domain::Gym => tag == GYM_TAG,
            Domain::Water => tag == WATER_TAG,
        }
    }

    /// The domain owning `tag`, or `None` for tags outside every namespace.
    pub fn owner_of(tag: &str) -> Option<Domain> {
        Domain::ALL.into_iter().find(|d| d.owns(tag))
    }

    /// Ledger tag for a meal timeslot, e.g. `"6 PM"` becomes `meal-6-pm`.
    pub fn meal_tag(slot: &str) -> String {
        let slot = slot
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        format!("{}{}", MEAL_PREFIX, slot)
    }

    pub fn gym_tag() -> &'static str {
        GYM_TAG
    }

    pub fn water_tag() -> &'static str {
        WATER_TAG
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Domain::Meal => write!(f, "meal"),
            Domain::Gym => write!(f, "gym"),
            Domain::Water => write!(f, "water"),
        }
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "meal" | "meals" => Ok(Domain::Meal),
            "gym" | "workout" => Ok(Domain::Gym),
            "water" => Ok(Domain::Water),
            _ => Err(format!("Invalid domain: {}", s)),
        }
    }
}
