use serde::{Deserialize, Serialize};

/// Glasses of water logged for a day against that day's goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaterLog {
    pub glasses: u32,
    pub goal: u32,
}

impl WaterLog {
    pub fn new(glasses: u32, goal: u32) -> Self {
        Self { glasses, goal }
    }

    pub fn goal_met(&self) -> bool {
        self.goal > 0 && self.glasses >= self.goal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_met() {
        assert!(WaterLog::new(8, 8).goal_met());
        assert!(WaterLog::new(9, 8).goal_met());
        assert!(!WaterLog::new(7, 8).goal_met());
        assert!(!WaterLog::new(3, 0).goal_met());
    }
}
