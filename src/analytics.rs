//! Streak analytics over ledger days.

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::ledger::{Domain, TaskLedger};

/// Which tags make a day count as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayFilter {
    /// Any tag at all.
    Any,
    /// At least one tag owned by the domain.
    Domain(Domain),
}

impl DayFilter {
    pub fn accepts(self, tag: &str) -> bool {
        match self {
            DayFilter::Any => true,
            DayFilter::Domain(domain) => domain.owns(tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakSummary {
    pub domain: Option<Domain>,
    pub current: u32,
    pub longest: u32,
    pub active_days: usize,
}

pub fn active_days(ledgers: &[TaskLedger], filter: DayFilter) -> BTreeSet<NaiveDate> {
    ledgers
        .iter()
        .filter(|l| l.tasks.iter().any(|t| filter.accepts(t)))
        .map(|l| l.date)
        .collect()
}

/// Consecutive active days ending today. A streak that ran through
/// yesterday is still current while today has nothing logged yet.
pub fn current_streak(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut cursor = if days.contains(&today) {
        Some(today)
    } else {
        today.checked_sub_days(Days::new(1))
    };

    let mut streak = 0;
    while let Some(day) = cursor.filter(|d| days.contains(d)) {
        streak += 1;
        cursor = day.checked_sub_days(Days::new(1));
    }
    streak
}

pub fn longest_streak(days: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &day in days {
        run = match previous.and_then(|p| p.checked_add_days(Days::new(1))) {
            Some(next) if next == day => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day);
    }
    longest
}

pub fn summarize(days: &BTreeSet<NaiveDate>, filter: DayFilter, today: NaiveDate) -> StreakSummary {
    StreakSummary {
        domain: match filter {
            DayFilter::Any => None,
            DayFilter::Domain(domain) => Some(domain),
        },
        current: current_streak(days, today),
        longest: longest_streak(days),
        active_days: days.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn days(items: &[&str]) -> BTreeSet<NaiveDate> {
        items.iter().map(|s| date(s)).collect()
    }

    fn ledger(day: &str, tags: &[&str]) -> TaskLedger {
        TaskLedger {
            user_id: "ana".to_string(),
            date: date(day),
            tasks: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_active_days_by_domain() {
        let ledgers = vec![
            ledger("2025-03-01", &["meal-6pm"]),
            ledger("2025-03-02", &["gym-workout", "water"]),
            ledger("2025-03-03", &[]),
        ];

        assert_eq!(active_days(&ledgers, DayFilter::Any), days(&["2025-03-01", "2025-03-02"]));
        assert_eq!(
            active_days(&ledgers, DayFilter::Domain(Domain::Gym)),
            days(&["2025-03-02"])
        );
    }

    #[test]
    fn test_current_streak() {
        let active = days(&["2025-02-27", "2025-03-01", "2025-03-02", "2025-03-03"]);

        assert_eq!(current_streak(&active, date("2025-03-03")), 3);
        // Today not logged yet keeps yesterday's streak alive
        assert_eq!(current_streak(&active, date("2025-03-04")), 3);
        assert_eq!(current_streak(&active, date("2025-03-05")), 0);
        assert_eq!(current_streak(&BTreeSet::new(), date("2025-03-05")), 0);
    }

    #[test]
    fn test_longest_streak_across_month_boundary() {
        let active = days(&[
            "2025-02-27",
            "2025-02-28",
            "2025-03-01",
            "2025-03-02",
            "2025-03-10",
            "2025-03-11",
        ]);
        assert_eq!(longest_streak(&active), 4);
        assert_eq!(longest_streak(&BTreeSet::new()), 0);
    }

    #[test]
    fn test_summarize() {
        let active = days(&["2025-03-01", "2025-03-02"]);
        let summary = summarize(&active, DayFilter::Domain(Domain::Water), date("2025-03-02"));
        assert_eq!(
            summary,
            StreakSummary {
                domain: Some(Domain::Water),
                current: 2,
                longest: 2,
                active_days: 2,
            }
        );
    }
}
