use std::collections::BTreeSet;
use std::path::Path;

use chrono::{Months, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{LedgerError, Result};
use crate::ledger::{Domain, TaskLedger};

const CACHE_DB: &str = "cache.db";

/// SQLite index of ledger tags for calendar and streak queries
pub struct CalendarCache {
    conn: Connection,
}

impl CalendarCache {
    /// Open or create the cache database
    pub fn open(data_dir: &Path) -> Result<Self> {
        let conn = Connection::open(data_dir.join(CACHE_DB))?;

        let cache = Self { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    pub fn in_memory() -> Result<Self> {
        let cache = Self {
            conn: Connection::open_in_memory()?,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<()> {
        // Metadata table for version tracking
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS ledger_tags (
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                tag TEXT NOT NULL,
                domain TEXT,
                position INTEGER NOT NULL,
                PRIMARY KEY (user_id, date, tag)
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_ledger_tags_user_domain ON ledger_tags(user_id, domain, date)",
            [],
        )?;

        Ok(())
    }

    /// Get the store version the cache was built from
    pub fn get_store_version(&self) -> Result<Option<String>> {
        let result: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'store_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    pub fn set_store_version(&self, version: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('store_version', ?1)",
            [version],
        )?;
        Ok(())
    }

    /// Replace the indexed tags of one ledger day
    pub fn index_ledger(&mut self, ledger: &TaskLedger) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM ledger_tags WHERE user_id = ?1 AND date = ?2",
            params![ledger.user_id, ledger.date.to_string()],
        )?;
        insert_tags(&tx, ledger)?;
        tx.commit()?;
        Ok(())
    }

    /// Clear all cached data (for full rebuild)
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM ledger_tags", [])?;
        self.conn.execute("DELETE FROM meta", [])?;
        Ok(())
    }

    /// Rebuild the index when the store has moved past the cached version.
    /// Returns true if a full reindex was performed
    pub fn sync_from_store(&mut self, ledgers: &[TaskLedger], store_version: &str) -> Result<bool> {
        if self.get_store_version()?.as_deref() == Some(store_version) {
            debug!("calendar cache up to date");
            return Ok(false);
        }

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM ledger_tags", [])?;
        for ledger in ledgers {
            insert_tags(&tx, ledger)?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('store_version', ?1)",
            [store_version],
        )?;
        tx.commit()?;

        info!(days = ledgers.len(), "calendar cache rebuilt");
        Ok(true)
    }

    /// Tagged days of one calendar month, in date order
    pub fn month(&self, user_id: &str, year: i32, month: u32) -> Result<Vec<(NaiveDate, Vec<String>)>> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| LedgerError::InvalidInput(format!("no such month: {}-{}", year, month)))?;
        let last = first
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or_else(|| LedgerError::InvalidInput(format!("no such month: {}-{}", year, month)))?;

        let mut stmt = self.conn.prepare(
            "SELECT date, tag FROM ledger_tags
             WHERE user_id = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date, position",
        )?;
        let rows = stmt
            .query_map(params![user_id, first.to_string(), last.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut days: Vec<(NaiveDate, Vec<String>)> = Vec::new();
        for (date, tag) in rows {
            let date = parse_date(&date)?;
            match days.last_mut() {
                Some((last_date, tags)) if *last_date == date => tags.push(tag),
                _ => days.push((date, vec![tag])),
            }
        }
        Ok(days)
    }

    /// Days with at least one tag, optionally restricted to one domain
    pub fn active_days(&self, user_id: &str, domain: Option<Domain>) -> Result<BTreeSet<NaiveDate>> {
        let dates: Vec<String> = match domain {
            Some(domain) => {
                let mut stmt = self.conn.prepare(
                    "SELECT DISTINCT date FROM ledger_tags WHERE user_id = ?1 AND domain = ?2",
                )?;
                let rows = stmt.query_map(params![user_id, domain.to_string()], |row| row.get(0))?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
            None => {
                let mut stmt = self
                    .conn
                    .prepare("SELECT DISTINCT date FROM ledger_tags WHERE user_id = ?1")?;
                let rows = stmt.query_map([user_id], |row| row.get(0))?;
                rows.collect::<std::result::Result<Vec<_>, _>>()?
            }
        };
        dates.iter().map(|d| parse_date(d)).collect()
    }
}

/// Insert one ledger day's tags with their owning domain and position
fn insert_tags(conn: &Connection, ledger: &TaskLedger) -> Result<()> {
    let date = ledger.date.to_string();
    let mut stmt = conn.prepare_cached(
        "INSERT OR REPLACE INTO ledger_tags (user_id, date, tag, domain, position)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (position, tag) in ledger.tasks.iter().enumerate() {
        stmt.execute(params![
            ledger.user_id,
            date,
            tag,
            Domain::owner_of(tag).map(|d| d.to_string()),
            position as i64,
        ])?;
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| LedgerError::Storage(format!("bad cached date '{}': {}", s, e)))
}

// Implement From for rusqlite::Error
impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        LedgerError::Storage(format!("SQLite error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn ledger(user: &str, day: &str, tags: &[&str]) -> TaskLedger {
        TaskLedger {
            user_id: user.to_string(),
            date: date(day),
            tasks: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_cache_open_creates_db() {
        let tmp = TempDir::new().unwrap();
        let _cache = CalendarCache::open(tmp.path()).unwrap();
        assert!(tmp.path().join("cache.db").exists());
    }

    #[test]
    fn test_version_tracking() {
        let cache = CalendarCache::in_memory().unwrap();

        assert!(cache.get_store_version().unwrap().is_none());

        cache.set_store_version("abc123").unwrap();
        assert_eq!(cache.get_store_version().unwrap(), Some("abc123".to_string()));

        cache.set_store_version("def456").unwrap();
        assert_eq!(cache.get_store_version().unwrap(), Some("def456".to_string()));
    }

    #[test]
    fn test_month_groups_tags_in_ledger_order() {
        let mut cache = CalendarCache::in_memory().unwrap();
        cache.index_ledger(&ledger("ana", "2025-02-28", &["water"])).unwrap();
        cache
            .index_ledger(&ledger("ana", "2025-03-01", &["meal-6pm", "gym-workout"]))
            .unwrap();
        cache.index_ledger(&ledger("ana", "2025-03-31", &["water"])).unwrap();
        cache.index_ledger(&ledger("bob", "2025-03-02", &["water"])).unwrap();

        let month = cache.month("ana", 2025, 3).unwrap();
        assert_eq!(
            month,
            vec![
                (date("2025-03-01"), vec!["meal-6pm".to_string(), "gym-workout".to_string()]),
                (date("2025-03-31"), vec!["water".to_string()]),
            ]
        );
        assert!(cache.month("ana", 2025, 13).is_err());
    }

    #[test]
    fn test_reindexing_a_day_replaces_its_tags() {
        let mut cache = CalendarCache::in_memory().unwrap();
        cache
            .index_ledger(&ledger("ana", "2025-03-01", &["meal-6pm", "gym-workout"]))
            .unwrap();
        cache.index_ledger(&ledger("ana", "2025-03-01", &["meal-6pm"])).unwrap();

        assert!(cache.active_days("ana", Some(Domain::Gym)).unwrap().is_empty());
        assert_eq!(cache.active_days("ana", Some(Domain::Meal)).unwrap().len(), 1);
    }

    #[test]
    fn test_active_days_with_unowned_tags() {
        let mut cache = CalendarCache::in_memory().unwrap();
        cache.index_ledger(&ledger("ana", "2025-03-01", &["yoga"])).unwrap();
        cache.index_ledger(&ledger("ana", "2025-03-02", &["water"])).unwrap();

        assert_eq!(cache.active_days("ana", None).unwrap().len(), 2);
        assert_eq!(
            cache.active_days("ana", Some(Domain::Water)).unwrap(),
            [date("2025-03-02")].into_iter().collect::<BTreeSet<_>>()
        );
    }

    #[test]
    fn test_single_day_and_full_reindex_agree() {
        let ledgers = vec![
            ledger("ana", "2025-03-01", &["meal-8am", "yoga", "gym-workout"]),
            ledger("ana", "2025-03-02", &["water", "meal-6pm"]),
        ];

        let mut by_day = CalendarCache::in_memory().unwrap();
        for l in &ledgers {
            by_day.index_ledger(l).unwrap();
        }
        let mut full = CalendarCache::in_memory().unwrap();
        full.sync_from_store(&ledgers, "v1").unwrap();

        assert_eq!(by_day.month("ana", 2025, 3).unwrap(), full.month("ana", 2025, 3).unwrap());
        for domain in Domain::ALL {
            assert_eq!(
                by_day.active_days("ana", Some(domain)).unwrap(),
                full.active_days("ana", Some(domain)).unwrap()
            );
        }
        assert_eq!(
            full.month("ana", 2025, 3).unwrap()[0].1,
            vec!["meal-8am".to_string(), "yoga".to_string(), "gym-workout".to_string()]
        );
    }

    #[test]
    fn test_sync_from_store() {
        let mut cache = CalendarCache::in_memory().unwrap();
        let ledgers = vec![
            ledger("ana", "2025-03-01", &["water"]),
            ledger("ana", "2025-03-02", &["water"]),
        ];

        // First sync should reindex
        assert!(cache.sync_from_store(&ledgers, "v1").unwrap());
        assert_eq!(cache.active_days("ana", None).unwrap().len(), 2);

        // Same version should skip
        assert!(!cache.sync_from_store(&[], "v1").unwrap());
        assert_eq!(cache.active_days("ana", None).unwrap().len(), 2);

        // New version should reindex
        assert!(cache.sync_from_store(&ledgers[..1], "v2").unwrap());
        assert_eq!(cache.active_days("ana", None).unwrap().len(), 1);
    }
}
