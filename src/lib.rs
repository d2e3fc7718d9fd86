pub mod analytics;
pub mod cache;
pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod ledger;
pub mod records;
pub mod storage;
pub mod sync;
pub mod templates;
pub mod undo;

pub use cache::CalendarCache;
pub use error::{LedgerError, Result};
pub use sync::ScheduleSync;
