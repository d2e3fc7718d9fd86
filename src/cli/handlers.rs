use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use super::commands::{LedgerAction, RecordAction, TemplateAction};
use crate::analytics::{summarize, DayFilter};
use crate::cache::CalendarCache;
use crate::config::Config;
use crate::entity::{Exercise, TemplateInput};
use crate::error::{LedgerError, Result};
use crate::ledger::{Domain, DomainWriteAdapter, TaskLedger};
use crate::records::DetailedRecord;
use crate::storage::{LoroStore, DATA_DIR};
use crate::sync::{DomainService, ScheduleSync};
use crate::templates::{TemplateSelector, TemplateStore};

/// Environment variable holding the tracing filter
pub const LOG_ENV: &str = "DAYLEDGER_LOG";

/// Find the project root by looking for .dayledger/ or .git/
fn find_project_root() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    let mut current = cwd.as_path();
    loop {
        if current.join(DATA_DIR).exists() || current.join(".git").exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return cwd,
        }
    }
}

/// Install the stderr tracing subscriber. `DAYLEDGER_LOG` wins over the
/// project's configured filter.
pub fn init_logging() {
    let configured = Config::load(&find_project_root().join(DATA_DIR))
        .map(|c| c.log_filter)
        .unwrap_or_else(|_| Config::default().log_filter);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(configured));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

struct Project {
    store: Arc<LoroStore>,
    config: Config,
}

impl Project {
    fn open() -> Result<Self> {
        let root = find_project_root();
        let store = LoroStore::open(&root)?;
        let config = Config::load(&root.join(DATA_DIR))?;
        Ok(Self {
            store: Arc::new(store),
            config,
        })
    }

    fn data_dir(&self) -> Result<&Path> {
        self.store.data_dir().ok_or(LedgerError::NotInitialized)
    }

    fn sync(&self) -> ScheduleSync {
        ScheduleSync::new(self.store.clone(), &self.config)
    }

    fn templates(&self) -> TemplateStore {
        TemplateStore::new(self.store.clone(), self.config.recency_policy)
    }

    /// Calendar cache brought up to date with the store
    fn calendar(&self) -> Result<CalendarCache> {
        let mut cache = CalendarCache::open(self.data_dir()?)?;
        let ledger = self.sync().ledger;
        cache.sync_from_store(&ledger.all()?, &ledger.version_hash())?;
        Ok(cache)
    }
}

fn parse_date(date: Option<String>) -> Result<NaiveDate> {
    match date {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .map_err(|_| LedgerError::InvalidInput(format!("invalid date '{}', expected YYYY-MM-DD", s))),
        None => Ok(Local::now().date_naive()),
    }
}

fn parse_domain(s: &str) -> Result<Domain> {
    Domain::from_str(s).map_err(LedgerError::InvalidInput)
}

fn read_stdin_json() -> Result<Value> {
    if atty::is(atty::Stream::Stdin) {
        return Err(LedgerError::InvalidInput(
            "expected a JSON document on stdin".to_string(),
        ));
    }
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    Ok(serde_json::from_str(&input)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_ledger(ledger: &TaskLedger) {
    if ledger.tasks.is_empty() {
        println!("{}  (nothing scheduled)", ledger.date);
    } else {
        println!("{}  {}", ledger.date, ledger.tasks.join(", "));
    }
}

pub fn handle_init() -> Result<()> {
    let root = env::current_dir()?;

    let store = LoroStore::init(&root)?;
    if let Some(dir) = store.data_dir() {
        Config::default().save(dir)?;
    }

    println!("Initialized dayledger project in {}", root.display());
    Ok(())
}

pub fn handle_ledger(user: &str, action: LedgerAction) -> Result<()> {
    let project = Project::open()?;
    let sync = project.sync();

    let (ledger, json) = match action {
        LedgerAction::Show { date, json } => (sync.ledger.load(user, parse_date(date)?)?, json),
        LedgerAction::Add {
            domain,
            tag,
            date,
            json,
        } => {
            let adapter = DomainWriteAdapter::new(parse_domain(&domain)?, sync.ledger.clone());
            (adapter.add_task(user, &tag, parse_date(date)?)?, json)
        }
        LedgerAction::Remove {
            domain,
            tag,
            date,
            json,
        } => {
            let adapter = DomainWriteAdapter::new(parse_domain(&domain)?, sync.ledger.clone());
            (adapter.remove_task(user, &tag, parse_date(date)?)?, json)
        }
    };

    if json {
        print_json(&ledger)
    } else {
        print_ledger(&ledger);
        Ok(())
    }
}

fn handle_record<R, F>(service: &DomainService<R>, user: &str, action: RecordAction, prepare: F) -> Result<()>
where
    R: DetailedRecord,
    F: FnOnce(&mut Value, NaiveDate),
{
    match action {
        RecordAction::Save { date, json } => {
            let date = parse_date(date)?;
            let mut doc = read_stdin_json()?;
            prepare(&mut doc, date);
            let record: R = serde_json::from_value(doc)?;

            let ledger = service.save(user, date, &record)?;
            if json {
                print_json(&ledger)
            } else {
                println!("Saved {} record for {}", R::DOMAIN, date);
                print_ledger(&ledger);
                Ok(())
            }
        }
        RecordAction::Show { date, json } => {
            let date = parse_date(date)?;
            let record = service
                .load(user, date)?
                .ok_or_else(|| LedgerError::NotFound(format!("{} record for {}", R::DOMAIN, date)))?;
            if json {
                print_json(&record)
            } else {
                println!("{}", serde_json::to_string_pretty(&record)?);
                Ok(())
            }
        }
    }
}

pub fn handle_meal(user: &str, action: RecordAction) -> Result<()> {
    let sync = Project::open()?.sync();
    handle_record(&sync.meals, user, action, |_, _| {})
}

pub fn handle_workout(user: &str, action: RecordAction) -> Result<()> {
    let sync = Project::open()?.sync();
    handle_record(&sync.workouts, user, action, |doc, date| {
        if let Value::Object(map) = doc {
            map.entry("scheduled_for").or_insert_with(|| json!(date));
        }
    })
}

pub fn handle_water(user: &str, glasses: u32, date: Option<String>, json: bool) -> Result<()> {
    let sync = Project::open()?.sync();
    let date = parse_date(date)?;
    let ledger = sync.log_water(user, date, glasses)?;

    if json {
        print_json(&ledger)
    } else {
        println!("Logged {} glasses for {}", glasses, date);
        print_ledger(&ledger);
        Ok(())
    }
}

pub fn handle_template(user: &str, action: TemplateAction) -> Result<()> {
    let project = Project::open()?;
    let templates = project.templates();

    match action {
        TemplateAction::List { workout_type, json } => {
            let list = templates.list_for_type(user, &workout_type)?;
            if json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No {} templates", workout_type);
            }
            for t in &list {
                println!(
                    "{} ({}) - {} exercises, last used {}",
                    t.name,
                    &t.id.to_string()[..8],
                    t.exercises.len(),
                    t.last_used.format("%Y-%m-%d %H:%M")
                );
            }
            Ok(())
        }
        TemplateAction::Save {
            workout_type,
            name,
            update,
            json,
        } => {
            let exercises: Vec<Exercise> = serde_json::from_value(read_stdin_json()?)?;
            let existing = update.as_deref().map(parse_uuid).transpose()?;
            let id = templates.save_or_update(
                user,
                TemplateInput {
                    workout_type,
                    name,
                    exercises,
                },
                existing.as_ref(),
            )?;
            if json {
                print_json(&json!({ "id": id }))
            } else {
                println!("Saved template {}", id);
                Ok(())
            }
        }
        TemplateAction::Delete { id } => {
            let id = parse_uuid(&id)?;
            templates.delete(&id, user)?;
            println!("Deleted template {}", id);
            Ok(())
        }
        TemplateAction::Select { workout_type, json } => {
            let mut selector = TemplateSelector::new(templates, user, project.config.undo_window());
            let loaded = selector.change_category(&workout_type)?;
            if json {
                return print_json(&json!({
                    "template": loaded,
                    "exercises": selector.working,
                }));
            }
            match loaded {
                Some(t) => {
                    println!("Loaded {} ({})", t.name, t.id);
                    for e in &selector.working {
                        println!("  {} {}x{} @ {}", e.name, e.sets, e.reps, e.weight);
                    }
                }
                None => println!("No {} templates, starting empty", workout_type),
            }
            Ok(())
        }
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|_| LedgerError::InvalidInput(format!("invalid template id '{}'", s)))
}

pub fn handle_calendar(user: &str, month: Option<String>, json: bool) -> Result<()> {
    let (year, month) = match month {
        Some(s) => {
            let first = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d")
                .map_err(|_| LedgerError::InvalidInput(format!("invalid month '{}', expected YYYY-MM", s)))?;
            (first.year(), first.month())
        }
        None => {
            let today = Local::now().date_naive();
            (today.year(), today.month())
        }
    };

    let days = Project::open()?.calendar()?.month(user, year, month)?;
    if json {
        let days: Vec<_> = days
            .into_iter()
            .map(|(date, tags)| json!({ "date": date, "tasks": tags }))
            .collect();
        return print_json(&days);
    }

    if days.is_empty() {
        println!("Nothing scheduled in {}-{:02}", year, month);
    }
    for (date, tags) in days {
        println!("{}  {}", date, tags.join(", "));
    }
    Ok(())
}

pub fn handle_streak(user: &str, domain: Option<String>, json: bool) -> Result<()> {
    let domain = domain.as_deref().map(parse_domain).transpose()?;
    let filter = domain.map_or(DayFilter::Any, DayFilter::Domain);

    let days = Project::open()?.calendar()?.active_days(user, domain)?;
    let summary = summarize(&days, filter, Local::now().date_naive());

    if json {
        return print_json(&summary);
    }
    let label = domain.map_or_else(|| "any activity".to_string(), |d| d.to_string());
    println!(
        "Streak ({}): current {} days, longest {} days, {} active days",
        label, summary.current, summary.longest, summary.active_days
    );
    Ok(())
}
