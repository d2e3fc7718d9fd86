//! Reusable workout templates ranked by recency of use.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Map};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::RecencyPolicy;
use crate::entity::{Exercise, TemplateInput, WorkoutTemplate};
use crate::error::{LedgerError, Result};
use crate::storage::{DocumentStore, Filter};
use crate::undo::EditBuffer;

pub const TEMPLATES: &str = "templates";

#[derive(Clone)]
pub struct TemplateStore {
    store: Arc<dyn DocumentStore>,
    policy: RecencyPolicy,
}

impl TemplateStore {
    pub fn new(store: Arc<dyn DocumentStore>, policy: RecencyPolicy) -> Self {
        Self { store, policy }
    }

    /// Templates of one workout type, most recently used first.
    pub fn list_for_type(&self, user_id: &str, workout_type: &str) -> Result<Vec<WorkoutTemplate>> {
        let filters = [
            Filter::eq("user_id", user_id),
            Filter::eq("workout_type", workout_type),
        ];
        let mut templates = self
            .store
            .query(TEMPLATES, &filters, None)?
            .into_iter()
            .map(|(_, doc)| Ok(serde_json::from_value(doc.value)?))
            .collect::<Result<Vec<WorkoutTemplate>>>()?;
        templates.sort_by(WorkoutTemplate::recency_cmp);
        Ok(templates)
    }

    /// Read a template without touching its recency.
    pub fn load(&self, id: &Uuid) -> Result<Option<WorkoutTemplate>> {
        match self.store.get(TEMPLATES, &id.to_string())? {
            Some(doc) => Ok(Some(serde_json::from_value(doc.value)?)),
            None => Ok(None),
        }
    }

    /// Read a template that is about to be applied to a workout, bumping
    /// `last_used` when the policy counts loads as use.
    pub fn load_for_use(&self, id: &Uuid) -> Result<Option<WorkoutTemplate>> {
        let Some(mut template) = self.load(id)? else {
            return Ok(None);
        };
        if self.policy == RecencyPolicy::BumpOnSaveAndLoad {
            template.last_used = Utc::now();
            let mut fields = Map::new();
            fields.insert("last_used".to_string(), json!(template.last_used));
            self.store.update(TEMPLATES, &id.to_string(), fields)?;
            debug!(%id, "template recency bumped on load");
        }
        Ok(Some(template))
    }

    /// Create a template, or overwrite `existing_id` and bump its recency.
    pub fn save_or_update(&self, user_id: &str, input: TemplateInput, existing_id: Option<&Uuid>) -> Result<Uuid> {
        if input.name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("template name is required".to_string()));
        }
        if input.workout_type.trim().is_empty() {
            return Err(LedgerError::InvalidInput("workout type is required".to_string()));
        }

        let template = match existing_id {
            Some(id) => {
                let mut template = self
                    .load(id)?
                    .filter(|t| t.user_id == user_id)
                    .ok_or_else(|| LedgerError::NotFound(format!("template {}", id)))?;
                template.workout_type = input.workout_type;
                template.name = input.name;
                template.exercises = input.exercises;
                template.last_used = Utc::now();
                template
            }
            None => WorkoutTemplate::new(user_id, input),
        };

        self.store
            .set(TEMPLATES, &template.id.to_string(), serde_json::to_value(&template)?)?;
        info!(id = %template.id, name = %template.name, updated = existing_id.is_some(), "template saved");
        Ok(template.id)
    }

    /// Delete a template owned by `user_id`.
    pub fn delete(&self, id: &Uuid, user_id: &str) -> Result<()> {
        let owned = self.load(id)?.is_some_and(|t| t.user_id == user_id);
        if !owned || !self.store.delete(TEMPLATES, &id.to_string())? {
            return Err(LedgerError::NotFound(format!("template {}", id)));
        }
        info!(%id, "template deleted");
        Ok(())
    }
}

/// The gym editor's template selection and working exercise list.
pub struct TemplateSelector {
    templates: TemplateStore,
    user_id: String,
    workout_type: Option<String>,
    selected: Option<Uuid>,
    pub working: Vec<Exercise>,
    edits: EditBuffer<Exercise>,
}

impl TemplateSelector {
    /// `undo_window` bounds how long a deleted exercise row can be restored.
    pub fn new(templates: TemplateStore, user_id: &str, undo_window: Duration) -> Self {
        Self {
            templates,
            user_id: user_id.to_string(),
            workout_type: None,
            selected: None,
            working: Vec::new(),
            edits: EditBuffer::new(undo_window),
        }
    }

    pub fn selected(&self) -> Option<&Uuid> {
        self.selected.as_ref()
    }

    pub fn workout_type(&self) -> Option<&str> {
        self.workout_type.as_deref()
    }

    /// Switch workout category and auto-load its most recently used
    /// template. With no templates the working set becomes empty.
    pub fn change_category(&mut self, workout_type: &str) -> Result<Option<WorkoutTemplate>> {
        self.selected = None;
        self.workout_type = Some(workout_type.to_string());

        let candidates = self.templates.list_for_type(&self.user_id, workout_type)?;
        let loaded = match candidates.first() {
            Some(first) => self.templates.load_for_use(&first.id)?,
            None => None,
        };

        self.edits.clear();
        match &loaded {
            Some(template) => {
                self.working = template.exercises.clone();
                self.selected = Some(template.id);
            }
            None => self.working.clear(),
        }
        debug!(workout_type, selected = ?self.selected, "category changed");
        Ok(loaded)
    }

    /// Load a specific template into the working set.
    pub fn select(&mut self, id: &Uuid) -> Result<WorkoutTemplate> {
        let template = self
            .templates
            .load_for_use(id)?
            .filter(|t| t.user_id == self.user_id)
            .ok_or_else(|| LedgerError::NotFound(format!("template {}", id)))?;
        self.edits.clear();
        self.working = template.exercises.clone();
        self.workout_type = Some(template.workout_type.clone());
        self.selected = Some(template.id);
        Ok(template)
    }

    /// Remove an exercise row from the working set. Returns the row of an
    /// earlier deletion that became permanent, if any.
    pub fn delete_exercise(&mut self, index: usize, now: Instant) -> Result<Option<Exercise>> {
        self.edits.delete(&mut self.working, index, now)
    }

    /// Put the last deleted row back at its original position while the
    /// undo window is open.
    pub fn undo_delete(&mut self, now: Instant) -> bool {
        self.edits.undo(&mut self.working, now)
    }

    pub fn pending_delete(&self) -> Option<(&Exercise, usize)> {
        self.edits.pending()
    }

    /// Save the working set, overwriting the selected template when
    /// `update_selected` is set, otherwise as a new template.
    pub fn save_working(&mut self, name: &str, update_selected: bool) -> Result<Uuid> {
        let workout_type = self
            .workout_type
            .clone()
            .ok_or_else(|| LedgerError::InvalidInput("no workout category selected".to_string()))?;
        let existing = if update_selected { self.selected } else { None };

        let id = self.templates.save_or_update(
            &self.user_id,
            TemplateInput {
                workout_type,
                name: name.to_string(),
                exercises: self.working.clone(),
            },
            existing.as_ref(),
        )?;
        self.selected = Some(id);
        Ok(id)
    }
}
