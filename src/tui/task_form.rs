//! Task form handling for the terminal user interface.
//!
//! The same form creates and edits tasks. Text fields take free input;
//! status, priority and parent are selectors cycled with left/right.
//! Submitting turns the form into a full [`Task`] record for the store.

use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::fields::{Priority, Status};
use crate::format::parse_due_input;
use crate::hierarchy::HierarchyIndex;
use crate::store::TaskStore;
use crate::task::{split_labels, Task};
use crate::tui::input::InputField;

/// Field order, top to bottom.
pub const TITLE_FIELD: usize = 0;
pub const DESCRIPTION_FIELD: usize = 1;
pub const STATUS_FIELD: usize = 2;
pub const PRIORITY_FIELD: usize = 3;
pub const DUE_FIELD: usize = 4;
pub const PARENT_FIELD: usize = 5;
pub const LABELS_FIELD: usize = 6;
const FIELD_COUNT: usize = 7;

/// A task that may be chosen as parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentOption {
    pub id: String,
    pub title: String,
}

/// Task form for creating or editing a task.
#[derive(Debug, Clone)]
pub struct TaskForm {
    /// The task being edited; `None` while creating.
    editing: Option<Task>,
    pub title: InputField,
    pub description: InputField,
    pub due: InputField,
    pub labels: InputField,
    pub status: usize,
    pub priority: usize,
    /// Index into `parent_options` plus one; zero means no parent.
    pub parent: usize,
    pub parent_options: Vec<ParentOption>,
    pub current_field: usize,
}

impl TaskForm {
    /// An empty form for a new root task due today.
    pub fn new(tasks: &[Task], today: NaiveDate) -> Self {
        Self {
            editing: None,
            title: InputField::new(),
            description: InputField::new(),
            due: InputField::with_value(&today.to_string()),
            labels: InputField::new(),
            status: Status::Incomplete.index(),
            priority: position(&Priority::ALL, Priority::Medium),
            parent: 0,
            parent_options: tasks
                .iter()
                .map(|t| ParentOption {
                    id: t.id.clone(),
                    title: t.title.clone(),
                })
                .collect(),
            current_field: TITLE_FIELD,
        }
    }

    /// A new-task form with `parent_id` preselected.
    pub fn new_with_parent(tasks: &[Task], parent_id: &str, today: NaiveDate) -> Self {
        let mut form = Self::new(tasks, today);
        form.select_parent(parent_id);
        form
    }

    /// A form populated from an existing task. The task itself and its
    /// descendants are left out of the parent choices.
    pub fn from_task(task: &Task, tasks: &[Task]) -> Self {
        let index = HierarchyIndex::build(tasks);
        let excluded = index.descendants(&task.id);
        let mut parent_options: Vec<ParentOption> = tasks
            .iter()
            .filter(|t| t.id != task.id && !excluded.contains(t.id.as_str()))
            .map(|t| ParentOption {
                id: t.id.clone(),
                title: t.title.clone(),
            })
            .collect();

        // keep a dangling parent selectable so saving does not silently drop it
        if let Some(pid) = task.parent_id.as_deref() {
            if !tasks.iter().any(|t| t.id == pid) {
                parent_options.push(ParentOption {
                    id: pid.to_string(),
                    title: "(missing task)".to_string(),
                });
            }
        }

        let mut form = Self {
            editing: Some(task.clone()),
            title: InputField::with_value(&task.title),
            description: InputField::with_value(&task.description),
            due: InputField::with_value(
                &task.due_date.map(|d| d.to_string()).unwrap_or_default(),
            ),
            labels: InputField::with_value(&task.labels.join(", ")),
            status: task.status.index(),
            priority: position(&Priority::ALL, task.priority),
            parent: 0,
            parent_options,
            current_field: TITLE_FIELD,
        };
        if let Some(pid) = task.parent_id.as_deref() {
            form.select_parent(pid);
        }
        form
    }

    pub fn is_edit(&self) -> bool {
        self.editing.is_some()
    }

    /// Id of the task being edited.
    pub fn editing_id(&self) -> Option<&str> {
        self.editing.as_ref().map(|t| t.id.as_str())
    }

    fn select_parent(&mut self, parent_id: &str) {
        if let Some(i) = self.parent_options.iter().position(|o| o.id == parent_id) {
            self.parent = i + 1;
        }
    }

    pub fn selected_status(&self) -> Status {
        Status::ALL[self.status % Status::ALL.len()]
    }

    pub fn selected_priority(&self) -> Priority {
        Priority::ALL[self.priority % Priority::ALL.len()]
    }

    pub fn selected_parent(&self) -> Option<&ParentOption> {
        self.parent
            .checked_sub(1)
            .and_then(|i| self.parent_options.get(i))
    }

    /// Label shown in the parent selector.
    pub fn parent_label(&self) -> String {
        match self.selected_parent() {
            Some(p) => format!("{} ({})", p.title, p.id),
            None => "None".to_string(),
        }
    }

    pub fn next_field(&mut self) {
        self.current_field = (self.current_field + 1) % FIELD_COUNT;
    }

    pub fn prev_field(&mut self) {
        self.current_field = (self.current_field + FIELD_COUNT - 1) % FIELD_COUNT;
    }

    /// The text input under focus, if the focused field is not a selector.
    pub fn active_input(&self) -> Option<&InputField> {
        match self.current_field {
            TITLE_FIELD => Some(&self.title),
            DESCRIPTION_FIELD => Some(&self.description),
            DUE_FIELD => Some(&self.due),
            LABELS_FIELD => Some(&self.labels),
            _ => None,
        }
    }

    fn active_input_mut(&mut self) -> Option<&mut InputField> {
        match self.current_field {
            TITLE_FIELD => Some(&mut self.title),
            DESCRIPTION_FIELD => Some(&mut self.description),
            DUE_FIELD => Some(&mut self.due),
            LABELS_FIELD => Some(&mut self.labels),
            _ => None,
        }
    }

    pub fn handle_char(&mut self, c: char) {
        if let Some(field) = self.active_input_mut() {
            field.handle_char(c);
        }
    }

    pub fn handle_backspace(&mut self) {
        if let Some(field) = self.active_input_mut() {
            field.handle_backspace();
        }
    }

    pub fn handle_delete(&mut self) {
        if let Some(field) = self.active_input_mut() {
            field.handle_delete();
        }
    }

    pub fn handle_home_end(&mut self, end: bool) {
        if let Some(field) = self.active_input_mut() {
            if end {
                field.end();
            } else {
                field.home();
            }
        }
    }

    /// Left/right moves the cursor in text fields and cycles selectors.
    pub fn handle_left_right(&mut self, right: bool) {
        let step = |value: usize, len: usize| {
            if right {
                (value + 1) % len
            } else {
                (value + len - 1) % len
            }
        };
        match self.current_field {
            STATUS_FIELD => self.status = step(self.status, Status::ALL.len()),
            PRIORITY_FIELD => self.priority = step(self.priority, Priority::ALL.len()),
            PARENT_FIELD => self.parent = step(self.parent, self.parent_options.len() + 1),
            _ => {
                if let Some(field) = self.active_input_mut() {
                    if right {
                        field.move_cursor_right();
                    } else {
                        field.move_cursor_left();
                    }
                }
            }
        }
    }

    /// Build the record to save. Editing keeps the id and creation time of
    /// the original; creating draws a fresh id from the store.
    pub fn to_task(&self, store: &TaskStore, today: NaiveDate) -> Result<Task> {
        let title = self.title.value.trim();
        if title.is_empty() {
            return Err(crate::error::StoreError::EmptyTitle.into());
        }
        let due_input = self.due.value.trim();
        // a cleared field means no due date
        let due_date = if due_input.is_empty() {
            None
        } else {
            Some(
                parse_due_input(due_input, today)
                    .ok_or_else(|| Error::InvalidDue(due_input.to_string()))?,
            )
        };

        let mut task = match &self.editing {
            Some(original) => original.clone(),
            None => Task::new(store.fresh_id(), title),
        };
        task.title = title.to_string();
        task.description = self.description.value.trim().to_string();
        task.status = self.selected_status();
        task.priority = self.selected_priority();
        task.due_date = due_date;
        task.parent_id = self.selected_parent().map(|p| p.id.clone());
        task.labels = split_labels(std::slice::from_ref(&self.labels.value));
        Ok(task)
    }
}

fn position<T: PartialEq + Copy>(all: &[T], value: T) -> usize {
    all.iter().position(|v| *v == value).unwrap_or(0)
}
