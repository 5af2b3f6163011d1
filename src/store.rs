//! The task store: the in-memory collection plus the mutation façade.
//!
//! All changes go through [`TaskStore`]. Each mutating call updates the
//! ordered collection and then writes the whole collection back to the slot.
//! If that write fails the error is returned, but the in-memory change stays;
//! the next successful write brings the slot back in line.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::db::{load_tasks, save_tasks, Storage};
use crate::error::StoreError;
use crate::fields::{Priority, Status};
use crate::task::{generate_id, Task};

pub const WELCOME_ID: &str = "1";
pub const WELCOME_TITLE: &str = "Welcome to TaskFlow Pro!";
const WELCOME_DESCRIPTION: &str = "Try adding your first task or use AI to break this one down.";
const WELCOME_LABEL: &str = "Getting Started";

/// Authoritative ordered task collection bound to its persistence slot.
pub struct TaskStore {
    tasks: Vec<Task>,
    storage: Box<dyn Storage>,
}

impl TaskStore {
    /// Load the collection from `storage`, seeding the welcome task when it is empty.
    pub fn open(storage: Box<dyn Storage>) -> Result<Self, StoreError> {
        let tasks = load_tasks(storage.as_ref())?;
        let mut store = TaskStore { tasks, storage };
        if store.tasks.is_empty() {
            info!(location = %store.storage.location(), "no saved tasks, seeding welcome task");
            store.tasks.push(welcome_task());
            store.persist()?;
        } else {
            info!(count = store.tasks.len(), "loaded tasks");
        }
        Ok(store)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// A fresh id not used by any task in the store.
    pub fn fresh_id(&self) -> String {
        loop {
            let id = generate_id();
            if !self.contains(&id) {
                return id;
            }
        }
    }

    /// Resolve a user supplied identifier: exact id, then unique id prefix,
    /// then unique case-insensitive title.
    pub fn resolve(&self, identifier: &str) -> Result<&Task, String> {
        let identifier = identifier.trim();
        if let Some(task) = self.get(identifier) {
            return Ok(task);
        }

        let by_prefix: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.id.starts_with(identifier))
            .collect();
        if by_prefix.len() == 1 && !identifier.is_empty() {
            return Ok(by_prefix[0]);
        }

        let lowered = identifier.to_lowercase();
        let by_title: Vec<&Task> = self
            .tasks
            .iter()
            .filter(|t| t.title.to_lowercase() == lowered)
            .collect();
        match by_title.len() {
            1 => Ok(by_title[0]),
            0 if by_prefix.len() > 1 => Err(ambiguous(identifier, &by_prefix)),
            0 => Err(format!("No task found with id or title '{identifier}'")),
            _ => Err(ambiguous(identifier, &by_title)),
        }
    }

    /// Replace the task with the same id in place, or append it.
    pub fn save(&mut self, task: Task) -> Result<(), StoreError> {
        if task.title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        match self.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => {
                debug!(id = %task.id, "replacing task");
                *existing = task;
            }
            None => {
                debug!(id = %task.id, "appending task");
                self.tasks.push(task);
            }
        }
        self.persist()
    }

    /// Remove `id` and every task whose parent is `id`. Only direct children
    /// are removed; their own children keep a parent id that no longer exists.
    pub fn delete(&mut self, id: &str) -> Result<usize, StoreError> {
        let before = self.tasks.len();
        self.tasks
            .retain(|t| t.id != id && t.parent_id.as_deref() != Some(id));
        let removed = before - self.tasks.len();
        info!(id, removed, "deleted tasks");
        self.persist()?;
        Ok(removed)
    }

    /// Set the status of one task, leaving every other field untouched.
    pub fn update_status(&mut self, id: &str, status: Status) -> Result<(), StoreError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        task.status = status;
        debug!(id, %status, "status updated");
        self.persist()
    }

    /// Append one generated subtask per non-blank title under `parent_id`.
    /// Returns the ids of the new tasks; an empty title list changes nothing.
    pub fn add_generated(
        &mut self,
        parent_id: &str,
        titles: &[String],
    ) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        let mut taken: HashSet<String> = self.tasks.iter().map(|t| t.id.clone()).collect();
        let mut new_tasks = Vec::new();
        for title in titles.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let id = loop {
                let id = generate_id();
                if taken.insert(id.clone()) {
                    break id;
                }
            };
            ids.push(id.clone());
            new_tasks.push(Task::generated(id, title, parent_id));
        }
        if new_tasks.is_empty() {
            return Ok(ids);
        }
        info!(parent_id, count = new_tasks.len(), "adding generated subtasks");
        self.tasks.extend(new_tasks);
        self.persist()?;
        Ok(ids)
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        save_tasks(self.storage.as_mut(), &self.tasks)
    }
}

fn welcome_task() -> Task {
    let mut task = Task::new(WELCOME_ID, WELCOME_TITLE);
    task.description = WELCOME_DESCRIPTION.to_string();
    task.status = Status::InProgress;
    task.priority = Priority::High;
    task.labels = vec![WELCOME_LABEL.to_string()];
    task
}

fn ambiguous(identifier: &str, matches: &[&Task]) -> String {
    let mut msg = format!("Multiple tasks match '{identifier}':\n");
    for task in matches {
        msg.push_str(&format!("  {}: {}\n", task.id, task.title));
    }
    msg.push_str("Please use the full id instead.");
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FileStorage, MemoryStorage};

    /// Storage that rejects every write after the first `ok_writes`.
    struct FailingStorage {
        ok_writes: usize,
        value: Option<String>,
    }

    impl Storage for FailingStorage {
        fn read(&self) -> Result<Option<String>, StoreError> {
            Ok(self.value.clone())
        }

        fn write(&mut self, value: &str) -> Result<(), StoreError> {
            if self.ok_writes == 0 {
                return Err(StoreError::Write {
                    path: "failing".into(),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.ok_writes -= 1;
            self.value = Some(value.to_string());
            Ok(())
        }

        fn location(&self) -> String {
            "failing".into()
        }
    }

    fn seeded(tasks: Vec<Task>) -> TaskStore {
        let raw = serde_json::to_string(&tasks).unwrap();
        TaskStore::open(Box::new(MemoryStorage::with_value(raw))).unwrap()
    }

    fn child(id: &str, parent: &str) -> Task {
        let mut t = Task::new(id, format!("task {id}"));
        t.parent_id = Some(parent.to_string());
        t
    }

    fn ids(store: &TaskStore) -> Vec<&str> {
        store.tasks().iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn empty_storage_seeds_welcome_task_and_persists_it() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        let path = storage.path().to_path_buf();
        let store = TaskStore::open(Box::new(storage)).unwrap();
        assert_eq!(store.len(), 1);
        let welcome = &store.tasks()[0];
        assert_eq!(welcome.title, WELCOME_TITLE);
        assert_eq!(welcome.status, Status::InProgress);
        assert_eq!(welcome.priority, Priority::High);
        assert!(path.exists());

        let reopened = TaskStore::open(Box::new(FileStorage::new(path))).unwrap();
        assert_eq!(reopened.tasks(), store.tasks());
    }

    #[test]
    fn corrupt_storage_fails_to_open() {
        let result = TaskStore::open(Box::new(MemoryStorage::with_value("[1, 2")));
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn save_appends_then_replaces_in_place() {
        let mut store = seeded(vec![Task::new("a", "A"), Task::new("b", "B")]);
        store.save(Task::new("c", "C")).unwrap();
        assert_eq!(ids(&store), vec!["a", "b", "c"]);

        let mut edited = store.get("a").unwrap().clone();
        edited.title = "A edited".into();
        edited.labels = vec!["x".into()];
        store.save(edited.clone()).unwrap();
        assert_eq!(ids(&store), vec!["a", "b", "c"]);
        assert_eq!(store.get("a").unwrap(), &edited);
    }

    #[test]
    fn save_rejects_empty_title_without_changes() {
        let mut store = seeded(vec![Task::new("a", "A")]);
        let before = store.tasks().to_vec();
        let err = store.save(Task::new("z", "   ")).unwrap_err();
        assert!(matches!(err, StoreError::EmptyTitle));
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn delete_unknown_id_removes_nothing() {
        let mut store = seeded(vec![Task::new("a", "A")]);
        assert_eq!(store.delete("zzz").unwrap(), 0);
        assert_eq!(ids(&store), vec!["a"]);
    }

    #[test]
    fn delete_removes_direct_children_only() {
        let mut store = seeded(vec![
            Task::new("a", "A"),
            child("b", "a"),
            child("c", "b"),
            Task::new("d", "D"),
        ]);
        let removed = store.delete("a").unwrap();
        assert_eq!(removed, 2);
        assert_eq!(ids(&store), vec!["c", "d"]);
        assert_eq!(store.get("c").unwrap().parent_id.as_deref(), Some("b"));
    }

    #[test]
    fn delete_leaves_grandchild_with_dangling_parent() {
        let mut store = seeded(vec![Task::new("a", "A"), child("b", "a"), child("g", "b")]);
        store.delete("a").unwrap();
        assert_eq!(ids(&store), vec!["g"]);
        assert_eq!(store.get("g").unwrap().parent_id.as_deref(), Some("b"));
    }

    #[test]
    fn update_status_changes_only_status() {
        let mut store = seeded(vec![Task::new("a", "A"), Task::new("b", "B")]);
        let before = store.tasks().to_vec();
        store.update_status("a", Status::Complete).unwrap();

        let mut expected = before[0].clone();
        expected.status = Status::Complete;
        assert_eq!(store.get("a").unwrap(), &expected);
        assert_eq!(store.get("b").unwrap(), &before[1]);
    }

    #[test]
    fn update_status_unknown_id_is_not_found() {
        let mut store = seeded(vec![Task::new("a", "A")]);
        let err = store.update_status("nope", Status::Due).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "nope"));
    }

    #[test]
    fn add_generated_appends_subtasks() {
        let mut store = seeded(vec![Task::new("p", "Parent")]);
        let titles = vec!["One".to_string(), " ".to_string(), "Two".to_string()];
        let new_ids = store.add_generated("p", &titles).unwrap();
        assert_eq!(new_ids.len(), 2);
        assert_eq!(store.len(), 3);
        for (id, title) in new_ids.iter().zip(["One", "Two"]) {
            let t = store.get(id).unwrap();
            assert_eq!(t.title, title);
            assert_eq!(t.parent_id.as_deref(), Some("p"));
            assert_eq!(t.status, Status::Incomplete);
            assert_eq!(t.priority, Priority::Medium);
            assert_eq!(t.labels, vec!["AI".to_string()]);
        }
    }

    #[test]
    fn add_generated_with_no_titles_leaves_store_unchanged() {
        let mut store = seeded(vec![Task::new("p", "Parent")]);
        let before = store.tasks().to_vec();
        let new_ids = store.add_generated("p", &[]).unwrap();
        assert!(new_ids.is_empty());
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn mutations_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slot.json");
        let mut store = TaskStore::open(Box::new(FileStorage::new(&path))).unwrap();
        store.save(Task::new("x", "Persist me")).unwrap();
        store.update_status("x", Status::Due).unwrap();

        let reopened = TaskStore::open(Box::new(FileStorage::new(&path))).unwrap();
        assert_eq!(reopened.tasks(), store.tasks());
        assert_eq!(reopened.get("x").unwrap().status, Status::Due);
    }

    #[test]
    fn failed_write_keeps_in_memory_change() {
        let raw = serde_json::to_string(&vec![Task::new("a", "A")]).unwrap();
        let storage = FailingStorage {
            ok_writes: 0,
            value: Some(raw.clone()),
        };
        let mut store = TaskStore::open(Box::new(storage)).unwrap();
        let err = store.update_status("a", Status::Complete).unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert_eq!(store.get("a").unwrap().status, Status::Complete);
    }

    #[test]
    fn resolve_by_id_prefix_and_title() {
        let store = seeded(vec![Task::new("abc123", "Groceries"), Task::new("abd456", "Laundry")]);
        assert_eq!(store.resolve("abc123").unwrap().id, "abc123");
        assert_eq!(store.resolve("abd").unwrap().id, "abd456");
        assert_eq!(store.resolve("groceries").unwrap().id, "abc123");
        assert!(store.resolve("ab").unwrap_err().contains("Multiple"));
        assert!(store.resolve("missing").is_err());
    }

    #[test]
    fn fresh_id_is_unused() {
        let store = seeded(vec![Task::new("a", "A")]);
        let id = store.fresh_id();
        assert!(!store.contains(&id));
    }
}
