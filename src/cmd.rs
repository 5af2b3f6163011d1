//! Command implementations for the CLI interface.
//!
//! Every handler works against the [`TaskStore`] façade; mutations are
//! persisted by the store itself. Handlers print their results to stdout and
//! return errors to `main`, which reports them and exits non-zero.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use clap::Subcommand;
use clap_complete::{generate, Shell};
use tracing::info;

use crate::ai::Assistant;
use crate::error::{Error, Result};
use crate::fields::{DueFilter, Priority, SortKey, Status};
use crate::format::*;
use crate::hierarchy::HierarchyIndex;
use crate::stats::{group_by_status, StatusCounts};
use crate::store::TaskStore;
use crate::task::{split_labels, today, Task};
use crate::tui::run::run_tui;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the interactive UI (default).
    Ui,

    /// Add a new task.
    Add {
        /// Short title for the task.
        title: String,
        /// Optional longer description.
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum, default_value_t = Status::Incomplete)]
        status: Status,
        #[arg(long, value_enum, default_value_t = Priority::Medium)]
        priority: Priority,
        /// Comma-separated labels. May be repeated.
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Due date: YYYY-MM-DD, "today", "tomorrow", "friday", or "in Nd" (default: today).
        #[arg(long)]
        due: Option<String>,
        /// Parent task ID or title.
        #[arg(long)]
        parent: Option<String>,
    },

    /// List tasks with optional filters.
    List {
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        /// Filter by label. May be repeated. Accepts comma-separated.
        #[arg(long = "label")]
        labels: Vec<String>,
        /// Due filter: today | this-week | overdue.
        #[arg(long, value_enum)]
        due: Option<DueFilter>,
        #[arg(long, value_enum, default_value_t = SortKey::Created)]
        sort: SortKey,
        /// Limit number of rows printed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// View a single task by ID or title.
    View {
        id: String,
        /// Show the subtree below the task.
        #[arg(long)]
        children: bool,
    },

    /// Update fields on a task.
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        desc: Option<String>,
        #[arg(long, value_enum)]
        status: Option<Status>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        due: Option<String>,
        /// New parent task ID or title.
        #[arg(long, conflicts_with = "clear_parent")]
        parent: Option<String>,
        /// Make the task a root.
        #[arg(long)]
        clear_parent: bool,
        /// Add labels. May be repeated and comma-separated.
        #[arg(long = "add-label")]
        add_labels: Vec<String>,
        /// Remove labels. May be repeated and comma-separated.
        #[arg(long = "rm-label")]
        rm_labels: Vec<String>,
    },

    /// Set the status of a task.
    Status {
        id: String,
        #[arg(value_enum)]
        status: Status,
    },

    /// Delete a task and its direct subtasks.
    Delete { id: String },

    /// Print the task hierarchy.
    Tree,

    /// Print the flow board, one column per status.
    Board,

    /// Print status counts and completion.
    Dashboard {
        /// Also ask the assistant for a progress summary.
        #[arg(long)]
        summary: bool,
    },

    /// Ask the assistant to break a task into subtasks and add them.
    Suggest {
        id: String,
        /// Print the suggestions without adding them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print an AI summary of progress.
    Summary,

    /// List distinct labels and counts.
    Labels,

    /// Generate shell completion scripts.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Launch the terminal user interface.
pub fn cmd_ui(store: TaskStore, assistant: Arc<dyn Assistant>, poll_timeout: Duration) -> Result<()> {
    run_tui(store, assistant, poll_timeout)?;
    Ok(())
}

/// Add a new task through the façade.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    store: &mut TaskStore,
    title: String,
    desc: Option<String>,
    status: Status,
    priority: Priority,
    labels: Vec<String>,
    due: Option<String>,
    parent: Option<String>,
) -> Result<String> {
    let parent_id = parent
        .as_deref()
        .map(|p| resolve_id(store, p))
        .transpose()?;

    let mut task = Task::new(store.fresh_id(), title.trim());
    task.description = desc.unwrap_or_default();
    task.status = status;
    task.priority = priority;
    task.labels = split_labels(&labels);
    if let Some(d) = due {
        task.due_date = Some(parse_due(&d)?);
    }
    task.parent_id = parent_id;

    let id = task.id.clone();
    store.save(task)?;
    println!("Added task {id}");
    Ok(id)
}

/// List tasks with optional filtering and sorting.
#[allow(clippy::too_many_arguments)]
pub fn cmd_list(
    store: &TaskStore,
    status: Option<Status>,
    priority: Option<Priority>,
    labels: Vec<String>,
    due: Option<DueFilter>,
    sort: SortKey,
    limit: Option<usize>,
) -> Result<()> {
    let labels = split_labels(&labels);
    let today = today();
    let (week_start, week_end) = start_end_of_this_week(today);

    let mut filtered: Vec<&Task> = store
        .tasks()
        .iter()
        .filter(|t| status.map_or(true, |s| t.status == s))
        .filter(|t| priority.map_or(true, |p| t.priority == p))
        .filter(|t| labels.iter().all(|l| t.labels.contains(l)))
        .filter(|t| match due {
            None => true,
            Some(DueFilter::Today) => t.due_date == Some(today),
            Some(DueFilter::ThisWeek) => t
                .due_date
                .is_some_and(|d| (week_start..=week_end).contains(&d)),
            Some(DueFilter::Overdue) => {
                t.due_date.is_some_and(|d| d < today) && t.status != Status::Complete
            }
        })
        .collect();

    match sort {
        SortKey::Created => {}
        // undated tasks last
        SortKey::Due => filtered.sort_by_key(|t| (t.due_date.is_none(), t.due_date)),
        SortKey::Priority => filtered.sort_by_key(|t| std::cmp::Reverse(t.priority)),
        SortKey::Status => filtered.sort_by_key(|t| t.status),
    }
    if let Some(n) = limit {
        filtered.truncate(n);
    }

    if filtered.is_empty() {
        println!("No tasks found.");
    } else {
        print_table(&filtered, today);
    }
    Ok(())
}

/// View detailed information about a specific task.
pub fn cmd_view(store: &TaskStore, id: String, children: bool) -> Result<()> {
    let task = store.resolve(&id).map_err(Error::Resolve)?;
    let index = HierarchyIndex::build(store.tasks());
    let parent = match task.parent_id.as_deref() {
        None => "-".to_string(),
        Some(p) => match store.get(p) {
            Some(pt) => format!("{p} ({})", pt.title),
            None => format!("{p} (missing)"),
        },
    };

    println!("ID:           {}", task.id);
    println!("Title:        {}", task.title);
    println!("Status:       {}", task.status);
    println!("Priority:     {}", task.priority);
    match task.due_date {
        Some(due) => println!("Due:          {} ({})", due, format_due_relative(due, today())),
        None => println!("Due:          -"),
    }
    println!("Parent:       {parent}");
    println!(
        "Labels:       {}",
        if task.labels.is_empty() { "-".into() } else { task.labels.join(",") }
    );
    println!("Subtasks:     {}", index.child_count(&task.id));
    println!("Created UTC:  {}", task.created_at.to_rfc3339());
    println!(
        "Description:\n{}\n",
        if task.description.is_empty() { "-" } else { task.description.as_str() }
    );

    if children {
        println!("Children:");
        let rows: Vec<_> = index.walk();
        let Some(start) = rows.iter().position(|r| r.task.id == task.id) else {
            return Ok(());
        };
        let base = rows[start].depth;
        let subtree: Vec<_> = rows[start + 1..]
            .iter()
            .take_while(|r| r.depth > base)
            .collect();
        if subtree.is_empty() {
            println!("  -");
        }
        for row in subtree {
            println!(
                "{}- {} [{}] (#{})",
                crate::hierarchy::indent(row.depth - base),
                row.task.title,
                row.task.status,
                row.task.id
            );
        }
    }
    Ok(())
}

/// Update an existing task's fields and save it as a full replacement.
#[allow(clippy::too_many_arguments)]
pub fn cmd_edit(
    store: &mut TaskStore,
    id: String,
    title: Option<String>,
    desc: Option<String>,
    status: Option<Status>,
    priority: Option<Priority>,
    due: Option<String>,
    parent: Option<String>,
    clear_parent: bool,
    add_labels: Vec<String>,
    rm_labels: Vec<String>,
) -> Result<()> {
    let mut task = store.resolve(&id).map_err(Error::Resolve)?.clone();

    if let Some(p) = parent.as_deref() {
        let parent_id = resolve_id(store, p)?;
        let index = HierarchyIndex::build(store.tasks());
        if parent_id == task.id || index.descendants(&task.id).contains(parent_id.as_str()) {
            return Err(Error::ParentCycle);
        }
        task.parent_id = Some(parent_id);
    }
    if clear_parent {
        task.parent_id = None;
    }
    if let Some(t) = title {
        task.title = t.trim().to_string();
    }
    if let Some(d) = desc {
        task.description = d;
    }
    if let Some(s) = status {
        task.status = s;
    }
    if let Some(p) = priority {
        task.priority = p;
    }
    if let Some(d) = due {
        task.due_date = Some(parse_due(&d)?);
    }
    for label in split_labels(&add_labels) {
        task.add_label(&label);
    }
    for label in split_labels(&rm_labels) {
        task.remove_label(&label);
    }

    let id = task.id.clone();
    store.save(task)?;
    println!("Updated task {id}");
    Ok(())
}

/// Set a task's status, leaving every other field untouched.
pub fn cmd_status(store: &mut TaskStore, id: String, status: Status) -> Result<()> {
    let id = resolve_id(store, &id)?;
    store.update_status(&id, status)?;
    println!("{id} -> {status}");
    Ok(())
}

/// Delete a task and its direct subtasks.
pub fn cmd_delete(store: &mut TaskStore, id: String) -> Result<()> {
    let id = resolve_id(store, &id)?;
    let removed = store.delete(&id)?;
    println!("Deleted {removed} task(s).");
    Ok(())
}

/// Print the whole hierarchy, one indented line per task.
pub fn cmd_tree(store: &TaskStore) -> Result<()> {
    for row in HierarchyIndex::build(store.tasks()).walk() {
        println!("{}", tree_line(&row));
    }
    Ok(())
}

/// Print the flow board as one section per status.
pub fn cmd_board(store: &TaskStore) -> Result<()> {
    for (status, column) in group_by_status(store.tasks()) {
        println!("== {status} ({}) ==", column.len());
        for t in column {
            println!("  {:<10} {:<7} {}", truncate(&t.id, 10), t.priority, t.title);
        }
    }
    Ok(())
}

/// Print counts per status, and optionally the assistant's summary.
pub fn cmd_dashboard(store: &TaskStore, assistant: &dyn Assistant, summary: bool) -> Result<()> {
    let counts = StatusCounts::from_tasks(store.tasks());
    println!("{:<12} {}", "Status", "Count");
    for (status, n) in counts.iter() {
        println!("{:<12} {}", status.label(), n);
    }
    println!("{:<12} {}", "Total", counts.total());
    println!("Completion:  {}%", counts.completion_percent());
    if summary {
        println!();
        println!("{}", assistant.dashboard_summary(store.tasks()));
    }
    Ok(())
}

/// Request subtasks from the assistant and append them under the task.
pub fn cmd_suggest(
    store: &mut TaskStore,
    assistant: &dyn Assistant,
    id: String,
    dry_run: bool,
) -> Result<Vec<String>> {
    let task = store.resolve(&id).map_err(Error::Resolve)?;
    let parent_id = task.id.clone();
    if !assistant.is_available() {
        println!("AI suggestions are not configured (set GEMINI_API_KEY or [ai] api_key).");
        return Ok(Vec::new());
    }
    let titles = assistant.suggest_subtasks(&task.title, &task.description);
    if titles.is_empty() {
        println!("No suggestions received.");
        return Ok(Vec::new());
    }
    if dry_run {
        for t in &titles {
            println!("- {t}");
        }
        return Ok(Vec::new());
    }
    let ids = store.add_generated(&parent_id, &titles)?;
    info!(parent = %parent_id, added = ids.len(), "suggested subtasks added");
    for (new_id, title) in ids.iter().zip(titles.iter().filter(|t| !t.trim().is_empty())) {
        println!("Added {new_id}: {}", title.trim());
    }
    Ok(ids)
}

/// Print the assistant's progress summary.
pub fn cmd_summary(store: &TaskStore, assistant: &dyn Assistant) -> Result<()> {
    println!("{}", assistant.dashboard_summary(store.tasks()));
    Ok(())
}

/// List all distinct labels with their usage counts.
pub fn cmd_labels(store: &TaskStore) -> Result<()> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for t in store.tasks() {
        for label in &t.labels {
            *counts.entry(label.as_str()).or_default() += 1;
        }
    }
    println!("{:<16} {}", "Label", "Count");
    for (label, c) in counts {
        println!("{:<16} {}", truncate(label, 16), c);
    }
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

fn resolve_id(store: &TaskStore, identifier: &str) -> Result<String> {
    store
        .resolve(identifier)
        .map(|t| t.id.clone())
        .map_err(Error::Resolve)
}

fn parse_due(input: &str) -> Result<chrono::NaiveDate> {
    parse_due_input(input, today()).ok_or_else(|| Error::InvalidDue(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::NoopAssistant;
    use crate::db::MemoryStorage;
    use crate::error::StoreError;

    struct FixedAssistant(Vec<String>);

    impl Assistant for FixedAssistant {
        fn suggest_subtasks(&self, _title: &str, _description: &str) -> Vec<String> {
            self.0.clone()
        }

        fn dashboard_summary(&self, _tasks: &[Task]) -> String {
            "ok".into()
        }
    }

    fn store_with(tasks: Vec<Task>) -> TaskStore {
        let raw = serde_json::to_string(&tasks).unwrap();
        TaskStore::open(Box::new(MemoryStorage::with_value(raw))).unwrap()
    }

    #[test]
    fn add_resolves_parent_and_labels() {
        let mut store = store_with(vec![Task::new("p1", "Parent")]);
        let id = cmd_add(
            &mut store,
            "  Child ".into(),
            Some("details".into()),
            Status::Due,
            Priority::High,
            vec!["a,b".into(), "a".into()],
            Some("tomorrow".into()),
            Some("parent".into()),
        )
        .unwrap();
        let t = store.get(&id).unwrap();
        assert_eq!(t.title, "Child");
        assert_eq!(t.parent_id.as_deref(), Some("p1"));
        assert_eq!(t.labels, vec!["a", "b"]);
        assert_eq!(t.due_date, Some(today() + chrono::Duration::days(1)));
    }

    #[test]
    fn add_with_blank_title_is_rejected() {
        let mut store = store_with(vec![Task::new("p1", "Parent")]);
        let err = cmd_add(&mut store, " ".into(), None, Status::Incomplete, Priority::Low, vec![], None, None)
            .unwrap_err();
        assert!(matches!(err, Error::Store(StoreError::EmptyTitle)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn add_with_bad_due_date_fails() {
        let mut store = store_with(vec![Task::new("p1", "Parent")]);
        let err = cmd_add(&mut store, "x".into(), None, Status::Incomplete, Priority::Low, vec![], Some("soonish".into()), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDue(_)));
    }

    #[test]
    fn edit_refuses_descendant_parent() {
        let mut b = Task::new("b", "B");
        b.parent_id = Some("a".into());
        let mut c = Task::new("c", "C");
        c.parent_id = Some("b".into());
        let mut store = store_with(vec![Task::new("a", "A"), b, c]);

        let err = cmd_edit(&mut store, "a".into(), None, None, None, None, None, Some("c".into()), false, vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, Error::ParentCycle));
        let err = cmd_edit(&mut store, "a".into(), None, None, None, None, None, Some("a".into()), false, vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, Error::ParentCycle));
        assert_eq!(store.get("a").unwrap().parent_id, None);
    }

    #[test]
    fn edit_updates_labels_and_clears_parent() {
        let mut b = Task::new("b", "B");
        b.parent_id = Some("a".into());
        b.labels = vec!["old".into(), "keep".into()];
        let mut store = store_with(vec![Task::new("a", "A"), b]);
        cmd_edit(
            &mut store,
            "b".into(),
            Some("B2".into()),
            None,
            Some(Status::InProgress),
            None,
            None,
            None,
            true,
            vec!["new".into()],
            vec!["old".into()],
        )
        .unwrap();
        let b = store.get("b").unwrap();
        assert_eq!(b.title, "B2");
        assert_eq!(b.status, Status::InProgress);
        assert_eq!(b.parent_id, None);
        assert_eq!(b.labels, vec!["keep", "new"]);
    }

    #[test]
    fn suggest_adds_generated_subtasks() {
        let mut store = store_with(vec![Task::new("p", "Plan party")]);
        let ai = FixedAssistant(vec!["Invite".into(), "Cake".into()]);
        let ids = cmd_suggest(&mut store, &ai, "p".into(), false).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.len(), 3);
        assert!(ids.iter().all(|id| store.get(id).unwrap().parent_id.as_deref() == Some("p")));
    }

    #[test]
    fn suggest_without_results_leaves_store_unchanged() {
        let mut store = store_with(vec![Task::new("p", "Plan party")]);
        let before = store.tasks().to_vec();
        assert!(cmd_suggest(&mut store, &FixedAssistant(vec![]), "p".into(), false).unwrap().is_empty());
        assert!(cmd_suggest(&mut store, &NoopAssistant, "p".into(), false).unwrap().is_empty());
        assert!(cmd_suggest(&mut store, &FixedAssistant(vec!["x".into()]), "p".into(), true).unwrap().is_empty());
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn status_and_delete_resolve_identifiers() {
        let mut child = Task::new("c1", "Child");
        child.parent_id = Some("abc".into());
        let mut store = store_with(vec![Task::new("abc", "Root"), child, Task::new("z", "Other")]);
        cmd_status(&mut store, "root".into(), Status::Complete).unwrap();
        assert_eq!(store.get("abc").unwrap().status, Status::Complete);
        cmd_delete(&mut store, "abc".into()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(matches!(
            cmd_delete(&mut store, "missing".into()),
            Err(Error::Resolve(_))
        ));
    }
}
