//! Main application logic for the terminal user interface.
//!
//! This module contains the `App` struct which owns the task store, routes
//! between the four views, handles user input, renders the interface and
//! runs AI requests on worker threads so the event loop never blocks.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Bar, BarChart, BarGroup, Block, Borders, Cell, Clear, Gauge, Paragraph, Row, Table,
        TableState, Tabs, Wrap,
    },
    Frame, Terminal,
};
use tracing::{debug, info, warn};

use crate::ai::Assistant;
use crate::error::{Error, StoreError};
use crate::fields::Status;
use crate::format::{format_due, label_suffix, marker_tag};
use crate::hierarchy::{indent, HierarchyIndex};
use crate::stats::{group_by_status, StatusCounts};
use crate::store::TaskStore;
use crate::task::{today, Task};
use crate::tui::{
    colors::{priority_color, status_color, DARK_RED, GOLD, INDIGO},
    enums::{AppState, View},
    task_form::{
        TaskForm, DESCRIPTION_FIELD, DUE_FIELD, LABELS_FIELD, PARENT_FIELD, PRIORITY_FIELD,
        STATUS_FIELD, TITLE_FIELD,
    },
    utils::centered_rect,
};

const CARD_HEIGHT: usize = 5;

/// Results sent back by AI worker threads.
#[derive(Debug)]
enum AiReply {
    Subtasks {
        parent_id: String,
        titles: Vec<String>,
    },
    Summary(String),
}

/// Main application state for the terminal user interface.
pub struct App {
    store: TaskStore,
    assistant: Arc<dyn Assistant>,
    poll_timeout: Duration,
    view: View,
    state: AppState,
    list_state: TableState,
    tree_state: TableState,
    board_column: usize,
    board_card: usize,
    board_scroll: [usize; 4],
    task_form: Option<TaskForm>,
    confirm_delete: Option<String>,
    status_message: String,
    /// Task whose subtask suggestions are in flight. One request at a time.
    loading: Option<String>,
    summary: Option<String>,
    summary_pending: bool,
    ai_tx: Sender<AiReply>,
    ai_rx: Receiver<AiReply>,
}

impl App {
    pub fn new(store: TaskStore, assistant: Arc<dyn Assistant>, poll_timeout: Duration) -> Self {
        let (ai_tx, ai_rx) = mpsc::channel();
        let mut app = App {
            store,
            assistant,
            poll_timeout,
            view: View::Dashboard,
            state: AppState::Browse,
            list_state: TableState::default(),
            tree_state: TableState::default(),
            board_column: 0,
            board_card: 0,
            board_scroll: [0; 4],
            task_form: None,
            confirm_delete: None,
            status_message: String::new(),
            loading: None,
            summary: None,
            summary_pending: false,
            ai_tx,
            ai_rx,
        };
        app.clamp_selection();
        app
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Switch to the view registered under `route`.
    pub fn navigate(&mut self, route: &str) {
        self.view = View::from_route(route);
        debug!(route = self.view.route(), "navigate");
        self.clamp_selection();
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    /// Ids of the hierarchy rows in display order.
    fn hierarchy_ids(&self) -> Vec<String> {
        HierarchyIndex::build(self.store.tasks())
            .walk()
            .into_iter()
            .map(|row| row.task.id.clone())
            .collect()
    }

    fn board_column_ids(&self, column: usize) -> Vec<String> {
        let status = Status::ALL[column];
        self.store
            .tasks()
            .iter()
            .filter(|t| t.status == status)
            .map(|t| t.id.clone())
            .collect()
    }

    /// The task under the cursor in the current view.
    fn selected_task(&self) -> Option<&Task> {
        let id = match self.view {
            View::Dashboard => return None,
            View::Tasks => return self.list_state.selected().and_then(|i| self.store.tasks().get(i)),
            View::Hierarchy => self
                .tree_state
                .selected()
                .and_then(|i| self.hierarchy_ids().into_iter().nth(i)),
            View::Flow => self.board_column_ids(self.board_column).into_iter().nth(self.board_card),
        }?;
        self.store.get(&id)
    }

    /// Keep every selection inside the current collection bounds.
    fn clamp_selection(&mut self) {
        let len = self.store.len();
        for state in [&mut self.list_state, &mut self.tree_state] {
            if len == 0 {
                state.select(None);
            } else {
                state.select(Some(state.selected().unwrap_or(0).min(len - 1)));
            }
        }
        let column_len = self.board_column_ids(self.board_column).len();
        self.board_card = self.board_card.min(column_len.saturating_sub(1));
    }

    fn move_selection(&mut self, down: bool) {
        let state = match self.view {
            View::Tasks => &mut self.list_state,
            View::Hierarchy => &mut self.tree_state,
            View::Flow => {
                let len = self.board_column_ids(self.board_column).len();
                if down && self.board_card + 1 < len {
                    self.board_card += 1;
                } else if !down {
                    self.board_card = self.board_card.saturating_sub(1);
                }
                return;
            }
            View::Dashboard => return,
        };
        let len = self.store.len();
        if len == 0 {
            return;
        }
        let current = state.selected().unwrap_or(0);
        let next = if down {
            (current + 1).min(len - 1)
        } else {
            current.saturating_sub(1)
        };
        state.select(Some(next));
    }

    fn move_board_column(&mut self, right: bool) {
        if right && self.board_column + 1 < Status::ALL.len() {
            self.board_column += 1;
        } else if !right && self.board_column > 0 {
            self.board_column -= 1;
        }
        self.clamp_selection();
    }

    /// Move the selected card one column over, changing its status, and
    /// keep it selected in its new column.
    fn move_card(&mut self, right: bool) {
        let Some(id) = self.selected_task().map(|t| t.id.clone()) else {
            return;
        };
        let target = if right {
            self.board_column + 1
        } else {
            match self.board_column.checked_sub(1) {
                Some(c) => c,
                None => return,
            }
        };
        let Some(&status) = Status::ALL.get(target) else {
            return;
        };
        if let Err(e) = self.store.update_status(&id, status) {
            self.set_status_message(format!("Error: {e}"));
        } else {
            self.set_status_message(format!("Moved to {status}"));
        }
        self.board_column = target;
        self.board_card = self
            .board_column_ids(target)
            .iter()
            .position(|c| *c == id)
            .unwrap_or(0);
    }

    fn cycle_selected_status(&mut self) {
        let Some((id, next)) = self.selected_task().map(|t| (t.id.clone(), t.status.cycle())) else {
            return;
        };
        match self.store.update_status(&id, next) {
            Ok(()) => self.set_status_message(format!("Status: {next}")),
            Err(e) => self.set_status_message(format!("Error: {e}")),
        }
        self.clamp_selection();
    }

    fn open_new_form(&mut self, parent_id: Option<String>) {
        let form = match parent_id {
            Some(pid) => TaskForm::new_with_parent(self.store.tasks(), &pid, today()),
            None => TaskForm::new(self.store.tasks(), today()),
        };
        self.task_form = Some(form);
        self.state = AppState::AddTask;
    }

    fn open_edit_form(&mut self) {
        let Some(task) = self.selected_task() else {
            return;
        };
        self.task_form = Some(TaskForm::from_task(task, self.store.tasks()));
        self.state = AppState::EditTask;
    }

    fn close_form(&mut self) {
        self.task_form = None;
        self.state = AppState::Browse;
    }

    /// Validate and save the form. A rejected form stays open.
    fn submit_form(&mut self) {
        let Some(form) = self.task_form.as_ref() else {
            return;
        };
        let is_edit = form.is_edit();
        let task = match form.to_task(&self.store, today()) {
            Ok(task) => task,
            Err(Error::Store(StoreError::EmptyTitle)) => {
                self.set_status_message("Title is required");
                return;
            }
            Err(e) => {
                self.set_status_message(format!("Error: {e}"));
                return;
            }
        };

        let id = task.id.clone();
        match self.store.save(task) {
            Ok(()) => {
                info!(%id, is_edit, "task saved from form");
                self.set_status_message(if is_edit { "Task updated" } else { "Task created" });
            }
            Err(e) => self.set_status_message(format!("Error: {e}")),
        }
        self.close_form();
        self.clamp_selection();
    }

    fn request_delete(&mut self) {
        if let Some(task) = self.selected_task() {
            self.confirm_delete = Some(task.id.clone());
            self.state = AppState::Confirm;
        }
    }

    fn delete_confirmed(&mut self) {
        if let Some(id) = self.confirm_delete.take() {
            match self.store.delete(&id) {
                Ok(removed) => self.set_status_message(format!("Deleted {removed} task(s)")),
                Err(e) => self.set_status_message(format!("Error deleting task: {e}")),
            }
        }
        self.state = AppState::Browse;
        self.clamp_selection();
    }

    /// Ask the assistant for subtasks of the selected task on a worker thread.
    fn request_subtasks(&mut self) {
        if !self.assistant.is_available() {
            self.set_status_message("AI suggestions are not configured (set GEMINI_API_KEY)");
            return;
        }
        if let Some(pending) = &self.loading {
            let msg = format!("Still generating subtasks for {pending}");
            self.set_status_message(msg);
            return;
        }
        let Some(task) = self.selected_task() else {
            return;
        };
        let parent_id = task.id.clone();
        let title = task.title.clone();
        let description = task.description.clone();

        info!(%parent_id, "requesting subtask suggestions");
        self.loading = Some(parent_id.clone());
        self.set_status_message(format!("Generating subtasks for \"{title}\"..."));

        let assistant = Arc::clone(&self.assistant);
        let tx = self.ai_tx.clone();
        thread::spawn(move || {
            let titles = assistant.suggest_subtasks(&title, &description);
            // the receiver is gone once the UI has quit
            let _ = tx.send(AiReply::Subtasks { parent_id, titles });
        });
    }

    fn request_summary(&mut self) {
        if self.summary_pending {
            return;
        }
        self.summary_pending = true;
        let assistant = Arc::clone(&self.assistant);
        let tasks = self.store.tasks().to_vec();
        let tx = self.ai_tx.clone();
        thread::spawn(move || {
            let text = assistant.dashboard_summary(&tasks);
            let _ = tx.send(AiReply::Summary(text));
        });
    }

    /// Apply every AI reply that has arrived since the last call.
    pub fn poll_ai(&mut self) {
        while let Ok(reply) = self.ai_rx.try_recv() {
            self.apply_ai_reply(reply);
        }
    }

    fn apply_ai_reply(&mut self, reply: AiReply) {
        match reply {
            AiReply::Subtasks { parent_id, titles } => {
                self.loading = None;
                if !self.store.contains(&parent_id) {
                    warn!(%parent_id, "parent deleted before suggestions arrived");
                    self.set_status_message("Task was deleted before suggestions arrived");
                    return;
                }
                match self.store.add_generated(&parent_id, &titles) {
                    Ok(ids) if ids.is_empty() => self.set_status_message("No suggestions received"),
                    Ok(ids) => self.set_status_message(format!("Added {} AI subtasks", ids.len())),
                    Err(e) => self.set_status_message(format!("Error: {e}")),
                }
                self.clamp_selection();
            }
            AiReply::Summary(text) => {
                self.summary_pending = false;
                self.summary = Some(text);
            }
        }
    }

    /// Handle one key press. Returns true when the application should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        self.status_message.clear();
        match self.state {
            AppState::Browse => return self.handle_browse_input(key.code, key.modifiers),
            AppState::AddTask | AppState::EditTask => self.handle_form_input(key.code),
            AppState::Confirm => self.handle_confirm_input(key.code),
            AppState::Help => self.state = AppState::Browse,
        }
        false
    }

    fn handle_browse_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> bool {
        let ctrl = modifiers.contains(KeyModifiers::CONTROL);
        match key {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if ctrl => return true,
            KeyCode::Char(c @ '1'..='4') => {
                let index = c as usize - '1' as usize;
                self.navigate(View::ALL[index].route());
            }
            KeyCode::Tab => self.navigate(self.view.next().route()),
            KeyCode::BackTab => self.navigate(self.view.prev().route()),
            KeyCode::Char('n') => self.open_new_form(None),
            KeyCode::Char('h') | KeyCode::Char('?') | KeyCode::F(1) => self.state = AppState::Help,
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(false),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(true),
            KeyCode::Left | KeyCode::Right if self.view == View::Flow => {
                let right = key == KeyCode::Right;
                if ctrl {
                    self.move_card(right);
                } else {
                    self.move_board_column(right);
                }
            }
            KeyCode::Char('[') if self.view == View::Flow => self.move_card(false),
            KeyCode::Char(']') if self.view == View::Flow => self.move_card(true),
            KeyCode::Char('r') if self.view == View::Dashboard => {
                if self.assistant.is_available() {
                    self.request_summary();
                } else {
                    self.set_status_message("AI summary is not configured (set GEMINI_API_KEY)");
                }
            }
            KeyCode::Char('a') => {
                let parent = self.selected_task().map(|t| t.id.clone());
                if parent.is_some() {
                    self.open_new_form(parent);
                }
            }
            KeyCode::Char('e') | KeyCode::Enter => self.open_edit_form(),
            KeyCode::Char('d') | KeyCode::Delete => self.request_delete(),
            KeyCode::Char('s') => self.cycle_selected_status(),
            KeyCode::Char('g') => self.request_subtasks(),
            _ => {}
        }
        false
    }

    fn handle_form_input(&mut self, key: KeyCode) {
        if key == KeyCode::Enter {
            self.submit_form();
            return;
        }
        let Some(form) = self.task_form.as_mut() else {
            self.state = AppState::Browse;
            return;
        };
        match key {
            KeyCode::Esc => self.close_form(),
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left => form.handle_left_right(false),
            KeyCode::Right => form.handle_left_right(true),
            KeyCode::Backspace => form.handle_backspace(),
            KeyCode::Delete => form.handle_delete(),
            KeyCode::Home => form.handle_home_end(false),
            KeyCode::End => form.handle_home_end(true),
            KeyCode::Char(c) => form.handle_char(c),
            _ => {}
        }
    }

    fn handle_confirm_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => self.delete_confirmed(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.confirm_delete = None;
                self.state = AppState::Browse;
            }
            _ => {}
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let titles: Vec<Line> = View::ALL
            .iter()
            .enumerate()
            .map(|(i, v)| Line::from(format!("{} {}", i + 1, v.title())))
            .collect();
        let selected = View::ALL.iter().position(|v| *v == self.view).unwrap_or(0);
        let tabs = Tabs::new(titles)
            .select(selected)
            .highlight_style(Style::default().fg(GOLD).add_modifier(Modifier::BOLD))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("TaskFlow Pro  {}", self.view.route())),
            );
        f.render_widget(tabs, area);
    }

    fn render_dashboard(&self, f: &mut Frame, area: Rect) {
        let counts = StatusCounts::from_tasks(self.store.tasks());
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Length(3),
                Constraint::Min(5),
            ])
            .split(area);

        let cards = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 4); 4])
            .split(chunks[0]);
        for ((status, n), card) in counts.iter().zip(cards.iter()) {
            let text = Paragraph::new(Line::from(Span::styled(
                n.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            )))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(status.label())
                    .border_style(Style::default().fg(status_color(status))),
            )
            .alignment(Alignment::Center);
            f.render_widget(text, *card);
        }

        let percent = counts.completion_percent();
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Completion"))
            .gauge_style(Style::default().fg(status_color(Status::Complete)))
            .percent(percent)
            .label(format!("{percent}% of {} tasks", counts.total()));
        f.render_widget(gauge, chunks[1]);

        let lower = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[2]);

        let bars: Vec<Bar> = counts
            .iter()
            .map(|(status, n)| {
                Bar::default()
                    .value(n as u64)
                    .label(Line::from(status.label()))
                    .style(Style::default().fg(status_color(status)))
            })
            .collect();
        let chart = BarChart::default()
            .block(Block::default().borders(Borders::ALL).title("Task Distribution"))
            .data(BarGroup::default().bars(&bars))
            .bar_width(11)
            .bar_gap(2);
        f.render_widget(chart, lower[0]);

        let summary = if !self.assistant.is_available() {
            "AI summary unavailable: no API key configured.".to_string()
        } else if self.summary_pending {
            "Thinking...".to_string()
        } else {
            self.summary
                .clone()
                .unwrap_or_else(|| "Press 'r' for an AI progress summary.".to_string())
        };
        let summary = Paragraph::new(summary)
            .block(Block::default().borders(Borders::ALL).title("Coach"))
            .wrap(Wrap { trim: true });
        f.render_widget(summary, lower[1]);
    }

    fn loading_marker(&self, id: &str) -> &'static str {
        if self.loading.as_deref() == Some(id) {
            " ✦"
        } else {
            ""
        }
    }

    fn render_task_list(&mut self, f: &mut Frame, area: Rect) {
        if self.store.is_empty() {
            render_empty(f, area);
            return;
        }
        let today = today();
        let header = Row::new(["ID", "Status", "Priority", "Due", "Title"].map(|h| {
            Cell::from(h).style(Style::default().add_modifier(Modifier::BOLD))
        }))
        .style(Style::default().bg(GOLD).fg(Color::Rgb(20, 20, 20)));

        let rows: Vec<Row> = self
            .store
            .tasks()
            .iter()
            .map(|task| {
                let style = if task.status == Status::Complete {
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::CROSSED_OUT)
                } else {
                    Style::default()
                };
                Row::new(vec![
                    Cell::from(task.id.clone()),
                    Cell::from(task.status.label()).style(Style::default().fg(status_color(task.status))),
                    Cell::from(task.priority.label())
                        .style(Style::default().fg(priority_color(task.priority))),
                    Cell::from(format_due(task.due_date, today)),
                    Cell::from(Line::from(vec![
                        Span::raw(task.title.clone()),
                        Span::styled(label_suffix(&task.labels), Style::default().fg(INDIGO)),
                        Span::styled(self.loading_marker(&task.id), Style::default().fg(GOLD)),
                    ])),
                ])
                .style(style)
            })
            .collect();

        let widths = [
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Length(10),
            Constraint::Min(20),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("All Tasks ({})", self.store.len())),
            )
            .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");
        f.render_stateful_widget(table, area, &mut self.list_state);
    }

    fn render_hierarchy(&mut self, f: &mut Frame, area: Rect) {
        if self.store.is_empty() {
            render_empty(f, area);
            return;
        }
        let index = HierarchyIndex::build(self.store.tasks());
        let rows: Vec<Row> = index
            .walk()
            .into_iter()
            .map(|row| {
                let count = if row.child_count > 0 {
                    format!(" ({} subtasks)", row.child_count)
                } else {
                    String::new()
                };
                let title = Line::from(vec![
                    Span::raw(format!("{}{}", indent(row.depth), row.task.title)),
                    Span::styled(count, Style::default().fg(Color::DarkGray)),
                    Span::styled(marker_tag(row.marker), Style::default().fg(Color::Red)),
                    Span::styled(self.loading_marker(&row.task.id), Style::default().fg(GOLD)),
                ]);
                Row::new(vec![
                    Cell::from(title),
                    Cell::from(row.task.status.label())
                        .style(Style::default().fg(status_color(row.task.status))),
                    Cell::from(row.task.priority.label())
                        .style(Style::default().fg(priority_color(row.task.priority))),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [Constraint::Min(30), Constraint::Length(12), Constraint::Length(8)],
        )
        .block(Block::default().borders(Borders::ALL).title("Hierarchy"))
        .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
        .highlight_symbol(">> ");
        f.render_stateful_widget(table, area, &mut self.tree_state);
    }

    fn render_flow(&mut self, f: &mut Frame, area: Rect) {
        let areas = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 4); 4])
            .split(area);
        for (column, column_area) in areas.iter().enumerate() {
            self.render_column(f, *column_area, column);
        }
    }

    fn render_column(&mut self, f: &mut Frame, area: Rect, column: usize) {
        let columns = group_by_status(self.store.tasks());
        let (status, cards) = &columns[column];
        let is_selected = column == self.board_column;

        let border_style = if is_selected {
            Style::default().fg(GOLD).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(status_color(*status))
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("{} ({})", status.label(), cards.len()))
            .border_style(border_style);
        let inner = block.inner(area);
        f.render_widget(block, area);

        if cards.is_empty() {
            return;
        }

        let available_height = inner.height as usize;
        let visible_cards = (available_height / CARD_HEIGHT).max(1);
        let scroll_offset = if is_selected {
            let offset = scroll_to_show(self.board_card, self.board_scroll[column], visible_cards);
            self.board_scroll[column] = offset;
            offset
        } else {
            self.board_scroll[column].min(cards.len() - 1)
        };

        let mut current_y = 0;
        let mut rendered = 0;
        for (card_index, task) in cards.iter().enumerate().skip(scroll_offset) {
            if current_y + CARD_HEIGHT > available_height {
                break;
            }
            let card_area = Rect {
                x: inner.x,
                y: inner.y + current_y as u16,
                width: inner.width,
                height: CARD_HEIGHT as u16,
            };
            let selected = is_selected && card_index == self.board_card;
            let loading = self.loading.as_deref() == Some(task.id.as_str());
            render_card(f, card_area, task, selected, loading);
            current_y += CARD_HEIGHT;
            rendered += 1;
        }

        if scroll_offset > 0 {
            let indicator = Paragraph::new(format!("▲ +{scroll_offset} above"))
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(indicator, Rect { height: 1, ..inner });
        }
        let remaining = cards.len() - scroll_offset - rendered;
        if remaining > 0 {
            let indicator = Paragraph::new(format!("▼ +{remaining} below"))
                .style(Style::default().fg(Color::Cyan));
            f.render_widget(
                indicator,
                Rect {
                    y: inner.y + inner.height.saturating_sub(1),
                    height: 1,
                    ..inner
                },
            );
        }
    }

    fn render_task_form(&self, f: &mut Frame, area: Rect) {
        let Some(form) = self.task_form.as_ref() else {
            return;
        };
        let area = centered_rect(70, 90, area);
        f.render_widget(Clear, area);

        let title = if form.is_edit() { "Edit Task" } else { "New Task" };
        let outer = Block::default().borders(Borders::ALL).title(title);
        let inner = outer.inner(area);
        f.render_widget(outer, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // title
                Constraint::Length(4), // description
                Constraint::Length(3), // status
                Constraint::Length(3), // priority
                Constraint::Length(3), // due
                Constraint::Length(3), // parent
                Constraint::Length(3), // labels
                Constraint::Min(1),
            ])
            .split(inner);

        let field_block = |label: &'static str, field: usize| {
            let style = if form.current_field == field {
                Style::default().fg(GOLD)
            } else {
                Style::default()
            };
            Block::default().borders(Borders::ALL).title(label).border_style(style)
        };

        let fields: [(&str, usize, String); 7] = [
            ("Title *", TITLE_FIELD, form.title.value.clone()),
            ("Description", DESCRIPTION_FIELD, form.description.value.clone()),
            ("Status", STATUS_FIELD, format!("< {} >", form.selected_status())),
            ("Priority", PRIORITY_FIELD, format!("< {} >", form.selected_priority())),
            ("Due Date", DUE_FIELD, form.due.value.clone()),
            ("Parent Task", PARENT_FIELD, format!("< {} >", form.parent_label())),
            ("Labels (comma separated)", LABELS_FIELD, form.labels.value.clone()),
        ];
        for (label, field, value) in fields {
            let widget = Paragraph::new(value)
                .block(field_block(label, field))
                .wrap(Wrap { trim: false });
            f.render_widget(widget, chunks[field]);
        }

        let hint = Paragraph::new("Tab/↑↓ Move  ←/→ Change  Enter Save  Esc Cancel")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        f.render_widget(hint, chunks[7]);

        if let Some(input) = form.active_input() {
            let target = chunks[form.current_field];
            let x = target.x + 1 + (input.cursor as u16).min(target.width.saturating_sub(3));
            f.set_cursor_position((x, target.y + 1));
        }
    }

    fn render_confirm(&self, f: &mut Frame, area: Rect) {
        let title = self
            .confirm_delete
            .as_deref()
            .and_then(|id| self.store.get(id))
            .map(|t| t.title.as_str())
            .unwrap_or("");
        let area = centered_rect(50, 30, area);
        f.render_widget(Clear, area);

        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Delete this task and its direct subtasks?",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(title.to_string()),
            Line::from(""),
            Line::from("This action cannot be undone."),
            Line::from(""),
            Line::from("Press 'y' to confirm, 'n' to cancel"),
        ];
        let paragraph = Paragraph::new(text)
            .block(
                Block::default()
                    .title("Confirm Delete")
                    .borders(Borders::ALL)
                    .style(Style::default().bg(DARK_RED)),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let heading = |s: &'static str| {
            Line::from(Span::styled(s, Style::default().add_modifier(Modifier::BOLD)))
        };
        let help_text = vec![
            heading("TaskFlow Help"),
            Line::from(""),
            heading("Views:"),
            Line::from("  1-4, Tab      Dashboard / All Tasks / Hierarchy / Flow Board"),
            Line::from("  n             New task (from any view)"),
            Line::from("  q/Esc         Quit"),
            Line::from(""),
            heading("Tasks and Hierarchy:"),
            Line::from("  ↑/↓, k/j      Select task"),
            Line::from("  e/Enter       Edit task"),
            Line::from("  a             Add subtask under the selected task"),
            Line::from("  d             Delete task and its direct subtasks"),
            Line::from("  s             Cycle status"),
            Line::from("  g             Suggest subtasks with AI"),
            Line::from(""),
            heading("Flow Board:"),
            Line::from("  ←/→           Select column"),
            Line::from("  Ctrl+←/→, [/] Move card to the previous/next status"),
            Line::from(""),
            heading("Dashboard:"),
            Line::from("  r             Ask AI for a progress summary"),
            Line::from(""),
            heading("Due Date Formats:"),
            Line::from("  YYYY-MM-DD, today, tomorrow, friday, next monday, in 3d, in 2w, eow, eom"),
        ];
        let paragraph = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help - Press any key to return"),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            let loading = match &self.loading {
                Some(id) => format!(" | AI working on {id}"),
                None => String::new(),
            };
            let hints = match (self.state, self.view) {
                (AppState::AddTask, _) => "New Task",
                (AppState::EditTask, _) => "Edit Task",
                (AppState::Confirm, _) => "Confirm Delete",
                (AppState::Help, _) => "Help",
                (_, View::Dashboard) => "r: AI summary | n: New | h: Help",
                (_, View::Flow) => "←/→: Column | Ctrl+←/→: Move | e: Edit | n: New | h: Help",
                _ => "e: Edit | a: Subtask | d: Delete | s: Status | g: AI | n: New | h: Help",
            };
            format!("Tasks: {} | {hints}{loading}", self.store.len())
        };
        let status = Paragraph::new(status_text)
            .style(Style::default().bg(GOLD).fg(Color::Rgb(20, 20, 20)))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Draw the whole screen for the current view and state.
    pub fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        if self.state == AppState::Help {
            self.render_help(f, chunks[1]);
        } else {
            match self.view {
                View::Dashboard => self.render_dashboard(f, chunks[1]),
                View::Tasks => self.render_task_list(f, chunks[1]),
                View::Hierarchy => self.render_hierarchy(f, chunks[1]),
                View::Flow => self.render_flow(f, chunks[1]),
            }
        }
        match self.state {
            AppState::AddTask | AppState::EditTask => self.render_task_form(f, chunks[1]),
            AppState::Confirm => self.render_confirm(f, chunks[1]),
            _ => {}
        }
        self.render_status_bar(f, chunks[2]);
    }

    /// Main event loop: draw, apply finished AI work, wait for a key.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            self.poll_ai();
            terminal.draw(|f| self.render(f))?;

            if event::poll(self.poll_timeout)? {
                if let Event::Key(key) = event::read()? {
                    if self.handle_key(key) {
                        info!("leaving TUI");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

/// First visible card index so that `selected` stays on screen.
fn scroll_to_show(selected: usize, offset: usize, visible: usize) -> usize {
    if selected < offset {
        selected
    } else if selected >= offset + visible {
        selected + 1 - visible
    } else {
        offset
    }
}

fn render_empty(f: &mut Frame, area: Rect) {
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "No tasks found",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from("Time to plan your next big thing! Press 'n' to add a task."),
    ];
    let paragraph = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
    f.render_widget(paragraph, area);
}

/// One flow board card: priority, wrapped title, due date and labels.
fn render_card(f: &mut Frame, area: Rect, task: &Task, is_selected: bool, is_loading: bool) {
    let style = if is_selected {
        Style::default().bg(GOLD).fg(Color::Black).add_modifier(Modifier::BOLD)
    } else {
        Style::default().bg(Color::DarkGray)
    };

    let mut first = vec![Span::styled(
        format!("{} PRIORITY", task.priority.label().to_uppercase()),
        Style::default().fg(priority_color(task.priority)),
    )];
    if is_loading {
        first.push(Span::raw(" ✦"));
    }
    let mut card_text = vec![Line::from(first)];

    let available_width = area.width.saturating_sub(2) as usize;
    for line in wrap_words(&task.title, available_width, 2) {
        card_text.push(Line::from(line));
    }
    card_text.push(Line::from(format!(
        "{}{}",
        format_due(task.due_date, today()),
        label_suffix(&task.labels)
    )));

    let card = Paragraph::new(card_text)
        .block(Block::default().borders(Borders::ALL))
        .style(style);
    f.render_widget(card, area);
}

/// Greedy word wrap to at most `max_lines` lines of `width` characters.
fn wrap_words(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current = word.to_string();
        } else if current.chars().count() + 1 + word.chars().count() <= width {
            current.push(' ');
            current.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current));
            if lines.len() >= max_lines {
                return lines;
            }
            current = word.to_string();
        }
    }
    if !current.is_empty() && lines.len() < max_lines {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use ratatui::backend::TestBackend;

    use crate::ai::NoopAssistant;
    use crate::db::MemoryStorage;
    use crate::task::GENERATED_LABEL;

    struct FixedAssistant(Vec<String>);

    impl Assistant for FixedAssistant {
        fn suggest_subtasks(&self, _title: &str, _description: &str) -> Vec<String> {
            self.0.clone()
        }

        fn dashboard_summary(&self, tasks: &[Task]) -> String {
            format!("{} tasks, keep going", tasks.len())
        }
    }

    /// Blocks each suggestion until the test sends a release signal.
    struct GatedAssistant {
        gate: Mutex<Receiver<()>>,
    }

    impl Assistant for GatedAssistant {
        fn suggest_subtasks(&self, _title: &str, _description: &str) -> Vec<String> {
            if let Ok(gate) = self.gate.lock() {
                let _ = gate.recv();
            }
            vec!["Step".to_string()]
        }

        fn dashboard_summary(&self, _tasks: &[Task]) -> String {
            String::new()
        }
    }

    fn store_with(tasks: Vec<Task>) -> TaskStore {
        let json = serde_json::to_string(&tasks).unwrap();
        TaskStore::open(Box::new(MemoryStorage::with_value(json))).unwrap()
    }

    fn child(id: &str, title: &str, parent: &str) -> Task {
        let mut t = Task::new(id, title);
        t.parent_id = Some(parent.to_string());
        t
    }

    fn sample_app(assistant: Arc<dyn Assistant>) -> App {
        let tasks = vec![
            Task::new("p1", "Plan vacation"),
            child("c1", "Book flights", "p1"),
            Task::new("p2", "Write report"),
        ];
        App::new(store_with(tasks), assistant, Duration::from_millis(10))
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn wait_for_ai(app: &mut App) {
        for _ in 0..200 {
            app.poll_ai();
            if app.loading.is_none() && !app.summary_pending {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("AI reply never arrived");
    }

    fn screen(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| app.render(f)).unwrap();
        let buffer = terminal.backend().buffer();
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn number_keys_and_tab_switch_views() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        assert_eq!(app.view().route(), "/");
        press(&mut app, KeyCode::Char('3'));
        assert_eq!(app.view(), View::Hierarchy);
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.view().route(), "/flow");
        press(&mut app, KeyCode::Tab);
        assert_eq!(app.view(), View::Dashboard);
        app.navigate("/tasks");
        assert_eq!(app.view(), View::Tasks);
    }

    #[test]
    fn quit_keys() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        assert!(press(&mut app, KeyCode::Char('q')));
        assert!(app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)));
    }

    #[test]
    fn new_task_form_creates_task() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.state(), AppState::AddTask);
        type_text(&mut app, "Buy milk");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state(), AppState::Browse);
        assert_eq!(app.status_message(), "Task created");
        assert_eq!(app.store().len(), 4);
        let created = &app.store().tasks()[3];
        assert_eq!(created.title, "Buy milk");
        assert_eq!(created.status, Status::Incomplete);
        assert_eq!(created.parent_id, None);
    }

    #[test]
    fn empty_title_keeps_form_open() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        press(&mut app, KeyCode::Char('n'));
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.state(), AppState::AddTask);
        assert_eq!(app.status_message(), "Title is required");
        assert_eq!(app.store().len(), 3);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state(), AppState::Browse);
    }

    #[test]
    fn edit_replaces_selected_task() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        app.navigate("/tasks");
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.state(), AppState::EditTask);
        type_text(&mut app, " now");
        press(&mut app, KeyCode::Enter);
        let task = app.store().get("c1").unwrap();
        assert_eq!(task.title, "Book flights now");
        assert_eq!(task.parent_id.as_deref(), Some("p1"));
        assert_eq!(app.store().len(), 3);
    }

    #[test]
    fn add_subtask_preselects_parent() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        app.navigate("/hierarchy");
        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "Pack bags");
        press(&mut app, KeyCode::Enter);
        let added = app.store().tasks().last().unwrap();
        assert_eq!(added.parent_id.as_deref(), Some("p1"));
    }

    #[test]
    fn delete_requires_confirmation_and_cascades_one_level() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        app.navigate("/tasks");
        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.state(), AppState::Confirm);
        press(&mut app, KeyCode::Char('n'));
        assert_eq!(app.store().len(), 3);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert_eq!(app.state(), AppState::Browse);
        let ids: Vec<&str> = app.store().tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["p2"]);
        assert_eq!(app.list_state.selected(), Some(0));
    }

    #[test]
    fn status_key_cycles_selected_task() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        app.navigate("/tasks");
        press(&mut app, KeyCode::Char('s'));
        assert_eq!(app.store().get("p1").unwrap().status, Status::InProgress);
    }

    #[test]
    fn flow_board_moves_card_and_follows_it() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        app.navigate("/flow");
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char(']'));
        assert_eq!(app.store().get("c1").unwrap().status, Status::InProgress);
        assert_eq!(app.board_column, 1);
        assert_eq!(app.board_card, 0);

        app.handle_key(KeyEvent::new(KeyCode::Right, KeyModifiers::CONTROL));
        assert_eq!(app.store().get("c1").unwrap().status, Status::Due);

        // nothing left of the first column
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Left);
        assert_eq!(app.board_column, 0);
        press(&mut app, KeyCode::Char('['));
        assert_eq!(app.store().get("p1").unwrap().status, Status::Incomplete);
    }

    #[test]
    fn ai_suggestions_are_added_under_selected_task() {
        let titles = vec!["Pick dates".to_string(), " ".to_string(), "Set budget".to_string()];
        let mut app = sample_app(Arc::new(FixedAssistant(titles)));
        app.navigate("/tasks");
        press(&mut app, KeyCode::Char('g'));
        wait_for_ai(&mut app);
        assert_eq!(app.status_message(), "Added 2 AI subtasks");
        let generated: Vec<&Task> = app
            .store()
            .tasks()
            .iter()
            .filter(|t| t.labels.iter().any(|l| l == GENERATED_LABEL))
            .collect();
        assert_eq!(generated.len(), 2);
        assert!(generated.iter().all(|t| t.parent_id.as_deref() == Some("p1")));
    }

    #[test]
    fn empty_suggestions_leave_store_unchanged() {
        let mut app = sample_app(Arc::new(FixedAssistant(Vec::new())));
        app.navigate("/tasks");
        let before = app.store().tasks().to_vec();
        press(&mut app, KeyCode::Char('g'));
        wait_for_ai(&mut app);
        assert_eq!(app.store().tasks(), before.as_slice());
        assert_eq!(app.status_message(), "No suggestions received");
    }

    #[test]
    fn second_request_is_refused_while_loading() {
        let (release, gate) = mpsc::channel();
        let assistant = GatedAssistant {
            gate: Mutex::new(gate),
        };
        let mut app = sample_app(Arc::new(assistant));
        app.navigate("/tasks");
        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.loading.as_deref(), Some("p1"));

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('g'));
        assert_eq!(app.status_message(), "Still generating subtasks for p1");
        assert_eq!(app.loading.as_deref(), Some("p1"));

        release.send(()).unwrap();
        wait_for_ai(&mut app);
        assert_eq!(app.store().len(), 4);
        assert_eq!(app.store().tasks()[3].parent_id.as_deref(), Some("p1"));
    }

    #[test]
    fn suggestions_for_deleted_task_are_dropped() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        app.store.delete("p2").unwrap();
        app.loading = Some("p2".into());
        app.apply_ai_reply(AiReply::Subtasks {
            parent_id: "p2".into(),
            titles: vec!["x".into()],
        });
        assert!(app.loading.is_none());
        assert_eq!(app.store().len(), 2);
    }

    #[test]
    fn unconfigured_assistant_is_reported() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        app.navigate("/tasks");
        press(&mut app, KeyCode::Char('g'));
        assert!(app.loading.is_none());
        assert!(app.status_message().contains("not configured"));
    }

    #[test]
    fn dashboard_summary_arrives_from_worker() {
        let mut app = sample_app(Arc::new(FixedAssistant(Vec::new())));
        press(&mut app, KeyCode::Char('r'));
        wait_for_ai(&mut app);
        assert_eq!(app.summary.as_deref(), Some("3 tasks, keep going"));
        assert!(screen(&mut app).contains("3 tasks, keep going"));
    }

    #[test]
    fn renders_every_view() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        let dashboard = screen(&mut app);
        assert!(dashboard.contains("TaskFlow Pro  /"));
        assert!(dashboard.contains("Task Distribution"));
        assert!(dashboard.contains("Completion"));

        app.navigate("/tasks");
        let list = screen(&mut app);
        assert!(list.contains("All Tasks (3)"));
        assert!(list.contains("Book flights"));

        app.navigate("/hierarchy");
        let tree = screen(&mut app);
        assert!(tree.contains("Plan vacation (1 subtasks)"));
        assert!(tree.contains("  Book flights"));

        app.navigate("/flow");
        let board = screen(&mut app);
        assert!(board.contains("Incomplete (3)"));
        assert!(board.contains("In Progress (0)"));
        assert!(board.contains("MEDIUM PRIORITY"));
    }

    #[test]
    fn renders_form_and_confirm_overlays() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        press(&mut app, KeyCode::Char('n'));
        let form = screen(&mut app);
        assert!(form.contains("New Task"));
        assert!(form.contains("< None >"));

        press(&mut app, KeyCode::Esc);
        app.navigate("/tasks");
        press(&mut app, KeyCode::Char('d'));
        assert!(screen(&mut app).contains("Confirm Delete"));
    }

    #[test]
    fn empty_store_shows_placeholder() {
        let mut app = sample_app(Arc::new(NoopAssistant));
        for id in ["p1", "p2"] {
            app.store.delete(id).unwrap();
        }
        app.clamp_selection();
        app.navigate("/tasks");
        assert!(screen(&mut app).contains("No tasks found"));
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.state(), AppState::Browse);
    }

    #[test]
    fn scroll_keeps_selection_visible() {
        assert_eq!(scroll_to_show(0, 0, 3), 0);
        assert_eq!(scroll_to_show(5, 0, 3), 3);
        assert_eq!(scroll_to_show(1, 3, 3), 1);
        assert_eq!(scroll_to_show(4, 3, 3), 3);
    }

    #[test]
    fn wraps_titles_to_card_width() {
        assert_eq!(
            wrap_words("Plan the big summer vacation", 10, 2),
            vec!["Plan the", "big summer"]
        );
        assert_eq!(wrap_words("short", 10, 2), vec!["short"]);
    }
}
