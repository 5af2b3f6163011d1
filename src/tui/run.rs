//! TUI entry point and terminal setup.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::CrosstermBackend, Terminal};
use tracing::info;

use crate::ai::Assistant;
use crate::store::TaskStore;
use crate::tui::app::App;

/// Take over the terminal and run the interactive UI until the user quits.
/// The terminal is restored even when the event loop fails.
pub fn run_tui(
    store: TaskStore,
    assistant: Arc<dyn Assistant>,
    poll_timeout: Duration,
) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    info!("TUI started");

    let mut app = App::new(store, assistant, poll_timeout);
    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
