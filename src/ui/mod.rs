//! Terminal UI for reviewing a classification
//!
//! Lists every asset with its status and shows, for the selected one, the
//! references that made it used (or the commented-out ones that did not).

mod app;
pub mod rows;

use std::io;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::config::MatchPolicy;
use crate::pipeline::Analysis;

pub use app::{run_app, App};
pub use rows::{rows_for, AssetRow, StatusFilter};

/// Header line for an analysis.
pub fn title_for(analysis: &Analysis) -> String {
    let options = analysis.classification.options;
    format!(
        "assetscope - {} ({}{})",
        analysis.project,
        if options.strict { "strict" } else { "lenient" },
        match options.match_policy {
            MatchPolicy::Dual => "",
            MatchPolicy::ExactOnly => ", exact-only",
        }
    )
}

/// Open the review browser on the current terminal and block until the user quits.
pub fn review(analysis: &Analysis) -> io::Result<()> {
    let mut app = App::new(title_for(analysis), rows_for(&analysis.classification));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run_app(&mut terminal, &mut app);

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}
