//! Review screen state, key handling and drawing
//!
//! The screen is a status tab bar, a table of assets and a panel that
//! explains the selected asset's status from its references.

use std::io;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Tabs, Wrap},
    Frame, Terminal,
};

use super::rows::{AssetRow, StatusFilter};
use crate::inventory::AssetStatus;

/// Table header plus borders
const TABLE_CHROME: u16 = 3;

/// Review screen state
pub struct App {
    /// Header text (project name and classification mode)
    pub title: String,
    rows: Vec<AssetRow>,
    pub filter: StatusFilter,
    pub query: String,
    /// Keys go to the search query instead of navigation
    pub searching: bool,
    /// Indices into `rows` that pass the filter and query
    visible: Vec<usize>,
    table: TableState,
    /// Rows per page, measured on the last draw
    page: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(title: impl Into<String>, rows: Vec<AssetRow>) -> Self {
        let mut app = Self {
            title: title.into(),
            rows,
            filter: StatusFilter::All,
            query: String::new(),
            searching: false,
            visible: Vec::new(),
            table: TableState::default(),
            page: 10,
            should_quit: false,
        };
        app.refilter();
        app
    }

    /// Rows shown in the table, in order
    pub fn visible_rows(&self) -> impl Iterator<Item = &AssetRow> {
        self.visible.iter().map(|&i| &self.rows[i])
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn selected(&self) -> Option<&AssetRow> {
        let index = *self.visible.get(self.table.selected()?)?;
        self.rows.get(index)
    }

    fn count(&self, filter: StatusFilter) -> usize {
        self.rows.iter().filter(|r| filter.admits(r.status)).count()
    }

    /// Recompute the visible rows, keeping the selected asset when it survives.
    fn refilter(&mut self) {
        let keep = self.selected().map(|row| row.path.clone());
        let needle = self.query.to_lowercase();
        let filter = self.filter;
        self.visible = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| filter.admits(row.status) && row.matches(&needle))
            .map(|(i, _)| i)
            .collect();

        let position = keep
            .and_then(|path| self.visible.iter().position(|&i| self.rows[i].path == path))
            .or(if self.visible.is_empty() { None } else { Some(0) });
        self.table.select(position);
    }

    /// Move the selection by `delta` rows, stopping at either end.
    pub fn move_by(&mut self, delta: isize) {
        let Some(last) = self.visible.len().checked_sub(1) else {
            return;
        };
        let current = self.table.selected().unwrap_or(0);
        let target = current.saturating_add_signed(delta).min(last);
        self.table.select(Some(target));
    }

    pub fn page_down(&mut self) {
        self.move_by(self.page.max(1) as isize);
    }

    pub fn page_up(&mut self) {
        self.move_by(-(self.page.max(1) as isize));
    }

    pub fn select_first(&mut self) {
        self.move_by(isize::MIN);
    }

    pub fn select_last(&mut self) {
        self.move_by(isize::MAX);
    }

    pub fn cycle_filter(&mut self) {
        self.filter = self.filter.next();
        self.refilter();
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.refilter();
    }

    /// Route one key press.
    pub fn handle_key(&mut self, code: KeyCode) {
        if self.searching {
            match code {
                KeyCode::Enter => self.searching = false,
                KeyCode::Esc => {
                    self.searching = false;
                    self.set_query("");
                }
                KeyCode::Backspace => {
                    self.query.pop();
                    self.refilter();
                }
                KeyCode::Char(c) => {
                    self.query.push(c);
                    self.refilter();
                }
                KeyCode::Down => self.move_by(1),
                KeyCode::Up => self.move_by(-1),
                _ => {}
            }
            return;
        }

        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Esc if self.query.is_empty() => self.should_quit = true,
            KeyCode::Esc => self.set_query(""),
            KeyCode::Char('/') => self.searching = true,
            KeyCode::Tab => self.cycle_filter(),
            KeyCode::Char('j') | KeyCode::Down => self.move_by(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_by(-1),
            KeyCode::PageDown | KeyCode::Char('d') => self.page_down(),
            KeyCode::PageUp | KeyCode::Char('u') => self.page_up(),
            KeyCode::Home | KeyCode::Char('g') => self.select_first(),
            KeyCode::End | KeyCode::Char('G') => self.select_last(),
            _ => {}
        }
    }
}

/// Draw and handle keys until the user quits
pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| render(frame, app))?;
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                app.handle_key(key.code);
            }
        }
    }
    Ok(())
}

fn status_color(status: AssetStatus) -> Color {
    match status {
        AssetStatus::Used => Color::Green,
        AssetStatus::Unused => Color::Red,
        AssetStatus::Unknown => Color::Gray,
    }
}

fn render(frame: &mut Frame, app: &mut App) {
    let [tabs_area, body, footer] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)])
        .areas(frame.area());
    let [table_area, panel_area] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .areas(body);

    render_tabs(frame, app, tabs_area);
    render_table(frame, app, table_area);
    render_justification(frame, app.selected(), panel_area);
    render_footer(frame, app, footer);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles: Vec<String> = StatusFilter::TABS
        .iter()
        .map(|f| format!("{} ({})", f.label(), app.count(*f)))
        .collect();
    let tabs = Tabs::new(titles)
        .select(app.filter.index())
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(Span::styled(
                    app.title.as_str(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )),
        );
    frame.render_widget(tabs, area);
}

fn render_table(frame: &mut Frame, app: &mut App, area: Rect) {
    app.page = area.height.saturating_sub(TABLE_CHROME) as usize;

    let rows: Vec<Row> = app
        .visible_rows()
        .map(|row| {
            let color = status_color(row.status);
            Row::new(vec![
                Cell::from(Span::styled(row.status.to_string(), Style::default().fg(color))),
                Cell::from(row.size_human()),
                Cell::from(row.path.clone()),
                Cell::from(Span::styled(row.verdict(), Style::default().fg(Color::DarkGray))),
            ])
        })
        .collect();

    let title = if app.query.is_empty() {
        format!("Assets ({})", app.visible_len())
    } else {
        format!("Assets matching '{}' ({})", app.query, app.visible_len())
    };
    let table = Table::new(
        rows,
        [
            Constraint::Length(7),
            Constraint::Length(9),
            Constraint::Fill(1),
            Constraint::Length(18),
        ],
    )
    .header(
        Row::new(vec!["Status", "Size", "Path", "Why"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .block(Block::default().borders(Borders::ALL).title(title));

    frame.render_stateful_widget(table, area, &mut app.table);
}

/// The references behind the selected asset's status
fn justification_lines(row: &AssetRow) -> Vec<Line<'static>> {
    let color = status_color(row.status);
    let mut lines = vec![
        Line::from(Span::styled(
            row.path.clone(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("{}, {}", row.status, row.size_human())),
        Line::default(),
    ];

    let heading = match (row.status, row.references.is_empty()) {
        (AssetStatus::Used, _) => "Referenced by:",
        (_, false) => "Only referenced inside comments:",
        (_, true) => "No scanned file references this asset.",
    };
    lines.push(Line::from(heading));

    for reference in &row.references {
        let style = if reference.is_commented {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            Span::styled(format!("  {}", reference.location()), style.fg(Color::Yellow)),
            Span::styled(
                format!("  {} '{}'", reference.kind.label(), reference.raw_text),
                style,
            ),
            Span::styled(
                if reference.is_commented { " (comment)" } else { "" },
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }
    lines
}

fn render_justification(frame: &mut Frame, selected: Option<&AssetRow>, area: Rect) {
    let lines = match selected {
        Some(row) => justification_lines(row),
        None => vec![Line::from("No asset matches.")],
    };
    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Justification"));
    frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
    let line = if app.searching {
        Line::from(vec![
            key("/"),
            Span::raw(app.query.clone()),
            Span::styled("_", Style::default().fg(Color::Yellow)),
            Span::raw("   Enter keep  Esc clear"),
        ])
    } else {
        Line::from(vec![
            key("Tab"),
            Span::raw(" status  "),
            key("/"),
            Span::raw(" search  "),
            key("j/k"),
            Span::raw(" move  "),
            key("d/u"),
            Span::raw(" page  "),
            key("g/G"),
            Span::raw(" ends  "),
            key("q"),
            Span::raw(" quit"),
        ])
    };
    frame.render_widget(Paragraph::new(line), area);
}
