use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};

use ticket_verifier::{
    DisplayEvent, DisplaySink, HistoryEntry, Scanner, SearchFilter, Session, StatusLevel,
    StatusMessage,
};

const TOAST_DURATION: Duration = Duration::from_secs(3);
const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Typing a code
    Entry,
    /// Typing a history search query
    Search,
    /// Waiting for y/n before clearing
    ConfirmClear,
}

// ============================================================================
// DISPLAY FEED
// ============================================================================

/// Display side of the session: the status banner and a timed toast
#[derive(Default)]
pub struct UiFeed {
    pub status: Option<StatusMessage>,
    pub toast: Option<(StatusMessage, Instant)>,
}

impl UiFeed {
    pub fn active_toast(&self) -> Option<&StatusMessage> {
        self.toast
            .as_ref()
            .filter(|(_, shown)| shown.elapsed() < TOAST_DURATION)
            .map(|(message, _)| message)
    }
}

impl DisplaySink for UiFeed {
    fn emit(&mut self, event: DisplayEvent) {
        // History and counters are read straight from the session on draw
        if let DisplayEvent::Status(status) = event {
            self.toast = Some((status.clone(), Instant::now()));
            self.status = Some(status);
        }
    }
}

// ============================================================================
// APP
// ============================================================================

pub struct App {
    pub session: Session<UiFeed>,
    pub scanner: Scanner,
    pub close_on_detect: bool,
    pub mode: Mode,
    pub input: String,
    pub search: String,
    pub history_state: TableState,
    pub should_quit: bool,
}

impl App {
    pub fn new(session: Session<UiFeed>, scanner: Scanner, close_on_detect: bool) -> Self {
        let mut app = Self {
            session,
            scanner,
            close_on_detect,
            mode: Mode::Entry,
            input: String::new(),
            search: String::new(),
            history_state: TableState::default(),
            should_quit: false,
        };
        app.session.notify(StatusMessage::info(
            "Ready. Type a code and press Enter, or Ctrl+S to scan",
        ));
        app
    }

    pub fn filter(&self) -> SearchFilter {
        SearchFilter::new(&self.search)
    }

    pub fn visible_history(&self) -> Vec<&HistoryEntry> {
        let filter = self.filter();
        self.session
            .history()
            .entries()
            .filter(|entry| filter.matches(entry))
            .collect()
    }

    pub fn submit_input(&mut self) {
        let code = std::mem::take(&mut self.input);
        self.session.submit(&code);
        self.history_state.select(None);
    }

    pub fn toggle_scanner(&mut self) {
        if self.scanner.is_scanning() {
            self.scanner.close(&mut self.session);
        } else {
            self.scanner.open(&mut self.session);
        }
    }

    /// Forward pending detections; called once per tick
    ///
    /// With `close_on_detect` only one detection is forwarded, and the
    /// scanner closes once a detection has been verified. A code rejected by
    /// the format check leaves it open.
    pub fn on_tick(&mut self) {
        if self.close_on_detect {
            if let Some(outcome) = self.scanner.poll_one(&mut self.session) {
                self.history_state.select(None);
                if outcome.mutates_state() {
                    self.scanner.close(&mut self.session);
                }
            }
            return;
        }

        if !self.scanner.poll(&mut self.session).is_empty() {
            self.history_state.select(None);
        }
    }

    pub fn next(&mut self) {
        let len = self.visible_history().len();
        if len == 0 {
            return;
        }
        let i = match self.history_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            Some(_) => 0,
            None => 0,
        };
        self.history_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_history().len();
        if len == 0 {
            return;
        }
        let i = match self.history_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.history_state.select(Some(i));
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => {
                    self.should_quit = true;
                    return;
                }
                KeyCode::Char('s') if self.mode != Mode::ConfirmClear => {
                    self.toggle_scanner();
                    return;
                }
                KeyCode::Char('f') if self.mode == Mode::Entry => {
                    self.mode = Mode::Search;
                    return;
                }
                KeyCode::Char('l') if self.mode == Mode::Entry => {
                    self.mode = Mode::ConfirmClear;
                    return;
                }
                _ => return,
            }
        }

        match self.mode {
            Mode::Entry => match key.code {
                KeyCode::Enter => self.submit_input(),
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Esc => {
                    if self.scanner.is_scanning() {
                        self.scanner.close(&mut self.session);
                    } else {
                        self.input.clear();
                    }
                }
                KeyCode::Down => self.next(),
                KeyCode::Up => self.previous(),
                KeyCode::Char(c) => self.input.push(c),
                _ => {}
            },
            Mode::Search => match key.code {
                KeyCode::Enter => self.mode = Mode::Entry,
                KeyCode::Esc => {
                    self.search.clear();
                    self.mode = Mode::Entry;
                }
                KeyCode::Backspace => {
                    self.search.pop();
                    self.history_state.select(None);
                }
                KeyCode::Char(c) => {
                    self.search.push(c);
                    self.history_state.select(None);
                }
                _ => {}
            },
            Mode::ConfirmClear => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.session.request_reset(true);
                    self.history_state.select(None);
                    self.mode = Mode::Entry;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    self.session.request_reset(false);
                    self.mode = Mode::Entry;
                }
                _ => {}
            },
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.scanner.close(&mut app.session);

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key);
                }
            }
        }

        app.on_tick();

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Counters
            Constraint::Length(3), // Code entry
            Constraint::Length(3), // Status message
            Constraint::Min(0),    // History
            Constraint::Length(3), // Key hints
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_input(f, chunks[1], app);
    render_status(f, chunks[2], app);
    render_history(f, chunks[3], app);
    render_status_bar(f, chunks[4], app);

    if app.mode == Mode::ConfirmClear {
        let area = f.size();
        render_confirm(f, area);
    }
}

fn level_color(level: StatusLevel) -> Color {
    match level {
        StatusLevel::Info => Color::Cyan,
        StatusLevel::Success => Color::Green,
        StatusLevel::Warning => Color::Yellow,
        StatusLevel::Error => Color::Red,
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let snapshot = app.session.snapshot();
    let counters = snapshot.counters;

    let mut spans = vec![
        Span::styled(
            "Ticket Verifier",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Policy: {}", snapshot.policy),
            Style::default().fg(Color::White),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("✓ {}", counters.valid),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  "),
        Span::styled(
            format!("✗ {}", counters.invalid),
            Style::default().fg(Color::Red),
        ),
        Span::raw("  "),
        Span::styled(
            format!("⟳ {}", counters.duplicate),
            Style::default().fg(Color::Yellow),
        ),
    ];

    if let Some(remaining) = snapshot.remaining_valid {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("Remaining: {}", remaining),
            Style::default().fg(Color::White),
        ));
    }

    if app.scanner.is_scanning() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            "● SCANNING",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_input(f: &mut Frame, area: Rect, app: &App) {
    let (title, text, active) = match app.mode {
        Mode::Search => (" Search history ", app.search.as_str(), true),
        _ => (" Code ", app.input.as_str(), app.mode == Mode::Entry),
    };

    let border = if active { Color::Yellow } else { Color::DarkGray };
    let input = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title),
    );
    f.render_widget(input, area);

    if active {
        let x = area.x + 1 + text.chars().count() as u16;
        f.set_cursor(x.min(area.right().saturating_sub(2)), area.y + 1);
    }
}

fn render_status(f: &mut Frame, area: Rect, app: &App) {
    let feed = app.session.sink();

    let line = match (feed.active_toast(), feed.status.as_ref()) {
        (Some(toast), _) => Line::from(vec![
            Span::styled(
                format!(" {} ", toast.headline),
                Style::default()
                    .fg(level_color(toast.level))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(toast.detail.clone(), Style::default().fg(Color::White)),
        ]),
        (None, Some(status)) => Line::from(Span::styled(
            format!(" {} ", status.headline),
            Style::default().fg(level_color(status.level)),
        )),
        (None, None) => Line::from(""),
    };

    let status = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Status "),
    );
    f.render_widget(status, area);
}

fn render_history(f: &mut Frame, area: Rect, app: &mut App) {
    let visible = app.visible_history();
    let total = app.session.history().len();

    let title = if app.search.is_empty() {
        format!(" Scan History ({}) ", total)
    } else {
        format!(" Scan History ({}/{} matching '{}') ", visible.len(), total, app.search)
    };

    if visible.is_empty() {
        let text = if total == 0 {
            "No scans yet. Start scanning to see history here."
        } else {
            "No entries match the search."
        };
        let empty = Paragraph::new(Line::from(Span::styled(
            format!("  {}", text),
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title),
        );
        f.render_widget(empty, area);
        return;
    }

    let header_cells = ["Code", "Result", "Time"].iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows: Vec<Row> = visible
        .iter()
        .map(|entry| {
            let color = if entry.is_valid() {
                Color::Green
            } else {
                Color::Red
            };
            Row::new(vec![
                Cell::from(entry.code.clone()),
                Cell::from(entry.status.name().to_uppercase()).style(Style::default().fg(color)),
                Cell::from(entry.time_string()),
            ])
            .height(1)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(24),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(title),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.history_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let hints: &[(&str, &str)] = match app.mode {
        Mode::Entry => &[
            ("Enter", " Verify | "),
            ("Ctrl+S", " Scan | "),
            ("Ctrl+F", " Search | "),
            ("Ctrl+L", " Clear | "),
            ("↑/↓", " History | "),
        ],
        Mode::Search => &[("Enter", " Done | "), ("Esc", " Reset search | ")],
        Mode::ConfirmClear => &[("y", " Clear | "), ("n", " Cancel | ")],
    };

    let mut spans = vec![Span::raw(" ")];
    for (key, label) in hints {
        spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(*label));
    }
    spans.push(Span::styled("Ctrl+Q", Style::default().fg(Color::Red)));
    spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_confirm(f: &mut Frame, area: Rect) {
    let width = 50.min(area.width);
    let height = 5.min(area.height);
    let popup = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };

    let content = vec![
        Line::from(""),
        Line::from(vec![
            Span::raw("  Clear all scan history? "),
            Span::styled("(y/n)", Style::default().fg(Color::Yellow)),
        ]),
    ];

    let dialog = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" Confirm "),
    );

    f.render_widget(Clear, popup);
    f.render_widget(dialog, popup);
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;
    use ticket_verifier::{CodeUniverse, Policy, ReplayDecoder, UnavailableDecoder, Verifier};

    fn app(policy: Policy) -> App {
        let verifier = Verifier::new(policy, CodeUniverse::from_range(1, 20000, 5));
        let session = Session::new(verifier, 100, UiFeed::default());
        let scanner = Scanner::new(Box::new(UnavailableDecoder::new("test")));
        App::new(session, scanner, false)
    }

    fn replay_app(lines: &[&str], close_on_detect: bool) -> (App, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        let verifier = Verifier::new(Policy::Ticket, CodeUniverse::from_range(1, 20000, 5));
        let session = Session::new(verifier, 100, UiFeed::default());
        let decoder = ReplayDecoder::new(file.path(), Duration::from_millis(1));
        let app = App::new(session, Scanner::new(Box::new(decoder)), close_on_detect);
        (app, file)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn test_enter_submits_code() {
        let mut app = app(Policy::Ticket);
        type_text(&mut app, "00007");
        app.handle_key(key(KeyCode::Enter));

        assert!(app.input.is_empty());
        assert_eq!(app.session.snapshot().counters.valid, 1);
        assert_eq!(app.visible_history().len(), 1);
    }

    #[test]
    fn test_search_filters_history_only() {
        let mut app = app(Policy::Ticket);
        type_text(&mut app, "00001");
        app.handle_key(key(KeyCode::Enter));
        type_text(&mut app, "00042");
        app.handle_key(key(KeyCode::Enter));

        app.handle_key(ctrl('f'));
        assert_eq!(app.mode, Mode::Search);
        type_text(&mut app, "004");

        let visible: Vec<&str> = app.visible_history().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(visible, vec!["00042"]);
        assert_eq!(app.session.snapshot().total_scanned, 2);

        app.handle_key(key(KeyCode::Esc));
        assert_eq!(app.mode, Mode::Entry);
        assert_eq!(app.visible_history().len(), 2);
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let mut app = app(Policy::Ticket);
        type_text(&mut app, "00001");
        app.handle_key(key(KeyCode::Enter));

        app.handle_key(ctrl('l'));
        app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(app.session.snapshot().counters.valid, 1);
        assert_eq!(app.mode, Mode::Entry);

        app.handle_key(ctrl('l'));
        app.handle_key(key(KeyCode::Char('y')));
        assert_eq!(app.session.snapshot().counters.valid, 0);
        assert!(app.visible_history().is_empty());
    }

    #[test]
    fn test_scanner_failure_shows_status() {
        let mut app = app(Policy::Lookup);
        app.handle_key(ctrl('s'));

        assert!(!app.scanner.is_scanning());
        let status = app.session.sink().status.clone().unwrap();
        assert_eq!(status.level, StatusLevel::Error);
    }

    #[test]
    fn test_ctrl_q_quits() {
        let mut app = app(Policy::Ticket);
        app.handle_key(ctrl('q'));
        assert!(app.should_quit);
    }

    #[test]
    fn test_history_navigation_wraps() {
        let mut app = app(Policy::Ticket);
        for code in ["00001", "00002"] {
            type_text(&mut app, code);
            app.handle_key(key(KeyCode::Enter));
        }

        app.next();
        assert_eq!(app.history_state.selected(), Some(0));
        app.next();
        app.next();
        assert_eq!(app.history_state.selected(), Some(0));
        app.previous();
        assert_eq!(app.history_state.selected(), Some(1));
    }

    #[test]
    fn test_close_on_detect_forwards_one_code() {
        let (mut app, _file) = replay_app(&["00001", "00002", "00003"], true);
        app.toggle_scanner();
        assert!(app.scanner.is_scanning());

        thread::sleep(Duration::from_millis(100));
        app.on_tick();

        assert!(!app.scanner.is_scanning());
        assert_eq!(app.session.verifier().seen(), &["00001".to_string()]);
    }

    #[test]
    fn test_close_on_detect_stays_open_on_bad_format() {
        let (mut app, _file) = replay_app(&["12", "00001"], true);
        app.toggle_scanner();

        thread::sleep(Duration::from_millis(100));
        app.on_tick();
        assert!(app.scanner.is_scanning());
        assert_eq!(app.session.snapshot().total_scanned, 0);

        app.on_tick();
        assert!(!app.scanner.is_scanning());
        assert_eq!(app.session.snapshot().counters.valid, 1);
    }

    #[test]
    fn test_scanner_keeps_running_by_default() {
        let (mut app, _file) = replay_app(&["00001", "00002"], false);
        app.toggle_scanner();

        thread::sleep(Duration::from_millis(100));
        app.on_tick();

        assert_eq!(app.session.snapshot().counters.valid, 2);
    }
}
