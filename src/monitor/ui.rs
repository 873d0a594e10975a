use crate::core::dispatcher::Dispatcher;
use crate::core::error::{AppError, ErrorReporter, TracingErrorReporter};
use crate::core::run_state::ToolRun;
use crate::core::session_log::write_session_log;
use crate::core::types::ToolState;
use crate::core::worker::WorkerEvent;
use crate::monitor::event::MenuAction;
use crate::monitor::state::{InputMode, MenuState, PathField, TabState};
use crate::tools::{LaunchRequest, Launcher, ProcessWorker};
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

/// Everything the TUI loop owns while it runs on its blocking thread.
pub struct TuiSession {
    pub launcher: Launcher,
    pub dispatcher: Dispatcher<ProcessWorker>,
    pub events: UnboundedReceiver<WorkerEvent>,
    pub state: MenuState,
    pub tick: Duration,
    pub runtime: Handle,
}

/// Run the TUI loop and keep the terminal interface responsive.
pub fn run_tui(mut session: TuiSession) -> crate::Result<()> {
    let mut stdout = io::stdout();
    enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, &mut session);
    session.dispatcher.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    result
}

fn event_loop<B: Backend>(terminal: &mut Terminal<B>, session: &mut TuiSession) -> crate::Result<()> {
    let mut last_tick = Instant::now();
    loop {
        if last_tick.elapsed() >= session.tick {
            let report = session.dispatcher.tick(&mut session.events);
            for transition in &report.transitions {
                tracing::debug!(tool = %transition.tool, state = %transition.state, "tab settled");
            }
            last_tick = Instant::now();
        }
        session.state.sync(&session.dispatcher);

        terminal.draw(|frame| draw_ui(frame, &session.state, &session.dispatcher))?;

        if session.state.exit_requested() {
            break;
        }

        let timeout = session.tick.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let CEvent::Key(key) = event::read()? {
                if let Some(action) = handle_key(key, &mut session.state) {
                    if let Err(err) = apply_action(session, action) {
                        TracingErrorReporter.report_error(&err);
                        session.state.show_error(&err);
                    }
                }
            }
        }
    }
    Ok(())
}

fn apply_action(session: &mut TuiSession, action: MenuAction) -> Result<(), AppError> {
    let tool = action.tool().to_string();
    match action {
        MenuAction::Start { .. } => {
            let Some(tab) = session.state.tabs.iter().find(|tab| tab.tool == tool) else {
                return Ok(());
            };
            let request = LaunchRequest {
                tool: tool.clone(),
                cpus: session.dispatcher.budget().selection(&tool),
                input_dir: if tab.synthetic { None } else { tab.input.clone() },
                output_dir: tab.output.clone(),
                log_only: tab.log_only,
            };
            session
                .runtime
                .block_on(session.launcher.start(&mut session.dispatcher, &request))?;
        }
        MenuAction::Kill { .. } => session.dispatcher.kill(&tool)?,
        MenuAction::Reset { .. } => {
            session.dispatcher.reset(&tool)?;
            if let Some(tab) = session.state.tabs.iter_mut().find(|tab| tab.tool == tool) {
                tab.log_only = false;
            }
        }
        MenuAction::AdjustCpus { delta, .. } => {
            let current = session.dispatcher.budget().selection(&tool);
            let wanted = current.saturating_add_signed(delta);
            session.dispatcher.select_cpus(&tool, wanted)?;
        }
        MenuAction::WriteLog { dir, .. } => {
            let run = session.dispatcher.run(&tool).ok_or_else(|| {
                AppError::user_entry(format!("{} has not been run; there is nothing to log.", tool))
            })?;
            let path = write_session_log(&dir, &tool, run)?;
            session
                .state
                .set_notice(format!("Log written to {}", path.display()));
        }
    }
    Ok(())
}

fn draw_ui<B: Backend>(frame: &mut Frame<B>, state: &MenuState, dispatcher: &Dispatcher<ProcessWorker>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(frame.size());

    render_tabs(frame, chunks[0], state, dispatcher);
    if let Some(tab) = state.active_tab() {
        render_body(frame, chunks[1], tab, dispatcher);
    }
    render_footer(frame, chunks[2], state);

    if let Some(popup) = &state.popup {
        let area = centered_rect(60, 25, frame.size());
        let body = vec![
            Line::from(popup.message.clone()),
            Line::from(""),
            Line::from(Span::styled(
                "[Enter] OK",
                Style::default().add_modifier(Modifier::BOLD),
            )),
        ];
        let dialog = Paragraph::new(body)
            .block(
                Block::default()
                    .title(popup.title.clone())
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(Clear, area);
        frame.render_widget(dialog, area);
    }
}

fn render_tabs<B: Backend>(
    frame: &mut Frame<B>,
    area: Rect,
    state: &MenuState,
    dispatcher: &Dispatcher<ProcessWorker>,
) {
    let titles: Vec<Line> = state
        .tabs
        .iter()
        .map(|tab| {
            let tool_state = dispatcher.state(&tab.tool);
            Line::from(vec![
                Span::raw(tab.tool.clone()),
                Span::styled(
                    format!(" [{}]", tool_state),
                    Style::default().fg(state_color(tool_state)),
                ),
            ])
        })
        .collect();

    let tabs = Tabs::new(titles)
        .block(Block::default().title("MultiMenu").borders(Borders::ALL))
        .select(state.active)
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn render_body<B: Backend>(
    frame: &mut Frame<B>,
    area: Rect,
    tab: &TabState,
    dispatcher: &Dispatcher<ProcessWorker>,
) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(48), Constraint::Min(0)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(cols[0]);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(cols[1]);

    let run = dispatcher.run(&tab.tool);
    render_controls(frame, left[0], tab, dispatcher, run);

    let percent = run.map(|run| run.progress_percent()).unwrap_or(0);
    let gauge = Gauge::default()
        .block(Block::default().title("Progress").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Green))
        .percent(percent.min(100))
        .label(format!("{}%", percent));
    frame.render_widget(gauge, left[1]);

    let (results_header, result_rows, errors_header, error_rows) = match run {
        Some(run) => (
            run.results_header.as_str(),
            run.result_rows.as_slice(),
            run.errors_header.as_str(),
            run.error_rows.as_slice(),
        ),
        None => ("", &[][..], "", &[][..]),
    };
    render_rows(frame, right[0], "Results", results_header, result_rows, Color::White);
    render_rows(frame, right[1], "Errors", errors_header, error_rows, Color::Red);
}

fn render_controls<B: Backend>(
    frame: &mut Frame<B>,
    area: Rect,
    tab: &TabState,
    dispatcher: &Dispatcher<ProcessWorker>,
    run: Option<&ToolRun<ProcessWorker>>,
) {
    let budget = dispatcher.budget();
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let folder = |path: &Option<std::path::PathBuf>| {
        path.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<not set>".to_string())
    };

    let mut lines = vec![
        Line::from(vec![
            Span::styled("CPU Thread(s): ", bold),
            Span::raw(format!(
                "{}  (free {} of {})",
                budget.selection(&tab.tool),
                budget.available(),
                budget.total()
            )),
        ]),
        Line::from(vec![
            Span::styled("Log Only: ", bold),
            Span::raw(if tab.log_only { "YES" } else { "NO" }),
        ]),
    ];
    if tab.synthetic {
        lines.push(Line::from(Span::styled(
            "Test tool: no folders needed",
            Style::default().fg(Color::DarkGray),
        )));
    } else {
        lines.push(Line::from(vec![
            Span::styled("Input: ", bold),
            Span::raw(folder(&tab.input)),
        ]));
        lines.push(Line::from(vec![
            Span::styled("Output: ", bold),
            Span::raw(folder(&tab.output)),
        ]));
    }
    lines.push(Line::from(""));

    if let Some(run) = run {
        lines.push(Line::from(Span::styled(
            run.status.clone(),
            Style::default().fg(state_color(run.state)),
        )));
        lines.push(Line::from(run.detail.clone()));
        lines.push(Line::from(format!(
            "Completed: {}  Errors: {}  Lost: {}",
            run.completed, run.errors, run.lost
        )));
        lines.push(Line::from(format!(
            "Workers: {} live of {}",
            run.live_workers(),
            run.worker_count()
        )));
        let elapsed = run.elapsed().num_seconds().max(0) as u64;
        lines.push(Line::from(format!(
            "Elapsed: {}",
            humantime::format_duration(Duration::from_secs(elapsed))
        )));
    } else {
        lines.push(Line::from(Span::styled(
            "Idle",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let title = if tab.locked {
        format!("{} (locked)", tab.tool)
    } else {
        tab.tool.clone()
    };
    let controls = Paragraph::new(lines)
        .block(Block::default().title(title).borders(Borders::ALL))
        .wrap(Wrap { trim: true });
    frame.render_widget(controls, area);
}

fn render_rows<B: Backend>(
    frame: &mut Frame<B>,
    area: Rect,
    title: &str,
    header: &str,
    rows: &[String],
    color: Color,
) {
    let visible = area.height.saturating_sub(3) as usize;
    let mut items = vec![ListItem::new(Line::from(Span::styled(
        header.to_string(),
        Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
    )))];
    let skip = rows.len().saturating_sub(visible);
    items.extend(
        rows.iter()
            .skip(skip)
            .map(|row| ListItem::new(Line::from(Span::styled(row.clone(), Style::default().fg(color))))),
    );

    let list = List::new(items).block(
        Block::default()
            .title(format!("{} ({})", title, rows.len()))
            .borders(Borders::ALL),
    );
    frame.render_widget(list, area);
}

fn render_footer<B: Backend>(frame: &mut Frame<B>, area: Rect, state: &MenuState) {
    let line = match &state.input_mode {
        InputMode::EditPath { field, buffer } => Line::from(Span::styled(
            format!("{}: {}_", field.label(), buffer),
            Style::default().fg(Color::Magenta),
        )),
        InputMode::Normal => match state.notice() {
            Some(notice) => Line::from(Span::styled(
                notice.to_string(),
                Style::default().fg(Color::LightGreen),
            )),
            None => Line::from(
                "Tab: next  +/-: cpus  y: log only  i/o: folders  s: start  k: kill  r: reset  l: log  q: quit",
            ),
        },
    };
    let footer = Paragraph::new(line)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, area);
}

fn state_color(state: ToolState) -> Color {
    match state {
        ToolState::Idle => Color::DarkGray,
        ToolState::Running => Color::LightBlue,
        ToolState::Completed => Color::LightGreen,
        ToolState::Killed => Color::Red,
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

/// Translate a key press into state changes and, when needed, an action.
pub fn handle_key(key: KeyEvent, state: &mut MenuState) -> Option<MenuAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    if state.popup.is_some() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
            state.dismiss_popup();
        }
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
        state.request_exit();
        return None;
    }

    match state.input_mode.clone() {
        InputMode::EditPath { field, buffer } => handle_path_input(key, state, field, buffer),
        InputMode::Normal => handle_normal_input(key, state),
    }
}

fn handle_path_input(
    key: KeyEvent,
    state: &mut MenuState,
    field: PathField,
    mut buffer: String,
) -> Option<MenuAction> {
    match key.code {
        KeyCode::Char(c) => {
            buffer.push(c);
            state.input_mode = InputMode::EditPath { field, buffer };
        }
        KeyCode::Backspace => {
            buffer.pop();
            state.input_mode = InputMode::EditPath { field, buffer };
        }
        KeyCode::Esc => state.input_mode = InputMode::Normal,
        KeyCode::Enter => {
            state.input_mode = InputMode::Normal;
            state.commit_path(field, &buffer);
            if field == PathField::LogDir {
                let tool = state.active_tab()?.tool.clone();
                return Some(MenuAction::WriteLog {
                    tool,
                    dir: state.log_dir.clone(),
                });
            }
        }
        _ => {}
    }
    None
}

fn handle_normal_input(key: KeyEvent, state: &mut MenuState) -> Option<MenuAction> {
    match key.code {
        KeyCode::Char('q') => {
            state.request_exit();
            return None;
        }
        KeyCode::Tab | KeyCode::Right => {
            state.next_tab();
            return None;
        }
        KeyCode::BackTab | KeyCode::Left => {
            state.previous_tab();
            return None;
        }
        _ => {}
    }

    let tab = state.active_tab()?;
    let tool = tab.tool.clone();
    let locked = tab.locked;
    let edits_inputs = matches!(
        key.code,
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Char('-') | KeyCode::Char('y')
            | KeyCode::Char('i') | KeyCode::Char('o')
    );
    if locked && edits_inputs {
        state.set_notice(format!("{} is running; its inputs are locked.", tool));
        return None;
    }

    match key.code {
        KeyCode::Char('+') | KeyCode::Char('=') => Some(MenuAction::AdjustCpus { tool, delta: 1 }),
        KeyCode::Char('-') => Some(MenuAction::AdjustCpus { tool, delta: -1 }),
        KeyCode::Char('y') => {
            if let Some(tab) = state.active_tab_mut() {
                tab.log_only = !tab.log_only;
            }
            None
        }
        KeyCode::Char('i') => {
            state.begin_edit(PathField::Input);
            None
        }
        KeyCode::Char('o') => {
            state.begin_edit(PathField::Output);
            None
        }
        KeyCode::Char('l') => {
            state.begin_edit(PathField::LogDir);
            None
        }
        KeyCode::Char('s') => Some(MenuAction::Start { tool }),
        KeyCode::Char('k') => Some(MenuAction::Kill { tool }),
        KeyCode::Char('r') => Some(MenuAction::Reset { tool }),
        _ => None,
    }
}
