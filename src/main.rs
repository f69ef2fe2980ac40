use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Axis, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph};

use gd_terminal::charts::{self, BarSpec, ScatterSpec, TrendSpec};
use gd_terminal::config::Settings;
use gd_terminal::dataset::DatasetStore;
use gd_terminal::logging::{LogTarget, init_logging};
use gd_terminal::state::{AppState, Focus, Picker};

const TRACE_COLORS: [Color; 2] = [Color::Magenta, Color::Gray];

struct App {
    state: AppState,
    should_quit: bool,
}

impl App {
    fn on_key(&mut self, key: KeyEvent) {
        if self.state.help_overlay {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
                self.state.help_overlay = false;
            }
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => {
                self.state.focus = self.state.focus.next()
            }
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('h') => {
                self.state.focus = self.state.focus.prev()
            }
            KeyCode::Down | KeyCode::Char('j') => self.select(1),
            KeyCode::Up | KeyCode::Char('k') => self.select(-1),
            KeyCode::PageDown => self.select(10),
            KeyCode::PageUp => self.select(-10),
            KeyCode::Char('+') | KeyCode::Char('=') => self.state.adjust_min_appearances(1),
            KeyCode::Char('-') => self.state.adjust_min_appearances(-1),
            KeyCode::Char('x') => {
                self.state.cycle_x_metric();
                let msg = format!("[INFO] x axis: {}", self.state.x_metric.key());
                self.state.push_log(msg);
            }
            KeyCode::Char('y') => {
                self.state.cycle_y_metric();
                let msg = format!("[INFO] y axis: {}", self.state.y_metric.key());
                self.state.push_log(msg);
            }
            _ => {}
        }
    }

    fn select(&mut self, delta: isize) {
        if !self.state.move_selection(delta) {
            return;
        }
        let focus = self.state.focus;
        let label = self
            .state
            .picker(focus)
            .current()
            .map(|c| c.label.clone())
            .unwrap_or_default();
        tracing::debug!(focus = focus.title(), selection = %label, "selection changed");
        if focus == Focus::Team {
            let mean = self
                .state
                .dashboard
                .team_mean
                .map(|m| format!("{m:+.2}"))
                .unwrap_or_else(|| "n/a".to_string());
            self.state
                .push_log(format!("[INFO] {label}: mean goal difference {mean}"));
        }
        if self.state.dashboard.aggregates.is_empty() {
            self.state.push_log("[WARN] No appearances in this scope");
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let settings = Settings::from_env(&args)?;
    // stdout and stderr belong to the terminal UI.
    let target = settings
        .log_file
        .clone()
        .map(LogTarget::File)
        .unwrap_or(LogTarget::Off);
    init_logging(&settings.log_filter, target)?;

    let store = DatasetStore::load(&settings.source).context("load dataset")?;
    let appearances = store.appearances().len();
    let mut state = AppState::new(
        store,
        settings.competition.as_deref(),
        settings.season.as_deref(),
        settings.min_appearances,
    );
    state.source_label = settings.source.describe();
    state.push_log(format!(
        "[INFO] Loaded {appearances} appearances from {}",
        state.source_label
    ));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App {
        state,
        should_quit: false,
    };
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(10),
            Constraint::Length(5),
            Constraint::Length(2),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(30), Constraint::Min(20)])
        .split(chunks[1]);
    render_selectors(frame, body[0], &app.state);
    render_dashboard(frame, body[1], &app.state);

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(
        "Tab/←/→ Focus | j/k/↑/↓ Select | +/- Min apps | x/y Axis metric | ? Help | q Quit",
    )
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let pick = |p: &Picker| {
        p.current()
            .map(|c| c.label.clone())
            .unwrap_or_else(|| "-".to_string())
    };
    format!(
        "GD90 TERMINAL | {} | {} {} | min apps > {} | x={} y={}",
        state.source_label,
        pick(&state.competitions),
        pick(&state.seasons),
        state.min_appearances,
        state.x_metric.key(),
        state.y_metric.key()
    )
}

fn render_selectors(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Percentage(50),
            Constraint::Percentage(50),
        ])
        .split(area);

    for (focus, rect) in Focus::ALL.into_iter().zip(rows.iter()) {
        render_picker(frame, *rect, state.picker(focus), focus.title(), state.focus == focus);
    }
}

fn render_picker(frame: &mut Frame, area: Rect, picker: &Picker, title: &str, focused: bool) {
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    let block = Block::default()
        .title(format!("{title} ({})", picker.items.len()))
        .borders(Borders::ALL)
        .border_style(border);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if picker.items.is_empty() {
        let empty = Paragraph::new("none").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    let (start, end) = visible_range(picker.selected, picker.items.len(), inner.height as usize);
    let lines = (start..end)
        .map(|idx| {
            let style = if idx == picker.selected {
                Style::default().fg(Color::White).bg(Color::DarkGray)
            } else {
                Style::default()
            };
            Line::from(Span::styled(picker.items[idx].label.clone(), style))
        })
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_dashboard(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);
    render_scatter(frame, rows[0], &state.dashboard.season_scatter);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);
    render_team_bars(frame, bottom[0], state.dashboard.team_bar.as_ref());

    let player = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(bottom[1]);
    render_trend(frame, player[0], state.dashboard.trend.as_ref());
    render_player_rows(frame, player[1], state);
}

fn padded(bounds: Option<(f64, f64)>) -> [f64; 2] {
    let (lo, hi) = bounds.unwrap_or((-1.0, 1.0));
    let pad = ((hi - lo) * 0.05).max(0.5);
    [lo - pad, hi + pad]
}

fn axis_labels(bounds: [f64; 2]) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .into_iter()
        .map(|v| Span::raw(format!("{v:.1}")))
        .collect()
}

fn render_scatter(frame: &mut Frame, area: Rect, spec: &ScatterSpec) {
    let block = Block::default()
        .title(format!("{} ({} players)", spec.title, spec.point_count()))
        .borders(Borders::ALL);
    if spec.point_count() == 0 {
        let empty = Paragraph::new("No players above the appearance threshold")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let points = spec
        .traces
        .iter()
        .map(|t| t.points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    // Background trace first so the highlighted team is drawn on top.
    let datasets = spec
        .traces
        .iter()
        .zip(points.iter())
        .rev()
        .map(|(trace, data)| {
            let color = if trace.highlight {
                TRACE_COLORS[0]
            } else {
                TRACE_COLORS[1]
            };
            Dataset::default()
                .name(trace.name.clone())
                .marker(if trace.highlight {
                    symbols::Marker::Block
                } else {
                    symbols::Marker::Dot
                })
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(color))
                .data(data)
        })
        .collect::<Vec<_>>();

    let x = padded(spec.bounds(charts::Axis::X));
    let y = padded(spec.bounds(charts::Axis::Y));
    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .title(spec.x_axis.clone())
                .bounds(x)
                .labels(axis_labels(x)),
        )
        .y_axis(
            Axis::default()
                .title(spec.y_axis.clone())
                .bounds(y)
                .labels(axis_labels(y)),
        );
    frame.render_widget(chart, area);
}

fn render_team_bars(frame: &mut Frame, area: Rect, spec: Option<&BarSpec>) {
    let block = Block::default().title("Team GD90").borders(Borders::ALL);
    let Some(spec) = spec.filter(|s| !s.bars.is_empty()) else {
        let empty = Paragraph::new("No qualifying players for this team")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    };

    let inner_width = area.width.saturating_sub(2) as usize;
    let bar_room = inner_width.saturating_sub(28).max(4);
    let max_abs = spec
        .bars
        .iter()
        .map(|b| b.value.abs())
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON);

    let mut lines = Vec::with_capacity(spec.bars.len() + 2);
    if let Some(reference) = &spec.reference {
        lines.push(Line::from(Span::styled(
            format!("{}: {:+.2}", reference.label, reference.value),
            Style::default().fg(Color::Cyan),
        )));
    }
    // Best first reads better in a list.
    for bar in spec.bars.iter().rev() {
        let len = ((bar.value.abs() / max_abs) * bar_room as f64).round() as usize;
        let glyph = if bar.width > 0.6 {
            "█"
        } else if bar.width > 0.4 {
            "▆"
        } else {
            "▃"
        };
        let color = if bar.value >= 0.0 { Color::Green } else { Color::Red };
        lines.push(Line::from(vec![
            Span::raw(format!("{:<18.18} {:>+6.2} ", bar.label, bar.value)),
            Span::styled(glyph.repeat(len.max(1)), Style::default().fg(color)),
        ]));
    }
    lines.push(Line::from(Span::styled(
        spec.note.clone(),
        Style::default().fg(Color::DarkGray),
    )));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_trend(frame: &mut Frame, area: Rect, spec: Option<&TrendSpec>) {
    let Some(spec) = spec.filter(|s| !s.values.is_empty()) else {
        let empty = Paragraph::new("Select a player")
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().title("Matchdays").borders(Borders::ALL));
        frame.render_widget(empty, area);
        return;
    };

    let series = spec
        .values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64, f64::from(*v)))
        .collect::<Vec<_>>();
    let last = series.len().saturating_sub(1).max(1) as f64;
    let reference = spec
        .reference
        .as_ref()
        .map(|r| vec![(0.0, r.value), (last, r.value)])
        .unwrap_or_default();

    let mut lo = spec.values.iter().copied().min().map(f64::from).unwrap_or(0.0);
    let mut hi = spec.values.iter().copied().max().map(f64::from).unwrap_or(0.0);
    if let Some(r) = &spec.reference {
        lo = lo.min(r.value);
        hi = hi.max(r.value);
    }
    let y = padded(Some((lo, hi)));

    let mut datasets = vec![
        Dataset::default()
            .name("goal difference")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Magenta))
            .data(&series),
    ];
    if !reference.is_empty() {
        datasets.push(
            Dataset::default()
                .name("team mean")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Cyan))
                .data(&reference),
        );
    }

    let x_labels = [spec.labels.first(), spec.labels.last()]
        .into_iter()
        .flatten()
        .map(|l| Span::raw(l.clone()))
        .collect::<Vec<_>>();
    let chart = Chart::new(datasets)
        .block(Block::default().title(spec.title.clone()).borders(Borders::ALL))
        .x_axis(Axis::default().bounds([0.0, last]).labels(x_labels))
        .y_axis(Axis::default().bounds(y).labels(axis_labels(y)));
    frame.render_widget(chart, area);
}

fn render_player_rows(frame: &mut Frame, area: Rect, state: &AppState) {
    let rows = &state.dashboard.player_rows;
    let block = Block::default()
        .title(format!("Appearances ({})", rows.len()))
        .borders(Borders::ALL);
    let lines = rows
        .iter()
        .map(|r| {
            let side = match r.side {
                Some(gd_terminal::records::Side::Home) => "H",
                Some(gd_terminal::records::Side::Away) => "A",
                None => "-",
            };
            let window = match (r.start, r.end) {
                (Some(s), Some(e)) => format!("{s:>2}'-{e:>2}'"),
                _ => "       ".to_string(),
            };
            Line::from(format!(
                "MD {:02} {side} {window} {:>3}min GD {:+}",
                r.matchday, r.duration, r.goal_difference
            ))
        })
        .collect::<Vec<_>>();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    let skip = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(skip)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "GD90 Terminal - Help",
        "",
        "Selection:",
        "  Tab / → / l      Next list",
        "  S-Tab / ← / h    Previous list",
        "  j/k or ↑/↓       Move in list",
        "  PgUp / PgDn      Move by 10",
        "",
        "Charts:",
        "  + / -            Min appearances (0-34)",
        "  x / y            Cycle scatter axis metric",
        "",
        "  ?                Toggle help",
        "  q                Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
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

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
