/// Pivot Dashboard TUI
///
/// Live pivot level crossings, candlestick patterns and volume/trade rankings
/// from the pivot signal backend. Level decorations are fetched only for the
/// rows on screen.
use std::{
    error::Error,
    fs::File,
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use pivot_dashboard::{
    ConnectionStatus, Dashboard, DashboardConfig, JsonFileStore, RestBackend, Settings, Tab,
    TokioScheduler,
    shared::{
        filter::{VolumeUnit, diff_percent},
        format,
        levels::{LadderRow, LevelRole, NearestLevels},
        ranking::RankingRow,
        viewport::Content,
    },
};
use pivot_data::{
    RestClient, SseStreamClient, StreamConfig,
    model::{
        CompareWindow, Correlation, LevelName, Period, PivotStatus, RankingKind, Signal,
        SignalDirection,
    },
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs},
};
use tracing::{info, warn};

type LiveDashboard = Dashboard<TokioScheduler, SseStreamClient, RestBackend>;

const MIN_DIFF_STEPS: [f64; 6] = [0.0, 0.5, 1.0, 2.0, 3.0, 5.0];
const MIN_VOLUME_STEPS: [f64; 6] = [0.0, 1.0, 5.0, 10.0, 50.0, 100.0];
const COMPARE_STEPS: [Option<CompareWindow>; 7] = [
    None,
    Some(CompareWindow::FiveMinutes),
    Some(CompareWindow::FifteenMinutes),
    Some(CompareWindow::ThirtyMinutes),
    Some(CompareWindow::OneHour),
    Some(CompareWindow::SixHours),
    Some(CompareWindow::OneDay),
];

/// Rows taken by everything except the table body.
const CHROME_ROWS: u16 = 8;

/// Get the log file path from PIVOT_LOG_FILE (default: pivot-dashboard.log)
fn get_log_file() -> String {
    std::env::var("PIVOT_LOG_FILE").unwrap_or_else(|_| "pivot-dashboard.log".to_string())
}

/// Get the settings file path from PIVOT_SETTINGS_FILE (default: pivot-dashboard-settings.json)
fn get_settings_file() -> String {
    std::env::var("PIVOT_SETTINGS_FILE")
        .unwrap_or_else(|_| "pivot-dashboard-settings.json".to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging()?;

    let config = DashboardConfig::from_env();
    info!(server = %config.server_url, "Starting pivot dashboard");

    let rest = RestClient::new(&config.server_url, config.request_timeout)?;
    let (backend, mut response_rx) = RestBackend::new(rest);
    let (client, mut transport_rx) = SseStreamClient::new(StreamConfig::default())?;
    let (scheduler, mut fired_rx) = TokioScheduler::new();

    let mut settings_store = JsonFileStore::open(get_settings_file());
    let settings = Settings::load(&settings_store);

    let mut dashboard = Dashboard::new(config, scheduler, client, backend);

    let dirty = Arc::new(AtomicBool::new(true));
    {
        let dirty = Arc::clone(&dirty);
        dashboard.on_view_change(move |_| dirty.store(true, Ordering::Relaxed));
    }
    {
        let dirty = Arc::clone(&dirty);
        dashboard.on_rows_materialized(move |_| dirty.store(true, Ordering::Relaxed));
    }
    {
        let dirty = Arc::clone(&dirty);
        dashboard.on_status_change(move |status| {
            info!(%status, "Connection status changed");
            dirty.store(true, Ordering::Relaxed);
        });
    }

    dashboard.apply_settings(settings);
    dashboard.start();

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let mut app = App::default();
    let mut tick = tokio::time::interval(Duration::from_millis(50));

    'main: loop {
        tokio::select! {
            Some(event) = transport_rx.recv() => dashboard.on_transport(event),
            Some(response) = response_rx.recv() => dashboard.on_response(response),
            Some(fired) = fired_rx.recv() => dashboard.on_timer(fired),
            _ = tick.tick() => {
                while event::poll(Duration::ZERO)? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            dirty.store(true, Ordering::Relaxed);
                            if app.handle_key(key.code, &mut dashboard, &mut settings_store) {
                                break 'main;
                            }
                        }
                        Event::Resize(..) => dirty.store(true, Ordering::Relaxed),
                        _ => {}
                    }
                }

                let size = terminal.size()?;
                dashboard.set_viewport_height(size.height.saturating_sub(CHROME_ROWS) as u32);

                if dirty.swap(false, Ordering::Relaxed) {
                    terminal.draw(|f| render_ui(f, &dashboard, &app))?;
                }
            }
        }
    }

    dashboard.close();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging() -> Result<(), Box<dyn Error>> {
    let file = File::create(get_log_file())?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum InputMode {
    #[default]
    Normal,
    /// Typing into the symbol query
    Query,
}

#[derive(Debug, Default)]
struct App {
    mode: InputMode,
    query: String,
    level_cursor: usize,
    compare: usize,
}

impl App {
    /// Handle a key press. Returns `true` to quit.
    fn handle_key(
        &mut self,
        code: KeyCode,
        dashboard: &mut LiveDashboard,
        store: &mut JsonFileStore,
    ) -> bool {
        if self.mode == InputMode::Query {
            match code {
                KeyCode::Enter | KeyCode::Esc => self.mode = InputMode::Normal,
                KeyCode::Backspace => {
                    self.query.pop();
                    dashboard.set_symbol_query(&self.query);
                }
                KeyCode::Char(c) => {
                    self.query.push(c);
                    dashboard.set_symbol_query(&self.query);
                }
                _ => {}
            }
            return false;
        }

        let page = dashboard.list().geometry().viewport_height as i64;
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Esc if dashboard.pattern_detail().is_some() => {
                dashboard.close_pattern_detail()
            }
            KeyCode::Esc if dashboard.level_detail().is_some() => dashboard.close_level_detail(),
            KeyCode::Esc if dashboard.ranking_history().is_some() => {
                dashboard.close_ranking_history()
            }
            KeyCode::Esc => return true,
            KeyCode::Tab => dashboard.set_tab(dashboard.tab().next()),
            KeyCode::Down | KeyCode::Char('j') => dashboard.select_offset(1),
            KeyCode::Up | KeyCode::Char('k') => dashboard.select_offset(-1),
            KeyCode::PageDown => dashboard.scroll_rows(page),
            KeyCode::PageUp => dashboard.scroll_rows(-page),
            KeyCode::Home => dashboard.scroll_to(0),
            KeyCode::Char('/') => self.mode = InputMode::Query,
            KeyCode::Char('r') => dashboard.refresh(),
            KeyCode::Char('p') => update_settings(dashboard, store, |settings| {
                settings.period = match settings.period {
                    None => Some(Period::Daily),
                    Some(Period::Daily) => Some(Period::Weekly),
                    Some(Period::Weekly) => None,
                }
            }),
            KeyCode::Char('d') => update_settings(dashboard, store, |settings| {
                settings.direction = match settings.direction {
                    None => Some(SignalDirection::Up),
                    Some(SignalDirection::Up) => Some(SignalDirection::Down),
                    Some(SignalDirection::Down) => None,
                }
            }),
            KeyCode::Char('l') => {
                self.level_cursor = (self.level_cursor + 1) % LevelName::ALL.len()
            }
            KeyCode::Char(' ') => {
                let level = LevelName::ALL[self.level_cursor];
                update_settings(dashboard, store, |settings| {
                    if !settings.filter_levels.remove(&level) {
                        settings.filter_levels.insert(level);
                    }
                })
            }
            KeyCode::Char('m') => update_settings(dashboard, store, |settings| {
                settings.min_diff_percent = next_step(&MIN_DIFF_STEPS, settings.min_diff_percent)
            }),
            KeyCode::Char('v') => update_settings(dashboard, store, |settings| {
                settings.min_volume = next_step(&MIN_VOLUME_STEPS, settings.min_volume)
            }),
            KeyCode::Char('u') => update_settings(dashboard, store, |settings| {
                let index = VolumeUnit::ALL
                    .iter()
                    .position(|unit| *unit == settings.volume_unit)
                    .unwrap_or(0);
                settings.volume_unit = VolumeUnit::ALL[(index + 1) % VolumeUnit::ALL.len()];
            }),
            KeyCode::Char('s') => {
                let ranking = dashboard.ranking();
                let (sort, order) = (ranking.sort.next(), ranking.order);
                dashboard.set_ranking_sort(sort, order);
            }
            KeyCode::Char('o') => {
                let ranking = dashboard.ranking();
                let (sort, order) = (ranking.sort, ranking.order.toggle());
                dashboard.set_ranking_sort(sort, order);
            }
            KeyCode::Char('c') => {
                self.compare = (self.compare + 1) % COMPARE_STEPS.len();
                dashboard.set_compare_window(COMPARE_STEPS[self.compare]);
            }
            KeyCode::Enter if dashboard.tab() == Tab::Patterns => {
                if let Some(id) = dashboard.selected_id().map(str::to_string) {
                    dashboard.open_pattern_detail(&id);
                }
            }
            KeyCode::Enter | KeyCode::Char('h') => {
                if let Some(symbol) = dashboard.selected_symbol().map(str::to_string) {
                    dashboard.request_ranking_history(&symbol);
                }
            }
            KeyCode::Char('i') => {
                if let Some(symbol) = dashboard.selected_symbol().map(str::to_string) {
                    dashboard.open_level_detail(&symbol);
                }
            }
            KeyCode::Char('w') => {
                if let Some(detail) = dashboard.level_detail() {
                    let period = match detail.period {
                        Period::Daily => Period::Weekly,
                        Period::Weekly => Period::Daily,
                    };
                    dashboard.set_level_detail_period(period);
                }
            }
            _ => {}
        }
        false
    }
}

fn update_settings(
    dashboard: &mut LiveDashboard,
    store: &mut JsonFileStore,
    change: impl FnOnce(&mut Settings),
) {
    let mut settings = dashboard.settings().clone();
    change(&mut settings);
    dashboard.apply_settings(settings);

    if let Err(e) = dashboard.save_settings(store) {
        warn!("Failed to save settings: {}", e);
    }
}

fn next_step(steps: &[f64], current: f64) -> f64 {
    steps
        .iter()
        .copied()
        .find(|step| *step > current)
        .unwrap_or(steps[0])
}

// ============================================================================
// Rendering
// ============================================================================

fn render_ui(f: &mut Frame, dashboard: &LiveDashboard, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    render_header(f, dashboard, chunks[0]);
    render_filters(f, dashboard, app, chunks[1]);

    match dashboard.tab().ranking_kind() {
        Some(kind) if dashboard.ranking_history().is_some() => {
            let body = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[2]);
            render_ranking(f, dashboard, kind, body[0]);
            render_ranking_history(f, dashboard, body[1]);
        }
        Some(kind) => render_ranking(f, dashboard, kind, chunks[2]),
        None if dashboard.tab() == Tab::Patterns => render_patterns(f, dashboard, chunks[2]),
        None => render_signals(f, dashboard, chunks[2]),
    }

    if dashboard.pattern_detail().is_some() {
        render_pattern_detail(f, dashboard, chunks[2]);
    } else if dashboard.level_detail().is_some() {
        render_level_detail(f, dashboard, chunks[2]);
    }

    render_footer(f, app, chunks[3]);
}

fn render_header(f: &mut Frame, dashboard: &LiveDashboard, area: Rect) {
    let (status_label, status_color) = match dashboard.status() {
        ConnectionStatus::Connected => ("● LIVE", Color::Green),
        ConnectionStatus::Connecting | ConnectionStatus::Reconnecting => {
            ("◌ CONNECTING", Color::Yellow)
        }
        ConnectionStatus::Disconnected => ("○ DISCONNECTED", Color::Red),
        ConnectionStatus::Idle => ("○ IDLE", Color::DarkGray),
    };

    let mut status = vec![Span::styled(
        format!(" {} ", status_label),
        Style::default()
            .fg(status_color)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(pivots) = dashboard.pivot_status() {
        for (label, pivot) in [("D", &pivots.daily), ("W", &pivots.weekly)] {
            if let Some(pivot) = pivot {
                status.push(pivot_status_span(label, pivot));
            }
        }
    }

    let block = Block::default()
        .title(" PIVOT DASHBOARD ")
        .title_top(Line::from(status).right_aligned())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let titles = Tab::ALL
        .iter()
        .map(|tab| format!(" {} ", tab))
        .collect::<Vec<_>>();
    let selected = Tab::ALL
        .iter()
        .position(|tab| *tab == dashboard.tab())
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .block(block)
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn pivot_status_span(label: &str, pivot: &PivotStatus) -> Span<'static> {
    let (state, color) = if pivot.is_stale {
        ("stale", Color::Red)
    } else {
        ("ok", Color::Green)
    };
    Span::styled(
        format!(
            " {}: {} {} {} syms ",
            label,
            state,
            format::duration_secs(pivot.seconds_until),
            pivot.symbol_count
        ),
        Style::default().fg(color),
    )
}

fn render_filters(f: &mut Frame, dashboard: &LiveDashboard, app: &App, area: Rect) {
    let settings = dashboard.settings();
    let levels = if settings.filter_levels.is_empty() {
        "all".to_string()
    } else {
        settings
            .filter_levels
            .iter()
            .map(LevelName::as_str)
            .collect::<Vec<_>>()
            .join(",")
    };
    let query_style = if app.mode == InputMode::Query {
        Style::default().fg(Color::Black).bg(Color::Cyan)
    } else {
        Style::default().fg(Color::Cyan)
    };

    let line = Line::from(vec![
        Span::styled(" query: ", Style::default().fg(Color::Gray)),
        Span::styled(format!("{:<10}", app.query), query_style),
        Span::styled(" tf: ", Style::default().fg(Color::Gray)),
        Span::raw(settings.period.map_or("all", |period| period.as_str())),
        Span::styled(" dir: ", Style::default().fg(Color::Gray)),
        Span::raw(settings.direction.map_or("all", |direction| direction.as_str())),
        Span::styled(" levels: ", Style::default().fg(Color::Gray)),
        Span::raw(levels),
        Span::styled(" [", Style::default().fg(Color::DarkGray)),
        Span::styled(
            LevelName::ALL[app.level_cursor].as_str(),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled("]", Style::default().fg(Color::DarkGray)),
        Span::styled(" min diff: ", Style::default().fg(Color::Gray)),
        Span::raw(format!("{:.1}%", settings.min_diff_percent)),
        Span::styled(" min vol: ", Style::default().fg(Color::Gray)),
        Span::raw(format!(
            "{}{}",
            settings.min_volume,
            settings.volume_unit.as_str()
        )),
        Span::styled(
            format!("  {} signals", dashboard.view().len()),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    f.render_widget(Paragraph::new(line), area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let help = match app.mode {
        InputMode::Query => " type symbol ($ = exact) | Enter/Esc: done",
        InputMode::Normal => {
            " q: quit | Tab: view | j/k: move | /: query | p: tf | d: dir | l/space: level | m: diff | v/u: volume | s/o: sort | c: compare | h: history | i/w: levels | Enter: detail | r: refresh"
        }
    };
    f.render_widget(
        Paragraph::new(Span::styled(help, Style::default().fg(Color::DarkGray))),
        area,
    );
}

/// Rows of the materialized window that fall inside the viewport.
fn visible_rows(dashboard: &LiveDashboard) -> Option<Vec<usize>> {
    let list = dashboard.list();
    let geometry = list.geometry();
    let first = list.first_visible_row();
    let height = (geometry.viewport_height / geometry.row_height) as usize;

    match list.content() {
        Content::NoData => None,
        Content::Rows(slots) => Some(
            slots
                .iter()
                .map(|slot| slot.row)
                .filter(|row| *row >= first)
                .take(height)
                .collect(),
        ),
    }
}

fn render_no_data(f: &mut Frame, block: Block, area: Rect) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        "No data",
        Style::default().fg(Color::DarkGray),
    )))
    .block(block);
    f.render_widget(paragraph, area);
}

fn row_style(dashboard: &LiveDashboard, row: usize) -> Style {
    if dashboard.list().selected() == Some(row) {
        Style::default().bg(Color::DarkGray)
    } else {
        Style::default()
    }
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    Row::new(titles.iter().copied().map(Cell::from)).style(
        Style::default()
            .fg(Color::Gray)
            .add_modifier(Modifier::BOLD),
    )
}

fn direction_span(direction: SignalDirection) -> Span<'static> {
    if direction.is_up() {
        Span::styled("↑", Style::default().fg(Color::Green))
    } else {
        Span::styled("↓", Style::default().fg(Color::Red))
    }
}

fn nearest_text(levels: &[NearestLevels]) -> String {
    levels
        .iter()
        .map(|nearest| {
            [nearest.above, nearest.below]
                .iter()
                .flatten()
                .map(format::level)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" | ")
}

fn related_text(signal: &Signal) -> Span<'static> {
    let Some(related) = &signal.related_pattern else {
        return Span::raw("");
    };
    let color = match related.correlation {
        Correlation::Strong => Color::Green,
        Correlation::Weak => Color::Red,
        Correlation::Moderate => Color::Yellow,
    };
    Span::styled(
        format!(
            "{}{} {:.0}% {} ({})",
            related.direction.arrow(),
            related.pattern_cn.as_deref().unwrap_or(&related.pattern),
            related.rate(),
            format::minutes_offset(related.minutes_diff),
            related.correlation.as_str()
        ),
        Style::default().fg(color),
    )
}

fn render_signals(f: &mut Frame, dashboard: &LiveDashboard, area: Rect) {
    let block = Block::default()
        .title(" SIGNALS ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let Some(rows) = visible_rows(dashboard) else {
        return render_no_data(f, block, area);
    };

    let view = dashboard.view();
    let now = dashboard.now();
    let rows = rows.into_iter().filter_map(|row| {
        let signal = view.get(row)?;
        let ticker = dashboard.ticker(&signal.symbol);
        let rank = |rank: Option<u32>| rank.map_or("-".to_string(), |rank| format!("#{}", rank));

        Some(
            Row::new(vec![
                Cell::from(format::relative_time(signal.triggered_at, now)),
                Cell::from(signal.symbol.clone()),
                Cell::from(signal.period.as_str()),
                Cell::from(signal.level.as_str()),
                Cell::from(direction_span(signal.direction)),
                Cell::from(format::price(signal.price)),
                Cell::from(ticker.map_or("-".to_string(), |t| format::price(t.last_price))),
                Cell::from(
                    diff_percent(signal.price, ticker)
                        .map_or("-".to_string(), |diff| format!("{:.2}%", diff)),
                ),
                Cell::from(rank(view.derived.ranks.volume_rank(&signal.symbol))),
                Cell::from(rank(view.derived.ranks.trades_rank(&signal.symbol))),
                Cell::from(nearest_text(&dashboard.nearest_levels(&signal.symbol))),
                Cell::from(related_text(signal)),
            ])
            .style(row_style(dashboard, row)),
        )
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(11),
            Constraint::Length(14),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(7),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(30),
            Constraint::Min(20),
        ],
    )
    .header(header_row(&[
        "Time", "Symbol", "TF", "Lvl", "", "Level", "Last", "Diff", "Vol", "Trd", "Nearest",
        "Pattern",
    ]))
    .block(block);

    f.render_widget(table, area);
}

fn render_patterns(f: &mut Frame, dashboard: &LiveDashboard, area: Rect) {
    let block = Block::default()
        .title(" PATTERNS ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let Some(rows) = visible_rows(dashboard) else {
        return render_no_data(f, block, area);
    };

    let view = dashboard.patterns();
    let now = dashboard.now();
    let rows = rows.into_iter().filter_map(|row| {
        let pattern = view.get(row)?;
        Some(
            Row::new(vec![
                Cell::from(format::relative_time(pattern.detected_at, now)),
                Cell::from(pattern.symbol.clone()),
                Cell::from(pattern.display_name().to_string()),
                Cell::from(pattern.direction.arrow()),
                Cell::from(format!("{:.0}%", pattern.confidence * 100.0)),
                Cell::from(format!("{:.1}%", pattern.up_percent)),
                Cell::from(format!("{:.1}%", pattern.down_percent)),
                Cell::from(pattern.efficiency_rank.clone()),
            ])
            .style(row_style(dashboard, row)),
        )
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(11),
            Constraint::Length(14),
            Constraint::Min(16),
            Constraint::Length(2),
            Constraint::Length(6),
            Constraint::Length(7),
            Constraint::Length(7),
            Constraint::Length(5),
        ],
    )
    .header(header_row(&[
        "Time", "Symbol", "Pattern", "", "Conf", "Up", "Down", "Eff",
    ]))
    .block(block);

    f.render_widget(table, area);
}

fn render_ranking(f: &mut Frame, dashboard: &LiveDashboard, kind: RankingKind, area: Rect) {
    let ranking = dashboard.ranking();
    let block = Block::default()
        .title(format!(
            " {} RANKING ({}, sort: {} {}) ",
            kind.as_str().to_uppercase(),
            dashboard.ranking_source(kind),
            ranking.sort,
            ranking.order
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    let Some(visible) = visible_rows(dashboard) else {
        return render_no_data(f, block, area);
    };

    let items = dashboard.ranking_rows(kind);
    let rows = visible.into_iter().filter_map(|row| {
        let item: &RankingRow = items.get(row)?;
        let value = match kind {
            RankingKind::Volume => format::volume(item.volume),
            RankingKind::Trades => format::trade_count(item.trade_count),
        };
        let change = match (item.is_new, item.rank_change) {
            (true, _) => Span::styled("NEW", Style::default().fg(Color::Cyan)),
            (false, Some(change)) if change > 0 => {
                Span::styled(format!("▲{}", change), Style::default().fg(Color::Green))
            }
            (false, Some(change)) if change < 0 => {
                Span::styled(format!("▼{}", -change), Style::default().fg(Color::Red))
            }
            _ => Span::raw("-"),
        };
        let percent = |value: Option<f64>| value.map_or("-".to_string(), format::percent);

        Some(
            Row::new(vec![
                Cell::from(format!("{}", item.rank)),
                Cell::from(item.symbol.clone()),
                Cell::from(value),
                Cell::from(change),
                Cell::from(percent(item.price_change)),
                Cell::from(percent(item.growth)),
                Cell::from(nearest_text(&dashboard.nearest_levels(&item.symbol))),
            ])
            .style(row_style(dashboard, row)),
        )
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(5),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Min(20),
        ],
    )
    .header(header_row(&[
        "#", "Symbol", "Value", "Δ", "Price", "Growth", "Nearest",
    ]))
    .block(block);

    f.render_widget(table, area);
}

fn render_ranking_history(f: &mut Frame, dashboard: &LiveDashboard, area: Rect) {
    let Some(detail) = dashboard.ranking_history() else {
        return;
    };
    let block = Block::default()
        .title(format!(" {} HISTORY ", detail.symbol))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White));

    if detail.loading {
        let paragraph = Paragraph::new(Span::styled(
            "Loading...",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        return f.render_widget(paragraph, area);
    }

    // Newest first
    let rows = detail.points.iter().rev().map(|point| {
        let change = point.price_change.map_or(Span::raw("-"), |change| {
            let color = if change >= 0.0 { Color::Green } else { Color::Red };
            Span::styled(format::percent(change), Style::default().fg(color))
        });
        Row::new(vec![
            Cell::from(format::clock_time(point.timestamp)),
            Cell::from(format!("#{}", point.volume_rank)),
            Cell::from(format!("#{}", point.trades_rank)),
            Cell::from(format::price(point.price)),
            Cell::from(change),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(9),
            Constraint::Length(5),
            Constraint::Length(5),
            Constraint::Length(12),
            Constraint::Min(8),
        ],
    )
    .header(header_row(&["Time", "Vol", "Trd", "Price", "Change"]))
    .block(block);

    f.render_widget(table, area);
}

/// Clear and return a `width` x `height` area centred in `area`.
fn overlay(f: &mut Frame, area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let overlay = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };
    f.render_widget(Clear, overlay);
    overlay
}

fn render_level_detail(f: &mut Frame, dashboard: &LiveDashboard, area: Rect) {
    let Some(detail) = dashboard.level_detail() else {
        return;
    };
    let area = overlay(f, area, 44, 16);
    let block = Block::default()
        .title(format!(
            " {} PIVOTS ({}) ",
            detail.symbol,
            match detail.period {
                Period::Daily => "daily",
                Period::Weekly => "weekly",
            }
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let ladder = dashboard.level_detail_ladder();
    if ladder.is_empty() {
        let text = if detail.loading {
            "Loading..."
        } else {
            "No pivot data"
        };
        let paragraph =
            Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray))).block(block);
        return f.render_widget(paragraph, area);
    }

    let rows = ladder.into_iter().map(|row| match row {
        LadderRow::Price(price) => Row::new(vec![
            Cell::from("NOW"),
            Cell::from(format::price(price)),
            Cell::from(""),
        ])
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        LadderRow::Level {
            name,
            role,
            price,
            distance_percent,
        } => {
            let color = match role {
                LevelRole::Resistance => Color::Red,
                LevelRole::Pivot => Color::White,
                LevelRole::Support => Color::Green,
            };
            Row::new(vec![
                Cell::from(name.as_str()),
                Cell::from(format::price(price)),
                Cell::from(distance_percent.map_or("-".to_string(), format::percent)),
            ])
            .style(Style::default().fg(color))
        }
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(14),
            Constraint::Min(9),
        ],
    )
    .header(header_row(&["Level", "Price", "Distance"]))
    .block(block);

    f.render_widget(table, area);
}

fn render_pattern_detail(f: &mut Frame, dashboard: &LiveDashboard, area: Rect) {
    let Some(pattern) = dashboard.pattern_detail() else {
        return;
    };
    let area = overlay(f, area, 48, 11);
    let block = Block::default()
        .title(format!(" {} ", pattern.symbol))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let field = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<12}"), Style::default().fg(Color::Gray)),
            Span::raw(value),
        ])
    };
    let lines = vec![
        field("Pattern", pattern.display_name().to_string()),
        field(
            "Direction",
            format!("{} {}", pattern.direction.arrow(), pattern.direction.as_str()),
        ),
        field("Up", format!("{:.1}%", pattern.up_percent)),
        field("Down", format!("{:.1}%", pattern.down_percent)),
        field(
            "Efficiency",
            if pattern.efficiency_rank.is_empty() {
                "-".to_string()
            } else {
                pattern.efficiency_rank.clone()
            },
        ),
        field("Confidence", format!("{:.0}%", pattern.confidence * 100.0)),
        field("Source", format::pattern_source(&pattern.source).to_string()),
        field(
            "Detected",
            format::relative_time(pattern.detected_at, dashboard.now()),
        ),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}
