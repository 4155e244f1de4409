use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use tracing::warn;

use crate::api::{ArtifactQuery, CatalogApi};
use crate::app::{DuplicateDecision, ProgressEvent, ProgressSink, ProgressSinkKind};
use crate::bulk_loading::DuplicateReview;
use crate::catalog::{ArtifactDetailView, CardAction, CatalogView, Visualization};
use crate::domain::Resolution;
use crate::error::CatalogError;
use crate::request_panel::RequestPanel;
use crate::selection::SelectionStore;

type Term = Terminal<CrosstermBackend<Stdout>>;

const EVENTS_MAX: usize = 8;
const WAITING_STATUS: &str = "waiting for the server to answer";
const BROWSER_HELP: &str = "enter open/toggle · s selection mode · p panel · / search · n/b page · d download · u undo · q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Resolve,
    Request,
    Verify,
    Store,
    Done,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Resolve => "Resolve",
            Phase::Request => "Request",
            Phase::Verify => "Verify",
            Phase::Store => "Store",
            Phase::Done => "Done",
        }
    }
}

#[derive(Debug)]
struct ProgressState {
    status: String,
    phase: Phase,
    latency_ms: Option<u128>,
    request_count: u64,
    events: VecDeque<String>,
    started: Instant,
    active: bool,
}

/// Full-screen progress display for a single command.
pub struct Tui {
    kind: ProgressSinkKind,
    state: Arc<Mutex<ProgressState>>,
}

struct TuiProgress {
    state: Arc<Mutex<ProgressState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let message = event.message.trim().to_string();
            if let Some((phase, payload)) = parse_phase(&message) {
                state.phase = phase;
                state.status = payload.to_string();
            } else if let Some(latency) = parse_latency(&message) {
                state.latency_ms = Some(latency);
            } else if message == "catalog.request" {
                state.request_count = state.request_count.saturating_add(1);
            } else {
                state.status = message.clone();
            }
            push_event(&mut state.events, message);
        }
    }
}

impl Tui {
    pub fn new(kind: ProgressSinkKind) -> Self {
        Self {
            kind,
            state: Arc::new(Mutex::new(ProgressState {
                status: "ready".to_string(),
                phase: Phase::Resolve,
                latency_ms: None,
                request_count: 0,
                events: VecDeque::new(),
                started: Instant::now(),
                active: false,
            })),
        }
    }

    /// Runs `f` on a worker thread and renders its progress until it returns.
    /// Esc only updates the status line; the screen stays until the worker
    /// returns.
    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, CatalogError> + Send + 'static,
        R: Send + 'static,
    {
        self.set_active(true);
        let mut terminal = enter()?;

        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let worker = thread::spawn(move || f(&sink));

        let screen = self.watch(&mut terminal, &worker);
        self.set_active(false);
        let screen = screen.and(leave());
        finish(worker, screen)
    }

    fn watch<T>(&self, terminal: &mut Term, worker: &JoinHandle<T>) -> miette::Result<()> {
        let mut tick = 0usize;
        while !worker.is_finished() {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_progress(frame, self.kind, &state, tick))
                    .into_diagnostic()?;
            }
            if event::poll(Duration::from_millis(120)).into_diagnostic()?
                && let Event::Key(key) = event::read().into_diagnostic()?
                && key.kind == KeyEventKind::Press
            {
                self.progress_key(key.code);
            }
            tick = tick.wrapping_add(1);
        }
        Ok(())
    }

    fn progress_key(&self, code: KeyCode) {
        if !matches!(code, KeyCode::Esc | KeyCode::Char('q')) {
            return;
        }
        if let Ok(mut state) = self.state.lock()
            && state.active
        {
            state.status = WAITING_STATUS.to_string();
        }
    }

    fn set_active(&self, active: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.active = active;
            if active {
                state.started = Instant::now();
            }
        }
    }
}

/// Yes/no prompt; Esc answers no.
pub fn confirm(prompt: &str) -> miette::Result<bool> {
    let mut terminal = enter()?;
    let confirmed = loop {
        terminal
            .draw(|frame| {
                let block = Block::default().borders(Borders::ALL).title("Confirm");
                let text = Paragraph::new(vec![
                    Line::from(prompt.to_string()),
                    Line::from("Press y to confirm, n to cancel."),
                ])
                .alignment(Alignment::Center)
                .block(block);
                frame.render_widget(text, frame.area());
            })
            .into_diagnostic()?;

        if let Some(key) = next_key()? {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => break true,
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => break false,
                _ => {}
            }
        }
    };
    leave()?;
    Ok(confirmed)
}

/// Lets the operator choose a resolution for each possible duplicate.
/// Enter submits, Esc cancels the whole review.
pub fn pick_resolutions(review: &DuplicateReview) -> miette::Result<DuplicateDecision> {
    let mut choices: Vec<(u64, u64, Resolution)> = review
        .matches
        .iter()
        .map(|entry| (entry.new_artifact.id, entry.match_artifact, entry.resolution()))
        .collect();
    if choices.is_empty() {
        return Ok(Some(Vec::new()));
    }

    let mut list_state = ListState::default().with_selected(Some(0));
    let mut terminal = enter()?;
    let decision = loop {
        terminal
            .draw(|frame| draw_picker(frame, &review.detail, &choices, &mut list_state))
            .into_diagnostic()?;

        let Some(key) = next_key()? else {
            continue;
        };
        let cursor = list_state.selected().unwrap_or(0);
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => list_state.select(Some(cursor.saturating_sub(1))),
            KeyCode::Down | KeyCode::Char('j') => {
                list_state.select(Some((cursor + 1).min(choices.len() - 1)))
            }
            KeyCode::Right | KeyCode::Char(' ') => {
                choices[cursor].2 = next_resolution(choices[cursor].2)
            }
            KeyCode::Char('r') => choices[cursor].2 = Resolution::Replace,
            KeyCode::Char('e') => choices[cursor].2 = Resolution::Keep,
            KeyCode::Char('n') => choices[cursor].2 = Resolution::New,
            KeyCode::Enter => {
                break Some(
                    choices
                        .iter()
                        .map(|(id, _, resolution)| (*id, *resolution))
                        .collect(),
                );
            }
            KeyCode::Esc => break None,
            _ => {}
        }
    };
    leave()?;
    Ok(decision)
}

pub fn next_resolution(current: Resolution) -> Resolution {
    match current {
        Resolution::Replace => Resolution::Keep,
        Resolution::Keep => Resolution::New,
        Resolution::New => Resolution::Replace,
    }
}

/// Parses the browser search line: free text plus `culture:`, `shape:` and
/// `tag:` terms.
pub fn parse_search(input: &str) -> ArtifactQuery {
    let mut query = ArtifactQuery::default();
    let mut words = Vec::new();
    for term in input.split_whitespace() {
        match term.split_once(':') {
            Some(("culture", value)) if !value.is_empty() => query.culture = Some(value.to_string()),
            Some(("shape", value)) if !value.is_empty() => query.shape = Some(value.to_string()),
            Some(("tag", value)) if !value.is_empty() => query.tags.push(value.to_string()),
            _ => words.push(term),
        }
    }
    if !words.is_empty() {
        query.query = Some(words.join(" "));
    }
    query
}

enum Pending {
    Load,
    Next,
    Previous,
    Open(u64),
    Download,
}

/// Interactive catalog browser over the live selection store.
pub struct Browser<'a, A> {
    api: &'a A,
    store: &'a mut SelectionStore,
    authenticated: bool,
    download_dir: PathBuf,
    view: CatalogView,
    list_state: ListState,
    detail: Option<ArtifactDetailView>,
    search: Option<String>,
    status: String,
    loading: bool,
}

impl<'a, A: CatalogApi> Browser<'a, A> {
    pub fn new(
        api: &'a A,
        store: &'a mut SelectionStore,
        authenticated: bool,
        download_dir: PathBuf,
        query: ArtifactQuery,
    ) -> Self {
        Self {
            api,
            store,
            authenticated,
            download_dir,
            view: CatalogView::new(query),
            list_state: ListState::default(),
            detail: None,
            search: None,
            status: "ready".to_string(),
            loading: false,
        }
    }

    pub fn run(mut self) -> miette::Result<()> {
        let mut terminal = enter()?;
        let mut pending = Some(Pending::Load);
        let result = loop {
            if let Some(action) = pending.take() {
                self.loading = true;
                if let Err(err) = terminal.draw(|frame| self.draw(frame)) {
                    break Err(err).into_diagnostic();
                }
                self.perform(action);
                self.loading = false;
            }
            if let Err(err) = terminal.draw(|frame| self.draw(frame)) {
                break Err(err).into_diagnostic();
            }
            match next_key() {
                Ok(Some(key)) => match self.handle_key(key) {
                    KeyOutcome::Quit => break Ok(()),
                    KeyOutcome::Run(action) => pending = Some(action),
                    KeyOutcome::Continue => {}
                },
                Ok(None) => {}
                Err(err) => break Err(err),
            }
        };
        leave()?;
        result
    }

    fn perform(&mut self, action: Pending) {
        let outcome = match action {
            Pending::Load => self.view.load(self.api).map(|_| None),
            Pending::Next => self
                .view
                .next_page(self.api)
                .map(|page| page.is_none().then(|| "last page".to_string())),
            Pending::Previous => self
                .view
                .previous_page(self.api)
                .map(|page| page.is_none().then(|| "first page".to_string())),
            Pending::Open(id) => ArtifactDetailView::load(self.api, id, self.store).map(|view| {
                self.detail = Some(view);
                None
            }),
            Pending::Download => {
                let panel = RequestPanel::new(self.api, self.store, self.authenticated);
                panel
                    .download_now(&self.download_dir)
                    .map(|receipt| Some(format!("saved {}", receipt.path.display())))
            }
        };
        match outcome {
            Ok(message) => {
                if self.list_state.selected().is_none() && self.page_len() > 0 {
                    self.list_state.select(Some(0));
                }
                self.status = message.unwrap_or_else(|| "ready".to_string());
            }
            Err(err) => self.status = err.to_string(),
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind != KeyEventKind::Press || self.loading {
            return KeyOutcome::Continue;
        }
        if let Some(search) = &mut self.search {
            match key.code {
                KeyCode::Enter => {
                    let query = parse_search(search);
                    self.search = None;
                    self.view.set_filters(query);
                    self.list_state.select(None);
                    return KeyOutcome::Run(Pending::Load);
                }
                KeyCode::Esc => self.search = None,
                KeyCode::Backspace => {
                    search.pop();
                }
                KeyCode::Char(ch) => search.push(ch),
                _ => {}
            }
            return KeyOutcome::Continue;
        }
        if let Some(detail) = &mut self.detail {
            match key.code {
                KeyCode::Esc | KeyCode::Char('q') => self.detail = None,
                KeyCode::Char(' ') | KeyCode::Enter => {
                    self.status = match detail.toggle_selection(self.store) {
                        Ok(true) => "added to selection".to_string(),
                        Ok(false) => "removed from selection".to_string(),
                        Err(err) => err.to_string(),
                    };
                }
                KeyCode::Char('m') => {
                    if !detail.show_model() {
                        self.status = "no 3D model for this artifact".to_string();
                    }
                }
                KeyCode::Char('i') => {
                    let next = match detail.visualization() {
                        Visualization::Image(index) => index + 1,
                        Visualization::Model => 0,
                    };
                    if !detail.show_image(next) && !detail.show_image(0) {
                        self.status = "no images for this artifact".to_string();
                    }
                }
                _ => {}
            }
            return KeyOutcome::Continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return KeyOutcome::Quit,
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Char('n') | KeyCode::Right => {
                self.list_state.select(None);
                return KeyOutcome::Run(Pending::Next);
            }
            KeyCode::Char('b') | KeyCode::Left => {
                self.list_state.select(None);
                return KeyOutcome::Run(Pending::Previous);
            }
            KeyCode::Char('/') => self.search = Some(String::new()),
            KeyCode::Char('s') => {
                let enabled = !self.view.selection_mode();
                self.view.set_selection_mode(enabled);
                self.status = if enabled {
                    "selection mode on".to_string()
                } else {
                    "selection mode off".to_string()
                };
            }
            KeyCode::Char('p') => self.view.set_panel_open(!self.view.panel_open()),
            KeyCode::Char('u') => {
                let mut panel = RequestPanel::new(self.api, self.store, self.authenticated);
                self.status = match panel.undo() {
                    Ok(()) => "selection cleared".to_string(),
                    Err(err) => err.to_string(),
                };
            }
            KeyCode::Char('d') => {
                if self.authenticated {
                    return KeyOutcome::Run(Pending::Download);
                }
                self.status = "log in to download directly, or use `catalog request`".to_string();
            }
            KeyCode::Enter => {
                let Some(artifact) = self
                    .list_state
                    .selected()
                    .and_then(|index| self.view.page().and_then(|page| page.data.get(index)))
                    .cloned()
                else {
                    return KeyOutcome::Continue;
                };
                match self.view.activate(self.store, &artifact) {
                    Ok(CardAction::OpenDetail(id)) => return KeyOutcome::Run(Pending::Open(id)),
                    Ok(CardAction::Toggled(selected)) => {
                        self.status = format!(
                            "#{} {}",
                            artifact.id,
                            if selected { "selected" } else { "unselected" }
                        );
                    }
                    Err(err) => self.status = err.to_string(),
                }
            }
            _ => {}
        }
        KeyOutcome::Continue
    }

    fn page_len(&self) -> usize {
        self.view.page().map(|page| page.data.len()).unwrap_or(0)
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.page_len();
        if len == 0 {
            return;
        }
        let current = self.list_state.selected().unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, len as isize - 1);
        self.list_state.select(Some(next as usize));
    }

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(8),
                Constraint::Length(3),
            ])
            .split(frame.area());

        frame.render_widget(self.header(), chunks[0]);

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(chunks[1]);

        let items: Vec<ListItem> = self
            .view
            .page()
            .map(|page| {
                page.data
                    .iter()
                    .map(|artifact| {
                        let mark = if self.store.contains(artifact.id) {
                            "[x]"
                        } else {
                            "[ ]"
                        };
                        ListItem::new(format!("{mark} {}", artifact.label()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title("Artifacts"))
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, main[0], &mut self.list_state);

        frame.render_widget(self.side_panel(), main[1]);
        self.draw_status(frame, chunks[2]);
    }

    fn header(&self) -> Paragraph<'static> {
        let (current, total) = self
            .view
            .page()
            .map(|page| (page.current_page, page.total_pages.max(1)))
            .unwrap_or((1, 1));
        let mode = if self.view.selection_mode() {
            Span::styled("SELECT", Style::default().fg(Color::Yellow))
        } else {
            Span::styled("BROWSE", Style::default().fg(Color::Gray))
        };
        let session = if self.authenticated {
            "logged in"
        } else {
            "visitor"
        };
        Paragraph::new(Line::from(vec![
            Span::styled(
                "CATALOG",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
            Span::raw(format!("   page {current}/{total}   ")),
            mode,
            Span::raw(format!(
                "   selected: {}   session: {session}",
                self.store.len()
            )),
        ]))
        .block(Block::default().borders(Borders::BOTTOM))
    }

    fn side_panel(&self) -> Paragraph<'static> {
        if let Some(detail) = &self.detail {
            return detail_panel(detail);
        }
        if self.view.panel_open() {
            let mut lines: Vec<Line> = self
                .store
                .current()
                .iter()
                .map(|item| Line::from(item.label()))
                .collect();
            if lines.is_empty() {
                lines.push(Line::from("nothing selected"));
            }
            return Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).title("Selection"));
        }
        let mut lines = Vec::new();
        if let Some(page) = self.view.page() {
            for (label, values) in [
                ("cultures", &page.filters.cultures),
                ("shapes", &page.filters.shapes),
                ("tags", &page.filters.tags),
            ] {
                let values: Vec<&str> = values.iter().filter_map(|value| value.as_deref()).collect();
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default().fg(Color::Yellow),
                )));
                lines.push(Line::from(values.join(", ")));
            }
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Filters"))
    }

    fn draw_status(&self, frame: &mut ratatui::Frame, area: Rect) {
        let line = if let Some(search) = &self.search {
            Line::from(vec![
                Span::styled("/ ", Style::default().fg(Color::Cyan)),
                Span::raw(search.clone()),
            ])
        } else if self.loading {
            Line::from(Span::styled("loading...", Style::default().fg(Color::Cyan)))
        } else {
            Line::from(vec![
                Span::raw(self.status.clone()),
                Span::styled(format!("   {BROWSER_HELP}"), Style::default().fg(Color::DarkGray)),
            ])
        };
        frame.render_widget(
            Paragraph::new(line).block(Block::default().borders(Borders::TOP)),
            area,
        );
    }
}

enum KeyOutcome {
    Continue,
    Quit,
    Run(Pending),
}

fn detail_panel(detail: &ArtifactDetailView) -> Paragraph<'static> {
    let artifact = detail.detail();
    let mut lines = vec![Line::from(Span::styled(
        format!(
            "#{}{}",
            artifact.id,
            if detail.is_selected() { "  [selected]" } else { "" }
        ),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    if let Some(culture) = &artifact.attributes.culture {
        lines.push(Line::from(format!("culture: {}", culture.value)));
    }
    if let Some(shape) = &artifact.attributes.shape {
        lines.push(Line::from(format!("shape: {}", shape.value)));
    }
    let tags: Vec<&str> = artifact
        .attributes
        .tags
        .iter()
        .map(|tag| tag.value.as_str())
        .collect();
    if !tags.is_empty() {
        lines.push(Line::from(format!("tags: {}", tags.join(", "))));
    }
    lines.push(Line::from(artifact.attributes.description.clone()));
    let showing = match detail.visualization() {
        Visualization::Model => format!("3D model {}", artifact.model.object),
        Visualization::Image(index) => artifact
            .images
            .get(index)
            .map(|image| format!("image {} of {}: {image}", index + 1, artifact.images.len()))
            .unwrap_or_else(|| "no images".to_string()),
    };
    lines.push(Line::from(Span::styled(
        showing,
        Style::default().fg(Color::Cyan),
    )));
    lines.push(Line::from(Span::styled(
        "space toggle selection · m model · i next image · esc back",
        Style::default().fg(Color::DarkGray),
    )));
    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Artifact"))
}

fn draw_picker(
    frame: &mut ratatui::Frame,
    detail: &str,
    choices: &[(u64, u64, Resolution)],
    list_state: &mut ListState,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .split(frame.area());
    frame.render_widget(
        Paragraph::new(detail.to_string())
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Possible duplicates")),
        chunks[0],
    );
    let items: Vec<ListItem> = choices
        .iter()
        .map(|(new_artifact, existing, resolution)| {
            let color = match resolution {
                Resolution::Replace => Color::Yellow,
                Resolution::Keep => Color::Green,
                Resolution::New => Color::Cyan,
            };
            ListItem::new(Line::from(vec![
                Span::raw(format!("new #{new_artifact:<6} matches #{existing:<6} ")),
                Span::styled(resolution.to_string(), Style::default().fg(color)),
            ]))
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, chunks[1], list_state);
    frame.render_widget(
        Paragraph::new("space cycle · r replace · e keep · n new · enter submit · esc cancel")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

fn draw_progress(
    frame: &mut ratatui::Frame,
    kind: ProgressSinkKind,
    state: &ProgressState,
    tick: usize,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(6)])
        .split(frame.area());

    let hb = if tick % 2 == 0 { "*" } else { " " };
    let op_label = match kind {
        ProgressSinkKind::Download => "Download",
        ProgressSinkKind::Upload => "Artifact upload",
        ProgressSinkKind::Request => "Request",
        ProgressSinkKind::BulkLoad => "Bulk load",
        ProgressSinkKind::Triage => "Triage",
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "CATALOG",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("   Op: "),
        Span::styled(op_label, Style::default().fg(Color::Cyan)),
        Span::raw("   "),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]))
    .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let phase_color = if state.active {
        Color::Cyan
    } else {
        Color::Green
    };
    let mut lines = vec![
        Line::from(vec![
            Span::raw("Phase: "),
            Span::styled(state.phase.label(), Style::default().fg(phase_color)),
            Span::raw(format!("   elapsed {}s", state.started.elapsed().as_secs())),
        ]),
        Line::from(format!("Status: {}", state.status)),
        Line::from(format!(
            "Requests: {}   Latency: {}",
            state.request_count,
            state
                .latency_ms
                .map(|ms| format!("{ms} ms"))
                .unwrap_or_else(|| "-".to_string())
        )),
        Line::from(""),
    ];
    lines.extend(
        state
            .events
            .iter()
            .map(|event| Line::from(Span::styled(event.clone(), Style::default().fg(Color::Gray)))),
    );
    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Progress")),
        chunks[1],
    );
}

fn enter() -> miette::Result<Term> {
    let mut stdout = io::stdout();
    enable_raw_mode().into_diagnostic()?;
    stdout.execute(EnterAlternateScreen).into_diagnostic()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).into_diagnostic()?;
    terminal.clear().into_diagnostic()?;
    Ok(terminal)
}

fn leave() -> miette::Result<()> {
    disable_raw_mode().into_diagnostic()?;
    io::stdout()
        .execute(LeaveAlternateScreen)
        .into_diagnostic()?;
    Ok(())
}

fn next_key() -> miette::Result<Option<KeyEvent>> {
    if !event::poll(Duration::from_millis(120)).into_diagnostic()? {
        return Ok(None);
    }
    match event::read().into_diagnostic()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
        _ => Ok(None),
    }
}

fn parse_phase(message: &str) -> Option<(Phase, &str)> {
    let rest = message.strip_prefix("phase=")?;
    let (label, payload) = rest.split_once("; ").unwrap_or((rest, ""));
    let phase = match label {
        "Resolve" => Phase::Resolve,
        "Request" => Phase::Request,
        "Verify" => Phase::Verify,
        "Store" => Phase::Store,
        "Done" => Phase::Done,
        _ => return None,
    };
    Some((phase, payload))
}

fn parse_latency(message: &str) -> Option<u128> {
    message
        .split_once("latency_ms=")
        .and_then(|(_, value)| value.trim().parse().ok())
}

// Joins the worker even when the screen failed; its result wins.
fn finish<R>(
    worker: JoinHandle<Result<R, CatalogError>>,
    screen: miette::Result<()>,
) -> miette::Result<R> {
    let result = worker
        .join()
        .map_err(|_| miette::Report::msg("worker thread panicked"))?;
    if let Err(err) = screen {
        warn!(error = %err, "progress screen failed");
    }
    result.map_err(miette::Report::new)
}

fn push_event(buffer: &mut VecDeque<String>, item: String) {
    if buffer.len() >= EVENTS_MAX {
        buffer.pop_front();
    }
    buffer.push_back(item);
}
