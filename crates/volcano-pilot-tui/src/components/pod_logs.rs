//! Pod log viewer with search, follow, and auto-poll.

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use gateway_rs::GatewayClient;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use volcano_pilot_core::constants::poll_intervals::LOG_CHOICES;
use volcano_pilot_core::errors::user_message;
use volcano_pilot_core::{AsyncView, RefreshCadence};

use super::Component;
use crate::action::Action;
use crate::ui_ext::key_hints;

const MIN_TAIL: u32 = 50;
const MAX_TAIL: u32 = 5000;
const TAIL_STEP: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchMode {
    Off,
    /// Typing a query.
    Input,
    /// Query locked in, n/N walk the matches.
    Active,
}

fn line_style(line: &str) -> Style {
    let lower = line.to_lowercase();
    if lower.contains("error") || lower.contains("fatal") || lower.contains("panic") {
        Style::default().fg(Color::Red)
    } else if lower.contains("warn") {
        Style::default().fg(Color::Yellow)
    } else if lower.contains("debug") || lower.contains("trace") {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    }
}

pub struct PodLogsView {
    client: GatewayClient,
    pod: String,
    namespace: String,
    container: Option<String>,

    view: AsyncView<Vec<String>>,
    total_lines: u64,
    tail: u32,
    cadence: RefreshCadence,

    follow: bool,
    scroll: usize,
    viewport: usize,

    search_mode: SearchMode,
    search_input: String,
    matches: Vec<usize>,
    current_match: Option<usize>,
}

impl PodLogsView {
    pub fn new(client: GatewayClient, pod: String, namespace: String, tail: u32) -> Self {
        Self {
            client,
            pod,
            namespace,
            container: None,
            view: AsyncView::new(),
            total_lines: 0,
            tail: tail.clamp(MIN_TAIL, MAX_TAIL),
            cadence: RefreshCadence::enabled(LOG_CHOICES, 2),
            follow: true,
            scroll: 0,
            viewport: 0,
            search_mode: SearchMode::Off,
            search_input: String::new(),
            matches: Vec::new(),
            current_match: None,
        }
    }

    pub async fn refresh(&mut self) {
        let token = self.view.begin();
        match self
            .client
            .pod_logs(&self.pod, &self.namespace, self.container.as_deref(), self.tail)
            .await
        {
            Ok(logs) => {
                if self.container.is_none() {
                    self.container = logs.container.clone();
                }
                self.total_lines = logs.total_lines;
                if self.view.finish(token, logs.log_lines) {
                    self.recompute_matches();
                }
            }
            Err(err) => {
                self.view.fail(token, user_message(&err));
            }
        }
    }

    fn lines(&self) -> &[String] {
        self.view.data().map(Vec::as_slice).unwrap_or(&[])
    }

    fn recompute_matches(&mut self) {
        if self.search_mode == SearchMode::Off || self.search_input.is_empty() {
            self.matches.clear();
            self.current_match = None;
            return;
        }
        let needle = self.search_input.to_lowercase();
        self.matches = self
            .lines()
            .iter()
            .enumerate()
            .filter(|(_, line)| line.to_lowercase().contains(&needle))
            .map(|(index, _)| index)
            .collect();
        match self.current_match {
            Some(at) if at < self.matches.len() => {}
            _ => self.current_match = if self.matches.is_empty() { None } else { Some(0) },
        }
    }

    fn jump_to_match(&mut self, step: isize) {
        if self.matches.is_empty() {
            return;
        }
        let len = self.matches.len() as isize;
        let at = self.current_match.unwrap_or(0) as isize;
        let next = (at + step).rem_euclid(len) as usize;
        self.current_match = Some(next);
        self.follow = false;
        // Center the hit in the viewport.
        let line = self.matches[next];
        self.scroll = line.saturating_sub(self.viewport / 2);
    }

    fn max_scroll(&self) -> usize {
        self.lines().len().saturating_sub(self.viewport.max(1))
    }

    fn scroll_by(&mut self, delta: isize) {
        self.follow = false;
        let max = self.max_scroll();
        let next = self.scroll as isize + delta;
        self.scroll = next.clamp(0, max as isize) as usize;
    }
}

impl Component for PodLogsView {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.search_mode == SearchMode::Input {
            match key.code {
                KeyCode::Char(c) => {
                    self.search_input.push(c);
                    self.recompute_matches();
                }
                KeyCode::Backspace => {
                    self.search_input.pop();
                    self.recompute_matches();
                }
                KeyCode::Enter => {
                    self.search_mode = if self.search_input.is_empty() {
                        SearchMode::Off
                    } else {
                        SearchMode::Active
                    };
                    self.jump_to_match(0);
                }
                KeyCode::Esc => {
                    self.search_mode = SearchMode::Off;
                    self.search_input.clear();
                    self.recompute_matches();
                }
                _ => {}
            }
            return Ok(None);
        }

        match key.code {
            KeyCode::Char('q') => Ok(Some(Action::Back)),
            KeyCode::Esc => {
                if self.search_mode == SearchMode::Active {
                    self.search_mode = SearchMode::Off;
                    self.search_input.clear();
                    self.recompute_matches();
                    return Ok(None);
                }
                Ok(Some(Action::Back))
            }
            KeyCode::Char('/') => {
                self.search_mode = SearchMode::Input;
                self.search_input.clear();
                Ok(None)
            }
            KeyCode::Char('n') => {
                self.jump_to_match(1);
                Ok(None)
            }
            KeyCode::Char('N') => {
                self.jump_to_match(-1);
                Ok(None)
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.scroll_by(1);
                Ok(None)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.scroll_by(-1);
                Ok(None)
            }
            KeyCode::PageDown => {
                self.scroll_by(self.viewport.max(1) as isize);
                Ok(None)
            }
            KeyCode::PageUp => {
                self.scroll_by(-(self.viewport.max(1) as isize));
                Ok(None)
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.follow = false;
                self.scroll = 0;
                Ok(None)
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.scroll = self.max_scroll();
                Ok(None)
            }
            KeyCode::Char('f') => {
                self.follow = !self.follow;
                Ok(None)
            }
            KeyCode::Char('a') => {
                self.cadence.toggle();
                Ok(None)
            }
            KeyCode::Char('i') => {
                self.cadence.cycle();
                Ok(None)
            }
            KeyCode::Char('+') => {
                self.tail = (self.tail + TAIL_STEP).min(MAX_TAIL);
                Ok(Some(Action::Refresh))
            }
            KeyCode::Char('-') => {
                self.tail = self.tail.saturating_sub(TAIL_STEP).max(MIN_TAIL);
                Ok(Some(Action::Refresh))
            }
            KeyCode::Char('r') => Ok(Some(Action::Refresh)),
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        if action == Action::Tick && self.cadence.due(&self.view) {
            return Ok(Some(Action::Refresh));
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let title = format!(" Logs: {}/{} ", self.namespace, self.pod);
        let block = Block::bordered().title(title);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [info_area, log_area, footer_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(inner);
        self.viewport = log_area.height as usize;

        let poll = if self.cadence.is_enabled() {
            format!("poll {}s", self.cadence.interval_secs())
        } else {
            "poll off".to_string()
        };
        let mut info = format!(
            "container: {}  tail: {}  total: {}  {}",
            self.container.as_deref().unwrap_or("-"),
            self.tail,
            self.total_lines,
            poll,
        );
        if self.follow {
            info.push_str("  following");
        }
        frame.render_widget(
            Paragraph::new(Span::styled(info, Style::default().fg(Color::DarkGray))),
            info_area,
        );

        if self.view.is_in_flight() && !self.view.has_data() {
            frame.render_widget(Paragraph::new("Loading logs..."), log_area);
        } else if let Some(error) = self.view.error() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(Color::Red),
                )),
                log_area,
            );
        } else if self.lines().is_empty() {
            frame.render_widget(Paragraph::new("No log output"), log_area);
        } else {
            if self.follow {
                self.scroll = self.lines().len().saturating_sub(self.viewport.max(1));
            }
            let current_line = self.current_match.map(|at| self.matches[at]);
            let rendered: Vec<Line> = self
                .lines()
                .iter()
                .enumerate()
                .skip(self.scroll)
                .take(self.viewport.max(1))
                .map(|(index, line)| {
                    let mut style = line_style(line);
                    if Some(index) == current_line {
                        style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
                    } else if self.matches.binary_search(&index).is_ok() {
                        style = style.add_modifier(Modifier::UNDERLINED);
                    }
                    Line::from(Span::styled(line.clone(), style))
                })
                .collect();
            frame.render_widget(Paragraph::new(rendered), log_area);
        }

        match self.search_mode {
            SearchMode::Input => {
                frame.render_widget(
                    Paragraph::new(Line::from(vec![
                        Span::raw("/"),
                        Span::styled(
                            format!("{}_", self.search_input),
                            Style::default().fg(Color::Cyan),
                        ),
                        Span::raw(format!("   {} match(es)", self.matches.len())),
                    ])),
                    footer_area,
                );
            }
            SearchMode::Active => {
                let at = self.current_match.map(|at| at + 1).unwrap_or(0);
                frame.render_widget(
                    Paragraph::new(Line::from(vec![
                        Span::styled(
                            format!("/{}", self.search_input),
                            Style::default().fg(Color::Cyan),
                        ),
                        Span::raw(format!("  {at}/{}  ", self.matches.len())),
                        Span::raw("[n/N] next/prev  [Esc] clear"),
                    ])),
                    footer_area,
                );
            }
            SearchMode::Off => {
                frame.render_widget(
                    Paragraph::new(key_hints(&[
                        ("/", "search"),
                        ("f", "follow"),
                        ("a", "auto"),
                        ("i", "interval"),
                        ("+/-", "tail"),
                        ("r", "refresh"),
                        ("q", "back"),
                    ])),
                    footer_area,
                );
            }
        }

        Ok(())
    }
}
