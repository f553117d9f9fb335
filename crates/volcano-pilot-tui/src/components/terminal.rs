//! Remote command terminal against one node agent.
//!
//! Commands are echoed into the transcript immediately, sent through the
//! gateway, and every execution is followed by exactly one log poll. The
//! poll replaces whatever output follows the most recent command, so two
//! polls never stack duplicate snapshots.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use gateway_rs::GatewayClient;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};
use volcano_pilot_core::constants::DEFAULT_LOG_TAIL;
use volcano_pilot_core::constants::poll_intervals::LOG_CHOICES;
use volcano_pilot_core::errors::user_message;
use volcano_pilot_core::{CommandHistory, Endpoint, EndpointStore, PortEvent, Transcript};

use crate::action::Action;
use crate::audit::{audit_failure, audit_success};
use crate::ui_ext::{LineKindExt, key_hints};

use super::Component;

pub struct Terminal {
    client: GatewayClient,
    endpoint: Endpoint,
    store: Arc<Mutex<EndpointStore>>,
    port_events: tokio::sync::broadcast::Receiver<PortEvent>,

    transcript: Transcript,
    history: CommandHistory,
    input: String,

    /// Command submitted but not yet sent; the next refresh sends it.
    pending_exec: Option<String>,
    pending_interrupt: bool,

    cadence: volcano_pilot_core::RefreshCadence,
    last_poll: Option<Instant>,
    status: Option<String>,

    scroll: usize,
    stick_bottom: bool,
}

impl Terminal {
    pub fn new(client: GatewayClient, endpoint: Endpoint, store: Arc<Mutex<EndpointStore>>) -> Self {
        let port_events = store.lock().unwrap().subscribe();
        let mut transcript = Transcript::new();
        transcript.push_info(&format!("Connected to {}", endpoint.label()));
        Self {
            client,
            endpoint,
            store,
            port_events,
            transcript,
            history: CommandHistory::new(),
            input: String::new(),
            pending_exec: None,
            pending_interrupt: false,
            cadence: volcano_pilot_core::RefreshCadence::new(LOG_CHOICES, 2),
            last_poll: None,
            status: None,
            scroll: 0,
            stick_bottom: true,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Sends any queued command or interrupt, then polls the agent log once.
    pub async fn refresh(&mut self) {
        let Some(port) = self.endpoint.agent_port() else {
            self.status = Some(format!("Invalid agent port '{}'", self.endpoint.port));
            return;
        };
        let ip = self.endpoint.ip.clone();
        let label = self.endpoint.label();

        if self.pending_interrupt {
            self.pending_interrupt = false;
            match self.client.interrupt_process(&ip, port).await {
                Ok(()) => {
                    audit_success("INTERRUPT_PROCESS", &label, "");
                    self.transcript.push_info("Interrupt signal sent");
                }
                Err(err) => {
                    let message = user_message(&err);
                    audit_failure("INTERRUPT_PROCESS", &label, &message);
                    self.transcript.push_error(&message);
                }
            }
        }

        if let Some(cmd) = self.pending_exec.take() {
            match self.client.exec_command(&ip, port, &cmd).await {
                Ok(()) => audit_success("EXEC_COMMAND", &label, &cmd),
                Err(err) => {
                    audit_failure("EXEC_COMMAND", &label, &cmd);
                    self.transcript.push_error(&user_message(&err));
                }
            }
        }

        self.last_poll = Some(Instant::now());
        match self.client.agent_logs(&ip, port, DEFAULT_LOG_TAIL).await {
            Ok(text) => {
                self.transcript.replace_tail_output(&text);
                self.status = None;
                self.stick_bottom = true;
            }
            Err(err) => {
                // A failed poll is a status problem, not transcript content.
                self.status = Some(format!("Log fetch failed: {}", user_message(&err)));
            }
        }
    }

    fn submit(&mut self) -> Option<Action> {
        let cmd = self.input.trim().to_string();
        if cmd.is_empty() {
            // Nothing to run; no transcript line either.
            self.input.clear();
            return None;
        }
        self.transcript.push_command(&cmd);
        self.history.push(&cmd);
        self.input.clear();
        self.pending_exec = Some(cmd);
        self.stick_bottom = true;
        Some(Action::Refresh)
    }

    fn poll_due(&self) -> bool {
        self.cadence.is_enabled()
            && self
                .last_poll
                .is_none_or(|at| at.elapsed() >= self.cadence.interval())
    }

    fn drain_port_events(&mut self) {
        loop {
            match self.port_events.try_recv() {
                Ok(PortEvent::Saved { ip, port }) => {
                    if ip == self.endpoint.ip && port != self.endpoint.port {
                        self.endpoint.port = port;
                        self.transcript.push_info(&format!(
                            "Agent port changed to {}",
                            self.endpoint.port
                        ));
                    }
                }
                Ok(PortEvent::Cleared { .. }) => {
                    let fallback = self.store.lock().unwrap().get(&self.endpoint.ip);
                    if fallback != self.endpoint.port {
                        self.endpoint.port = fallback;
                        self.transcript.push_info(&format!(
                            "Agent port reset to {}",
                            self.endpoint.port
                        ));
                    }
                }
                Err(tokio::sync::broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    /// Transcript entries flattened to display rows; multi-line output gets
    /// its stamp on the first row only.
    fn display_lines(&self) -> Vec<Line<'static>> {
        let mut rows = Vec::new();
        for entry in self.transcript.lines() {
            let style = entry.kind.style();
            for (index, part) in entry.text.split('\n').enumerate() {
                let stamp = if index == 0 {
                    format!("{} ", entry.stamp)
                } else {
                    " ".repeat(entry.stamp.len() + 1)
                };
                rows.push(Line::from(vec![
                    Span::styled(stamp, Style::default().fg(Color::DarkGray)),
                    Span::styled(part.to_string(), style),
                ]));
            }
        }
        rows
    }
}

impl Component for Terminal {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('a') => {
                    let enabled = self.cadence.toggle();
                    self.transcript.push_info(&if enabled {
                        format!("Auto-refresh enabled ({}s)", self.cadence.interval_secs())
                    } else {
                        "Auto-refresh disabled".to_string()
                    });
                    return Ok(None);
                }
                KeyCode::Char('s') => {
                    let secs = self.cadence.cycle();
                    self.transcript
                        .push_info(&format!("Poll interval {secs}s"));
                    return Ok(None);
                }
                KeyCode::Char('k') => {
                    self.transcript.clear();
                    self.stick_bottom = true;
                    return Ok(None);
                }
                KeyCode::Char('x') => {
                    self.pending_interrupt = true;
                    return Ok(Some(Action::Refresh));
                }
                _ => return Ok(None),
            }
        }

        match key.code {
            KeyCode::Enter => Ok(self.submit()),
            KeyCode::Char(c) => {
                self.input.push(c);
                Ok(None)
            }
            KeyCode::Backspace => {
                self.input.pop();
                Ok(None)
            }
            KeyCode::Up => {
                if let Some(cmd) = self.history.prev() {
                    self.input = cmd.to_string();
                }
                Ok(None)
            }
            KeyCode::Down => {
                match self.history.next() {
                    Some(cmd) => self.input = cmd.to_string(),
                    None => self.input.clear(),
                }
                Ok(None)
            }
            KeyCode::PageUp => {
                self.stick_bottom = false;
                self.scroll = self.scroll.saturating_sub(10);
                Ok(None)
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_add(10);
                Ok(None)
            }
            KeyCode::Esc => {
                if self.input.is_empty() {
                    Ok(Some(Action::Back))
                } else {
                    self.input.clear();
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        if action == Action::Tick {
            self.drain_port_events();
            if self.poll_due() {
                return Ok(Some(Action::Refresh));
            }
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let block = Block::bordered().title(format!(" Terminal: {} ", self.endpoint.label()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [log_area, input_area, footer_area] = Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(inner);

        let rows = self.display_lines();
        let height = log_area.height as usize;
        let max_scroll = rows.len().saturating_sub(height.max(1));
        if self.stick_bottom {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
            if self.scroll == max_scroll {
                self.stick_bottom = true;
            }
        }
        let visible: Vec<Line> = rows
            .into_iter()
            .skip(self.scroll)
            .take(height.max(1))
            .collect();
        frame.render_widget(Paragraph::new(visible), log_area);

        let poll = if self.cadence.is_enabled() {
            format!(" auto {}s ", self.cadence.interval_secs())
        } else {
            String::new()
        };
        let input_block = Block::bordered()
            .title(" Command ")
            .title_bottom(Line::from(poll).right_aligned());
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled("$ ", Style::default().fg(Color::Cyan)),
                Span::raw(self.input.clone()),
                Span::styled("_", Style::default().fg(Color::DarkGray)),
            ]))
            .block(input_block),
            input_area,
        );

        if let Some(status) = &self.status {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    status.clone(),
                    Style::default().fg(Color::Yellow),
                )),
                footer_area,
            );
        } else {
            frame.render_widget(
                Paragraph::new(key_hints(&[
                    ("Enter", "run"),
                    ("Up/Dn", "history"),
                    ("^A", "auto"),
                    ("^S", "interval"),
                    ("^X", "interrupt"),
                    ("^K", "clear"),
                    ("Esc", "back"),
                ])),
                footer_area,
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_rs::GatewayConfig;
    use volcano_pilot_core::{LineKind, MemoryStore};

    fn terminal() -> Terminal {
        let client = GatewayClient::new(&GatewayConfig::default()).unwrap();
        let store = Arc::new(Mutex::new(EndpointStore::new(
            Box::new(MemoryStore::new()),
            "30081",
        )));
        Terminal::new(client, Endpoint::new("10.0.0.5", "30081"), store)
    }

    #[test]
    fn blank_input_submits_nothing() {
        let mut term = terminal();
        let baseline = term.transcript.lines().len();

        term.input = "   ".to_string();
        assert_eq!(term.submit(), None);
        assert!(term.input.is_empty());
        assert!(term.pending_exec.is_none());
        assert_eq!(term.transcript.lines().len(), baseline);
    }

    #[test]
    fn submit_echoes_queues_and_recalls() {
        let mut term = terminal();
        term.input = "nvidia-smi".to_string();

        assert_eq!(term.submit(), Some(Action::Refresh));
        assert_eq!(term.pending_exec.as_deref(), Some("nvidia-smi"));
        assert!(term.input.is_empty());

        let last = term.transcript.lines().last().unwrap();
        assert_eq!(last.kind, LineKind::Command);
        assert_eq!(last.text, "$ nvidia-smi");
        assert_eq!(term.history.prev(), Some("nvidia-smi"));
    }

    #[test]
    fn submit_trims_surrounding_whitespace() {
        let mut term = terminal();
        term.input = "  htop  ".to_string();

        assert_eq!(term.submit(), Some(Action::Refresh));
        assert_eq!(term.pending_exec.as_deref(), Some("htop"));
    }
}
