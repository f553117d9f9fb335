//! Node table: the console's home view.
//!
//! Shows every node of the active cluster with its saved agent port, lets
//! the operator edit ports, probe agents, and jump into the node-scoped
//! views (browser, terminal, resource gauges).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use gateway_rs::{GatewayClient, NodeProbe, NodeRow};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState};
use volcano_pilot_core::constants::poll_intervals::NODES_SECS;
use volcano_pilot_core::errors::user_message;
use volcano_pilot_core::{Endpoint, EndpointStore, ListCursor, PortPolicy};

use super::Component;
use crate::action::Action;
use crate::audit::{audit_failure, audit_success};
use crate::ui_ext::{centered_rect, key_hints};

pub struct Nodes {
    client: GatewayClient,
    store: Arc<Mutex<EndpointStore>>,
    policy: PortPolicy,

    view: volcano_pilot_core::AsyncView<Vec<NodeRow>>,
    clusters: Vec<String>,
    active_cluster: Option<String>,
    cursor: ListCursor,
    table_state: TableState,
    probes: HashMap<String, NodeProbe>,

    pending_probe: Option<Endpoint>,
    port_input: Option<String>,
    confirm_clear: bool,
    status: Option<String>,

    auto_refresh: bool,
    last_attempt: Option<Instant>,
}

impl Nodes {
    pub fn new(
        client: GatewayClient,
        store: Arc<Mutex<EndpointStore>>,
        policy: PortPolicy,
        initial_cluster: Option<String>,
    ) -> Self {
        Self {
            client,
            store,
            policy,
            view: volcano_pilot_core::AsyncView::new(),
            clusters: Vec::new(),
            active_cluster: initial_cluster,
            cursor: ListCursor::new(),
            table_state: TableState::default(),
            probes: HashMap::new(),
            pending_probe: None,
            port_input: None,
            confirm_clear: false,
            status: None,
            auto_refresh: true,
            last_attempt: None,
        }
    }

    /// Fetches the cluster list (once) and the node table, plus any probe
    /// the operator queued.
    pub async fn refresh(&mut self) {
        self.last_attempt = Some(Instant::now());

        if let Some(endpoint) = self.pending_probe.take() {
            let Some(port) = endpoint.agent_port() else {
                self.status = Some(format!("Unusable port '{}' for probe", endpoint.port));
                return;
            };
            match self.client.check_node(&endpoint.ip, port).await {
                Ok(probe) => {
                    self.status = Some(format!("{}: {}", endpoint.ip, probe.detail));
                    self.probes.insert(endpoint.ip.clone(), probe);
                }
                Err(err) => self.status = Some(user_message(&err)),
            }
        }

        if self.clusters.is_empty() {
            match self.client.clusters().await {
                Ok(list) => {
                    if self.active_cluster.is_none() {
                        self.active_cluster = list.active.clone();
                    }
                    self.clusters = list.clusters;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "cluster list unavailable");
                }
            }
        }

        let token = self.view.begin();
        match self.client.cluster_nodes(self.active_cluster.as_deref()).await {
            Ok(nodes) => {
                self.cursor.set_len(nodes.len());
                self.view.finish(token, nodes);
            }
            Err(err) => {
                self.view.fail(token, user_message(&err));
            }
        }
    }

    fn selected_row(&self) -> Option<&NodeRow> {
        self.cursor.selected(self.view.data()?.as_slice())
    }

    /// Endpoint for the selected node: its internal IP plus the saved port
    /// resolved through the policy, so legacy mangled values are fixed on
    /// the way out of storage.
    fn selected_endpoint(&self) -> Option<Endpoint> {
        let row = self.selected_row()?;
        if row.internal_ip.is_empty() {
            return None;
        }
        let stored = self.store.lock().unwrap().get(&row.internal_ip);
        let port = self.policy.resolve(&stored);
        Some(Endpoint::new(row.internal_ip.clone(), port))
    }

    fn cycle_cluster(&mut self, step: isize) {
        if self.clusters.is_empty() {
            return;
        }
        let at = self
            .active_cluster
            .as_ref()
            .and_then(|name| self.clusters.iter().position(|c| c == name))
            .unwrap_or(0);
        let len = self.clusters.len() as isize;
        let next = (at as isize + step).rem_euclid(len) as usize;
        self.active_cluster = Some(self.clusters[next].clone());
        self.view.invalidate();
        self.probes.clear();
        self.cursor.set_len(0);
        self.status = None;
    }

    fn commit_port_edit(&mut self) {
        let Some(input) = self.port_input.take() else {
            return;
        };
        let Some(row) = self.selected_row() else {
            return;
        };
        let ip = row.internal_ip.clone();
        let resolved = self.policy.resolve(&input);
        match self.store.lock().unwrap().save(&ip, &resolved) {
            Ok(()) => {
                if resolved != input.trim() {
                    self.status = Some(format!("Saved port {resolved} for {ip} (input '{input}' adjusted)"));
                } else {
                    self.status = Some(format!("Saved port {resolved} for {ip}"));
                }
            }
            Err(err) => self.status = Some(format!("Could not save port: {err}")),
        }
    }

    fn clear_all_ports(&mut self) {
        let outcome = self.store.lock().unwrap().clear_all();
        match outcome {
            Ok(removed) => {
                self.status = Some(format!("Cleared {removed} saved port(s)"));
                audit_success("CLEAR_PORTS", "", &format!("{removed} removed"));
            }
            Err(err) => {
                self.status = Some(format!("Could not clear ports: {err}"));
                audit_failure("CLEAR_PORTS", "", &err);
            }
        }
    }

    fn due_for_auto(&self) -> bool {
        self.auto_refresh
            && !self.view.is_in_flight()
            && self
                .last_attempt
                .is_none_or(|at| at.elapsed() >= Duration::from_secs(NODES_SECS))
    }
}

impl Component for Nodes {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        // Confirmation and edit modes capture the keyboard.
        if self.confirm_clear {
            self.confirm_clear = false;
            if key.code == KeyCode::Char('y') {
                self.clear_all_ports();
            } else {
                self.status = Some("Clear cancelled".to_string());
            }
            return Ok(None);
        }
        if let Some(input) = &mut self.port_input {
            match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() => input.push(c),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Enter => self.commit_port_edit(),
                KeyCode::Esc => {
                    self.port_input = None;
                    self.status = Some("Port edit cancelled".to_string());
                }
                _ => {}
            }
            return Ok(None);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Ok(Some(Action::Quit)),
            KeyCode::Char('j') | KeyCode::Down => {
                self.cursor.down();
                Ok(None)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.cursor.up();
                Ok(None)
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.cursor.home();
                Ok(None)
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.cursor.end();
                Ok(None)
            }
            KeyCode::Tab | KeyCode::Char(']') => {
                self.cycle_cluster(1);
                Ok(Some(Action::Refresh))
            }
            KeyCode::Char('[') => {
                self.cycle_cluster(-1);
                Ok(Some(Action::Refresh))
            }
            KeyCode::Char('r') => Ok(Some(Action::Refresh)),
            KeyCode::Char('a') => {
                self.auto_refresh = !self.auto_refresh;
                Ok(None)
            }
            KeyCode::Char('p') => {
                if let Some(row) = self.selected_row() {
                    let current = self.store.lock().unwrap().get(&row.internal_ip);
                    self.port_input = Some(current);
                }
                Ok(None)
            }
            KeyCode::Char('t') => {
                if let Some(endpoint) = self.selected_endpoint() {
                    self.pending_probe = Some(endpoint);
                    return Ok(Some(Action::Refresh));
                }
                self.status = Some("No node selected".to_string());
                Ok(None)
            }
            KeyCode::Char('C') => {
                self.confirm_clear = true;
                Ok(None)
            }
            KeyCode::Char('f') => Ok(self.selected_endpoint().map(Action::ShowBrowser)),
            KeyCode::Char('x') => Ok(self.selected_endpoint().map(Action::ShowTerminal)),
            KeyCode::Char('m') => Ok(self.selected_endpoint().map(Action::ShowResources)),
            KeyCode::Char('w') => Ok(Some(Action::ShowWorkloads)),
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        if action == Action::Tick && self.due_for_auto() {
            return Ok(Some(Action::Refresh));
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let block = Block::bordered().title(" Nodes ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [header_area, table_area, footer_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(inner);

        // Cluster strip.
        let mut spans = vec![Span::raw("Cluster: ")];
        if self.clusters.is_empty() {
            spans.push(Span::styled(
                self.active_cluster.as_deref().unwrap_or("(default)").to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else {
            for name in &self.clusters {
                let style = if Some(name) == self.active_cluster.as_ref() {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(name.clone(), style));
                spans.push(Span::raw("  "));
            }
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), header_area);

        if self.view.is_in_flight() && !self.view.has_data() {
            frame.render_widget(Paragraph::new("Loading nodes..."), table_area);
        } else if let Some(error) = self.view.error() {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(Color::Red),
                ))),
                table_area,
            );
        } else if let Some(nodes) = self.view.data() {
            if nodes.is_empty() {
                frame.render_widget(Paragraph::new("No nodes in this cluster"), table_area);
            } else {
                let saved = self.store.lock().unwrap().all();
                let header = Row::new(vec![
                    "NAME", "STATUS", "ROLES", "VERSION", "INTERNAL-IP", "PORT", "AGENT",
                ])
                .style(Style::default().add_modifier(Modifier::DIM))
                .bottom_margin(1);

                let rows: Vec<Row> = nodes
                    .iter()
                    .map(|node| {
                        let status_style = if node.status == "Ready" {
                            Style::default().fg(Color::Green)
                        } else {
                            Style::default().fg(Color::Red)
                        };
                        let (port, explicit) = match saved.get(&node.internal_ip) {
                            Some(port) => (self.policy.resolve(port), true),
                            None => (self.policy.default_port().to_string(), false),
                        };
                        let port_cell = if explicit {
                            Cell::from(format!("{port} *"))
                        } else {
                            Cell::from(port)
                        };
                        let probe_cell = match self.probes.get(&node.internal_ip) {
                            Some(probe) if probe.reachable => Cell::from(
                                Span::styled("up", Style::default().fg(Color::Green)),
                            ),
                            Some(probe) => Cell::from(Span::styled(
                                probe.detail.clone(),
                                Style::default().fg(Color::Red),
                            )),
                            None => Cell::from(Span::styled(
                                "-",
                                Style::default().fg(Color::DarkGray),
                            )),
                        };
                        Row::new(vec![
                            Cell::from(node.name.clone()),
                            Cell::from(Span::styled(node.status.clone(), status_style)),
                            Cell::from(node.roles.clone()),
                            Cell::from(node.version.clone()),
                            Cell::from(node.internal_ip.clone()),
                            port_cell,
                            probe_cell,
                        ])
                    })
                    .collect();

                let table = Table::new(
                    rows,
                    [
                        Constraint::Fill(2),
                        Constraint::Length(10),
                        Constraint::Length(14),
                        Constraint::Length(10),
                        Constraint::Length(15),
                        Constraint::Length(9),
                        Constraint::Fill(1),
                    ],
                )
                .header(header)
                .row_highlight_style(
                    Style::default()
                        .bg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ");

                self.table_state.select(Some(self.cursor.pos()));
                frame.render_stateful_widget(table, table_area, &mut self.table_state);
            }
        } else {
            frame.render_widget(Paragraph::new("Press r to load nodes"), table_area);
        }

        // Footer: port edit takes priority, then transient status, then hints.
        if let Some(input) = &self.port_input {
            let ip = self
                .selected_row()
                .map(|row| row.internal_ip.clone())
                .unwrap_or_default();
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    Span::raw(format!("Port for {ip}: ")),
                    Span::styled(
                        format!("{input}_"),
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("  (Enter save, Esc cancel)"),
                ])),
                footer_area,
            );
        } else if let Some(status) = &self.status {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    status.clone(),
                    Style::default().fg(Color::Yellow),
                ))),
                footer_area,
            );
        } else {
            frame.render_widget(
                Paragraph::new(key_hints(&[
                    ("f", "files"),
                    ("x", "terminal"),
                    ("m", "monitor"),
                    ("w", "workloads"),
                    ("p", "port"),
                    ("t", "probe"),
                    ("C", "clear ports"),
                    ("r", "refresh"),
                    ("q", "quit"),
                ])),
                footer_area,
            );
        }

        if self.confirm_clear {
            let popup = centered_rect(46, 5, area);
            frame.render_widget(Clear, popup);
            frame.render_widget(
                Paragraph::new(vec![
                    Line::from("Remove every saved agent port?"),
                    Line::from(""),
                    Line::from(Span::styled(
                        "[y] confirm   [any other key] cancel",
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
                ])
                .block(Block::bordered().title(" Clear saved ports ")),
                popup,
            );
        }

        Ok(())
    }
}
