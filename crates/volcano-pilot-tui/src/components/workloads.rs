//! Workload tables: pods, deployments, and services on tabs.

use std::time::{Duration, Instant};

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use gateway_rs::{DeploymentRow, GatewayClient, PodRow, ServiceRow};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Cell, Paragraph, Row, Table, TableState};
use volcano_pilot_core::constants::poll_intervals::WORKLOADS_SECS;
use volcano_pilot_core::errors::user_message;
use volcano_pilot_core::{AsyncView, ListCursor};

use super::Component;
use crate::action::Action;
use crate::ui_ext::key_hints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Pods,
    Deployments,
    Services,
}

impl Tab {
    fn title(&self) -> &'static str {
        match self {
            Tab::Pods => "Pods",
            Tab::Deployments => "Deployments",
            Tab::Services => "Services",
        }
    }

    fn next(&self) -> Tab {
        match self {
            Tab::Pods => Tab::Deployments,
            Tab::Deployments => Tab::Services,
            Tab::Services => Tab::Pods,
        }
    }
}

/// All three tables fetched together; one failing fails the view.
#[derive(Debug, Default)]
struct WorkloadTables {
    pods: Vec<PodRow>,
    deployments: Vec<DeploymentRow>,
    services: Vec<ServiceRow>,
}

pub struct Workloads {
    client: GatewayClient,
    view: AsyncView<WorkloadTables>,
    tab: Tab,
    cursor: ListCursor,
    table_state: TableState,
    auto_refresh: bool,
    last_attempt: Option<Instant>,
}

impl Workloads {
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            view: AsyncView::new(),
            tab: Tab::Pods,
            cursor: ListCursor::new(),
            table_state: TableState::default(),
            auto_refresh: true,
            last_attempt: None,
        }
    }

    pub async fn refresh(&mut self) {
        self.last_attempt = Some(Instant::now());
        let token = self.view.begin();

        let pods = match self.client.pods().await {
            Ok(pods) => pods,
            Err(err) => {
                self.view.fail(token, user_message(&err));
                return;
            }
        };
        let deployments = match self.client.deployments().await {
            Ok(deployments) => deployments,
            Err(err) => {
                self.view.fail(token, user_message(&err));
                return;
            }
        };
        let services = match self.client.services().await {
            Ok(services) => services,
            Err(err) => {
                self.view.fail(token, user_message(&err));
                return;
            }
        };

        let tables = WorkloadTables {
            pods,
            deployments,
            services,
        };
        self.cursor.set_len(self.tab_len(&tables));
        self.view.finish(token, tables);
    }

    fn tab_len(&self, tables: &WorkloadTables) -> usize {
        match self.tab {
            Tab::Pods => tables.pods.len(),
            Tab::Deployments => tables.deployments.len(),
            Tab::Services => tables.services.len(),
        }
    }

    fn switch_tab(&mut self) {
        self.tab = self.tab.next();
        self.reset_cursor_for_tab();
    }

    fn reset_cursor_for_tab(&mut self) {
        let len = self.view.data().map(|t| self.tab_len(t)).unwrap_or(0);
        self.cursor.set_len(len);
        self.cursor.home();
    }

    fn selected_pod(&self) -> Option<&PodRow> {
        if self.tab != Tab::Pods {
            return None;
        }
        self.cursor.selected(self.view.data()?.pods.as_slice())
    }

    fn due_for_auto(&self) -> bool {
        self.auto_refresh
            && !self.view.is_in_flight()
            && self
                .last_attempt
                .is_none_or(|at| at.elapsed() >= Duration::from_secs(WORKLOADS_SECS))
    }
}

impl Component for Workloads {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Ok(Some(Action::Back)),
            KeyCode::Tab => {
                self.switch_tab();
                Ok(None)
            }
            KeyCode::Char('1') => {
                self.tab = Tab::Pods;
                self.reset_cursor_for_tab();
                Ok(None)
            }
            KeyCode::Char('2') => {
                self.tab = Tab::Deployments;
                self.reset_cursor_for_tab();
                Ok(None)
            }
            KeyCode::Char('3') => {
                self.tab = Tab::Services;
                self.reset_cursor_for_tab();
                Ok(None)
            }
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
            KeyCode::Char('r') => Ok(Some(Action::Refresh)),
            KeyCode::Char('a') => {
                self.auto_refresh = !self.auto_refresh;
                Ok(None)
            }
            KeyCode::Enter | KeyCode::Char('l') => {
                if let Some(pod) = self.selected_pod() {
                    return Ok(Some(Action::ShowPodLogs {
                        pod: pod.name.clone(),
                        namespace: pod.namespace.clone(),
                    }));
                }
                Ok(None)
            }
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
        let block = Block::bordered().title(" Workloads ");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [tabs_area, table_area, footer_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(inner);

        let mut spans = Vec::new();
        for (index, tab) in [Tab::Pods, Tab::Deployments, Tab::Services].iter().enumerate() {
            let style = if *tab == self.tab {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            spans.push(Span::styled(format!("[{}] {}", index + 1, tab.title()), style));
            spans.push(Span::raw("   "));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), tabs_area);

        if self.view.is_in_flight() && !self.view.has_data() {
            frame.render_widget(Paragraph::new("Loading workloads..."), table_area);
        } else if let Some(error) = self.view.error() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(Color::Red),
                )),
                table_area,
            );
        } else if let Some(tables) = self.view.data() {
            let (header, rows, widths): (Row, Vec<Row>, Vec<Constraint>) = match self.tab {
                Tab::Pods => (
                    Row::new(vec!["NAMESPACE", "NAME", "READY", "STATUS", "RESTARTS", "AGE"]),
                    tables
                        .pods
                        .iter()
                        .map(|pod| {
                            let status_style = match pod.status.as_str() {
                                "Running" | "Succeeded" => Style::default().fg(Color::Green),
                                "Pending" => Style::default().fg(Color::Yellow),
                                _ => Style::default().fg(Color::Red),
                            };
                            Row::new(vec![
                                Cell::from(pod.namespace.clone()),
                                Cell::from(pod.name.clone()),
                                Cell::from(pod.ready.clone()),
                                Cell::from(Span::styled(pod.status.clone(), status_style)),
                                Cell::from(pod.restarts.to_string()),
                                Cell::from(pod.age.clone()),
                            ])
                        })
                        .collect(),
                    vec![
                        Constraint::Fill(1),
                        Constraint::Fill(2),
                        Constraint::Length(7),
                        Constraint::Length(12),
                        Constraint::Length(9),
                        Constraint::Fill(1),
                    ],
                ),
                Tab::Deployments => (
                    Row::new(vec!["NAMESPACE", "NAME", "READY", "UP-TO-DATE", "AVAILABLE", "AGE"]),
                    tables
                        .deployments
                        .iter()
                        .map(|dep| {
                            Row::new(vec![
                                Cell::from(dep.namespace.clone()),
                                Cell::from(dep.name.clone()),
                                Cell::from(dep.ready.clone()),
                                Cell::from(dep.up_to_date.to_string()),
                                Cell::from(dep.available.to_string()),
                                Cell::from(dep.age.clone()),
                            ])
                        })
                        .collect(),
                    vec![
                        Constraint::Fill(1),
                        Constraint::Fill(2),
                        Constraint::Length(7),
                        Constraint::Length(11),
                        Constraint::Length(10),
                        Constraint::Fill(1),
                    ],
                ),
                Tab::Services => (
                    Row::new(vec!["NAMESPACE", "NAME", "TYPE", "CLUSTER-IP", "PORT(S)", "AGE"]),
                    tables
                        .services
                        .iter()
                        .map(|svc| {
                            Row::new(vec![
                                Cell::from(svc.namespace.clone()),
                                Cell::from(svc.name.clone()),
                                Cell::from(svc.kind.clone()),
                                Cell::from(svc.cluster_ip.clone()),
                                Cell::from(svc.ports.clone()),
                                Cell::from(svc.age.clone()),
                            ])
                        })
                        .collect(),
                    vec![
                        Constraint::Fill(1),
                        Constraint::Fill(2),
                        Constraint::Length(12),
                        Constraint::Length(15),
                        Constraint::Fill(1),
                        Constraint::Fill(1),
                    ],
                ),
            };

            if rows.is_empty() {
                frame.render_widget(
                    Paragraph::new(format!("No {} found", self.tab.title().to_lowercase())),
                    table_area,
                );
            } else {
                let table = Table::new(rows, widths)
                    .header(
                        header
                            .style(Style::default().add_modifier(Modifier::DIM))
                            .bottom_margin(1),
                    )
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
            frame.render_widget(Paragraph::new("Press r to load workloads"), table_area);
        }

        let mut hints = vec![("Tab", "switch"), ("r", "refresh"), ("a", "auto")];
        if self.tab == Tab::Pods {
            hints.push(("Enter", "logs"));
        }
        hints.push(("q", "back"));
        frame.render_widget(Paragraph::new(key_hints(&hints)), footer_area);

        Ok(())
    }
}
