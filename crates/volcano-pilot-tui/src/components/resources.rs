//! Live CPU and memory gauges for one node agent.

use std::sync::{Arc, Mutex};

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use gateway_rs::{GatewayClient, ResourceUsage};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Gauge, Paragraph};
use tracing::warn;
use volcano_pilot_core::constants::poll_intervals::RESOURCE_CHOICES;
use volcano_pilot_core::errors::user_message;
use volcano_pilot_core::format::{format_percent, percent_ratio};
use volcano_pilot_core::{AsyncView, Endpoint, EndpointStore, RefreshCadence};

use crate::action::Action;
use crate::ui_ext::key_hints;

use super::Component;

fn load_color(percent: f64) -> Color {
    if percent >= 90.0 {
        Color::Red
    } else if percent >= 70.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

pub struct Resources {
    client: GatewayClient,
    endpoint: Endpoint,
    store: Arc<Mutex<EndpointStore>>,

    view: AsyncView<ResourceUsage>,
    cadence: RefreshCadence,
    status: Option<String>,
}

impl Resources {
    pub fn new(client: GatewayClient, endpoint: Endpoint, store: Arc<Mutex<EndpointStore>>) -> Self {
        Self {
            client,
            endpoint,
            store,
            view: AsyncView::new(),
            cadence: RefreshCadence::enabled(RESOURCE_CHOICES, 5),
            status: None,
        }
    }

    pub async fn refresh(&mut self) {
        let Some(port) = self.endpoint.agent_port() else {
            self.view
                .set_error(format!("Invalid agent port '{}'", self.endpoint.port));
            return;
        };
        let token = self.view.begin();
        match self.client.resource_usage(&self.endpoint.ip, port).await {
            Ok(usage) => {
                if self.view.finish(token, usage) {
                    // The port answered, so remember it for this node.
                    let result = {
                        let mut store = self.store.lock().unwrap();
                        store.save(&self.endpoint.ip, &self.endpoint.port)
                    };
                    if let Err(err) = result {
                        warn!(%err, ip = %self.endpoint.ip, "could not save agent port");
                        self.status = Some(format!("Could not save port: {err}"));
                    }
                }
            }
            Err(err) => {
                self.view.fail(token, user_message(&err));
            }
        }
    }
}

impl Component for Resources {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Ok(Some(Action::Back)),
            KeyCode::Char('a') => {
                self.cadence.toggle();
                Ok(None)
            }
            KeyCode::Char('i') => {
                self.cadence.cycle();
                Ok(None)
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
        let block = Block::bordered().title(format!(" Monitor: {} ", self.endpoint.label()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [info_area, cpu_area, mem_area, status_area, footer_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(inner);

        let poll = if self.cadence.is_enabled() {
            format!("every {}s", self.cadence.interval_secs())
        } else {
            "paused".to_string()
        };
        let age = match self.view.age() {
            Some(age) => format!("updated {}s ago", age.as_secs()),
            None => "no data yet".to_string(),
        };
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                format!("Polling {poll}  -  {age}"),
                Style::default().fg(Color::DarkGray),
            ))),
            info_area,
        );

        match self.view.data() {
            Some(usage) => {
                let cpu = Gauge::default()
                    .block(Block::bordered().title(" CPU "))
                    .gauge_style(Style::default().fg(load_color(usage.cpu)))
                    .ratio(percent_ratio(usage.cpu))
                    .label(format_percent(usage.cpu));
                frame.render_widget(cpu, cpu_area);

                let mem = Gauge::default()
                    .block(Block::bordered().title(" Memory "))
                    .gauge_style(Style::default().fg(load_color(usage.memory)))
                    .ratio(percent_ratio(usage.memory))
                    .label(format_percent(usage.memory));
                frame.render_widget(mem, mem_area);
            }
            None if self.view.is_in_flight() => {
                frame.render_widget(Paragraph::new("Connecting to agent..."), cpu_area);
            }
            None => {}
        }

        if let Some(error) = self.view.error() {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(Color::Red),
                )),
                status_area,
            );
        } else if let Some(status) = &self.status {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    status.clone(),
                    Style::default().fg(Color::Yellow),
                )),
                status_area,
            );
        }

        frame.render_widget(
            Paragraph::new(key_hints(&[
                ("a", "auto"),
                ("i", "interval"),
                ("r", "refresh"),
                ("q", "back"),
            ])),
            footer_area,
        );

        Ok(())
    }
}
