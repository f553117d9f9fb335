//! Remote workspace browser for a single node agent.
//!
//! One listing request per navigation step. The agent answers `/list-files`
//! with either a directory listing or raw file bytes; a file answer is saved
//! straight to the local download directory instead of being displayed.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use gateway_rs::{GatewayClient, Listing};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph, Row, Table, TableState};
use tokio::sync::broadcast;
use volcano_pilot_core::errors::user_message;
use volcano_pilot_core::listing::classify;
use volcano_pilot_core::{
    BrowserSession, DirectoryEntry, DownloadSink, Endpoint, EndpointStore, EntryKind, FsSink,
    ListCursor, PortEvent,
};

use crate::action::Action;
use crate::audit::{audit_failure, audit_success};
use crate::ui_ext::{centered_rect, key_hints};

use super::Component;

pub struct Browser {
    client: GatewayClient,
    endpoint: Endpoint,
    store: Arc<Mutex<EndpointStore>>,
    port_events: broadcast::Receiver<PortEvent>,
    download_dir: PathBuf,

    session: BrowserSession,
    cursor: ListCursor,
    table_state: TableState,

    /// Path whose listing the next refresh should fetch.
    pending_fetch: Option<String>,
    loading: bool,
    error: Option<String>,
    status: Option<String>,
    searching: bool,
    confirm_clear: bool,
}

impl Browser {
    pub fn new(
        client: GatewayClient,
        endpoint: Endpoint,
        store: Arc<Mutex<EndpointStore>>,
        download_dir: PathBuf,
    ) -> Self {
        let port_events = store.lock().unwrap().subscribe();
        Self {
            client,
            endpoint,
            store,
            port_events,
            download_dir,
            session: BrowserSession::new(),
            cursor: ListCursor::new(),
            table_state: TableState::default(),
            // List the workspace root on the first refresh.
            pending_fetch: Some(String::new()),
            loading: false,
            error: None,
            status: None,
            searching: false,
            confirm_clear: false,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Re-lists the current directory, e.g. after a workspace wipe.
    pub fn mark_stale(&mut self) {
        self.pending_fetch = Some(self.session.current_path().to_string());
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub async fn refresh(&mut self) {
        let path = self
            .pending_fetch
            .take()
            .unwrap_or_else(|| self.session.current_path().to_string());
        let Some(port) = self.endpoint.agent_port() else {
            self.error = Some(format!("Invalid agent port '{}'", self.endpoint.port));
            return;
        };

        self.loading = true;
        let result = self.client.list_files(&self.endpoint.ip, port, &path).await;
        self.loading = false;

        match result {
            Ok(Listing::Entries(names)) => {
                self.error = None;
                self.session.apply_listing(&path, classify(&path, names));
                self.sync_cursor();
            }
            Ok(Listing::File { name, bytes }) => {
                // The selected entry was a file after all; keep the listing
                // as-is and save the payload locally.
                let size = bytes.len();
                let mut sink = FsSink::new(self.download_dir.clone());
                match sink.write(&name, &bytes) {
                    Ok(saved) => {
                        audit_success(
                            "DOWNLOAD_FILE",
                            &self.endpoint.label(),
                            &format!("{path} ({size} bytes)"),
                        );
                        self.status = Some(format!("Saved {}", saved.display()));
                    }
                    Err(err) => {
                        audit_failure("DOWNLOAD_FILE", &self.endpoint.label(), &path);
                        self.error = Some(format!("Could not save {name}: {err}"));
                    }
                }
            }
            Err(err) => {
                // Keep the last listing on screen; surface the failure only.
                self.error = Some(user_message(&err));
            }
        }
    }

    fn sync_cursor(&mut self) {
        let len = self.session.page_entries().len();
        self.cursor.set_len(len);
        self.table_state.select(if len == 0 {
            None
        } else {
            Some(self.cursor.pos())
        });
    }

    fn selected(&self) -> Option<DirectoryEntry> {
        self.cursor
            .selected(&self.session.page_entries())
            .map(|entry| (*entry).clone())
    }

    fn drain_port_events(&mut self) {
        loop {
            match self.port_events.try_recv() {
                Ok(PortEvent::Saved { ip, port }) => {
                    if ip == self.endpoint.ip && port != self.endpoint.port {
                        self.endpoint.port = port;
                        self.status =
                            Some(format!("Agent port changed to {}", self.endpoint.port));
                    }
                }
                Ok(PortEvent::Cleared { .. }) => {
                    let fallback = self.store.lock().unwrap().get(&self.endpoint.ip);
                    if fallback != self.endpoint.port {
                        self.endpoint.port = fallback;
                        self.status =
                            Some(format!("Agent port reset to {}", self.endpoint.port));
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => {
                let mut query = self.session.search().to_string();
                query.push(c);
                self.session.set_search(&query);
            }
            KeyCode::Backspace => {
                let mut query = self.session.search().to_string();
                query.pop();
                self.session.set_search(&query);
            }
            KeyCode::Enter => self.searching = false,
            KeyCode::Esc => {
                self.searching = false;
                self.session.set_search("");
            }
            _ => {}
        }
        self.sync_cursor();
    }
}

impl Component for Browser {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.confirm_clear {
            self.confirm_clear = false;
            if key.code == KeyCode::Char('y') {
                return Ok(Some(Action::ClearWorkspace(self.endpoint.clone())));
            }
            self.status = Some("Workspace clear cancelled".to_string());
            return Ok(None);
        }

        if self.searching {
            self.handle_search_key(key);
            return Ok(None);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => Ok(Some(Action::Back)),
            KeyCode::Char('j') | KeyCode::Down => {
                self.cursor.down();
                self.table_state.select(Some(self.cursor.pos()));
                Ok(None)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.cursor.up();
                self.table_state.select(Some(self.cursor.pos()));
                Ok(None)
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.cursor.home();
                self.table_state.select(Some(self.cursor.pos()));
                Ok(None)
            }
            KeyCode::Char('G') | KeyCode::End => {
                self.cursor.end();
                self.table_state.select(Some(self.cursor.pos()));
                Ok(None)
            }
            KeyCode::Enter | KeyCode::Char('l') => match self.selected() {
                Some(entry) => {
                    self.pending_fetch = Some(entry.path);
                    Ok(Some(Action::Refresh))
                }
                None => Ok(None),
            },
            KeyCode::Backspace | KeyCode::Char('h') => match self.session.back_target() {
                Some(path) => {
                    self.pending_fetch = Some(path);
                    Ok(Some(Action::Refresh))
                }
                // Already at the workspace root.
                None => Ok(None),
            },
            KeyCode::PageDown | KeyCode::Char('n') => {
                self.session.next_page();
                self.cursor.home();
                self.sync_cursor();
                Ok(None)
            }
            KeyCode::PageUp | KeyCode::Char('p') => {
                self.session.prev_page();
                self.cursor.home();
                self.sync_cursor();
                Ok(None)
            }
            KeyCode::Char('z') => {
                self.session.cycle_page_size();
                self.cursor.home();
                self.sync_cursor();
                self.status = Some(format!("Page size {}", self.session.page_size()));
                Ok(None)
            }
            KeyCode::Char('/') => {
                self.searching = true;
                Ok(None)
            }
            KeyCode::Char('D') => match self.selected() {
                Some(entry) if entry.kind == EntryKind::Directory => {
                    Ok(Some(Action::ShowDownload {
                        endpoint: self.endpoint.clone(),
                        root: entry.path,
                    }))
                }
                Some(entry) => {
                    self.status = Some(format!("{} is not a folder", entry.name));
                    Ok(None)
                }
                None => Ok(None),
            },
            KeyCode::Char('X') => {
                self.confirm_clear = true;
                Ok(None)
            }
            KeyCode::Char('r') => {
                self.mark_stale();
                Ok(Some(Action::Refresh))
            }
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        if action == Action::Tick {
            self.drain_port_events();
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        let block = Block::bordered().title(format!(" Files: {} ", self.endpoint.label()));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [header_area, table_area, footer_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(inner);

        let path_display = if self.session.current_path().is_empty() {
            "/".to_string()
        } else {
            format!("/{}", self.session.current_path())
        };
        let mut meta = format!(
            "Page {}/{}  {} of {} entries  page size {}",
            self.session.page(),
            self.session.page_count(),
            self.session.filtered_len(),
            self.session.entries().len(),
            self.session.page_size(),
        );
        if !self.session.search().is_empty() {
            meta.push_str(&format!("  filter: {}", self.session.search()));
        }
        frame.render_widget(
            Paragraph::new(vec![
                Line::from(Span::styled(
                    path_display,
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(meta, Style::default().fg(Color::DarkGray))),
            ]),
            header_area,
        );

        if self.loading && self.session.entries().is_empty() {
            frame.render_widget(Paragraph::new("Loading directory..."), table_area);
        } else if self.session.entries().is_empty() && self.error.is_none() {
            frame.render_widget(
                Paragraph::new("Empty directory").style(Style::default().fg(Color::DarkGray)),
                table_area,
            );
        } else if self.session.filtered_len() == 0 {
            frame.render_widget(
                Paragraph::new(format!("No entries match '{}'", self.session.search()))
                    .style(Style::default().fg(Color::DarkGray)),
                table_area,
            );
        } else {
            let rows: Vec<Row> = self
                .session
                .page_entries()
                .iter()
                .map(|entry| {
                    let (marker, style) = match entry.kind {
                        EntryKind::Directory => {
                            ("dir", Style::default().fg(Color::Cyan).bold())
                        }
                        EntryKind::File => ("file", Style::default()),
                    };
                    Row::new(vec![
                        Span::styled(marker, Style::default().fg(Color::DarkGray)),
                        Span::styled(entry.name.clone(), style),
                    ])
                })
                .collect();
            let table = Table::new(rows, [Constraint::Length(5), Constraint::Fill(1)])
                .header(
                    Row::new(vec!["TYPE", "NAME"])
                        .style(Style::default().add_modifier(Modifier::DIM))
                        .bottom_margin(1),
                )
                .row_highlight_style(
                    Style::default()
                        .bg(Color::DarkGray)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol("> ");
            frame.render_stateful_widget(table, table_area, &mut self.table_state);
        }

        if self.searching {
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    Span::raw("/"),
                    Span::styled(
                        format!("{}_", self.session.search()),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw("   [Enter] keep  [Esc] clear"),
                ])),
                footer_area,
            );
        } else if let Some(error) = &self.error {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(Color::Red),
                )),
                footer_area,
            );
        } else if let Some(status) = &self.status {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    status.clone(),
                    Style::default().fg(Color::Green),
                )),
                footer_area,
            );
        } else {
            frame.render_widget(
                Paragraph::new(key_hints(&[
                    ("Enter", "open"),
                    ("Bksp", "up"),
                    ("/", "filter"),
                    ("n/p", "page"),
                    ("z", "page size"),
                    ("D", "download folder"),
                    ("X", "clear workspace"),
                    ("q", "back"),
                ])),
                footer_area,
            );
        }

        if self.confirm_clear {
            let popup = centered_rect(56, 5, area);
            frame.render_widget(Clear, popup);
            let text = vec![
                Line::from(format!("Clear workspace on {}?", self.endpoint.ip)),
                Line::from(Span::styled(
                    "This deletes every file under the agent workspace.",
                    Style::default().fg(Color::Red),
                )),
                Line::from("[y] confirm   [any other key] cancel"),
            ];
            frame.render_widget(
                Paragraph::new(text).block(Block::bordered().title(" Confirm ")),
                popup,
            );
        }

        Ok(())
    }
}
