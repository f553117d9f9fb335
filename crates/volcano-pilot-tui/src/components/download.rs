//! Folder download view: scan a remote folder, then drain it to disk.
//!
//! The walk and the fetch loop run on spawned tasks so the view keeps
//! drawing; this component only reads the shared session and flips its
//! phase. Cancelling clears the queue and the workers stop at their next
//! phase check.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use gateway_rs::{GatewayClient, Listing};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Gauge, Paragraph};
use tokio::task::JoinHandle;
use volcano_pilot_core::download::{drain_session, prepare_session};
use volcano_pilot_core::errors::user_message;
use volcano_pilot_core::format::truncate_middle;
use volcano_pilot_core::listing::file_name_of;
use volcano_pilot_core::{
    DirLister, DownloadItem, DownloadPhase, DownloadSession, DownloadSink, Endpoint, FileFetcher,
    FsSink,
};

use crate::action::Action;
use crate::audit::{audit_cancelled, audit_failure, audit_start, audit_success};
use crate::ui_ext::{DownloadPhaseExt, key_hints};

use super::Component;

/// Gateway-backed lister and fetcher for one node agent. `/list-files`
/// answers with a name list for directories and raw bytes for files, so
/// both traits ride the same endpoint.
#[derive(Clone)]
struct AgentFs {
    client: GatewayClient,
    ip: String,
    port: u16,
}

impl DirLister for AgentFs {
    async fn list(&self, path: &str) -> Result<Vec<String>, String> {
        match self.client.list_files(&self.ip, self.port, path).await {
            Ok(Listing::Entries(names)) => Ok(names),
            Ok(Listing::File { .. }) => Err(format!("'{path}' is a file, not a folder")),
            Err(err) => Err(user_message(&err)),
        }
    }
}

impl FileFetcher for AgentFs {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, String> {
        match self.client.list_files(&self.ip, self.port, path).await {
            Ok(Listing::File { bytes, .. }) => Ok(bytes),
            Ok(Listing::Entries(_)) => Err(format!("'{path}' is a folder, not a file")),
            Err(err) => Err(user_message(&err)),
        }
    }
}

/// Drops the remote root prefix so files land under the destination folder
/// instead of repeating the full remote path.
struct RootedSink {
    inner: FsSink,
    prefix: String,
}

impl DownloadSink for RootedSink {
    fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<PathBuf, String> {
        let stripped = relative_path
            .strip_prefix(self.prefix.as_str())
            .map(|rest| rest.trim_start_matches('/'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(relative_path);
        self.inner.write(stripped, bytes)
    }
}

pub struct Download {
    client: GatewayClient,
    endpoint: Endpoint,
    root: String,
    /// Local directory the folder is mirrored into.
    dest: PathBuf,

    session: Arc<Mutex<DownloadSession>>,
    worker: Option<JoinHandle<()>>,

    scroll: usize,
    notice: Option<String>,
}

impl Download {
    pub fn new(
        client: GatewayClient,
        endpoint: Endpoint,
        root: String,
        download_dir: PathBuf,
    ) -> Self {
        let leaf = file_name_of(&root);
        let dest = download_dir.join(if leaf.is_empty() { "workspace" } else { leaf });
        Self {
            client,
            endpoint,
            session: Arc::new(Mutex::new(DownloadSession::new(root.clone()))),
            root,
            dest,
            worker: None,
            scroll: 0,
            notice: None,
        }
    }

    fn agent_fs(&self) -> Option<AgentFs> {
        let port = self.endpoint.agent_port()?;
        Some(AgentFs {
            client: self.client.clone(),
            ip: self.endpoint.ip.clone(),
            port,
        })
    }

    fn phase(&self) -> DownloadPhase {
        self.session.lock().unwrap().phase.clone()
    }

    /// Kicks off the walk. Runs only from a settled phase.
    pub async fn refresh(&mut self) {
        if !self.phase().is_settled() {
            return;
        }
        let Some(fs) = self.agent_fs() else {
            self.session.lock().unwrap().phase =
                DownloadPhase::Error(format!("invalid agent port '{}'", self.endpoint.port));
            return;
        };
        self.notice = None;
        self.scroll = 0;
        {
            let mut s = self.session.lock().unwrap();
            s.cancel();
            s.root = self.root.clone();
        }
        let session = Arc::clone(&self.session);
        self.worker = Some(tokio::spawn(async move {
            prepare_session(&session, &fs).await;
        }));
    }

    fn start_download(&mut self) {
        if self.phase() != DownloadPhase::Ready {
            return;
        }
        let Some(fs) = self.agent_fs() else {
            return;
        };
        let mut sink = RootedSink {
            inner: FsSink::new(self.dest.clone()),
            prefix: self.root.clone(),
        };
        let session = Arc::clone(&self.session);
        let label = self.endpoint.label();
        let root = self.root.clone();
        audit_start("DOWNLOAD_FOLDER", &label, &root);
        self.worker = Some(tokio::spawn(async move {
            drain_session(&session, &fs, &mut sink).await;
            let (phase, downloaded, failed) = {
                let s = session.lock().unwrap();
                (s.phase.clone(), s.downloaded(), s.failed)
            };
            match phase {
                DownloadPhase::Completed => audit_success(
                    "DOWNLOAD_FOLDER",
                    &label,
                    &format!("{root}: {downloaded} files saved, {failed} failed"),
                ),
                DownloadPhase::Error(err) => audit_failure("DOWNLOAD_FOLDER", &label, &err),
                _ => audit_cancelled("DOWNLOAD_FOLDER", &label, &root),
            }
        }));
    }

    fn cancel_active(&mut self) -> bool {
        let mut s = self.session.lock().unwrap();
        if s.phase.is_settled() {
            return false;
        }
        let was_downloading = s.phase == DownloadPhase::Downloading;
        s.cancel();
        drop(s);
        if was_downloading {
            audit_cancelled("DOWNLOAD_FOLDER", &self.endpoint.label(), &self.root);
        }
        self.notice = Some("Download cancelled".to_string());
        true
    }
}

impl Component for Download {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.cancel_active();
                Ok(Some(Action::Back))
            }
            KeyCode::Enter | KeyCode::Char('s') => {
                self.start_download();
                Ok(None)
            }
            KeyCode::Char('c') => {
                self.cancel_active();
                Ok(None)
            }
            KeyCode::Char('r') => {
                if self.phase().is_settled() {
                    return Ok(Some(Action::Refresh));
                }
                Ok(None)
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.scroll = self.scroll.saturating_add(1);
                Ok(None)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.scroll = self.scroll.saturating_sub(1);
                Ok(None)
            }
            KeyCode::Char('g') | KeyCode::Home => {
                self.scroll = 0;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        if action == Action::Tick
            && let Some(worker) = &self.worker
            && worker.is_finished()
        {
            self.worker = None;
        }
        Ok(None)
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect) -> Result<()> {
        struct Snapshot {
            phase: DownloadPhase,
            total: usize,
            downloaded: usize,
            failed: usize,
            ratio: f64,
            current: Option<String>,
            files: Vec<DownloadItem>,
        }
        let snap = {
            let s = self.session.lock().unwrap();
            Snapshot {
                phase: s.phase.clone(),
                total: s.total(),
                downloaded: s.downloaded(),
                failed: s.failed,
                ratio: s.progress_ratio(),
                current: s.current.clone(),
                files: s.files.clone(),
            }
        };

        let block = Block::bordered().title(format!(
            " Download: /{} ",
            truncate_middle(&self.root, 40)
        ));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [head_area, phase_area, gauge_area, list_area, footer_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .areas(inner);

        frame.render_widget(
            Paragraph::new(vec![
                Line::from(Span::styled(
                    format!("Node {}  ->  {}", self.endpoint.label(), self.dest.display()),
                    Style::default().fg(Color::DarkGray),
                )),
                Line::default(),
            ]),
            head_area,
        );

        let detail = match &snap.phase {
            DownloadPhase::Idle => "press r to scan".to_string(),
            DownloadPhase::Preparing => "walking remote folder...".to_string(),
            DownloadPhase::Ready => {
                format!("{} file(s) found, press Enter to download", snap.total)
            }
            DownloadPhase::Downloading => snap
                .current
                .as_deref()
                .map(|path| truncate_middle(path, 60))
                .unwrap_or_default(),
            DownloadPhase::Completed => {
                format!("{} saved, {} failed", snap.downloaded, snap.failed)
            }
            DownloadPhase::Error(err) => err.clone(),
        };
        frame.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled(
                    format!("[{}] ", snap.phase.label()),
                    Style::default()
                        .fg(snap.phase.color())
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(detail),
            ])),
            phase_area,
        );

        if snap.total > 0 {
            let gauge = Gauge::default()
                .gauge_style(Style::default().fg(snap.phase.color()))
                .ratio(snap.ratio.clamp(0.0, 1.0))
                .label(format!(
                    "{}/{} ({} failed)",
                    snap.downloaded, snap.total, snap.failed
                ));
            frame.render_widget(gauge, gauge_area);
        }

        let height = list_area.height as usize;
        let max_scroll = snap.files.len().saturating_sub(height.max(1));
        self.scroll = self.scroll.min(max_scroll);
        let lines: Vec<Line> = snap
            .files
            .iter()
            .skip(self.scroll)
            .take(height.max(1))
            .map(|item| {
                let active = snap.current.as_deref() == Some(item.path.as_str());
                let (marker, style) = if item.downloaded {
                    ("[x] ", Style::default().fg(Color::Green))
                } else if active {
                    (" >  ", Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD))
                } else {
                    ("[ ] ", Style::default().fg(Color::DarkGray))
                };
                Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(item.path.clone(), style),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), list_area);

        if let Some(notice) = &self.notice {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    notice.clone(),
                    Style::default().fg(Color::Yellow),
                )),
                footer_area,
            );
        } else {
            let hints: &[(&str, &str)] = match snap.phase {
                DownloadPhase::Ready => {
                    &[("Enter", "download"), ("c", "cancel"), ("q", "back")]
                }
                DownloadPhase::Preparing | DownloadPhase::Downloading => {
                    &[("c", "cancel"), ("j/k", "scroll"), ("q", "back")]
                }
                _ => &[("r", "rescan"), ("j/k", "scroll"), ("q", "back")],
            };
            frame.render_widget(Paragraph::new(key_hints(hints)), footer_area);
        }

        Ok(())
    }
}
