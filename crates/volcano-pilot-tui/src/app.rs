//! Application state and main loop.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use color_eyre::Result;
use crossterm::event::{self, Event, KeyEventKind};
use gateway_rs::GatewayClient;
use volcano_pilot_core::errors::user_message;
use volcano_pilot_core::{EndpointStore, PortPolicy};

use crate::action::Action;
use crate::audit::{audit_failure, audit_start, audit_success};
use crate::components::Component;
use crate::components::browser::Browser;
use crate::components::download::Download;
use crate::components::nodes::Nodes;
use crate::components::pod_logs::PodLogsView;
use crate::components::resources::Resources;
use crate::components::terminal::Terminal;
use crate::components::workloads::Workloads;
use crate::tui::{self, Tui};

/// Current view in the application.
#[derive(Debug, Clone, PartialEq)]
enum View {
    Nodes,
    Workloads,
    PodLogs,
    Browser,
    Download,
    Terminal,
    Resources,
}

/// Main application state. The node table is always alive; every other
/// view is created on entry and dropped on back, except the browser, which
/// survives underneath an open download view.
pub struct App {
    should_quit: bool,
    view: View,

    nodes: Nodes,
    workloads: Option<Workloads>,
    pod_logs: Option<PodLogsView>,
    browser: Option<Browser>,
    download: Option<Download>,
    terminal: Option<Terminal>,
    resources: Option<Resources>,

    client: GatewayClient,
    store: Arc<Mutex<EndpointStore>>,
    download_dir: PathBuf,
    /// Log lines fetched per pod log request.
    tail: u32,
    tick_rate: Duration,
}

impl App {
    pub fn new(
        client: GatewayClient,
        store: Arc<Mutex<EndpointStore>>,
        policy: PortPolicy,
        initial_cluster: Option<String>,
        tail: u32,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            should_quit: false,
            view: View::Nodes,
            nodes: Nodes::new(
                client.clone(),
                Arc::clone(&store),
                policy,
                initial_cluster,
            ),
            workloads: None,
            pod_logs: None,
            browser: None,
            download: None,
            terminal: None,
            resources: None,
            client,
            store,
            download_dir,
            tail,
            tick_rate: Duration::from_millis(100),
        }
    }

    /// Run the application.
    pub async fn run(&mut self) -> Result<()> {
        tui::install_panic_hook();
        let mut terminal = tui::init()?;
        let result = self.main_loop(&mut terminal).await;
        tui::restore()?;
        result
    }

    async fn main_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        // First node fetch before the first frame.
        self.nodes.refresh().await;

        loop {
            terminal.draw(|frame| {
                let area = frame.area();
                match self.view {
                    View::Nodes => {
                        let _ = self.nodes.draw(frame, area);
                    }
                    View::Workloads => {
                        if let Some(workloads) = &mut self.workloads {
                            let _ = workloads.draw(frame, area);
                        }
                    }
                    View::PodLogs => {
                        if let Some(pod_logs) = &mut self.pod_logs {
                            let _ = pod_logs.draw(frame, area);
                        }
                    }
                    View::Browser => {
                        if let Some(browser) = &mut self.browser {
                            let _ = browser.draw(frame, area);
                        }
                    }
                    View::Download => {
                        if let Some(download) = &mut self.download {
                            let _ = download.draw(frame, area);
                        }
                    }
                    View::Terminal => {
                        if let Some(term) = &mut self.terminal {
                            let _ = term.draw(frame, area);
                        }
                    }
                    View::Resources => {
                        if let Some(resources) = &mut self.resources {
                            let _ = resources.draw(frame, area);
                        }
                    }
                }
            })?;

            if event::poll(self.tick_rate)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        let action = match self.view {
                            View::Nodes => self.nodes.handle_key_event(key)?,
                            View::Workloads => {
                                if let Some(workloads) = &mut self.workloads {
                                    workloads.handle_key_event(key)?
                                } else {
                                    None
                                }
                            }
                            View::PodLogs => {
                                if let Some(pod_logs) = &mut self.pod_logs {
                                    pod_logs.handle_key_event(key)?
                                } else {
                                    None
                                }
                            }
                            View::Browser => {
                                if let Some(browser) = &mut self.browser {
                                    browser.handle_key_event(key)?
                                } else {
                                    None
                                }
                            }
                            View::Download => {
                                if let Some(download) = &mut self.download {
                                    download.handle_key_event(key)?
                                } else {
                                    None
                                }
                            }
                            View::Terminal => {
                                if let Some(term) = &mut self.terminal {
                                    term.handle_key_event(key)?
                                } else {
                                    None
                                }
                            }
                            View::Resources => {
                                if let Some(resources) = &mut self.resources {
                                    resources.handle_key_event(key)?
                                } else {
                                    None
                                }
                            }
                        };
                        if let Some(action) = action {
                            self.handle_action(action).await?;
                        }
                    }
                    Event::Resize(w, h) => {
                        self.handle_action(Action::Resize(w, h)).await?;
                    }
                    _ => {}
                }
            } else {
                self.handle_action(Action::Tick).await?;
            }

            if self.should_quit {
                break;
            }
        }

        Ok(())
    }

    async fn handle_action(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Quit => {
                self.should_quit = true;
            }
            Action::Back => {
                match self.view {
                    View::Workloads => {
                        self.workloads = None;
                        self.view = View::Nodes;
                    }
                    View::PodLogs => {
                        self.pod_logs = None;
                        self.view = if self.workloads.is_some() {
                            View::Workloads
                        } else {
                            View::Nodes
                        };
                    }
                    View::Browser => {
                        self.browser = None;
                        self.view = View::Nodes;
                    }
                    View::Download => {
                        // The browser underneath keeps its listing.
                        self.download = None;
                        self.view = if self.browser.is_some() {
                            View::Browser
                        } else {
                            View::Nodes
                        };
                    }
                    View::Terminal => {
                        self.terminal = None;
                        self.view = View::Nodes;
                    }
                    View::Resources => {
                        self.resources = None;
                        self.view = View::Nodes;
                    }
                    View::Nodes => {}
                }
            }
            Action::Tick => {
                match self.view {
                    View::Nodes => {
                        if let Some(next_action) = self.nodes.update(Action::Tick)? {
                            Box::pin(self.handle_action(next_action)).await?;
                        }
                    }
                    View::Workloads => {
                        if let Some(workloads) = &mut self.workloads
                            && let Some(next_action) = workloads.update(Action::Tick)?
                        {
                            Box::pin(self.handle_action(next_action)).await?;
                        }
                    }
                    View::PodLogs => {
                        if let Some(pod_logs) = &mut self.pod_logs
                            && let Some(next_action) = pod_logs.update(Action::Tick)?
                        {
                            Box::pin(self.handle_action(next_action)).await?;
                        }
                    }
                    View::Browser => {
                        if let Some(browser) = &mut self.browser
                            && let Some(next_action) = browser.update(Action::Tick)?
                        {
                            Box::pin(self.handle_action(next_action)).await?;
                        }
                    }
                    View::Download => {
                        if let Some(download) = &mut self.download
                            && let Some(next_action) = download.update(Action::Tick)?
                        {
                            Box::pin(self.handle_action(next_action)).await?;
                        }
                    }
                    View::Terminal => {
                        if let Some(term) = &mut self.terminal
                            && let Some(next_action) = term.update(Action::Tick)?
                        {
                            Box::pin(self.handle_action(next_action)).await?;
                        }
                    }
                    View::Resources => {
                        if let Some(resources) = &mut self.resources
                            && let Some(next_action) = resources.update(Action::Tick)?
                        {
                            Box::pin(self.handle_action(next_action)).await?;
                        }
                    }
                }
            }
            Action::Resize(_w, _h) => {
                // Terminal resizes itself on the next draw.
            }
            Action::Refresh => match self.view {
                View::Nodes => self.nodes.refresh().await,
                View::Workloads => {
                    if let Some(workloads) = &mut self.workloads {
                        workloads.refresh().await;
                    }
                }
                View::PodLogs => {
                    if let Some(pod_logs) = &mut self.pod_logs {
                        pod_logs.refresh().await;
                    }
                }
                View::Browser => {
                    if let Some(browser) = &mut self.browser {
                        browser.refresh().await;
                    }
                }
                View::Download => {
                    if let Some(download) = &mut self.download {
                        download.refresh().await;
                    }
                }
                View::Terminal => {
                    if let Some(term) = &mut self.terminal {
                        term.refresh().await;
                    }
                }
                View::Resources => {
                    if let Some(resources) = &mut self.resources {
                        resources.refresh().await;
                    }
                }
            },
            Action::ShowWorkloads => {
                tracing::info!("viewing cluster workloads");
                let mut workloads = Workloads::new(self.client.clone());
                workloads.refresh().await;
                self.workloads = Some(workloads);
                self.view = View::Workloads;
            }
            Action::ShowPodLogs { pod, namespace } => {
                tracing::info!(pod, namespace, "viewing pod logs");
                let mut pod_logs =
                    PodLogsView::new(self.client.clone(), pod, namespace, self.tail);
                pod_logs.refresh().await;
                self.pod_logs = Some(pod_logs);
                self.view = View::PodLogs;
            }
            Action::ShowBrowser(endpoint) => {
                tracing::info!(ip = %endpoint.ip, port = %endpoint.port, "opening file browser");
                let mut browser = Browser::new(
                    self.client.clone(),
                    endpoint,
                    Arc::clone(&self.store),
                    self.download_dir.clone(),
                );
                browser.refresh().await;
                self.browser = Some(browser);
                self.view = View::Browser;
            }
            Action::ShowDownload { endpoint, root } => {
                tracing::info!(ip = %endpoint.ip, root, "opening folder download");
                let mut download = Download::new(
                    self.client.clone(),
                    endpoint,
                    root,
                    self.download_dir.clone(),
                );
                download.refresh().await;
                self.download = Some(download);
                self.view = View::Download;
            }
            Action::ShowTerminal(endpoint) => {
                tracing::info!(ip = %endpoint.ip, port = %endpoint.port, "opening terminal");
                let mut term =
                    Terminal::new(self.client.clone(), endpoint, Arc::clone(&self.store));
                term.refresh().await;
                self.terminal = Some(term);
                self.view = View::Terminal;
            }
            Action::ShowResources(endpoint) => {
                tracing::info!(ip = %endpoint.ip, port = %endpoint.port, "opening monitor");
                let mut resources =
                    Resources::new(self.client.clone(), endpoint, Arc::clone(&self.store));
                resources.refresh().await;
                self.resources = Some(resources);
                self.view = View::Resources;
            }
            Action::ClearWorkspace(endpoint) => {
                let label = endpoint.label();
                let Some(port) = endpoint.agent_port() else {
                    if let Some(browser) = &mut self.browser {
                        browser.set_error(format!("Invalid agent port '{}'", endpoint.port));
                    }
                    return Ok(());
                };
                audit_start("CLEAR_WORKSPACE", &label, "");
                match self.client.clear_workspace(&endpoint.ip, port).await {
                    Ok(()) => {
                        audit_success("CLEAR_WORKSPACE", &label, "");
                        if let Some(browser) = &mut self.browser {
                            browser.set_status("Workspace cleared");
                            browser.mark_stale();
                        }
                        // Re-list whatever is left.
                        Box::pin(self.handle_action(Action::Refresh)).await?;
                    }
                    Err(err) => {
                        let message = user_message(&err);
                        audit_failure("CLEAR_WORKSPACE", &label, &message);
                        if let Some(browser) = &mut self.browser {
                            browser.set_error(format!("Clear failed: {message}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
