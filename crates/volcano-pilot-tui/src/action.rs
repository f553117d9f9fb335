//! Actions flowing from components back to the app loop.

use volcano_pilot_core::Endpoint;

/// What a component wants the app to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // App lifecycle
    Quit,
    Back,
    Tick,
    Resize(u16, u16),

    /// Re-run the active component's fetch cycle.
    Refresh,

    // View transitions; node-scoped views carry their target with them.
    ShowWorkloads,
    ShowPodLogs {
        pod: String,
        namespace: String,
    },
    ShowBrowser(Endpoint),
    ShowDownload {
        endpoint: Endpoint,
        root: String,
    },
    ShowTerminal(Endpoint),
    ShowResources(Endpoint),

    /// Wipe the agent workspace after the browser confirmed it.
    ClearWorkspace(Endpoint),
}
