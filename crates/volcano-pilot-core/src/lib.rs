//! Core session logic for volcano-pilot.
//!
//! Everything in this crate is UI-free and owns no sockets: the gateway
//! client lives in `gateway-rs`, rendering lives in `volcano-pilot-tui`.
//! What lives here is the behavior that has to be exactly right regardless
//! of how it is drawn:
//!
//! - [`ports`]: resolving raw agent-port input, including the correction
//!   table for historically mangled values
//! - [`endpoints`]: saved per-node ports with change broadcasts
//! - [`listing`] and [`browse`]: directory classification, ordering,
//!   history, pagination, and search
//! - [`download`]: the two-phase recursive folder downloader
//! - [`transcript`]: the remote-terminal transcript and recall history
//! - [`asyncview`]: request bookkeeping with staleness protection

pub mod asyncview;
pub mod browse;
pub mod constants;
pub mod download;
pub mod endpoints;
pub mod errors;
pub mod format;
pub mod listing;
pub mod ports;
pub mod selection;
pub mod transcript;

pub use asyncview::{AsyncView, RefreshCadence};
pub use browse::BrowserSession;
pub use download::{
    DirLister, DownloadItem, DownloadPhase, DownloadSession, DownloadSink, FileFetcher, FsSink,
};
pub use endpoints::{Endpoint, EndpointStore, FileStore, MemoryStore, PortEvent, PortStore};
pub use errors::{ErrorCategory, categorize, user_message};
pub use listing::{DirectoryEntry, EntryKind};
pub use ports::PortPolicy;
pub use selection::ListCursor;
pub use transcript::{CommandHistory, LineKind, Transcript, TranscriptLine};
