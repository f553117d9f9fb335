//! Per-node agent port persistence.
//!
//! Each node's agent port is stored under `nodePort_<ip>` so every view that
//! targets the node agrees on where to reach it. The backing store is
//! pluggable: the console persists to a JSON file under `~/.volcano-pilot`,
//! tests use an in-memory map. Writes fan out change events over a broadcast
//! channel so open views can follow along; the store itself is last-write-
//! wins and the events are advisory only.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use tokio::sync::broadcast;
use tracing::warn;

use crate::ports::parse_strict;

/// Key namespace for port mappings. Other keys in the same store are left
/// alone, including by [`EndpointStore::clear_all`].
pub const KEY_PREFIX: &str = "nodePort_";

/// A node the console is pointed at: IP plus the agent port to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub ip: String,
    pub port: String,
}

impl Endpoint {
    pub fn new(ip: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            port: port.into(),
        }
    }

    /// Numeric agent port, if the stored string is usable.
    pub fn agent_port(&self) -> Option<u16> {
        parse_strict(&self.port)
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Change notifications emitted by [`EndpointStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    Saved { ip: String, port: String },
    Cleared { removed: usize },
}

/// Minimal key-value surface the endpoint store needs.
pub trait PortStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), String>;
    fn remove(&mut self, key: &str) -> Result<(), String>;
    fn keys(&self) -> Vec<String>;
}

/// In-memory store, used in tests and as a fallback when no home directory
/// is available.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PortStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), String> {
        self.entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// JSON-file-backed store. The whole map is rewritten on every change; the
/// file holds a few dozen entries at most.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Opens the store, tolerating a missing or corrupt file. A corrupt file
    /// is abandoned rather than fatal: losing saved ports only means nodes
    /// fall back to the default port.
    pub fn open(path: PathBuf) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), %err, "port store unreadable, starting empty");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self { path, entries }
    }

    /// Default location: `~/.volcano-pilot/node_ports.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".volcano-pilot").join("node_ports.json"))
    }

    fn persist(&self) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
        let text = serde_json::to_string_pretty(&self.entries).map_err(|err| err.to_string())?;
        fs::write(&self.path, text).map_err(|err| err.to_string())
    }
}

impl PortStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        self.entries.insert(key.to_string(), value.to_string());
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), String> {
        self.entries.remove(key);
        self.persist()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Saved agent ports, keyed by node IP.
pub struct EndpointStore {
    store: Box<dyn PortStore>,
    default_port: String,
    events: broadcast::Sender<PortEvent>,
}

impl EndpointStore {
    pub fn new(store: Box<dyn PortStore>, default_port: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            store,
            default_port: default_port.into(),
            events,
        }
    }

    fn key(ip: &str) -> String {
        format!("{KEY_PREFIX}{ip}")
    }

    pub fn default_port(&self) -> &str {
        &self.default_port
    }

    /// Saves a port for a node, overwriting any previous value, and
    /// broadcasts the change. Callers are expected to have resolved the
    /// port already; this stores what it is given.
    pub fn save(&mut self, ip: &str, port: &str) -> Result<(), String> {
        self.store.set(&Self::key(ip), port)?;
        let _ = self.events.send(PortEvent::Saved {
            ip: ip.to_string(),
            port: port.to_string(),
        });
        Ok(())
    }

    /// Saved port for a node, or the default when none exists.
    pub fn get(&self, ip: &str) -> String {
        self.store
            .get(&Self::key(ip))
            .unwrap_or_else(|| self.default_port.clone())
    }

    /// Whether the node has an explicitly saved port.
    pub fn contains(&self, ip: &str) -> bool {
        self.store.get(&Self::key(ip)).is_some()
    }

    /// Every saved mapping, ip to port.
    pub fn all(&self) -> BTreeMap<String, String> {
        let mut mappings = BTreeMap::new();
        for key in self.store.keys() {
            if let Some(ip) = key.strip_prefix(KEY_PREFIX)
                && let Some(port) = self.store.get(&key)
            {
                mappings.insert(ip.to_string(), port);
            }
        }
        mappings
    }

    /// Removes every saved mapping and reports how many were dropped. Keys
    /// outside the `nodePort_` namespace are untouched.
    pub fn clear_all(&mut self) -> Result<usize, String> {
        let keys: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|key| key.starts_with(KEY_PREFIX))
            .collect();
        for key in &keys {
            self.store.remove(key)?;
        }
        let removed = keys.len();
        let _ = self.events.send(PortEvent::Cleared { removed });
        Ok(removed)
    }

    /// Subscribes to change events. Receivers that lag simply miss events;
    /// views re-read the store on demand anyway.
    pub fn subscribe(&self) -> broadcast::Receiver<PortEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for EndpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointStore")
            .field("default_port", &self.default_port)
            .field("saved", &self.store.keys().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PortPolicy;

    fn memory_store() -> EndpointStore {
        EndpointStore::new(Box::new(MemoryStore::new()), "30081")
    }

    #[test]
    fn save_then_get_round_trips() {
        let mut store = memory_store();
        store.save("10.0.0.5", "30082").unwrap();
        assert_eq!(store.get("10.0.0.5"), "30082");
        assert!(store.contains("10.0.0.5"));
    }

    #[test]
    fn missing_node_gets_the_default() {
        let store = memory_store();
        assert_eq!(store.get("10.0.0.99"), "30081");
        assert!(!store.contains("10.0.0.99"));
    }

    #[test]
    fn save_overwrites() {
        let mut store = memory_store();
        store.save("10.0.0.5", "30081").unwrap();
        store.save("10.0.0.5", "30082").unwrap();
        assert_eq!(store.get("10.0.0.5"), "30082");
    }

    #[test]
    fn all_reports_every_mapping() {
        let mut store = memory_store();
        store.save("10.0.0.1", "1000").unwrap();
        store.save("10.0.0.2", "2000").unwrap();

        let all = store.all();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("10.0.0.1").map(String::as_str), Some("1000"));
        assert_eq!(all.get("10.0.0.2").map(String::as_str), Some("2000"));
    }

    #[test]
    fn clear_all_leaves_foreign_keys_alone() {
        let mut backing = MemoryStore::new();
        backing.set("ui_theme", "dark").unwrap();
        let mut store = EndpointStore::new(Box::new(backing), "30081");
        store.save("10.0.0.1", "1000").unwrap();
        store.save("10.0.0.2", "2000").unwrap();

        let removed = store.clear_all().unwrap();
        assert_eq!(removed, 2);
        assert!(store.all().is_empty());
        assert_eq!(store.store.get("ui_theme").as_deref(), Some("dark"));
    }

    #[test]
    fn saves_broadcast_events() {
        let mut store = memory_store();
        let mut events = store.subscribe();
        store.save("10.0.0.5", "30082").unwrap();
        store.clear_all().unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            PortEvent::Saved {
                ip: "10.0.0.5".to_string(),
                port: "30082".to_string()
            }
        );
        assert_eq!(events.try_recv().unwrap(), PortEvent::Cleared { removed: 1 });
    }

    #[test]
    fn resolved_truncated_port_round_trips_corrected() {
        // An operator saved "3008" through an old frontend; resolving on the
        // way in stores the corrected port and reads return it verbatim.
        let policy = PortPolicy::default();
        let mut store = memory_store();
        let resolved = policy.resolve("3008");
        store.save("10.0.0.5", &resolved).unwrap();
        assert_eq!(store.get("10.0.0.5"), "30082");
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node_ports.json");

        {
            let mut store = EndpointStore::new(Box::new(FileStore::open(path.clone())), "30081");
            store.save("10.0.0.5", "30082").unwrap();
        }

        let store = EndpointStore::new(Box::new(FileStore::open(path)), "30081");
        assert_eq!(store.get("10.0.0.5"), "30082");
    }

    #[test]
    fn file_store_survives_a_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node_ports.json");
        fs::write(&path, "not json at all").unwrap();

        let mut store = EndpointStore::new(Box::new(FileStore::open(path)), "30081");
        assert_eq!(store.get("10.0.0.5"), "30081");
        store.save("10.0.0.5", "30082").unwrap();
        assert_eq!(store.get("10.0.0.5"), "30082");
    }

    #[test]
    fn endpoint_parses_its_port() {
        assert_eq!(Endpoint::new("10.0.0.5", "30081").agent_port(), Some(30081));
        assert_eq!(Endpoint::new("10.0.0.5", "bad").agent_port(), None);
        assert_eq!(Endpoint::new("10.0.0.5", "30081").label(), "10.0.0.5:30081");
    }
}
