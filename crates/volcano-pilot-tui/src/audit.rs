//! Append-only audit trail for operator actions that touch nodes.
//!
//! Commands, interrupts, workspace wipes, and folder downloads all land in
//! `~/.volcano-pilot/audit.log`, one line each. Audit writes must never take
//! the console down, so failures are logged and swallowed.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditResult {
    Started,
    Success,
    Failure,
    Cancelled,
}

impl std::fmt::Display for AuditResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuditResult::Started => "STARTED",
            AuditResult::Success => "SUCCESS",
            AuditResult::Failure => "FAILURE",
            AuditResult::Cancelled => "CANCELLED",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: String,
    pub user: String,
    pub operation: String,
    /// `ip:port` of the node involved, or `-` for console-wide actions.
    pub target: String,
    pub result: AuditResult,
    pub details: String,
}

impl AuditEntry {
    fn new(operation: &str, target: &str, result: AuditResult, details: &str) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            user: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
            operation: operation.to_string(),
            target: if target.is_empty() {
                "-".to_string()
            } else {
                target.to_string()
            },
            result,
            details: details.to_string(),
        }
    }

    fn to_line(&self) -> String {
        format!(
            "[{}] [{}] [{}] [{}] [{}] {}",
            self.timestamp, self.user, self.operation, self.target, self.result, self.details
        )
    }
}

#[derive(Debug)]
pub struct AuditLogger {
    path: PathBuf,
}

impl AuditLogger {
    /// Logger at the default location, or `None` without a home directory.
    pub fn new() -> Option<Self> {
        let home = dirs_next::home_dir()?;
        Some(Self {
            path: home.join(".volcano-pilot").join("audit.log"),
        })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, entry: &AuditEntry) {
        if let Err(err) = self.append(entry) {
            warn!(%err, path = %self.path.display(), "audit log write failed");
        }
    }

    fn append(&self, entry: &AuditEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", entry.to_line())
    }
}

static AUDIT: OnceLock<Mutex<Option<AuditLogger>>> = OnceLock::new();

fn slot() -> &'static Mutex<Option<AuditLogger>> {
    AUDIT.get_or_init(|| Mutex::new(None))
}

/// Installs the process-wide audit logger. Until this runs, audit calls are
/// no-ops.
pub fn init(logger: AuditLogger) {
    if let Ok(mut guard) = slot().lock() {
        *guard = Some(logger);
    }
}

fn record(operation: &str, target: &str, result: AuditResult, details: &str) {
    if let Ok(guard) = slot().lock()
        && let Some(logger) = guard.as_ref()
    {
        logger.log(&AuditEntry::new(operation, target, result, details));
    }
}

pub fn audit_start(operation: &str, target: &str, details: &str) {
    record(operation, target, AuditResult::Started, details);
}

pub fn audit_success(operation: &str, target: &str, details: &str) {
    record(operation, target, AuditResult::Success, details);
}

pub fn audit_failure(operation: &str, target: &str, details: &str) {
    record(operation, target, AuditResult::Failure, details);
}

pub fn audit_cancelled(operation: &str, target: &str, details: &str) {
    record(operation, target, AuditResult::Cancelled, details);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_render_uppercase() {
        assert_eq!(AuditResult::Started.to_string(), "STARTED");
        assert_eq!(AuditResult::Success.to_string(), "SUCCESS");
        assert_eq!(AuditResult::Failure.to_string(), "FAILURE");
        assert_eq!(AuditResult::Cancelled.to_string(), "CANCELLED");
    }

    #[test]
    fn entries_render_every_field() {
        let entry = AuditEntry::new(
            "EXEC_COMMAND",
            "10.0.0.5:30081",
            AuditResult::Success,
            "nvidia-smi",
        );
        let line = entry.to_line();
        assert!(line.contains("[EXEC_COMMAND]"));
        assert!(line.contains("[10.0.0.5:30081]"));
        assert!(line.contains("[SUCCESS]"));
        assert!(line.ends_with("nvidia-smi"));
    }

    #[test]
    fn empty_target_renders_as_dash() {
        let entry = AuditEntry::new("CLEAR_PORTS", "", AuditResult::Success, "3 removed");
        assert!(entry.to_line().contains("[-]"));
    }

    #[test]
    fn logger_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let logger = AuditLogger::with_path(path.clone());

        logger.log(&AuditEntry::new(
            "CLEAR_WORKSPACE",
            "10.0.0.5:30081",
            AuditResult::Started,
            "",
        ));
        logger.log(&AuditEntry::new(
            "CLEAR_WORKSPACE",
            "10.0.0.5:30081",
            AuditResult::Success,
            "",
        ));

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("[STARTED]"));
        assert!(lines[1].contains("[SUCCESS]"));
    }
}
