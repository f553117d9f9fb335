//! Recursive folder download: enumerate first, then drain.
//!
//! A download runs in two phases. *Prepare* walks the remote tree and builds
//! a complete file manifest; any listing failure aborts the whole phase and
//! discards partial results, so the operator never starts a download that
//! can only half-succeed for structural reasons. *Drain* then fetches the
//! queue in small batches, yielding to the runtime between files so an open
//! transcript or gauge view keeps breathing. One bad file is logged and
//! skipped; it never takes the session down.
//!
//! The session lives behind a mutex shared with the UI. The drivers lock it
//! only in short scopes, never across an await.

use std::collections::VecDeque;
use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::constants::{DOWNLOAD_BATCH_SIZE, MAX_WALK_DEPTH, WALK_YIELD_STRIDE};
use crate::listing::{is_directory_name, join_path};

/// Lists one remote directory. Implementations wrap the gateway client.
pub trait DirLister: Send + Sync {
    fn list(&self, path: &str) -> impl Future<Output = Result<Vec<String>, String>> + Send;
}

/// Fetches one remote file's bytes.
pub trait FileFetcher: Send + Sync {
    fn fetch(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, String>> + Send;
}

/// Receives downloaded files. Writes are small and synchronous.
pub trait DownloadSink: Send {
    /// Stores `bytes` under the remote-relative path, returning where they
    /// landed.
    fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<PathBuf, String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DownloadPhase {
    #[default]
    Idle,
    /// Walking the remote tree.
    Preparing,
    /// Manifest built, waiting for the operator to start.
    Ready,
    Downloading,
    Completed,
    /// Preparation or the session as a whole failed.
    Error(String),
}

impl DownloadPhase {
    /// Whether a new prepare or start may be issued.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            DownloadPhase::Idle | DownloadPhase::Completed | DownloadPhase::Error(_)
        )
    }
}

/// One file discovered by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub name: String,
    /// Path relative to the workspace root.
    pub path: String,
    pub downloaded: bool,
}

/// Shared state of one folder download.
#[derive(Debug, Default)]
pub struct DownloadSession {
    pub root: String,
    pub phase: DownloadPhase,
    /// Every file found by the walk, in discovery order.
    pub files: Vec<DownloadItem>,
    /// Indices into `files` still waiting to be fetched.
    pub queue: VecDeque<usize>,
    /// Path currently being fetched, for display.
    pub current: Option<String>,
    pub failed: usize,
}

impl DownloadSession {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.files.len()
    }

    pub fn downloaded(&self) -> usize {
        self.files.iter().filter(|item| item.downloaded).count()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// Fraction of the manifest handled (downloaded or failed), 0 to 1.
    pub fn progress_ratio(&self) -> f64 {
        if self.files.is_empty() {
            return 0.0;
        }
        let handled = self.downloaded() + self.failed;
        handled as f64 / self.files.len() as f64
    }

    /// Aborts the session from any phase: the queue is dropped and the
    /// drivers stop at their next phase check. Already-saved files stay on
    /// disk.
    pub fn cancel(&mut self) {
        self.queue.clear();
        self.files.clear();
        self.current = None;
        self.failed = 0;
        self.phase = DownloadPhase::Idle;
    }
}

/// Walks the remote tree depth-first and returns the flat file manifest in
/// discovery order. Yields to the runtime every [`WALK_YIELD_STRIDE`]
/// siblings. Fails on the first listing error or when the tree nests deeper
/// than [`MAX_WALK_DEPTH`].
pub async fn collect_files<L: DirLister>(lister: &L, root: &str) -> Result<Vec<DownloadItem>, String> {
    let mut files = Vec::new();
    walk(lister, root, 0, &mut files).await?;
    Ok(files)
}

fn walk<'a, L: DirLister>(
    lister: &'a L,
    path: &'a str,
    depth: usize,
    out: &'a mut Vec<DownloadItem>,
) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>> {
    Box::pin(async move {
        if depth > MAX_WALK_DEPTH {
            return Err(format!(
                "directory tree deeper than {MAX_WALK_DEPTH} levels at '{path}', aborting walk"
            ));
        }
        let names = lister.list(path).await?;
        for (index, name) in names.into_iter().enumerate() {
            if index % WALK_YIELD_STRIDE == 0 {
                tokio::task::yield_now().await;
            }
            let child = join_path(path, &name);
            if is_directory_name(&name) {
                walk(lister, &child, depth + 1, out).await?;
            } else {
                out.push(DownloadItem {
                    name,
                    path: child,
                    downloaded: false,
                });
            }
        }
        Ok(())
    })
}

/// Runs the prepare phase against the session's root. An empty tree
/// completes the session immediately; a failed walk discards everything it
/// found.
pub async fn prepare_session<L: DirLister>(session: &Mutex<DownloadSession>, lister: &L) {
    let root = {
        let mut s = session.lock().unwrap();
        if s.phase == DownloadPhase::Preparing || s.phase == DownloadPhase::Downloading {
            return;
        }
        s.phase = DownloadPhase::Preparing;
        s.files.clear();
        s.queue.clear();
        s.failed = 0;
        s.root.clone()
    };

    match collect_files(lister, &root).await {
        Ok(files) if files.is_empty() => {
            let mut s = session.lock().unwrap();
            if s.phase != DownloadPhase::Preparing {
                return;
            }
            s.phase = DownloadPhase::Completed;
            debug!(root = %s.root, "empty folder, nothing to download");
        }
        Ok(files) => {
            let mut s = session.lock().unwrap();
            if s.phase != DownloadPhase::Preparing {
                // Cancelled mid-walk; the manifest is already moot.
                return;
            }
            s.queue = (0..files.len()).collect();
            s.files = files;
            s.phase = DownloadPhase::Ready;
            debug!(root = %s.root, files = s.files.len(), "manifest ready");
        }
        Err(err) => {
            let mut s = session.lock().unwrap();
            if s.phase != DownloadPhase::Preparing {
                return;
            }
            s.files.clear();
            s.queue.clear();
            s.phase = DownloadPhase::Error(err);
        }
    }
}

/// Runs the drain phase: batches of [`DOWNLOAD_BATCH_SIZE`], one file at a
/// time, yielding after each. Only starts from [`DownloadPhase::Ready`].
/// Per-file failures are counted and skipped; the session completes when
/// the queue empties.
pub async fn drain_session<F, S>(session: &Mutex<DownloadSession>, fetcher: &F, sink: &mut S)
where
    F: FileFetcher,
    S: DownloadSink,
{
    {
        let mut s = session.lock().unwrap();
        if s.phase != DownloadPhase::Ready {
            return;
        }
        s.phase = DownloadPhase::Downloading;
    }

    loop {
        for _ in 0..DOWNLOAD_BATCH_SIZE {
            let next = {
                let mut s = session.lock().unwrap();
                if s.phase != DownloadPhase::Downloading {
                    return;
                }
                match s.queue.pop_front() {
                    Some(index) => {
                        let path = s.files[index].path.clone();
                        s.current = Some(path.clone());
                        Some((index, path))
                    }
                    None => None,
                }
            };

            let Some((index, path)) = next else {
                let mut s = session.lock().unwrap();
                s.current = None;
                if s.phase == DownloadPhase::Downloading {
                    s.phase = DownloadPhase::Completed;
                    debug!(root = %s.root, downloaded = s.downloaded(), failed = s.failed, "download complete");
                }
                return;
            };

            match fetcher.fetch(&path).await {
                Ok(bytes) => match sink.write(&path, &bytes) {
                    Ok(dest) => {
                        let mut s = session.lock().unwrap();
                        if s.phase != DownloadPhase::Downloading {
                            return;
                        }
                        s.files[index].downloaded = true;
                        debug!(path = %path, dest = %dest.display(), "saved");
                    }
                    Err(err) => {
                        let mut s = session.lock().unwrap();
                        if s.phase != DownloadPhase::Downloading {
                            return;
                        }
                        s.failed += 1;
                        warn!(path = %path, %err, "could not save file, skipping");
                    }
                },
                Err(err) => {
                    let mut s = session.lock().unwrap();
                    if s.phase != DownloadPhase::Downloading {
                        return;
                    }
                    s.failed += 1;
                    warn!(path = %path, %err, "could not fetch file, skipping");
                }
            }

            tokio::task::yield_now().await;
        }
    }
}

/// Sink writing under a base directory, mirroring the remote layout. Name
/// collisions get a ` (n)` suffix instead of overwriting.
#[derive(Debug)]
pub struct FsSink {
    base: PathBuf,
}

impl FsSink {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &PathBuf {
        &self.base
    }
}

fn unique_path(path: PathBuf) -> PathBuf {
    if !path.exists() {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path.extension().map(|e| e.to_string_lossy().into_owned());
    let parent = path.parent().map(PathBuf::from).unwrap_or_default();
    for n in 1.. {
        let candidate = match &extension {
            Some(ext) => parent.join(format!("{stem} ({n}).{ext}")),
            None => parent.join(format!("{stem} ({n})")),
        };
        if !candidate.exists() {
            return candidate;
        }
    }
    unreachable!("candidate space is unbounded")
}

impl DownloadSink for FsSink {
    fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<PathBuf, String> {
        let mut dest = self.base.clone();
        // Remote names must not escape the base directory.
        for part in relative_path
            .split('/')
            .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        {
            dest.push(part);
        }
        if dest == self.base {
            return Err(format!("unusable remote path '{relative_path}'"));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|err| err.to_string())?;
        }
        let dest = unique_path(dest);
        fs::write(&dest, bytes).map_err(|err| err.to_string())?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;

    /// Lister over a fixed path -> names map.
    struct TreeLister {
        dirs: HashMap<String, Vec<String>>,
    }

    impl TreeLister {
        fn new(dirs: &[(&str, &[&str])]) -> Self {
            let dirs = dirs
                .iter()
                .map(|(path, names)| {
                    (
                        path.to_string(),
                        names.iter().map(|n| n.to_string()).collect(),
                    )
                })
                .collect();
            Self { dirs }
        }
    }

    impl DirLister for TreeLister {
        async fn list(&self, path: &str) -> Result<Vec<String>, String> {
            self.dirs
                .get(path)
                .cloned()
                .ok_or_else(|| format!("no such directory: {path}"))
        }
    }

    /// Lister that always returns one more directory, simulating a cycle.
    struct EndlessLister;

    impl DirLister for EndlessLister {
        async fn list(&self, _path: &str) -> Result<Vec<String>, String> {
            Ok(vec!["loop".to_string()])
        }
    }

    /// Fetcher that fails for selected paths.
    struct FlakyFetcher {
        fail: Vec<String>,
    }

    impl FileFetcher for FlakyFetcher {
        async fn fetch(&self, path: &str) -> Result<Vec<u8>, String> {
            if self.fail.iter().any(|bad| bad == path) {
                Err(format!("connection reset fetching {path}"))
            } else {
                Ok(path.as_bytes().to_vec())
            }
        }
    }

    #[derive(Default)]
    struct MemorySink {
        saved: BTreeMap<String, Vec<u8>>,
    }

    impl DownloadSink for MemorySink {
        fn write(&mut self, relative_path: &str, bytes: &[u8]) -> Result<PathBuf, String> {
            self.saved.insert(relative_path.to_string(), bytes.to_vec());
            Ok(PathBuf::from(relative_path))
        }
    }

    fn workspace_lister() -> TreeLister {
        TreeLister::new(&[
            ("workspace", &["run1", "output.log"]),
            ("workspace/run1", &["model.pt", "metrics.json", "logs"]),
            ("workspace/run1/logs", &["train.log"]),
        ])
    }

    #[tokio::test]
    async fn walk_is_depth_first_in_listing_order() {
        let files = collect_files(&workspace_lister(), "workspace").await.unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            [
                "workspace/run1/model.pt",
                "workspace/run1/metrics.json",
                "workspace/run1/logs/train.log",
                "workspace/output.log",
            ]
        );
    }

    #[tokio::test]
    async fn empty_tree_completes_without_downloading() {
        let lister = TreeLister::new(&[("empty", &[])]);
        let session = Mutex::new(DownloadSession::new("empty"));

        prepare_session(&session, &lister).await;

        let s = session.lock().unwrap();
        assert_eq!(s.phase, DownloadPhase::Completed);
        assert_eq!(s.total(), 0);
        assert_eq!(s.downloaded(), 0);
    }

    #[tokio::test]
    async fn failed_walk_discards_partial_results() {
        // run1 lists fine, logs is missing, so the walk has already found
        // files before it fails.
        let lister = TreeLister::new(&[
            ("workspace", &["run1"]),
            ("workspace/run1", &["model.pt", "logs"]),
        ]);
        let session = Mutex::new(DownloadSession::new("workspace"));

        prepare_session(&session, &lister).await;

        let s = session.lock().unwrap();
        assert!(matches!(s.phase, DownloadPhase::Error(_)));
        assert!(s.files.is_empty());
        assert!(s.queue.is_empty());
    }

    #[tokio::test]
    async fn runaway_nesting_is_cut_off() {
        let session = Mutex::new(DownloadSession::new("loop"));
        prepare_session(&session, &EndlessLister).await;

        let s = session.lock().unwrap();
        match &s.phase {
            DownloadPhase::Error(message) => assert!(message.contains("deeper than")),
            other => panic!("expected an error phase, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn one_bad_file_is_skipped_not_fatal() {
        let session = Mutex::new(DownloadSession::new("workspace"));
        prepare_session(&session, &workspace_lister()).await;
        assert_eq!(session.lock().unwrap().phase, DownloadPhase::Ready);

        let fetcher = FlakyFetcher {
            fail: vec!["workspace/run1/metrics.json".to_string()],
        };
        let mut sink = MemorySink::default();
        drain_session(&session, &fetcher, &mut sink).await;

        let s = session.lock().unwrap();
        assert_eq!(s.phase, DownloadPhase::Completed);
        assert_eq!(s.failed, 1);
        assert_eq!(s.downloaded(), 3);
        assert_eq!(s.remaining(), 0);
        assert!(!sink.saved.contains_key("workspace/run1/metrics.json"));
        assert!(sink.saved.contains_key("workspace/run1/model.pt"));
    }

    #[tokio::test]
    async fn drain_only_starts_from_ready() {
        let session = Mutex::new(DownloadSession::new("workspace"));
        let fetcher = FlakyFetcher { fail: vec![] };
        let mut sink = MemorySink::default();

        drain_session(&session, &fetcher, &mut sink).await;

        let s = session.lock().unwrap();
        assert_eq!(s.phase, DownloadPhase::Idle);
        assert!(sink.saved.is_empty());
    }

    #[tokio::test]
    async fn cancel_clears_the_queue_and_resets() {
        let session = Mutex::new(DownloadSession::new("workspace"));
        prepare_session(&session, &workspace_lister()).await;

        {
            let mut s = session.lock().unwrap();
            assert_eq!(s.phase, DownloadPhase::Ready);
            s.cancel();
            assert_eq!(s.phase, DownloadPhase::Idle);
            assert_eq!(s.remaining(), 0);
            assert_eq!(s.total(), 0);
        }

        // A drain issued after cancellation does nothing.
        let fetcher = FlakyFetcher { fail: vec![] };
        let mut sink = MemorySink::default();
        drain_session(&session, &fetcher, &mut sink).await;
        assert!(sink.saved.is_empty());
    }

    #[tokio::test]
    async fn cancel_during_drain_stops_the_driver() {
        let session = Arc::new(Mutex::new(DownloadSession::new("workspace")));
        prepare_session(session.as_ref(), &workspace_lister()).await;

        // Cancel as soon as the first file lands.
        struct CancellingFetcher {
            session: Arc<Mutex<DownloadSession>>,
        }
        impl FileFetcher for CancellingFetcher {
            async fn fetch(&self, path: &str) -> Result<Vec<u8>, String> {
                self.session.lock().unwrap().cancel();
                Ok(path.as_bytes().to_vec())
            }
        }

        let fetcher = CancellingFetcher {
            session: session.clone(),
        };
        let mut sink = MemorySink::default();
        drain_session(session.as_ref(), &fetcher, &mut sink).await;

        let s = session.lock().unwrap();
        assert_eq!(s.phase, DownloadPhase::Idle);
        // The in-flight file's result was discarded.
        assert!(sink.saved.is_empty());
    }

    #[test]
    fn progress_ratio_counts_failures_as_handled() {
        let mut session = DownloadSession::new("workspace");
        session.files = vec![
            DownloadItem {
                name: "a.txt".to_string(),
                path: "w/a.txt".to_string(),
                downloaded: true,
            },
            DownloadItem {
                name: "b.txt".to_string(),
                path: "w/b.txt".to_string(),
                downloaded: false,
            },
        ];
        session.failed = 1;
        assert_eq!(session.progress_ratio(), 1.0);
        assert_eq!(DownloadSession::new("x").progress_ratio(), 0.0);
    }

    #[test]
    fn fs_sink_mirrors_layout_and_dodges_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::new(dir.path().to_path_buf());

        let first = sink.write("workspace/run1/out.log", b"one").unwrap();
        assert_eq!(first, dir.path().join("workspace/run1/out.log"));
        assert_eq!(fs::read(&first).unwrap(), b"one");

        let second = sink.write("workspace/run1/out.log", b"two").unwrap();
        assert_eq!(second, dir.path().join("workspace/run1/out (1).log"));

        // Traversal components are stripped, not honored.
        let escaped = sink.write("../../etc/passwd", b"nope").unwrap();
        assert!(escaped.starts_with(dir.path()));
    }

    #[test]
    fn fs_sink_rejects_paths_that_reduce_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FsSink::new(dir.path().to_path_buf());
        assert!(sink.write("..", b"x").is_err());
    }
}
