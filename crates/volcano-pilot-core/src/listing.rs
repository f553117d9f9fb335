//! Remote directory listings: classification and display ordering.
//!
//! Node agents return bare name lists with no type information, so entries
//! are classified by [`is_directory_name`]. The heuristic is shared with the
//! workspace tooling that writes these trees: artifact directories are named
//! without extensions (`run1`, `checkpoints`) while files carry one
//! (`output.log`, `model.pt`).

use std::cmp::Ordering;

/// Whether a bare entry name refers to a directory.
///
/// A name with no `.` anywhere is treated as a directory. Dotted directory
/// names (`v1.2`) are misclassified as files; selecting one simply fails to
/// download and costs nothing, which is why the cheap heuristic has stuck.
pub fn is_directory_name(name: &str) -> bool {
    !name.contains('.')
}

/// Joins a parent path and entry name. The root path is the empty string and
/// never contributes a separator.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Last path segment, used to name single-file downloads.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
}

/// One entry of a remote listing, classified and rooted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    /// Full path relative to the workspace root.
    pub path: String,
    pub kind: EntryKind,
}

impl DirectoryEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Classifies raw agent names into entries rooted at `parent`.
pub fn classify(parent: &str, names: Vec<String>) -> Vec<DirectoryEntry> {
    names
        .into_iter()
        .map(|name| {
            let kind = if is_directory_name(&name) {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let path = join_path(parent, &name);
            DirectoryEntry { name, path, kind }
        })
        .collect()
}

/// Sorts for display: directories first, then files, each group in
/// case-sensitive lexicographic order. Case-sensitive is deliberate; it
/// matches what operators see from `ls` on the node itself.
pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| match (a.kind, b.kind) {
        (EntryKind::Directory, EntryKind::File) => Ordering::Less,
        (EntryKind::File, EntryKind::Directory) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[DirectoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn directories_sort_before_files() {
        let mut entries = classify(
            "",
            vec!["b.txt".to_string(), "a".to_string(), "c.yaml".to_string()],
        );
        sort_entries(&mut entries);
        assert_eq!(names(&entries), ["a", "b.txt", "c.yaml"]);
    }

    #[test]
    fn each_group_is_ordered_internally() {
        let mut entries = classify(
            "",
            vec![
                "zeta".to_string(),
                "omega.log".to_string(),
                "alpha".to_string(),
                "beta.log".to_string(),
            ],
        );
        sort_entries(&mut entries);
        assert_eq!(names(&entries), ["alpha", "zeta", "beta.log", "omega.log"]);
    }

    #[test]
    fn ordering_is_case_sensitive() {
        // Byte order: uppercase sorts ahead of lowercase.
        let mut entries = classify("", vec!["analysis".to_string(), "Results".to_string()]);
        sort_entries(&mut entries);
        assert_eq!(names(&entries), ["Results", "analysis"]);
    }

    #[test]
    fn classification_follows_the_dot_heuristic() {
        assert!(is_directory_name("checkpoints"));
        assert!(is_directory_name("run1"));
        assert!(!is_directory_name("output.log"));
        assert!(!is_directory_name("archive.tar.gz"));
        // Known limitation: dotted directory names read as files.
        assert!(!is_directory_name("v1.2"));
    }

    #[test]
    fn paths_are_rooted_at_the_parent() {
        let entries = classify("workspace/run1", vec!["result.json".to_string()]);
        assert_eq!(entries[0].path, "workspace/run1/result.json");

        let entries = classify("", vec!["workspace".to_string()]);
        assert_eq!(entries[0].path, "workspace");
    }

    #[test]
    fn file_name_takes_the_last_segment() {
        assert_eq!(file_name_of("workspace/run1/output.log"), "output.log");
        assert_eq!(file_name_of("output.log"), "output.log");
    }
}
