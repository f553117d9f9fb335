//! Shared constants for session behavior and UI defaults.

/// Agent port assumed when a node has no saved mapping.
pub use gateway_rs::DEFAULT_AGENT_PORT;

/// How many transcript commands the recall history keeps.
pub const COMMAND_HISTORY_CAP: usize = 50;

/// Lines requested from the agent log endpoint by default.
pub const DEFAULT_LOG_TAIL: u32 = 50;

/// During a folder walk, yield back to the runtime after this many siblings.
pub const WALK_YIELD_STRIDE: usize = 25;

/// Files drained from the download queue per batch.
pub const DOWNLOAD_BATCH_SIZE: usize = 5;

/// Recursion limit for folder walks. Remote listings can alias themselves
/// (bind mounts, symlink loops), so walks must not trust the tree to be
/// finite.
pub const MAX_WALK_DEPTH: usize = 64;

/// Entries shown per browser page, operator-selectable.
pub const PAGE_SIZE_CHOICES: &[usize] = &[50, 100, 200];

/// Browser page size before the operator picks one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Selectable polling cadences, in seconds.
pub mod poll_intervals {
    /// Transcript log polling.
    pub const LOG_CHOICES: &[u64] = &[1, 2, 5, 10];

    /// Resource gauge polling.
    pub const RESOURCE_CHOICES: &[u64] = &[2, 5, 10, 30];

    /// Node table auto-refresh.
    pub const NODES_SECS: u64 = 10;

    /// Workload tables auto-refresh.
    pub const WORKLOADS_SECS: u64 = 10;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_default_is_a_choice() {
        assert!(PAGE_SIZE_CHOICES.contains(&DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn choices_are_ascending() {
        let mut sorted = PAGE_SIZE_CHOICES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, PAGE_SIZE_CHOICES);

        let mut logs = poll_intervals::LOG_CHOICES.to_vec();
        logs.sort_unstable();
        assert_eq!(logs, poll_intervals::LOG_CHOICES);
    }

    #[test]
    fn batching_constants_are_sane() {
        assert!(DOWNLOAD_BATCH_SIZE > 0);
        assert!(WALK_YIELD_STRIDE > 0);
        assert!(MAX_WALK_DEPTH > 0);
    }
}
