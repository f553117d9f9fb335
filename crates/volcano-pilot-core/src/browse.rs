//! Browsing session: current path, history, pagination, and search.
//!
//! The session tracks *where* the operator is; fetching is the caller's job.
//! Navigation is a two-step handshake: compute a target with
//! [`BrowserSession::enter_target`] or [`BrowserSession::back_target`], fetch
//! it, then hand the result to [`BrowserSession::apply_listing`]. History is
//! only pushed when the applied path actually differs from the current one,
//! so refreshing a directory never stacks duplicate entries.

use crate::constants::{DEFAULT_PAGE_SIZE, PAGE_SIZE_CHOICES};
use crate::listing::{self, DirectoryEntry};

#[derive(Debug, Clone)]
pub struct BrowserSession {
    current_path: String,
    history: Vec<String>,
    entries: Vec<DirectoryEntry>,
    page: usize,
    page_size: usize,
    search: String,
}

impl Default for BrowserSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserSession {
    pub fn new() -> Self {
        Self {
            current_path: String::new(),
            history: Vec::new(),
            entries: Vec::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            search: String::new(),
        }
    }

    /// Clears everything except the page-size preference. Used when the
    /// browser is (re)opened against an endpoint.
    pub fn reset(&mut self) {
        self.current_path.clear();
        self.history.clear();
        self.entries.clear();
        self.page = 1;
        self.search.clear();
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// All loaded entries, in display order.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Path to fetch when descending into `name` from here.
    pub fn enter_target(&self, name: &str) -> String {
        listing::join_path(&self.current_path, name)
    }

    /// Pops one history entry and makes it current, returning the path to
    /// re-fetch. The switch happens now, not when the listing arrives, so
    /// the follow-up [`Self::apply_listing`] sees a same-path refresh and
    /// pushes nothing. Returns `None` at the root of the session.
    pub fn back_target(&mut self) -> Option<String> {
        let previous = self.history.pop()?;
        self.current_path = previous.clone();
        Some(previous)
    }

    /// Installs a fetched listing. If `path` differs from the current path
    /// this is a navigation and the old path is pushed onto history;
    /// otherwise it is a refresh. Entries are sorted for display and the
    /// view snaps back to page 1.
    pub fn apply_listing(&mut self, path: &str, mut entries: Vec<DirectoryEntry>) {
        listing::sort_entries(&mut entries);
        if path != self.current_path {
            let previous = std::mem::replace(&mut self.current_path, path.to_string());
            self.history.push(previous);
        }
        self.entries = entries;
        self.page = 1;
    }

    /// Case-insensitive substring filter over loaded entries. Setting a new
    /// query snaps back to page 1.
    pub fn set_search(&mut self, query: &str) {
        if query != self.search {
            self.search = query.to_string();
            self.page = 1;
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    /// Entries passing the current filter, in display order.
    pub fn filtered(&self) -> Vec<&DirectoryEntry> {
        if self.search.is_empty() {
            return self.entries.iter().collect();
        }
        let needle = self.search.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| entry.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered().len()
    }

    /// Number of pages under the current filter, at least 1.
    pub fn page_count(&self) -> usize {
        let len = self.filtered_len();
        if len == 0 { 1 } else { len.div_ceil(self.page_size) }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Jumps to a page, clamped into `1..=page_count`.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.page_count());
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.page.saturating_sub(1).max(1));
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Switches page size and snaps back to page 1. Sizes outside the menu
    /// are ignored.
    pub fn set_page_size(&mut self, size: usize) {
        if PAGE_SIZE_CHOICES.contains(&size) && size != self.page_size {
            self.page_size = size;
            self.page = 1;
        }
    }

    /// Rotates through the page-size menu.
    pub fn cycle_page_size(&mut self) {
        let at = PAGE_SIZE_CHOICES
            .iter()
            .position(|&size| size == self.page_size)
            .unwrap_or(0);
        let next = PAGE_SIZE_CHOICES[(at + 1) % PAGE_SIZE_CHOICES.len()];
        self.page_size = next;
        self.page = 1;
    }

    /// The slice of filtered entries on the current page.
    pub fn page_entries(&self) -> Vec<&DirectoryEntry> {
        let start = (self.page - 1) * self.page_size;
        self.filtered()
            .into_iter()
            .skip(start)
            .take(self.page_size)
            .collect()
    }
}
