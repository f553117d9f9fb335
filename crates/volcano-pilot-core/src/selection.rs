//! Cursor state for rendered lists and tables.
//!
//! Views here recompute their visible rows every frame (filters, pages,
//! polls), so the cursor deliberately owns no items. It just tracks a
//! position against a length, clamping instead of wrapping: reaching for
//! the row past the last one should stop, not teleport.

#[derive(Debug, Clone, Copy, Default)]
pub struct ListCursor {
    pos: usize,
    len: usize,
}

impl ListCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Re-homes the cursor after the underlying rows changed.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        if self.pos >= len {
            self.pos = len.saturating_sub(1);
        }
    }

    pub fn up(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }

    pub fn down(&mut self) {
        if self.pos + 1 < self.len {
            self.pos += 1;
        }
    }

    pub fn page_up(&mut self, step: usize) {
        self.pos = self.pos.saturating_sub(step);
    }

    pub fn page_down(&mut self, step: usize) {
        if self.len == 0 {
            return;
        }
        self.pos = (self.pos + step).min(self.len - 1);
    }

    pub fn home(&mut self) {
        self.pos = 0;
    }

    pub fn end(&mut self) {
        self.pos = self.len.saturating_sub(1);
    }

    /// Jumps to an absolute position, clamped into range.
    pub fn select(&mut self, pos: usize) {
        if self.len == 0 {
            self.pos = 0;
        } else {
            self.pos = pos.min(self.len - 1);
        }
    }

    /// The row under the cursor, if any.
    pub fn selected<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        items.get(self.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_clamps_at_both_ends() {
        let mut cursor = ListCursor::new();
        cursor.set_len(3);

        cursor.up();
        assert_eq!(cursor.pos(), 0);

        cursor.down();
        cursor.down();
        cursor.down();
        assert_eq!(cursor.pos(), 2);
    }

    #[test]
    fn shrinking_rows_pull_the_cursor_back() {
        let mut cursor = ListCursor::new();
        cursor.set_len(10);
        cursor.end();
        assert_eq!(cursor.pos(), 9);

        cursor.set_len(4);
        assert_eq!(cursor.pos(), 3);

        cursor.set_len(0);
        assert_eq!(cursor.pos(), 0);
        assert!(cursor.is_empty());
    }

    #[test]
    fn paging_moves_by_step_within_bounds() {
        let mut cursor = ListCursor::new();
        cursor.set_len(25);

        cursor.page_down(10);
        assert_eq!(cursor.pos(), 10);
        cursor.page_down(10);
        cursor.page_down(10);
        assert_eq!(cursor.pos(), 24);

        cursor.page_up(10);
        assert_eq!(cursor.pos(), 14);
        cursor.page_up(100);
        assert_eq!(cursor.pos(), 0);
    }

    #[test]
    fn selected_reads_through_to_the_items() {
        let mut cursor = ListCursor::new();
        let items = ["a", "b", "c"];
        cursor.set_len(items.len());
        cursor.down();
        assert_eq!(cursor.selected(&items), Some(&"b"));

        cursor.set_len(0);
        let empty: [&str; 0] = [];
        assert_eq!(cursor.selected(&empty), None);
    }

    #[test]
    fn select_clamps_like_everything_else() {
        let mut cursor = ListCursor::new();
        cursor.set_len(5);
        cursor.select(99);
        assert_eq!(cursor.pos(), 4);
        cursor.select(2);
        assert_eq!(cursor.pos(), 2);
    }
}
