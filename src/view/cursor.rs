use indexmap::IndexSet;

use crate::view::projection::VisibleRow;

/// Selection over the visible rows. `index` is `Some` exactly when there
/// are rows to point at; `selected_id` always mirrors the row under it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    index: Option<usize>,
    selected_id: Option<String>,
    multi: IndexSet<String>,
}

impl Cursor {
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    /// Point at `index`, clamped into range. Clears the cursor on empty rows.
    pub fn set(&mut self, index: usize, rows: &[VisibleRow]) {
        if rows.is_empty() {
            self.clear();
            return;
        }
        let index = index.min(rows.len() - 1);
        self.index = Some(index);
        self.selected_id = Some(rows[index].id.clone());
    }

    pub fn clear(&mut self) {
        self.index = None;
        self.selected_id = None;
    }

    /// Move down one row, stopping at the last. Returns true if it moved.
    pub fn next(&mut self, rows: &[VisibleRow]) -> bool {
        match self.index {
            Some(i) if i + 1 < rows.len() => {
                self.set(i + 1, rows);
                true
            }
            None if !rows.is_empty() => {
                self.set(0, rows);
                true
            }
            _ => false,
        }
    }

    /// Move up one row, stopping at the first. Returns true if it moved.
    pub fn previous(&mut self, rows: &[VisibleRow]) -> bool {
        match self.index {
            Some(i) if i > 0 => {
                self.set(i - 1, rows);
                true
            }
            None if !rows.is_empty() => {
                self.set(0, rows);
                true
            }
            _ => false,
        }
    }

    pub fn first(&mut self, rows: &[VisibleRow]) {
        self.set(0, rows);
    }

    pub fn last(&mut self, rows: &[VisibleRow]) {
        self.set(rows.len().saturating_sub(1), rows);
    }

    /// Toggle `task_id` in the multi-selection. Returns true if now selected.
    pub fn toggle_multi(&mut self, task_id: &str) -> bool {
        if self.multi.shift_remove(task_id) {
            false
        } else {
            self.multi.insert(task_id.to_string());
            true
        }
    }

    pub fn is_multi_selected(&self, task_id: &str) -> bool {
        self.multi.contains(task_id)
    }

    /// Multi-selected IDs in the order they were picked
    pub fn multi_selected(&self) -> &IndexSet<String> {
        &self.multi
    }

    pub fn clear_multi(&mut self) {
        self.multi.clear();
    }

    /// Drop multi-selected IDs that fail `keep` (e.g. gone after a reload).
    pub fn retain_multi(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.multi.retain(|id| keep(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(n: usize) -> Vec<VisibleRow> {
        (1..=n)
            .map(|i| VisibleRow {
                id: i.to_string(),
                depth: 0,
                has_children: false,
                is_expanded: false,
                is_last_sibling: i == n,
                ancestor_last: Vec::new(),
                matched: true,
            })
            .collect()
    }

    #[test]
    fn navigation_clamps_without_wrapping() {
        let rows = rows(3);
        let mut cursor = Cursor::default();
        cursor.first(&rows);
        assert!(!cursor.previous(&rows));
        assert_eq!(cursor.index(), Some(0));
        assert!(cursor.next(&rows));
        assert!(cursor.next(&rows));
        assert!(!cursor.next(&rows));
        assert_eq!(cursor.index(), Some(2));
        assert_eq!(cursor.selected_id(), Some("3"));
    }

    #[test]
    fn any_move_sequence_stays_in_range() {
        let rows = rows(4);
        let mut cursor = Cursor::default();
        let moves = [true, true, false, true, true, true, true, false, false, false, false, false];
        for forward in moves {
            if forward {
                cursor.next(&rows);
            } else {
                cursor.previous(&rows);
            }
            let i = cursor.index().unwrap();
            assert!(i < rows.len());
            assert_eq!(cursor.selected_id(), Some(rows[i].id.as_str()));
        }
    }

    #[test]
    fn empty_rows_clear_selection() {
        let mut cursor = Cursor::default();
        cursor.set(3, &rows(5));
        cursor.set(0, &[]);
        assert_eq!(cursor.index(), None);
        assert_eq!(cursor.selected_id(), None);
        assert!(!cursor.next(&[]));
    }

    #[test]
    fn set_clamps_past_end() {
        let mut cursor = Cursor::default();
        cursor.set(10, &rows(2));
        assert_eq!(cursor.index(), Some(1));
    }

    #[test]
    fn multi_select_toggles_and_keeps_order() {
        let mut cursor = Cursor::default();
        assert!(cursor.toggle_multi("3"));
        assert!(cursor.toggle_multi("1"));
        assert!(!cursor.toggle_multi("3"));
        assert!(cursor.toggle_multi("3"));
        let picked: Vec<&str> = cursor.multi_selected().iter().map(|s| s.as_str()).collect();
        assert_eq!(picked, vec!["1", "3"]);
        cursor.retain_multi(|id| id != "1");
        assert!(!cursor.is_multi_selected("1"));
    }
}
