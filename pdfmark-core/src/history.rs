use std::sync::Arc;

use crate::tree::BookmarkTree;

/// Linear undo/redo timeline of forest snapshots. There is always at least
/// one snapshot and the cursor always points at a valid one.
#[derive(Debug, Clone)]
pub struct History {
    snapshots: Vec<Arc<BookmarkTree>>,
    cursor: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(BookmarkTree::default())
    }
}

impl History {
    pub fn new(initial: BookmarkTree) -> Self {
        Self {
            snapshots: vec![Arc::new(initial)],
            cursor: 0,
        }
    }

    /// Records a new snapshot, discarding any redo branch.
    pub fn push(&mut self, tree: BookmarkTree) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(Arc::new(tree));
        self.cursor = self.snapshots.len() - 1;
    }

    pub fn undo(&mut self) -> Option<Arc<BookmarkTree>> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.current())
    }

    pub fn redo(&mut self) -> Option<Arc<BookmarkTree>> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.current())
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn current(&self) -> Arc<BookmarkTree> {
        Arc::clone(&self.snapshots[self.cursor])
    }

    /// Drops every snapshot and starts over from `tree`.
    pub fn reset(&mut self, tree: BookmarkTree) {
        *self = Self::new(tree);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with(titles: &[&str]) -> BookmarkTree {
        let mut tree = BookmarkTree::new();
        for title in titles {
            tree.add_top_level(title, 1).unwrap();
        }
        tree
    }

    #[test]
    fn fresh_history_has_nothing_to_undo() {
        let mut history = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(history.undo().is_none());
        assert!(history.current().is_empty());
    }

    #[test]
    fn undo_and_redo_walk_the_timeline() {
        let one = tree_with(&["A"]);
        let two = tree_with(&["A", "B"]);
        let mut history = History::default();
        history.push(one.clone());
        history.push(two.clone());

        assert_eq!(*history.undo().unwrap(), one);
        assert_eq!(*history.undo().unwrap(), BookmarkTree::default());
        assert!(history.undo().is_none());
        assert_eq!(*history.redo().unwrap(), one);
        assert_eq!(*history.redo().unwrap(), two);
        assert!(history.redo().is_none());
    }

    #[test]
    fn push_after_undo_drops_redo_branch() {
        let mut history = History::default();
        history.push(tree_with(&["A"]));
        history.push(tree_with(&["A", "B"]));
        history.undo();
        history.push(tree_with(&["C"]));
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
        assert_eq!(history.current().roots()[0].title, "C");
    }

    #[test]
    fn reset_discards_previous_snapshots() {
        let mut history = History::default();
        history.push(tree_with(&["A"]));
        history.reset(tree_with(&["Z"]));
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert_eq!(history.current().roots()[0].title, "Z");
    }
}
