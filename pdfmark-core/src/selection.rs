use std::collections::HashSet;

use crate::bookmark::BookmarkId;
use crate::tree::BookmarkTree;

/// Batch-mode selection. Ids are purged whenever they leave the forest.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    batch_mode: bool,
    ids: HashSet<BookmarkId>,
}

impl SelectionSet {
    pub fn is_batch_mode(&self) -> bool {
        self.batch_mode
    }

    /// Flips batch mode; leaving batch mode clears the selection.
    pub fn toggle_batch_mode(&mut self) -> bool {
        self.batch_mode = !self.batch_mode;
        if !self.batch_mode {
            self.ids.clear();
        }
        self.batch_mode
    }

    pub fn toggle(&mut self, id: &BookmarkId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    pub fn select_all(&mut self, tree: &BookmarkTree) {
        self.ids = tree.ids();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &BookmarkId) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &HashSet<BookmarkId> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn retain_existing(&mut self, tree: &BookmarkTree) {
        let present = tree.ids();
        self.ids.retain(|id| present.contains(id));
    }
}

/// Navigational collapse state of the tree panel. Not part of history.
#[derive(Debug, Clone, Default)]
pub struct CollapsedSet {
    ids: HashSet<BookmarkId>,
}

impl CollapsedSet {
    pub fn toggle(&mut self, id: &BookmarkId) {
        if !self.ids.remove(id) {
            self.ids.insert(id.clone());
        }
    }

    pub fn is_collapsed(&self, id: &BookmarkId) -> bool {
        self.ids.contains(id)
    }

    pub fn expand_all(&mut self) {
        self.ids.clear();
    }

    /// Collapses every node that has children.
    pub fn collapse_all(&mut self, tree: &BookmarkTree) {
        self.ids = tree
            .flatten()
            .into_iter()
            .filter(|entry| !entry.node.children.is_empty())
            .map(|entry| entry.node.id.clone())
            .collect();
    }

    pub fn retain_existing(&mut self, tree: &BookmarkTree) {
        let present = tree.ids();
        self.ids.retain(|id| present.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaving_batch_mode_clears_selection() {
        let mut tree = BookmarkTree::new();
        let a = tree.add_top_level("A", 1).unwrap();
        let mut selection = SelectionSet::default();
        assert!(selection.toggle_batch_mode());
        assert!(selection.toggle(&a));
        assert!(selection.contains(&a));
        assert!(!selection.toggle_batch_mode());
        assert!(selection.is_empty());
    }

    #[test]
    fn stale_ids_are_purged() {
        let mut tree = BookmarkTree::new();
        let a = tree.add_top_level("A", 1).unwrap();
        let b = tree.add_child(&a, "B", 2).unwrap();
        let mut selection = SelectionSet::default();
        selection.select_all(&tree);
        assert_eq!(selection.len(), 2);

        tree.remove(&b);
        selection.retain_existing(&tree);
        assert!(selection.contains(&a));
        assert!(!selection.contains(&b));
    }

    #[test]
    fn collapse_all_only_marks_parents() {
        let mut tree = BookmarkTree::new();
        let a = tree.add_top_level("A", 1).unwrap();
        let b = tree.add_child(&a, "B", 2).unwrap();
        let mut collapsed = CollapsedSet::default();
        collapsed.collapse_all(&tree);
        assert!(collapsed.is_collapsed(&a));
        assert!(!collapsed.is_collapsed(&b));
        collapsed.toggle(&a);
        assert!(!collapsed.is_collapsed(&a));
    }
}
