use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::bookmark::{clean_title, BookmarkEdit, BookmarkId, BookmarkNode};
use crate::error::EditorError;

/// Ordered forest of bookmarks. Each node is owned by exactly one parent
/// list, so the structure cannot contain cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkTree {
    roots: Vec<BookmarkNode>,
}

/// A node together with its nesting depth, as produced by [`BookmarkTree::flatten`].
#[derive(Debug, Clone, Copy)]
pub struct FlatBookmark<'a> {
    pub level: usize,
    pub node: &'a BookmarkNode,
}

impl BookmarkTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roots(roots: Vec<BookmarkNode>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[BookmarkNode] {
        &self.roots
    }

    pub fn into_roots(self) -> Vec<BookmarkNode> {
        self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total number of nodes at every depth.
    pub fn len(&self) -> usize {
        fn count(nodes: &[BookmarkNode]) -> usize {
            nodes.iter().map(|node| 1 + count(&node.children)).sum()
        }
        count(&self.roots)
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }

    pub fn add_top_level(&mut self, title: &str, page: u32) -> Result<BookmarkId, EditorError> {
        let node = new_node(title, page)?;
        let id = node.id.clone();
        self.roots.push(node);
        Ok(id)
    }

    pub fn add_child(
        &mut self,
        parent: &BookmarkId,
        title: &str,
        page: u32,
    ) -> Result<BookmarkId, EditorError> {
        let node = new_node(title, page)?;
        let parent = self
            .find_mut(parent)
            .ok_or_else(|| EditorError::UnknownBookmark(parent.clone()))?;
        let id = node.id.clone();
        parent.children.push(node);
        Ok(id)
    }

    pub fn edit(&mut self, id: &BookmarkId, edit: &BookmarkEdit) -> Result<(), EditorError> {
        let title = match &edit.title {
            Some(title) => {
                let cleaned = clean_title(title);
                if cleaned.is_empty() {
                    return Err(EditorError::EmptyTitle);
                }
                Some(cleaned)
            }
            None => None,
        };

        let node = self
            .find_mut(id)
            .ok_or_else(|| EditorError::UnknownBookmark(id.clone()))?;
        if let Some(title) = title {
            node.title = title;
        }
        if let Some(page) = edit.page {
            node.page = page;
        }
        if let Some(color) = edit.color {
            node.color = color;
        }
        if let Some(style) = edit.style {
            node.style = style;
        }
        if let Some(destination) = edit.destination {
            node.set_destination(destination);
        }
        Ok(())
    }

    /// Removes the node and its whole subtree. Returns whether anything was removed.
    pub fn remove(&mut self, id: &BookmarkId) -> bool {
        detach(&mut self.roots, id).is_some()
    }

    /// Removes every node whose id is in `ids`, together with its subtree.
    pub fn remove_all(&mut self, ids: &HashSet<BookmarkId>) -> usize {
        fn prune(nodes: &mut Vec<BookmarkNode>, ids: &HashSet<BookmarkId>) -> usize {
            let before = nodes.len();
            nodes.retain(|node| !ids.contains(&node.id));
            let mut removed = before - nodes.len();
            for node in nodes.iter_mut() {
                removed += prune(&mut node.children, ids);
            }
            removed
        }
        prune(&mut self.roots, ids)
    }

    /// Moves a node to `new_index` within the child list of `new_parent`
    /// (`None` is the root list). Nodes never change between the root list
    /// and a child list.
    pub fn move_node(
        &mut self,
        id: &BookmarkId,
        new_parent: Option<&BookmarkId>,
        new_index: usize,
    ) -> Result<(), EditorError> {
        let current_parent = self
            .parent_of(id)
            .ok_or_else(|| EditorError::UnknownBookmark(id.clone()))?;

        match (current_parent.as_ref(), new_parent) {
            (None, Some(_)) => {
                return Err(EditorError::InvalidMove {
                    id: id.clone(),
                    reason: "top-level bookmarks stay top-level",
                })
            }
            (Some(_), None) => {
                return Err(EditorError::InvalidMove {
                    id: id.clone(),
                    reason: "nested bookmarks cannot become top-level",
                })
            }
            _ => {}
        }

        if let Some(target) = new_parent {
            if target == id || self.is_descendant(id, target) {
                return Err(EditorError::InvalidMove {
                    id: id.clone(),
                    reason: "a bookmark cannot be moved into its own subtree",
                });
            }
            if !self.contains(target) {
                return Err(EditorError::UnknownBookmark(target.clone()));
            }
        }

        let node = detach(&mut self.roots, id)
            .ok_or_else(|| EditorError::UnknownBookmark(id.clone()))?;
        let siblings = match new_parent {
            None => &mut self.roots,
            Some(target) => match find_mut_in(&mut self.roots, target) {
                Some(parent) => &mut parent.children,
                None => return Err(EditorError::UnknownBookmark(target.clone())),
            },
        };
        let index = new_index.min(siblings.len());
        siblings.insert(index, node);
        Ok(())
    }

    pub fn find(&self, id: &BookmarkId) -> Option<&BookmarkNode> {
        find_in(&self.roots, id)
    }

    pub fn find_mut(&mut self, id: &BookmarkId) -> Option<&mut BookmarkNode> {
        find_mut_in(&mut self.roots, id)
    }

    pub fn contains(&self, id: &BookmarkId) -> bool {
        self.find(id).is_some()
    }

    /// `Some(None)` for top-level nodes, `Some(Some(parent))` for nested ones,
    /// `None` when the id is unknown.
    pub fn parent_of(&self, id: &BookmarkId) -> Option<Option<BookmarkId>> {
        fn search(
            nodes: &[BookmarkNode],
            parent: Option<&BookmarkId>,
            id: &BookmarkId,
        ) -> Option<Option<BookmarkId>> {
            for node in nodes {
                if &node.id == id {
                    return Some(parent.cloned());
                }
                if let Some(found) = search(&node.children, Some(&node.id), id) {
                    return Some(found);
                }
            }
            None
        }
        search(&self.roots, None, id)
    }

    /// Position of the node within its parent's child list.
    pub fn index_of(&self, id: &BookmarkId) -> Option<usize> {
        let siblings = match self.parent_of(id)? {
            None => &self.roots,
            Some(parent) => &self.find(&parent)?.children,
        };
        siblings.iter().position(|node| &node.id == id)
    }

    pub fn sibling_count(&self, id: &BookmarkId) -> Option<usize> {
        match self.parent_of(id)? {
            None => Some(self.roots.len()),
            Some(parent) => self.find(&parent).map(|node| node.children.len()),
        }
    }

    fn is_descendant(&self, ancestor: &BookmarkId, candidate: &BookmarkId) -> bool {
        self.find(ancestor)
            .map(|node| find_in(&node.children, candidate).is_some())
            .unwrap_or(false)
    }

    /// Depth-first listing of every node with its level (0 = top-level).
    pub fn flatten(&self) -> Vec<FlatBookmark<'_>> {
        fn walk<'a>(nodes: &'a [BookmarkNode], level: usize, out: &mut Vec<FlatBookmark<'a>>) {
            for node in nodes {
                out.push(FlatBookmark { level, node });
                walk(&node.children, level + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.roots, 0, &mut out);
        out
    }

    pub fn ids(&self) -> HashSet<BookmarkId> {
        self.flatten()
            .into_iter()
            .map(|entry| entry.node.id.clone())
            .collect()
    }

    /// Applies `f` to every node whose id is in `ids`. Returns the number of nodes visited.
    pub fn apply_to<F>(&mut self, ids: &HashSet<BookmarkId>, mut f: F) -> usize
    where
        F: FnMut(&mut BookmarkNode),
    {
        fn visit<F: FnMut(&mut BookmarkNode)>(
            nodes: &mut [BookmarkNode],
            ids: &HashSet<BookmarkId>,
            f: &mut F,
        ) -> usize {
            let mut touched = 0;
            for node in nodes.iter_mut() {
                if ids.contains(&node.id) {
                    f(node);
                    touched += 1;
                }
                touched += visit(&mut node.children, ids, f);
            }
            touched
        }
        visit(&mut self.roots, ids, &mut f)
    }

    pub(crate) fn clean_titles(&mut self) {
        for node in &mut self.roots {
            node.clean_titles();
        }
    }

    /// Gives every repeat of an id already seen in depth-first order a fresh
    /// one, so lookups and detaches address the same node. Returns how many
    /// nodes were renamed.
    pub(crate) fn dedupe_ids(&mut self) -> usize {
        fn visit(nodes: &mut [BookmarkNode], seen: &mut HashSet<BookmarkId>) -> usize {
            let mut renamed = 0;
            for node in nodes.iter_mut() {
                while !seen.insert(node.id.clone()) {
                    node.id = BookmarkId::generate();
                    renamed += 1;
                }
                renamed += visit(&mut node.children, seen);
            }
            renamed
        }
        visit(&mut self.roots, &mut HashSet::new())
    }
}

/// Case-insensitive substring match on the node or any of its descendants.
/// `query` is expected in lower case; an empty query matches everything.
pub fn matches_search(node: &BookmarkNode, query: &str) -> bool {
    if query.is_empty() || node.title.to_lowercase().contains(query) {
        return true;
    }
    node.children.iter().any(|child| matches_search(child, query))
}

fn new_node(title: &str, page: u32) -> Result<BookmarkNode, EditorError> {
    let title = clean_title(title);
    if title.is_empty() {
        return Err(EditorError::EmptyTitle);
    }
    Ok(BookmarkNode::new(title, page))
}

fn find_in<'a>(nodes: &'a [BookmarkNode], id: &BookmarkId) -> Option<&'a BookmarkNode> {
    for node in nodes {
        if &node.id == id {
            return Some(node);
        }
        if let Some(found) = find_in(&node.children, id) {
            return Some(found);
        }
    }
    None
}

fn find_mut_in<'a>(
    nodes: &'a mut [BookmarkNode],
    id: &BookmarkId,
) -> Option<&'a mut BookmarkNode> {
    for node in nodes.iter_mut() {
        if &node.id == id {
            return Some(node);
        }
        if let Some(found) = find_mut_in(&mut node.children, id) {
            return Some(found);
        }
    }
    None
}

fn detach(nodes: &mut Vec<BookmarkNode>, id: &BookmarkId) -> Option<BookmarkNode> {
    if let Some(position) = nodes.iter().position(|node| &node.id == id) {
        return Some(nodes.remove(position));
    }
    nodes
        .iter_mut()
        .find_map(|node| detach(&mut node.children, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (BookmarkTree, BookmarkId, BookmarkId, BookmarkId) {
        let mut tree = BookmarkTree::new();
        let chapter = tree.add_top_level("Chapter 1", 1).unwrap();
        let section = tree.add_child(&chapter, "Section 1.1", 2).unwrap();
        let appendix = tree.add_top_level("Appendix", 9).unwrap();
        (tree, chapter, section, appendix)
    }

    #[test]
    fn add_rejects_empty_titles_without_mutating() {
        let (mut tree, chapter, _, _) = sample();
        let before = tree.clone();
        assert_eq!(tree.add_top_level("  \u{1}  ", 1), Err(EditorError::EmptyTitle));
        assert_eq!(tree.add_child(&chapter, "", 1), Err(EditorError::EmptyTitle));
        assert_eq!(tree, before);
    }

    #[test]
    fn add_child_requires_existing_parent() {
        let (mut tree, _, _, _) = sample();
        let missing = BookmarkId::new("missing");
        assert_eq!(
            tree.add_child(&missing, "Orphan", 1),
            Err(EditorError::UnknownBookmark(missing))
        );
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn delete_removes_subtree_but_not_siblings() {
        let (mut tree, chapter, section, appendix) = sample();
        tree.add_child(&section, "Deep", 3).unwrap();
        assert!(tree.remove(&chapter));
        assert!(!tree.contains(&section));
        assert!(tree.contains(&appendix));
        assert_eq!(tree.len(), 1);
        assert!(!tree.remove(&chapter));
    }

    #[test]
    fn edit_updates_fields_and_validates_title() {
        let (mut tree, chapter, _, _) = sample();
        let edit = BookmarkEdit {
            title: Some(" Renamed\u{7} ".into()),
            page: Some(4),
            ..BookmarkEdit::default()
        };
        tree.edit(&chapter, &edit).unwrap();
        let node = tree.find(&chapter).unwrap();
        assert_eq!(node.title, "Renamed");
        assert_eq!(node.page, 4);

        assert_eq!(
            tree.edit(&chapter, &BookmarkEdit::title("\u{0}")),
            Err(EditorError::EmptyTitle)
        );
        assert_eq!(tree.find(&chapter).unwrap().title, "Renamed");
    }

    #[test]
    fn move_reorders_top_level_nodes() {
        let (mut tree, chapter, _, appendix) = sample();
        tree.move_node(&appendix, None, 0).unwrap();
        let titles: Vec<_> = tree.roots().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["Appendix", "Chapter 1"]);
        tree.move_node(&appendix, None, 99).unwrap();
        assert_eq!(tree.index_of(&appendix), Some(1));
        assert_eq!(tree.index_of(&chapter), Some(0));
    }

    #[test]
    fn move_refuses_to_cross_between_root_and_children() {
        let (mut tree, chapter, section, appendix) = sample();
        let before = tree.clone();
        assert!(matches!(
            tree.move_node(&appendix, Some(&chapter), 0),
            Err(EditorError::InvalidMove { .. })
        ));
        assert!(matches!(
            tree.move_node(&section, None, 0),
            Err(EditorError::InvalidMove { .. })
        ));
        assert_eq!(tree, before);
    }

    #[test]
    fn move_between_child_lists_rejects_cycles() {
        let (mut tree, chapter, section, appendix) = sample();
        let leaf = tree.add_child(&section, "Leaf", 2).unwrap();
        let other = tree.add_child(&appendix, "Notes", 9).unwrap();

        assert!(matches!(
            tree.move_node(&section, Some(&leaf), 0),
            Err(EditorError::InvalidMove { .. })
        ));

        tree.move_node(&leaf, Some(&other), 0).unwrap();
        assert_eq!(tree.parent_of(&leaf), Some(Some(other.clone())));
        assert_eq!(tree.parent_of(&section), Some(Some(chapter)));
    }

    #[test]
    fn flatten_reports_levels_depth_first() {
        let (tree, _, _, _) = sample();
        let flat: Vec<_> = tree
            .flatten()
            .into_iter()
            .map(|entry| (entry.node.title.as_str(), entry.level))
            .collect();
        assert_eq!(
            flat,
            [("Chapter 1", 0), ("Section 1.1", 1), ("Appendix", 0)]
        );
    }

    #[test]
    fn batch_helpers_visit_selected_nodes() {
        let (mut tree, chapter, section, appendix) = sample();
        let ids: HashSet<_> = [section.clone(), appendix.clone()].into_iter().collect();
        let touched = tree.apply_to(&ids, |node| node.page = 42);
        assert_eq!(touched, 2);
        assert_eq!(tree.find(&section).unwrap().page, 42);
        assert_eq!(tree.find(&chapter).unwrap().page, 1);

        assert_eq!(tree.remove_all(&ids), 2);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn search_matches_descendants() {
        let (tree, _, _, _) = sample();
        let chapter = &tree.roots()[0];
        assert!(matches_search(chapter, "section"));
        assert!(matches_search(chapter, ""));
        assert!(!matches_search(&tree.roots()[1], "section"));
    }
}
