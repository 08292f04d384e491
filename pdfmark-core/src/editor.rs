use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::bookmark::{
    BookmarkColor, BookmarkEdit, BookmarkId, BookmarkNode, BookmarkStyle, Destination,
};
use crate::config::{EditorConfig, ZoomConfig};
use crate::document::{RenderGeneration, RenderTicket};
use crate::error::EditorError;
use crate::history::History;
use crate::picker::{CanvasGeometry, DestinationMarker, DestinationPicker, DocPoint};
use crate::selection::{CollapsedSet, SelectionSet};
use crate::state::PersistedViewState;
use crate::tree::{matches_search, BookmarkTree};

/// An edit in progress, suspended while a destination is picked.
#[derive(Debug, Clone, PartialEq)]
pub struct EditDraft {
    pub target: BookmarkId,
    pub edit: BookmarkEdit,
}

impl EditDraft {
    pub fn for_bookmark(target: BookmarkId) -> Self {
        Self {
            target,
            edit: BookmarkEdit::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    AddTopLevel { title: String, page: u32 },
    AddChild { parent: BookmarkId, title: String, page: u32 },
    Edit { id: BookmarkId, edit: BookmarkEdit },
    Delete { id: BookmarkId },
    Move { id: BookmarkId, new_parent: Option<BookmarkId>, new_index: usize },
    DeleteAll,
    ReplaceTree { tree: BookmarkTree },
    ApplyColorToSelected { color: Option<BookmarkColor> },
    ApplyStyleToSelected { style: Option<BookmarkStyle> },
    DeleteSelected,
    Undo,
    Redo,
    GotoPage { page: u32 },
    NextPage { count: u32 },
    PrevPage { count: u32 },
    ZoomIn,
    ZoomOut,
    ResetZoom,
    ShowBookmark { id: BookmarkId },
    Search { query: String },
    ToggleCollapsed { id: BookmarkId },
    ExpandAll,
    CollapseAll,
    ToggleBatchMode,
    ToggleSelected { id: BookmarkId },
    SelectAll,
    ClearSelection,
    BeginPicking { draft: EditDraft },
    PickerHover { px: f64, py: f64, geometry: CanvasGeometry },
    PickerClick { px: f64, py: f64, geometry: CanvasGeometry },
    CancelPicking,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    TreeChanged,
    HistoryChanged { can_undo: bool, can_redo: bool },
    BookmarkAdded(BookmarkId),
    PageChanged(u32),
    ZoomChanged(f32),
    ViewChanged,
    SelectionChanged,
    PickingStarted { page: u32 },
    PickerReadout(Option<DocPoint>),
    DestinationPicked { draft: EditDraft },
    PickingCancelled { draft: EditDraft },
}

/// One line of the tree panel after search and collapse are applied.
#[derive(Debug, Clone, Copy)]
pub struct VisibleRow<'a> {
    pub level: usize,
    pub node: &'a BookmarkNode,
    pub collapsed: bool,
    pub selected: bool,
}

/// Editing session for one document: the live forest, its history and all
/// view state. The front end drives it with [`Command`]s and reacts to the
/// queued [`EditorEvent`]s.
pub struct Editor {
    page_count: u32,
    current_page: u32,
    zoom: f32,
    zoom_config: ZoomConfig,
    tree: BookmarkTree,
    history: History,
    selection: SelectionSet,
    collapsed: CollapsedSet,
    search: String,
    picker: DestinationPicker<EditDraft>,
    generation: RenderGeneration,
    events: Arc<Mutex<Vec<EditorEvent>>>,
}

impl Editor {
    pub fn new(page_count: u32, initial: BookmarkTree, config: &EditorConfig) -> Self {
        Self {
            page_count: page_count.max(1),
            current_page: 1,
            zoom: config.zoom.default,
            zoom_config: config.zoom,
            history: History::new(initial.clone()),
            tree: initial,
            selection: SelectionSet::default(),
            collapsed: CollapsedSet::default(),
            search: String::new(),
            picker: DestinationPicker::default(),
            generation: RenderGeneration::default(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Empty forest, fresh history, cleared view state.
    pub fn reset(&mut self) {
        self.tree = BookmarkTree::default();
        self.history.reset(BookmarkTree::default());
        self.selection = SelectionSet::default();
        self.collapsed = CollapsedSet::default();
        self.search.clear();
        if let Some(draft) = self.picker.cancel() {
            self.emit(EditorEvent::PickingCancelled { draft });
        }
        self.emit(EditorEvent::TreeChanged);
        self.emit_history();
    }

    pub fn events(&self) -> Arc<Mutex<Vec<EditorEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn drain_events(&self) -> Vec<EditorEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn tree(&self) -> &BookmarkTree {
        &self.tree
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn search_query(&self) -> &str {
        &self.search
    }

    pub fn picker(&self) -> &DestinationPicker<EditDraft> {
        &self.picker
    }

    pub fn is_collapsed(&self, id: &BookmarkId) -> bool {
        self.collapsed.is_collapsed(id)
    }

    pub fn view_state(&self) -> PersistedViewState {
        PersistedViewState {
            current_page: self.current_page,
            zoom: self.zoom,
        }
    }

    pub fn restore_view(&mut self, state: &PersistedViewState) {
        self.current_page = state.current_page.clamp(1, self.page_count);
        self.zoom = self.zoom_config.clamp(state.zoom);
    }

    /// Rows of the tree panel. A non-empty search shows every node that
    /// matches or has a matching descendant, ignoring collapse state.
    pub fn visible_rows(&self) -> Vec<VisibleRow<'_>> {
        fn walk<'a>(
            editor: &'a Editor,
            nodes: &'a [BookmarkNode],
            level: usize,
            out: &mut Vec<VisibleRow<'a>>,
        ) {
            for node in nodes {
                if !matches_search(node, &editor.search) {
                    continue;
                }
                let collapsed = editor.collapsed.is_collapsed(&node.id);
                out.push(VisibleRow {
                    level,
                    node,
                    collapsed,
                    selected: editor.selection.contains(&node.id),
                });
                if !collapsed || !editor.search.is_empty() {
                    walk(editor, &node.children, level + 1, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, self.tree.roots(), 0, &mut out);
        out
    }

    /// Issues a ticket for rendering the current page; any earlier ticket
    /// stops being current.
    pub fn request_render(&self) -> RenderTicket {
        RenderTicket {
            generation: self.generation.advance(),
            page: self.current_page,
            zoom: self.zoom,
            marker: self
                .picker
                .marker()
                .filter(|marker| marker.page == self.current_page),
        }
    }

    pub fn is_current(&self, ticket: &RenderTicket) -> bool {
        self.generation.is_current(ticket.generation)
    }

    pub fn render_generation(&self) -> RenderGeneration {
        self.generation.clone()
    }

    #[instrument(skip(self), level = "debug")]
    pub fn apply(&mut self, command: Command) -> Result<(), EditorError> {
        match command {
            Command::AddTopLevel { title, page } => {
                self.check_page(page)?;
                let id = self.tree.add_top_level(&title, page)?;
                self.commit();
                self.emit(EditorEvent::BookmarkAdded(id));
            }
            Command::AddChild {
                parent,
                title,
                page,
            } => {
                self.check_page(page)?;
                let id = self.tree.add_child(&parent, &title, page)?;
                self.commit();
                self.emit(EditorEvent::BookmarkAdded(id));
            }
            Command::Edit { id, edit } => {
                if !self.tree.contains(&id) {
                    return Err(EditorError::UnknownBookmark(id));
                }
                if let Some(page) = edit.page {
                    self.check_page(page)?;
                }
                if edit.is_empty() {
                    return Ok(());
                }
                self.tree.edit(&id, &edit)?;
                self.commit();
            }
            Command::Delete { id } => {
                if !self.tree.remove(&id) {
                    return Err(EditorError::UnknownBookmark(id));
                }
                self.commit();
            }
            Command::Move {
                id,
                new_parent,
                new_index,
            } => {
                if let Err(err) = self.tree.move_node(&id, new_parent.as_ref(), new_index) {
                    self.tree = (*self.history.current()).clone();
                    self.emit(EditorEvent::TreeChanged);
                    return Err(err);
                }
                self.commit();
            }
            Command::DeleteAll => {
                if !self.tree.is_empty() {
                    self.tree.clear();
                    self.commit();
                }
            }
            Command::ReplaceTree { tree } => {
                self.tree = tree;
                self.commit();
            }
            Command::ApplyColorToSelected { color } => {
                let ids = self.selection.ids().clone();
                if self.tree.apply_to(&ids, |node| node.color = color) > 0 {
                    self.commit();
                }
            }
            Command::ApplyStyleToSelected { style } => {
                let ids = self.selection.ids().clone();
                if self.tree.apply_to(&ids, |node| node.style = style) > 0 {
                    self.commit();
                }
            }
            Command::DeleteSelected => {
                let ids = self.selection.ids().clone();
                if self.tree.remove_all(&ids) > 0 {
                    self.commit();
                }
            }
            Command::Undo => {
                if let Some(snapshot) = self.history.undo() {
                    debug!("undo");
                    self.restore(&snapshot);
                }
            }
            Command::Redo => {
                if let Some(snapshot) = self.history.redo() {
                    debug!("redo");
                    self.restore(&snapshot);
                }
            }
            Command::GotoPage { page } => self.set_page(page),
            Command::NextPage { count } => self.set_page(self.current_page.saturating_add(count)),
            Command::PrevPage { count } => self.set_page(self.current_page.saturating_sub(count)),
            Command::ZoomIn => self.set_zoom(self.zoom + self.zoom_config.step),
            Command::ZoomOut => self.set_zoom(self.zoom - self.zoom_config.step),
            Command::ResetZoom => self.set_zoom(self.zoom_config.default),
            Command::ShowBookmark { id } => {
                let node = self
                    .tree
                    .find(&id)
                    .ok_or_else(|| EditorError::UnknownBookmark(id.clone()))?;
                let page = node.page.clamp(1, self.page_count);
                let marker = match (node.dest_x, node.dest_y) {
                    (Some(x), Some(y)) => Some(DestinationMarker {
                        page,
                        point: DocPoint { x, y },
                    }),
                    _ => None,
                };
                self.picker.set_marker(marker);
                self.set_page(page);
                self.emit(EditorEvent::ViewChanged);
            }
            Command::Search { query } => {
                let query = query.trim().to_lowercase();
                if query != self.search {
                    self.search = query;
                    self.emit(EditorEvent::ViewChanged);
                }
            }
            Command::ToggleCollapsed { id } => {
                if !self.tree.contains(&id) {
                    return Err(EditorError::UnknownBookmark(id));
                }
                self.collapsed.toggle(&id);
                self.emit(EditorEvent::ViewChanged);
            }
            Command::ExpandAll => {
                self.collapsed.expand_all();
                self.emit(EditorEvent::ViewChanged);
            }
            Command::CollapseAll => {
                self.collapsed.collapse_all(&self.tree);
                self.emit(EditorEvent::ViewChanged);
            }
            Command::ToggleBatchMode => {
                self.selection.toggle_batch_mode();
                self.emit(EditorEvent::SelectionChanged);
            }
            Command::ToggleSelected { id } => {
                if !self.tree.contains(&id) {
                    return Err(EditorError::UnknownBookmark(id));
                }
                if self.selection.is_batch_mode() {
                    self.selection.toggle(&id);
                    self.emit(EditorEvent::SelectionChanged);
                }
            }
            Command::SelectAll => {
                if self.selection.is_batch_mode() {
                    self.selection.select_all(&self.tree);
                    self.emit(EditorEvent::SelectionChanged);
                }
            }
            Command::ClearSelection => {
                self.selection.clear();
                self.emit(EditorEvent::SelectionChanged);
            }
            Command::BeginPicking { draft } => {
                if !self.tree.contains(&draft.target) {
                    return Err(EditorError::UnknownBookmark(draft.target));
                }
                if let Some(previous) = self.picker.begin(self.current_page, draft) {
                    self.emit(EditorEvent::PickingCancelled { draft: previous });
                }
                self.emit(EditorEvent::PickingStarted {
                    page: self.current_page,
                });
            }
            Command::PickerHover { px, py, geometry } => {
                if !self.picker.is_picking() {
                    return Err(EditorError::NotPicking);
                }
                let readout = self.picker.hover(px, py, &geometry);
                self.emit(EditorEvent::PickerReadout(readout));
            }
            Command::PickerClick { px, py, geometry } => {
                match self.picker.click(px, py, &geometry) {
                    Ok(picked) => {
                        let mut draft = picked.suspended;
                        let zoom = draft.edit.destination.flatten().and_then(|d| d.zoom);
                        draft.edit.page = Some(picked.page);
                        draft.edit.destination = Some(Some(Destination {
                            x: Some(picked.point.x),
                            y: Some(picked.point.y),
                            zoom,
                        }));
                        debug!(
                            page = picked.page,
                            x = picked.point.x,
                            y = picked.point.y,
                            "destination picked"
                        );
                        self.emit(EditorEvent::DestinationPicked { draft });
                    }
                    Err(Some(draft)) => self.emit(EditorEvent::PickingCancelled { draft }),
                    Err(None) => return Err(EditorError::NotPicking),
                }
            }
            Command::CancelPicking => match self.picker.cancel() {
                Some(draft) => self.emit(EditorEvent::PickingCancelled { draft }),
                None => return Err(EditorError::NotPicking),
            },
        }
        Ok(())
    }

    fn check_page(&self, page: u32) -> Result<(), EditorError> {
        if page == 0 || page > self.page_count {
            return Err(EditorError::PageOutOfRange {
                page,
                page_count: self.page_count,
            });
        }
        Ok(())
    }

    /// Records the live forest as a new snapshot.
    fn commit(&mut self) {
        self.history.push(self.tree.clone());
        self.purge_stale();
        self.emit(EditorEvent::TreeChanged);
        self.emit_history();
    }

    fn restore(&mut self, snapshot: &BookmarkTree) {
        self.tree = snapshot.clone();
        self.purge_stale();
        self.emit(EditorEvent::TreeChanged);
        self.emit_history();
    }

    fn purge_stale(&mut self) {
        let before = self.selection.len();
        self.selection.retain_existing(&self.tree);
        self.collapsed.retain_existing(&self.tree);
        if self.selection.len() != before {
            self.emit(EditorEvent::SelectionChanged);
        }
    }

    fn set_page(&mut self, page: u32) {
        let page = page.clamp(1, self.page_count);
        if page != self.current_page {
            self.current_page = page;
            self.picker.retarget(page);
            self.emit(EditorEvent::PageChanged(page));
        }
    }

    fn set_zoom(&mut self, zoom: f32) {
        let zoom = self.zoom_config.clamp((zoom * 1000.0).round() / 1000.0);
        if (zoom - self.zoom).abs() > f32::EPSILON {
            self.zoom = zoom;
            self.emit(EditorEvent::ZoomChanged(zoom));
        }
    }

    fn emit_history(&self) {
        self.emit(EditorEvent::HistoryChanged {
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
        });
    }

    fn emit(&self, event: EditorEvent) {
        self.events.lock().push(event);
    }
}
