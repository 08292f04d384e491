use std::collections::HashMap;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::{cursor, terminal};
use pdfmark_core::{
    BookmarkColor, BookmarkEdit, BookmarkId, BookmarkStyle, BookmarkTree, Command, EditDraft,
    Editor, EditorError, EditorEvent, PageRenderer, PageSize, RenderImage, RenderTicket,
    StateStore,
};
use pdfmark_outline::OutlineDocument;
use pdfmark_tty::{
    draw_destination_marker, CellMetrics, DrawParams, EventMapper, InputMode, KittyRenderer,
    UiEvent,
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::formats::{read_bookmarks, write_bookmarks, BookmarkFormat};
use crate::loader::{export_path, skipped_note};
use crate::view::{
    combine_status, draw_status, draw_tree, format_status, Layout, PageView, TreeScroll,
};

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, DisableMouseCapture, cursor::Show);
    }
}

/// What a prompt or confirmation is answering.
#[derive(Debug, Clone)]
enum Pending {
    AddTopLevel,
    AddChild(BookmarkId),
    EditTitle(BookmarkId),
    ImportPath,
    DeleteOne(BookmarkId),
    DeleteSelected,
    DeleteAll,
    Extract,
    QuitUnsaved,
}

impl Pending {
    fn label(&self) -> &'static str {
        match self {
            Pending::AddTopLevel => "New bookmark title: ",
            Pending::AddChild(_) => "New child title: ",
            Pending::EditTitle(_) => "Title: ",
            Pending::ImportPath => "Import CSV/JSON file: ",
            Pending::DeleteOne(_) => "Delete this bookmark and its children? [y/n]",
            Pending::DeleteSelected => "Delete all selected bookmarks? [y/n]",
            Pending::DeleteAll => "Delete ALL bookmarks? [y/n]",
            Pending::Extract => "Replace the forest with the document's outline? [y/n]",
            Pending::QuitUnsaved => "Quit without saving? [y/n]",
        }
    }
}

/// A rendered page ready to be placed.
struct Frame {
    ticket: RenderTicket,
    view: PageView,
    image: RenderImage,
}

pub struct Session {
    pub editor: Editor,
    pub outline: OutlineDocument,
    pub renderer: Arc<PageRenderer>,
    pub store: Arc<dyn StateStore>,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub notice: Option<String>,
}

enum LoopAction {
    Continue,
    Quit,
}

pub struct App {
    session: Session,
    saved: BookmarkTree,
    mapper: EventMapper,
    pending: Option<Pending>,
    message: Option<String>,
    cursor: usize,
    scroll: TreeScroll,
    metrics: CellMetrics,
    layout: Layout,
    page_sizes: HashMap<u32, PageSize>,
    view: Option<PageView>,
    frames_tx: UnboundedSender<Result<Frame>>,
    frames_rx: UnboundedReceiver<Result<Frame>>,
}

impl App {
    pub fn new(session: Session) -> Self {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let saved = session.editor.tree().clone();
        let message = session.notice.clone();
        Self {
            session,
            saved,
            mapper: EventMapper::new(),
            pending: None,
            message,
            cursor: 0,
            scroll: TreeScroll::default(),
            metrics: CellMetrics::FALLBACK,
            layout: Layout::new(80, 24),
            page_sizes: HashMap::new(),
            view: None,
            frames_tx,
            frames_rx,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let _raw = RawModeGuard::new()?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, cursor::Hide)?;
        let mut renderer = KittyRenderer::new(stdout);

        self.relayout(&mut renderer)?;
        self.schedule_render();
        self.draw_chrome(&mut renderer)?;

        loop {
            while let Ok(frame) = self.frames_rx.try_recv() {
                match frame {
                    Ok(frame) if self.session.editor.is_current(&frame.ticket) => {
                        self.place_frame(&mut renderer, &frame)?;
                    }
                    Ok(frame) => debug!(page = frame.ticket.page, "dropping superseded render"),
                    Err(err) => {
                        warn!(?err, "page render failed");
                        self.message = Some(format!("render failed: {err:#}"));
                        self.draw_chrome(&mut renderer)?;
                    }
                }
            }

            if !event::poll(Duration::from_millis(50))? {
                continue;
            }
            let ui_event = self.mapper.map_event(event::read()?);
            if matches!(ui_event, UiEvent::None) {
                if self.mapper.pending_input().is_some() {
                    self.draw_chrome(&mut renderer)?;
                }
                continue;
            }
            if matches!(ui_event, UiEvent::Resize) {
                self.relayout(&mut renderer)?;
                self.schedule_render();
            }

            let action = match self.handle(ui_event) {
                Ok(action) => action,
                Err(err) => {
                    warn!(?err, "command failed");
                    self.message = Some(format!("{err:#}"));
                    LoopAction::Continue
                }
            };
            self.process_events(&mut renderer)?;
            if let LoopAction::Quit = action {
                break;
            }
            self.draw_chrome(&mut renderer)?;
        }

        renderer.delete()?;
        renderer.clear_all()?;
        let info = self.session.renderer.info();
        self.session
            .store
            .save(info, &self.session.editor.view_state())
            .context("failed to persist view state")?;
        Ok(())
    }

    fn handle(&mut self, event: UiEvent) -> Result<LoopAction> {
        self.message = None;
        match event {
            UiEvent::Command(command) => self.apply(command)?,
            UiEvent::CursorMove { delta } => self.move_cursor(delta),
            UiEvent::ShowCursor => {
                if let Some(id) = self.cursor_id() {
                    self.apply(Command::ShowBookmark { id })?;
                }
            }
            UiEvent::AddTopLevel => self.prompt(Pending::AddTopLevel, ""),
            UiEvent::AddChild => {
                if let Some(id) = self.cursor_id() {
                    self.prompt(Pending::AddChild(id), "");
                }
            }
            UiEvent::EditTitle => {
                let current = self
                    .cursor_id()
                    .and_then(|id| self.find(&id))
                    .map(|node| (node.id.clone(), node.title.clone()));
                if let Some((id, title)) = current {
                    self.prompt(Pending::EditTitle(id), &title);
                }
            }
            UiEvent::SetPageToCurrent => {
                if let Some(id) = self.cursor_id() {
                    let edit = BookmarkEdit {
                        page: Some(self.session.editor.current_page()),
                        ..BookmarkEdit::default()
                    };
                    self.apply(Command::Edit { id, edit })?;
                }
            }
            UiEvent::CycleColor => self.cycle_color()?,
            UiEvent::CycleStyle => self.cycle_style()?,
            UiEvent::PickDestination => self.begin_picking()?,
            UiEvent::DeleteCursor => {
                if self.batch_active() {
                    self.confirm(Pending::DeleteSelected);
                } else if let Some(id) = self.cursor_id() {
                    self.confirm(Pending::DeleteOne(id));
                }
            }
            UiEvent::DeleteAll => {
                if !self.session.editor.tree().is_empty() {
                    self.confirm(Pending::DeleteAll);
                }
            }
            UiEvent::MoveCursor { delta } => self.move_among_siblings(delta)?,
            UiEvent::ToggleCollapseCursor => {
                if let Some(id) = self.cursor_id() {
                    self.apply(Command::ToggleCollapsed { id })?;
                }
            }
            UiEvent::ToggleSelectCursor => {
                if let Some(id) = self.cursor_id() {
                    self.apply(Command::ToggleSelected { id })?;
                }
            }
            UiEvent::ExtractOutline => self.confirm(Pending::Extract),
            UiEvent::Import => self.prompt(Pending::ImportPath, ""),
            UiEvent::Export => self.export()?,
            UiEvent::Save => self.save()?,
            UiEvent::BeginSearch => {}
            UiEvent::SearchQueryChanged { query } | UiEvent::SearchSubmit { query } => {
                self.apply(Command::Search { query })?;
                self.cursor = 0;
            }
            UiEvent::SearchCancel => self.apply(Command::Search {
                query: String::new(),
            })?,
            UiEvent::PromptChanged { .. } => {}
            UiEvent::PromptSubmit { input } => {
                if let Some(pending) = self.pending.take() {
                    self.answer_prompt(pending, input)?;
                }
            }
            UiEvent::PromptCancel => self.pending = None,
            UiEvent::Confirm(yes) => {
                self.mapper.set_mode(InputMode::Normal);
                if let Some(pending) = self.pending.take() {
                    if yes {
                        return self.answer_confirm(pending);
                    }
                }
            }
            UiEvent::PickerHover { column, row } => {
                if let Some(view) = self.view {
                    let (px, py) = view.pointer(column, row, self.metrics);
                    self.apply(Command::PickerHover {
                        px,
                        py,
                        geometry: view.geometry,
                    })?;
                }
            }
            UiEvent::PickerClick { column, row } => match self.view {
                Some(view) => {
                    let (px, py) = view.pointer(column, row, self.metrics);
                    self.apply(Command::PickerClick {
                        px,
                        py,
                        geometry: view.geometry,
                    })?;
                }
                None => self.apply(Command::CancelPicking)?,
            },
            UiEvent::Resize | UiEvent::None => {}
            UiEvent::Quit => {
                if self.is_dirty() {
                    self.confirm(Pending::QuitUnsaved);
                } else {
                    return Ok(LoopAction::Quit);
                }
            }
        }
        Ok(LoopAction::Continue)
    }

    fn answer_prompt(&mut self, pending: Pending, input: String) -> Result<()> {
        let page = self.session.editor.current_page();
        match pending {
            Pending::AddTopLevel => self.apply(Command::AddTopLevel { title: input, page })?,
            Pending::AddChild(parent) => self.apply(Command::AddChild {
                parent,
                title: input,
                page,
            })?,
            Pending::EditTitle(id) => self.apply(Command::Edit {
                id,
                edit: BookmarkEdit::title(input),
            })?,
            Pending::ImportPath => self.import(PathBuf::from(input.trim()))?,
            other => debug!(?other, "prompt answered for a confirmation"),
        }
        Ok(())
    }

    fn answer_confirm(&mut self, pending: Pending) -> Result<LoopAction> {
        match pending {
            Pending::DeleteOne(id) => self.apply(Command::Delete { id })?,
            Pending::DeleteSelected => self.apply(Command::DeleteSelected)?,
            Pending::DeleteAll => self.apply(Command::DeleteAll)?,
            Pending::Extract => {
                let tree = self.session.outline.extract_bookmarks()?;
                let count = tree.len();
                self.apply(Command::ReplaceTree { tree })?;
                self.message = Some(format!("loaded {count} bookmarks from the document"));
            }
            Pending::QuitUnsaved => return Ok(LoopAction::Quit),
            other => debug!(?other, "confirmation answered for a prompt"),
        }
        Ok(LoopAction::Continue)
    }

    fn apply(&mut self, command: Command) -> Result<(), EditorError> {
        self.session.editor.apply(command)
    }

    fn prompt(&mut self, pending: Pending, initial: &str) {
        self.mapper.begin_prompt(initial);
        self.pending = Some(pending);
    }

    fn confirm(&mut self, pending: Pending) {
        self.mapper.set_mode(InputMode::Confirm);
        self.pending = Some(pending);
    }

    fn find(&self, id: &BookmarkId) -> Option<&pdfmark_core::BookmarkNode> {
        self.session.editor.tree().find(id)
    }

    fn cursor_id(&self) -> Option<BookmarkId> {
        self.session
            .editor
            .visible_rows()
            .get(self.cursor)
            .map(|row| row.node.id.clone())
    }

    fn batch_active(&self) -> bool {
        let selection = self.session.editor.selection();
        selection.is_batch_mode() && !selection.is_empty()
    }

    fn is_dirty(&self) -> bool {
        self.session.editor.tree() != &self.saved
    }

    fn move_cursor(&mut self, delta: isize) {
        let len = self.session.editor.visible_rows().len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        let next = (self.cursor as isize + delta).clamp(0, len as isize - 1);
        self.cursor = next as usize;
    }

    fn focus(&mut self, id: &BookmarkId) {
        if let Some(index) = self
            .session
            .editor
            .visible_rows()
            .iter()
            .position(|row| &row.node.id == id)
        {
            self.cursor = index;
        }
    }

    fn cycle_color(&mut self) -> Result<()> {
        let Some(node) = self.cursor_id().and_then(|id| self.find(&id)) else {
            return Ok(());
        };
        let (id, color) = (node.id.clone(), BookmarkColor::cycle(node.color));
        if self.batch_active() {
            self.apply(Command::ApplyColorToSelected { color })?;
        } else {
            let edit = BookmarkEdit {
                color: Some(color),
                ..BookmarkEdit::default()
            };
            self.apply(Command::Edit { id, edit })?;
        }
        Ok(())
    }

    fn cycle_style(&mut self) -> Result<()> {
        let Some(node) = self.cursor_id().and_then(|id| self.find(&id)) else {
            return Ok(());
        };
        let (id, style) = (node.id.clone(), BookmarkStyle::cycle(node.style));
        if self.batch_active() {
            self.apply(Command::ApplyStyleToSelected { style })?;
        } else {
            let edit = BookmarkEdit {
                style: Some(style),
                ..BookmarkEdit::default()
            };
            self.apply(Command::Edit { id, edit })?;
        }
        Ok(())
    }

    fn begin_picking(&mut self) -> Result<()> {
        let Some(node) = self.cursor_id().and_then(|id| self.find(&id)) else {
            return Ok(());
        };
        let mut draft = EditDraft::for_bookmark(node.id.clone());
        // Keeps the bookmark's zoom when only the position is picked.
        draft.edit.destination = node.destination().map(Some);
        self.apply(Command::BeginPicking { draft })?;
        Ok(())
    }

    fn move_among_siblings(&mut self, delta: isize) -> Result<()> {
        let Some(id) = self.cursor_id() else {
            return Ok(());
        };
        let tree = self.session.editor.tree();
        let (Some(parent), Some(index), Some(count)) =
            (tree.parent_of(&id), tree.index_of(&id), tree.sibling_count(&id))
        else {
            return Ok(());
        };
        let target = index as isize + delta;
        if target < 0 || target >= count as isize {
            return Ok(());
        }
        self.apply(Command::Move {
            id: id.clone(),
            new_parent: parent,
            new_index: target as usize,
        })?;
        self.focus(&id);
        Ok(())
    }

    fn import(&mut self, path: PathBuf) -> Result<()> {
        let format = BookmarkFormat::resolve(None, Some(&path));
        let imported = read_bookmarks(&path, format)?;
        let count = imported.tree.len();
        self.apply(Command::ReplaceTree {
            tree: imported.tree,
        })?;
        self.message = Some(format!(
            "imported {count} bookmarks{}",
            skipped_note(imported.skipped)
        ));
        Ok(())
    }

    fn export(&mut self) -> Result<()> {
        let tree = self.session.editor.tree();
        let mut written = Vec::new();
        for format in [BookmarkFormat::Csv, BookmarkFormat::Json] {
            let path = export_path(&self.session.input_path, format);
            write_bookmarks(&path, tree, format)?;
            written.push(path.display().to_string());
        }
        info!(files = ?written, "exported bookmarks");
        self.message = Some(format!("exported to {}", written.join(", ")));
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        let tree = self.session.editor.tree().clone();
        self.session.outline.write_bookmarks(&tree)?;
        let output = self.session.output_path.clone();
        self.session
            .outline
            .save(&output)
            .with_context(|| format!("failed to save {:?}", output))?;
        self.message = Some(format!("saved {} bookmarks to {}", tree.len(), output.display()));
        self.saved = tree;
        Ok(())
    }

    /// Reacts to what the editor reported for the last command.
    fn process_events(&mut self, renderer: &mut KittyRenderer<Stdout>) -> Result<()> {
        let mut rerender = false;
        for event in self.session.editor.drain_events() {
            match event {
                EditorEvent::BookmarkAdded(id) => self.focus(&id),
                EditorEvent::PageChanged(_) | EditorEvent::ZoomChanged(_) => rerender = true,
                EditorEvent::ViewChanged => rerender = true,
                EditorEvent::PickingStarted { page } => {
                    self.mapper.set_mode(InputMode::Picking);
                    crossterm::execute!(renderer.writer(), EnableMouseCapture)?;
                    self.message = Some(format!("picking a destination on page {page}"));
                    rerender = true;
                }
                EditorEvent::DestinationPicked { draft } => {
                    self.end_picking(renderer)?;
                    let target = draft.target.clone();
                    self.apply(Command::Edit {
                        id: draft.target,
                        edit: draft.edit,
                    })?;
                    self.focus(&target);
                    self.message = Some("destination set".to_owned());
                    rerender = true;
                }
                EditorEvent::PickingCancelled { .. } => {
                    self.end_picking(renderer)?;
                    self.message = Some("picking cancelled".to_owned());
                    rerender = true;
                }
                EditorEvent::TreeChanged
                | EditorEvent::HistoryChanged { .. }
                | EditorEvent::SelectionChanged
                | EditorEvent::PickerReadout(_) => {}
            }
        }
        // The Edit applied after a pick queues its own events.
        for event in self.session.editor.drain_events() {
            debug!(?event, "follow-up editor event");
        }

        let len = self.session.editor.visible_rows().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
        if rerender {
            self.schedule_render();
        }
        Ok(())
    }

    fn end_picking(&mut self, renderer: &mut KittyRenderer<Stdout>) -> Result<()> {
        if self.mapper.mode() == InputMode::Picking {
            self.mapper.set_mode(InputMode::Normal);
        }
        crossterm::execute!(renderer.writer(), DisableMouseCapture)?;
        Ok(())
    }

    fn relayout(&mut self, renderer: &mut KittyRenderer<Stdout>) -> Result<()> {
        let (columns, rows) = terminal::size()?;
        self.layout = Layout::new(columns, rows);
        self.metrics = CellMetrics::detect();
        renderer.delete()?;
        renderer.clear_all()?;
        Ok(())
    }

    fn page_size(&mut self, page: u32) -> Result<PageSize> {
        if let Some(size) = self.page_sizes.get(&page) {
            return Ok(*size);
        }
        let size = self
            .session
            .renderer
            .page_size(page.saturating_sub(1) as usize)?;
        self.page_sizes.insert(page, size);
        Ok(size)
    }

    /// Renders the current page off the UI thread. Only the most recent
    /// request is placed when it arrives.
    fn schedule_render(&mut self) {
        let ticket = self.session.editor.request_render();
        let page = match self.page_size(ticket.page) {
            Ok(page) => page,
            Err(err) => {
                warn!(?err, page = ticket.page, "failed to read page size");
                self.message = Some(format!("cannot show page {}: {err:#}", ticket.page));
                return;
            }
        };
        let focus = ticket.marker.map(|marker| marker.point);
        let view = PageView::compute(page, ticket.zoom, &self.layout, self.metrics, focus);
        self.view = Some(view);

        let renderer = Arc::clone(&self.session.renderer);
        let generation = self.session.editor.render_generation();
        let tx = self.frames_tx.clone();
        tokio::task::spawn_blocking(move || {
            if !generation.is_current(ticket.generation) {
                return;
            }
            let mut request = ticket.request();
            request.scale = view.render_scale;
            let frame = renderer.render(request).map(|image| {
                let mut image = (*image).clone();
                if let Some(marker) = ticket.marker {
                    draw_destination_marker(&mut image, page, marker.point);
                }
                Frame {
                    image: view.crop(&image),
                    ticket,
                    view,
                }
            });
            let _ = tx.send(frame);
        });
    }

    fn place_frame(&mut self, renderer: &mut KittyRenderer<Stdout>, frame: &Frame) -> Result<()> {
        let placement = frame.view.placement;
        renderer.begin_sync_update()?;
        renderer.delete()?;
        renderer.draw(
            &frame.image,
            DrawParams::clamped(
                placement.column,
                placement.row,
                u32::from(placement.columns),
                u32::from(placement.rows),
            ),
        )?;
        renderer.end_sync_update()?;
        Ok(())
    }

    /// Tree panel and status line; the page image is placed separately.
    fn draw_chrome(&mut self, renderer: &mut KittyRenderer<Stdout>) -> Result<()> {
        let editor = &self.session.editor;
        let rows = editor.visible_rows();
        self.scroll
            .ensure_visible(self.cursor, usize::from(self.layout.body_rows), rows.len());
        let writer = renderer.writer();
        draw_tree(
            writer,
            &rows,
            self.cursor,
            &self.scroll,
            &self.layout,
            editor.selection().is_batch_mode(),
        )?;

        let file_name = self
            .session
            .input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let base = format_status(editor, &file_name, editor.tree() != &self.saved);
        let extra = match (&self.pending, self.mapper.pending_input()) {
            (Some(pending), Some(input)) => Some(format!("{}{}", pending.label(), input)),
            (Some(pending), None) => Some(pending.label().to_owned()),
            (None, Some(input)) => Some(input),
            (None, None) => self.message.clone(),
        };
        draw_status(writer, &self.layout, &combine_status(base, extra.as_deref()))?;
        Ok(())
    }
}
