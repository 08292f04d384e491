use std::io::Write;

use anyhow::Result;
use crossterm::cursor;
use crossterm::style::{Attribute, Print, PrintStyledContent, SetAttribute};
use crossterm::terminal::{Clear, ClearType};
use pdfmark_core::{CanvasGeometry, DocPoint, Editor, PageSize, RenderImage, VisibleRow};
use pdfmark_tty::{format_row, row_style, write_status_line, CellMetrics, ImagePlacement};

const MAX_RENDER_SCALE: f64 = 8.0;

/// Split of the terminal into tree panel, page area and status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub tree_columns: u16,
    pub page_column: u16,
    pub page_columns: u16,
    pub body_rows: u16,
    pub status_row: u16,
}

impl Layout {
    pub fn new(columns: u16, rows: u16) -> Self {
        let tree_columns = (columns / 3)
            .clamp(24, 60)
            .min(columns.saturating_sub(12))
            .max(1);
        let page_column = tree_columns.saturating_add(1);
        Self {
            tree_columns,
            page_column,
            page_columns: columns.saturating_sub(page_column).max(1),
            body_rows: rows.saturating_sub(1).max(1),
            status_row: rows.saturating_sub(1),
        }
    }
}

/// How the current page is shown: the whole page scaled by the zoom, of
/// which a window the size of the page area is visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageView {
    pub placement: ImagePlacement,
    /// Maps the full zoomed page (display pixels) to document space.
    pub geometry: CanvasGeometry,
    pub offset_x: f64,
    pub offset_y: f64,
    pub visible_width: f64,
    pub visible_height: f64,
    pub render_scale: f32,
}

impl PageView {
    pub fn compute(
        page: PageSize,
        zoom: f32,
        layout: &Layout,
        metrics: CellMetrics,
        focus: Option<DocPoint>,
    ) -> Self {
        let (column, columns, rows) = (layout.page_column, layout.page_columns, layout.body_rows);
        let fit = ImagePlacement::fit(page, column, 0, columns, rows, metrics);
        let zoom = f64::from(zoom.max(0.01));
        let full_width = f64::from(fit.columns) * metrics.width * zoom;
        let full_height = f64::from(fit.rows) * metrics.height * zoom;

        let cells = |pixels: f64, cell: f64, limit: u16| {
            ((pixels / cell).round() as u16).clamp(1, limit.max(1))
        };
        let placement = ImagePlacement {
            column,
            row: 0,
            columns: cells(full_width, metrics.width, columns),
            rows: cells(full_height, metrics.height, rows),
        };
        let visible_width = (f64::from(placement.columns) * metrics.width).min(full_width);
        let visible_height = (f64::from(placement.rows) * metrics.height).min(full_height);

        let geometry = CanvasGeometry {
            render_width: f64::from(page.width),
            render_height: f64::from(page.height),
            display_width: full_width,
            display_height: full_height,
        };
        let (focus_x, focus_y) = focus
            .map(|point| geometry.to_canvas(point))
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .unwrap_or((full_width / 2.0, 0.0));
        let origin = |focus: f64, visible: f64, full: f64| {
            (focus - visible / 2.0).clamp(0.0, (full - visible).max(0.0))
        };

        Self {
            placement,
            geometry,
            offset_x: origin(focus_x, visible_width, full_width),
            offset_y: origin(focus_y, visible_height, full_height),
            visible_width,
            visible_height,
            render_scale: (full_width / f64::from(page.width.max(1.0)))
                .clamp(0.1, MAX_RENDER_SCALE) as f32,
        }
    }

    /// Position of a terminal cell on the full zoomed page. Cells outside
    /// the visible window map outside the page.
    pub fn pointer(&self, column: u16, row: u16, metrics: CellMetrics) -> (f64, f64) {
        let (px, py) = self.placement.cell_to_pixel(column, row, metrics);
        if px < 0.0 || py < 0.0 || px > self.visible_width || py > self.visible_height {
            return (-1.0, -1.0);
        }
        (px + self.offset_x, py + self.offset_y)
    }

    /// The visible window of a raster of the full zoomed page.
    pub fn crop(&self, image: &RenderImage) -> RenderImage {
        if self.geometry.display_width <= 0.0 || self.geometry.display_height <= 0.0 {
            return image.clone();
        }
        let ratio_x = f64::from(image.width) / self.geometry.display_width;
        let ratio_y = f64::from(image.height) / self.geometry.display_height;
        crop_render_image(
            image,
            (self.offset_x * ratio_x).round() as u32,
            (self.offset_y * ratio_y).round() as u32,
            (self.visible_width * ratio_x).round() as u32,
            (self.visible_height * ratio_y).round() as u32,
        )
    }
}

fn crop_render_image(
    image: &RenderImage,
    origin_x: u32,
    origin_y: u32,
    width: u32,
    height: u32,
) -> RenderImage {
    if image.width == 0 || image.height == 0 {
        return image.clone();
    }
    let width = width.clamp(1, image.width);
    let height = height.clamp(1, image.height);
    if width == image.width && height == image.height {
        return image.clone();
    }
    let origin_x = origin_x.min(image.width - width);
    let origin_y = origin_y.min(image.height - height);

    let stride = image.width as usize * 4;
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for row in origin_y..origin_y + height {
        let start = row as usize * stride + origin_x as usize * 4;
        pixels.extend_from_slice(&image.pixels[start..start + width as usize * 4]);
    }
    RenderImage {
        width,
        height,
        pixels,
    }
}

/// First visible row of the tree panel, kept so the cursor stays on screen.
#[derive(Debug, Default)]
pub struct TreeScroll {
    offset: usize,
}

impl TreeScroll {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn ensure_visible(&mut self, cursor: usize, height: usize, len: usize) {
        if height == 0 || len == 0 {
            self.offset = 0;
            return;
        }
        self.offset = self.offset.min(len.saturating_sub(height));
        if cursor < self.offset {
            self.offset = cursor;
        } else if cursor >= self.offset + height {
            self.offset = cursor + 1 - height;
        }
    }
}

pub fn draw_tree<W: Write>(
    writer: &mut W,
    rows: &[VisibleRow<'_>],
    cursor: usize,
    scroll: &TreeScroll,
    layout: &Layout,
    batch_mode: bool,
) -> Result<()> {
    let width = usize::from(layout.tree_columns);
    for line in 0..layout.body_rows {
        crossterm::queue!(writer, cursor::MoveTo(0, line))?;
        let index = scroll.offset() + usize::from(line);
        match rows.get(index) {
            Some(row) => {
                let text = format_row(row, batch_mode, width);
                let style = row_style(row.node, index == cursor);
                crossterm::queue!(writer, PrintStyledContent(style.apply(text)))?;
            }
            None if rows.is_empty() && line == 0 => {
                let hint = format!("{:width$}", " no bookmarks (a: add)", width = width);
                crossterm::queue!(
                    writer,
                    SetAttribute(Attribute::Dim),
                    Print(hint.chars().take(width).collect::<String>()),
                    SetAttribute(Attribute::Reset)
                )?;
            }
            None => crossterm::queue!(writer, Print(" ".repeat(width)))?,
        }
        crossterm::queue!(writer, cursor::MoveTo(layout.tree_columns, line), Print('│'))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn draw_status<W: Write>(writer: &mut W, layout: &Layout, status: &str) -> Result<()> {
    crossterm::queue!(
        writer,
        cursor::MoveTo(0, layout.status_row),
        Clear(ClearType::CurrentLine),
        SetAttribute(Attribute::Reverse)
    )?;
    write_status_line(writer, status)?;
    crossterm::execute!(writer, SetAttribute(Attribute::Reset))?;
    Ok(())
}

/// Base status text: file, page, zoom, bookmark count, batch selection,
/// picking readout.
pub fn format_status(editor: &Editor, file_name: &str, dirty: bool) -> String {
    let mut status = format!(
        " {}{} | page {}/{} | {:.0}% | {} bookmarks",
        file_name,
        if dirty { " [+]" } else { "" },
        editor.current_page(),
        editor.page_count(),
        editor.zoom() * 100.0,
        editor.tree().len()
    );
    if editor.selection().is_batch_mode() {
        status.push_str(&format!(" | batch: {} selected", editor.selection().len()));
    }
    if !editor.search_query().is_empty() {
        status.push_str(&format!(" | /{}", editor.search_query()));
    }
    if editor.picker().is_picking() {
        match editor.picker().readout() {
            Some(point) => status.push_str(&format!(
                " | pick: x={:.0} y={:.0} (click to set, Esc cancels)",
                point.x, point.y
            )),
            None => status.push_str(" | pick: click on the page (Esc cancels)"),
        }
    }
    status
}

pub fn combine_status(base: String, extra: Option<&str>) -> String {
    match extra.filter(|s| !s.is_empty()) {
        Some(extra) => format!("{base} | {extra}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use pdfmark_core::{BookmarkTree, EditorConfig};

    use super::*;

    const SQUARE: PageSize = PageSize {
        width: 400.0,
        height: 400.0,
    };

    fn layout() -> Layout {
        // Page area: columns 31..=80 (50 cells), rows 0..20.
        Layout {
            tree_columns: 30,
            page_column: 31,
            page_columns: 50,
            body_rows: 20,
            status_row: 20,
        }
    }

    #[test]
    fn layout_leaves_room_for_the_page() {
        let layout = Layout::new(120, 40);
        assert_eq!(layout.tree_columns, 40);
        assert_eq!(layout.page_column, 41);
        assert_eq!(layout.page_columns, 79);
        assert_eq!((layout.body_rows, layout.status_row), (39, 39));

        let narrow = Layout::new(30, 10);
        assert_eq!(narrow.tree_columns, 18);
        assert_eq!(narrow.page_columns, 11);
    }

    #[test]
    fn unzoomed_pages_are_shown_whole() {
        let metrics = CellMetrics::FALLBACK;
        let view = PageView::compute(SQUARE, 1.0, &layout(), metrics, None);
        // 20 rows * 16px = 320px limits the square page; 320 / 8 = 40 columns.
        assert_eq!((view.placement.columns, view.placement.rows), (40, 20));
        assert_eq!((view.offset_x, view.offset_y), (0.0, 0.0));
        assert_eq!(view.geometry.display_width, 320.0);
        assert!((view.render_scale - 0.8).abs() < 1e-6);

        // Top-left cell of the page area lands near the page's top-left corner.
        let (px, py) = view.pointer(31, 0, metrics);
        let point = view.geometry.to_document(px, py);
        assert!((point.x - 5.0).abs() < 1e-9);
        assert!((point.y - 390.0).abs() < 1e-9);

        // The tree panel is outside the page.
        let (px, py) = view.pointer(10, 0, metrics);
        assert!(!view.geometry.contains(px, py));
    }

    #[test]
    fn zoomed_pages_center_on_the_focus() {
        let metrics = CellMetrics::FALLBACK;
        let focus = DocPoint { x: 200.0, y: 200.0 };
        let view = PageView::compute(SQUARE, 2.0, &layout(), metrics, Some(focus));
        // Full page is 640x640 display pixels, the window 400x320.
        assert_eq!(view.geometry.display_width, 640.0);
        assert_eq!((view.visible_width, view.visible_height), (400.0, 320.0));
        assert_eq!((view.offset_x, view.offset_y), (120.0, 160.0));

        // A click in the middle of the window picks the focus point.
        let (px, py) = view.pointer(31 + 25, 10, metrics);
        let point = view.geometry.to_document(px - 4.0, py - 8.0);
        assert!((point.x - 200.0).abs() < 1e-9);
        assert!((point.y - 200.0).abs() < 1e-9);

        let raster = RenderImage {
            width: 640,
            height: 640,
            pixels: vec![0; 640 * 640 * 4],
        };
        let cropped = view.crop(&raster);
        assert_eq!((cropped.width, cropped.height), (400, 320));
    }

    #[test]
    fn crop_keeps_the_requested_window() {
        let image = RenderImage {
            width: 3,
            height: 2,
            pixels: (0..24).collect(),
        };
        let cropped = crop_render_image(&image, 1, 1, 2, 1);
        assert_eq!((cropped.width, cropped.height), (2, 1));
        assert_eq!(cropped.pixels, (16..24).collect::<Vec<u8>>());
    }

    #[test]
    fn scroll_follows_the_cursor() {
        let mut scroll = TreeScroll::default();
        scroll.ensure_visible(12, 5, 20);
        assert_eq!(scroll.offset(), 8);
        scroll.ensure_visible(3, 5, 20);
        assert_eq!(scroll.offset(), 3);
        scroll.ensure_visible(0, 5, 2);
        assert_eq!(scroll.offset(), 0);
    }

    #[test]
    fn status_reports_page_zoom_and_modes() {
        let mut tree = BookmarkTree::new();
        tree.add_top_level("Intro", 1).unwrap();
        let mut editor = Editor::new(5, tree, &EditorConfig::default());
        editor
            .apply(pdfmark_core::Command::GotoPage { page: 3 })
            .unwrap();
        editor
            .apply(pdfmark_core::Command::ToggleBatchMode)
            .unwrap();

        let status = format_status(&editor, "paper.pdf", true);
        assert_eq!(
            status,
            " paper.pdf [+] | page 3/5 | 100% | 1 bookmarks | batch: 0 selected"
        );
        assert_eq!(
            combine_status(status.clone(), Some("saved")),
            format!("{status} | saved")
        );
        assert_eq!(combine_status(status.clone(), Some("")), status);
    }
}
