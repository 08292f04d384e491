use crossterm::terminal;
use pdfmark_core::{CanvasGeometry, PageSize};

/// Pixel size of one terminal cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub width: f64,
    pub height: f64,
}

impl CellMetrics {
    pub const FALLBACK: CellMetrics = CellMetrics {
        width: 8.0,
        height: 16.0,
    };

    /// Asks the terminal for its pixel size; terminals that do not report
    /// one get [`CellMetrics::FALLBACK`].
    pub fn detect() -> Self {
        match terminal::window_size() {
            Ok(size) if size.width > 0 && size.height > 0 && size.columns > 0 && size.rows > 0 => {
                CellMetrics {
                    width: f64::from(size.width) / f64::from(size.columns),
                    height: f64::from(size.height) / f64::from(size.rows),
                }
            }
            _ => Self::FALLBACK,
        }
    }
}

/// Where the page image sits on screen, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePlacement {
    pub column: u16,
    pub row: u16,
    pub columns: u16,
    pub rows: u16,
}

impl ImagePlacement {
    /// Largest placement inside the given cell area that keeps the page's
    /// aspect ratio.
    pub fn fit(
        page: PageSize,
        column: u16,
        row: u16,
        columns: u16,
        rows: u16,
        metrics: CellMetrics,
    ) -> Self {
        let avail_width = f64::from(columns) * metrics.width;
        let avail_height = f64::from(rows) * metrics.height;
        let page_width = f64::from(page.width.max(1.0));
        let page_height = f64::from(page.height.max(1.0));

        let scale = (avail_width / page_width).min(avail_height / page_height);
        let fitted_columns = ((page_width * scale) / metrics.width).round() as u16;
        let fitted_rows = ((page_height * scale) / metrics.height).round() as u16;

        Self {
            column,
            row,
            columns: fitted_columns.clamp(1, columns.max(1)),
            rows: fitted_rows.clamp(1, rows.max(1)),
        }
    }

    /// Mapping between the displayed image and the page it shows.
    pub fn geometry(&self, page: PageSize, metrics: CellMetrics) -> CanvasGeometry {
        CanvasGeometry {
            render_width: f64::from(page.width),
            render_height: f64::from(page.height),
            display_width: f64::from(self.columns) * metrics.width,
            display_height: f64::from(self.rows) * metrics.height,
        }
    }

    /// Center of a terminal cell relative to the image's top-left corner, in
    /// display pixels. Cells outside the image give coordinates outside it.
    pub fn cell_to_pixel(&self, column: u16, row: u16, metrics: CellMetrics) -> (f64, f64) {
        (
            (f64::from(column) - f64::from(self.column) + 0.5) * metrics.width,
            (f64::from(row) - f64::from(self.row) + 0.5) * metrics.height,
        )
    }
}
