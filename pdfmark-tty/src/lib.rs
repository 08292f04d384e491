//! Terminal presentation for the bookmark editor: page images over the kitty
//! graphics protocol, the tree panel and key/mouse mapping.

mod input;
mod kitty;
mod layout;
mod marker;
mod panel;

use std::io::{self, Write};

pub use input::{EventMapper, InputMode, UiEvent};
pub use kitty::{DrawParams, KittyRenderer};
pub use layout::{CellMetrics, ImagePlacement};
pub use marker::draw_destination_marker;
pub use panel::{format_row, row_style};

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}
