use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pdfmark_core::EditorConfig;
use pdfmark_outline::OutlineDocument;
use tracing::{info, instrument};

use crate::formats::{read_bookmarks, BookmarkFormat};
use crate::loader::default_output_path;

/// Writes the document's existing outline as JSON or CSV, to `output` or
/// stdout.
#[instrument]
pub fn extract(pdf: &Path, format: Option<BookmarkFormat>, output: Option<&Path>) -> Result<()> {
    let document =
        OutlineDocument::load(pdf).with_context(|| format!("failed to open {:?}", pdf))?;
    let tree = document.extract_bookmarks()?;
    let format = BookmarkFormat::resolve(format, output);
    let text = format.render(&tree)?;

    match output {
        Some(path) => {
            std::fs::write(path, &text).with_context(|| format!("failed to write {:?}", path))?;
            info!(bookmarks = tree.len(), path = %path.display(), "exported outline");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

/// Replaces the document's outline with the bookmarks in `bookmarks` and
/// saves the result. Returns the path written.
#[instrument(skip(config))]
pub fn apply(
    pdf: &Path,
    bookmarks: &Path,
    format: Option<BookmarkFormat>,
    output: Option<&Path>,
    config: &EditorConfig,
) -> Result<PathBuf> {
    let format = BookmarkFormat::resolve(format, Some(bookmarks));
    let imported = read_bookmarks(bookmarks, format)?;

    let mut document =
        OutlineDocument::load(pdf).with_context(|| format!("failed to open {:?}", pdf))?;
    document.write_bookmarks(&imported.tree)?;

    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_path(pdf, &config.output_suffix));
    document
        .save(&output)
        .with_context(|| format!("failed to save {:?}", output))?;
    info!(
        bookmarks = imported.tree.len(),
        skipped = imported.skipped,
        "applied bookmarks"
    );
    Ok(output)
}
