use std::path::{Path, PathBuf};

use anyhow::Result;
use pdfmark_core::BookmarkTree;
use pdfmark_outline::OutlineDocument;
use tracing::{info, instrument};

use crate::formats::{read_bookmarks, BookmarkFormat};

/// Where the forest of a new session comes from.
#[derive(Debug, Clone, Default)]
pub struct InitialSource<'a> {
    pub csv: Option<&'a Path>,
    pub json: Option<&'a Path>,
    pub extract: bool,
}

/// Starting forest for a session plus a short note for the status line.
/// CSV wins over JSON, either wins over the document's own outline.
#[instrument(skip(document))]
pub fn initial_forest(
    document: &OutlineDocument,
    source: &InitialSource<'_>,
) -> Result<(BookmarkTree, Option<String>)> {
    let import = source
        .csv
        .map(|path| (path, BookmarkFormat::Csv))
        .or_else(|| source.json.map(|path| (path, BookmarkFormat::Json)));

    if let Some((path, format)) = import {
        let imported = read_bookmarks(path, format)?;
        let note = format!(
            "imported {} bookmarks from {}{}",
            imported.tree.len(),
            path.display(),
            skipped_note(imported.skipped)
        );
        return Ok((imported.tree, Some(note)));
    }

    if source.extract {
        let tree = document.extract_bookmarks()?;
        info!(bookmarks = tree.len(), "extracted existing outline");
        let note = (!tree.is_empty()).then(|| format!("loaded {} existing bookmarks", tree.len()));
        return Ok((tree, note));
    }

    Ok((BookmarkTree::default(), None))
}

pub fn skipped_note(skipped: usize) -> String {
    match skipped {
        0 => String::new(),
        1 => " (1 entry skipped)".to_owned(),
        n => format!(" ({n} entries skipped)"),
    }
}

/// `<dir>/<stem><suffix>.pdf` next to the input.
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_owned());
    input.with_file_name(format!("{stem}{suffix}.pdf"))
}

/// `<dir>/<stem>-bookmarks.<ext>` next to the input.
pub fn export_path(input: &Path, format: BookmarkFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_owned());
    input.with_file_name(format!("{stem}-bookmarks.{}", format.extension()))
}
