use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use pdfmark_core::{export_csv, export_json, import_csv, import_json, BookmarkTree, Imported};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BookmarkFormat {
    Json,
    Csv,
}

impl BookmarkFormat {
    /// Explicit choice, else the file extension, else JSON.
    pub fn resolve(explicit: Option<Self>, path: Option<&Path>) -> Self {
        explicit
            .or_else(|| path.and_then(Self::from_extension))
            .unwrap_or(BookmarkFormat::Json)
    }

    fn from_extension(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "csv" => Some(BookmarkFormat::Csv),
            "json" => Some(BookmarkFormat::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            BookmarkFormat::Json => "json",
            BookmarkFormat::Csv => "csv",
        }
    }

    pub fn parse(self, text: &str) -> Result<Imported> {
        let imported = match self {
            BookmarkFormat::Json => import_json(text)?,
            BookmarkFormat::Csv => import_csv(text)?,
        };
        Ok(imported)
    }

    pub fn render(self, tree: &BookmarkTree) -> Result<String> {
        match self {
            BookmarkFormat::Json => Ok(export_json(tree)?),
            BookmarkFormat::Csv => Ok(export_csv(tree)),
        }
    }
}

pub fn read_bookmarks(path: &Path, format: BookmarkFormat) -> Result<Imported> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read bookmarks from {:?}", path))?;
    let imported = format
        .parse(&text)
        .with_context(|| format!("failed to import {:?}", path))?;
    if imported.skipped > 0 {
        warn!(
            path = %path.display(),
            skipped = imported.skipped,
            "some bookmark entries could not be read"
        );
    }
    Ok(imported)
}

pub fn write_bookmarks(path: &Path, tree: &BookmarkTree, format: BookmarkFormat) -> Result<()> {
    let text = format.render(tree)?;
    fs::write(path, text).with_context(|| format!("failed to write {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_follows_flag_then_extension() {
        let csv = Path::new("marks.CSV");
        assert_eq!(BookmarkFormat::resolve(None, Some(csv)), BookmarkFormat::Csv);
        assert_eq!(
            BookmarkFormat::resolve(Some(BookmarkFormat::Json), Some(csv)),
            BookmarkFormat::Json
        );
        assert_eq!(
            BookmarkFormat::resolve(None, Some(Path::new("marks.txt"))),
            BookmarkFormat::Json
        );
        assert_eq!(BookmarkFormat::resolve(None, None), BookmarkFormat::Json);
    }

    #[test]
    fn bookmarks_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = BookmarkTree::new();
        let intro = tree.add_top_level("Intro, part \"one\"", 1).unwrap();
        tree.add_child(&intro, "Details", 2).unwrap();

        for format in [BookmarkFormat::Csv, BookmarkFormat::Json] {
            let path = dir.path().join(format!("marks.{}", format.extension()));
            write_bookmarks(&path, &tree, format).unwrap();
            let imported = read_bookmarks(&path, format).unwrap();
            assert_eq!(imported.skipped, 0);
            let titles: Vec<_> = imported
                .tree
                .flatten()
                .into_iter()
                .map(|entry| (entry.node.title.clone(), entry.level))
                .collect();
            assert_eq!(
                titles,
                vec![
                    ("Intro, part \"one\"".to_owned(), 0),
                    ("Details".to_owned(), 1)
                ]
            );
        }
    }

    #[test]
    fn unreadable_files_report_the_path() {
        let err = read_bookmarks(Path::new("/nonexistent/marks.csv"), BookmarkFormat::Csv)
            .unwrap_err();
        assert!(format!("{err:#}").contains("marks.csv"));
    }
}
