//! CSV and JSON bookmark files.

use serde_json::Value;
use tracing::{debug, warn};

use crate::bookmark::{clean_title, BookmarkNode};
use crate::error::ImportError;
use crate::tree::BookmarkTree;

pub const CSV_HEADER: &str = "title,page,level";

/// Result of a partial-success import.
#[derive(Debug, Clone, PartialEq)]
pub struct Imported {
    pub tree: BookmarkTree,
    pub skipped: usize,
}

/// One row per node, depth first. Colour, style and destination are not
/// representable in this format.
pub fn export_csv(tree: &BookmarkTree) -> String {
    let mut lines = Vec::with_capacity(tree.len() + 1);
    lines.push(CSV_HEADER.to_owned());
    for entry in tree.flatten() {
        lines.push(format!(
            "\"{}\",{},{}",
            entry.node.title.replace('"', "\"\""),
            entry.node.page,
            entry.level
        ));
    }
    lines.join("\n")
}

pub fn import_csv(text: &str) -> Result<Imported, ImportError> {
    let mut roots: Vec<BookmarkNode> = Vec::new();
    // Path of open ancestors as (level, index into the parent's child list).
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut skipped = 0;

    for (line_no, line) in text.trim().lines().enumerate().skip(1) {
        let line = line.trim_end_matches('\r');
        let Some(row) = parse_csv_row(line) else {
            debug!(line = line_no + 1, "skipping malformed CSV row");
            skipped += 1;
            continue;
        };

        while stack.last().is_some_and(|(level, _)| *level >= row.level) {
            stack.pop();
        }

        let mut siblings = &mut roots;
        for (_, index) in &stack {
            siblings = &mut siblings[*index].children;
        }
        siblings.push(BookmarkNode::new(row.title, row.page));
        stack.push((row.level, siblings.len() - 1));
    }

    if skipped > 0 {
        warn!(skipped, "CSV import skipped malformed rows");
    }
    if roots.is_empty() {
        return Err(ImportError::NoBookmarks { skipped });
    }
    Ok(Imported {
        tree: BookmarkTree::from_roots(roots),
        skipped,
    })
}

struct CsvRow {
    title: String,
    page: u32,
    level: usize,
}

fn parse_csv_row(line: &str) -> Option<CsvRow> {
    let mut fields = line.rsplitn(3, ',');
    let level = parse_digits(fields.next()?)?;
    let page = parse_digits(fields.next()?)?;
    let title = fields.next()?;

    let raw = if title.len() >= 3 && title.starts_with('"') && title.ends_with('"') {
        &title[1..title.len() - 1]
    } else if !title.is_empty() && !title.contains(',') {
        title
    } else {
        return None;
    };
    let title = clean_title(&raw.replace("\"\"", "\""));
    if title.is_empty() {
        return None;
    }

    Some(CsvRow {
        title,
        page: u32::try_from(page).ok()?,
        level: usize::try_from(level).ok()?,
    })
}

fn parse_digits(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Pretty-printed array with two-space indentation.
pub fn export_json(tree: &BookmarkTree) -> Result<String, ImportError> {
    Ok(serde_json::to_string_pretty(tree)?)
}

/// Each top-level element is decoded on its own so one malformed entry does
/// not discard the rest.
pub fn import_json(text: &str) -> Result<Imported, ImportError> {
    let elements: Vec<Value> = serde_json::from_str(text)?;
    let total = elements.len();
    let mut roots = Vec::with_capacity(total);
    let mut skipped = 0;

    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<BookmarkNode>(element) {
            Ok(node) => roots.push(node),
            Err(err) => {
                warn!(index, error = %err, "skipping malformed JSON bookmark");
                skipped += 1;
            }
        }
    }

    if total > 0 && roots.is_empty() {
        return Err(ImportError::NoBookmarks { skipped });
    }
    let mut tree = BookmarkTree::from_roots(roots);
    tree.clean_titles();
    let renamed = tree.dedupe_ids();
    if renamed > 0 {
        debug!(renamed, "reassigned duplicate bookmark ids");
    }
    Ok(Imported { tree, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmark::{BookmarkColor, BookmarkEdit, BookmarkStyle, Destination};

    fn titles_and_levels(tree: &BookmarkTree) -> Vec<(String, u32, usize)> {
        tree.flatten()
            .into_iter()
            .map(|e| (e.node.title.clone(), e.node.page, e.level))
            .collect()
    }

    #[test]
    fn csv_levels_rebuild_nesting() {
        let imported = import_csv("title,page,level\n\"A\",1,0\n\"B\",2,1\n\"C\",3,0").unwrap();
        let roots = imported.tree.roots();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].title, "A");
        assert_eq!(roots[0].children[0].title, "B");
        assert_eq!(roots[1].title, "C");
        assert_eq!(imported.skipped, 0);
    }

    #[test]
    fn csv_accepts_quotes_commas_and_crlf() {
        let text = concat!(
            "title,page,level\r\n",
            "\"Hello, \"\"world\"\"\",4,0\r\n",
            "Plain,5,1\r\n",
            "bad row\r\n",
            ",1,0\r\n",
        );
        let imported = import_csv(text).unwrap();
        assert_eq!(
            titles_and_levels(&imported.tree),
            [
                ("Hello, \"world\"".to_owned(), 4, 0),
                ("Plain".to_owned(), 5, 1)
            ]
        );
        assert_eq!(imported.skipped, 2);
    }

    #[test]
    fn csv_with_no_valid_rows_is_an_error() {
        assert!(matches!(
            import_csv("title,page,level\nnope"),
            Err(ImportError::NoBookmarks { skipped: 1 })
        ));
        assert!(matches!(
            import_csv("title,page,level"),
            Err(ImportError::NoBookmarks { skipped: 0 })
        ));
    }

    #[test]
    fn csv_round_trip_keeps_titles_pages_and_levels() {
        let mut tree = BookmarkTree::new();
        let a = tree.add_top_level("Intro, part \"one\"", 1).unwrap();
        let b = tree.add_child(&a, "Deep", 2).unwrap();
        tree.add_child(&b, "Deeper", 3).unwrap();
        tree.add_top_level("Outro", 9).unwrap();

        let csv = export_csv(&tree);
        assert!(csv.starts_with("title,page,level\n\"Intro, part \"\"one\"\"\",1,0"));
        let imported = import_csv(&csv).unwrap();
        assert_eq!(titles_and_levels(&imported.tree), titles_and_levels(&tree));
    }

    #[test]
    fn json_round_trip_is_lossless() {
        let mut tree = BookmarkTree::new();
        let a = tree.add_top_level("Chapter", 1).unwrap();
        let b = tree.add_child(&a, "Section", 2).unwrap();
        let edit = BookmarkEdit {
            color: Some(Some(BookmarkColor::Purple)),
            style: Some(Some(BookmarkStyle::Bold)),
            destination: Some(Some(Destination {
                x: Some(72.0),
                y: Some(700.0),
                zoom: Some(150.0),
            })),
            ..BookmarkEdit::default()
        };
        tree.edit(&b, &edit).unwrap();

        let json = export_json(&tree).unwrap();
        assert!(json.contains("\n  {\n    \"id\""));
        let imported = import_json(&json).unwrap();
        assert_eq!(imported.tree, tree);
        assert_eq!(imported.skipped, 0);
    }

    #[test]
    fn json_fields_are_written_in_order() {
        let mut tree = BookmarkTree::new();
        tree.add_top_level("A", 1).unwrap();
        let json = export_json(&tree).unwrap();
        let keys = [
            "\"id\"",
            "\"title\"",
            "\"page\"",
            "\"children\"",
            "\"color\"",
            "\"style\"",
            "\"destX\"",
            "\"destY\"",
            "\"zoom\"",
        ];
        let positions: Vec<_> = keys.iter().map(|k| json.find(k).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(json.contains("\"color\": null"));
    }

    #[test]
    fn json_import_skips_malformed_elements_and_cleans_titles() {
        let text = r#"[
            {"id": "1", "title": " One\u0001 ", "page": 1,
             "children": [{"title": "Child\u0007", "page": 2}]},
            {"page": "not a page"},
            42
        ]"#;
        let imported = import_json(text).unwrap();
        assert_eq!(imported.skipped, 2);
        let root = &imported.tree.roots()[0];
        assert_eq!(root.title, "One");
        assert_eq!(root.children[0].title, "Child");
    }

    #[test]
    fn json_import_rejects_non_arrays_and_all_bad_arrays() {
        assert!(matches!(import_json("{}"), Err(ImportError::Json(_))));
        assert!(matches!(import_json("not json"), Err(ImportError::Json(_))));
        assert!(matches!(
            import_json("[1, 2]"),
            Err(ImportError::NoBookmarks { skipped: 2 })
        ));
        assert!(import_json("[]").unwrap().tree.is_empty());
    }

    #[test]
    fn json_import_renames_repeated_ids() {
        let text = r#"[
            {"id": "1", "title": "First", "page": 1,
             "children": [{"id": "1", "title": "Nested", "page": 2}]},
            {"id": "1", "title": "Second", "page": 3}
        ]"#;
        let tree = import_json(text).unwrap().tree;
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.ids().len(), 3);
        let roots = tree.roots();
        assert_eq!(roots[0].id.as_str(), "1");
        assert_ne!(roots[0].children[0].id.as_str(), "1");
        assert_ne!(roots[1].id.as_str(), "1");
    }
}
