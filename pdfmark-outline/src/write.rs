use lopdf::{dictionary, encode_utf16_be, Dictionary, Document, Object, ObjectId, StringFormat};
use pdfmark_core::{BookmarkNode, BookmarkStyle, BookmarkTree};
use tracing::debug;

use crate::{catalog_id, OutlineError};

pub(crate) fn write(doc: &mut Document, tree: &BookmarkTree) -> Result<(), OutlineError> {
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    if pages.is_empty() {
        return Err(OutlineError::NoPages);
    }
    let catalog_id = catalog_id(doc)?;

    let outlines = if tree.is_empty() {
        None
    } else {
        let outlines_id = doc.new_object_id();
        let items = write_items(doc, tree.roots(), outlines_id, &pages);
        let mut outlines = dictionary! {
            "Type" => "Outlines",
            "Count" => Object::Integer(items.len() as i64),
        };
        if let (Some(first), Some(last)) = (items.first(), items.last()) {
            outlines.set("First", Object::Reference(*first));
            outlines.set("Last", Object::Reference(*last));
        }
        doc.objects.insert(outlines_id, Object::Dictionary(outlines));
        Some(outlines_id)
    };

    let catalog = doc
        .get_object_mut(catalog_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| OutlineError::MissingCatalog)?;
    match outlines {
        Some(outlines_id) => catalog.set("Outlines", Object::Reference(outlines_id)),
        None => {
            catalog.remove(b"Outlines");
        }
    }

    // Entries of the replaced outline are now unreachable.
    let pruned = doc.prune_objects();
    debug!(pruned = pruned.len(), "replaced outline");
    Ok(())
}

/// Writes one sibling list and returns the item ids in order.
fn write_items(
    doc: &mut Document,
    nodes: &[BookmarkNode],
    parent: ObjectId,
    pages: &[ObjectId],
) -> Vec<ObjectId> {
    let ids: Vec<ObjectId> = nodes.iter().map(|_| doc.new_object_id()).collect();

    for (index, node) in nodes.iter().enumerate() {
        let mut item = dictionary! {
            "Title" => Object::String(encode_utf16_be(&node.title), StringFormat::Hexadecimal),
            "Parent" => Object::Reference(parent),
            "Dest" => destination(node, pages),
        };
        if index > 0 {
            item.set("Prev", Object::Reference(ids[index - 1]));
        }
        if let Some(next) = ids.get(index + 1) {
            item.set("Next", Object::Reference(*next));
        }

        let children = write_items(doc, &node.children, ids[index], pages);
        if let (Some(first), Some(last)) = (children.first(), children.last()) {
            item.set("First", Object::Reference(*first));
            item.set("Last", Object::Reference(*last));
            item.set("Count", Object::Integer(children.len() as i64));
        }

        set_appearance(&mut item, node);
        doc.objects.insert(ids[index], Object::Dictionary(item));
    }
    ids
}

/// `[page /XYZ left top zoom]`, with `null` for unset components. The page
/// is clamped to the document.
fn destination(node: &BookmarkNode, pages: &[ObjectId]) -> Object {
    let index = (node.page.max(1) as usize - 1).min(pages.len() - 1);
    let real = |value: Option<f64>| value.map_or(Object::Null, |v| Object::Real(v as _));
    Object::Array(vec![
        Object::Reference(pages[index]),
        Object::Name(b"XYZ".to_vec()),
        real(node.dest_x),
        real(node.dest_y),
        real(node.zoom.filter(|zoom| *zoom > 0.0).map(|zoom| zoom / 100.0)),
    ])
}

fn set_appearance(item: &mut Dictionary, node: &BookmarkNode) {
    if let Some(color) = node.color {
        let components = color
            .to_rgb()
            .into_iter()
            .map(|c| Object::Real(c as _))
            .collect::<Vec<_>>();
        item.set("C", Object::Array(components));
    }
    let flags = node.style.map_or(0, BookmarkStyle::flags);
    if flags > 0 {
        item.set("F", Object::Integer(flags));
    }
}

#[cfg(test)]
mod tests {
    use pdfmark_core::{BookmarkColor, BookmarkEdit, Destination};

    use super::*;
    use crate::fixtures::blank_document;
    use crate::OutlineDocument;

    fn sample_tree() -> BookmarkTree {
        let mut tree = BookmarkTree::new();
        let chapter = tree.add_top_level("Chapter 1 \u{2013} Überblick", 1).unwrap();
        let section = tree.add_child(&chapter, "Section 1.1", 2).unwrap();
        tree.add_child(&chapter, "Section 1.2", 3).unwrap();
        let appendix = tree.add_top_level("Appendix", 42).unwrap();
        tree.edit(
            &section,
            &BookmarkEdit {
                color: Some(Some(BookmarkColor::Purple)),
                style: Some(Some(BookmarkStyle::Italic)),
                destination: Some(Some(Destination {
                    x: Some(36.0),
                    y: Some(500.0),
                    zoom: Some(125.0),
                })),
                ..BookmarkEdit::default()
            },
        )
        .unwrap();
        tree.edit(
            &appendix,
            &BookmarkEdit {
                color: Some(Some(BookmarkColor::Custom([0x33, 0x66, 0x99]))),
                ..BookmarkEdit::default()
            },
        )
        .unwrap();
        tree
    }

    #[test]
    fn written_outline_links_items_together() {
        let (doc, _, pages) = blank_document(3);
        let mut document = OutlineDocument::from_document(doc);
        document.write_bookmarks(&sample_tree()).unwrap();

        let doc = document.document();
        let catalog = crate::catalog(doc).unwrap();
        let outlines_id = catalog.get(b"Outlines").unwrap().as_reference().unwrap();
        let outlines = doc.get_object(outlines_id).unwrap().as_dict().unwrap();
        assert_eq!(outlines.get(b"Count").unwrap().as_i64().unwrap(), 2);

        let first_id = outlines.get(b"First").unwrap().as_reference().unwrap();
        let first = doc.get_object(first_id).unwrap().as_dict().unwrap();
        assert_eq!(first.get(b"Parent").unwrap().as_reference().unwrap(), outlines_id);
        assert_eq!(first.get(b"Count").unwrap().as_i64().unwrap(), 2);
        assert!(first.get(b"Prev").is_err());

        let appendix_id = outlines.get(b"Last").unwrap().as_reference().unwrap();
        let appendix = doc.get_object(appendix_id).unwrap().as_dict().unwrap();
        assert_eq!(appendix.get(b"Prev").unwrap().as_reference().unwrap(), first_id);
        // Page 42 is clamped to the last page.
        let dest = appendix.get(b"Dest").unwrap().as_array().unwrap();
        assert_eq!(dest[0].as_reference().unwrap(), pages[2]);
        assert!(matches!(dest[2], Object::Null));
    }

    #[test]
    fn saved_outline_extracts_back_to_the_same_forest() {
        let (doc, _, _) = blank_document(3);
        let mut document = OutlineDocument::from_document(doc);
        let tree = sample_tree();
        document.write_bookmarks(&tree).unwrap();
        let bytes = document.to_bytes().unwrap();

        let reloaded = OutlineDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.page_count(), 3);
        let extracted = reloaded.extract_bookmarks().unwrap();

        let shape = |tree: &BookmarkTree| -> Vec<(String, usize)> {
            tree.flatten()
                .into_iter()
                .map(|e| (e.node.title.clone(), e.level))
                .collect()
        };
        assert_eq!(shape(&extracted), shape(&tree));

        let section = &extracted.roots()[0].children[0];
        assert_eq!(section.page, 2);
        assert_eq!(section.color, Some(BookmarkColor::Purple));
        assert_eq!(section.style, Some(BookmarkStyle::Italic));
        assert_eq!(section.dest_x, Some(36.0));
        assert_eq!(section.dest_y, Some(500.0));
        assert_eq!(section.zoom, Some(125.0));

        let appendix = &extracted.roots()[1];
        assert_eq!(appendix.page, 3);
        assert_eq!(appendix.color, Some(BookmarkColor::Custom([0x33, 0x66, 0x99])));
        assert!(appendix.style.is_none());
    }

    #[test]
    fn empty_tree_removes_the_outline() {
        let (doc, _, _) = blank_document(1);
        let mut document = OutlineDocument::from_document(doc);
        document.write_bookmarks(&sample_tree()).unwrap();
        document.write_bookmarks(&BookmarkTree::default()).unwrap();

        let catalog = crate::catalog(document.document()).unwrap();
        assert!(catalog.get(b"Outlines").is_err());
        assert!(document.extract_bookmarks().unwrap().is_empty());
    }

    #[test]
    fn documents_without_pages_are_rejected() {
        let (mut doc, _, _) = blank_document(0);
        assert!(matches!(
            write(&mut doc, &sample_tree()),
            Err(OutlineError::NoPages)
        ));
    }

    #[test]
    fn save_writes_a_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let (doc, _, _) = blank_document(2);
        let mut document = OutlineDocument::from_document(doc);
        document.write_bookmarks(&sample_tree()).unwrap();
        document.save(&path).unwrap();

        let reloaded = OutlineDocument::load(&path).unwrap();
        assert_eq!(reloaded.extract_bookmarks().unwrap().len(), 4);
    }
}
