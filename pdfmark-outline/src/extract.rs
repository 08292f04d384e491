use std::collections::{HashMap, HashSet};

use lopdf::{decode_text_string, Dictionary, Document, Object, ObjectId};
use pdfmark_core::{
    clean_title, BookmarkColor, BookmarkNode, BookmarkStyle, BookmarkTree, Destination,
};
use tracing::{debug, warn};

use crate::{catalog, number, resolve, OutlineError};

const MAX_DEPTH: usize = 64;
const MAX_SIBLINGS: usize = 10_000;
/// Named destinations may point at other names; chains longer than this are
/// treated as unresolvable.
const MAX_NAME_HOPS: usize = 8;
const UNTITLED: &str = "Untitled";

/// Resolved jump target of one outline entry.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Target {
    page: u32,
    destination: Destination,
}

struct Walker<'a> {
    doc: &'a Document,
    catalog: &'a Dictionary,
    /// Page object id to one-based page number.
    pages: HashMap<ObjectId, u32>,
    visited: HashSet<ObjectId>,
}

pub(crate) fn extract(doc: &Document) -> Result<BookmarkTree, OutlineError> {
    let catalog = catalog(doc)?;
    let outlines = match catalog
        .get(b"Outlines")
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok())
    {
        Some(outlines) => outlines,
        None => {
            debug!("document has no outline");
            return Ok(BookmarkTree::default());
        }
    };

    let first = match outlines.get(b"First").and_then(Object::as_reference) {
        Ok(first) => first,
        Err(_) => return Ok(BookmarkTree::default()),
    };

    let mut walker = Walker {
        doc,
        catalog,
        pages: doc
            .get_pages()
            .into_iter()
            .map(|(number, id)| (id, number))
            .collect(),
        visited: HashSet::new(),
    };
    Ok(BookmarkTree::from_roots(walker.siblings(first, 0)))
}

impl<'a> Walker<'a> {
    fn siblings(&mut self, first: ObjectId, depth: usize) -> Vec<BookmarkNode> {
        let mut nodes = Vec::new();
        if depth >= MAX_DEPTH {
            warn!(depth, "outline nested too deeply, ignoring deeper entries");
            return nodes;
        }

        let mut current = Some(first);
        while let Some(item_id) = current {
            if nodes.len() >= MAX_SIBLINGS {
                warn!(limit = MAX_SIBLINGS, "too many outline siblings, truncating");
                break;
            }
            if !self.visited.insert(item_id) {
                warn!(?item_id, "outline contains a cycle");
                break;
            }
            let Some(item) = self
                .doc
                .get_object(item_id)
                .ok()
                .and_then(|object| object.as_dict().ok())
            else {
                warn!(?item_id, "outline entry is not a dictionary");
                break;
            };

            let mut node = self.node(item_id, item);
            if let Ok(child) = item.get(b"First").and_then(Object::as_reference) {
                node.children = self.siblings(child, depth + 1);
            }
            nodes.push(node);

            current = item.get(b"Next").and_then(Object::as_reference).ok();
        }
        nodes
    }

    fn node(&self, item_id: ObjectId, item: &Dictionary) -> BookmarkNode {
        let title = item
            .get(b"Title")
            .ok()
            .and_then(|object| resolve(self.doc, object))
            .and_then(text)
            .map(|title| clean_title(&title))
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| UNTITLED.to_owned());

        let mut node = BookmarkNode::new(title, 1);
        match self.target(item) {
            Some(target) => {
                node.page = target.page;
                node.set_destination(Some(target.destination));
            }
            None => warn!(?item_id, title = %node.title, "could not resolve outline destination"),
        }
        node.color = self.color(item);
        node.style = item
            .get(b"F")
            .ok()
            .and_then(|object| resolve(self.doc, object))
            .and_then(|object| object.as_i64().ok())
            .and_then(BookmarkStyle::from_flags);
        node
    }

    fn color(&self, item: &Dictionary) -> Option<BookmarkColor> {
        let components = item
            .get(b"C")
            .ok()
            .and_then(|object| resolve(self.doc, object))?
            .as_array()
            .ok()?;
        match components.as_slice() {
            [r, g, b] => BookmarkColor::from_rgb(
                number(r)? as f32,
                number(g)? as f32,
                number(b)? as f32,
            ),
            _ => None,
        }
    }

    /// `/Dest` first, then the `/D` entry of a `/GoTo` action.
    fn target(&self, item: &Dictionary) -> Option<Target> {
        if let Ok(dest) = item.get(b"Dest") {
            return self.destination(dest, 0);
        }

        let action = resolve(self.doc, item.get(b"A").ok()?)?.as_dict().ok()?;
        match action.get(b"S").and_then(Object::as_name) {
            Ok(b"GoTo") => self.destination(action.get(b"D").ok()?, 0),
            _ => None,
        }
    }

    /// `hops` counts the name lookups and `/D` unwrappings taken so far.
    fn destination(&self, dest: &Object, hops: usize) -> Option<Target> {
        if hops > MAX_NAME_HOPS {
            warn!(hops, "named destination chain too long or cyclic");
            return None;
        }
        match resolve(self.doc, dest)? {
            Object::Array(items) => self.explicit(items),
            object @ Object::String(..) => self.named(&text(object)?, hops + 1),
            Object::Name(name) => self.named(&String::from_utf8_lossy(name), hops + 1),
            // Named destinations may be wrapped in a dictionary with /D.
            Object::Dictionary(dict) => self.destination(dict.get(b"D").ok()?, hops + 1),
            _ => None,
        }
    }

    fn explicit(&self, items: &[Object]) -> Option<Target> {
        let page = match items.first()? {
            Object::Reference(id) => *self.pages.get(id)?,
            // Some producers write a zero-based page index instead.
            Object::Integer(index) => u32::try_from(*index).ok()?.checked_add(1)?,
            _ => return None,
        };

        let mut destination = Destination::default();
        if let Some(Ok(b"XYZ")) = items.get(1).map(Object::as_name) {
            destination.x = items.get(2).and_then(number);
            destination.y = items.get(3).and_then(number);
            destination.zoom = items
                .get(4)
                .and_then(number)
                .map(|zoom| (zoom * 100.0).round())
                .filter(|zoom| *zoom > 0.0);
        }
        Some(Target { page, destination })
    }

    fn named(&self, name: &str, hops: usize) -> Option<Target> {
        let from_tree = self
            .catalog
            .get(b"Names")
            .ok()
            .and_then(|object| resolve(self.doc, object))
            .and_then(|object| object.as_dict().ok())
            .and_then(|names| names.get(b"Dests").ok())
            .and_then(|object| resolve(self.doc, object))
            .and_then(|object| object.as_dict().ok())
            .and_then(|root| self.lookup_name_tree(root, name, 0));
        if let Some(value) = from_tree {
            return self.destination(value, hops);
        }

        let legacy = resolve(self.doc, self.catalog.get(b"Dests").ok()?)?
            .as_dict()
            .ok()?
            .get(name.as_bytes())
            .ok()?;
        self.destination(legacy, hops)
    }

    fn lookup_name_tree(
        &self,
        node: &'a Dictionary,
        name: &str,
        depth: usize,
    ) -> Option<&'a Object> {
        if depth >= MAX_DEPTH {
            return None;
        }

        if let Some(pairs) = node
            .get(b"Names")
            .ok()
            .and_then(|object| resolve(self.doc, object))
            .and_then(|object| object.as_array().ok())
        {
            for pair in pairs.chunks_exact(2) {
                let key = resolve(self.doc, &pair[0]).and_then(text);
                if key.as_deref() == Some(name) {
                    return Some(&pair[1]);
                }
            }
        }

        let kids = node
            .get(b"Kids")
            .ok()
            .and_then(|object| resolve(self.doc, object))
            .and_then(|object| object.as_array().ok())?;
        kids.iter()
            .filter_map(|kid| resolve(self.doc, kid))
            .filter_map(|kid| kid.as_dict().ok())
            .find_map(|kid| self.lookup_name_tree(kid, name, depth + 1))
    }
}

/// PDF text string in any of its encodings, without a leading byte order mark.
fn text(object: &Object) -> Option<String> {
    let decoded = decode_text_string(object).ok()?;
    Some(decoded.trim_start_matches('\u{feff}').to_owned())
}

#[cfg(test)]
mod tests {
    use lopdf::{dictionary, text_string, Object, StringFormat};

    use super::*;
    use crate::fixtures::blank_document;

    fn literal(text: &str) -> Object {
        Object::String(text.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn attach_outline(doc: &mut Document, catalog_id: ObjectId, first: ObjectId, last: ObjectId) {
        let outlines = doc.add_object(dictionary! {
            "Type" => "Outlines",
            "First" => Object::Reference(first),
            "Last" => Object::Reference(last),
        });
        doc.get_object_mut(catalog_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("Outlines", Object::Reference(outlines));
    }

    #[test]
    fn missing_outline_yields_empty_tree() {
        let (doc, _, _) = blank_document(2);
        assert!(extract(&doc).unwrap().is_empty());
    }

    #[test]
    fn resolves_explicit_action_and_named_destinations() {
        let (mut doc, catalog_id, pages) = blank_document(4);

        let named_dest = doc.add_object(Object::Array(vec![
            Object::Reference(pages[3]),
            "Fit".into(),
        ]));
        let leaf = doc.add_object(dictionary! {
            "Names" => vec![literal("appendix"), Object::Reference(named_dest)],
        });
        let tree_root = doc.add_object(dictionary! {
            "Kids" => vec![Object::Reference(leaf)],
        });
        let names = doc.add_object(dictionary! {
            "Dests" => Object::Reference(tree_root),
        });
        doc.get_object_mut(catalog_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("Names", Object::Reference(names));

        let third = doc.new_object_id();
        let second = doc.new_object_id();
        let first = doc.add_object(dictionary! {
            "Title" => text_string("Intro \u{2013} \u{7ae0}"),
            "Dest" => vec![
                Object::Reference(pages[1]),
                "XYZ".into(),
                Object::Integer(72),
                Object::Real(700.5),
                Object::Real(1.5),
            ],
            "C" => vec![Object::Real(1.0), Object::Real(0.0), Object::Real(0.0)],
            "F" => Object::Integer(3),
            "Next" => Object::Reference(second),
        });
        doc.objects.insert(
            second,
            Object::Dictionary(dictionary! {
                "Title" => literal("Action"),
                "A" => dictionary! {
                    "S" => "GoTo",
                    "D" => vec![
                        Object::Reference(pages[2]),
                        "XYZ".into(),
                        Object::Null,
                        Object::Null,
                        Object::Null,
                    ],
                },
                "Prev" => Object::Reference(first),
                "Next" => Object::Reference(third),
            }),
        );
        doc.objects.insert(
            third,
            Object::Dictionary(dictionary! {
                "Title" => literal("Named"),
                "Dest" => literal("appendix"),
                "Prev" => Object::Reference(second),
            }),
        );
        attach_outline(&mut doc, catalog_id, first, third);

        let tree = extract(&doc).unwrap();
        let roots = tree.roots();
        assert_eq!(roots.len(), 3);

        assert_eq!(roots[0].title, "Intro \u{2013} \u{7ae0}");
        assert_eq!(roots[0].page, 2);
        assert_eq!(roots[0].dest_x, Some(72.0));
        assert_eq!(roots[0].dest_y, Some(700.5));
        assert_eq!(roots[0].zoom, Some(150.0));
        assert_eq!(roots[0].color, Some(BookmarkColor::Red));
        assert_eq!(roots[0].style, Some(BookmarkStyle::BoldItalic));

        assert_eq!(roots[1].page, 3);
        assert!(roots[1].destination().is_none());

        assert_eq!(roots[2].page, 4);
    }

    #[test]
    fn unresolvable_destinations_degrade_to_first_page() {
        let (mut doc, catalog_id, _) = blank_document(2);
        let child = doc.add_object(dictionary! {
            "Title" => literal("Child\u{1}"),
            "Dest" => literal("nowhere"),
        });
        let root = doc.add_object(dictionary! {
            "Title" => literal(""),
            "Dest" => vec![Object::Reference((999, 0)), "XYZ".into()],
            "First" => Object::Reference(child),
            "Last" => Object::Reference(child),
        });
        attach_outline(&mut doc, catalog_id, root, root);

        let tree = extract(&doc).unwrap();
        let root = &tree.roots()[0];
        assert_eq!(root.title, UNTITLED);
        assert_eq!(root.page, 1);
        assert!(root.destination().is_none());
        assert_eq!(root.children[0].title, "Child");
        assert_eq!(root.children[0].page, 1);
    }

    #[test]
    fn cyclic_outlines_terminate() {
        let (mut doc, catalog_id, pages) = blank_document(1);
        let second = doc.new_object_id();
        let first = doc.add_object(dictionary! {
            "Title" => literal("A"),
            "Dest" => vec![Object::Reference(pages[0]), "Fit".into()],
            "Next" => Object::Reference(second),
            "First" => Object::Reference(second),
        });
        doc.objects.insert(
            second,
            Object::Dictionary(dictionary! {
                "Title" => literal("B"),
                "Next" => Object::Reference(first),
            }),
        );
        attach_outline(&mut doc, catalog_id, first, second);

        let tree = extract(&doc).unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn pdfdoc_encoded_titles_keep_their_punctuation() {
        let (mut doc, catalog_id, pages) = blank_document(1);
        let item = doc.add_object(dictionary! {
            "Title" => Object::String(b"Part 1 \x84 Intro \x80".to_vec(), StringFormat::Literal),
            "Dest" => vec![Object::Reference(pages[0]), "Fit".into()],
        });
        attach_outline(&mut doc, catalog_id, item, item);

        let tree = extract(&doc).unwrap();
        assert_eq!(tree.roots()[0].title, "Part 1 \u{2014} Intro \u{2022}");
    }

    #[test]
    fn self_referencing_named_destinations_degrade() {
        let (mut doc, catalog_id, _) = blank_document(2);
        let wrapped = doc.add_object(dictionary! {
            "D" => Object::Name(b"wrapped".to_vec()),
        });
        let dests = doc.add_object(dictionary! {
            "loop" => Object::Name(b"loop".to_vec()),
            "wrapped" => Object::Reference(wrapped),
        });
        doc.get_object_mut(catalog_id)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set("Dests", Object::Reference(dests));

        let second = doc.new_object_id();
        let first = doc.add_object(dictionary! {
            "Title" => literal("Loop"),
            "Dest" => Object::Name(b"loop".to_vec()),
            "Next" => Object::Reference(second),
        });
        doc.objects.insert(
            second,
            Object::Dictionary(dictionary! {
                "Title" => literal("Wrapped"),
                "Dest" => literal("wrapped"),
                "Prev" => Object::Reference(first),
            }),
        );
        attach_outline(&mut doc, catalog_id, first, second);

        let tree = extract(&doc).unwrap();
        let roots = tree.roots();
        assert_eq!(roots.len(), 2);
        for root in roots {
            assert_eq!(root.page, 1);
            assert!(root.destination().is_none());
        }
    }
}
