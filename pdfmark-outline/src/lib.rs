//! Reads and replaces the outline (bookmarks) of a PDF document.

mod extract;
mod write;

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfmark_core::BookmarkTree;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("failed to parse PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document has no catalog")]
    MissingCatalog,

    #[error("document has no pages")]
    NoPages,
}

/// Mutable view of a PDF used to read and rewrite its outline.
pub struct OutlineDocument {
    doc: Document,
}

impl OutlineDocument {
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, OutlineError> {
        Ok(Self {
            doc: Document::load(path)?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OutlineError> {
        Ok(Self {
            doc: Document::load_mem(bytes)?,
        })
    }

    pub fn from_document(doc: Document) -> Self {
        Self { doc }
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Best-effort extraction of the existing outline. Entries whose
    /// destination cannot be resolved point at page 1.
    #[instrument(skip(self))]
    pub fn extract_bookmarks(&self) -> Result<BookmarkTree, OutlineError> {
        extract::extract(&self.doc)
    }

    /// Replaces the outline with `tree`. An empty tree removes it.
    #[instrument(skip(self, tree), fields(bookmarks = tree.len()))]
    pub fn write_bookmarks(&mut self, tree: &BookmarkTree) -> Result<(), OutlineError> {
        write::write(&mut self.doc, tree)
    }

    pub fn save(&mut self, path: &Path) -> Result<(), OutlineError> {
        self.doc.save(path)?;
        info!(path = %path.display(), "saved document");
        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>, OutlineError> {
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }
}

fn catalog_id(doc: &Document) -> Result<ObjectId, OutlineError> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| OutlineError::MissingCatalog)
}

fn catalog(doc: &Document) -> Result<&Dictionary, OutlineError> {
    doc.get_object(catalog_id(doc)?)
        .and_then(Object::as_dict)
        .map_err(|_| OutlineError::MissingCatalog)
}

/// Follows an indirect reference, leaving direct objects as they are.
fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some((*value).into()),
        _ => None,
    }
}

/// Small in-memory documents for tests in this and dependent crates.
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures {
    use lopdf::{dictionary, Document, Object, ObjectId, StringFormat};

    /// Minimal document with `pages` blank US-letter pages. Returns the
    /// document, its catalog id and the page ids in order.
    pub fn blank_document(pages: usize) -> (Document, ObjectId, Vec<ObjectId>) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_ids: Vec<ObjectId> = (0..pages)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => Object::Reference(pages_id),
                    "MediaBox" => vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ],
                })
            })
            .collect();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => page_ids.iter().map(|id| Object::Reference(*id)).collect::<Vec<_>>(),
                "Count" => Object::Integer(pages as i64),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));
        (doc, catalog_id, page_ids)
    }

    /// Serialised document with `pages` blank pages and one top-level
    /// outline entry per title, entry `i` pointing at page `i + 1` (clamped).
    pub fn pdf_with_outline(pages: usize, titles: &[&str]) -> Vec<u8> {
        let (mut doc, catalog_id, page_ids) = blank_document(pages);
        if !titles.is_empty() {
            let outlines_id = doc.new_object_id();
            let item_ids: Vec<ObjectId> = titles.iter().map(|_| doc.new_object_id()).collect();
            for (index, title) in titles.iter().enumerate() {
                let page = page_ids[index.min(page_ids.len() - 1)];
                let mut item = dictionary! {
                    "Title" => Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
                    "Parent" => Object::Reference(outlines_id),
                    "Dest" => vec![Object::Reference(page), Object::Name(b"Fit".to_vec())],
                };
                if index > 0 {
                    item.set("Prev", Object::Reference(item_ids[index - 1]));
                }
                if let Some(next) = item_ids.get(index + 1) {
                    item.set("Next", Object::Reference(*next));
                }
                doc.objects.insert(item_ids[index], Object::Dictionary(item));
            }
            doc.objects.insert(
                outlines_id,
                Object::Dictionary(dictionary! {
                    "Type" => "Outlines",
                    "First" => Object::Reference(item_ids[0]),
                    "Last" => Object::Reference(item_ids[item_ids.len() - 1]),
                    "Count" => Object::Integer(titles.len() as i64),
                }),
            );
            if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(catalog_id) {
                catalog.set("Outlines", Object::Reference(outlines_id));
            }
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("serialise test document");
        bytes
    }
}
