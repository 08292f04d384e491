use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::picker::DestinationMarker;

pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> =
    Lazy::new(|| Uuid::new_v5(&Uuid::NAMESPACE_URL, b"https://pdfmark.invalid/documents"));

/// Stable id for a document, derived from its canonical path.
pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = path
        .canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf());
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&DOCUMENT_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: PathBuf,
    pub page_count: u32,
    pub metadata: DocumentMetadata,
}

/// Page size in document units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderRequest {
    /// Zero-based page index.
    pub page_index: usize,
    /// Pixels per document unit.
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            scale: 1.0,
        }
    }
}

/// Tightly packed RGBA raster.
#[derive(Debug, Clone)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

pub trait DocumentBackend: Send + Sync {
    fn info(&self) -> &DocumentInfo;
    fn page_size(&self, page_index: usize) -> Result<PageSize>;
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage>;
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>>;
}

const CACHE_CAPACITY: usize = 10;

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
struct CacheKey {
    page_index: usize,
    scale_milli: u32,
}

impl CacheKey {
    fn new(page_index: usize, scale: f32) -> Self {
        Self {
            page_index,
            scale_milli: quantize_scale(scale),
        }
    }

    fn distance(&self, reference_page: usize) -> usize {
        self.page_index.abs_diff(reference_page)
    }
}

fn quantize_scale(scale: f32) -> u32 {
    let scaled = (scale * 1000.0).round();
    if !scaled.is_finite() || scaled <= 0.0 {
        1
    } else if scaled > u32::MAX as f32 {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Backend wrapper keeping recently rendered pages. When full, the pages
/// furthest from the one being viewed are evicted first.
pub struct PageRenderer {
    backend: Arc<dyn DocumentBackend>,
    cache: Mutex<HashMap<CacheKey, Arc<RenderImage>>>,
}

impl PageRenderer {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn info(&self) -> &DocumentInfo {
        self.backend.info()
    }

    pub fn page_size(&self, page_index: usize) -> Result<PageSize> {
        self.backend.page_size(page_index)
    }

    pub fn render(&self, request: RenderRequest) -> Result<Arc<RenderImage>> {
        let page_count = self.backend.info().page_count as usize;
        if request.page_index >= page_count {
            return Err(anyhow!("page {} out of range", request.page_index + 1));
        }

        let key = CacheKey::new(request.page_index, request.scale);
        if let Some(image) = self.cache.lock().get(&key).cloned() {
            return Ok(image);
        }

        let image = Arc::new(self.backend.render_page(request)?);
        let mut cache = self.cache.lock();
        cache.insert(key, Arc::clone(&image));
        if cache.len() > CACHE_CAPACITY {
            let mut keys: Vec<_> = cache.keys().copied().collect();
            keys.sort_by_key(|k| k.distance(request.page_index));
            for stale in keys.into_iter().skip(CACHE_CAPACITY) {
                cache.remove(&stale);
            }
        }
        Ok(image)
    }

    pub fn cached_pages(&self) -> usize {
        self.cache.lock().len()
    }
}

/// Monotonic counter behind the last-requested-wins render policy. Clones
/// share the same counter, so render workers can drop superseded work.
#[derive(Debug, Clone, Default)]
pub struct RenderGeneration {
    current: Arc<AtomicU64>,
}

impl RenderGeneration {
    pub fn advance(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current.load(Ordering::SeqCst) == generation
    }
}

/// A page render request tagged with the generation it was issued under.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTicket {
    pub generation: u64,
    /// One-based page number.
    pub page: u32,
    pub zoom: f32,
    pub marker: Option<DestinationMarker>,
}

impl RenderTicket {
    pub fn request(&self) -> RenderRequest {
        RenderRequest {
            page_index: self.page.saturating_sub(1) as usize,
            scale: self.zoom,
        }
    }
}
