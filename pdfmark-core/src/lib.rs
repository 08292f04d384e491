pub mod bookmark;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod history;
pub mod picker;
pub mod selection;
pub mod state;
pub mod transfer;
pub mod tree;

pub use bookmark::{
    clean_title, BookmarkColor, BookmarkEdit, BookmarkId, BookmarkNode, BookmarkStyle, Destination,
};
pub use config::{EditorConfig, ZoomConfig};
pub use document::{
    document_id_for_path, DocumentBackend, DocumentId, DocumentInfo, DocumentMetadata,
    DocumentProvider, PageRenderer, PageSize, RenderGeneration, RenderImage, RenderRequest,
    RenderTicket,
};
pub use editor::{Command, EditDraft, Editor, EditorEvent, VisibleRow};
pub use error::{ConfigError, EditorError, ImportError};
pub use history::History;
pub use picker::{
    CanvasGeometry, DestinationMarker, DestinationPicker, DocPoint, PickedDestination,
};
pub use selection::{CollapsedSet, SelectionSet};
pub use state::{FileStateStore, MemoryStateStore, PersistedViewState, StateStore};
pub use transfer::{export_csv, export_json, import_csv, import_json, Imported};
pub use tree::{matches_search, BookmarkTree, FlatBookmark};
