mod app;
mod batch;
mod formats;
mod loader;
mod view;

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use pdfmark_core::config::project_dirs;
use pdfmark_core::{
    Command, DocumentProvider, Editor, EditorConfig, FileStateStore, MemoryStateStore,
    PageRenderer, StateStore,
};
use pdfmark_outline::OutlineDocument;
use pdfmark_render::PdfRenderFactory;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::app::{App, Session};
use crate::formats::BookmarkFormat;
use crate::loader::{default_output_path, initial_forest, InitialSource};

#[derive(Debug, Parser)]
#[command(
    name = "pdfmark",
    version,
    about = "Edit PDF bookmarks in a kitty-compatible terminal"
)]
struct Cli {
    /// Config file to use instead of the per-user one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Open the interactive editor
    Edit {
        pdf: PathBuf,

        /// Start from the bookmarks in this CSV file
        #[arg(long, conflicts_with = "json")]
        csv: Option<PathBuf>,

        /// Start from the bookmarks in this JSON file
        #[arg(long)]
        json: Option<PathBuf>,

        /// Do not load the document's existing outline
        #[arg(long)]
        no_extract: bool,

        /// Where `w` saves the bookmarked copy
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Page to open on (1-based)
        #[arg(short, long)]
        page: Option<u32>,
    },
    /// Print or export the document's existing outline
    Extract {
        pdf: PathBuf,

        #[arg(short, long, value_enum)]
        format: Option<BookmarkFormat>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write bookmarks from a CSV or JSON file into a copy of the document
    Apply {
        pdf: PathBuf,

        #[arg(short, long)]
        bookmarks: PathBuf,

        #[arg(short, long, value_enum)]
        format: Option<BookmarkFormat>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, Mode::Edit { .. });
    let _log_guard = init_logging(interactive)?;

    let config = EditorConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Mode::Edit {
            pdf,
            csv,
            json,
            no_extract,
            output,
            page,
        } => {
            let source = InitialSource {
                csv: csv.as_deref(),
                json: json.as_deref(),
                extract: config.auto_extract && !no_extract,
            };
            edit(pdf, source, output, page, &config).await
        }
        Mode::Extract {
            pdf,
            format,
            output,
        } => batch::extract(&pdf, format, output.as_deref()),
        Mode::Apply {
            pdf,
            bookmarks,
            format,
            output,
        } => {
            let written = batch::apply(&pdf, &bookmarks, format, output.as_deref(), &config)?;
            println!("{}", written.display());
            Ok(())
        }
    }
}

async fn edit(
    pdf: PathBuf,
    source: InitialSource<'_>,
    output: Option<PathBuf>,
    page: Option<u32>,
    config: &EditorConfig,
) -> Result<()> {
    let outline =
        OutlineDocument::load(&pdf).with_context(|| format!("failed to open {:?}", pdf))?;
    let (tree, notice) = initial_forest(&outline, &source)?;

    let provider = PdfRenderFactory::new()?;
    let backend = provider
        .open(&pdf)
        .await
        .with_context(|| format!("failed to open {:?}", pdf))?;
    let renderer = Arc::new(PageRenderer::new(backend));
    let info = renderer.info().clone();

    let store: Arc<dyn StateStore> = match project_dirs() {
        Some(dirs) => Arc::new(FileStateStore::new(dirs.data_local_dir().join("state"))?),
        None => {
            warn!("no platform data directory, view state will not persist");
            Arc::new(MemoryStateStore::new())
        }
    };

    let mut editor = Editor::new(info.page_count, tree, config);
    match store.load(&info) {
        Ok(Some(state)) => editor.restore_view(&state),
        Ok(None) => {}
        Err(err) => warn!(?err, "ignoring unreadable view state"),
    }
    if let Some(page) = page {
        editor.apply(Command::GotoPage { page })?;
    }
    editor.drain_events();

    let output_path = output.unwrap_or_else(|| default_output_path(&pdf, &config.output_suffix));
    info!(
        path = %pdf.display(),
        pages = info.page_count,
        bookmarks = editor.tree().len(),
        "editing"
    );

    App::new(Session {
        editor,
        outline,
        renderer,
        store,
        input_path: pdf,
        output_path,
        notice,
    })
    .run()
}

/// File logging under the platform data directory; batch commands also log
/// to stderr since they have no screen to protect.
fn init_logging(interactive: bool) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match project_dirs() {
        Some(dirs) => {
            let log_dir = dirs.data_local_dir().join("logs");
            fs::create_dir_all(&log_dir)?;
            let file_appender = tracing_appender::rolling::never(log_dir, "pdfmark.log");
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    let console_layer =
        (!interactive).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
