//! Leaf pipelines
//!
//! A leaf is one remote object that ends up as one or more files on disk:
//! a docx document rendered to Markdown, or a non-document object downloaded
//! as-is.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::{
    Error, ErrorContext, ErrorDetail,
    config::OutputConfig,
    remote::{Client, ObjectKind},
    render::RenderOptions,
    source::{Source, Target},
};

mod document;
mod file;

pub use document::download_document;
pub use file::download_file;

/// Everything a leaf pipeline needs, shared by all workers of a crawl.
pub struct JobContext<C> {
    pub client: C,
    pub output: OutputConfig,
    pub render: RenderOptions,
    /// Also write the raw API response next to the Markdown.
    pub dump: bool,
    /// Scheme and host that originals are linked to.
    pub origin: String,
}

impl<C: Client> JobContext<C> {
    pub fn new(client: C, output: OutputConfig, dump: bool, origin: impl Into<String>) -> Self {
        Self {
            client,
            render: output.render_options(),
            output,
            dump,
            origin: origin.into(),
        }
    }
}

pub(crate) async fn write_file(path: &Path, contents: &[u8]) -> Result<(), ErrorDetail> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(ErrorDetail::io(parent))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(ErrorDetail::io(path))
}

/// Fetch the single object a document URL points to.
///
/// Wiki nodes are resolved to the object behind them first; docx objects are
/// rendered, other downloadable kinds go through the file pipeline.
pub async fn download_source<C: Client>(
    ctx: &JobContext<C>,
    source: &Source,
    dest: &Path,
) -> Result<PathBuf, Error> {
    match &source.target {
        Target::Document { token } => download_document(ctx, token, dest).await,
        Target::WikiNode { token } => {
            let context = ErrorContext::new(token);
            let node = ctx
                .client
                .wiki_node(token)
                .await
                .map_err(|e| context.error(e.into()))?;
            info!(%token, kind = %node.kind, title = %node.title, "resolved wiki node");
            match node.kind {
                ObjectKind::Docx => download_document(ctx, &node.obj_token, dest).await,
                ObjectKind::Doc => Err(context.error(ErrorDetail::LegacyDocument)),
                kind if kind.is_downloadable_file() => {
                    download_file(ctx, &node.obj_token, &node.title, &kind, dest).await
                }
                kind => Err(context.error(ErrorDetail::Validation(format!(
                    "wiki node points to an unsupported {kind} object"
                )))),
            }
        }
        Target::Folder { token } | Target::WikiSpace { space_id: token } => {
            Err(ErrorContext::new(token).error(ErrorDetail::Validation(
                "hierarchies are downloaded with --batch or --wiki".to_owned(),
            )))
        }
    }
}
