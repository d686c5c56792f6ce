//! Remote document API as an opaque capability.
//!
//! Everything above this module talks to [`Client`]; the HTTP implementation
//! lives in [`lark`]. Tests substitute an in-memory client.

use bytes::Bytes;
use derive_debug::Dbg;
use serde::{Deserialize, Serialize};

use crate::document::{Block, DocumentMeta};

pub mod lark;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("API error (code {code}): {msg}")]
    Api { code: i64, msg: String },
    #[error("failed to decode response: {0}")]
    Decode(serde_json::Error),
    #[error("response carries no data")]
    EmptyResponse,
    #[error("invalid {kind} token format (missing underscore separator): {token}")]
    InvalidToken { kind: &'static str, token: String },
}

impl Error {
    /// Whether the API reported the object as missing or forbidden.
    pub fn is_inaccessible(&self) -> bool {
        match self {
            Error::Api { code, msg } => *code == 91402 || msg.contains("NOTEXIST"),
            _ => false,
        }
    }
}

/// Kind of object a hierarchy node points to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectKind {
    Docx,
    Doc,
    Sheet,
    Bitable,
    Mindnote,
    File,
    Folder,
    Other(String),
}

impl ObjectKind {
    pub fn as_str(&self) -> &str {
        match self {
            ObjectKind::Docx => "docx",
            ObjectKind::Doc => "doc",
            ObjectKind::Sheet => "sheet",
            ObjectKind::Bitable => "bitable",
            ObjectKind::Mindnote => "mindnote",
            ObjectKind::File => "file",
            ObjectKind::Folder => "folder",
            ObjectKind::Other(other) => other,
        }
    }

    /// Non-docx objects that are fetched as files rather than rendered.
    pub fn is_downloadable_file(&self) -> bool {
        matches!(
            self,
            ObjectKind::Sheet | ObjectKind::Bitable | ObjectKind::Mindnote | ObjectKind::File
        )
    }
}

impl From<String> for ObjectKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "docx" => ObjectKind::Docx,
            "doc" | "docs" => ObjectKind::Doc,
            "sheet" => ObjectKind::Sheet,
            "bitable" => ObjectKind::Bitable,
            "mindnote" => ObjectKind::Mindnote,
            "file" => ObjectKind::File,
            "folder" => ObjectKind::Folder,
            _ => ObjectKind::Other(value),
        }
    }
}

impl From<ObjectKind> for String {
    fn from(value: ObjectKind) -> Self {
        value.as_str().to_owned()
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a folder listing or a wiki space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    /// Token addressing the node in its hierarchy (wiki node token or file token).
    pub token: String,
    /// Token of the underlying object (document, sheet, ...).
    pub obj_token: String,
    pub title: String,
    pub kind: ObjectKind,
    pub has_children: bool,
    pub space_id: Option<String>,
}

/// A container whose children can be listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Folder { token: String },
    Wiki { space_id: String, node_token: Option<String> },
}

pub struct BlockPage {
    pub items: Vec<Block>,
    /// The same items as delivered on the wire.
    pub raw: Vec<serde_json::Value>,
    pub page_token: Option<String>,
    pub has_more: bool,
}

/// Downloaded binary object.
#[derive(Dbg, Clone)]
pub struct Resource {
    pub filename: Option<String>,
    #[dbg(skip)]
    pub body: Bytes,
}

/// Rows of cell text, first row being the header.
pub type Grid = Vec<Vec<String>>;

pub trait Client: Send + Sync {
    fn fetch_document(
        &self,
        document_id: &str,
    ) -> impl Future<Output = Result<DocumentMeta, Error>> + Send;

    fn fetch_blocks(
        &self,
        document_id: &str,
        page_token: Option<&str>,
    ) -> impl Future<Output = Result<BlockPage, Error>> + Send;

    /// All children of `parent`, pagination already followed.
    fn fetch_children(
        &self,
        parent: &Container,
    ) -> impl Future<Output = Result<Vec<HierarchyNode>, Error>> + Send;

    /// Media embedded in a document (images, attachments).
    fn fetch_resource(&self, token: &str) -> impl Future<Output = Result<Resource, Error>> + Send;

    /// Standalone file stored in the drive.
    fn fetch_file(&self, token: &str) -> impl Future<Output = Result<Resource, Error>> + Send;

    fn fetch_sheet(&self, token: &str) -> impl Future<Output = Result<Grid, Error>> + Send;

    fn fetch_bitable(&self, token: &str) -> impl Future<Output = Result<Grid, Error>> + Send;

    fn wiki_node(&self, token: &str) -> impl Future<Output = Result<HierarchyNode, Error>> + Send;

    fn wiki_space_name(&self, space_id: &str)
    -> impl Future<Output = Result<String, Error>> + Send;
}

/// Every block of a document, decoded and as delivered.
#[derive(Debug, Default)]
pub struct DocumentBlocks {
    pub blocks: Vec<Block>,
    pub raw: Vec<serde_json::Value>,
}

/// Fetch every block of a document, following the page token.
pub async fn fetch_all_blocks<C: Client>(
    client: &C,
    document_id: &str,
) -> Result<DocumentBlocks, Error> {
    let mut all = DocumentBlocks::default();
    let mut page_token: Option<String> = None;
    loop {
        let page = client
            .fetch_blocks(document_id, page_token.as_deref())
            .await?;
        all.blocks.extend(page.items);
        all.raw.extend(page.raw);
        if !page.has_more {
            break;
        }
        match page.page_token {
            Some(next) if page_token.as_deref() != Some(next.as_str()) => page_token = Some(next),
            _ => break,
        }
    }
    Ok(all)
}

/// Split `<object>_<sub id>` embed tokens at the last underscore.
pub fn split_embed_token<'a>(kind: &'static str, token: &'a str) -> Result<(&'a str, &'a str), Error> {
    token
        .rsplit_once('_')
        .ok_or_else(|| Error::InvalidToken {
            kind,
            token: token.to_owned(),
        })
}
