//! Scenario tests against an in-memory remote.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
    sync::Mutex,
};

use bytes::Bytes;
use serde_json::{Value, json};

use crate::{
    config::OutputConfig,
    document::{Block, BlockKind, DocumentMeta, InlineElement, Text},
    job::JobContext,
    remote::{
        BlockPage, Client, Container, Error, Grid, HierarchyNode, ObjectKind, Resource,
        split_embed_token,
    },
};


const ORIGIN: &str = "https://example.feishu.cn";

#[derive(Default)]
pub(crate) struct FakeClient {
    page_size: Option<usize>,
    documents: HashMap<String, (DocumentMeta, Vec<Value>)>,
    failing: HashSet<String>,
    children: HashMap<String, Vec<HierarchyNode>>,
    failing_listings: HashSet<String>,
    media: HashMap<String, Resource>,
    files: HashMap<String, Resource>,
    sheets: HashMap<String, Grid>,
    inaccessible: HashSet<String>,
    wiki_nodes: HashMap<String, HierarchyNode>,
    spaces: HashMap<String, String>,
    requested: Mutex<Vec<String>>,
}

fn api_error(msg: impl Into<String>) -> Error {
    Error::Api {
        code: 1254000,
        msg: msg.into(),
    }
}

fn wire_text(text: &Text) -> Value {
    let elements = text
        .elements
        .iter()
        .filter_map(|element| match element {
            InlineElement::TextRun { content, .. } => {
                Some(json!({ "text_run": { "content": content } }))
            }
            _ => None,
        })
        .collect::<Vec<_>>();
    json!({ "elements": elements })
}

/// The API's wire form of the block kinds these scenarios use.
fn wire(block: &Block) -> Value {
    let (block_type, field, payload) = match &block.kind {
        BlockKind::Page(text) => (1, "page", wire_text(text)),
        BlockKind::Text(text) => (2, "text", wire_text(text)),
        BlockKind::File { token, name } => (23, "file", json!({ "token": token, "name": name })),
        BlockKind::Image { token } => (27, "image", json!({ "token": token })),
        BlockKind::Sheet { token } => (30, "sheet", json!({ "token": token })),
        BlockKind::Grid => (24, "grid", json!({})),
        BlockKind::GridColumn => (25, "grid_column", json!({})),
        other => panic!("no wire form for {other:?}"),
    };
    let mut value = json!({
        "block_id": block.id,
        "parent_id": block.parent_id,
        "children": block.children,
        "block_type": block_type,
    });
    value[field] = payload;
    value
}

fn container_key(container: &Container) -> &str {
    match container {
        Container::Folder { token } => token,
        Container::Wiki {
            node_token: Some(token),
            ..
        } => token,
        Container::Wiki { space_id, .. } => space_id,
    }
}

impl FakeClient {
    pub fn paged(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// A docx document whose page block holds `children`.
    pub fn document(mut self, token: &str, title: &str, blocks: Vec<Block>) -> Self {
        let children = blocks
            .iter()
            .filter(|block| block.parent_id == token)
            .map(|block| block.id.clone())
            .collect::<Vec<_>>();
        let page = Block::new(token, BlockKind::Page(Text::plain(title))).with_children(children);
        let all = std::iter::once(page)
            .chain(blocks)
            .map(|block| wire(&block))
            .collect();
        self.documents.insert(
            token.to_owned(),
            (
                DocumentMeta {
                    document_id: token.to_owned(),
                    revision_id: 1,
                    title: title.to_owned(),
                },
                all,
            ),
        );
        self
    }

    pub fn simple_document(self, token: &str) -> Self {
        let body = Block::new(format!("{token}-p"), BlockKind::Text(Text::plain(token)))
            .with_parent(token);
        self.document(token, token, vec![body])
    }

    pub fn failing_document(mut self, token: &str) -> Self {
        self.failing.insert(token.to_owned());
        self
    }

    pub fn children(mut self, container: &str, nodes: Vec<HierarchyNode>) -> Self {
        self.children.insert(container.to_owned(), nodes);
        self
    }

    pub fn failing_listing(mut self, container: &str) -> Self {
        self.failing_listings.insert(container.to_owned());
        self
    }

    pub fn media(mut self, token: &str, filename: Option<&str>, body: &'static [u8]) -> Self {
        self.media.insert(
            token.to_owned(),
            Resource {
                filename: filename.map(ToOwned::to_owned),
                body: Bytes::from_static(body),
            },
        );
        self
    }

    pub fn file(mut self, token: &str, filename: &str, body: &'static [u8]) -> Self {
        self.files.insert(
            token.to_owned(),
            Resource {
                filename: Some(filename.to_owned()),
                body: Bytes::from_static(body),
            },
        );
        self
    }

    pub fn sheet(mut self, token: &str, grid: Grid) -> Self {
        self.sheets.insert(token.to_owned(), grid);
        self
    }

    pub fn inaccessible(mut self, token: &str) -> Self {
        self.inaccessible.insert(token.to_owned());
        self
    }

    pub fn node_info(mut self, node: HierarchyNode) -> Self {
        self.wiki_nodes.insert(node.token.clone(), node);
        self
    }

    pub fn space(mut self, space_id: &str, name: &str) -> Self {
        self.spaces.insert(space_id.to_owned(), name.to_owned());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.requested.lock().unwrap().push(call);
    }
}

impl Client for FakeClient {
    async fn fetch_document(&self, document_id: &str) -> Result<DocumentMeta, Error> {
        self.record(format!("document {document_id}"));
        if self.failing.contains(document_id) {
            return Err(api_error(format!("boom {document_id}")));
        }
        self.documents
            .get(document_id)
            .map(|(meta, _)| meta.clone())
            .ok_or_else(|| api_error("NOTEXIST"))
    }

    async fn fetch_blocks(
        &self,
        document_id: &str,
        page_token: Option<&str>,
    ) -> Result<BlockPage, Error> {
        self.record(format!("blocks {document_id} {page_token:?}"));
        let (_, raw) = self
            .documents
            .get(document_id)
            .ok_or_else(|| api_error("NOTEXIST"))?;
        let start = page_token
            .map(str::parse::<usize>)
            .transpose()
            .map_err(|_| api_error("bad page"))?
            .unwrap_or(0);
        let total = raw.len();
        let size = self.page_size.unwrap_or(total.max(1));
        let end = (start + size).min(total);
        let raw = raw[start..end].to_vec();
        let items = raw
            .iter()
            .map(|value| serde_json::from_value(value.clone()))
            .collect::<Result<Vec<Block>, _>>()
            .map_err(Error::Decode)?;
        Ok(BlockPage {
            items,
            raw,
            page_token: (end < total).then(|| end.to_string()),
            has_more: end < total,
        })
    }

    async fn fetch_children(&self, parent: &Container) -> Result<Vec<HierarchyNode>, Error> {
        let key = container_key(parent);
        self.record(format!("children {key}"));
        if self.failing_listings.contains(key) {
            return Err(api_error(format!("cannot list {key}")));
        }
        Ok(self.children.get(key).cloned().unwrap_or_default())
    }

    async fn fetch_resource(&self, token: &str) -> Result<Resource, Error> {
        self.record(format!("media {token}"));
        self.media
            .get(token)
            .cloned()
            .ok_or_else(|| api_error("media not found"))
    }

    async fn fetch_file(&self, token: &str) -> Result<Resource, Error> {
        self.record(format!("file {token}"));
        self.files
            .get(token)
            .cloned()
            .ok_or_else(|| api_error("file not found"))
    }

    async fn fetch_sheet(&self, token: &str) -> Result<Grid, Error> {
        split_embed_token("sheet", token)?;
        if self.inaccessible.contains(token) {
            return Err(Error::Api {
                code: 91402,
                msg: "NOTEXIST".into(),
            });
        }
        Ok(self.sheets.get(token).cloned().unwrap_or_default())
    }

    async fn fetch_bitable(&self, token: &str) -> Result<Grid, Error> {
        split_embed_token("bitable", token)?;
        Ok(self.sheets.get(token).cloned().unwrap_or_default())
    }

    async fn wiki_node(&self, token: &str) -> Result<HierarchyNode, Error> {
        self.wiki_nodes
            .get(token)
            .cloned()
            .ok_or_else(|| api_error("NOTEXIST"))
    }

    async fn wiki_space_name(&self, space_id: &str) -> Result<String, Error> {
        self.spaces
            .get(space_id)
            .cloned()
            .ok_or_else(|| api_error("NOTEXIST"))
    }
}

pub(crate) fn node(token: &str, title: &str, kind: ObjectKind) -> HierarchyNode {
    HierarchyNode {
        token: token.to_owned(),
        obj_token: token.to_owned(),
        title: title.to_owned(),
        has_children: kind == ObjectKind::Folder,
        kind,
        space_id: None,
    }
}

pub(crate) fn wiki_node(
    space_id: &str,
    token: &str,
    obj_token: &str,
    title: &str,
    kind: ObjectKind,
    has_children: bool,
) -> HierarchyNode {
    HierarchyNode {
        token: token.to_owned(),
        obj_token: obj_token.to_owned(),
        title: title.to_owned(),
        kind,
        has_children,
        space_id: Some(space_id.to_owned()),
    }
}

pub(crate) fn context(client: FakeClient, output: OutputConfig) -> JobContext<FakeClient> {
    JobContext::new(client, output, false, ORIGIN)
}

pub(crate) async fn read(path: impl AsRef<Path>) -> String {
    tokio::fs::read_to_string(path.as_ref())
        .await
        .unwrap_or_else(|e| panic!("read {}: {e}", path.as_ref().display()))
}
