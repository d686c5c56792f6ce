//! HTTP client for the Lark / Feishu open API.

use itertools::Itertools;
use serde::{Deserialize, de::DeserializeOwned};
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use super::{
    BlockPage, Client, Container, Error, Grid, HierarchyNode, ObjectKind, Resource,
    split_embed_token,
};
use crate::document::{Block, DocumentMeta};

pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";

const BLOCK_PAGE_SIZE: &str = "500";

pub struct LarkClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_secret: String,
    tenant_token: OnceCell<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, Error> {
        if self.code != 0 {
            return Err(Error::Api {
                code: self.code,
                msg: self.msg,
            });
        }
        self.data.ok_or(Error::EmptyResponse)
    }
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(alias = "files")]
    items: Option<Vec<T>>,
    #[serde(alias = "next_page_token")]
    page_token: Option<String>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Deserialize)]
struct TenantToken {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: String,
}

#[derive(Deserialize)]
struct DocumentData {
    document: DocumentMeta,
}

#[derive(Deserialize)]
struct RawWikiNode {
    space_id: String,
    node_token: String,
    obj_token: String,
    obj_type: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    has_child: bool,
}

impl From<RawWikiNode> for HierarchyNode {
    fn from(value: RawWikiNode) -> Self {
        HierarchyNode {
            token: value.node_token,
            obj_token: value.obj_token,
            title: value.title,
            kind: value.obj_type.into(),
            has_children: value.has_child,
            space_id: Some(value.space_id),
        }
    }
}

#[derive(Deserialize)]
struct WikiNodeData {
    node: RawWikiNode,
}

#[derive(Deserialize)]
struct WikiSpace {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct WikiSpaceData {
    space: WikiSpace,
}

#[derive(Deserialize)]
struct RawDriveFile {
    token: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl From<RawDriveFile> for HierarchyNode {
    fn from(value: RawDriveFile) -> Self {
        let kind = ObjectKind::from(value.kind);
        HierarchyNode {
            obj_token: value.token.clone(),
            token: value.token,
            title: value.name,
            has_children: kind == ObjectKind::Folder,
            kind,
            space_id: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRange {
    #[serde(default)]
    values: Option<Vec<Vec<serde_json::Value>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueRangesData {
    #[serde(default)]
    value_ranges: Vec<ValueRange>,
}

#[derive(Deserialize)]
struct BitableField {
    field_id: String,
    field_name: String,
}

#[derive(Deserialize)]
struct BitableRecord {
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

/// Flatten a sheet or bitable cell value into single-line display text.
pub fn cell_text(value: &serde_json::Value) -> String {
    use serde_json::Value;
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) if items.iter().all(Value::is_object) => {
            items.iter().map(cell_text).collect::<String>()
        }
        Value::Array(items) => items.iter().map(cell_text).join(", "),
        Value::Object(map) => match map.get("text").or_else(|| map.get("name")) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => cell_text(other),
            None => value.to_string(),
        },
    };
    text.replace('\n', "<br>")
}

/// Extract the file name from a `Content-Disposition` header value.
pub fn content_disposition_filename(header: &str) -> Option<String> {
    let mut plain = None;
    for part in header.split(';').map(str::trim) {
        if let Some(encoded) = part.strip_prefix("filename*=") {
            let encoded = encoded.rsplit("''").next().unwrap_or(encoded);
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                return Some(decoded.into_owned());
            }
        } else if let Some(name) = part.strip_prefix("filename=") {
            plain = Some(name.trim_matches('"').to_owned());
        }
    }
    plain.filter(|name| !name.is_empty())
}

impl LarkClient {
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(Error::Transport)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            tenant_token: OnceCell::new(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/open-apis{path}", self.base_url)
    }

    async fn token(&self) -> Result<&str, Error> {
        self.tenant_token
            .get_or_try_init(|| async {
                debug!("request tenant access token");
                let response = self
                    .http
                    .post(self.url("/auth/v3/tenant_access_token/internal"))
                    .json(&serde_json::json!({
                        "app_id": self.app_id,
                        "app_secret": self.app_secret,
                    }))
                    .send()
                    .await
                    .map_err(Error::Transport)?;
                let body = response.bytes().await.map_err(Error::Transport)?;
                let token: TenantToken = serde_json::from_slice(&body).map_err(Error::Decode)?;
                if token.code != 0 {
                    return Err(Error::Api {
                        code: token.code,
                        msg: token.msg,
                    });
                }
                Ok(token.tenant_access_token)
            })
            .await
            .map(String::as_str)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, Error> {
        let token = self.token().await?;
        trace!(path, ?query, "GET");
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(Error::Transport)?;
        let body = response.bytes().await.map_err(Error::Transport)?;
        serde_json::from_slice::<Envelope<T>>(&body)
            .map_err(Error::Decode)?
            .into_result()
    }

    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = query.to_vec();
            if let Some(token) = page_token.as_deref() {
                params.push(("page_token", token));
            }
            let page: Page<T> = self.get(path, &params).await?;
            items.extend(page.items.unwrap_or_default());
            if !page.has_more {
                break;
            }
            match page.page_token {
                Some(next) if page_token.as_deref() != Some(next.as_str()) => {
                    page_token = Some(next)
                }
                _ => break,
            }
        }
        Ok(items)
    }

    async fn download(&self, path: &str) -> Result<Resource, Error> {
        let token = self.token().await?;
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(Error::Transport)?;
        let status = response.status();
        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(content_disposition_filename);
        let body = response.bytes().await.map_err(Error::Transport)?;
        if !status.is_success() {
            return Err(match serde_json::from_slice::<Envelope<serde_json::Value>>(&body) {
                Ok(envelope) => Error::Api {
                    code: envelope.code,
                    msg: envelope.msg,
                },
                Err(_) => Error::Api {
                    code: status.as_u16().into(),
                    msg: status.to_string(),
                },
            });
        }
        Ok(Resource { filename, body })
    }
}

impl Client for LarkClient {
    async fn fetch_document(&self, document_id: &str) -> Result<DocumentMeta, Error> {
        let data: DocumentData = self
            .get(&format!("/docx/v1/documents/{document_id}"), &[])
            .await?;
        Ok(data.document)
    }

    async fn fetch_blocks(
        &self,
        document_id: &str,
        page_token: Option<&str>,
    ) -> Result<BlockPage, Error> {
        let mut query = vec![
            ("page_size", BLOCK_PAGE_SIZE),
            ("document_revision_id", "-1"),
        ];
        if let Some(token) = page_token {
            query.push(("page_token", token));
        }
        let page: Page<serde_json::Value> = self
            .get(&format!("/docx/v1/documents/{document_id}/blocks"), &query)
            .await?;
        block_page(page)
    }

    async fn fetch_children(&self, parent: &Container) -> Result<Vec<HierarchyNode>, Error> {
        match parent {
            Container::Folder { token } => {
                let files: Vec<RawDriveFile> = self
                    .get_all("/drive/v1/files", &[("folder_token", token.as_str())])
                    .await?;
                Ok(files.into_iter().map(Into::into).collect())
            }
            Container::Wiki {
                space_id,
                node_token,
            } => {
                let mut query = vec![("page_size", "50")];
                if let Some(node_token) = node_token {
                    query.push(("parent_node_token", node_token.as_str()));
                }
                let nodes: Vec<RawWikiNode> = self
                    .get_all(&format!("/wiki/v2/spaces/{space_id}/nodes"), &query)
                    .await?;
                Ok(nodes.into_iter().map(Into::into).collect())
            }
        }
    }

    async fn fetch_resource(&self, token: &str) -> Result<Resource, Error> {
        self.download(&format!("/drive/v1/medias/{token}/download"))
            .await
    }

    async fn fetch_file(&self, token: &str) -> Result<Resource, Error> {
        self.download(&format!("/drive/v1/files/{token}/download"))
            .await
    }

    async fn fetch_sheet(&self, token: &str) -> Result<Grid, Error> {
        let (spreadsheet, sheet_id) = split_embed_token("sheet", token)?;
        let data: ValueRangesData = self
            .get(
                &format!("/sheets/v2/spreadsheets/{spreadsheet}/values_batch_get"),
                &[("ranges", sheet_id)],
            )
            .await?;
        let values = data
            .value_ranges
            .into_iter()
            .next()
            .and_then(|range| range.values)
            .unwrap_or_default();
        Ok(values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }

    async fn fetch_bitable(&self, token: &str) -> Result<Grid, Error> {
        let (app, table) = split_embed_token("bitable", token)?;
        let fields: Vec<BitableField> = self
            .get_all(
                &format!("/bitable/v1/apps/{app}/tables/{table}/fields"),
                &[("page_size", "100")],
            )
            .await?;
        let records: Vec<BitableRecord> = self
            .get_all(
                &format!("/bitable/v1/apps/{app}/tables/{table}/records"),
                &[("page_size", "500")],
            )
            .await?;
        let mut grid = Vec::with_capacity(records.len() + 1);
        if !fields.is_empty() {
            grid.push(fields.iter().map(|field| field.field_name.clone()).collect());
        }
        for record in records {
            grid.push(
                fields
                    .iter()
                    .map(|field| {
                        record
                            .fields
                            .get(&field.field_name)
                            .or_else(|| record.fields.get(&field.field_id))
                            .map(cell_text)
                            .unwrap_or_default()
                    })
                    .collect(),
            );
        }
        Ok(grid)
    }

    async fn wiki_node(&self, token: &str) -> Result<HierarchyNode, Error> {
        let data: WikiNodeData = self
            .get("/wiki/v2/spaces/get_node", &[("token", token)])
            .await?;
        Ok(data.node.into())
    }

    async fn wiki_space_name(&self, space_id: &str) -> Result<String, Error> {
        let data: WikiSpaceData = self
            .get(&format!("/wiki/v2/spaces/{space_id}"), &[])
            .await?;
        Ok(data.space.name)
    }
}

/// Decode a page of blocks while keeping the items as delivered.
fn block_page(page: Page<serde_json::Value>) -> Result<BlockPage, Error> {
    let raw = page.items.unwrap_or_default();
    let items = raw
        .iter()
        .map(Block::deserialize)
        .collect::<Result<Vec<_>, _>>()
        .map_err(Error::Decode)?;
    Ok(BlockPage {
        items,
        raw,
        page_token: page.page_token,
        has_more: page.has_more,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Envelope, Page, block_page, cell_text, content_disposition_filename};
    use crate::{
        document::{Block, BlockKind},
        remote::Error,
    };

    #[test]
    fn cell_values() {
        assert_eq!(cell_text(&json!(null)), "");
        assert_eq!(cell_text(&json!("a\nb")), "a<br>b");
        assert_eq!(cell_text(&json!(3)), "3");
        assert_eq!(cell_text(&json!(1.5)), "1.5");
        assert_eq!(cell_text(&json!(true)), "true");
        assert_eq!(cell_text(&json!(["x", 2, false])), "x, 2, false");
        assert_eq!(
            cell_text(&json!([
                { "type": "text", "text": "see " },
                { "type": "url", "text": "docs", "link": "https://example.com" }
            ])),
            "see docs"
        );
        assert_eq!(cell_text(&json!({ "name": "Alice", "id": "ou_1" })), "Alice");
    }

    #[test]
    fn disposition_filenames() {
        assert_eq!(
            content_disposition_filename(r#"attachment; filename="photo.png""#).as_deref(),
            Some("photo.png")
        );
        assert_eq!(
            content_disposition_filename(
                r#"attachment; filename="x.pdf"; filename*=UTF-8''%E6%8A%A5%E5%91%8A.pdf"#
            )
            .as_deref(),
            Some("报告.pdf")
        );
        assert_eq!(content_disposition_filename("inline"), None);
    }

    #[test]
    fn envelope_errors() {
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_value(json!({ "code": 99991663, "msg": "token invalid" })).unwrap();
        assert!(matches!(
            envelope.into_result(),
            Err(Error::Api { code: 99991663, .. })
        ));
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_value(json!({ "code": 0, "msg": "ok" })).unwrap();
        assert!(matches!(envelope.into_result(), Err(Error::EmptyResponse)));
    }

    #[test]
    fn drive_listing_uses_aliases() {
        let page: Page<serde_json::Value> = serde_json::from_value(json!({
            "files": [ { "token": "a" } ],
            "next_page_token": "p2",
            "has_more": true
        }))
        .unwrap();
        assert_eq!(page.items.unwrap().len(), 1);
        assert_eq!(page.page_token.as_deref(), Some("p2"));
        assert!(page.has_more);
    }

    #[test]
    fn block_pages_decode_without_optional_fields() {
        let page: Page<Block> = serde_json::from_value(json!({
            "items": [
                { "block_id": "doc", "block_type": 1, "page": { "elements": [] }, "children": ["p"] }
            ],
            "page_token": "x",
            "has_more": true
        }))
        .unwrap();
        let items = page.items.unwrap();
        assert_eq!(items[0].id, "doc");
        assert_eq!(items[0].children, ["p"]);
        assert_eq!(page.page_token.as_deref(), Some("x"));

        let last: Page<Block> = serde_json::from_value(json!({ "has_more": false })).unwrap();
        assert!(last.items.is_none());
        assert!(last.page_token.is_none());
    }

    #[test]
    fn block_pages_keep_the_wire_items() {
        let page: Page<serde_json::Value> = serde_json::from_value(json!({
            "items": [
                { "block_id": "p", "parent_id": "doc", "block_type": 2,
                  "text": { "elements": [ { "text_run": { "content": "hi" } } ] } }
            ],
            "has_more": false
        }))
        .unwrap();
        let page = block_page(page).unwrap();
        assert!(matches!(page.items[0].kind, BlockKind::Text(_)));
        assert_eq!(page.raw[0]["block_id"], "p");
        assert_eq!(page.raw[0]["block_type"], 2);
        assert!(!page.has_more);
    }
}
