//! Sheet, bitable and attachment content referenced from blocks.
//!
//! Embedded objects are fetched once per document before rendering so that the
//! renderer itself stays synchronous. Every fetch is best effort: failures are
//! kept as `Err` and rendered as placeholders.

use std::{collections::HashSet, fmt::Write as _, path::Path};

use bytes::Bytes;
use futures::future::join_all;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use super::inline::unescape_url;
use crate::{
    document::{BlockIndex, BlockKind},
    remote::{self, Client, Grid},
    sanitize_file_name, warn_entry,
};

#[derive(Default)]
pub struct EmbedExtractor<'s> {
    sheets: IndexSet<&'s str>,
    bitables: IndexSet<&'s str>,
    files: IndexMap<&'s str, &'s str>,
}

impl<'s> EmbedExtractor<'s> {
    /// Collect embed tokens reachable from the page block, in document order.
    pub fn analyze(index: &'s BlockIndex, document_id: &str) -> Self {
        let mut extractor = Self::default();
        let mut visited = HashSet::new();
        let mut stack = index.root(document_id).into_iter().collect::<Vec<_>>();
        while let Some(block) = stack.pop() {
            if !visited.insert(block.id.as_str()) {
                continue;
            }
            let children = index.children(block).collect::<Vec<_>>();
            stack.extend(children.into_iter().rev());
            match &block.kind {
                BlockKind::Sheet { token } if !token.is_empty() => {
                    extractor.sheets.insert(token);
                }
                BlockKind::Bitable { token } if !token.is_empty() => {
                    extractor.bitables.insert(token);
                }
                BlockKind::File { token, name } if !token.is_empty() => {
                    extractor.files.insert(token, name);
                }
                _ => {}
            }
        }
        extractor
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty() && self.bitables.is_empty() && self.files.is_empty()
    }

    /// Fetch everything collected. Without a client the resolver stays empty
    /// and every embed renders as unavailable.
    pub async fn into_resolver<C: Client>(self, client: Option<&C>) -> EmbedResolver {
        let Some(client) = client else {
            return EmbedResolver::offline();
        };

        let sheets = join_all(self.sheets.into_iter().map(|token| async move {
            let grid = client
                .fetch_sheet(token)
                .await
                .inspect_err(|error| {
                    warn!(%error, token, "failed to fetch embedded sheet");
                    warn_entry!("embedded sheet {token}: {error}");
                });
            (token.to_owned(), grid)
        }));
        let bitables = join_all(self.bitables.into_iter().map(|token| async move {
            let grid = client
                .fetch_bitable(token)
                .await
                .inspect_err(|error| {
                    warn!(%error, token, "failed to fetch embedded bitable");
                    warn_entry!("embedded bitable {token}: {error}");
                });
            (token.to_owned(), grid)
        }));
        let files = join_all(self.files.into_iter().map(|(token, name)| async move {
            let attachment = client
                .fetch_resource(token)
                .await
                .map(|resource| {
                    let file_name = resource
                        .filename
                        .as_deref()
                        .filter(|name| !name.is_empty())
                        .or(Some(name).filter(|name| !name.is_empty()))
                        .unwrap_or(token);
                    Attachment {
                        file_name: sanitize_file_name(file_name),
                        body: resource.body,
                    }
                })
                .inspect_err(|error| {
                    warn!(%error, token, "failed to download attachment");
                    warn_entry!("attachment {token}: {error}");
                });
            (token.to_owned(), attachment)
        }));
        let (sheets, bitables, files) = futures::join!(sheets, bitables, files);
        let mut used = HashSet::new();
        let files = files
            .into_iter()
            .map(|(token, attachment)| {
                let attachment = attachment.map(|mut attachment| {
                    attachment.file_name = unique_file_name(&attachment.file_name, &mut used);
                    attachment
                });
                (token, attachment)
            })
            .collect::<Vec<_>>();
        debug!(
            sheets = sheets.len(),
            bitables = bitables.len(),
            files = files.len(),
            "resolved embeds"
        );

        EmbedResolver {
            online: true,
            sheets: sheets.into_iter().collect(),
            bitables: bitables.into_iter().collect(),
            files: files.into_iter().collect(),
        }
    }
}

/// A downloaded attachment, written next to the images of the document.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub body: Bytes,
}

#[derive(Debug, Default)]
pub struct EmbedResolver {
    online: bool,
    sheets: IndexMap<String, Result<Grid, remote::Error>>,
    bitables: IndexMap<String, Result<Grid, remote::Error>>,
    files: IndexMap<String, Result<Attachment, remote::Error>>,
}

enum Resolution<'a, T> {
    Unavailable,
    Failed(&'a remote::Error),
    Resolved(&'a T),
}

impl EmbedResolver {
    pub fn offline() -> Self {
        Self::default()
    }

    fn lookup<'a, T>(
        &self,
        map: &'a IndexMap<String, Result<T, remote::Error>>,
        token: &str,
    ) -> Resolution<'a, T> {
        match map.get(token) {
            Some(Ok(value)) => Resolution::Resolved(value),
            Some(Err(error)) => Resolution::Failed(error),
            None => Resolution::Unavailable,
        }
    }

    /// Successfully downloaded attachments, in block discovery order.
    pub fn attachments(&self) -> impl Iterator<Item = &Attachment> {
        self.files.values().filter_map(|file| file.as_ref().ok())
    }

    pub(super) fn render_sheet(&self, token: &str) -> String {
        let heading = "📊 Embedded spreadsheet";
        match self.lookup(&self.sheets, token) {
            Resolution::Resolved(grid) if !is_empty_grid(grid) => pipe_table(grid),
            Resolution::Resolved(_) => placeholder(heading, token, "*The spreadsheet is empty*"),
            Resolution::Failed(error) => placeholder(heading, token, &failure_note("spreadsheet", error)),
            Resolution::Unavailable => placeholder(
                heading,
                token,
                &self.unavailable_note("spreadsheet"),
            ),
        }
    }

    pub(super) fn render_bitable(&self, token: &str) -> String {
        let heading = "📊 Bitable";
        match self.lookup(&self.bitables, token) {
            Resolution::Resolved(grid) if !is_empty_grid(grid) => pipe_table(grid),
            Resolution::Resolved(_) => placeholder(heading, token, "*The bitable is empty*"),
            Resolution::Failed(error) => placeholder(heading, token, &failure_note("bitable", error)),
            Resolution::Unavailable => {
                placeholder(heading, token, &self.unavailable_note("bitable"))
            }
        }
    }

    pub(super) fn render_file(&self, token: &str, name: &str, image_dir: &str) -> String {
        let display_name = if name.is_empty() { token } else { name };
        let kind = attachment_kind(display_name);
        let mut out = format!("\n**Attachment**: {display_name} ({kind})\n\n");
        match self.lookup(&self.files, token) {
            Resolution::Resolved(attachment) => {
                writeln!(
                    out,
                    "[{}]({image_dir}/{})\n",
                    attachment.file_name,
                    urlencoding::encode(&attachment.file_name)
                )
                .unwrap();
            }
            Resolution::Failed(_) | Resolution::Unavailable => {
                writeln!(out, "**File token**: `{token}`\n").unwrap();
                writeln!(
                    out,
                    "**Note**: this {kind} attachment could not be downloaded, open the original document to view it.\n"
                )
                .unwrap();
            }
        }
        out
    }

    fn unavailable_note(&self, what: &str) -> String {
        if self.online {
            format!("*Note: the {what} content was not fetched*")
        } else {
            format!("*Note: the {what} content is unavailable without a remote client*")
        }
    }
}

fn failure_note(what: &str, error: &remote::Error) -> String {
    match error {
        remote::Error::InvalidToken { .. } => {
            format!("*Note: this {what} is embedded in an unsupported way and cannot be fetched*")
        }
        error if error.is_inaccessible() => format!(
            "*Note: the {what} is not accessible (missing permission or it no longer exists)*"
        ),
        error => format!("*Failed to fetch the {what} content: {error}*"),
    }
}

/// `name`, or `stem-N.ext` with the first free N when `name` is taken.
fn unique_file_name(name: &str, used: &mut HashSet<String>) -> String {
    if used.insert(name.to_owned()) {
        return name.to_owned();
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name);
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    (1..)
        .map(|n| format!("{stem}-{n}{extension}"))
        .find(|candidate| used.insert(candidate.clone()))
        .unwrap_or_else(|| name.to_owned())
}

fn is_empty_grid(grid: &Grid) -> bool {
    grid.iter().all(Vec::is_empty)
}

fn placeholder(heading: &str, token: &str, note: &str) -> String {
    let mut out = format!("\n\n> **{heading}**\n>\n");
    if !token.is_empty() {
        writeln!(out, "> Token: `{token}`").unwrap();
    }
    writeln!(out, ">\n> {note}\n\n").unwrap();
    out
}

fn pipe_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace('\n', "<br>")
}

/// Render a grid as a Markdown pipe table whose first row is the header.
pub fn pipe_table(grid: &Grid) -> String {
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = String::from("\n\n");
    for (i, row) in grid.iter().enumerate() {
        out.push('|');
        for col in 0..width {
            let cell = row.get(col).map(String::as_str).unwrap_or_default();
            write!(out, " {} |", pipe_cell(cell)).unwrap();
        }
        out.push('\n');
        if i == 0 {
            out.push('|');
            out.push_str(&" --- |".repeat(width));
            out.push('\n');
        }
    }
    out.push('\n');
    out
}

/// Human readable kind of an attachment, guessed from its file name.
pub fn attachment_kind(file_name: &str) -> &'static str {
    let Some(mime) = mime_guess::from_path(file_name).first() else {
        return "file";
    };
    match (mime.type_().as_str(), mime.subtype().as_str()) {
        ("video", _) => "video",
        ("application", "pdf") => "PDF",
        ("application", "msword") => "Word document",
        ("application", subtype) if subtype.contains("wordprocessingml") => "Word document",
        ("application", "vnd.ms-excel") => "Excel spreadsheet",
        ("application", subtype) if subtype.contains("spreadsheetml") => "Excel spreadsheet",
        _ => "file",
    }
}

pub(super) fn render_diagram(diagram_type: u32) -> String {
    let kind = if diagram_type == 2 { "UML diagram" } else { "Flowchart" };
    format!(
        "\n\n**📈 {kind}**\n\n> *Note: diagrams cannot be converted to Markdown, export them as images or redraw them with Mermaid*\n\n\n"
    )
}

fn iframe_provider(iframe_type: u32) -> &'static str {
    match iframe_type {
        1 => "Bilibili",
        2 => "Xigua Video",
        3 => "Youku",
        4 => "Airtable",
        5 => "Baidu Map",
        6 => "Amap",
        7 => "TikTok",
        8 => "Figma",
        9 => "Modao",
        10 => "Canva",
        11 => "CodePen",
        12 => "Feishu Survey",
        13 => "Jinshuju",
        14 => "Google Map",
        15 => "YouTube",
        99 => "Other",
        _ => "Unknown",
    }
}

pub(super) fn render_iframe(iframe_type: u32, url: &str) -> String {
    let mut out = String::from("\n\n**🔗 Embedded content**\n\n");
    writeln!(out, "> Type: {}", iframe_provider(iframe_type)).unwrap();
    if !url.is_empty() {
        writeln!(out, ">\n> Link: {}", unescape_url(url)).unwrap();
    }
    out.push_str(">\n> *Note: embedded content cannot be shown in Markdown, open the original document to view it*\n\n\n");
    out
}
