//! Block tree to Markdown.
//!
//! Rendering is a pure function of the [`BlockIndex`], the pre-resolved
//! [`EmbedResolver`] and [`RenderOptions`]. Image blocks are emitted with their
//! token as the target; the tokens are returned in traversal order so that the
//! caller can download them and substitute local paths.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::document::{Block, BlockIndex, BlockKind, InlineElement, Text};

pub mod code;
pub mod embed;
pub mod inline;
pub mod table;

pub use embed::{EmbedExtractor, EmbedResolver};
pub use inline::InlineStyler;

const INDENT: &str = "\t";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub use_html_tags: bool,
    /// Directory, relative to the Markdown file, that holds images and attachments.
    pub image_dir: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            use_html_tags: false,
            image_dir: "static".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub markdown: String,
    /// Image tokens in the order their blocks were visited.
    pub image_tokens: Vec<String>,
}

pub struct Renderer<'a> {
    options: &'a RenderOptions,
    index: &'a BlockIndex,
    embeds: &'a EmbedResolver,
    styler: InlineStyler,
}

impl<'a> Renderer<'a> {
    pub fn new(options: &'a RenderOptions, index: &'a BlockIndex, embeds: &'a EmbedResolver) -> Self {
        Self {
            options,
            index,
            embeds,
            styler: InlineStyler::new(options.use_html_tags),
        }
    }

    /// Render the document whose page block carries `document_id`. A document
    /// without a page block renders as empty.
    pub fn render_document(&self, document_id: &str) -> Rendered {
        let mut image_tokens = Vec::new();
        let markdown = match self.index.root(document_id) {
            Some(root) => self.block(root, 0, &mut image_tokens),
            None => String::new(),
        };
        Rendered {
            markdown,
            image_tokens,
        }
    }

    /// Render a single subtree. Unknown ids render as empty.
    pub fn render_block(&self, id: &str, indent: usize) -> String {
        match self.index.get(id) {
            Some(block) => self.block(block, indent, &mut Vec::new()),
            None => String::new(),
        }
    }

    fn text(&self, text: &Text) -> String {
        let mut out = self.styler.render(&text.elements, text.elements.len() > 1);
        out.push('\n');
        out
    }

    fn children(&self, block: &Block, indent: usize, images: &mut Vec<String>) -> String {
        self.index
            .children(block)
            .map(|child| self.block(child, indent, images))
            .collect()
    }

    fn block(&self, block: &Block, indent: usize, images: &mut Vec<String>) -> String {
        let prefix = INDENT.repeat(indent);
        match &block.kind {
            BlockKind::Page(text) => {
                let mut out = format!("{prefix}# {}", self.text(text));
                for child in self.index.children(block) {
                    out.push_str(&self.block(child, 0, images));
                    out.push('\n');
                }
                out
            }
            BlockKind::Text(text) => {
                format!("{prefix}{}", self.text(text)) + &self.children(block, indent + 1, images)
            }
            BlockKind::Heading { level, text } => {
                let hashes = "#".repeat((*level).into());
                format!("{prefix}{hashes} {}", self.text(text)) + &self.children(block, 0, images)
            }
            BlockKind::Bullet(text) => {
                format!("{prefix}- {}", self.text(text)) + &self.children(block, indent + 1, images)
            }
            BlockKind::Ordered(text) => {
                let number = self.ordinal(block);
                format!("{prefix}{number}. {}", self.text(text))
                    + &self.children(block, indent + 1, images)
            }
            BlockKind::Todo { done, text } => {
                let mark = if *done { "x" } else { " " };
                format!("{prefix}- [{mark}] {}", self.text(text))
                    + &self.children(block, indent + 1, images)
            }
            BlockKind::Code { language, text } => format!(
                "{prefix}```{}\n{}\n```\n",
                code::language_label(*language),
                self.text(text).trim()
            ),
            BlockKind::Quote(text) => format!("{prefix}> {}", self.text(text)),
            BlockKind::QuoteContainer => {
                let lines = self
                    .index
                    .children(block)
                    .map(|child| {
                        let content = self.block(child, 0, images);
                        format!("> {}  ", content.trim_end_matches('\n'))
                    })
                    .join("\n");
                format!("{prefix}{lines}")
            }
            BlockKind::Callout => format!("{prefix}>[!TIP]\n") + &self.children(block, 0, images),
            BlockKind::Equation(text) => {
                format!("{prefix}$$\n{}\n$$\n", equation_source(text))
            }
            BlockKind::Divider => format!("{prefix}---\n"),
            BlockKind::Image { token } => {
                images.push(token.clone());
                format!("{prefix}![]({token})\n")
            }
            BlockKind::File { token, name } => {
                prefix + &self.embeds.render_file(token, name, &self.options.image_dir)
            }
            BlockKind::Sheet { token } => prefix + &self.embeds.render_sheet(token),
            BlockKind::Bitable { token } => prefix + &self.embeds.render_bitable(token),
            BlockKind::Diagram { diagram_type } => prefix + &embed::render_diagram(*diagram_type),
            BlockKind::Iframe { iframe_type, url } => {
                prefix + &embed::render_iframe(*iframe_type, url)
            }
            BlockKind::Table(table) => {
                let html = table::render_table(
                    table.column_size,
                    &table.cells,
                    &table.merges,
                    |cell_id| match self.index.get(cell_id) {
                        Some(cell) => self.block(cell, 0, images),
                        None => String::new(),
                    },
                );
                prefix + &html
            }
            BlockKind::TableCell => {
                let contents = self
                    .index
                    .children(block)
                    .map(|child| self.block(child, 0, images))
                    .join("<br/>");
                format!("{prefix}{contents}")
            }
            BlockKind::Grid => self
                .index
                .children(block)
                .map(|column| self.children(column, indent, images))
                .collect(),
            BlockKind::GridColumn | BlockKind::Unknown(_) => self.children(block, indent, images),
        }
    }

    /// Position of an ordered item within the run of ordered siblings ending at it.
    fn ordinal(&self, block: &Block) -> usize {
        let Some(parent) = self.index.get(&block.parent_id) else {
            return 1;
        };
        let Some(position) = parent.children.iter().position(|id| *id == block.id) else {
            return 1;
        };
        1 + parent.children[..position]
            .iter()
            .rev()
            .take_while(|id| self.index.get(id).is_some_and(Block::is_ordered))
            .count()
    }
}

fn equation_source(text: &Text) -> String {
    text.elements
        .iter()
        .map(|element| match element {
            InlineElement::TextRun { content, .. } => content.as_str(),
            InlineElement::Equation { content } => content.strip_suffix('\n').unwrap_or(content),
            _ => "",
        })
        .collect()
}
