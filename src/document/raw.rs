//! Wire shape of docx blocks.
//!
//! Every block carries a numeric `block_type` plus one payload field named
//! after its type. Conversion into [`Block`] never fails: unknown tags become
//! [`BlockKind::Unknown`] and missing payloads decode as empty text.

use serde::Deserialize;

use super::{
    Block, BlockKind, HeadingLevel, InlineElement, MergeMap, Span, Table, Text, TextStyle,
};

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTextStyle {
    language: Option<u32>,
    done: Option<bool>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub(super) struct RawText {
    elements: Vec<InlineElement>,
    style: RawTextStyle,
}

impl From<RawText> for Text {
    fn from(value: RawText) -> Self {
        Text {
            elements: value.elements,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawToken {
    token: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawFile {
    token: String,
    name: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTableProperty {
    column_size: usize,
    merge_info: Vec<Span>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTable {
    cells: Vec<String>,
    property: RawTableProperty,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawDiagram {
    diagram_type: u32,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawIframeComponent {
    iframe_type: u32,
    url: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawIframe {
    component: Option<RawIframeComponent>,
}

#[derive(Deserialize)]
pub(super) struct RawBlock {
    block_id: String,
    #[serde(default)]
    parent_id: String,
    #[serde(default)]
    children: Vec<String>,
    block_type: u32,
    page: Option<RawText>,
    text: Option<RawText>,
    heading1: Option<RawText>,
    heading2: Option<RawText>,
    heading3: Option<RawText>,
    heading4: Option<RawText>,
    heading5: Option<RawText>,
    heading6: Option<RawText>,
    heading7: Option<RawText>,
    heading8: Option<RawText>,
    heading9: Option<RawText>,
    bullet: Option<RawText>,
    ordered: Option<RawText>,
    code: Option<RawText>,
    quote: Option<RawText>,
    equation: Option<RawText>,
    todo: Option<RawText>,
    image: Option<RawToken>,
    file: Option<RawFile>,
    table: Option<RawTable>,
    sheet: Option<RawToken>,
    bitable: Option<RawToken>,
    diagram: Option<RawDiagram>,
    iframe: Option<RawIframe>,
}

impl RawBlock {
    fn take_heading(&mut self, level: HeadingLevel) -> Option<RawText> {
        match level {
            HeadingLevel::H1 => self.heading1.take(),
            HeadingLevel::H2 => self.heading2.take(),
            HeadingLevel::H3 => self.heading3.take(),
            HeadingLevel::H4 => self.heading4.take(),
            HeadingLevel::H5 => self.heading5.take(),
            HeadingLevel::H6 => self.heading6.take(),
            HeadingLevel::H7 => self.heading7.take(),
            HeadingLevel::H8 => self.heading8.take(),
            HeadingLevel::H9 => self.heading9.take(),
        }
    }
}

fn text(raw: Option<RawText>) -> Text {
    raw.map(Into::into).unwrap_or_default()
}

impl From<RawBlock> for Block {
    fn from(mut raw: RawBlock) -> Self {
        let kind = match raw.block_type {
            1 => BlockKind::Page(text(raw.page.take())),
            2 => BlockKind::Text(text(raw.text.take())),
            tag @ 3..=11 => match HeadingLevel::from_block_type(tag) {
                Some(level) => BlockKind::Heading {
                    level,
                    text: text(raw.take_heading(level)),
                },
                None => BlockKind::Unknown(tag),
            },
            12 => BlockKind::Bullet(text(raw.bullet.take())),
            13 => BlockKind::Ordered(text(raw.ordered.take())),
            14 => {
                let code = raw.code.take().unwrap_or_default();
                BlockKind::Code {
                    language: code.style.language.unwrap_or(1),
                    text: code.into(),
                }
            }
            15 => BlockKind::Quote(text(raw.quote.take())),
            16 => BlockKind::Equation(text(raw.equation.take())),
            17 => {
                let todo = raw.todo.take().unwrap_or_default();
                BlockKind::Todo {
                    done: todo.style.done.unwrap_or(false),
                    text: todo.into(),
                }
            }
            18 => BlockKind::Bitable {
                token: raw.bitable.take().unwrap_or_default().token,
            },
            19 => BlockKind::Callout,
            21 => BlockKind::Diagram {
                diagram_type: raw.diagram.take().unwrap_or_default().diagram_type,
            },
            22 => BlockKind::Divider,
            23 => {
                let file = raw.file.take().unwrap_or_default();
                BlockKind::File {
                    token: file.token,
                    name: file.name,
                }
            }
            24 => BlockKind::Grid,
            25 => BlockKind::GridColumn,
            26 => {
                let component = raw
                    .iframe
                    .take()
                    .and_then(|iframe| iframe.component)
                    .unwrap_or_default();
                BlockKind::Iframe {
                    iframe_type: component.iframe_type,
                    url: component.url,
                }
            }
            27 => BlockKind::Image {
                token: raw.image.take().unwrap_or_default().token,
            },
            30 => BlockKind::Sheet {
                token: raw.sheet.take().unwrap_or_default().token,
            },
            31 => {
                let table = raw.table.take().unwrap_or_default();
                let column_size = table.property.column_size;
                BlockKind::Table(Table {
                    column_size,
                    merges: MergeMap::from_dense(column_size, table.property.merge_info),
                    cells: table.cells,
                })
            }
            32 => BlockKind::TableCell,
            34 => BlockKind::QuoteContainer,
            tag => BlockKind::Unknown(tag),
        };
        Block {
            id: raw.block_id,
            parent_id: raw.parent_id,
            children: raw.children,
            kind,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawTextRun {
    content: String,
    text_element_style: Option<TextStyle>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawMentionUser {
    user_id: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawMentionDoc {
    title: String,
    url: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawEquation {
    content: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub(super) struct RawElement {
    text_run: Option<RawTextRun>,
    mention_user: Option<RawMentionUser>,
    mention_doc: Option<RawMentionDoc>,
    equation: Option<RawEquation>,
}

impl From<RawElement> for InlineElement {
    fn from(value: RawElement) -> Self {
        if let Some(run) = value.text_run {
            InlineElement::TextRun {
                content: run.content,
                style: run.text_element_style.unwrap_or_default(),
            }
        } else if let Some(mention) = value.mention_user {
            InlineElement::MentionUser {
                user_id: mention.user_id,
            }
        } else if let Some(mention) = value.mention_doc {
            InlineElement::MentionDoc {
                title: mention.title,
                url: mention.url,
            }
        } else if let Some(equation) = value.equation {
            InlineElement::Equation {
                content: equation.content,
            }
        } else {
            InlineElement::Unsupported
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::document::{Block, BlockKind, HeadingLevel, InlineElement};

    #[test]
    fn decode_heading_by_level() {
        let block: Block = serde_json::from_str(
            r#"{
                "block_id": "h",
                "parent_id": "doc",
                "block_type": 5,
                "heading3": { "elements": [ { "text_run": { "content": "Usage" } } ] }
            }"#,
        )
        .unwrap();
        assert_eq!(
            block.kind,
            BlockKind::Heading {
                level: HeadingLevel::H3,
                text: crate::document::Text::plain("Usage"),
            }
        );
    }

    #[test]
    fn decode_styled_elements() {
        let block: Block = serde_json::from_str(
            r#"{
                "block_id": "t",
                "block_type": 2,
                "text": { "elements": [
                    { "text_run": { "content": "a", "text_element_style": { "bold": true } } },
                    { "mention_user": { "user_id": "ou_1" } },
                    { "equation": { "content": "x^2\n" } },
                    { "reminder": { "expire_time": "1" } }
                ] }
            }"#,
        )
        .unwrap();
        let BlockKind::Text(text) = block.kind else {
            panic!("expected text block");
        };
        assert!(matches!(
            &text.elements[0],
            InlineElement::TextRun { style, .. } if style.bold
        ));
        assert_eq!(
            text.elements[1],
            InlineElement::MentionUser {
                user_id: "ou_1".into()
            }
        );
        assert_eq!(text.elements[3], InlineElement::Unsupported);
    }

    #[test]
    fn decode_table_and_todo() {
        let table: Block = serde_json::from_str(
            r#"{
                "block_id": "tbl",
                "block_type": 31,
                "children": ["c1", "c2"],
                "table": {
                    "cells": ["c1", "c2"],
                    "property": {
                        "row_size": 1,
                        "column_size": 2,
                        "merge_info": [ { "row_span": 1, "col_span": 2 }, { "row_span": 1, "col_span": 1 } ]
                    }
                }
            }"#,
        )
        .unwrap();
        let BlockKind::Table(table) = table.kind else {
            panic!("expected table block");
        };
        assert_eq!(table.column_size, 2);
        assert_eq!(table.merges.get(0, 0).col_span, 2);

        let todo: Block = serde_json::from_str(
            r#"{ "block_id": "td", "block_type": 17, "todo": { "style": { "done": true }, "elements": [] } }"#,
        )
        .unwrap();
        assert!(matches!(todo.kind, BlockKind::Todo { done: true, .. }));
    }

    #[test]
    fn decode_unknown_tag() {
        let block: Block = serde_json::from_str(
            r#"{ "block_id": "x", "block_type": 999, "children": ["a", "b"] }"#,
        )
        .unwrap();
        assert_eq!(block.kind, BlockKind::Unknown(999));
        assert_eq!(block.children, vec!["a".to_string(), "b".to_string()]);
    }
}
