//! Block data model of a docx document.
//!
//! The remote API delivers a document as a flat list of blocks that refer to
//! each other by id. Blocks are decoded from the wire shape in [`raw`] into
//! the closed [`BlockKind`] enum; tree structure is only ever resolved through
//! [`index::BlockIndex`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub mod index;
mod raw;

pub use index::BlockIndex;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    H7,
    H8,
    H9,
}

impl HeadingLevel {
    /// Heading blocks occupy the wire tags 3..=11.
    pub fn from_block_type(block_type: u32) -> Option<Self> {
        match block_type {
            3 => Some(Self::H1),
            4 => Some(Self::H2),
            5 => Some(Self::H3),
            6 => Some(Self::H4),
            7 => Some(Self::H5),
            8 => Some(Self::H6),
            9 => Some(Self::H7),
            10 => Some(Self::H8),
            11 => Some(Self::H9),
            _ => None,
        }
    }
}

impl From<HeadingLevel> for usize {
    fn from(value: HeadingLevel) -> Self {
        match value {
            HeadingLevel::H1 => 1,
            HeadingLevel::H2 => 2,
            HeadingLevel::H3 => 3,
            HeadingLevel::H4 => 4,
            HeadingLevel::H5 => 5,
            HeadingLevel::H6 => 6,
            HeadingLevel::H7 => 7,
            HeadingLevel::H8 => 8,
            HeadingLevel::H9 => 9,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    #[serde(default)]
    pub url: String,
}

/// Style flags of a text run. Several flags may be set at once.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub inline_code: bool,
    pub link: Option<Link>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "raw::RawElement")]
pub enum InlineElement {
    TextRun { content: String, style: TextStyle },
    MentionUser { user_id: String },
    MentionDoc { title: String, url: String },
    Equation { content: String },
    Unsupported,
}

impl InlineElement {
    pub fn text(content: impl Into<String>) -> Self {
        Self::TextRun {
            content: content.into(),
            style: TextStyle::default(),
        }
    }

    pub fn styled(content: impl Into<String>, style: TextStyle) -> Self {
        Self::TextRun {
            content: content.into(),
            style,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    pub elements: Vec<InlineElement>,
}

impl Text {
    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            elements: vec![InlineElement::text(content)],
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Span {
    pub row_span: usize,
    pub col_span: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            row_span: 1,
            col_span: 1,
        }
    }
}

impl Span {
    pub fn is_merged(&self) -> bool {
        self.row_span > 1 || self.col_span > 1
    }
}

/// Sparse merge spans keyed by grid position. Absent positions span (1, 1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeMap(HashMap<(usize, usize), Span>);

impl MergeMap {
    /// Fold the dense, cell-aligned list the API delivers into a sparse map.
    pub fn from_dense(column_size: usize, spans: impl IntoIterator<Item = Span>) -> Self {
        if column_size == 0 {
            return Self::default();
        }
        Self(
            spans
                .into_iter()
                .enumerate()
                .filter(|(_, span)| span.is_merged())
                .map(|(i, span)| ((i / column_size, i % column_size), span))
                .collect(),
        )
    }

    pub fn insert(&mut self, row: usize, col: usize, span: Span) {
        self.0.insert((row, col), span);
    }

    pub fn get(&self, row: usize, col: usize) -> Span {
        self.0.get(&(row, col)).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub column_size: usize,
    pub cells: Vec<String>,
    pub merges: MergeMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Page(Text),
    Text(Text),
    Heading { level: HeadingLevel, text: Text },
    Bullet(Text),
    Ordered(Text),
    Code { language: u32, text: Text },
    Quote(Text),
    QuoteContainer,
    Equation(Text),
    Todo { done: bool, text: Text },
    Divider,
    Image { token: String },
    File { token: String, name: String },
    Table(Table),
    TableCell,
    Sheet { token: String },
    Bitable { token: String },
    Diagram { diagram_type: u32 },
    Iframe { iframe_type: u32, url: String },
    Grid,
    GridColumn,
    Callout,
    Unknown(u32),
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(from = "raw::RawBlock")]
pub struct Block {
    pub id: String,
    pub parent_id: String,
    pub children: Vec<String>,
    pub kind: BlockKind,
}

impl Block {
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            parent_id: String::new(),
            children: Vec::new(),
            kind,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = parent_id.into();
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children = children.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self.kind, BlockKind::Ordered(_))
    }
}

/// Document descriptor returned alongside the block list.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMeta {
    pub document_id: String,
    #[serde(default)]
    pub revision_id: i64,
    #[serde(default)]
    pub title: String,
}
