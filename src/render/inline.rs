use std::{borrow::Cow, fmt::Write as _};

use crate::document::{InlineElement, TextStyle};

/// Decode a percent-encoded URL as delivered by the API. Malformed input is
/// kept verbatim.
pub fn unescape_url(url: &str) -> Cow<'_, str> {
    urlencoding::decode(url).unwrap_or(Cow::Borrowed(url))
}

/// Renders runs of inline elements into Markdown (or HTML tags when
/// `use_html_tags` is set).
///
/// A run shows at most one visual style. When several flags are set the first
/// of bold, italic, strikethrough, underline, inline code and link wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineStyler {
    use_html_tags: bool,
}

impl InlineStyler {
    pub fn new(use_html_tags: bool) -> Self {
        Self { use_html_tags }
    }

    /// `multi_element` tells whether the elements share a line with others,
    /// which switches equations to their inline `$...$` form.
    pub fn render(&self, elements: &[InlineElement], multi_element: bool) -> String {
        let mut out = String::new();
        for element in elements {
            self.write_element(&mut out, element, multi_element);
        }
        out
    }

    fn write_element(&self, out: &mut String, element: &InlineElement, multi_element: bool) {
        match element {
            InlineElement::TextRun { content, style } => self.write_run(out, content, style),
            InlineElement::MentionUser { user_id } => out.push_str(user_id),
            InlineElement::MentionDoc { title, url } => {
                write!(out, "[{title}]({})", unescape_url(url)).unwrap();
            }
            InlineElement::Equation { content } => {
                let symbol = if multi_element { "$" } else { "$$" };
                let content = content.strip_suffix('\n').unwrap_or(content);
                write!(out, "{symbol}{content}{symbol}").unwrap();
            }
            InlineElement::Unsupported => {}
        }
    }

    fn delimiters<'s>(&self, style: &'s TextStyle) -> Option<(&'static str, Cow<'s, str>)> {
        let html = self.use_html_tags;
        if style.bold {
            Some(if html {
                ("<strong>", "</strong>".into())
            } else {
                ("**", "**".into())
            })
        } else if style.italic {
            Some(if html {
                ("<em>", "</em>".into())
            } else {
                ("_", "_".into())
            })
        } else if style.strikethrough {
            Some(if html {
                ("<del>", "</del>".into())
            } else {
                ("~~", "~~".into())
            })
        } else if style.underline {
            Some(("<u>", "</u>".into()))
        } else if style.inline_code {
            Some(("`", "`".into()))
        } else {
            style
                .link
                .as_ref()
                .map(|link| ("[", format!("]({})", unescape_url(&link.url)).into()))
        }
    }

    fn write_run(&self, out: &mut String, content: &str, style: &TextStyle) {
        match self.delimiters(style) {
            Some((open, close)) => {
                out.push_str(open);
                out.push_str(content);
                out.push_str(&close);
            }
            None => out.push_str(content),
        }
    }
}
