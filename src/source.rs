//! Classification of user supplied document URLs.

use url::Url;

use crate::{Error, ErrorContext, ErrorDetail};

/// What the CLI was asked to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Document,
    Folder,
    Wiki,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Document { token: String },
    WikiNode { token: String },
    WikiSpace { space_id: String },
    Folder { token: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Scheme and host of the URL, used to link back to originals.
    pub origin: String,
    pub target: Target,
}

fn is_token(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_alphanumeric())
}

impl Source {
    pub fn parse(url: &str, mode: Mode) -> Result<Self, Error> {
        let context = ErrorContext::new(url);
        let invalid = |msg: String| context.error(ErrorDetail::Validation(msg));

        let parsed = Url::parse(url).map_err(|e| invalid(format!("malformed URL: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme {}", parsed.scheme())));
        }
        let host = parsed
            .host_str()
            .ok_or_else(|| invalid("URL has no host".to_owned()))?;
        let origin = format!("{}://{host}", parsed.scheme());

        let segments = parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect::<Vec<_>>())
            .unwrap_or_default();
        let target = match segments.as_slice() {
            ["docx", token, ..] if is_token(token) => Target::Document {
                token: (*token).to_owned(),
            },
            ["docs", token, ..] if is_token(token) => {
                return Err(context.error(ErrorDetail::LegacyDocument));
            }
            ["wiki", "settings", token, ..] if is_token(token) => Target::WikiSpace {
                space_id: (*token).to_owned(),
            },
            ["wiki", token, ..] if is_token(token) => Target::WikiNode {
                token: (*token).to_owned(),
            },
            ["drive", "folder", token, ..] if is_token(token) => Target::Folder {
                token: (*token).to_owned(),
            },
            _ => return Err(invalid("unrecognised document URL".to_owned())),
        };

        let accepted = match (mode, &target) {
            (Mode::Document, Target::Document { .. } | Target::WikiNode { .. }) => true,
            (Mode::Folder, Target::Folder { .. }) => true,
            (Mode::Wiki, Target::WikiNode { .. } | Target::WikiSpace { .. }) => true,
            _ => false,
        };
        if !accepted {
            return Err(invalid(format!("URL does not point to a {mode:?} source")));
        }
        Ok(Self { origin, target })
    }
}
