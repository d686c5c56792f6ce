use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

pub mod config;
pub mod crawl;
pub mod document;
pub mod job;
pub mod progress;
pub mod remote;
pub mod render;
pub mod source;
pub mod warning;

#[cfg(test)]
mod tests;

#[derive(Debug, thiserror::Error)]
#[error("{context}: {detail}")]
pub struct Error {
    pub context: Box<ErrorContext>,
    pub detail: Box<ErrorDetail>,
}

/// Object the failing operation was working on.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub token: String,
    pub path: Option<PathBuf>,
}

impl ErrorContext {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            path: None,
        }
    }

    pub fn with_path(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            token: self.token.clone(),
            path: Some(path.into()),
        }
    }

    pub fn error(&self, detail: ErrorDetail) -> Error {
        Error {
            context: Box::new(self.clone()),
            detail: Box::new(detail),
        }
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}({})", self.token, path.display()),
            None => write!(f, "{}", self.token),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorDetail {
    #[error("Invalid source: {0}")]
    Validation(String),
    #[error("Remote error: {0}")]
    Remote(#[from] remote::Error),
    #[error("Failed to write {}: {error}", path.display())]
    Io {
        path: PathBuf,
        error: std::io::Error,
    },
    #[error("Failed to encode dump: {0}")]
    Encode(serde_json::Error),
    #[error("Legacy docs are no longer supported, convert the document to docx first")]
    LegacyDocument,
    #[error("Job panicked: {0}")]
    Panicked(String),
    #[error("Worker pool stopped accepting jobs")]
    PoolClosed,
}

impl ErrorDetail {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |error| ErrorDetail::Io {
            path: path.to_owned(),
            error,
        }
    }
}

static FORBIDDEN_FILE_NAME_CHARS: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r#"[\\/:*?"<>|]"#).unwrap());

/// Make a remote title usable as a single path component.
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized = FORBIDDEN_FILE_NAME_CHARS.replace_all(name.trim(), "-");
    match sanitized.as_ref() {
        "" | "." | ".." => "untitled".to_owned(),
        _ => sanitized.into_owned(),
    }
}
