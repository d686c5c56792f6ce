use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{JobContext, write_file};
use crate::{
    Error, ErrorContext,
    remote::{Client, ObjectKind, Resource},
    sanitize_file_name, warn_entry,
    warning::{collect_warnings, log_warnings},
};

fn kind_label(kind: &ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Mindnote => "mind map",
        ObjectKind::Sheet => "spreadsheet",
        ObjectKind::Bitable => "bitable",
        _ => "file",
    }
}

fn placeholder(origin: &str, token: &str, title: &str, kind: &ObjectKind) -> String {
    let label = kind_label(kind);
    format!(
        "# {title}\n\n**File type**: {label}\n\n**File token**: `{token}`\n\n**Note**: this {label} cannot be converted to Markdown.\n\nOpen the original: [{title}]({origin}/{kind}/{token})\n"
    )
}

/// Drive files first, document media second.
async fn fetch<C: Client>(ctx: &JobContext<C>, token: &str) -> Option<Resource> {
    match ctx.client.fetch_file(token).await {
        Ok(resource) => return Some(resource),
        Err(error) => debug!(%error, token, "drive file download failed, trying media"),
    }
    match ctx.client.fetch_resource(token).await {
        Ok(resource) => Some(resource),
        Err(error) => {
            warn_entry!("{token} could not be downloaded: {error}");
            None
        }
    }
}

async fn run<C: Client>(
    ctx: &JobContext<C>,
    token: &str,
    title: &str,
    kind: &ObjectKind,
    dest: &Path,
) -> Result<PathBuf, Error> {
    let context = ErrorContext::new(token);
    let title = if title.trim().is_empty() { token } else { title };
    let (path, contents) = match fetch(ctx, token).await {
        Some(resource) => {
            let name = resource
                .filename
                .as_deref()
                .filter(|name| !name.is_empty())
                .unwrap_or(token);
            (dest.join(sanitize_file_name(name)), resource.body)
        }
        None => (
            dest.join(format!("{}.md", sanitize_file_name(title))),
            placeholder(&ctx.origin, token, title, kind).into(),
        ),
    };
    write_file(&path, &contents)
        .await
        .map_err(|detail| context.with_path(&path).error(detail))?;
    info!(path = %path.display(), %kind, "downloaded file");
    Ok(path)
}

/// Download a non-document object into `dest`. Objects that cannot be
/// downloaded get a Markdown placeholder linking to the original.
pub async fn download_file<C: Client>(
    ctx: &JobContext<C>,
    token: &str,
    title: &str,
    kind: &ObjectKind,
    dest: &Path,
) -> Result<PathBuf, Error> {
    let (result, warnings) = collect_warnings(run(ctx, token, title, kind, dest)).await;
    log_warnings(token, &warnings);
    result
}

#[cfg(test)]
mod tests {
    use super::placeholder;
    use crate::remote::ObjectKind;

    #[test]
    fn placeholder_links_to_the_original() {
        let text = placeholder(
            "https://example.feishu.cn",
            "MnTok1",
            "Roadmap",
            &ObjectKind::Mindnote,
        );
        assert!(text.starts_with("# Roadmap\n\n**File type**: mind map\n\n"));
        assert!(text.contains("**File token**: `MnTok1`"));
        assert!(text.ends_with("[Roadmap](https://example.feishu.cn/mindnote/MnTok1)\n"));
    }
}
