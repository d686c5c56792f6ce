use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, info};

use super::{JobContext, write_file};
use crate::{
    Error, ErrorContext, ErrorDetail,
    document::{BlockIndex, DocumentMeta},
    remote::{self, Client},
    render::{EmbedExtractor, Renderer},
    sanitize_file_name,
    warning::{collect_warnings, log_warnings},
};

#[derive(Serialize)]
struct Dump<'a> {
    document: &'a DocumentMeta,
    blocks: &'a [serde_json::Value],
}

fn image_extension(resource: &remote::Resource) -> String {
    resource
        .filename
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}

/// Download every image once and return the relative link of each token.
async fn download_images<C: Client>(
    ctx: &JobContext<C>,
    tokens: &[String],
    dest: &Path,
) -> Result<Vec<(String, String)>, Error> {
    let unique = tokens.iter().collect::<IndexSet<_>>();
    let tasks = unique.into_iter().map(|token| async move {
        let context = ErrorContext::new(token);
        let resource = ctx
            .client
            .fetch_resource(token)
            .await
            .map_err(|e| context.error(e.into()))?;
        let file_name = format!("{token}{}", image_extension(&resource));
        let path = dest.join(&ctx.output.image_dir).join(&file_name);
        write_file(&path, &resource.body)
            .await
            .map_err(|detail| context.with_path(&path).error(detail))?;
        debug!(path = %path.display(), "downloaded image");
        Ok::<_, Error>((token.clone(), format!("{}/{file_name}", ctx.output.image_dir)))
    });
    try_join_all(tasks).await
}

async fn run<C: Client>(ctx: &JobContext<C>, token: &str, dest: &Path) -> Result<PathBuf, Error> {
    let context = ErrorContext::new(token);
    let remote_error = |e: remote::Error| context.error(e.into());

    let meta = ctx.client.fetch_document(token).await.map_err(remote_error)?;
    let fetched = remote::fetch_all_blocks(&ctx.client, token)
        .await
        .map_err(remote_error)?;
    debug!(token, blocks = fetched.blocks.len(), title = %meta.title, "fetched document");

    if ctx.dump {
        let path = dest.join(format!("{token}.json"));
        let json = serde_json::to_string_pretty(&Dump {
            document: &meta,
            blocks: &fetched.raw,
        })
        .map_err(|e| context.error(ErrorDetail::Encode(e)))?;
        write_file(&path, json.as_bytes())
            .await
            .map_err(|detail| context.with_path(&path).error(detail))?;
        info!(path = %path.display(), "dumped API response");
    }

    let index = BlockIndex::build(fetched.blocks);
    let extractor = EmbedExtractor::analyze(&index, token);
    if !extractor.is_empty() {
        debug!(token, "resolving embedded objects");
    }
    let embeds = extractor.into_resolver(Some(&ctx.client)).await;
    let rendered = Renderer::new(&ctx.render, &index, &embeds).render_document(token);
    let mut markdown = rendered.markdown;

    let asset_dir = dest.join(&ctx.output.image_dir);
    for attachment in embeds.attachments() {
        let path = asset_dir.join(&attachment.file_name);
        write_file(&path, &attachment.body)
            .await
            .map_err(|detail| context.with_path(&path).error(detail))?;
    }

    if !ctx.output.skip_img_download && !rendered.image_tokens.is_empty() {
        let links = download_images(ctx, &rendered.image_tokens, dest).await?;
        for (image_token, link) in &links {
            markdown = markdown.replace(&format!("]({image_token})"), &format!("]({link})"));
        }
    }

    let file_name = if ctx.output.title_as_filename && !meta.title.trim().is_empty() {
        format!("{}.md", sanitize_file_name(&meta.title))
    } else {
        format!("{token}.md")
    };
    let path = dest.join(file_name);
    write_file(&path, markdown.as_bytes())
        .await
        .map_err(|detail| context.with_path(&path).error(detail))?;
    info!(path = %path.display(), "downloaded markdown");
    Ok(path)
}

/// Render one docx document into `dest`, returning the written Markdown path.
pub async fn download_document<C: Client>(
    ctx: &JobContext<C>,
    token: &str,
    dest: &Path,
) -> Result<PathBuf, Error> {
    let (result, warnings) = collect_warnings(run(ctx, token, dest)).await;
    log_warnings(token, &warnings);
    result
}
