use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use larkmd::{
    config::Config,
    crawl::{CrawlOptions, Crawler},
    job::{self, JobContext},
    progress::{RunPhase, create_reporter},
    remote::lark::LarkClient,
    source::{Mode, Source},
};
use tracing::{error, info};

/// Download Lark / Feishu docx documents as Markdown.
#[derive(Parser)]
struct Opts {
    /// YAML (or JSON) configuration file.
    #[clap(short, long, env = "LARKMD_CONFIG")]
    config: Option<PathBuf>,
    #[clap(long, env = "FEISHU_APP_ID")]
    app_id: Option<String>,
    #[clap(long, env = "FEISHU_APP_SECRET", hide_env_values = true)]
    app_secret: Option<String>,
    /// Output directory.
    #[clap(short, long, default_value = ".")]
    output: PathBuf,
    /// Also write the raw API response as `<token>.json`.
    #[clap(long)]
    dump: bool,
    /// Download every document below a drive folder.
    #[clap(long, conflicts_with = "wiki")]
    batch: bool,
    /// Download every document of a wiki space.
    #[clap(long)]
    wiki: bool,
    url: String,
}

async fn load_config(opts: &Opts) -> anyhow::Result<Config> {
    let mut config = match &opts.config {
        Some(path) => {
            let src = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("read config from {}", path.display()))?;
            Config::from_yaml(&src)
                .with_context(|| format!("parse config from {}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(app_id) = &opts.app_id {
        config.remote.app_id = app_id.clone();
    }
    if let Some(app_secret) = &opts.app_secret {
        config.remote.app_secret = app_secret.clone();
    }
    config.validate().context("invalid config")?;
    Ok(config)
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let config = load_config(&opts).await?;
    let mode = match (opts.batch, opts.wiki) {
        (true, _) => Mode::Folder,
        (_, true) => Mode::Wiki,
        _ => Mode::Document,
    };
    let source = Source::parse(&opts.url, mode)?;
    let client = LarkClient::new(
        &config.remote.base_url,
        &config.remote.app_id,
        &config.remote.app_secret,
    )
    .context("build HTTP client")?;
    let ctx = Arc::new(JobContext::new(
        client,
        config.output.clone(),
        opts.dump,
        &source.origin,
    ));

    if mode == Mode::Document {
        let path = job::download_source(&ctx, &source, &opts.output).await?;
        info!(path = %path.display(), "done");
        return Ok(());
    }

    let reporter = create_reporter();
    reporter.set_phase(RunPhase::Resolving);
    let crawler =
        Crawler::new(ctx, CrawlOptions::from(&config.crawl)).with_reporter(reporter.clone());
    let result = async {
        let (root, dest) = crawler.resolve_root(&source, &opts.output).await?;
        reporter.set_phase(RunPhase::Crawling);
        crawler.walk(&root, &dest).await
    }
    .await;
    match &result {
        Ok(_) => reporter.set_phase(RunPhase::Completed),
        Err(e) => reporter.set_phase(RunPhase::Failed(e.to_string())),
    }
    reporter.finish();
    let summary = result?;
    info!(
        written = summary.written.len(),
        skipped = summary.skipped,
        "crawl done"
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    if let Err(e) = run(opts).await {
        error!(?e, "critical error");
        std::process::exit(1);
    }
}
