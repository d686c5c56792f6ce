//! Hierarchy crawling
//!
//! A crawl walks a drive folder or a wiki space and turns every document
//! it finds into a job for one shared worker pool. Containers are listed on
//! the calling task with an explicit worklist; only leaves run concurrently.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{debug, info};

use crate::{
    Error, ErrorContext, ErrorDetail,
    job::{JobContext, download_document, download_file},
    progress::{NullReporter, ProgressReporter},
    remote::{Client, Container, ObjectKind},
    sanitize_file_name,
    source::{Source, Target},
};

pub mod cancel;
mod pool;

pub use cancel::CancelToken;
use pool::{Job, Pool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Worker count, also the queue capacity.
    pub concurrency: usize,
    /// Stop scheduling after the first failed leaf.
    pub fail_fast: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            concurrency: 10,
            fail_fast: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlRoot {
    Folder { token: String },
    Wiki { space_id: String },
}

impl CrawlRoot {
    fn container(&self) -> Container {
        match self {
            CrawlRoot::Folder { token } => Container::Folder {
                token: token.clone(),
            },
            CrawlRoot::Wiki { space_id } => Container::Wiki {
                space_id: space_id.clone(),
                node_token: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    Document {
        token: String,
    },
    File {
        token: String,
        title: String,
        kind: ObjectKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    pub leaf: Leaf,
    pub dest: PathBuf,
}

impl CrawlJob {
    async fn run<C: Client>(self, ctx: &JobContext<C>) -> Result<PathBuf, Error> {
        match &self.leaf {
            Leaf::Document { token } => download_document(ctx, token, &self.dest).await,
            Leaf::File { token, title, kind } => {
                download_file(ctx, token, title, kind, &self.dest).await
            }
        }
    }
}

impl Job for CrawlJob {
    fn label(&self) -> String {
        match &self.leaf {
            Leaf::Document { token } => token.clone(),
            Leaf::File { title, token, .. } if title.is_empty() => token.clone(),
            Leaf::File { title, .. } => title.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    /// Written files, sorted.
    pub written: Vec<PathBuf>,
    /// Leaves dropped after cancellation.
    pub skipped: usize,
}

fn container_token(container: &Container) -> &str {
    match container {
        Container::Folder { token } => token,
        Container::Wiki {
            node_token: Some(token),
            ..
        } => token,
        Container::Wiki { space_id, .. } => space_id,
    }
}

pub struct Crawler<C> {
    ctx: Arc<JobContext<C>>,
    options: CrawlOptions,
    reporter: Arc<dyn ProgressReporter>,
}

impl<C: Client + 'static> Crawler<C> {
    pub fn new(ctx: Arc<JobContext<C>>, options: CrawlOptions) -> Self {
        Self {
            ctx,
            options,
            reporter: Arc::new(NullReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Turn a folder or wiki source into a crawl root and its output directory.
    ///
    /// Wiki crawls write into `dest/<space name>`. A wiki node URL crawls the
    /// whole space the node belongs to.
    pub async fn resolve_root(
        &self,
        source: &Source,
        dest: &Path,
    ) -> Result<(CrawlRoot, PathBuf), Error> {
        let space_id = match &source.target {
            Target::Folder { token } => {
                return Ok((
                    CrawlRoot::Folder {
                        token: token.clone(),
                    },
                    dest.to_owned(),
                ));
            }
            Target::WikiSpace { space_id } => space_id.clone(),
            Target::WikiNode { token } => {
                let context = ErrorContext::new(token);
                let node = self
                    .ctx
                    .client
                    .wiki_node(token)
                    .await
                    .map_err(|e| context.error(e.into()))?;
                node.space_id.filter(|id| !id.is_empty()).ok_or_else(|| {
                    context.error(ErrorDetail::Validation(
                        "wiki node does not belong to a space".to_owned(),
                    ))
                })?
            }
            Target::Document { token } => {
                return Err(ErrorContext::new(token).error(ErrorDetail::Validation(
                    "a single document cannot be crawled".to_owned(),
                )));
            }
        };
        let name = self
            .ctx
            .client
            .wiki_space_name(&space_id)
            .await
            .map_err(|e| ErrorContext::new(&space_id).error(e.into()))?;
        let dir_name = if name.trim().is_empty() {
            space_id.clone()
        } else {
            sanitize_file_name(&name)
        };
        info!(%space_id, %name, "resolved wiki space");
        Ok((CrawlRoot::Wiki { space_id }, dest.join(dir_name)))
    }

    /// Download every leaf below `root` into a directory tree rooted at `dest`.
    ///
    /// Leaves that succeeded stay on disk even when the crawl fails. A listing
    /// failure takes precedence over leaf failures; otherwise the first leaf
    /// failure is returned.
    pub async fn walk(&self, root: &CrawlRoot, dest: &Path) -> Result<CrawlSummary, Error> {
        let cancel = CancelToken::new();
        let ctx = self.ctx.clone();
        let pool = Pool::spawn(
            self.options.concurrency,
            self.options.fail_fast,
            cancel.clone(),
            self.reporter.clone(),
            move |job: CrawlJob| {
                let ctx = ctx.clone();
                async move { job.run(&ctx).await }
            },
        );

        let discovered = self.discover(root, dest, &pool, &cancel).await;
        if discovered.is_err() {
            cancel.cancel();
        }
        let outcome = pool.join().await;
        discovered?;
        if let Some(error) = outcome.first_error {
            return Err(error);
        }
        info!(
            written = outcome.written.len(),
            skipped = outcome.skipped,
            "crawl finished"
        );
        Ok(CrawlSummary {
            written: outcome.written,
            skipped: outcome.skipped,
        })
    }

    async fn discover(
        &self,
        root: &CrawlRoot,
        dest: &Path,
        pool: &Pool<CrawlJob>,
        cancel: &CancelToken,
    ) -> Result<(), Error> {
        let mut worklist = vec![(root.container(), dest.to_owned())];
        while let Some((container, dir)) = worklist.pop() {
            let listed = tokio::select! {
                listed = self.ctx.client.fetch_children(&container) => listed,
                _ = cancel.cancelled() => break,
            };
            let children = listed.map_err(|e| {
                ErrorContext::new(container_token(&container))
                    .with_path(&dir)
                    .error(e.into())
            })?;
            debug!(container = container_token(&container), children = children.len(), "listed");

            let mut nested = Vec::new();
            for node in children {
                let leaf = match &node.kind {
                    ObjectKind::Docx => Some(Leaf::Document {
                        token: node.obj_token.clone(),
                    }),
                    kind if kind.is_downloadable_file() => Some(Leaf::File {
                        token: node.obj_token.clone(),
                        title: node.title.clone(),
                        kind: kind.clone(),
                    }),
                    ObjectKind::Folder => None,
                    kind => {
                        debug!(token = %node.token, %kind, "skip unsupported object");
                        self.reporter
                            .log_warn(&format!("skipped {}: {kind} objects are not supported", node.title));
                        None
                    }
                };
                if let Some(leaf) = leaf {
                    let job = CrawlJob {
                        leaf,
                        dest: dir.clone(),
                    };
                    if cancel.is_cancelled() {
                        return Ok(());
                    }
                    if !pool.submit(job).await {
                        return Err(ErrorContext::new(&node.obj_token)
                            .with_path(&dir)
                            .error(ErrorDetail::PoolClosed));
                    }
                }

                let child_dir = dir.join(sanitize_file_name(&node.title));
                match &container {
                    Container::Folder { .. } if node.kind == ObjectKind::Folder => {
                        nested.push((Container::Folder { token: node.token }, child_dir));
                    }
                    Container::Wiki { space_id, .. } if node.has_children => {
                        nested.push((
                            Container::Wiki {
                                space_id: space_id.clone(),
                                node_token: Some(node.token),
                            },
                            child_dir,
                        ));
                    }
                    _ => {}
                }
            }
            worklist.extend(nested.into_iter().rev());
        }
        Ok(())
    }
}
