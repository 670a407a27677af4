//! Migration control loop: resolve the blog, load existing handles, then page
//! through the source writing one article at a time.

use crate::adapters::http::{RateLimitedClient, ReqwestTransport};
use crate::adapters::media::ImageUploader;
use crate::adapters::shopify::ShopifyClient;
use crate::adapters::wordpress::WpGraphqlSource;
use crate::config::MigrationSettings;
use crate::core::content::{self, ContentStage};
use crate::domain::model::{
    ArticlePayload, CoverImage, CreatedArticle, ExistingHandles, MigrationReport, ProcessedRecord,
    RecordOutcome, Redirect, RedirectStatus, SourceRecord, WriteOutcome,
};
use crate::domain::ports::HttpTransport;
use crate::utils::error::{MigrationError, Result};
use chrono::{DateTime, NaiveDateTime};
use std::sync::Arc;

const NAIVE_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S";

/// Everything a run needs, built once at startup.
pub struct MigrationContext {
    pub settings: MigrationSettings,
    pub source: WpGraphqlSource,
    pub shopify: Arc<ShopifyClient>,
    pub media: Option<ImageUploader>,
}

impl MigrationContext {
    pub fn new(settings: MigrationSettings, transport: Arc<dyn HttpTransport>) -> Self {
        let http = RateLimitedClient::new(transport.clone(), settings.throttle.clone())
            .with_default_header("X-Shopify-Access-Token", settings.shopify.access_token.clone())
            .with_default_header("Content-Type", "application/json");
        let shopify = Arc::new(ShopifyClient::new(http, settings.shopify.admin_base_url()));

        let media = settings.uploads_media().then(|| {
            ImageUploader::new(transport.clone(), shopify.clone(), settings.reencode_images)
        });
        let source = WpGraphqlSource::new(transport, settings.wpgraphql_endpoint.clone());

        Self {
            settings,
            source,
            shopify,
            media,
        }
    }

    pub fn from_settings(settings: MigrationSettings) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(settings.request_timeout)?);
        Ok(Self::new(settings, transport))
    }
}

/// Passes naive and offset timestamps through in a canonical form; anything
/// else is sent as received.
pub fn normalize_published_at(raw: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.to_rfc3339();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return naive.format(NAIVE_TIMESTAMP).to_string();
    }
    raw.to_string()
}

/// Assembles the create-article body from a record and its transformed content.
pub fn build_payload(
    record: &SourceRecord,
    body_html: String,
    image: Option<CoverImage>,
    default_author: &str,
) -> ArticlePayload {
    let summary = content::derive_summary(record.excerpt.as_deref(), &body_html);
    let author = record
        .author
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(default_author)
        .to_string();
    let tags = record
        .categories
        .iter()
        .chain(record.tags.iter())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    ArticlePayload {
        title: record.title.clone(),
        author,
        body_html,
        published_at: normalize_published_at(&record.date),
        tags,
        summary_html: (!summary.is_empty()).then_some(summary),
        handle: (!record.slug.is_empty()).then(|| record.slug.clone()),
        image,
    }
}

struct PreparedArticle {
    payload: ArticlePayload,
    image_failures: usize,
}

/// Resolved destination blog.
#[derive(Debug, Clone)]
pub struct BlogTarget {
    pub id: u64,
    pub handle: Option<String>,
}

pub struct Migrator {
    ctx: MigrationContext,
}

impl Migrator {
    pub fn new(ctx: MigrationContext) -> Self {
        Self { ctx }
    }

    fn cap_reached(&self, report: &MigrationReport) -> bool {
        self.ctx
            .settings
            .max_posts
            .is_some_and(|max| report.written() >= max)
    }

    async fn resolve_blog(&self) -> Result<BlogTarget> {
        let settings = &self.ctx.settings;
        let id = self
            .ctx
            .shopify
            .get_or_create_blog(&settings.shopify.blog_title)
            .await?
            .ok_or_else(|| MigrationError::BlogUnavailable {
                message: "no blog found and creating one failed".to_string(),
            })?;

        let handle = match self.ctx.shopify.get_blog_handle(id).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!("Could not read the handle of blog {}: {}", id, e);
                None
            }
        };
        match (&handle, settings.create_redirects) {
            (None, true) => Err(MigrationError::BlogUnavailable {
                message: format!("handle of blog {} is unavailable", id),
            }),
            (None, false) => {
                tracing::warn!("Handle of blog {} unavailable, continuing without it", id);
                Ok(BlogTarget { id, handle })
            }
            (Some(h), _) => {
                tracing::info!("Migrating into blog {} ({})", id, h);
                Ok(BlogTarget { id, handle })
            }
        }
    }

    /// Runs the whole migration. Only an unavailable blog or a startup error
    /// is returned as `Err`; record-level failures end up in the report.
    pub async fn run(&self) -> Result<MigrationReport> {
        let settings = &self.ctx.settings;
        if settings.dry_run {
            tracing::info!("Dry run: nothing will be written to the store");
        }
        let stage_names: Vec<&str> = settings.stages.iter().map(ContentStage::name).collect();
        tracing::info!("Content stages: {}", stage_names.join(", "));

        let blog = match self.resolve_blog().await {
            Ok(blog) => blog,
            Err(e @ MigrationError::BlogUnavailable { .. }) => {
                tracing::error!("Cannot continue without the blog: {}", e);
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Cannot continue without the blog: {}", e);
                return Err(MigrationError::BlogUnavailable {
                    message: e.to_string(),
                });
            }
        };

        let mut existing = self.ctx.shopify.list_existing_handles(blog.id).await;

        let mut report = MigrationReport::default();
        let mut cursor: Option<String> = None;
        let mut has_next_page = true;

        'paging: while has_next_page && !self.cap_reached(&report) {
            let page = match self
                .ctx
                .source
                .fetch_page(settings.page_size, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!("Error fetching posts from WPGraphQL: {}", e);
                    break;
                }
            };
            report.pages_fetched += 1;
            has_next_page = page.has_next_page;
            cursor = page.end_cursor;
            if has_next_page && cursor.is_none() {
                tracing::warn!("Source reported more pages without a cursor, stopping");
                has_next_page = false;
            }

            for record in &page.records {
                if self.cap_reached(&report) {
                    break 'paging;
                }

                let processed = self.process_record(&blog, record, &mut existing).await;
                report.record(&processed);

                if matches!(processed.outcome, RecordOutcome::Migrated { .. })
                    && !settings.record_delay.is_zero()
                {
                    tokio::time::sleep(settings.record_delay).await;
                }
            }
        }

        tracing::info!(
            "Migration complete. Total posts migrated: {} (skipped: {}, failed: {}, redirects: {}, redirect failures: {}, image failures: {}, pages: {})",
            report.migrated,
            report.skipped,
            report.failed,
            report.redirects_created,
            report.redirect_failures,
            report.image_failures,
            report.pages_fetched
        );
        if settings.dry_run {
            tracing::info!("Dry run planned {} posts", report.planned);
        }

        Ok(report)
    }

    /// Handles one source record end to end. Never fails: problems are
    /// reported through the outcome.
    pub async fn process_record(
        &self,
        blog: &BlogTarget,
        record: &SourceRecord,
        existing: &mut ExistingHandles,
    ) -> ProcessedRecord {
        if existing.contains(&record.slug) {
            tracing::info!(
                "Skipping '{}': handle '{}' already exists",
                record.title,
                record.slug
            );
            return ProcessedRecord {
                outcome: RecordOutcome::Skipped,
                image_failures: 0,
            };
        }

        tracing::debug!("Processing post: {}", record.title);
        let prepared = self.prepare_article(record).await;
        let image_failures = prepared.image_failures;

        if self.ctx.settings.dry_run {
            tracing::info!(
                "[dry run] Would create '{}' with handle '{}'",
                record.title,
                record.slug
            );
            existing.insert(record.slug.clone());
            return ProcessedRecord {
                outcome: RecordOutcome::Planned,
                image_failures,
            };
        }

        let outcome = match self.write_article(blog, record, &prepared.payload).await {
            Ok(WriteOutcome::Created(article)) => {
                tracing::info!(
                    "Post '{}' created successfully with ID {}",
                    record.title,
                    article.id
                );
                existing.insert(article.handle.clone());
                // the store may have suffixed the handle on a collision
                existing.insert(record.slug.clone());

                let redirect = if self.ctx.settings.create_redirects {
                    self.create_redirect(blog, record, &article).await
                } else {
                    RedirectStatus::Disabled
                };
                RecordOutcome::Migrated { article, redirect }
            }
            Ok(WriteOutcome::Rejected { status, body }) => {
                tracing::error!(
                    "Error creating post '{}' ({}): {} - {}",
                    record.title,
                    record.slug,
                    status,
                    body
                );
                RecordOutcome::Failed {
                    reason: format!("HTTP {}: {}", status, body),
                }
            }
            Err(e) => {
                tracing::error!(
                    "Exception while processing post '{}' ({}): {}",
                    record.title,
                    record.slug,
                    e
                );
                RecordOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        ProcessedRecord {
            outcome,
            image_failures,
        }
    }

    async fn prepare_article(&self, record: &SourceRecord) -> PreparedArticle {
        let settings = &self.ctx.settings;
        let upload = self.ctx.media.as_ref().filter(|_| !settings.dry_run);
        let mut image_failures = 0;

        // every segment after the first follows an upload_images stage
        let links = settings.links.as_ref();
        let mut segments = settings
            .stages
            .split(|stage| *stage == ContentStage::UploadImages);
        let mut body = content::transform(
            &record.content,
            segments.next().unwrap_or_default(),
            links,
        );
        for segment in segments {
            if let Some(media) = upload {
                let inline = media.process_inline_images(&body).await;
                tracing::debug!(
                    "Re-hosted {} inline images of '{}'",
                    inline.uploaded,
                    record.title
                );
                image_failures += inline.failed.len();
                body = inline.content;
            }
            body = content::transform(&body, segment, links);
        }

        let image = match (&record.featured_image_url, upload) {
            (None, _) => None,
            (Some(url), Some(media)) => match media.upload_image(url).await {
                Some(hosted) => Some(CoverImage { src: hosted }),
                None => {
                    image_failures += 1;
                    None
                }
            },
            (Some(url), None) => Some(CoverImage { src: url.clone() }),
        };

        PreparedArticle {
            payload: build_payload(record, body, image, &settings.default_author),
            image_failures,
        }
    }

    async fn write_article(
        &self,
        blog: &BlogTarget,
        record: &SourceRecord,
        payload: &ArticlePayload,
    ) -> Result<WriteOutcome<CreatedArticle>> {
        tracing::debug!("Creating article for '{}'", record.slug);
        self.ctx.shopify.create_article(blog.id, payload).await
    }

    async fn create_redirect(
        &self,
        blog: &BlogTarget,
        record: &SourceRecord,
        article: &CreatedArticle,
    ) -> RedirectStatus {
        let Some(target) = article.new_path(blog.handle.as_deref()) else {
            tracing::error!("No blog handle to build the new URL of '{}'", record.title);
            return RedirectStatus::Failed {
                reason: "blog handle unknown".to_string(),
            };
        };
        let redirect = Redirect {
            path: record.old_path(),
            target,
        };

        match self.ctx.shopify.create_redirect(&redirect).await {
            Ok(WriteOutcome::Created(())) => {
                tracing::info!("Redirect created: {} -> {}", redirect.path, redirect.target);
                RedirectStatus::Created
            }
            Ok(WriteOutcome::Rejected { status, body }) => {
                tracing::error!(
                    "Error creating redirect for '{}': {} - {}",
                    record.title,
                    status,
                    body
                );
                RedirectStatus::Failed {
                    reason: format!("HTTP {}: {}", status, body),
                }
            }
            Err(e) => {
                tracing::error!("Error creating redirect for '{}': {}", record.title, e);
                RedirectStatus::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
