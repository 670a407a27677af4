use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One WordPress post as fetched from the GraphQL source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub date: String,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub featured_image_url: Option<String>,
}

impl SourceRecord {
    /// Path of the post on the old site, used as the redirect source.
    pub fn old_path(&self) -> String {
        format!("/{}/", self.slug)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourcePage {
    pub records: Vec<SourceRecord>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverImage {
    pub src: String,
}

/// Body of the create-article call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticlePayload {
    pub title: String,
    pub author: String,
    pub body_html: String,
    pub published_at: String,
    pub tags: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<CoverImage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedArticle {
    pub id: u64,
    pub handle: String,
    pub blog_handle: Option<String>,
}

impl CreatedArticle {
    /// Storefront path of the article. The blog handle from the create
    /// response wins over the one resolved at startup.
    pub fn new_path(&self, fallback_blog_handle: Option<&str>) -> Option<String> {
        let blog = self.blog_handle.as_deref().or(fallback_blog_handle)?;
        Some(format!("/blogs/{}/{}", blog, self.handle))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Redirect {
    pub path: String,
    pub target: String,
}

/// Result of a single destination write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    Created(T),
    Rejected { status: u16, body: String },
}

/// Handles already present on the destination blog.
///
/// Only ever grows during a run.
#[derive(Debug, Clone, Default)]
pub struct ExistingHandles {
    handles: HashSet<String>,
}

impl ExistingHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.handles.contains(handle)
    }

    pub fn insert(&mut self, handle: impl Into<String>) -> bool {
        self.handles.insert(handle.into())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl FromIterator<String> for ExistingHandles {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            handles: iter.into_iter().collect(),
        }
    }
}

impl Extend<String> for ExistingHandles {
    fn extend<I: IntoIterator<Item = String>>(&mut self, iter: I) {
        self.handles.extend(iter);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedirectStatus {
    Created,
    Failed { reason: String },
    Disabled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Migrated {
        article: CreatedArticle,
        redirect: RedirectStatus,
    },
    Planned,
    Skipped,
    Failed { reason: String },
}

/// Outcome of one record plus the media failures met while preparing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedRecord {
    pub outcome: RecordOutcome,
    pub image_failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    pub planned: usize,
    pub skipped: usize,
    pub failed: usize,
    pub redirects_created: usize,
    pub redirect_failures: usize,
    pub image_failures: usize,
    pub pages_fetched: usize,
}

impl MigrationReport {
    pub fn record(&mut self, processed: &ProcessedRecord) {
        self.image_failures += processed.image_failures;
        match &processed.outcome {
            RecordOutcome::Migrated { redirect, .. } => {
                self.migrated += 1;
                match redirect {
                    RedirectStatus::Created => self.redirects_created += 1,
                    RedirectStatus::Failed { .. } => self.redirect_failures += 1,
                    RedirectStatus::Disabled => {}
                }
            }
            RecordOutcome::Planned => self.planned += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// Records written, or that would have been written in a dry run.
    pub fn written(&self) -> usize {
        self.migrated + self.planned
    }
}
