//! Shopify Admin REST client for the destination blog.

use crate::adapters::http::RateLimitedClient;
use crate::domain::model::{ArticlePayload, CreatedArticle, ExistingHandles, Redirect, WriteOutcome};
use crate::domain::ports::HttpResponse;
use crate::utils::error::Result;
use serde::Deserialize;

/// Maximum page size the articles endpoint accepts.
pub const ARTICLE_PAGE_LIMIT: usize = 250;

#[derive(Debug, Deserialize)]
struct BlogSummary {
    id: u64,
    #[serde(default)]
    handle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BlogsEnvelope {
    #[serde(default)]
    blogs: Vec<BlogSummary>,
}

#[derive(Debug, Deserialize)]
struct BlogEnvelope {
    blog: BlogSummary,
}

#[derive(Debug, Deserialize)]
struct ArticleSummary {
    id: u64,
    handle: String,
}

#[derive(Debug, Deserialize)]
struct ArticlesEnvelope {
    #[serde(default)]
    articles: Vec<ArticleSummary>,
}

#[derive(Debug, Deserialize)]
struct ArticleBlogRef {
    handle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedArticleBody {
    id: u64,
    handle: String,
    #[serde(default)]
    blog: Option<ArticleBlogRef>,
}

#[derive(Debug, Deserialize)]
struct ArticleEnvelope {
    article: CreatedArticleBody,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    url: String,
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: UploadedFile,
}

fn log_response(action: &str, response: &HttpResponse) {
    tracing::debug!(
        "API response for {}: {} - {}",
        action,
        response.status,
        response.text()
    );
}

pub struct ShopifyClient {
    http: RateLimitedClient,
    base_url: String,
}

impl ShopifyClient {
    /// `base_url` is the versioned admin root, e.g.
    /// `https://shop.myshopify.com/admin/api/2023-10`.
    pub fn new(http: RateLimitedClient, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Returns the first blog of the store, creating one titled `title` when
    /// the store has none. `None` when neither succeeds.
    pub async fn get_or_create_blog(&self, title: &str) -> Result<Option<u64>> {
        let response = self.http.get(self.url("blogs.json")).await?;
        log_response("list blogs", &response);

        if response.status != 200 {
            tracing::error!(
                "Error fetching blogs: {} - {}",
                response.status,
                response.text()
            );
            return Ok(None);
        }

        let envelope: BlogsEnvelope = response.json()?;
        if let Some(blog) = envelope.blogs.first() {
            tracing::debug!("Using existing blog {}", blog.id);
            return Ok(Some(blog.id));
        }

        tracing::info!("Store has no blog, creating '{}'", title);
        let payload = serde_json::json!({ "blog": { "title": title } });
        let response = self.http.post(self.url("blogs.json"), payload).await?;
        log_response("create blog", &response);

        if response.status == 201 {
            let created: BlogEnvelope = response.json()?;
            tracing::debug!("Created blog {}", created.blog.id);
            Ok(Some(created.blog.id))
        } else {
            tracing::error!(
                "Error creating blog: {} - {}",
                response.status,
                response.text()
            );
            Ok(None)
        }
    }

    pub async fn get_blog_handle(&self, blog_id: u64) -> Result<Option<String>> {
        let response = self.http.get(self.url(&format!("blogs/{}.json", blog_id))).await?;
        log_response("get blog", &response);

        if response.status != 200 {
            tracing::error!(
                "Error fetching blog {}: {} - {}",
                blog_id,
                response.status,
                response.text()
            );
            return Ok(None);
        }

        let envelope: BlogEnvelope = response.json()?;
        Ok(envelope.blog.handle)
    }

    /// Enumerates every article handle of the blog using since-id paging.
    ///
    /// A failing page ends the enumeration early; handles gathered so far are
    /// still returned.
    pub async fn list_existing_handles(&self, blog_id: u64) -> ExistingHandles {
        let mut handles = ExistingHandles::new();
        let mut since_id: u64 = 0;

        loop {
            let url = self.url(&format!(
                "blogs/{}/articles.json?limit={}&since_id={}&fields=id,handle",
                blog_id, ARTICLE_PAGE_LIMIT, since_id
            ));

            let response = match self.http.get(url).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("Error listing articles after id {}: {}", since_id, e);
                    break;
                }
            };

            if response.status != 200 {
                tracing::error!(
                    "Error listing articles after id {}: {} - {}",
                    since_id,
                    response.status,
                    response.text()
                );
                break;
            }

            let page: ArticlesEnvelope = match response.json() {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!("Unreadable article listing after id {}: {}", since_id, e);
                    break;
                }
            };

            let Some(last) = page.articles.last() else {
                break;
            };
            since_id = last.id;
            handles.extend(page.articles.into_iter().map(|a| a.handle));
        }

        tracing::info!("Found {} existing articles on the destination", handles.len());
        handles
    }

    pub async fn create_article(
        &self,
        blog_id: u64,
        article: &ArticlePayload,
    ) -> Result<WriteOutcome<CreatedArticle>> {
        let payload = serde_json::json!({ "article": article });
        tracing::debug!("Article payload: {}", payload);

        let response = self
            .http
            .post(self.url(&format!("blogs/{}/articles.json", blog_id)), payload)
            .await?;
        log_response("create article", &response);

        if response.status != 201 {
            return Ok(WriteOutcome::Rejected {
                status: response.status,
                body: response.text(),
            });
        }

        let envelope: ArticleEnvelope = response.json()?;
        Ok(WriteOutcome::Created(CreatedArticle {
            id: envelope.article.id,
            handle: envelope.article.handle,
            blog_handle: envelope.article.blog.and_then(|b| b.handle),
        }))
    }

    pub async fn create_redirect(&self, redirect: &Redirect) -> Result<WriteOutcome<()>> {
        let payload = serde_json::json!({ "redirect": redirect });
        let response = self.http.post(self.url("redirects.json"), payload).await?;
        log_response("create redirect", &response);

        if response.status == 201 {
            Ok(WriteOutcome::Created(()))
        } else {
            Ok(WriteOutcome::Rejected {
                status: response.status,
                body: response.text(),
            })
        }
    }

    /// Uploads a base64 attachment and returns the hosted URL.
    pub async fn upload_file(&self, attachment: &str, filename: &str) -> Result<WriteOutcome<String>> {
        let payload = serde_json::json!({
            "file": { "attachment": attachment, "filename": filename }
        });
        let response = self.http.post(self.url("files.json"), payload).await?;
        log_response(&format!("upload {}", filename), &response);

        if response.status == 201 {
            let envelope: FileEnvelope = response.json()?;
            Ok(WriteOutcome::Created(envelope.file.url))
        } else {
            Ok(WriteOutcome::Rejected {
                status: response.status,
                body: response.text(),
            })
        }
    }
}
