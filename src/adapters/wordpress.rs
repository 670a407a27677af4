//! WordPress source: cursor-paginated `posts` query against WPGraphQL.

use crate::domain::model::{SourcePage, SourceRecord};
use crate::domain::ports::{HttpRequest, HttpTransport};
use crate::utils::error::{MigrationError, Result};
use serde::Deserialize;
use std::sync::Arc;

pub const POSTS_QUERY: &str = r#"
query GetPosts($first: Int!, $after: String) {
    posts(first: $first, after: $after) {
        pageInfo {
            hasNextPage
            endCursor
        }
        nodes {
            id
            title
            content
            excerpt
            date
            slug
            author { node { name } }
            categories { nodes { name } }
            tags { nodes { name } }
            featuredImage { node { sourceUrl } }
        }
    }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<PostsData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PostsData {
    posts: Option<PostConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostConnection {
    page_info: PageInfo,
    #[serde(default)]
    nodes: Vec<PostNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Edge<T> {
    node: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaItem {
    source_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostNode {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    date: Option<String>,
    slug: String,
    #[serde(default)]
    author: Option<Edge<Named>>,
    #[serde(default)]
    categories: Option<Nodes<Named>>,
    #[serde(default)]
    tags: Option<Nodes<Named>>,
    #[serde(default)]
    featured_image: Option<Edge<MediaItem>>,
}

fn names(list: Option<Nodes<Named>>) -> Vec<String> {
    list.map(|l| l.nodes.into_iter().filter_map(|n| n.name).collect())
        .unwrap_or_default()
}

impl From<PostNode> for SourceRecord {
    fn from(node: PostNode) -> Self {
        SourceRecord {
            id: node.id,
            slug: node.slug,
            title: node.title.unwrap_or_default(),
            content: node.content.unwrap_or_default(),
            date: node.date.unwrap_or_default(),
            excerpt: node.excerpt,
            author: node.author.and_then(|a| a.node).and_then(|n| n.name),
            categories: names(node.categories),
            tags: names(node.tags),
            featured_image_url: node
                .featured_image
                .and_then(|f| f.node)
                .and_then(|m| m.source_url),
        }
    }
}

pub struct WpGraphqlSource {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
}

impl WpGraphqlSource {
    pub fn new(transport: Arc<dyn HttpTransport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    /// Fetches one page of posts. Any failure here ends pagination for the run;
    /// the query is not retried.
    pub async fn fetch_page(&self, page_size: usize, after: Option<&str>) -> Result<SourcePage> {
        let body = serde_json::json!({
            "query": POSTS_QUERY,
            "variables": { "first": page_size, "after": after },
        });
        let request = HttpRequest::post(&self.endpoint, body)
            .with_header("Content-Type", "application/json");

        tracing::debug!("Querying posts (first: {}, after: {:?})", page_size, after);
        let response = self.transport.send(&request).await?;

        if !response.is_success() {
            return Err(MigrationError::SourceQuery {
                message: format!("HTTP {} - {}", response.status, response.text()),
            });
        }

        let parsed: GraphqlResponse = response.json()?;
        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(MigrationError::SourceQuery {
                message: messages.join("; "),
            });
        }

        let posts = parsed
            .data
            .and_then(|d| d.posts)
            .ok_or_else(|| MigrationError::SourceQuery {
                message: "response has no posts connection".to_string(),
            })?;

        Ok(SourcePage {
            records: posts.nodes.into_iter().map(SourceRecord::from).collect(),
            has_next_page: posts.page_info.has_next_page,
            end_cursor: posts.page_info.end_cursor,
        })
    }
}
