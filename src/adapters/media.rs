//! Re-hosts post images on the destination store.

use crate::adapters::shopify::ShopifyClient;
use crate::domain::model::WriteOutcome;
use crate::domain::ports::{HttpRequest, HttpTransport};
use crate::utils::error::{MigrationError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageError, ImageReader};
use scraper::{Html, Node, Selector};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use url::Url;

/// Content with image sources rewritten, plus what happened on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImages {
    pub content: String,
    pub uploaded: usize,
    pub failed: Vec<String>,
}

/// Decodes and re-encodes an image in its own format. Formats the encoder
/// cannot write are passed through unchanged.
pub fn optimize_image(bytes: &[u8]) -> Result<Vec<u8>> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format();
    let decoded = reader.decode()?;

    let Some(format) = format else {
        return Ok(bytes.to_vec());
    };

    let mut out = Cursor::new(Vec::new());
    match decoded.write_to(&mut out, format) {
        Ok(()) => Ok(out.into_inner()),
        Err(ImageError::Unsupported(reason)) => {
            tracing::debug!("Keeping original bytes, cannot re-encode: {}", reason);
            Ok(bytes.to_vec())
        }
        Err(e) => Err(e.into()),
    }
}

pub fn filename_from_url(image_url: &str) -> String {
    let from_path = match Url::parse(image_url) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string)),
        Err(_) => image_url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    };

    from_path
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "image".to_string())
}

pub struct ImageUploader {
    downloader: Arc<dyn HttpTransport>,
    shopify: Arc<ShopifyClient>,
    reencode: bool,
}

impl ImageUploader {
    pub fn new(downloader: Arc<dyn HttpTransport>, shopify: Arc<ShopifyClient>, reencode: bool) -> Self {
        Self {
            downloader,
            shopify,
            reencode,
        }
    }

    async fn try_upload(&self, image_url: &str) -> Result<String> {
        tracing::debug!("Downloading image: {}", image_url);
        let response = self.downloader.send(&HttpRequest::get(image_url)).await?;
        if !response.is_success() {
            return Err(MigrationError::UnexpectedResponse {
                status: response.status,
                body: response.text(),
            });
        }

        let bytes = if self.reencode {
            optimize_image(&response.body)?
        } else {
            response.body
        };

        let filename = filename_from_url(image_url);
        let attachment = STANDARD.encode(&bytes);

        match self.shopify.upload_file(&attachment, &filename).await? {
            WriteOutcome::Created(url) => Ok(url),
            WriteOutcome::Rejected { status, body } => {
                Err(MigrationError::UnexpectedResponse { status, body })
            }
        }
    }

    /// Uploads one remote image. Failures are logged and yield `None`.
    pub async fn upload_image(&self, image_url: &str) -> Option<String> {
        match self.try_upload(image_url).await {
            Ok(url) => {
                tracing::debug!("Image re-hosted: {} -> {}", image_url, url);
                Some(url)
            }
            Err(e) => {
                tracing::error!("Failed to upload image {}: {}", image_url, e);
                None
            }
        }
    }

    /// Re-hosts every `<img src>` in the content. Images that fail keep their
    /// original source.
    pub async fn process_inline_images(&self, html: &str) -> InlineImages {
        let mut document = Html::parse_fragment(html);
        let img_selector = Selector::parse("img[src]").expect("built-in selector is valid");

        let targets: Vec<_> = document
            .select(&img_selector)
            .filter_map(|img| {
                img.value()
                    .attr("src")
                    .filter(|src| !src.trim().is_empty())
                    .map(|src| (img.id(), src.to_string()))
            })
            .collect();

        let mut uploads: HashMap<String, Option<String>> = HashMap::new();
        for (_, src) in &targets {
            if uploads.contains_key(src) {
                continue;
            }
            tracing::debug!("Processing inline image: {}", src);
            let hosted = self.upload_image(src).await;
            uploads.insert(src.clone(), hosted);
        }

        let mut uploaded = 0;
        let mut failed = Vec::new();
        for (id, src) in targets {
            let Some(new_src) = uploads.get(&src).cloned().flatten() else {
                failed.push(src);
                continue;
            };
            if let Some(mut node) = document.tree.get_mut(id) {
                if let Node::Element(element) = node.value() {
                    for (name, value) in element.attrs.iter_mut() {
                        if &*name.local == "src" {
                            *value = new_src.as_str().into();
                        }
                    }
                }
            }
            uploaded += 1;
        }

        InlineImages {
            content: document.root_element().inner_html(),
            uploaded,
            failed,
        }
    }
}
