//! Content transforms applied to post bodies before they are written.

use scraper::{Html, Node, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Maximum length of a summary derived from the post body.
pub const SUMMARY_MAX_CHARS: usize = 160;

const SHORTCODE_SELECTOR: &str = "div.shortcode";

/// Named transform stage, applied in configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStage {
    StripShortcodes,
    RewriteLinks,
    UploadImages,
}

impl ContentStage {
    pub fn name(&self) -> &'static str {
        match self {
            ContentStage::StripShortcodes => "strip_shortcodes",
            ContentStage::RewriteLinks => "rewrite_links",
            ContentStage::UploadImages => "upload_images",
        }
    }
}

/// Rewrites absolute links whose host is `source_domain` to `target_domain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRewrite {
    pub source_domain: String,
    pub target_domain: String,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("built-in selector is valid")
}

fn serialize(document: &Html) -> String {
    document.root_element().inner_html()
}

/// Removes rendered shortcode wrapper elements. Bracket syntax left in the
/// text is not touched.
pub fn strip_shortcodes(html: &str) -> String {
    let mut document = Html::parse_fragment(html);
    let ids: Vec<_> = document
        .select(&selector(SHORTCODE_SELECTOR))
        .map(|element| element.id())
        .collect();

    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    serialize(&document)
}

fn is_source_host(host: &str, source_domain: &str) -> bool {
    let bare = host
        .get(..4)
        .filter(|prefix| prefix.eq_ignore_ascii_case("www."))
        .map_or(host, |_| &host[4..]);
    host.eq_ignore_ascii_case(source_domain) || bare.eq_ignore_ascii_case(source_domain)
}

/// The bare source domain and its `www.` host both map to the target domain.
fn rewrite_href(href: &str, rewrite: &LinkRewrite) -> Option<String> {
    let mut url = Url::parse(href).ok()?;
    let host = url.host_str()?;
    if !is_source_host(host, &rewrite.source_domain)
        || host.eq_ignore_ascii_case(&rewrite.target_domain)
    {
        return None;
    }
    url.set_host(Some(&rewrite.target_domain)).ok()?;
    Some(url.to_string())
}

/// Points internal links at the destination domain.
pub fn rewrite_links(html: &str, rewrite: &LinkRewrite) -> String {
    let mut document = Html::parse_fragment(html);
    let ids: Vec<_> = document
        .select(&selector("a[href]"))
        .map(|element| element.id())
        .collect();

    for id in ids {
        let Some(mut node) = document.tree.get_mut(id) else {
            continue;
        };
        if let Node::Element(element) = node.value() {
            for (name, value) in element.attrs.iter_mut() {
                if &*name.local != "href" {
                    continue;
                }
                if let Some(new_href) = rewrite_href(&**value, rewrite) {
                    tracing::debug!("Link updated: {} -> {}", &**value, new_href);
                    *value = new_href.as_str().into();
                }
            }
        }
    }

    serialize(&document)
}

/// Applies one markup stage. Media stages need network access and leave the
/// content unchanged here.
pub fn apply_stage(stage: ContentStage, html: &str, links: Option<&LinkRewrite>) -> String {
    match (stage, links) {
        (ContentStage::StripShortcodes, _) => strip_shortcodes(html),
        (ContentStage::RewriteLinks, Some(rewrite)) => rewrite_links(html, rewrite),
        (ContentStage::RewriteLinks, None) | (ContentStage::UploadImages, _) => html.to_string(),
    }
}

/// Runs the markup stages in order.
pub fn transform(html: &str, stages: &[ContentStage], links: Option<&LinkRewrite>) -> String {
    stages
        .iter()
        .fold(html.to_string(), |content, stage| apply_stage(*stage, &content, links))
}

/// Visible text of a markup fragment.
pub fn strip_markup(html: &str) -> String {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .collect::<String>()
}

/// Summary from the excerpt, or from the first characters of the body when
/// the excerpt has no text.
pub fn derive_summary(excerpt: Option<&str>, content: &str) -> String {
    let from_excerpt = excerpt.map(strip_markup).unwrap_or_default();
    let from_excerpt = from_excerpt.trim();
    if !from_excerpt.is_empty() {
        return from_excerpt.to_string();
    }

    strip_markup(content)
        .trim()
        .chars()
        .take(SUMMARY_MAX_CHARS)
        .collect()
}
