#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use toml_config::FileConfig;

use crate::adapters::http::ThrottlePolicy;
use crate::core::content::{ContentStage, LinkRewrite};
use crate::utils::error::{MigrationError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_range, validate_required_field, validate_url, Validate,
};
use std::time::Duration;

pub const DEFAULT_API_VERSION: &str = "2023-10";
pub const DEFAULT_BLOG_TITLE: &str = "Blog";
pub const DEFAULT_AUTHOR: &str = "Unknown";
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const DEFAULT_RECORD_DELAY_SECS: f64 = 5.0;

/// Values given on the command line or through the environment. They win
/// over the settings file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub shopify_store: Option<String>,
    pub shopify_api_token: Option<String>,
    pub wpgraphql_endpoint: Option<String>,
    pub page_size: Option<usize>,
    pub max_posts: Option<usize>,
    pub record_delay_secs: Option<f64>,
    pub max_throttle_retries: Option<u32>,
    pub api_version: Option<String>,
    pub blog_title: Option<String>,
    pub source_domain: Option<String>,
    pub target_domain: Option<String>,
    pub no_redirects: bool,
    pub upload_media: bool,
    pub rewrite_links: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct ShopifySettings {
    pub store: String,
    pub access_token: String,
    pub api_version: String,
    pub base_url: Option<String>,
    pub blog_title: String,
}

impl ShopifySettings {
    pub fn admin_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}/admin/api/{}", self.store, self.api_version))
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct MigrationSettings {
    pub shopify: ShopifySettings,
    pub wpgraphql_endpoint: String,
    pub request_timeout: Duration,
    pub page_size: usize,
    pub max_posts: Option<usize>,
    pub record_delay: Duration,
    pub create_redirects: bool,
    pub dry_run: bool,
    pub default_author: String,
    pub stages: Vec<ContentStage>,
    pub reencode_images: bool,
    pub links: Option<LinkRewrite>,
    pub throttle: ThrottlePolicy,
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

fn secs(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|e| MigrationError::InvalidConfigValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

impl MigrationSettings {
    pub fn resolve(file: FileConfig, overrides: SettingsOverrides) -> Result<Self> {
        let store = overrides.shopify_store.or(file.shopify.store);
        let token = overrides.shopify_api_token.or(file.shopify.access_token);
        let endpoint = overrides.wpgraphql_endpoint.or(file.source.endpoint);

        let store = validate_required_field("SHOPIFY_STORE", &store)?.clone();
        let access_token = validate_required_field("SHOPIFY_API_TOKEN", &token)?.clone();
        let wpgraphql_endpoint = validate_required_field("WPGRAPHQL_ENDPOINT", &endpoint)?.clone();

        let mut stages = file
            .content
            .stages
            .unwrap_or_else(|| vec![ContentStage::StripShortcodes]);
        if overrides.rewrite_links && !stages.contains(&ContentStage::RewriteLinks) {
            stages.push(ContentStage::RewriteLinks);
        }
        if overrides.upload_media && !stages.contains(&ContentStage::UploadImages) {
            stages.push(ContentStage::UploadImages);
        }

        let links = if stages.contains(&ContentStage::RewriteLinks) {
            let source_domain = overrides
                .source_domain
                .or(file.links.source_domain)
                .or_else(|| host_of(&wpgraphql_endpoint))
                .unwrap_or_default();
            let target_domain = overrides
                .target_domain
                .or(file.links.target_domain)
                .unwrap_or_else(|| store.clone());
            Some(LinkRewrite {
                source_domain,
                target_domain,
            })
        } else {
            None
        };

        let record_delay = secs(
            "record_delay_secs",
            overrides
                .record_delay_secs
                .or(file.migration.record_delay_secs)
                .unwrap_or(DEFAULT_RECORD_DELAY_SECS),
        )?;

        let default_retry_after = secs(
            "throttle.default_retry_after_secs",
            file.throttle.default_retry_after_secs.unwrap_or(5.0),
        )?;
        let max_retries = match overrides
            .max_throttle_retries
            .or(file.throttle.max_retries)
            .unwrap_or(10)
        {
            0 => None,
            n => Some(n),
        };

        let settings = Self {
            shopify: ShopifySettings {
                store,
                access_token,
                api_version: overrides
                    .api_version
                    .or(file.shopify.api_version)
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                base_url: file.shopify.base_url,
                blog_title: overrides
                    .blog_title
                    .or(file.shopify.blog_title)
                    .unwrap_or_else(|| DEFAULT_BLOG_TITLE.to_string()),
            },
            wpgraphql_endpoint,
            request_timeout: Duration::from_secs(file.source.timeout_seconds.unwrap_or(30)),
            page_size: overrides
                .page_size
                .or(file.migration.page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE),
            max_posts: overrides.max_posts.or(file.migration.max_posts),
            record_delay,
            create_redirects: !overrides.no_redirects
                && file.migration.create_redirects.unwrap_or(true),
            dry_run: overrides.dry_run || file.migration.dry_run.unwrap_or(false),
            default_author: file
                .migration
                .default_author
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            stages,
            reencode_images: file.content.reencode_images.unwrap_or(true),
            links,
            throttle: ThrottlePolicy {
                default_retry_after,
                max_retries,
            },
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn uploads_media(&self) -> bool {
        self.stages.contains(&ContentStage::UploadImages)
    }
}

impl Validate for MigrationSettings {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("SHOPIFY_STORE", &self.shopify.store)?;
        validate_non_empty_string("SHOPIFY_API_TOKEN", &self.shopify.access_token)?;
        validate_url("WPGRAPHQL_ENDPOINT", &self.wpgraphql_endpoint)?;
        if let Some(base_url) = &self.shopify.base_url {
            validate_url("shopify.base_url", base_url)?;
        }
        validate_range("page_size", self.page_size, 1, 100)?;
        if let Some(links) = &self.links {
            validate_non_empty_string("links.source_domain", &links.source_domain)?;
            validate_non_empty_string("links.target_domain", &links.target_domain)?;
        }
        Ok(())
    }
}
