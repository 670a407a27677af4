use crate::core::content::ContentStage;
use crate::utils::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Optional settings file. Every section and key may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub shopify: ShopifySection,
    #[serde(default)]
    pub migration: MigrationSection,
    #[serde(default)]
    pub content: ContentSection,
    #[serde(default)]
    pub links: LinksSection,
    #[serde(default)]
    pub throttle: ThrottleSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceSection {
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShopifySection {
    pub store: Option<String>,
    pub access_token: Option<String>,
    pub api_version: Option<String>,
    pub base_url: Option<String>,
    pub blog_title: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationSection {
    pub page_size: Option<usize>,
    pub max_posts: Option<usize>,
    pub record_delay_secs: Option<f64>,
    pub create_redirects: Option<bool>,
    pub dry_run: Option<bool>,
    pub default_author: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentSection {
    pub stages: Option<Vec<ContentStage>>,
    pub reencode_images: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinksSection {
    pub source_domain: Option<String>,
    pub target_domain: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThrottleSection {
    pub default_retry_after_secs: Option<f64>,
    /// `0` keeps retrying for as long as the server throttles.
    pub max_retries: Option<u32>,
}

impl FileConfig {
    /// Loads and parses a settings file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        Ok(toml::from_str(&processed)?)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }
}
