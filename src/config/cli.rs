use crate::config::SettingsOverrides;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "wp-shopify-migrate")]
#[command(about = "Migrate WordPress posts into a Shopify blog")]
pub struct CliConfig {
    /// Store domain, e.g. my-shop.myshopify.com
    #[arg(long, env = "SHOPIFY_STORE")]
    pub shopify_store: Option<String>,

    /// Admin API access token
    #[arg(long, env = "SHOPIFY_API_TOKEN", hide_env_values = true)]
    pub shopify_api_token: Option<String>,

    /// WPGraphQL endpoint, e.g. https://blog.example.com/graphql
    #[arg(long, env = "WPGRAPHQL_ENDPOINT")]
    pub wpgraphql_endpoint: Option<String>,

    /// Optional TOML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Posts requested per source page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Stop after this many posts have been migrated
    #[arg(long)]
    pub max_posts: Option<usize>,

    /// Pause after each created article, in seconds
    #[arg(long)]
    pub record_delay_secs: Option<f64>,

    /// Give up on a throttled request after this many retries (0 = never give up)
    #[arg(long)]
    pub max_throttle_retries: Option<u32>,

    /// Admin API version
    #[arg(long)]
    pub api_version: Option<String>,

    /// Title of the blog created when the store has none
    #[arg(long)]
    pub blog_title: Option<String>,

    /// Do not create redirects from the old post URLs
    #[arg(long)]
    pub no_redirects: bool,

    /// Re-host inline and featured images on the store
    #[arg(long)]
    pub upload_media: bool,

    /// Point links to the WordPress domain at the store domain
    #[arg(long)]
    pub rewrite_links: bool,

    /// Domain whose links are rewritten (defaults to the GraphQL endpoint host)
    #[arg(long)]
    pub source_domain: Option<String>,

    /// Domain links are rewritten to (defaults to the store domain)
    #[arg(long)]
    pub target_domain: Option<String>,

    /// Read and transform posts without writing to the store
    #[arg(long)]
    pub dry_run: bool,

    /// Append-only run log
    #[arg(long, default_value = "migration.log")]
    pub log_file: PathBuf,

    /// Emit JSON logs to stdout instead of console and file output
    #[arg(long)]
    pub json_logs: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            shopify_store: self.shopify_store.clone(),
            shopify_api_token: self.shopify_api_token.clone(),
            wpgraphql_endpoint: self.wpgraphql_endpoint.clone(),
            page_size: self.page_size,
            max_posts: self.max_posts,
            record_delay_secs: self.record_delay_secs,
            max_throttle_retries: self.max_throttle_retries,
            api_version: self.api_version.clone(),
            blog_title: self.blog_title.clone(),
            source_domain: self.source_domain.clone(),
            target_domain: self.target_domain.clone(),
            no_redirects: self.no_redirects,
            upload_media: self.upload_media,
            rewrite_links: self.rewrite_links,
            dry_run: self.dry_run,
        }
    }
}
