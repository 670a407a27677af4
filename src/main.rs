use clap::Parser;
use wp_shopify_migrate::utils::logger;
use wp_shopify_migrate::{
    CliConfig, FileConfig, MigrationContext, MigrationError, MigrationSettings, Migrator,
};

fn exit_with(e: &MigrationError) -> ! {
    tracing::error!("❌ Migration failed: {}", e);
    tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(1);
}

fn load_settings(cli: &CliConfig) -> Result<MigrationSettings, MigrationError> {
    let file = match &cli.config {
        Some(path) => {
            tracing::info!("Loading settings from {}", path.display());
            FileConfig::from_file(path)?
        }
        None => FileConfig::default(),
    };
    MigrationSettings::resolve(file, cli.overrides())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose, Some(&cli.log_file))?;
    }

    tracing::info!("Starting wp-shopify-migrate");

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => exit_with(&e),
    };
    tracing::debug!(
        "Source {}, destination {}, page size {}, max posts {:?}",
        settings.wpgraphql_endpoint,
        settings.shopify.store,
        settings.page_size,
        settings.max_posts
    );

    let ctx = match MigrationContext::from_settings(settings) {
        Ok(ctx) => ctx,
        Err(e) => exit_with(&e),
    };

    match Migrator::new(ctx).run().await {
        Ok(report) => {
            println!(
                "✅ Migrated {} posts ({} skipped, {} failed)",
                report.migrated, report.skipped, report.failed
            );
            if report.planned > 0 {
                println!("📝 Dry run planned {} posts", report.planned);
            }
            Ok(())
        }
        Err(e) => exit_with(&e),
    }
}
