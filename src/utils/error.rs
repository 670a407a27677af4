use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Missing required configuration: {field}")]
    MissingConfig { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Source query failed: {message}")]
    SourceQuery { message: String },

    #[error("Unexpected response ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("Destination blog unavailable: {message}")]
    BlogUnavailable { message: String },
}

impl MigrationError {
    /// Errors that abort the whole run rather than a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrationError::MissingConfig { .. }
                | MigrationError::InvalidConfigValue { .. }
                | MigrationError::Config { .. }
                | MigrationError::Toml(_)
                | MigrationError::BlogUnavailable { .. }
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MigrationError::MissingConfig { field } => format!(
                "{} is not set. Please make sure SHOPIFY_STORE, SHOPIFY_API_TOKEN and WPGRAPHQL_ENDPOINT are defined in your .env file or environment.",
                field
            ),
            MigrationError::InvalidConfigValue { field, reason, .. } => {
                format!("Invalid setting {}: {}", field, reason)
            }
            MigrationError::BlogUnavailable { message } => {
                format!("Cannot continue without a destination blog: {}", message)
            }
            MigrationError::SourceQuery { message } => {
                format!("WordPress GraphQL query failed: {}", message)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MigrationError::MissingConfig { .. } => {
                "Define the missing variable in .env or pass it as a command line flag"
            }
            MigrationError::InvalidConfigValue { .. }
            | MigrationError::Config { .. }
            | MigrationError::Toml(_) => "Check the settings file and command line flags",
            MigrationError::BlogUnavailable { .. } => {
                "Check that the access token has read_content and write_content scopes"
            }
            MigrationError::Http(_) => "Check network connectivity and the configured endpoints",
            MigrationError::SourceQuery { .. } => {
                "Check that WPGraphQL is installed and the endpoint is reachable"
            }
            _ => "Inspect the run log for details and re-run; migrated posts are skipped",
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
