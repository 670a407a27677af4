// Adapters for the systems a migration talks to.

pub mod http;
pub mod media;
pub mod shopify;
pub mod wordpress;
