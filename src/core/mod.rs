pub mod content;
pub mod migrator;
