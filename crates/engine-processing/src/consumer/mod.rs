pub mod loader;
pub mod quarantine;
