pub mod connectors;
pub mod error;
pub mod schema;
pub mod state;
