pub mod consumer;
pub mod error;
pub mod producer;
pub mod state_manager;
