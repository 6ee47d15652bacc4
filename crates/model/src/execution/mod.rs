pub mod identity;
pub mod job;
pub mod quarantine;
