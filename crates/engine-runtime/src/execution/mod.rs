pub mod executor;
pub mod partition;
pub mod report;
pub mod schema;
pub mod state;

pub use executor::ReindexJob;
pub use report::JobReport;
pub use state::JobState;
