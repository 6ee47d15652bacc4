pub mod adapter;
pub mod error;
pub mod query;
pub mod response;

pub use adapter::{ClusterInfo, ElasticStore};
