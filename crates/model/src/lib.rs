pub mod execution;
pub mod pagination;
pub mod records;
pub mod schema;
