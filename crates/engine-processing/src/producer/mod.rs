pub mod reader;
pub mod transformer;
