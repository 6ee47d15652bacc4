pub mod elastic;
pub mod memory;
