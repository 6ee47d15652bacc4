pub mod unify;

pub use unify::{MappingUnifier, Unification, unify};
