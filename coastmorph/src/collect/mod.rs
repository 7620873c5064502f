pub mod global_variables;
pub mod layers;
pub mod study;
