pub mod basic_functions;
pub mod error;
pub mod statistics;
