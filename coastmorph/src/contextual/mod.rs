pub mod flood;
pub mod summative;
