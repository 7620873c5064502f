pub mod dem;
pub mod street;
pub mod wind;
