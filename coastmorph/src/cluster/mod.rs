pub mod ward;
