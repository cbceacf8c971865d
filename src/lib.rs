pub mod config;
pub mod discover;
pub mod preprocess;
pub mod store;
