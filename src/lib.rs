pub mod api_connection;
pub mod cli;
pub mod collector;
pub mod config;
pub mod enrichment;
pub mod normalizer;
pub mod photo;
pub mod recipe;
pub mod render;
pub mod session;
pub mod view;
pub mod voice;
