// Library interface for newsdesk modules
// This allows tests and other binaries to import modules

pub mod app;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod runner;
pub mod scraping;
pub mod search;
pub mod server;
pub mod storage;
pub mod text;
