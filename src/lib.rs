//! Terminal chat client for a local Ollama server.

pub mod api;
pub mod app;
pub mod client;
pub mod conversation;
pub mod error;
pub mod markdown;
pub mod models;
pub mod session;
pub mod stream;
pub mod ui;
