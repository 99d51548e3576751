// Library interface for aipa modules
// This allows tests and the binary to import modules

pub mod allergy;
pub mod app;
pub mod cache;
pub mod context;
pub mod conversation;
pub mod error;
pub mod http;
pub mod llm;
pub mod news;
pub mod rate_limit;
pub mod search;
pub mod sources;
pub mod weather;

pub use app::Assistant;
pub use error::{Error, Result};
