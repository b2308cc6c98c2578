//! Adapters implementing the ports against real collaborators.

mod http;
mod storage;

pub use http::ApiClient;
pub use storage::{FileStore, MemoryStore};
