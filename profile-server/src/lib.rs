pub mod config;
pub mod http;
pub mod pages;
pub mod service;

pub use config::{Cli, Command, Settings};
pub use http::{build_router, AppState};
pub use service::{ProfileService, StoredUpload, UPLOADS_ROUTE};
