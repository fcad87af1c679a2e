//! Users API Library
//!
//! CRUD service for user records with embedded addresses, stored in MongoDB.

pub mod config;
pub mod domain;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod store;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
