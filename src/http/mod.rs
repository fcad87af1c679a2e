//! HTTP surface of the users API.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request_id.rs (assign / propagate x-request-id)
//!     → body.rs (optional JSON body, `{}` when absent)
//!     → handlers.rs (validate, one store call, map result)
//!     → error.rs (ApiError → {"message": ...})
//!     → Send to client
//! ```

pub mod body;
pub mod error;
pub mod handlers;
pub mod request_id;
pub mod server;

pub use body::LenientJson;
pub use error::{ApiError, MessageBody};
pub use request_id::X_REQUEST_ID;
pub use server::{build_router, AppState, HttpServer, USERS_PREFIX};
