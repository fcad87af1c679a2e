//! Domain model and request validation.
//!
//! # Data Flow
//! ```text
//! request body / query
//!     → validation.rs (addresses, pagination)
//!     → user.rs (NewUser / UserPatch)
//!     → store (persist)
//! ```

pub mod user;
pub mod validation;

pub use user::{Address, NewUser, User, UserId, UserPatch};
pub use validation::{
    parse_addresses, validate_addresses, validate_pagination_params, Pagination, ValidationError,
};
