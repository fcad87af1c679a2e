//! Rust client for the users API.

pub mod client;
pub mod models;

pub use client::{SdkError, SdkResult, UsersClient};
pub use models::{Address, CreateUser, ListUsers, UpdateUser, User, UserPage};
