//! # Casedesk Core
//!
//! Core types, errors, and utilities for the Casedesk API.
//!
//! This crate provides foundational types used throughout the application:
//!
//! - [`errors`]: Application error type with HTTP response conversion
//! - [`response`]: The `{success, data, message}` envelope returned by every endpoint
//! - [`pagination`]: Pagination utilities for list endpoints
//! - [`password`]: Password hashing and verification
//! - [`crypto`]: AES-256-GCM encryption for secrets stored at rest
//! - [`serde`]: Query-string deserialization helpers
//!
//! # Example
//!
//! ```ignore
//! use casedesk_core::{AppError, ApiResponse};
//!
//! async fn handler() -> Result<Json<ApiResponse<Role>>, AppError> {
//!     let role = find_role().await?
//!         .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Rol no encontrado")))?;
//!     Ok(Json(ApiResponse::ok(role)))
//! }
//! ```

pub mod crypto;
pub mod errors;
pub mod pagination;
pub mod password;
pub mod response;
pub mod serde;

// Re-export commonly used types at crate root
pub use crypto::{CryptoError, SecretCipher};
pub use errors::AppError;
pub use pagination::{PaginationMeta, PaginationParams};
pub use password::{hash_password, verify_password};
pub use response::ApiResponse;
