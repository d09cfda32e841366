//! Request extractors for authentication and authorization.
//!
//! 1. Client sends `Authorization: Bearer <token>`
//! 2. [`auth::AuthUser`] validates the JWT and exposes its claims
//! 3. Permission extractors built with `require_permission!` reject with 403
//!    when the token lacks the permission name
//!
//! # Example
//!
//! ```ignore
//! use crate::middleware::auth::{AuthUser, RequireRolesManage};
//!
//! async fn me(auth_user: AuthUser) -> impl IntoResponse { /* any valid token */ }
//!
//! async fn create_role(RequireRolesManage(auth_user): RequireRolesManage) -> impl IntoResponse {
//!     // Only runs if the token carries "roles.manage.all"
//! }
//! ```

pub mod auth;
