//! # Casedesk Auth
//!
//! JWT claims and token utilities for the Casedesk API.
//!
//! - [`claims`]: Access token claims
//! - [`jwt`]: Token creation and verification
//!
//! Access tokens carry the user's single role and the names of the active
//! permissions granted through it, so permission gates need no database
//! round trip.
//!
//! # Example
//!
//! ```ignore
//! use casedesk_auth::{create_access_token, verify_token};
//! use casedesk_config::JwtConfig;
//!
//! let config = JwtConfig::from_env();
//! let token = create_access_token(
//!     user_id,
//!     "agente@casedesk.local",
//!     Some(role_id),
//!     Some("Agente".to_string()),
//!     vec!["casos.read.own".to_string()],
//!     &config,
//! )?;
//! let claims = verify_token(&token, &config)?;
//! ```

pub mod claims;
pub mod jwt;

pub use claims::Claims;
pub use jwt::{create_access_token, verify_token};
