//! # Casedesk CLI
//!
//! Administrative tasks that run outside the HTTP API: bootstrapping the
//! first administrator and repairing permission names.
//!
//! ## Usage
//!
//! ```ignore
//! use casedesk_cli::admin::create_admin;
//!
//! let admin = create_admin(&pool, "admin@casedesk.local", Some("Admin".into()), "s3cret-pass").await?;
//! ```

pub mod admin;
pub mod report;
