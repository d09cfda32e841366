pub mod auth;
pub mod permissions;
pub mod roles;
pub mod system_parameters;
pub mod users;
