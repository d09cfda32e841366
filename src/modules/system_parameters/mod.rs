pub mod controller;
pub mod router;
pub mod service;
pub mod store;

pub use router::init_system_parameters_router;
pub use store::ParameterStore;
