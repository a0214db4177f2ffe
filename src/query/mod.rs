//! Query and admin surface over the registry

pub mod request;
pub mod service;

pub use request::AdminUpdate;
pub use service::BinService;
