//! Bin registry
//!
//! The registry is the single source of truth for bin state. Every other
//! component holds an `Arc<BinRegistry>` and looks bins up by id; nobody keeps
//! a private copy.
//!
//! ```text
//!                      Arc<BinRegistry>
//!                 ┌─────────────────────────┐
//!                 │ bins: HashMap<Id, Bin>  │
//!                 │ order: Vec<Id>          │
//!                 │ latest: Option<Id>      │
//!                 └───────────┬─────────────┘
//!                             │
//!        ┌────────────────────┼─────────────────────┐
//!        │                    │                     │
//!        ▼                    ▼                     ▼
//!    [Updater]           [Simulator]          [BinService]
//!    upsert()            ids()                register() / modify() / list()
//! ```

pub mod bin;
pub mod config;
pub mod error;
pub mod store;

pub use bin::{Bin, Registration};
pub use config::RegistryConfig;
pub use error::RegistryError;
pub use store::BinRegistry;
