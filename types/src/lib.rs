//! Core domain types for Scopekeeper.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

mod error;
mod ids;
mod severity;

pub use error::{RegistryError, UnitOfWorkError};
pub use ids::{RequestId, UnitOfWorkId, WorkerId};
pub use severity::Severity;
