//! Common types, envelope, and errors shared across `marketplace-api` crates.

pub mod envelope;
pub mod error;
pub mod protocol;

pub use envelope::{Envelope, Message, MessageKind};
pub use error::ServiceError;
